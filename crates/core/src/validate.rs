//! Parse-time template validation.
//!
//! Pure functions over an already-deserialized [`Template`]; the validator
//! is an explicit instance passed through the parse call, never a
//! process-wide singleton. Every violation is collected so one parse failure
//! reports everything that is wrong with the document.

use std::collections::HashSet;

use crate::error::CoreError;
use crate::template::{
    level_by_priority, level_priority, HighlightConfig, Indicator, Template, Variable,
    VALID_DISPLAY_TYPES, VALID_KINDS, VALID_OPERATORS, VALID_SOURCES, VALID_VAR_TYPES,
};

/// Validates the structural invariants of a parsed template.
#[derive(Debug, Default)]
pub struct TemplateValidator;

impl TemplateValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check the whole document. Returns a single aggregated
    /// [`CoreError::Validation`] listing every violation found.
    pub fn validate(&self, template: &Template) -> Result<(), CoreError> {
        let mut violations = Vec::new();

        if template.template_name.is_empty() {
            violations.push("template_name is required".to_string());
        }
        if template.display_name.is_empty() {
            violations.push("display_name is required".to_string());
        }
        if template.time_range.is_empty() {
            violations.push("time_range is required".to_string());
        }
        if let Err(reason) = validate_cron(&template.schedule.cron) {
            violations.push(format!("schedule.cron: {reason}"));
        }
        if template.indicators.is_empty() {
            violations.push("at least one indicator is required".to_string());
        }
        if template.report_layout.sections.is_empty() {
            violations.push("report_layout needs at least one section".to_string());
        }
        for section in &template.report_layout.sections {
            if section.title.is_empty() {
                violations.push("section title is required".to_string());
            }
            if section.include.is_empty() {
                violations.push(format!("section {} includes no indicators", section.title));
            }
        }

        for var in &template.vars {
            self.check_variable(var, "global", &mut violations);
        }
        for indicator in &template.indicators {
            self.check_indicator(indicator, &mut violations);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(violations.join("; ")))
        }
    }

    fn check_indicator(&self, ind: &Indicator, violations: &mut Vec<String>) {
        let name = if ind.name.is_empty() { "<unnamed>" } else { &ind.name };

        if ind.name.is_empty() {
            violations.push("indicator name is required".to_string());
        }
        if !VALID_SOURCES.contains(&ind.source.as_str()) {
            violations.push(format!(
                "indicator {name}: source must be one of {}",
                VALID_SOURCES.join(", ")
            ));
        }
        if !VALID_KINDS.contains(&ind.kind.as_str()) {
            violations.push(format!(
                "indicator {name}: type must be one of {}",
                VALID_KINDS.join(", ")
            ));
        }
        if ind.query.is_empty() {
            violations.push(format!("indicator {name}: query is required"));
        }
        if !VALID_DISPLAY_TYPES.contains(&ind.display.display_type.as_str()) {
            violations.push(format!(
                "indicator {name}: display type must be one of {}",
                VALID_DISPLAY_TYPES.join(", ")
            ));
        }

        if let Err(reason) = validate_threshold_order(ind) {
            violations.push(format!("indicator {name}: {reason}"));
        }
        for th in &ind.thresholds {
            if !VALID_OPERATORS.contains(&th.operator.as_str()) {
                violations.push(format!(
                    "indicator {name}: threshold operator {} is not one of {}",
                    th.operator,
                    VALID_OPERATORS.join(", ")
                ));
            }
        }

        if let Err(reason) = validate_highlight(&ind.display.highlight) {
            violations.push(format!("indicator {name}: {reason}"));
        }

        for var in &ind.vars {
            self.check_variable(var, name, violations);
        }
    }

    fn check_variable(&self, var: &Variable, owner: &str, violations: &mut Vec<String>) {
        if var.name.is_empty() {
            violations.push(format!("{owner}: variable name is required"));
        }
        if !VALID_VAR_TYPES.contains(&var.var_type.as_str()) {
            violations.push(format!(
                "{owner}: variable {} type must be one of {}",
                var.name,
                VALID_VAR_TYPES.join(", ")
            ));
        }
        if var.var_type == "enum" && var.enum_values.is_empty() {
            violations.push(format!(
                "{owner}: enum variable {} declares no enum_values",
                var.name
            ));
        }
    }
}

/// Enforce threshold ordering: no duplicate level, and levels must appear in
/// non-decreasing priority order (more severe levels first). This guarantee
/// is what makes the evaluator's "first match wins" unambiguous.
pub fn validate_threshold_order(ind: &Indicator) -> Result<(), String> {
    let mut seen = HashSet::new();
    let mut last_priority = 0u8;

    for th in &ind.thresholds {
        let priority = level_priority(&th.level)
            .ok_or_else(|| format!("invalid threshold level: {}", th.level))?;

        if !seen.insert(th.level.clone()) {
            return Err(format!("duplicate threshold level: {}", th.level));
        }

        if priority < last_priority {
            return Err(format!(
                "threshold order: {} (priority {priority}) must not follow {} (priority {last_priority})",
                th.level,
                level_by_priority(last_priority),
            ));
        }
        last_priority = priority;
    }
    Ok(())
}

/// Enforce highlight shape: an enabled highlight needs at least one
/// condition, and each condition's `value`/`operator` must be specified
/// together or not at all.
pub fn validate_highlight(config: &HighlightConfig) -> Result<(), String> {
    if !config.enabled {
        return Ok(());
    }
    if config.conditions.is_empty() {
        return Err("enabled highlight needs at least one condition".to_string());
    }
    for cond in &config.conditions {
        if cond.operator.is_empty() != cond.value.is_none() {
            return Err(
                "highlight condition must set value and operator together or not at all"
                    .to_string(),
            );
        }
        if !cond.operator.is_empty() && !VALID_OPERATORS.contains(&cond.operator.as_str()) {
            return Err(format!(
                "highlight condition operator {} is not one of {}",
                cond.operator,
                VALID_OPERATORS.join(", ")
            ));
        }
    }
    Ok(())
}

/* --------------------------------------------------------------------------
   Cron expression validation
   -------------------------------------------------------------------------- */

/// Inclusive numeric bounds for the five standard cron fields.
const CRON_FIELD_BOUNDS: [(u32, u32); 5] = [(0, 59), (0, 23), (1, 31), (1, 12), (0, 6)];

const CRON_DESCRIPTORS: &[&str] = &[
    "@yearly", "@annually", "@monthly", "@weekly", "@daily", "@midnight", "@hourly",
];

/// Validate a standard five-field cron expression (or an `@` descriptor).
/// Shape only; the expression is never executed here.
pub fn validate_cron(expr: &str) -> Result<(), String> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err("cron expression is required".to_string());
    }
    if expr.starts_with('@') {
        if CRON_DESCRIPTORS.contains(&expr) {
            return Ok(());
        }
        return Err(format!("unknown cron descriptor: {expr}"));
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!(
            "expected 5 cron fields, got {} in {expr:?}",
            fields.len()
        ));
    }
    for (field, (min, max)) in fields.iter().zip(CRON_FIELD_BOUNDS) {
        validate_cron_field(field, min, max)
            .map_err(|reason| format!("field {field:?}: {reason}"))?;
    }
    Ok(())
}

fn validate_cron_field(field: &str, min: u32, max: u32) -> Result<(), String> {
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (part, None),
        };
        if let Some(step) = step {
            let step: u32 = step
                .parse()
                .map_err(|_| format!("step {step:?} is not a number"))?;
            if step == 0 {
                return Err("step must be positive".to_string());
            }
        }
        match range {
            "*" => {}
            _ => match range.split_once('-') {
                Some((lo, hi)) => {
                    let lo = parse_cron_value(lo, min, max)?;
                    let hi = parse_cron_value(hi, min, max)?;
                    if lo > hi {
                        return Err(format!("range {lo}-{hi} is inverted"));
                    }
                }
                None => {
                    parse_cron_value(range, min, max)?;
                }
            },
        }
    }
    Ok(())
}

fn parse_cron_value(value: &str, min: u32, max: u32) -> Result<u32, String> {
    let n: u32 = value
        .parse()
        .map_err(|_| format!("{value:?} is not a number"))?;
    if n < min || n > max {
        return Err(format!("{n} is outside {min}-{max}"));
    }
    Ok(n)
}
