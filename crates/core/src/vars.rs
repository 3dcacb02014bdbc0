//! Two-phase variable resolution and query rendering.
//!
//! Variable templates may reference other variables, and YAML declaration
//! order is not guaranteed to match dependency order. Phase 1 inserts every
//! marker-free raw value into the context; phase 2 renders the remaining
//! values against that context, so a variable may reference any phase-1
//! value regardless of where it was declared.
//!
//! Rendering is best-effort by design: a key missing from the context
//! substitutes an empty string instead of aborting, so one bad variable
//! cannot block unrelated indicators. Only malformed template syntax fails
//! fast.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::template::{Indicator, Template, Variable};

/// Resolved name -> value substitution context.
pub type VarContext = HashMap<String, String>;

/// Which declaration list a variable came from. Used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarScope {
    Global,
    Indicator,
}

impl std::fmt::Display for VarScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarScope::Global => write!(f, "global"),
            VarScope::Indicator => write!(f, "indicator"),
        }
    }
}

/// Context keys seeded before phase 1. Declared variables cannot overwrite
/// them.
pub const RESERVED_KEYS: &[&str] = &["IndicatorTimeRange", "GlobalTimeRange", "IndicatorName"];

/// The key consulted by query templates for the effective time range.
pub const TIME_RANGE_KEY: &str = "TimeRange";

/// Whether a raw value contains substitution markers and therefore needs a
/// phase-2 render.
fn contains_template_markers(s: &str) -> bool {
    s.contains("{{") && s.contains("}}")
}

/// Pick the raw value for a variable.
/// Priority: caller input > static `value` > `default_value`.
fn pick_raw(var: &Variable, input: &HashMap<String, String>) -> String {
    if let Some(val) = input.get(&var.name) {
        return val.clone();
    }
    if !var.value.is_empty() {
        return var.value.clone();
    }
    var.default_value.clone()
}

/// Check a resolved value against the variable's declared type.
fn validate_var_type(var: &Variable, value: &str) -> Result<(), CoreError> {
    match var.var_type.as_str() {
        "number" => {
            if value.parse::<f64>().is_err() {
                return Err(CoreError::InvalidVariable {
                    name: var.name.clone(),
                    reason: format!("{value:?} is not a number"),
                });
            }
        }
        "boolean" => {
            if value != "true" && value != "false" {
                return Err(CoreError::InvalidVariable {
                    name: var.name.clone(),
                    reason: format!("{value:?} is not true/false"),
                });
            }
        }
        "enum" => {
            if !var.enum_values.iter().any(|e| e == value) {
                return Err(CoreError::InvalidVariable {
                    name: var.name.clone(),
                    reason: format!("{value:?} is not one of {:?}", var.enum_values),
                });
            }
        }
        _ => {}
    }
    Ok(())
}

/// Resolve one declaration list into `values` using the two-phase scheme.
///
/// `values` already holds the reserved keys (and, for indicator variables,
/// everything the global pass produced), so phase-2 renders see them.
fn resolve_two_phase(
    vars: &[Variable],
    input: &HashMap<String, String>,
    values: &mut VarContext,
    scope: VarScope,
) -> Result<(), CoreError> {
    // Phase 1: marker-free raw values go straight into the context.
    for var in vars {
        let raw = pick_raw(var, input);
        if raw.is_empty() {
            if var.required {
                return Err(CoreError::MissingVariable {
                    name: var.name.clone(),
                    scope,
                });
            }
            continue;
        }
        if !contains_template_markers(&raw) {
            validate_var_type(var, &raw)?;
            insert_value(values, &var.name, raw);
        }
    }

    // Phase 2: render the remaining values against the current context.
    for var in vars {
        if values.contains_key(&var.name) && !is_reserved(&var.name) {
            continue; // resolved in phase 1
        }
        let raw = pick_raw(var, input);
        if raw.is_empty() || is_reserved(&var.name) {
            continue; // empty non-required values were handled in phase 1
        }
        let rendered = render_template(&raw, values)?;
        validate_var_type(var, &rendered)?;
        insert_value(values, &var.name, rendered);
    }

    Ok(())
}

fn is_reserved(name: &str) -> bool {
    RESERVED_KEYS.contains(&name)
}

fn insert_value(values: &mut VarContext, name: &str, value: String) {
    if is_reserved(name) {
        tracing::warn!(variable = name, "Ignoring variable shadowing a reserved context key");
        return;
    }
    values.insert(name.to_string(), value);
}

/// Build the full substitution context for one indicator.
///
/// Seeds the reserved keys, resolves global variables, then indicator
/// variables (so indicator variables may reference global ones but not vice
/// versa), and finally synthesizes `TimeRange` when no variable supplied
/// one: indicator-level time range if non-empty, else the template's global
/// time range.
pub fn build_context(
    template: &Template,
    indicator: &Indicator,
    input: &HashMap<String, String>,
) -> Result<VarContext, CoreError> {
    let mut values = VarContext::from([
        ("IndicatorTimeRange".to_string(), indicator.time_range.clone()),
        ("GlobalTimeRange".to_string(), template.time_range.clone()),
        ("IndicatorName".to_string(), indicator.name.clone()),
    ]);

    resolve_two_phase(&template.vars, input, &mut values, VarScope::Global)?;
    resolve_two_phase(&indicator.vars, input, &mut values, VarScope::Indicator)?;

    if !values.contains_key(TIME_RANGE_KEY) {
        let range = if indicator.time_range.is_empty() {
            template.time_range.clone()
        } else {
            indicator.time_range.clone()
        };
        values.insert(TIME_RANGE_KEY.to_string(), range);
    }

    Ok(values)
}

/// Resolve an indicator's variables and render its query template.
pub fn render_query(
    template: &Template,
    indicator: &Indicator,
    input: &HashMap<String, String>,
) -> Result<String, CoreError> {
    let values = build_context(template, indicator, input)?;
    render_template(&indicator.query, &values)
}

/* --------------------------------------------------------------------------
   Template rendering
   -------------------------------------------------------------------------- */

/// Substitute `{{.Name}}` / `{{Name}}` markers from the context.
///
/// An unterminated `{{` is a syntax error. A key absent from the context, or
/// marker content that is not a plain key, substitutes an empty string --
/// the deliberate best-effort leniency described in the module docs.
pub fn render_template(template: &str, values: &VarContext) -> Result<String, CoreError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let close = after_open.find("}}").ok_or_else(|| {
            CoreError::TemplateSyntax(format!("unterminated {{{{ in {template:?}"))
        })?;
        let key = after_open[..close].trim().trim_start_matches('.');
        if is_plain_key(key) {
            if let Some(value) = values.get(key) {
                out.push_str(value);
            }
        }
        rest = &after_open[close + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
