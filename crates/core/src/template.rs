//! Inspection template data model (matches the YAML document) and parsing.
//!
//! A template is parsed once per inspection run and is immutable thereafter.
//! All structural validation happens at parse time through an explicit
//! [`TemplateValidator`](crate::validate::TemplateValidator) instance; a
//! template that parses is fully usable.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::CoreError;
use crate::validate::TemplateValidator;

/* --------------------------------------------------------------------------
   Threshold levels
   -------------------------------------------------------------------------- */

/// Highest-severity status level.
pub const LEVEL_CRITICAL: &str = "critical";

/// Second-highest severity.
pub const LEVEL_WARNING: &str = "warning";

/// Informational level.
pub const LEVEL_INFO: &str = "info";

/// Default status when no threshold matches.
pub const LEVEL_OK: &str = "ok";

/// All valid threshold levels, most severe first.
pub const VALID_LEVELS: &[&str] = &[LEVEL_CRITICAL, LEVEL_WARNING, LEVEL_INFO, LEVEL_OK];

/// Priority of a threshold level. Lower value means higher severity; the
/// evaluator requires thresholds declared in non-decreasing priority order.
///
/// Returns `None` for unknown levels.
pub fn level_priority(level: &str) -> Option<u8> {
    match level {
        LEVEL_CRITICAL => Some(1),
        LEVEL_WARNING => Some(2),
        LEVEL_INFO => Some(3),
        LEVEL_OK => Some(4),
        _ => None,
    }
}

/// Level name for a priority value (for error messages).
pub fn level_by_priority(priority: u8) -> &'static str {
    match priority {
        1 => LEVEL_CRITICAL,
        2 => LEVEL_WARNING,
        3 => LEVEL_INFO,
        4 => LEVEL_OK,
        _ => "unknown",
    }
}

/* --------------------------------------------------------------------------
   Operators, highlight logic and limits
   -------------------------------------------------------------------------- */

pub const OP_GT: &str = "gt";
pub const OP_GTE: &str = "gte";
pub const OP_LT: &str = "lt";
pub const OP_LTE: &str = "lte";
pub const OP_EQ: &str = "eq";

/// All valid comparison operators.
pub const VALID_OPERATORS: &[&str] = &[OP_GT, OP_GTE, OP_LT, OP_LTE, OP_EQ];

/// Highlight logic: every condition must match.
pub const LOGIC_AND: &str = "and";

/// Highlight logic: at least one condition must match. Default when the
/// logic field is empty.
pub const LOGIC_OR: &str = "or";

/// Highlight limit keyword for "no limit".
pub const LIMIT_ALL: &str = "all";

/// Prefix for `top_N` highlight limits.
pub const LIMIT_TOP_PREFIX: &str = "top_";

/// Prefix for `bottom_N` highlight limits.
pub const LIMIT_BOTTOM_PREFIX: &str = "bottom_";

/* --------------------------------------------------------------------------
   Sources, indicator kinds and display types
   -------------------------------------------------------------------------- */

pub const SOURCE_PROMETHEUS: &str = "prometheus";
pub const SOURCE_ELASTICSEARCH: &str = "elasticsearch";
pub const SOURCE_METADATA: &str = "metadata";

pub const VALID_SOURCES: &[&str] = &[SOURCE_PROMETHEUS, SOURCE_ELASTICSEARCH, SOURCE_METADATA];

/// Instantaneous single-value indicator (instant query).
pub const KIND_POINT: &str = "point";

/// Windowed indicator evaluated over a time range (range query).
pub const KIND_RANGE: &str = "range";

/// Trend indicator evaluated over a time range (range query).
pub const KIND_TREND: &str = "trend";

/// List of firing alerts (instant query).
pub const KIND_ALERT_LIST: &str = "alert_list";

pub const VALID_KINDS: &[&str] = &[KIND_POINT, KIND_RANGE, KIND_TREND, KIND_ALERT_LIST];

/// Display chart types. Opaque labels passed through to the report.
pub const VALID_DISPLAY_TYPES: &[&str] =
    &["table", "line_chart", "status_light", "bar_chart", "heatmap"];

/// Valid declared variable types.
pub const VALID_VAR_TYPES: &[&str] = &["string", "number", "boolean", "enum"];

/* --------------------------------------------------------------------------
   Data model
   -------------------------------------------------------------------------- */

/// Root of an inspection template document.
#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub template_name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub created_by: String,
    pub schedule: Schedule,
    /// Global default time range, e.g. `"1h"`.
    pub time_range: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub target_registry: Option<TargetRegistry>,
    /// Global variables, visible to every indicator.
    #[serde(default)]
    pub vars: Vec<Variable>,
    pub indicators: Vec<Indicator>,
    pub report_layout: ReportLayout,
}

/// Cron trigger definition. Validated for shape at parse time; actually
/// scheduling runs is the caller's concern.
#[derive(Debug, Clone, Deserialize)]
pub struct Schedule {
    pub cron: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Where the inspected target inventory comes from.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetRegistry {
    pub source: String,
    #[serde(default)]
    pub query: HashMap<String, serde_yaml::Value>,
}

/// One named metric/query definition with thresholds and display rules.
#[derive(Debug, Clone, Deserialize)]
pub struct Indicator {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub source: String,
    /// Indicator kind, see [`VALID_KINDS`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Query template string; opaque to the renderer.
    pub query: String,
    /// Optional override of the template-level time range.
    #[serde(default)]
    pub time_range: String,
    /// Range query step, e.g. `"30s"`.
    #[serde(default)]
    pub resolution: String,
    /// Ordered by severity: most severe level first. Enforced at parse time.
    #[serde(default)]
    pub thresholds: Vec<Threshold>,
    #[serde(default)]
    pub required: bool,
    pub display: Display,
    /// Indicator-scoped variables. May reference global variables.
    #[serde(default)]
    pub vars: Vec<Variable>,
}

/// A single classification rule.
#[derive(Debug, Clone, Deserialize)]
pub struct Threshold {
    pub level: String,
    pub value: f64,
    pub operator: String,
    /// Human description, surfaced in the report's `status_mapping`.
    #[serde(default)]
    pub description: String,
}

/// A declared template variable.
///
/// Resolution priority: caller-supplied input > `value` > `default_value`.
#[derive(Debug, Clone, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enum_values: Vec<String>,
}

/// Rendering hints for an indicator's result.
#[derive(Debug, Clone, Deserialize)]
pub struct Display {
    /// Chart type, see [`VALID_DISPLAY_TYPES`].
    #[serde(rename = "type")]
    pub display_type: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub group_by: String,
    #[serde(default)]
    pub missing_indicator: bool,
    #[serde(default)]
    pub summary_mode: String,
    #[serde(default)]
    pub page_size: i64,
    /// Field projection passed through to the report.
    #[serde(default)]
    pub fields: Vec<HashMap<String, String>>,
    #[serde(default)]
    pub highlight: HighlightConfig,
}

/// Declarative highlight specification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HighlightConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `all`, `top_N` or `bottom_N`. A malformed limit resolves to `all`
    /// rather than erroring.
    #[serde(default)]
    pub limit: String,
    /// `and` or `or`. Empty defaults to `or`.
    #[serde(default)]
    pub logic: String,
    #[serde(default)]
    pub conditions: Vec<HighlightCondition>,
}

/// One highlight filter condition. `value` and `operator` must be specified
/// together or not at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HighlightCondition {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Ordered report sections referencing indicators by name.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportLayout {
    pub sections: Vec<Section>,
}

/// A named report section. Layout only; carries no result data.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct Section {
    pub title: String,
    pub include: Vec<String>,
}

/* --------------------------------------------------------------------------
   Parsing
   -------------------------------------------------------------------------- */

/// Parse and validate a template from YAML text.
pub fn parse_template_str(data: &str) -> Result<Template, CoreError> {
    let template: Template = serde_yaml::from_str(data)
        .map_err(|e| CoreError::Validation(format!("yaml unmarshal: {e}")))?;
    TemplateValidator::new().validate(&template)?;
    Ok(template)
}

/// Parse and validate a template from a YAML file on disk.
pub fn parse_template_file(path: impl AsRef<Path>) -> Result<Template, CoreError> {
    let data = std::fs::read_to_string(path.as_ref())
        .map_err(|e| CoreError::Validation(format!("read template: {e}")))?;
    parse_template_str(&data)
}
