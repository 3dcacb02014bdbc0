//! Report wire shape.
//!
//! Field names and nesting are the de-facto contract for downstream
//! consumers; the snake_case keys must be preserved bit-for-bit.

use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::template::Section;

/// The atomic unit of a rendered result: one monitored target's current
/// value and its threshold classification.
///
/// `missing = true` implies `value = null` and an empty status.
#[derive(Debug, Clone, Serialize)]
pub struct ValueItem {
    pub target: String,
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(skip_serializing_if = "is_false")]
    pub missing: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Running per-status tally over all pre-pagination value items.
/// `total` always equals the number of items; the per-status counts sum to
/// `total`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub total: usize,
    pub ok: usize,
    pub info: usize,
    pub warning: usize,
    pub critical: usize,
    pub missing: usize,
}

/// Pagination metadata for one result page.
#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub size: i64,
    pub index: i64,
    pub has_more: bool,
}

/// The curated highlight subset for one indicator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HighlightInfo {
    pub enabled: bool,
    pub values: Vec<ValueItem>,
}

/// One indicator's rendered, classified, paginated result.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorResult {
    pub indicator: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub unit: String,
    pub display_type: String,
    pub summary: Summary,
    pub page: PageInfo,
    pub highlight: HighlightInfo,
    pub values: Vec<ValueItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<HashMap<String, String>>,
    /// Level -> human description, taken from the indicator's threshold
    /// descriptions. BTreeMap keeps the serialized key order stable.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub status_mapping: BTreeMap<String, String>,
}

/// Per-indicator counts surfaced at the top of the report.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOverview {
    pub indicator: String,
    pub unit: String,
    pub total: usize,
    pub ok: usize,
    pub warning: usize,
    pub critical: usize,
    pub missing: usize,
}

/// Template identity and execution metadata at the head of a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportTemplate {
    pub name: String,
    pub display_name: String,
    pub executed_at: DateTime<Utc>,
    pub executed_by: String,
}

/// The complete inspection report for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub template: ReportTemplate,
    pub summary_overviews: Vec<SummaryOverview>,
    /// Layout only; results are matched to sections by indicator name.
    pub sections: Vec<Section>,
    pub results: Vec<IndicatorResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_item_serializes_null_value_without_status() {
        let item = ValueItem {
            target: "node-1".to_string(),
            value: None,
            status: String::new(),
            missing: true,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["target"], "node-1");
        assert_eq!(json["value"], serde_json::Value::Null);
        assert_eq!(json["missing"], true);
        assert!(json.get("status").is_none());
    }

    #[test]
    fn healthy_item_omits_missing_flag() {
        let item = ValueItem {
            target: "node-2".to_string(),
            value: Some(42.5),
            status: "ok".to_string(),
            missing: false,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["value"], 42.5);
        assert_eq!(json["status"], "ok");
        assert!(json.get("missing").is_none());
    }

    #[test]
    fn result_uses_the_wire_field_names() {
        let result = IndicatorResult {
            indicator: "cpu_usage".to_string(),
            kind: "point".to_string(),
            description: String::new(),
            unit: "%".to_string(),
            display_type: "table".to_string(),
            summary: Summary::default(),
            page: PageInfo {
                size: 20,
                index: 1,
                has_more: false,
            },
            highlight: HighlightInfo::default(),
            values: Vec::new(),
            fields: Vec::new(),
            status_mapping: BTreeMap::new(),
        };
        let json = serde_json::to_value(&result).unwrap();
        for key in [
            "indicator",
            "type",
            "description",
            "unit",
            "display_type",
            "summary",
            "page",
            "highlight",
            "values",
        ] {
            assert!(json.get(key).is_some(), "missing wire key {key}");
        }
        // description is part of the wire contract even when empty.
        assert_eq!(json["description"], "");
        assert_eq!(json["page"]["has_more"], false);
    }
}
