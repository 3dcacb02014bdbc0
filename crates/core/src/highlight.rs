//! Highlight filtering and ranking.
//!
//! Produces the curated top/bottom subset of value items described by a
//! [`HighlightConfig`]. A disabled config always yields an empty list so no
//! stale data can leak into the report.

use std::cmp::Ordering;

use crate::result::ValueItem;
use crate::template::{
    HighlightConfig, HighlightCondition, LIMIT_ALL, LIMIT_BOTTOM_PREFIX, LIMIT_TOP_PREFIX,
    LOGIC_AND,
};
use crate::threshold::meets_condition;

/// Parsed form of the `limit` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    All,
    Top(usize),
    Bottom(usize),
}

/// Parse a limit string: `all`, `top_N` or `bottom_N`.
///
/// Anything malformed (including a zero or unparsable suffix) resolves to
/// [`Limit::All`] rather than erroring -- a cosmetic misconfiguration must
/// not fail an entire report. Deliberate leniency; keep it.
pub fn parse_limit(limit: &str) -> Limit {
    if limit.is_empty() || limit == LIMIT_ALL {
        return Limit::All;
    }
    if let Some(n) = limit.strip_prefix(LIMIT_TOP_PREFIX) {
        if let Ok(n) = n.parse::<usize>() {
            if n > 0 {
                return Limit::Top(n);
            }
        }
    }
    if let Some(n) = limit.strip_prefix(LIMIT_BOTTOM_PREFIX) {
        if let Ok(n) = n.parse::<usize>() {
            if n > 0 {
                return Limit::Bottom(n);
            }
        }
    }
    tracing::debug!(limit, "Malformed highlight limit, treating as unlimited");
    Limit::All
}

/// Apply a highlight config to the full pre-pagination item list.
pub fn apply(values: &[ValueItem], config: &HighlightConfig) -> Vec<ValueItem> {
    if !config.enabled {
        return Vec::new();
    }

    let mut selected: Vec<ValueItem> = values
        .iter()
        .filter(|item| qualifies(item, config))
        .cloned()
        .collect();

    match parse_limit(&config.limit) {
        Limit::All => selected,
        Limit::Top(n) => {
            sort_by_value(&mut selected, true);
            selected.truncate(n);
            selected
        }
        Limit::Bottom(n) => {
            sort_by_value(&mut selected, false);
            selected.truncate(n);
            selected
        }
    }
}

/// An item qualifies if it carries a value and satisfies the condition set
/// under the configured logic (`and` = all, anything else = any).
fn qualifies(item: &ValueItem, config: &HighlightConfig) -> bool {
    if item.missing || item.value.is_none() {
        return false;
    }
    if config.conditions.is_empty() {
        return false;
    }
    if config.logic == LOGIC_AND {
        config.conditions.iter().all(|c| matches(item, c))
    } else {
        config.conditions.iter().any(|c| matches(item, c))
    }
}

fn matches(item: &ValueItem, cond: &HighlightCondition) -> bool {
    if !cond.level.is_empty() && cond.level != item.status {
        return false;
    }
    if !cond.operator.is_empty() {
        let threshold = match cond.value {
            Some(v) => v,
            // Parse-time validation pairs operator and value; an unpaired
            // operator cannot match.
            None => return false,
        };
        let value = match item.value {
            Some(v) => v,
            None => return false,
        };
        if !meets_condition(value, &cond.operator, threshold) {
            return false;
        }
    }
    true
}

/// Stable sort by value; items are pre-filtered so `value` is present.
fn sort_by_value(items: &mut [ValueItem], descending: bool) {
    items.sort_by(|a, b| {
        let ord = a
            .value
            .partial_cmp(&b.value)
            .unwrap_or(Ordering::Equal);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}
