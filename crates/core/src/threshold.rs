//! Threshold classification. Pure logic, no I/O.
//!
//! Thresholds are walked in their declared order and the first matching rule
//! wins. The parse-time ordering validation in [`crate::validate`] (most
//! severe first, no duplicates) is what makes first-match-wins unambiguous.

use crate::template::{Threshold, LEVEL_OK, OP_EQ, OP_GT, OP_GTE, OP_LT, OP_LTE};

/// Classify a sample against an ordered threshold list.
///
/// Returns the level of the first threshold whose condition is satisfied, or
/// [`LEVEL_OK`] when none match (including the empty list).
pub fn classify<'a>(value: f64, thresholds: &'a [Threshold]) -> &'a str {
    for th in thresholds {
        if meets_condition(value, &th.operator, th.value) {
            return &th.level;
        }
    }
    LEVEL_OK
}

/// Whether `value` satisfies `(operator, threshold)`.
///
/// Standard floating-point semantics; `eq` is exact, no epsilon. An unknown
/// operator never matches.
pub fn meets_condition(value: f64, operator: &str, threshold: f64) -> bool {
    match operator {
        OP_GT => value > threshold,
        OP_GTE => value >= threshold,
        OP_LT => value < threshold,
        OP_LTE => value <= threshold,
        OP_EQ => value == threshold,
        _ => false,
    }
}
