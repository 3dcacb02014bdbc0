//! Per-indicator pipeline and whole-template report assembly.
//!
//! `run_indicator` is the full pipeline for one indicator: variable
//! resolution, query rendering, backend query, aggregation, finalization.
//! `run_template` drives it across a template with skip-and-continue
//! semantics: one indicator's variable or query failure is logged and does
//! not abort the others.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;

use crate::aggregate::{ResultAggregator, SampleSink};
use crate::backend::MetricsBackend;
use crate::error::CoreError;
use crate::result::{Report, ReportTemplate, SummaryOverview};
use crate::template::{Indicator, Template, KIND_RANGE, KIND_TREND};
use crate::vars;

/// Step used for range queries when the indicator declares no resolution.
const DEFAULT_STEP: Duration = Duration::from_secs(60);

/// Window used when neither the indicator nor the template declares a
/// parsable time range.
const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

/// Caller-supplied variable overrides, keyed by variable name.
pub type QueryInput = HashMap<String, String>;

/// Parse a compact duration like `30s`, `5m`, `2h` or `1d`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() || !s.is_char_boundary(s.len() - 1) {
        return None;
    }
    let (digits, unit) = s.split_at(s.len() - 1);
    let scale = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return s.parse::<u64>().ok().map(Duration::from_secs),
    };
    let n: u64 = digits.parse().ok()?;
    Some(Duration::from_secs(n * scale))
}

fn query_window(template: &Template, indicator: &Indicator) -> Duration {
    let range = if indicator.time_range.is_empty() {
        &template.time_range
    } else {
        &indicator.time_range
    };
    parse_duration(range).unwrap_or_else(|| {
        tracing::warn!(
            indicator = %indicator.name,
            time_range = %range,
            "Unparsable time range, falling back to 1h window",
        );
        DEFAULT_WINDOW
    })
}

/// Run the full pipeline for one indicator and return its result.
pub async fn run_indicator<B: MetricsBackend + ?Sized>(
    backend: &B,
    template: &Template,
    indicator: &Indicator,
    input: &QueryInput,
) -> Result<crate::result::IndicatorResult, CoreError> {
    let query = vars::render_query(template, indicator, input)?;
    tracing::debug!(indicator = %indicator.name, query = %query, "Rendered query");

    let mut aggregator = ResultAggregator::new(indicator);
    let now = Utc::now();

    if indicator.kind == KIND_RANGE || indicator.kind == KIND_TREND {
        let window = query_window(template, indicator);
        let step = parse_duration(&indicator.resolution).unwrap_or(DEFAULT_STEP);
        let start = now
            - chrono::Duration::from_std(window)
                .map_err(|e| CoreError::Validation(format!("time range out of bounds: {e}")))?;
        let series = backend
            .range_query(&query, start, now, step)
            .await
            .map_err(CoreError::Backend)?;
        for s in &series {
            aggregator.series(&s.labels, &s.points);
        }
    } else {
        let samples = backend
            .instant_query(&query, now)
            .await
            .map_err(CoreError::Backend)?;
        for s in &samples {
            aggregator.scalar_sample(&s.labels, s.value);
        }
    }

    Ok(aggregator.finalize())
}

/// Run every indicator of a template and assemble the report.
///
/// Indicators are independent: a failed one is logged and skipped so the
/// rest of the report still renders.
pub async fn run_template<B: MetricsBackend + ?Sized>(
    backend: &B,
    template: &Template,
    input: &QueryInput,
    executed_by: &str,
) -> Report {
    let mut overviews = Vec::new();
    let mut results = Vec::new();

    for indicator in &template.indicators {
        match run_indicator(backend, template, indicator, input).await {
            Ok(result) => {
                overviews.push(SummaryOverview {
                    indicator: result.indicator.clone(),
                    unit: result.unit.clone(),
                    total: result.summary.total,
                    ok: result.summary.ok,
                    warning: result.summary.warning,
                    critical: result.summary.critical,
                    missing: result.summary.missing,
                });
                results.push(result);
            }
            Err(e) => {
                tracing::warn!(
                    indicator = %indicator.name,
                    error = %e,
                    "Indicator failed, continuing with the rest of the report",
                );
            }
        }
    }

    Report {
        template: ReportTemplate {
            name: template.template_name.clone(),
            display_name: template.display_name.clone(),
            executed_at: Utc::now(),
            executed_by: executed_by.to_string(),
        },
        summary_overviews: overviews,
        sections: template.report_layout.sections.clone(),
        results,
    }
}
