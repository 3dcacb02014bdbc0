//! Result aggregation: raw samples in, one [`IndicatorResult`] out.
//!
//! A [`ResultAggregator`] is a single-use object: it consumes a stream of
//! raw samples/series in arbitrary delivery order, then `finalize(self)`
//! takes it by value, so feeding data after finalization or finalizing
//! twice is unrepresentable.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::backend::{LabelSet, SeriesPoint};
use crate::highlight;
use crate::paginate::{effective_page_size, paginate};
use crate::result::{HighlightInfo, IndicatorResult, PageInfo, Summary, ValueItem};
use crate::template::{Indicator, LEVEL_CRITICAL, LEVEL_INFO, LEVEL_OK, LEVEL_WARNING};
use crate::threshold::classify;

/// Receiver for raw query results, one method per raw shape.
///
/// Implemented by [`ResultAggregator`]; the query layer calls whichever
/// method matches what the backend returned.
pub trait SampleSink {
    /// One instantaneous value keyed by a label set.
    fn scalar_sample(&mut self, labels: &LabelSet, value: f64);

    /// One ordered time series keyed by a label set.
    fn series(&mut self, labels: &LabelSet, points: &[SeriesPoint]);
}

/// Accumulates classified value items for a single indicator.
#[derive(Debug)]
pub struct ResultAggregator {
    indicator: Indicator,
    values: Vec<ValueItem>,
    summary: Summary,
}

impl ResultAggregator {
    pub fn new(indicator: &Indicator) -> Self {
        Self {
            indicator: indicator.clone(),
            values: Vec::new(),
            summary: Summary::default(),
        }
    }

    /// Prefer the `instance` label, else `node`, else a deterministic
    /// rendering of the full (sorted) label set.
    fn target_name(labels: &LabelSet) -> String {
        if let Some(instance) = labels.get("instance") {
            return instance.clone();
        }
        if let Some(node) = labels.get("node") {
            return node.clone();
        }
        let pairs: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v:?}")).collect();
        format!("{{{}}}", pairs.join(", "))
    }

    fn add_item(&mut self, target: String, value: Option<f64>, missing: bool, status: String) {
        let item = ValueItem {
            target,
            value,
            status: if missing { String::new() } else { status },
            missing,
        };
        self.update_summary(&item);
        self.values.push(item);
    }

    fn update_summary(&mut self, item: &ValueItem) {
        self.summary.total += 1;
        if item.missing {
            self.summary.missing += 1;
            return;
        }
        match item.status.as_str() {
            LEVEL_CRITICAL => self.summary.critical += 1,
            LEVEL_WARNING => self.summary.warning += 1,
            LEVEL_INFO => self.summary.info += 1,
            LEVEL_OK => self.summary.ok += 1,
            // Unknown or empty status counts as ok. Explicit fallback, not
            // an error; preserved intentionally.
            _ => self.summary.ok += 1,
        }
    }

    /// Sort deterministically so the arrival order of raw samples never
    /// affects the report: value descending, missing items last, target
    /// name as the tie-breaker.
    fn sort_values(&mut self) {
        self.values.sort_by(|a, b| match (a.value, b.value) {
            (Some(x), Some(y)) => y
                .partial_cmp(&x)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.target.cmp(&b.target)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.target.cmp(&b.target),
        });
    }

    // TODO: backfill expected-but-unreported targets from the template's
    // target_registry once the metadata source is wired up.
    fn backfill_missing(&mut self) {}

    fn status_mapping(&self) -> BTreeMap<String, String> {
        self.indicator
            .thresholds
            .iter()
            .filter(|th| !th.description.is_empty())
            .map(|th| (th.level.clone(), th.description.clone()))
            .collect()
    }

    /// Fold everything into the final per-indicator result: backfill policy,
    /// highlight extraction, pagination (page 1), status mapping.
    pub fn finalize(mut self) -> IndicatorResult {
        self.backfill_missing();
        self.sort_values();

        let highlighted = highlight::apply(&self.values, &self.indicator.display.highlight);

        let page_size = effective_page_size(self.indicator.display.page_size);
        let page_index = 1;
        let (page_values, has_more) = paginate(&self.values, page_size, page_index);
        let status_mapping = self.status_mapping();

        IndicatorResult {
            indicator: self.indicator.name.clone(),
            kind: self.indicator.kind.clone(),
            description: self.indicator.description.clone(),
            unit: self.indicator.display.unit.clone(),
            display_type: self.indicator.display.display_type.clone(),
            summary: self.summary,
            page: PageInfo {
                size: page_size,
                index: page_index,
                has_more,
            },
            highlight: HighlightInfo {
                enabled: self.indicator.display.highlight.enabled,
                values: highlighted,
            },
            values: page_values,
            fields: self.indicator.display.fields.clone(),
            status_mapping,
        }
    }
}

impl SampleSink for ResultAggregator {
    fn scalar_sample(&mut self, labels: &LabelSet, value: f64) {
        let target = Self::target_name(labels);
        let status = classify(value, &self.indicator.thresholds).to_string();
        self.add_item(target, Some(value), false, status);
    }

    fn series(&mut self, labels: &LabelSet, points: &[SeriesPoint]) {
        let target = Self::target_name(labels);
        match points.last() {
            // The last point is the representative current value.
            Some(point) => {
                let status = classify(point.value, &self.indicator.thresholds).to_string();
                self.add_item(target, Some(point.value), false, status);
            }
            None => self.add_item(target, None, true, String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Display, HighlightConfig, HighlightCondition, Threshold};

    fn cpu_indicator() -> Indicator {
        Indicator {
            name: "cpu_usage".to_string(),
            description: "CPU usage per node".to_string(),
            source: "prometheus".to_string(),
            kind: "point".to_string(),
            query: "cpu_usage".to_string(),
            time_range: String::new(),
            resolution: String::new(),
            thresholds: vec![
                Threshold {
                    level: "critical".to_string(),
                    value: 90.0,
                    operator: "gt".to_string(),
                    description: "CPU above 90%".to_string(),
                },
                Threshold {
                    level: "warning".to_string(),
                    value: 75.0,
                    operator: "gt".to_string(),
                    description: "CPU above 75%".to_string(),
                },
            ],
            required: false,
            display: Display {
                display_type: "table".to_string(),
                unit: "%".to_string(),
                group_by: String::new(),
                missing_indicator: false,
                summary_mode: String::new(),
                page_size: 10,
                fields: Vec::new(),
                highlight: HighlightConfig::default(),
            },
            vars: Vec::new(),
        }
    }

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn samples_are_classified_and_tallied() {
        let mut agg = ResultAggregator::new(&cpu_indicator());
        agg.scalar_sample(&labels(&[("instance", "node-1")]), 95.0);
        agg.scalar_sample(&labels(&[("instance", "node-2")]), 80.0);
        agg.scalar_sample(&labels(&[("instance", "node-3")]), 50.0);

        let result = agg.finalize();
        assert_eq!(result.summary.total, 3);
        assert_eq!(result.summary.critical, 1);
        assert_eq!(result.summary.warning, 1);
        assert_eq!(result.summary.ok, 1);
        // Sorted descending by value.
        assert_eq!(result.values[0].status, "critical");
        assert_eq!(result.values[2].status, "ok");
    }

    #[test]
    fn empty_series_becomes_a_missing_item() {
        let mut agg = ResultAggregator::new(&cpu_indicator());
        agg.series(&labels(&[("instance", "node-9")]), &[]);

        let result = agg.finalize();
        assert_eq!(result.summary.total, 1);
        assert_eq!(result.summary.missing, 1);
        assert_eq!(result.values[0].target, "node-9");
        assert!(result.values[0].missing);
        assert_eq!(result.values[0].value, None);
        assert!(result.values[0].status.is_empty());
    }

    #[test]
    fn series_uses_the_last_point() {
        let mut agg = ResultAggregator::new(&cpu_indicator());
        let points = [
            SeriesPoint { timestamp: 1.0, value: 10.0 },
            SeriesPoint { timestamp: 2.0, value: 50.0 },
            SeriesPoint { timestamp: 3.0, value: 92.0 },
        ];
        agg.series(&labels(&[("instance", "node-1")]), &points);

        let result = agg.finalize();
        assert_eq!(result.values[0].value, Some(92.0));
        assert_eq!(result.values[0].status, "critical");
    }

    #[test]
    fn target_naming_prefers_instance_then_node() {
        assert_eq!(
            ResultAggregator::target_name(&labels(&[("instance", "i-1"), ("node", "n-1")])),
            "i-1"
        );
        assert_eq!(
            ResultAggregator::target_name(&labels(&[("node", "n-1")])),
            "n-1"
        );
        // Deterministic rendering of the full sorted label set.
        assert_eq!(
            ResultAggregator::target_name(&labels(&[("job", "api"), ("env", "prod")])),
            "{env=\"prod\", job=\"api\"}"
        );
    }

    #[test]
    fn arrival_order_does_not_change_the_result() {
        let run = |order: &[f64]| {
            let mut agg = ResultAggregator::new(&cpu_indicator());
            for (i, v) in order.iter().enumerate() {
                agg.scalar_sample(&labels(&[("instance", &format!("node-{v}-{i}"))]), *v);
            }
            let result = agg.finalize();
            result
                .values
                .iter()
                .map(|item| item.value.unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(&[50.0, 95.0, 80.0]), run(&[95.0, 80.0, 50.0]));
    }

    #[test]
    fn finalize_populates_status_mapping_and_page() {
        let mut indicator = cpu_indicator();
        indicator.display.highlight = HighlightConfig {
            enabled: true,
            limit: "top_1".to_string(),
            conditions: vec![HighlightCondition {
                level: "critical".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut agg = ResultAggregator::new(&indicator);
        agg.scalar_sample(&labels(&[("instance", "node-1")]), 95.0);
        agg.scalar_sample(&labels(&[("instance", "node-2")]), 40.0);

        let result = agg.finalize();
        assert_eq!(result.status_mapping["critical"], "CPU above 90%");
        assert_eq!(result.status_mapping["warning"], "CPU above 75%");
        assert_eq!(result.page.size, 10);
        assert_eq!(result.page.index, 1);
        assert!(!result.page.has_more);
        assert!(result.highlight.enabled);
        assert_eq!(result.highlight.values.len(), 1);
        assert_eq!(result.highlight.values[0].target, "node-1");
    }

    #[test]
    fn pagination_truncates_the_values_but_not_the_summary() {
        let mut indicator = cpu_indicator();
        indicator.display.page_size = 2;
        let mut agg = ResultAggregator::new(&indicator);
        for i in 0..5 {
            agg.scalar_sample(&labels(&[("instance", &format!("node-{i}"))]), i as f64);
        }
        let result = agg.finalize();
        assert_eq!(result.values.len(), 2);
        assert!(result.page.has_more);
        assert_eq!(result.summary.total, 5);
    }
}
