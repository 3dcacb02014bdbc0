//! Active-target grouping and statistics. Pure functions over one
//! inventory snapshot.

use std::collections::{BTreeMap, HashMap};

use patrol_core::backend::ActiveTarget;

/// Target is being scraped successfully.
pub const HEALTH_UP: &str = "up";

/// Target failed its last scrape.
pub const HEALTH_DOWN: &str = "down";

/// Health not yet determined.
pub const HEALTH_UNKNOWN: &str = "unknown";

/// Targets sharing one scrape pool.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TargetsByPool {
    pub scrape_pool: String,
    #[serde(skip)]
    pub targets: Vec<ActiveTarget>,
}

/// Per-pool health counts.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PoolStats {
    pub scrape_pool: String,
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub unknown: usize,
}

/// Group one inventory snapshot by scrape pool. Pool order is sorted so the
/// output is deterministic.
pub fn group_by_pool(targets: Vec<ActiveTarget>) -> Vec<TargetsByPool> {
    group_by_pool_filtered(targets, |_| true)
}

/// Group by scrape pool, keeping only targets accepted by `keep`. Pools
/// left empty by the filter are dropped.
pub fn group_by_pool_filtered(
    targets: Vec<ActiveTarget>,
    keep: impl Fn(&ActiveTarget) -> bool,
) -> Vec<TargetsByPool> {
    let mut pools: BTreeMap<String, Vec<ActiveTarget>> = BTreeMap::new();
    for target in targets {
        if keep(&target) {
            pools.entry(target.scrape_pool.clone()).or_default().push(target);
        }
    }
    pools
        .into_iter()
        .map(|(scrape_pool, targets)| TargetsByPool {
            scrape_pool,
            targets,
        })
        .collect()
}

/// Only targets whose last scrape succeeded.
pub fn online_by_pool(targets: Vec<ActiveTarget>) -> Vec<TargetsByPool> {
    group_by_pool_filtered(targets, |t| t.health == HEALTH_UP)
}

/// Only targets whose last scrape failed.
pub fn offline_by_pool(targets: Vec<ActiveTarget>) -> Vec<TargetsByPool> {
    group_by_pool_filtered(targets, |t| t.health == HEALTH_DOWN)
}

/// Health counts per scrape pool, sorted by pool name.
pub fn pool_stats(targets: &[ActiveTarget]) -> Vec<PoolStats> {
    let mut stats: BTreeMap<&str, PoolStats> = BTreeMap::new();
    for target in targets {
        let entry = stats
            .entry(target.scrape_pool.as_str())
            .or_insert_with(|| PoolStats {
                scrape_pool: target.scrape_pool.clone(),
                ..Default::default()
            });
        entry.total += 1;
        match target.health.as_str() {
            HEALTH_UP => entry.online += 1,
            HEALTH_DOWN => entry.offline += 1,
            _ => entry.unknown += 1,
        }
    }
    stats.into_values().collect()
}

/// Overall count of targets per health state.
pub fn health_summary(targets: &[ActiveTarget]) -> HashMap<String, usize> {
    let mut summary = HashMap::new();
    for target in targets {
        *summary.entry(target.health.clone()).or_insert(0) += 1;
    }
    summary
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn target(pool: &str, instance: &str, health: &str) -> ActiveTarget {
        ActiveTarget {
            scrape_pool: pool.to_string(),
            labels: [
                ("job".to_string(), pool.to_string()),
                ("instance".to_string(), instance.to_string()),
            ]
            .into_iter()
            .collect(),
            health: health.to_string(),
            scrape_url: format!("http://{instance}/metrics"),
            last_error: String::new(),
        }
    }

    fn inventory() -> Vec<ActiveTarget> {
        vec![
            target("node", "node-1:9100", HEALTH_UP),
            target("node", "node-2:9100", HEALTH_DOWN),
            target("api", "api-1:8080", HEALTH_UP),
            target("api", "api-2:8080", HEALTH_UNKNOWN),
        ]
    }

    #[test]
    fn grouping_is_deterministic_and_complete() {
        let pools = group_by_pool(inventory());
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].scrape_pool, "api");
        assert_eq!(pools[1].scrape_pool, "node");
        assert_eq!(pools[1].targets.len(), 2);
    }

    #[test]
    fn health_filters_drop_empty_pools() {
        let online = online_by_pool(inventory());
        assert_eq!(online.len(), 2);
        assert!(online.iter().all(|p| p
            .targets
            .iter()
            .all(|t| t.health == HEALTH_UP)));

        let offline = offline_by_pool(inventory());
        assert_eq!(offline.len(), 1);
        assert_eq!(offline[0].scrape_pool, "node");
    }

    #[test]
    fn pool_stats_count_each_health_state() {
        let stats = pool_stats(&inventory());
        let node = stats.iter().find(|s| s.scrape_pool == "node").unwrap();
        assert_eq!(node.total, 2);
        assert_eq!(node.online, 1);
        assert_eq!(node.offline, 1);
        let api = stats.iter().find(|s| s.scrape_pool == "api").unwrap();
        assert_eq!(api.unknown, 1);
    }

    #[test]
    fn health_summary_totals_match() {
        let summary = health_summary(&inventory());
        assert_eq!(summary[HEALTH_UP], 2);
        assert_eq!(summary[HEALTH_DOWN], 1);
        assert_eq!(summary[HEALTH_UNKNOWN], 1);
    }
}
