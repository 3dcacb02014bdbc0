//! One-shot inspection runner.
//!
//! Loads a report template from disk, runs every indicator against a
//! Prometheus server and prints the assembled report as JSON on stdout.
//! Configuration comes from the environment (and a `.env` file when
//! present):
//!
//! - `PROM_URL`          -- base URL of the Prometheus server (required)
//! - `TEMPLATE_PATH`     -- path to the template YAML file (required)
//! - `PROM_TIMEOUT_SECS` -- per-request timeout, default 30
//! - `EXECUTED_BY`       -- recorded in the report header, default `cli`

use std::collections::HashMap;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use patrol_core::runner::{run_template, QueryInput};
use patrol_core::template::parse_template_file;
use patrol_prom::PromClient;

/// Runner configuration, read once at startup.
struct RunnerConfig {
    prom_url: String,
    template_path: String,
    timeout: Duration,
    executed_by: String,
}

impl RunnerConfig {
    /// Read configuration from the environment. Panics on missing required
    /// variables; misconfiguration should fail fast.
    fn from_env() -> Self {
        let prom_url = std::env::var("PROM_URL").expect("PROM_URL must be set");
        let template_path =
            std::env::var("TEMPLATE_PATH").expect("TEMPLATE_PATH must be set");
        let timeout_secs: u64 = std::env::var("PROM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let executed_by =
            std::env::var("EXECUTED_BY").unwrap_or_else(|_| "cli".to_string());

        Self {
            prom_url,
            template_path,
            timeout: Duration::from_secs(timeout_secs),
            executed_by,
        }
    }
}

/// Collect `NAME=value` variable overrides from the command line.
fn parse_overrides(args: impl Iterator<Item = String>) -> QueryInput {
    let mut input = HashMap::new();
    for arg in args {
        match arg.split_once('=') {
            Some((name, value)) if !name.is_empty() => {
                input.insert(name.to_string(), value.to_string());
            }
            _ => {
                tracing::warn!(arg = %arg, "Ignoring argument, expected NAME=value");
            }
        }
    }
    input
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "patrol=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // --- Configuration ---
    let config = RunnerConfig::from_env();
    tracing::info!(
        prom_url = %config.prom_url,
        template_path = %config.template_path,
        "Loaded runner configuration"
    );

    let input = parse_overrides(std::env::args().skip(1));

    // --- Template ---
    let template = parse_template_file(&config.template_path)?;
    tracing::info!(
        template = %template.template_name,
        indicators = template.indicators.len(),
        "Template loaded and validated"
    );

    // --- Backend ---
    let client = PromClient::with_timeout(config.prom_url.as_str(), config.timeout)?;

    // --- Run ---
    let report = run_template(&client, &template, &input, &config.executed_by).await;
    tracing::info!(
        indicators = report.results.len(),
        "Report assembled"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
