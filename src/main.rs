//! INP Rollup Engine
//!
//! Daily batch entry point, invoked once per day by an external scheduler:
//! - builds the prior day's rollups (or a specific day passed as `YYYY-MM-DD`)
//! - sweeps both stores against their retention horizons
//! - flushes internal metrics and exits non-zero on failure so the scheduler
//!   retries on its next invocation

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};

use clickhouse_store::{insert_metrics, ClickHouseClient, ClickHouseConfig};
use rollup_core::{EventStore, RetentionConfig, RollupStore};
use rollup_worker::DailyJob;
use telemetry::{health, init_tracing_from_env, metrics};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
struct Config {
    #[serde(default)]
    retention: RetentionConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!("Starting INP rollup engine v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config()?;

    // Optional day override for rebuilds; default is the prior UTC day.
    let day_override = parse_day_arg()?;

    // Initialize ClickHouse client
    let client =
        ClickHouseClient::new(config.clickhouse.clone()).context("Failed to create ClickHouse client")?;

    // Initialize schema
    if let Err(e) = clickhouse_store::health::init_schema(&client).await {
        error!("Failed to initialize ClickHouse schema: {}", e);
        // Continue anyway - schema might already exist
    }

    // Check health and update status
    if clickhouse_store::health::check_connection(&client).await {
        health().storage.set_healthy();
        info!("ClickHouse connection: healthy");
    } else {
        health().storage.set_unhealthy("Connection failed");
        error!("ClickHouse connection: unhealthy");
    }

    let store = Arc::new(client.clone());
    let events: Arc<dyn EventStore> = store.clone();
    let rollups: Arc<dyn RollupStore> = store;

    let job = DailyJob::new(events, rollups, config.retention);

    let now = Utc::now();
    let result = match day_override {
        Some(day) => job.run_for_day(day, now).await,
        None => job.run(now).await,
    };

    // Flush internal metrics whether or not the run succeeded.
    if let Err(e) = insert_metrics(&client, metrics().snapshot()).await {
        warn!("Failed to flush metrics: {}", e);
    }

    let report = result.context("Daily batch run failed")?;

    info!(
        day = %report.rollup.day,
        rollup_rows = report.rollup.rows_written,
        events_aggregated = report.rollup.events_aggregated,
        native = report.rollup.native,
        raw_pruned = report.prune.raw_deleted,
        rollups_pruned = report.prune.rollups_deleted,
        "Daily batch run complete"
    );

    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("INPD")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Manual overrides for nested ClickHouse config; the config crate's
    // nested parsing doesn't work reliably with underscored field names.
    if let Ok(url) = std::env::var("INPD_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(database) = std::env::var("INPD_CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("INPD_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("INPD_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }

    // Retention horizon overrides
    if let Ok(days) = std::env::var("INPD_RAW_RETENTION_DAYS") {
        config.retention.raw_retention_days =
            Some(days.parse().context("Invalid INPD_RAW_RETENTION_DAYS")?);
    }
    if let Ok(days) = std::env::var("INPD_ROLLUP_RETENTION_DAYS") {
        config.retention.rollup_retention_days =
            Some(days.parse().context("Invalid INPD_ROLLUP_RETENTION_DAYS")?);
    }

    Ok(config)
}

/// Parse an optional `YYYY-MM-DD` rebuild day from the command line.
fn parse_day_arg() -> Result<Option<NaiveDate>> {
    match std::env::args().nth(1) {
        Some(arg) => {
            let day = NaiveDate::parse_from_str(&arg, "%Y-%m-%d")
                .with_context(|| format!("Invalid day argument '{}', expected YYYY-MM-DD", arg))?;
            Ok(Some(day))
        }
        None => Ok(None),
    }
}
