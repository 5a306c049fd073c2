//! Environment-driven configuration for the sync worker

use anyhow::Context;
use services::{ConflictPolicy, ImportWorkerConfig};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub import: ImportWorkerConfig,
    pub conflict_policy: ConflictPolicy,
    pub metrics_port: u16,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let defaults = ImportWorkerConfig::default();
        let import = ImportWorkerConfig {
            interval: Duration::from_secs(parse_env(
                "ORBITA_SYNC_INTERVAL_SECS",
                defaults.interval.as_secs(),
            )?),
            look_ahead_days: parse_env("ORBITA_SYNC_LOOKAHEAD_DAYS", defaults.look_ahead_days)?,
            batch_size: parse_env("ORBITA_SYNC_BATCH_SIZE", defaults.batch_size)?,
            max_errors: parse_env("ORBITA_SYNC_MAX_ERRORS", defaults.max_errors)?,
        };

        let conflict_policy = match std::env::var("ORBITA_CONFLICT_POLICY")
            .unwrap_or_else(|_| "record".to_string())
            .as_str()
        {
            "skip" => ConflictPolicy::Skip,
            "record" => ConflictPolicy::Record,
            "fail" => ConflictPolicy::Fail,
            other => anyhow::bail!("unknown conflict policy: {}", other),
        };

        let metrics_port = parse_env("ORBITA_METRICS_PORT", 9090u16)?;

        Ok(Self {
            database_url,
            import,
            conflict_policy,
            metrics_port,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("bad value for {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}
