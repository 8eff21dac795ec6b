//! Configuration for the indexer, enumerated in spec §6.
//!
//! Mirrors the teacher's `StageConfig` convention: one small, independently
//! defaulted sub-config per component, aggregated into a single top-level
//! [`Config`] that's deserialized from TOML and then selectively overridden
//! by environment variables and CLI flags in `bin/chainindex`.

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub http_address: SocketAddr,
    pub metrics_address: SocketAddr,
    /// Shared across `GapAnalyzer`'s finality scan and `FinalityReconciler`:
    /// reconciliation queries older than this are skipped because the
    /// underlying partitions are compressed and not efficiently updatable
    /// (spec §4.5, §9).
    pub compression_threshold_days: i64,
    pub rpc: RpcConfig,
    pub tip_follower: TipFollowerConfig,
    pub block_backfill: BackfillConfig,
    pub milestone_backfill: BackfillConfig,
    pub gap_analyzer: GapAnalyzerConfig,
    pub gap_filler: GapFillerConfig,
    pub priority_fee: PriorityFeeConfig,
    pub shutdown: ShutdownConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/chainindex".to_string(),
            http_address: "0.0.0.0:8080".parse().unwrap(),
            metrics_address: "0.0.0.0:9184".parse().unwrap(),
            compression_threshold_days: 10,
            rpc: RpcConfig::default(),
            tip_follower: TipFollowerConfig::default(),
            block_backfill: BackfillConfig::block_default(),
            milestone_backfill: BackfillConfig::milestone_default(),
            gap_analyzer: GapAnalyzerConfig::default(),
            gap_filler: GapFillerConfig::default(),
            priority_fee: PriorityFeeConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl Config {
    /// Loads config from a TOML file, falling back to defaults for any
    /// field the file omits (every field carries `#[serde(default)]`
    /// transitively through this struct's sub-configs).
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }
}

/// RPC Pool configuration (spec §4.1, §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    pub el_endpoints: Vec<String>,
    pub cl_endpoints: Vec<String>,
    pub expected_chain_id: u64,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub max_consecutive_errors: u32,
    pub parallelism: usize,
    /// Cool-down before probing a down endpoint again.
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
    #[serde(with = "humantime_serde")]
    pub el_exhausted_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub cl_exhausted_backoff: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            el_endpoints: Vec::new(),
            cl_endpoints: Vec::new(),
            expected_chain_id: 137,
            timeout: Duration::from_millis(10_000),
            max_consecutive_errors: 5,
            parallelism: 8,
            cooldown: Duration::from_secs(60),
            el_exhausted_backoff: Duration::from_secs(1),
            cl_exhausted_backoff: Duration::from_secs(5 * 60),
        }
    }
}

/// `TipFollower` configuration (spec §4.3, §6).
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct TipFollowerConfig {
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for TipFollowerConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(2_000) }
    }
}

/// Shared shape for `BlockBackfiller` and `MilestoneBackfiller`
/// (spec §4.4, §6).
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct BackfillConfig {
    pub target: u64,
    pub batch_size: u64,
    #[serde(with = "humantime_serde")]
    pub transient_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub exhausted_retry: Duration,
    /// How long to sleep once the floor has reached `target`.
    #[serde(with = "humantime_serde")]
    pub idle_sleep: Duration,
}

impl BackfillConfig {
    fn block_default() -> Self {
        Self {
            target: 0,
            batch_size: 20,
            transient_backoff: Duration::from_secs(2),
            exhausted_retry: Duration::from_secs(5),
            idle_sleep: Duration::from_secs(30),
        }
    }

    fn milestone_default() -> Self {
        Self { target: 1, ..Self::block_default() }
    }
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self::block_default()
    }
}

/// `GapAnalyzer` configuration (spec §4.5, §6).
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct GapAnalyzerConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub error_retry: Duration,
    pub batch: u64,
    pub buffer: u64,
}

impl Default for GapAnalyzerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300_000),
            error_retry: Duration::from_secs(60),
            batch: 10_000,
            buffer: 100,
        }
    }
}

/// `GapFiller` configuration (spec §4.6).
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct GapFillerConfig {
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for GapFillerConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(5), max_consecutive_failures: 5 }
    }
}

/// `PriorityFeeRecomputer` configuration (spec §4.8).
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct PriorityFeeConfig {
    pub batch_size: u64,
    #[serde(with = "humantime_serde")]
    pub exhausted_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub error_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub idle_sleep: Duration,
}

impl Default for PriorityFeeConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            exhausted_backoff: Duration::from_secs(1),
            error_backoff: Duration::from_secs(10),
            idle_sleep: Duration::from_secs(60),
        }
    }
}

/// Shutdown configuration (spec §5, §6).
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_period: Duration::from_millis(30_000) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_6() {
        let config = Config::default();
        assert_eq!(config.rpc.timeout, Duration::from_millis(10_000));
        assert_eq!(config.rpc.max_consecutive_errors, 5);
        assert_eq!(config.rpc.parallelism, 8);
        assert_eq!(config.tip_follower.poll_interval, Duration::from_millis(2_000));
        assert_eq!(config.block_backfill.target, 0);
        assert_eq!(config.milestone_backfill.target, 1);
        assert_eq!(config.gap_analyzer.interval, Duration::from_millis(300_000));
        assert_eq!(config.gap_analyzer.batch, 10_000);
        assert_eq!(config.gap_analyzer.buffer, 100);
        assert_eq!(config.compression_threshold_days, 10);
        assert_eq!(config.shutdown.grace_period, Duration::from_millis(30_000));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let toml_str = r#"
            database_url = "postgres://user@host/db"

            [rpc]
            el_endpoints = ["https://el-1.example", "https://el-2.example"]
            expected_chain_id = 137
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database_url, "postgres://user@host/db");
        assert_eq!(config.rpc.el_endpoints.len(), 2);
        // Untouched fields keep their defaults.
        assert_eq!(config.rpc.timeout, Duration::from_millis(10_000));
        assert_eq!(config.gap_filler.max_consecutive_failures, 5);
    }
}
