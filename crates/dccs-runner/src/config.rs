//! # Configuration Loading
//!
//! TOML configuration for the `dccs` runner: engine knobs plus input/output paths.
//!
//! ```toml
//! [engine]
//! cutoff_lag_days = 2
//! usd_rate = "4.70"
//! lump_sum_policy = "withhold"
//!
//! [paths]
//! schedule = "data/lookahead.json"
//! line_items = "data/line_items.json"
//! prior_ledger = "out/ledger.json"
//! output_dir = "out"
//! ```

use anyhow::{Context, Result};
use dccs_engine::EngineConfig;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "configs/dccs.toml";

/// Root configuration schema for the runner.
#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    pub paths: PathsConfig,
}

/// Input and output locations, relative to the working directory.
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    pub schedule: PathBuf,
    pub line_items: PathBuf,
    /// Ledger of the previous run; skipped when absent or missing on disk
    pub prior_ledger: Option<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

impl RunnerConfig {
    /// Load configuration from `path`, falling back to `../../path`.
    pub fn load(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .or_else(|_| std::fs::read_to_string(format!("../../{}", path)))
            .map_err(|_| anyhow::anyhow!("Could not find config file: {}", path))?;

        let config: RunnerConfig = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config: {}", path))?;
        config
            .engine
            .validate()
            .with_context(|| format!("Invalid [engine] section in {}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dccs_engine::LumpSumPolicy;
    use rust_decimal::Decimal;

    #[test]
    fn test_parse_full_config() {
        let config: RunnerConfig = toml::from_str(
            r#"
            [engine]
            cutoff_date = "2024-03-01"
            usd_rate = "4.70"
            lump_sum_policy = "allocate_with_warning"
            default_occurrence_cap = "30"

            [paths]
            schedule = "data/lookahead.json"
            line_items = "data/lines.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.usd_rate, Decimal::new(470, 2));
        assert_eq!(config.engine.lump_sum_policy, LumpSumPolicy::AllocateWithWarning);
        assert_eq!(config.engine.default_occurrence_cap, Some(Decimal::from(30)));
        assert_eq!(config.engine.cutoff_lag_days, 2);
        assert_eq!(config.paths.output_dir, PathBuf::from("out"));
        assert!(config.paths.prior_ledger.is_none());
    }

    #[test]
    fn test_engine_section_optional() {
        let config: RunnerConfig = toml::from_str(
            r#"
            [paths]
            schedule = "s.json"
            line_items = "l.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = RunnerConfig::load("definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Could not find config file"));
    }
}
