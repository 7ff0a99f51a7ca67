//! # Engine Configuration
//!
//! Knobs the engine reads for one run: reconciliation cutoff, campaign range
//! override, currency rate, lump-sum policy and default occurrence cap.

use crate::schedule::{CampaignRange, Schedule, ScheduleError};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Handling of a lump sum whose date shows no activity for the line's well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LumpSumPolicy {
    /// Allocate nothing and report a notice.
    #[default]
    Withhold,
    /// Allocate the full quantity and report a notice.
    AllocateWithWarning,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("usd_rate must be positive, got {0}")]
    NonPositiveRate(Decimal),

    #[error("cutoff_lag_days must not be negative, got {0}")]
    NegativeLag(i64),

    #[error("default_occurrence_cap must not be negative, got {0}")]
    NegativeCap(Decimal),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explicit cutoff; wins over `cutoff_lag_days`
    pub cutoff_date: Option<NaiveDate>,
    pub cutoff_lag_days: i64,
    pub campaign_start: Option<NaiveDate>,
    pub campaign_end: Option<NaiveDate>,
    /// Local-currency units per USD
    pub usd_rate: Decimal,
    pub lump_sum_policy: LumpSumPolicy,
    pub default_occurrence_cap: Option<Decimal>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cutoff_date: None,
            cutoff_lag_days: 2,
            campaign_start: None,
            campaign_end: None,
            usd_rate: Decimal::ONE,
            lump_sum_policy: LumpSumPolicy::default(),
            default_occurrence_cap: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.usd_rate <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveRate(self.usd_rate));
        }
        if self.cutoff_lag_days < 0 {
            return Err(ConfigError::NegativeLag(self.cutoff_lag_days));
        }
        match self.default_occurrence_cap {
            Some(cap) if cap < Decimal::ZERO => Err(ConfigError::NegativeCap(cap)),
            _ => Ok(()),
        }
    }

    /// Reconciliation cutoff for a run on `today`.
    pub fn resolve_cutoff(&self, today: NaiveDate) -> NaiveDate {
        self.cutoff_date
            .unwrap_or_else(|| today - Duration::days(self.cutoff_lag_days))
    }

    /// Campaign range: configured bounds where given, schedule-derived otherwise.
    pub fn campaign_range(&self, schedule: &Schedule) -> Result<CampaignRange, ScheduleError> {
        let derived = schedule.campaign_range();
        CampaignRange::new(
            self.campaign_start.unwrap_or(derived.start),
            self.campaign_end.unwrap_or(derived.end),
        )
    }
}
