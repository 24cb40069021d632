use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Budget delivery curve over the day. A shape only has teeth when
/// `hourly_budget` is set; it decides how that ceiling is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingShape {
    /// Apply the hourly ceiling as configured, every hour.
    #[default]
    Even,
    /// Ignore the hourly ceiling; spend as fast as budget allows.
    Accelerated,
    /// Mornings spend uncapped; the ceiling applies from 12:00 UTC.
    FrontLoaded,
}

/// Budget and frequency constraints for one line item. A zero
/// `daily_budget` is accepted but leaves spend ungated; startup flags
/// such line items with a warning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default, setter(into))]
pub struct PacingConfig {
    /// Dollars per UTC day. Zero disables the budget gate.
    pub daily_budget: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
    /// Impressions per user per UTC day; zero/absent disables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq_cap_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq_cap_hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq_cap_lifetime: Option<u32>,
    /// Optional per-source QPS ceiling, enforced at the edge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qps_limit: Option<u32>,
    pub shape: PacingShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_budget: Option<f64>,
}

impl PacingConfig {
    /// Whether the flight window contains `now`. Open-ended bounds pass.
    pub fn in_flight(&self, now: DateTime<Utc>) -> bool {
        if let Some(start) = self.start_at
            && now < start
        {
            return false;
        }
        if let Some(end) = self.end_at
            && now >= end
        {
            return false;
        }
        true
    }
}
