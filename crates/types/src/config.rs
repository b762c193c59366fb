//! Engine configuration supplied by the embedding host process.

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::errors::{TallyError, TallyResult};

/// Tunables the host hands to the engine at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Inverse time scale of the concave score, in 1/ms.
    pub score_time_scale: f64,

    /// Default minimum visit duration in milliseconds; the persisted
    /// publisher state overrides this once it exists.
    pub default_min_visit_duration: u64,

    /// Default minimum visit count for contribution eligibility.
    pub default_min_visits: u32,

    /// Endpoint serving the verified/excluded publishers list.
    pub publishers_list_url: String,

    /// Seconds between successful publishers-list refreshes.
    pub refresh_interval: u64,

    /// Randomized retry window after a failed refresh, in seconds.
    pub refresh_retry_min: u64,
    pub refresh_retry_max: u64,
}

impl EngineConfig {
    pub fn validate(&self) -> TallyResult<()> {
        if self.score_time_scale <= 0.0 || !self.score_time_scale.is_finite() {
            return Err(TallyError::invalid_config(format!(
                "score_time_scale must be a positive finite number, got {}",
                self.score_time_scale
            )));
        }
        if self.publishers_list_url.is_empty() {
            return Err(TallyError::invalid_config("publishers_list_url is empty"));
        }
        if self.refresh_interval == 0 {
            return Err(TallyError::invalid_config("refresh_interval must be greater than 0"));
        }
        if self.refresh_retry_min == 0 || self.refresh_retry_min > self.refresh_retry_max {
            return Err(TallyError::invalid_config(format!(
                "refresh retry window [{}, {}] is empty",
                self.refresh_retry_min, self.refresh_retry_max
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            score_time_scale: constants::SCORE_TIME_SCALE,
            default_min_visit_duration: constants::DEFAULT_MIN_VISIT_DURATION_MS,
            default_min_visits: constants::DEFAULT_MIN_VISITS,
            publishers_list_url: constants::DEFAULT_PUBLISHERS_LIST_URL.to_string(),
            refresh_interval: constants::PUBLISHERS_LIST_REFRESH_INTERVAL,
            refresh_retry_min: constants::REFRESH_RETRY_MIN_SECONDS,
            refresh_retry_max: constants::REFRESH_RETRY_MAX_SECONDS,
        }
    }
}
