//! Persisted publisher-side settings, donations and monthly reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants;
use crate::publisher::Month;

/// Monthly balance summary, keyed by [`balance_report_key`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub opening_balance: f64,
    pub closing_balance: f64,
    pub grants: f64,
    pub earnings_from_ads: f64,
    pub auto_contribute: f64,
    pub recurring_donation: f64,
    pub one_time_donation: f64,
}

/// Storage key for a monthly balance report: `"<year>_<month>_balance"`
/// with the month's integer value, no zero-padding.
pub fn balance_report_key(month: Month, year: i32) -> String {
    format!("{}_{}_balance", year, month.value())
}

/// Publisher-side state persisted through the host.
///
/// Unknown JSON fields survive a load/save round-trip so newer builds
/// can read and rewrite this blob without losing what they added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherState {
    /// Minimum visit duration before a sample counts, in milliseconds.
    pub min_publisher_duration: u64,
    pub min_visits: u32,
    pub allow_non_verified: bool,
    pub allow_videos: bool,
    /// Seconds since epoch of the last successful publishers-list
    /// refresh; 0 means never.
    pub pubs_load_timestamp: u64,
    /// publisher id -> monthly amount.
    #[serde(default)]
    pub recurring_donations: BTreeMap<String, f64>,
    #[serde(default)]
    pub monthly_balances: BTreeMap<String, BalanceReport>,
    /// Owned by the wallet collaborator, co-persisted here.
    #[serde(default)]
    pub reconcile_stamp: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PublisherState {
    fn default() -> Self {
        Self {
            min_publisher_duration: constants::DEFAULT_MIN_VISIT_DURATION_MS,
            min_visits: constants::DEFAULT_MIN_VISITS,
            allow_non_verified: true,
            allow_videos: true,
            pubs_load_timestamp: 0,
            recurring_donations: BTreeMap::new(),
            monthly_balances: BTreeMap::new(),
            reconcile_stamp: 0,
            extra: Map::new(),
        }
    }
}
