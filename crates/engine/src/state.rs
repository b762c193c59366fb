//! Persistent publisher-state store.
//!
//! Owns the in-memory [`PublisherState`] and writes it through to the
//! host after every mutation. The host performs the durable write; a
//! failed save is logged and the in-memory state stays authoritative
//! until the next successful write.

use std::sync::{Arc, Mutex, MutexGuard};

use tally_types::{
    balance_report_key, BalanceReport, ContributionInfo, EngineConfig, Month, PublisherState,
    TallyError, TallyResult,
};

use crate::host::HostClient;

pub struct StateStore {
    host: Arc<dyn HostClient>,
    state: Mutex<PublisherState>,
}

impl StateStore {
    pub fn new(host: Arc<dyn HostClient>, config: &EngineConfig) -> Self {
        let state = PublisherState {
            min_publisher_duration: config.default_min_visit_duration,
            min_visits: config.default_min_visits,
            ..PublisherState::default()
        };
        Self {
            host,
            state: Mutex::new(state),
        }
    }

    /// Replaces the in-memory state with a previously persisted blob.
    pub fn load(&self, data: &str) -> TallyResult<()> {
        let parsed: PublisherState = serde_json::from_str(data)
            .map_err(|err| TallyError::InvalidPublisherState(err.to_string()))?;
        *self.lock() = parsed;
        Ok(())
    }

    /// Serializes the current state and hands it to the host.
    pub async fn save(&self) {
        let serialized = {
            let state = self.lock();
            serde_json::to_string(&*state)
        };
        match serialized {
            Ok(data) => {
                if let Err(err) = self.host.save_publisher_state(&data).await {
                    log::error!("could not save publisher state: {err}");
                }
            }
            Err(err) => log::error!("could not serialize publisher state: {err}"),
        }
    }

    pub fn min_publisher_duration(&self) -> u64 {
        self.lock().min_publisher_duration
    }

    pub async fn set_min_publisher_duration(&self, duration: u64) {
        self.lock().min_publisher_duration = duration;
        self.save().await;
    }

    pub fn min_visits(&self) -> u32 {
        self.lock().min_visits
    }

    pub async fn set_min_visits(&self, visits: u32) {
        self.lock().min_visits = visits;
        self.save().await;
    }

    pub fn allow_non_verified(&self) -> bool {
        self.lock().allow_non_verified
    }

    pub async fn set_allow_non_verified(&self, allow: bool) {
        self.lock().allow_non_verified = allow;
        self.save().await;
    }

    pub fn allow_videos(&self) -> bool {
        self.lock().allow_videos
    }

    pub async fn set_allow_videos(&self, allow: bool) {
        self.lock().allow_videos = allow;
        self.save().await;
    }

    pub fn pubs_load_timestamp(&self) -> u64 {
        self.lock().pubs_load_timestamp
    }

    pub async fn set_pubs_load_timestamp(&self, timestamp: u64) {
        self.lock().pubs_load_timestamp = timestamp;
        self.save().await;
    }

    pub fn reconcile_stamp(&self) -> u64 {
        self.lock().reconcile_stamp
    }

    pub async fn set_reconcile_stamp(&self, stamp: u64) {
        self.lock().reconcile_stamp = stamp;
        self.save().await;
    }

    pub async fn add_recurring_donation(&self, publisher_id: &str, value: f64) {
        self.lock()
            .recurring_donations
            .insert(publisher_id.to_string(), value);
        self.save().await;
    }

    /// The recurring-donation table as contribution entries.
    pub fn recurring_donations(&self) -> Vec<ContributionInfo> {
        self.lock()
            .recurring_donations
            .iter()
            .map(|(publisher, value)| ContributionInfo {
                publisher: publisher.clone(),
                value: *value,
                date: 0,
            })
            .collect()
    }

    pub fn balance_report(&self, month: Month, year: i32) -> Option<BalanceReport> {
        self.lock()
            .monthly_balances
            .get(&balance_report_key(month, year))
            .cloned()
    }

    pub async fn set_balance_report(&self, month: Month, year: i32, report: BalanceReport) {
        self.lock()
            .monthly_balances
            .insert(balance_report_key(month, year), report);
        self.save().await;
    }

    /// Copy of the full state, for inspection.
    pub fn snapshot(&self) -> PublisherState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, PublisherState> {
        self.state.lock().expect("publisher state lock poisoned")
    }
}
