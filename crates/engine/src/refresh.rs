//! Registry refresh scheduler.
//!
//! Periodically downloads the verified/excluded publishers list through
//! the host, with a randomized retry delay on failure. At most one
//! timer is armed at any time; a refresh request while armed is a
//! no-op. `pubs_load_timestamp` advances only when fetch, parse and
//! save all succeed; a failed save zeroes it so the next startup
//! refreshes immediately.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tally_types::EngineConfig;

use crate::host::{HostClient, TimerId, UrlMethod};
use crate::registry::{self, PublisherRegistry};
use crate::state::StateStore;

pub struct RefreshScheduler {
    host: Arc<dyn HostClient>,
    registry: Arc<PublisherRegistry>,
    state: Arc<StateStore>,
    url: String,
    interval: u64,
    retry_min: u64,
    retry_max: u64,
    timer: Mutex<Option<TimerId>>,
}

impl RefreshScheduler {
    pub fn new(
        host: Arc<dyn HostClient>,
        registry: Arc<PublisherRegistry>,
        state: Arc<StateStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            host,
            registry,
            state,
            url: config.publishers_list_url.clone(),
            interval: config.refresh_interval,
            retry_min: config.refresh_retry_min,
            retry_max: config.refresh_retry_max,
            timer: Mutex::new(None),
        }
    }

    /// Arms the refresh timer. A no-op while a timer is already armed.
    pub fn schedule(&self, retry_after_error: bool) {
        let mut timer = self.timer();
        if timer.is_some() {
            return;
        }
        let delay = if retry_after_error {
            self.retry_delay()
        } else {
            delay_until_next(
                self.state.pubs_load_timestamp(),
                self.host.current_time(),
                self.interval,
            )
        };
        let id = self.host.set_timer(delay);
        log::debug!("publishers list refresh in {delay}s (timer {id})");
        *timer = Some(id);
    }

    /// Handles a host timer callback. Returns false when the timer does
    /// not belong to this scheduler.
    pub async fn on_timer(&self, timer_id: TimerId) -> bool {
        {
            let mut timer = self.timer();
            if *timer != Some(timer_id) {
                return false;
            }
            *timer = None;
        }
        self.run_refresh().await;
        true
    }

    /// Whether a refresh timer is currently armed.
    pub fn is_armed(&self) -> bool {
        self.timer().is_some()
    }

    async fn run_refresh(&self) {
        let body = match self
            .host
            .fetch_url(&self.url, &[], "", "", UrlMethod::Get)
            .await
        {
            Ok(body) if !body.is_empty() => body,
            Ok(_) => {
                log::warn!("publishers list fetch returned an empty body");
                self.schedule(true);
                return;
            }
            Err(err) => {
                log::warn!("publishers list fetch failed: {err}");
                self.schedule(true);
                return;
            }
        };

        let entries = match registry::parse_publishers_list(&body) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("publishers list body rejected: {err}");
                self.schedule(true);
                return;
            }
        };
        log::info!("publishers list refreshed, {} entries", entries.len());
        self.registry.replace(entries);

        match self.host.save_publishers_list(&body).await {
            Ok(()) => {
                self.state
                    .set_pubs_load_timestamp(self.host.current_time())
                    .await;
                self.schedule(false);
            }
            Err(err) => {
                log::error!("could not save publishers list: {err}");
                self.state.set_pubs_load_timestamp(0).await;
                self.schedule(true);
            }
        }
    }

    fn retry_delay(&self) -> u64 {
        let seed = self
            .host
            .entropy()
            .unwrap_or_else(|| self.host.current_time());
        let mut rng = StdRng::seed_from_u64(seed);
        rng.gen_range(self.retry_min..=self.retry_max)
    }

    fn timer(&self) -> std::sync::MutexGuard<'_, Option<TimerId>> {
        self.timer.lock().expect("refresh timer lock poisoned")
    }
}

/// Seconds until the next regular refresh should fire.
///
/// A missing or skewed-into-the-future timestamp fires immediately, as
/// does one older than the interval. `now == last` waits a full
/// interval rather than firing in a zero-delay loop.
fn delay_until_next(last: u64, now: u64, interval: u64) -> u64 {
    let since_last = if last == 0 || last > now { 0 } else { now - last };
    if now == last {
        interval
    } else if since_last > 0 && since_last < interval {
        interval - since_last
    } else {
        0
    }
}
