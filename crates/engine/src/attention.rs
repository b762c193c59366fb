//! Attention tracker: folds visit and payment events into per-publisher
//! records through the update orchestrator.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tally_types::{
    constants, Category, EngineConfig, PaymentData, PublisherFilter, PublisherInfo, TabSnapshot,
    TallyError,
};

use crate::ballots::{self, Winner};
use crate::host::HostClient;
use crate::orchestrator::{PublisherOp, UpdateOrchestrator};
use crate::registry::PublisherRegistry;
use crate::scoring::ScoreConstants;
use crate::state::StateStore;
use crate::synopsis::{PublisherSnapshot, Synopsis};

pub struct AttentionTracker {
    host: Arc<dyn HostClient>,
    registry: Arc<PublisherRegistry>,
    state: Arc<StateStore>,
    score_time_scale: f64,
    consts: Mutex<ScoreConstants>,
    synopsis: Mutex<Synopsis>,
    orchestrator: UpdateOrchestrator,
    /// Ids the user deleted; treated like registry exclusions until
    /// restored.
    deleted: Mutex<HashSet<String>>,
}

impl AttentionTracker {
    pub fn new(
        host: Arc<dyn HostClient>,
        registry: Arc<PublisherRegistry>,
        state: Arc<StateStore>,
        config: &EngineConfig,
    ) -> Self {
        let consts = ScoreConstants::new(state.min_publisher_duration(), config.score_time_scale);
        Self {
            host,
            registry,
            state,
            score_time_scale: config.score_time_scale,
            consts: Mutex::new(consts),
            synopsis: Mutex::new(Synopsis::new()),
            orchestrator: UpdateOrchestrator::new(),
            deleted: Mutex::new(HashSet::new()),
        }
    }

    /// Recomputes the cached score coefficients from the current
    /// minimum visit duration. Must be called whenever that setting
    /// changes (including after a state load).
    pub fn refresh_score_constants(&self) {
        let consts = ScoreConstants::new(
            self.state.min_publisher_duration(),
            self.score_time_scale,
        );
        *self.consts.lock().expect("score constants lock poisoned") = consts;
    }

    /// Records one visit sample. Non-media samples shorter than the
    /// minimum duration are dropped before anything is queued.
    pub async fn record_visit(&self, snapshot: &TabSnapshot, duration: u64) {
        let publisher_id = snapshot.tld.clone();
        if publisher_id.is_empty() {
            return;
        }

        if constants::media_provider(&publisher_id).is_some() {
            if !self.state.allow_videos() {
                log::debug!("video attention is disabled, dropping {publisher_id}");
                return;
            }
        } else if duration < self.state.min_publisher_duration() {
            log::debug!("visit of {duration}ms below minimum, dropping {publisher_id}");
            return;
        }

        self.submit(
            publisher_id,
            PublisherOp::Visit {
                favicon_url: snapshot.favicon_url.clone(),
                duration,
                month: snapshot.local_month,
                year: snapshot.local_year,
            },
        )
        .await;
    }

    /// Records a direct, tipped or recurring payment.
    pub async fn record_payment(&self, payment: &PaymentData) {
        if payment.publisher_id.is_empty() {
            return;
        }
        self.submit(
            payment.publisher_id.clone(),
            PublisherOp::Payment {
                value: payment.value,
                timestamp: payment.timestamp,
                category: payment.category,
                month: payment.local_month,
                year: payment.local_year,
            },
        )
        .await;
    }

    /// Queues `op` and, when this call elected the driver, pumps the
    /// id's queue until it drains. At most one cycle per id is ever in
    /// flight; ops queued during a cycle run afterwards in FIFO order.
    async fn submit(&self, publisher_id: String, op: PublisherOp) {
        if !self.orchestrator.enqueue(&publisher_id, op) {
            return;
        }
        while let Some(op) = self.orchestrator.take_next(&publisher_id) {
            self.run_cycle(&publisher_id, op).await;
        }
    }

    /// One load -> modify -> save cycle.
    async fn run_cycle(&self, publisher_id: &str, op: PublisherOp) {
        let (month, year) = op.period();
        let filter = PublisherFilter::for_record(publisher_id, op.category(), month, year);

        let loaded = match self.host.load_publisher_info(&filter).await {
            Ok(loaded) => loaded,
            Err(err) => {
                debug_assert!(
                    !matches!(err, TallyError::TooManyResults(_)),
                    "single-record load returned multiple rows for {publisher_id}"
                );
                log::warn!("could not load publisher info for {publisher_id}: {err}");
                return;
            }
        };
        let mut info =
            loaded.unwrap_or_else(|| PublisherInfo::new(publisher_id.to_string(), month, year));

        match op {
            PublisherOp::Visit {
                favicon_url,
                duration,
                ..
            } => {
                if self.is_excluded(publisher_id) {
                    log::debug!("publisher {publisher_id} is excluded, dropping visit");
                    return;
                }
                info.favicon_url = favicon_url;
                info.duration += duration;
                info.visits += 1;
                info.category = Category::AutoContribute;
                info.score += self.concave_score(duration);
                info.verified = self.registry.is_verified(publisher_id);
            }
            PublisherOp::Payment {
                value,
                timestamp,
                category,
                ..
            } => {
                info.category = category;
                info.contributions.push(tally_types::ContributionInfo {
                    publisher: String::new(),
                    value,
                    date: timestamp,
                });
            }
        }

        if let Err(err) = self.host.save_publisher_info(&info).await {
            // The in-memory working set keeps the update; storage stays
            // stale until the next successful write.
            log::error!("could not save publisher info for {}: {}", info.id, err);
        }
        self.on_info_updated(&info);
    }

    /// Folds a written record into the working set and renormalizes.
    /// Ineligible records are evicted instead.
    fn on_info_updated(&self, info: &PublisherInfo) {
        let mut synopsis = self.synopsis();
        if !self.is_eligible(info) {
            synopsis.remove(&info.id);
            return;
        }
        synopsis.upsert(info);
        synopsis.normalize();
    }

    /// Contribution eligibility: positive score, both gating minimums
    /// met, and verified unless non-verified publishers are allowed.
    pub fn is_eligible(&self, info: &PublisherInfo) -> bool {
        if !self.state.allow_non_verified() && !self.registry.is_verified(&info.id) {
            return false;
        }
        info.score > 0.0
            && info.duration >= self.state.min_publisher_duration()
            && info.visits >= self.state.min_visits()
    }

    /// Produces the winners list for a reconcile round.
    pub fn winners(&self, ballots: u32) -> Vec<Winner> {
        let ranked = self.synopsis().top();
        ballots::allocate(&ranked, ballots)
    }

    /// Removes a publisher from the working set and blocks future
    /// attribution until restored.
    pub fn delete_publisher(&self, publisher_id: &str) {
        self.deleted
            .lock()
            .expect("deleted set lock poisoned")
            .insert(publisher_id.to_string());
        let mut synopsis = self.synopsis();
        if synopsis.remove(publisher_id) {
            synopsis.normalize();
        }
    }

    pub fn restore_publisher(&self, publisher_id: &str) {
        self.deleted
            .lock()
            .expect("deleted set lock poisoned")
            .remove(publisher_id);
    }

    /// Working-set snapshot for one publisher, if eligible so far.
    pub fn publisher_snapshot(&self, publisher_id: &str) -> Option<PublisherSnapshot> {
        self.synopsis().get(publisher_id).cloned()
    }

    pub fn working_set_len(&self) -> usize {
        self.synopsis().len()
    }

    fn is_excluded(&self, publisher_id: &str) -> bool {
        self.registry.is_excluded(publisher_id)
            || self
                .deleted
                .lock()
                .expect("deleted set lock poisoned")
                .contains(publisher_id)
    }

    fn concave_score(&self, duration: u64) -> f64 {
        self.consts
            .lock()
            .expect("score constants lock poisoned")
            .concave_score(duration)
    }

    fn synopsis(&self) -> std::sync::MutexGuard<'_, Synopsis> {
        self.synopsis.lock().expect("synopsis lock poisoned")
    }
}
