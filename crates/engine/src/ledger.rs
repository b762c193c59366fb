//! Ledger façade: the public surface hosts drive.
//!
//! Composes the registry, state store, attention tracker, refresh
//! scheduler and tab aggregator, and routes host callbacks (timers,
//! tab events, media requests, reconcile completion) to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tally_types::{
    BalanceReport, Category, ContributionInfo, EngineConfig, Month, PaymentData, PublisherFilter,
    PublisherInfo, TabSnapshot, TallyError, TallyResult,
};

use crate::attention::AttentionTracker;
use crate::host::{HostClient, MediaEvent, MediaResolver, TimerId, WalletClient};
use crate::refresh::RefreshScheduler;
use crate::registry::PublisherRegistry;
use crate::state::StateStore;
use crate::tabs::TabTracker;

pub struct Ledger {
    host: Arc<dyn HostClient>,
    wallet: Arc<dyn WalletClient>,
    media: Arc<dyn MediaResolver>,
    registry: Arc<PublisherRegistry>,
    state: Arc<StateStore>,
    attention: AttentionTracker,
    refresh: RefreshScheduler,
    tabs: Mutex<TabTracker>,
    initialized: AtomicBool,
}

impl Ledger {
    pub fn new(
        host: Arc<dyn HostClient>,
        wallet: Arc<dyn WalletClient>,
        media: Arc<dyn MediaResolver>,
        config: EngineConfig,
    ) -> TallyResult<Self> {
        config.validate()?;

        let registry = Arc::new(PublisherRegistry::new());
        let state = Arc::new(StateStore::new(host.clone(), &config));
        let attention =
            AttentionTracker::new(host.clone(), registry.clone(), state.clone(), &config);
        let refresh =
            RefreshScheduler::new(host.clone(), registry.clone(), state.clone(), &config);

        Ok(Self {
            host,
            wallet,
            media,
            registry,
            state,
            attention,
            refresh,
            tabs: Mutex::new(TabTracker::new()),
            initialized: AtomicBool::new(false),
        })
    }

    /// Loads persisted ledger and publisher state, reports the outcome
    /// through the host, and arms the registry refresh. Steps run
    /// strictly in order; a missing blob is the first-run path and not
    /// an error.
    pub async fn initialize(&self) {
        let result = self.load_persisted_state().await;
        match &result {
            Ok(()) => {
                self.initialized.store(true, Ordering::SeqCst);
                log::info!("ledger initialized");
            }
            Err(err) => log::error!("ledger initialization failed: {err}"),
        }
        self.host.on_wallet_initialized(result);
        self.refresh.schedule(false);
    }

    async fn load_persisted_state(&self) -> TallyResult<()> {
        match self.host.load_ledger_state().await {
            Ok(Some(blob)) => self.wallet.load_state(&blob).map_err(|err| match err {
                TallyError::InvalidLedgerState(_) => err,
                other => TallyError::InvalidLedgerState(other.to_string()),
            })?,
            Ok(None) => log::info!("no ledger state yet, starting from defaults"),
            Err(err) => return Err(err),
        }

        match self.host.load_publisher_state().await {
            Ok(Some(data)) => {
                self.state.load(&data)?;
                self.attention.refresh_score_constants();
            }
            Ok(None) => log::info!("no publisher state yet, starting from defaults"),
            Err(err) => return Err(err),
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Creates a fresh wallet persona. Refused once initialized.
    pub async fn create_wallet(&self) {
        if self.is_initialized() {
            self.host.on_wallet_initialized(Err(TallyError::unexpected(
                "ledger is already initialized",
            )));
            return;
        }
        match self.wallet.register_persona().await {
            Ok(()) => {
                self.initialized.store(true, Ordering::SeqCst);
                self.host.on_wallet_initialized(Ok(()));
            }
            Err(err) => self.host.on_wallet_initialized(Err(err)),
        }
    }

    /// Kicks off a reconcile round when the wallet is ready. Triggered
    /// periodically by the host.
    pub async fn reconcile(&self) {
        if !self.wallet.is_ready_for_reconcile() {
            log::debug!("wallet not ready to reconcile");
            return;
        }
        let viewing_id = self.host.generate_guid();
        if let Err(err) = self.wallet.reconcile(&viewing_id).await {
            log::error!("reconcile {viewing_id} could not start: {err}");
        }
    }

    /// Wallet callback once a reconcile round settles. On success the
    /// ballot budget is distributed across the current winners and the
    /// vote handed back to the wallet.
    pub async fn on_reconcile_complete(
        &self,
        result: TallyResult<()>,
        viewing_id: &str,
        category: Category,
        probi: &str,
    ) {
        self.host
            .on_reconcile_complete(result.clone(), viewing_id, category, probi);
        if let Err(err) = result {
            log::warn!("reconcile {viewing_id} failed: {err}");
            return;
        }

        let ballots = self.wallet.ballot_count(viewing_id);
        let winners = self.attention.winners(ballots);
        log::info!(
            "reconcile {viewing_id}: {ballots} ballots across {} winners",
            winners.len()
        );
        let publishers: Vec<String> =
            winners.iter().map(|w| w.publisher.id.clone()).collect();
        self.wallet.vote_publishers(&publishers, viewing_id).await;
        self.wallet.prepare_ballots().await;
        self.state
            .set_reconcile_stamp(self.wallet.reconcile_stamp())
            .await;
    }

    /// Host timer callback; dispatches to whichever component armed it.
    pub async fn on_timer(&self, timer_id: TimerId) {
        if !self.refresh.on_timer(timer_id).await {
            log::debug!("timer {timer_id} does not belong to the ledger");
        }
    }

    // --- Tab lifecycle -------------------------------------------------

    pub fn on_load(&self, snapshot: TabSnapshot, now: u64) {
        self.tabs().on_load(snapshot, now);
    }

    pub fn on_show(&self, tab_id: u32, now: u64) {
        self.tabs().on_show(tab_id, now);
    }

    pub async fn on_hide(&self, tab_id: u32, now: u64) {
        let sample = self.tabs().on_hide(tab_id, now);
        if let Some(sample) = sample {
            self.attention
                .record_visit(&sample.snapshot, sample.duration)
                .await;
        }
    }

    pub async fn on_unload(&self, tab_id: u32, now: u64) {
        let sample = self.tabs().on_unload(tab_id, now);
        if let Some(sample) = sample {
            self.attention
                .record_visit(&sample.snapshot, sample.duration)
                .await;
        }
    }

    pub fn on_foreground(&self, tab_id: u32, now: u64) {
        self.tabs().on_foreground(tab_id, now);
    }

    pub async fn on_background(&self, tab_id: u32, now: u64) {
        let sample = self.tabs().on_background(tab_id, now);
        if let Some(sample) = sample {
            self.attention
                .record_visit(&sample.snapshot, sample.duration)
                .await;
        }
    }

    // --- Media attribution ---------------------------------------------

    /// XHR observed by the browser; attributed when it is a supported
    /// media request.
    pub async fn on_xhr_load(
        &self,
        url: &str,
        first_party_url: &str,
        referrer: &str,
        parts: &HashMap<String, String>,
        snapshot: &TabSnapshot,
    ) {
        let Some(link_type) = self.media.link_type(url, first_party_url, referrer) else {
            return;
        };
        self.process_media(parts, &link_type, snapshot).await;
    }

    /// POST body observed by the browser; some providers batch several
    /// media events into one request.
    pub async fn on_post_data(
        &self,
        url: &str,
        first_party_url: &str,
        referrer: &str,
        post_data: &str,
        snapshot: &TabSnapshot,
    ) {
        let Some(link_type) = self.media.link_type(url, first_party_url, referrer) else {
            return;
        };
        for parts in self.media.post_parts(post_data, &link_type) {
            self.process_media(&parts, &link_type, snapshot).await;
        }
    }

    async fn process_media(
        &self,
        parts: &HashMap<String, String>,
        link_type: &str,
        snapshot: &TabSnapshot,
    ) {
        let Some(event) = self.media.resolve(parts, link_type) else {
            return;
        };
        match self.host.load_media_publisher_info(&event.media_key).await {
            Ok(Some(publisher_id)) => {
                self.record_media_visit(&publisher_id, &event, snapshot).await;
            }
            Ok(None) => {
                if let Err(err) = self
                    .host
                    .save_media_publisher_info(&event.media_key, &event.publisher_key)
                    .await
                {
                    log::error!("could not save media mapping {}: {err}", event.media_key);
                }
                let publisher_id = event.publisher_key.clone();
                self.record_media_visit(&publisher_id, &event, snapshot).await;
            }
            Err(err) => {
                log::warn!("could not load media mapping {}: {err}", event.media_key);
            }
        }
    }

    async fn record_media_visit(
        &self,
        publisher_id: &str,
        event: &MediaEvent,
        snapshot: &TabSnapshot,
    ) {
        let media_snapshot = TabSnapshot {
            tab_id: snapshot.tab_id,
            domain: snapshot.domain.clone(),
            tld: publisher_id.to_string(),
            path: snapshot.path.clone(),
            favicon_url: if event.favicon_url.is_empty() {
                snapshot.favicon_url.clone()
            } else {
                event.favicon_url.clone()
            },
            local_month: snapshot.local_month,
            local_year: snapshot.local_year,
        };
        self.attention
            .record_visit(&media_snapshot, event.duration)
            .await;
    }

    // --- Payments and donations ----------------------------------------

    pub async fn make_payment(&self, payment: PaymentData) {
        self.attention.record_payment(&payment).await;
    }

    pub async fn add_recurring_donation(&self, publisher_id: &str, value: f64) {
        self.state.add_recurring_donation(publisher_id, value).await;
    }

    pub fn recurring_donations(&self) -> Vec<ContributionInfo> {
        self.state.recurring_donations()
    }

    // --- Settings -------------------------------------------------------

    pub fn publisher_min_visit_duration(&self) -> u64 {
        self.state.min_publisher_duration()
    }

    /// Sets the minimum visit duration in milliseconds and recomputes
    /// the score coefficients that depend on it.
    pub async fn set_publisher_min_visit_duration(&self, duration: u64) {
        self.state.set_min_publisher_duration(duration).await;
        self.attention.refresh_score_constants();
    }

    pub fn publisher_min_visits(&self) -> u32 {
        self.state.min_visits()
    }

    pub async fn set_publisher_min_visits(&self, visits: u32) {
        self.state.set_min_visits(visits).await;
    }

    pub fn publisher_allow_non_verified(&self) -> bool {
        self.state.allow_non_verified()
    }

    pub async fn set_publisher_allow_non_verified(&self, allow: bool) {
        self.state.set_allow_non_verified(allow).await;
    }

    pub fn publisher_allow_videos(&self) -> bool {
        self.state.allow_videos()
    }

    pub async fn set_publisher_allow_videos(&self, allow: bool) {
        self.state.set_allow_videos(allow).await;
    }

    // --- Reports, queries, publisher management -------------------------

    pub fn balance_report(&self, month: Month, year: i32) -> Option<BalanceReport> {
        self.state.balance_report(month, year)
    }

    pub async fn set_balance_report(&self, month: Month, year: i32, report: BalanceReport) {
        self.state.set_balance_report(month, year, report).await;
    }

    pub async fn publisher_info_list(
        &self,
        start: u32,
        limit: u32,
        filter: &PublisherFilter,
    ) -> TallyResult<Vec<PublisherInfo>> {
        self.host.load_publisher_info_list(start, limit, filter).await
    }

    pub fn delete_publisher(&self, publisher_id: &str) {
        self.attention.delete_publisher(publisher_id);
    }

    pub fn restore_publisher(&self, publisher_id: &str) {
        self.attention.restore_publisher(publisher_id);
    }

    pub fn is_publisher_verified(&self, publisher_id: &str) -> bool {
        self.registry.is_verified(publisher_id)
    }

    pub fn is_publisher_excluded(&self, publisher_id: &str) -> bool {
        self.registry.is_excluded(publisher_id)
    }

    pub fn reconcile_stamp(&self) -> u64 {
        self.wallet.reconcile_stamp()
    }

    /// Persists the wallet's opaque blob. Called by the wallet
    /// collaborator whenever its state changes.
    pub async fn save_ledger_state(&self, data: &str) -> TallyResult<()> {
        self.host.save_ledger_state(data).await
    }

    pub fn generate_guid(&self) -> String {
        self.host.generate_guid()
    }

    pub fn uri_encode(&self, value: &str) -> String {
        self.host.uri_encode(value)
    }

    // --- Component handles ----------------------------------------------

    pub fn attention(&self) -> &AttentionTracker {
        &self.attention
    }

    pub fn registry(&self) -> &PublisherRegistry {
        &self.registry
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn refresh(&self) -> &RefreshScheduler {
        &self.refresh
    }

    fn tabs(&self) -> std::sync::MutexGuard<'_, TabTracker> {
        self.tabs.lock().expect("tab tracker lock poisoned")
    }
}
