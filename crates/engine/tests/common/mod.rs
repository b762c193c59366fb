//! Scripted fakes implementing the collaborator traits: in-memory
//! stores, a manual timer queue, canned HTTP responses and a fixed
//! clock, so tests drive the engine deterministically.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tally_engine::host::{HostClient, MediaEvent, MediaResolver, TimerId, UrlMethod, WalletClient};
use tally_engine::Ledger;
use tally_types::{
    Category, EngineConfig, Month, PublisherFilter, PublisherInfo, TallyError, TallyResult,
};

pub const NOW: u64 = 1_530_000_000;

/// (id, category bit, month value, year) storage key.
type RecordKey = (String, u32, i32, i32);

fn record_key(filter: &PublisherFilter) -> RecordKey {
    (
        filter.id.clone(),
        filter.category.bit(),
        filter.month.value(),
        filter.year,
    )
}

#[derive(Default)]
pub struct FakeHost {
    pub clock: AtomicU64,
    pub entropy: Mutex<Option<u64>>,

    pub ledger_state: Mutex<Option<String>>,
    pub publisher_state: Mutex<Option<String>>,
    pub saved_publisher_state: Mutex<Vec<String>>,
    pub saved_publishers_lists: Mutex<Vec<String>>,
    pub fail_save_publishers_list: AtomicBool,
    pub fail_load_publisher_info: AtomicBool,
    pub fail_save_publisher_info: AtomicBool,

    records: Mutex<HashMap<RecordKey, PublisherInfo>>,
    media_map: Mutex<HashMap<String, String>>,

    pub timers: Mutex<Vec<(u64, TimerId)>>,
    next_timer: AtomicU32,
    next_guid: AtomicU32,

    pub fetch_responses: Mutex<VecDeque<TallyResult<String>>>,
    pub fetched_urls: Mutex<Vec<String>>,

    pub wallet_initialized: Mutex<Vec<TallyResult<()>>>,
    pub reconcile_notices: Mutex<Vec<(TallyResult<()>, String)>>,

    storage_in_flight: AtomicU32,
    pub max_storage_in_flight: AtomicU32,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        let host = Self::default();
        host.clock.store(NOW, Ordering::SeqCst);
        Arc::new(host)
    }

    pub fn push_fetch(&self, response: TallyResult<&str>) {
        self.fetch_responses
            .lock()
            .unwrap()
            .push_back(response.map(str::to_string));
    }

    pub fn record(&self, id: &str, category: Category, month: Month, year: i32) -> Option<PublisherInfo> {
        self.records
            .lock()
            .unwrap()
            .get(&(id.to_string(), category.bit(), month.value(), year))
            .cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn armed_timers(&self) -> Vec<(u64, TimerId)> {
        self.timers.lock().unwrap().clone()
    }

    pub fn last_timer(&self) -> (u64, TimerId) {
        *self.timers.lock().unwrap().last().expect("no timer armed")
    }

    pub fn init_reports(&self) -> Vec<TallyResult<()>> {
        self.wallet_initialized.lock().unwrap().clone()
    }

    /// Brackets a storage call so tests can observe the maximum number
    /// of concurrently outstanding cycles; yields twice to open an
    /// interleaving window.
    async fn storage_section(&self) {
        let current = self.storage_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_storage_in_flight
            .fetch_max(current, Ordering::SeqCst);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        self.storage_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HostClient for FakeHost {
    async fn load_ledger_state(&self) -> TallyResult<Option<String>> {
        Ok(self.ledger_state.lock().unwrap().clone())
    }

    async fn save_ledger_state(&self, data: &str) -> TallyResult<()> {
        *self.ledger_state.lock().unwrap() = Some(data.to_string());
        Ok(())
    }

    async fn load_publisher_state(&self) -> TallyResult<Option<String>> {
        Ok(self.publisher_state.lock().unwrap().clone())
    }

    async fn save_publisher_state(&self, data: &str) -> TallyResult<()> {
        self.saved_publisher_state
            .lock()
            .unwrap()
            .push(data.to_string());
        Ok(())
    }

    async fn save_publishers_list(&self, data: &str) -> TallyResult<()> {
        if self.fail_save_publishers_list.load(Ordering::SeqCst) {
            return Err(TallyError::storage("disk full"));
        }
        self.saved_publishers_lists
            .lock()
            .unwrap()
            .push(data.to_string());
        Ok(())
    }

    async fn load_publisher_info(
        &self,
        filter: &PublisherFilter,
    ) -> TallyResult<Option<PublisherInfo>> {
        self.storage_section().await;
        if self.fail_load_publisher_info.load(Ordering::SeqCst) {
            return Err(TallyError::storage("load failed"));
        }
        Ok(self.records.lock().unwrap().get(&record_key(filter)).cloned())
    }

    async fn save_publisher_info(&self, info: &PublisherInfo) -> TallyResult<()> {
        self.storage_section().await;
        if self.fail_save_publisher_info.load(Ordering::SeqCst) {
            return Err(TallyError::storage("save failed"));
        }
        let key = (
            info.id.clone(),
            info.category.bit(),
            info.month.value(),
            info.year,
        );
        self.records.lock().unwrap().insert(key, info.clone());
        Ok(())
    }

    async fn load_publisher_info_list(
        &self,
        start: u32,
        limit: u32,
        _filter: &PublisherFilter,
    ) -> TallyResult<Vec<PublisherInfo>> {
        let records = self.records.lock().unwrap();
        let mut all: Vec<PublisherInfo> = records.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all
            .into_iter()
            .skip(start as usize)
            .take(limit as usize)
            .collect())
    }

    async fn load_media_publisher_info(&self, media_key: &str) -> TallyResult<Option<String>> {
        Ok(self.media_map.lock().unwrap().get(media_key).cloned())
    }

    async fn save_media_publisher_info(
        &self,
        media_key: &str,
        publisher_id: &str,
    ) -> TallyResult<()> {
        self.media_map
            .lock()
            .unwrap()
            .insert(media_key.to_string(), publisher_id.to_string());
        Ok(())
    }

    async fn fetch_url(
        &self,
        url: &str,
        _headers: &[String],
        _body: &str,
        _content_type: &str,
        _method: UrlMethod,
    ) -> TallyResult<String> {
        self.fetched_urls.lock().unwrap().push(url.to_string());
        self.fetch_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TallyError::network("no canned response")))
    }

    fn set_timer(&self, delay: u64) -> TimerId {
        let id = self.next_timer.fetch_add(1, Ordering::SeqCst) + 1;
        self.timers.lock().unwrap().push((delay, id));
        id
    }

    fn current_time(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn entropy(&self) -> Option<u64> {
        *self.entropy.lock().unwrap()
    }

    fn generate_guid(&self) -> String {
        format!("guid-{}", self.next_guid.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn uri_encode(&self, value: &str) -> String {
        value.replace(' ', "%20")
    }

    fn on_wallet_initialized(&self, result: TallyResult<()>) {
        self.wallet_initialized.lock().unwrap().push(result);
    }

    fn on_reconcile_complete(
        &self,
        result: TallyResult<()>,
        viewing_id: &str,
        _category: Category,
        _probi: &str,
    ) {
        self.reconcile_notices
            .lock()
            .unwrap()
            .push((result, viewing_id.to_string()));
    }
}

#[derive(Default)]
pub struct FakeWallet {
    pub ready: AtomicBool,
    pub ballots: AtomicU32,
    pub reject_state: AtomicBool,
    pub stamp: AtomicU64,
    pub loaded_state: Mutex<Vec<String>>,
    pub reconciles: Mutex<Vec<String>>,
    pub votes: Mutex<Vec<(Vec<String>, String)>>,
    pub prepared: AtomicU32,
}

impl FakeWallet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl WalletClient for FakeWallet {
    fn load_state(&self, data: &str) -> TallyResult<()> {
        if self.reject_state.load(Ordering::SeqCst) {
            return Err(TallyError::InvalidLedgerState("bad blob".into()));
        }
        self.loaded_state.lock().unwrap().push(data.to_string());
        Ok(())
    }

    async fn register_persona(&self) -> TallyResult<()> {
        Ok(())
    }

    fn is_ready_for_reconcile(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn reconcile(&self, viewing_id: &str) -> TallyResult<()> {
        self.reconciles.lock().unwrap().push(viewing_id.to_string());
        Ok(())
    }

    fn ballot_count(&self, _viewing_id: &str) -> u32 {
        self.ballots.load(Ordering::SeqCst)
    }

    async fn vote_publishers(&self, publishers: &[String], viewing_id: &str) {
        self.votes
            .lock()
            .unwrap()
            .push((publishers.to_vec(), viewing_id.to_string()));
    }

    async fn prepare_ballots(&self) {
        self.prepared.fetch_add(1, Ordering::SeqCst);
    }

    fn reconcile_stamp(&self) -> u64 {
        self.stamp.load(Ordering::SeqCst)
    }
}

/// Resolver that treats any URL mentioning a known provider as media
/// and reads the attribution straight out of the part map.
#[derive(Default)]
pub struct FakeMedia;

impl MediaResolver for FakeMedia {
    fn link_type(&self, url: &str, _first_party_url: &str, _referrer: &str) -> Option<String> {
        ["youtube", "twitch"]
            .iter()
            .find(|provider| url.contains(*provider))
            .map(|provider| provider.to_string())
    }

    fn post_parts(&self, post_data: &str, _link_type: &str) -> Vec<HashMap<String, String>> {
        post_data
            .split(';')
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| {
                chunk
                    .split(',')
                    .filter_map(|pair| pair.split_once('='))
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .collect()
    }

    fn resolve(&self, parts: &HashMap<String, String>, _link_type: &str) -> Option<MediaEvent> {
        Some(MediaEvent {
            media_key: parts.get("media_key")?.clone(),
            publisher_key: parts.get("publisher_key")?.clone(),
            duration: parts.get("duration")?.parse().ok()?,
            favicon_url: parts.get("favicon").cloned().unwrap_or_default(),
        })
    }
}

pub struct Fixture {
    pub host: Arc<FakeHost>,
    pub wallet: Arc<FakeWallet>,
    pub ledger: Ledger,
}

/// Ledger wired to fresh fakes with the default configuration.
pub fn fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let host = FakeHost::new();
    let wallet = FakeWallet::new();
    let ledger = Ledger::new(
        host.clone(),
        wallet.clone(),
        Arc::new(FakeMedia),
        EngineConfig::default(),
    )
    .expect("default config is valid");
    Fixture { host, wallet, ledger }
}

/// A browsable page in tab `tab_id` on `domain`.
pub fn page(tab_id: u32, domain: &str) -> tally_types::TabSnapshot {
    tally_types::TabSnapshot {
        tab_id,
        domain: domain.to_string(),
        tld: domain.to_string(),
        path: "/".to_string(),
        favicon_url: format!("https://{domain}/favicon.ico"),
        local_month: Month::June,
        local_year: 2018,
    }
}

/// Drives one full visit through the tab aggregator. The start time is
/// clamped to 1 because clock value 0 means "no open span" to the
/// aggregator.
pub async fn browse(ledger: &Ledger, tab_id: u32, domain: &str, start_ms: u64, duration_ms: u64) {
    let start = start_ms.max(1);
    ledger.on_load(page(tab_id, domain), start);
    ledger.on_show(tab_id, start);
    ledger.on_hide(tab_id, start + duration_ms).await;
}
