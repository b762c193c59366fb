//! Collaborator traits: the capability surface the engine consumes.
//!
//! The engine performs no HTTP, timekeeping, disk I/O or entropy
//! gathering of its own; all of it is requested from the host through
//! [`HostClient`]. Wallet cryptography and media attribution live
//! behind [`WalletClient`] and [`MediaResolver`]. Tests supply fakes.

use std::collections::HashMap;

use async_trait::async_trait;

use tally_types::{Category, PublisherFilter, PublisherInfo, TallyResult};

/// Host-issued single-shot timer handle; never zero.
pub type TimerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlMethod {
    Get,
    Put,
    Post,
}

/// Everything the host does on the engine's behalf.
///
/// Storage reads return `Ok(None)` on a miss; a miss is the normal
/// first-observation path, not an error.
#[async_trait]
pub trait HostClient: Send + Sync {
    async fn load_ledger_state(&self) -> TallyResult<Option<String>>;
    async fn save_ledger_state(&self, data: &str) -> TallyResult<()>;
    async fn load_publisher_state(&self) -> TallyResult<Option<String>>;
    async fn save_publisher_state(&self, data: &str) -> TallyResult<()>;

    /// Persists the raw publishers-list body as fetched.
    async fn save_publishers_list(&self, data: &str) -> TallyResult<()>;

    async fn load_publisher_info(
        &self,
        filter: &PublisherFilter,
    ) -> TallyResult<Option<PublisherInfo>>;
    async fn save_publisher_info(&self, info: &PublisherInfo) -> TallyResult<()>;
    async fn load_publisher_info_list(
        &self,
        start: u32,
        limit: u32,
        filter: &PublisherFilter,
    ) -> TallyResult<Vec<PublisherInfo>>;

    /// Media-key -> publisher-id mapping.
    async fn load_media_publisher_info(&self, media_key: &str) -> TallyResult<Option<String>>;
    async fn save_media_publisher_info(
        &self,
        media_key: &str,
        publisher_id: &str,
    ) -> TallyResult<()>;

    /// Issues an HTTP request and resolves with the response body.
    async fn fetch_url(
        &self,
        url: &str,
        headers: &[String],
        body: &str,
        content_type: &str,
        method: UrlMethod,
    ) -> TallyResult<String>;

    /// Arms a single-shot timer `delay` seconds out and returns its id.
    /// The host calls [`crate::ledger::Ledger::on_timer`] when it fires.
    fn set_timer(&self, delay: u64) -> TimerId;

    /// Wall-clock seconds since epoch.
    fn current_time(&self) -> u64;

    /// Host entropy for RNG seeding, if the platform has a source.
    fn entropy(&self) -> Option<u64>;

    fn generate_guid(&self) -> String;
    fn uri_encode(&self, value: &str) -> String;

    /// One-shot initialization report.
    fn on_wallet_initialized(&self, result: TallyResult<()>);

    /// Forwarded notification when a reconcile round finishes.
    fn on_reconcile_complete(
        &self,
        result: TallyResult<()>,
        viewing_id: &str,
        category: Category,
        probi: &str,
    );
}

/// The wallet subsystem, as far as the engine needs it.
#[async_trait]
pub trait WalletClient: Send + Sync {
    /// Parses the persisted wallet blob. Any error is surfaced to the
    /// host as an invalid-ledger-state condition.
    fn load_state(&self, data: &str) -> TallyResult<()>;

    /// Creates a fresh wallet persona.
    async fn register_persona(&self) -> TallyResult<()>;

    fn is_ready_for_reconcile(&self) -> bool;
    async fn reconcile(&self, viewing_id: &str) -> TallyResult<()>;

    /// Ballots available for the finished reconcile round.
    fn ballot_count(&self, viewing_id: &str) -> u32;

    async fn vote_publishers(&self, publishers: &[String], viewing_id: &str);
    async fn prepare_ballots(&self);

    fn reconcile_stamp(&self) -> u64;
}

/// A media request attributed to a publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEvent {
    /// Stable key of the media resource, e.g. `youtube_<video id>`.
    pub media_key: String,
    /// Publisher id the resource belongs to, e.g. `youtube#channel:...`.
    pub publisher_key: String,
    pub duration: u64,
    pub favicon_url: String,
}

/// Provider-specific URL parsing and attribution.
pub trait MediaResolver: Send + Sync {
    /// Classifies a request; `None` means not a supported media URL.
    fn link_type(&self, url: &str, first_party_url: &str, referrer: &str) -> Option<String>;

    /// Splits a POST body into per-event part maps (some providers batch
    /// several events into one request).
    fn post_parts(&self, post_data: &str, link_type: &str) -> Vec<HashMap<String, String>>;

    /// Attributes one event's parts to a publisher.
    fn resolve(&self, parts: &HashMap<String, String>, link_type: &str) -> Option<MediaEvent>;
}
