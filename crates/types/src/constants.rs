//! Fixed domain constants shared across the engine.

/// Inverse time scale of the concave attention score, in 1/ms.
///
/// `1 / (2 * SCORE_TIME_SCALE)` is the 15-second knee past which extra
/// attention on a page earns visibly diminishing returns.
pub const SCORE_TIME_SCALE: f64 = 1.0 / (30.0 * 1000.0);

/// Default minimum visit duration before a sample counts, in milliseconds.
pub const DEFAULT_MIN_VISIT_DURATION_MS: u64 = 8_000;

/// Default minimum number of visits before a publisher is eligible.
pub const DEFAULT_MIN_VISITS: u32 = 1;

/// Default interval between successful publishers-list refreshes, in seconds.
pub const PUBLISHERS_LIST_REFRESH_INTERVAL: u64 = 86_400;

/// Bounds of the randomized retry delay after a failed refresh, in seconds.
pub const REFRESH_RETRY_MIN_SECONDS: u64 = 300;
pub const REFRESH_RETRY_MAX_SECONDS: u64 = 3_600;

/// Production endpoint serving the verified/excluded publishers list.
pub const DEFAULT_PUBLISHERS_LIST_URL: &str = "https://publishers.tally.network/api/v1/list";

/// Media providers whose keys bypass the minimum-duration gate.
/// A media publisher id is `<provider>#<attribution>`, e.g.
/// `youtube#channel:UC...`.
pub const MEDIA_PROVIDERS: &[&str] = &["youtube", "twitch"];

/// Returns the media provider owning `publisher_id`, if any.
pub fn media_provider(publisher_id: &str) -> Option<&'static str> {
    let (prefix, _) = publisher_id.split_once('#')?;
    MEDIA_PROVIDERS.iter().copied().find(|p| *p == prefix)
}
