//! Publisher attention and contribution engine.
//!
//! The engine observes attention (visit durations per site), ranks
//! publishers by a concave attention score, normalizes the scores into
//! an integer percentage budget summing to 100, and converts that
//! budget into a ballot tally at reconcile time. It owns no I/O: the
//! host supplies storage, HTTP, timers, time and entropy through
//! [`host::HostClient`], and the wallet and media subsystems plug in
//! behind [`host::WalletClient`] and [`host::MediaResolver`].
//!
//! [`ledger::Ledger`] is the composition root and the only type most
//! hosts need.

pub mod attention;
pub mod ballots;
pub mod host;
pub mod ledger;
pub mod orchestrator;
pub mod refresh;
pub mod registry;
pub mod scoring;
pub mod state;
pub mod synopsis;
pub mod tabs;

pub use ballots::Winner;
pub use host::{HostClient, MediaEvent, MediaResolver, TimerId, UrlMethod, WalletClient};
pub use ledger::Ledger;
pub use synopsis::PublisherSnapshot;
