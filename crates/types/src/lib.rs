//! Shared data model for the tally attention ledger.
//!
//! Everything the engine persists or exchanges with its host lives here:
//! publisher records, persisted settings, balance reports, the error
//! taxonomy and the engine configuration.

pub mod config;
pub mod constants;
pub mod errors;
pub mod publisher;
pub mod state;

pub use config::EngineConfig;
pub use errors::{TallyError, TallyResult};
pub use publisher::{
    Category, ContributionInfo, Month, PaymentData, PublisherFilter, PublisherInfo, TabSnapshot,
};
pub use state::{balance_report_key, BalanceReport, PublisherState};
