//! The recovery workflow: recording recoveries, parsing their timestamps,
//! and deriving how a recovery may be displayed.

mod recorder;
mod service;
mod status;
mod time;

pub use recorder::{record_recovery, Effect, RecoveryOutcome, RecoveryReport};
pub use service::RecoveryService;
pub use status::{
    derive_display_status, DerivedDisplayStatus, DisplayFacts, DisplayOverride,
    RecoveryDisplayStatus,
};
pub use time::{parse_timestamp, resolve_recovered_at, TimeParseError};
