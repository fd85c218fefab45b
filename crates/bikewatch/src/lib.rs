//! `bikewatch` - Stolen bike registry with recovery tracking
//!
//! This library provides bike and theft record storage, the recovery
//! workflow, recovery display curation, and post-commit notification
//! dispatch.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod alert_image;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod model;
pub mod recovery;
pub mod storage;

pub use alert_image::{AlertImage, AlertImageRenderer, PathRenderer};
pub use config::Config;
pub use dispatch::{EffectDispatcher, LogNotifier, Notifier, RecordingNotifier};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use recovery::{
    derive_display_status, record_recovery, RecoveryDisplayStatus, RecoveryReport,
    RecoveryService,
};
pub use storage::{RecordScope, Storage, StorageStats};
