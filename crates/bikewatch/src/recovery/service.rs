//! Commit-then-dispatch orchestration of recoveries.

use chrono::Utc;
use chrono_tz::Tz;
use tracing::debug;

use crate::dispatch::EffectDispatcher;
use crate::error::Result;
use crate::storage::Storage;

use super::recorder::{record_recovery, RecoveryOutcome, RecoveryReport};
use super::status::DerivedDisplayStatus;

/// Records recoveries and hands their effects to the dispatcher.
#[derive(Debug)]
pub struct RecoveryService<'a> {
    storage: &'a mut Storage,
    dispatcher: &'a EffectDispatcher,
    default_timezone: Tz,
}

impl<'a> RecoveryService<'a> {
    /// Create a service over open storage and a running dispatcher.
    #[must_use]
    pub fn new(
        storage: &'a mut Storage,
        dispatcher: &'a EffectDispatcher,
        default_timezone: Tz,
    ) -> Self {
        Self {
            storage,
            dispatcher,
            default_timezone,
        }
    }

    /// Record a recovery, then queue its effects.
    ///
    /// Effects are queued only after the transaction commits; a failed
    /// recovery queues nothing.
    ///
    /// # Errors
    ///
    /// Returns the recorder's error; see [`record_recovery`].
    pub fn record(
        &mut self,
        stolen_record_id: i64,
        report: &RecoveryReport,
    ) -> Result<RecoveryOutcome> {
        let outcome = record_recovery(
            self.storage,
            stolen_record_id,
            report,
            self.default_timezone,
            Utc::now(),
        )?;
        let queued = self.dispatcher.dispatch(outcome.effects.iter().copied());
        debug!(stolen_record_id, queued, "Queued recovery effects");
        Ok(outcome)
    }

    /// The record's recovery display status.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is missing or the read fails.
    pub fn display_status(&self, stolen_record_id: i64) -> Result<DerivedDisplayStatus> {
        self.storage.display_status(stolen_record_id)
    }
}
