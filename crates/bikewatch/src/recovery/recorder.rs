//! Recording a recovery against a stolen record.
//!
//! The whole state transition runs in one transaction. Side effects are not
//! performed here; they are returned as [`Effect`] values for the caller to
//! dispatch once the transaction has committed.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::StolenRecord;
use crate::storage::{alerts, bikes, stolen_records, Storage};

use super::time::resolve_recovered_at;

/// A submitted recovery.
///
/// Booleans accept JSON booleans, integers, and form-style strings
/// (`"true"`, `"1"`, `"yes"`, `"on"` and their negatives).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryReport {
    /// Owner's account of the recovery.
    pub recovered_description: Option<String>,
    /// The registry helped get the bike back.
    #[serde(deserialize_with = "flexible_bool")]
    pub index_helped_recovery: bool,
    /// Owner consents to the recovery being publicized.
    ///
    /// Absent means `false`: a recovery is never shared without an explicit
    /// yes.
    #[serde(deserialize_with = "flexible_bool")]
    pub can_share_recovery: bool,
    /// User reporting the recovery.
    pub recovering_user_id: Option<i64>,
    /// When the bike was recovered; absent means now.
    pub recovered_at: Option<String>,
    /// IANA zone for a naive `recovered_at`.
    pub timezone: Option<String>,
}

impl RecoveryReport {
    /// Stamp the report onto a record and take it out of stolen status.
    pub fn apply(&self, record: &mut StolenRecord, recovered_at: DateTime<Utc>) {
        record.current = false;
        record.recovered_at = Some(recovered_at);
        record.recovered_description = self
            .recovered_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        record.index_helped_recovery = self.index_helped_recovery;
        record.can_share_recovery = self.can_share_recovery;
        record.recovering_user_id = self.recovering_user_id;
    }
}

fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Option::<Flexible>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Flexible::Bool(value)) => Ok(value),
        Some(Flexible::Int(value)) => Ok(value != 0),
        Some(Flexible::Text(text)) => parse_bool_text(&text)
            .ok_or_else(|| D::Error::custom(format!("expected a boolean, got {text:?}"))),
    }
}

fn parse_bool_text(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "off" | "" => Some(false),
        _ => None,
    }
}

/// A side effect requested by a committed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// A bike with a promoted theft alert was recovered; admins should stop
    /// the promotion.
    NotifyPromotedAlertRecovery {
        /// The recovered record.
        stolen_record_id: i64,
        /// The active alert.
        theft_alert_id: i64,
    },
}

/// Result of recording a recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryOutcome {
    /// The record as stored after the transition.
    pub stolen_record: StolenRecord,
    /// Effects to dispatch after commit.
    pub effects: Vec<Effect>,
    /// An alert image was released.
    pub released_alert_image: bool,
}

/// Mark a stolen record recovered.
///
/// Stamps the report, takes the record out of current status, returns the
/// bike to its owner when this was its current record, and releases the
/// record's alert image. A notification effect is produced only on the
/// transition out of current status while an active theft alert exists, so
/// repeated submissions never notify twice.
///
/// # Errors
///
/// Returns [`Error::StolenRecordNotFound`] or a database error; on error
/// nothing is written.
pub fn record_recovery(
    storage: &mut Storage,
    stolen_record_id: i64,
    report: &RecoveryReport,
    default_tz: Tz,
    now: DateTime<Utc>,
) -> Result<RecoveryOutcome> {
    let recovered_at = resolve_recovered_at(
        report.recovered_at.as_deref(),
        report.timezone.as_deref(),
        default_tz,
        now,
    );

    let tx = storage.transaction()?;
    let mut record = stolen_records::fetch_record(&tx, stolen_record_id)?
        .ok_or(Error::StolenRecordNotFound(stolen_record_id))?;
    let was_current = record.current;

    report.apply(&mut record, recovered_at);
    stolen_records::save_recovery(&tx, &record)?;

    let bike_released = match record.bike_id {
        Some(bike_id) => bikes::release_stolen_status(&tx, bike_id, record.id)?,
        None => false,
    };
    let released_alert_image = alerts::delete_alert_image(&tx, record.id)?;

    let mut effects = Vec::new();
    if was_current {
        if let Some(alert) = alerts::active_theft_alert(&tx, record.id)? {
            effects.push(Effect::NotifyPromotedAlertRecovery {
                stolen_record_id: record.id,
                theft_alert_id: alert.id,
            });
        }
    } else {
        debug!(stolen_record_id, "Record was already recovered, updating details only");
    }

    let stolen_record = stolen_records::require_record(&tx, record.id)?;
    tx.commit()?;

    info!(
        stolen_record_id,
        %recovered_at,
        bike_released,
        released_alert_image,
        effects = effects.len(),
        "Recorded recovery"
    );
    Ok(RecoveryOutcome {
        stolen_record,
        effects,
        released_alert_image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert_image::PathRenderer;
    use crate::model::{BikeStatus, NewBike, NewStolenRecord, TheftAlertStatus};

    struct Fixture {
        storage: Storage,
        bike_id: i64,
        record_id: i64,
    }

    fn fixture() -> Fixture {
        let mut storage = Storage::open_in_memory().unwrap();
        let mut new = NewBike::new("WSBC602", "Surly");
        new.owner_id = Some(4);
        let bike = storage.register_bike(&new).unwrap();
        let record = storage
            .report_stolen(bike.id, NewStolenRecord::default())
            .unwrap();
        Fixture {
            storage,
            bike_id: bike.id,
            record_id: record.id,
        }
    }

    fn record(fx: &mut Fixture, report: &RecoveryReport) -> RecoveryOutcome {
        record_recovery(&mut fx.storage, fx.record_id, report, Tz::UTC, Utc::now()).unwrap()
    }

    #[test]
    fn test_recovery_with_empty_report() {
        let mut fx = fixture();
        let outcome = record(&mut fx, &RecoveryReport::default());

        let stored = &outcome.stolen_record;
        assert!(!stored.current);
        assert!(stored.recovered_at.is_some());
        assert!(!stored.can_share_recovery);
        assert!(!stored.index_helped_recovery);
        assert!(outcome.effects.is_empty());

        let bike = fx.storage.get_bike(fx.bike_id).unwrap().unwrap();
        assert_eq!(bike.status, BikeStatus::StatusWithOwner);
        assert_eq!(bike.current_stolen_record_id, None);
    }

    #[test]
    fn test_recovery_stamps_report() {
        let mut fx = fixture();
        let report = RecoveryReport {
            recovered_description: Some("  found it on craigslist ".to_string()),
            index_helped_recovery: true,
            can_share_recovery: true,
            recovering_user_id: Some(4),
            recovered_at: Some("2017-01-31T23:57:56".to_string()),
            timezone: Some("Atlantic/Reykjavik".to_string()),
        };

        let stored = record(&mut fx, &report).stolen_record;
        assert_eq!(stored.recovered_description.as_deref(), Some("found it on craigslist"));
        assert!(stored.index_helped_recovery);
        assert!(stored.can_share_recovery);
        assert!(stored.recovered_by_owner(Some(4)));
        assert_eq!(stored.recovered_at.map(|t| t.timestamp()), Some(1_485_907_076));
    }

    #[test]
    fn test_bad_time_falls_back_to_now() {
        crate::logging::init_test_logging();
        let mut fx = fixture();
        let now = Utc::now();
        let report = RecoveryReport {
            recovered_at: Some("whenever".to_string()),
            ..RecoveryReport::default()
        };

        let outcome =
            record_recovery(&mut fx.storage, fx.record_id, &report, Tz::UTC, now).unwrap();
        let stored_at = outcome.stolen_record.recovered_at.unwrap();
        assert_eq!(stored_at.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_missing_record() {
        let mut fx = fixture();
        let result = record_recovery(
            &mut fx.storage,
            999,
            &RecoveryReport::default(),
            Tz::UTC,
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::StolenRecordNotFound(999))));
    }

    #[test]
    fn test_active_alert_emits_one_effect() {
        let mut fx = fixture();
        let alert = fx
            .storage
            .create_theft_alert(fx.record_id, TheftAlertStatus::Active, None)
            .unwrap();

        let first = record(&mut fx, &RecoveryReport::default());
        assert_eq!(
            first.effects,
            vec![Effect::NotifyPromotedAlertRecovery {
                stolen_record_id: fx.record_id,
                theft_alert_id: alert.id,
            }]
        );

        let again = RecoveryReport {
            recovered_description: Some("more detail".to_string()),
            ..RecoveryReport::default()
        };
        let second = record(&mut fx, &again);
        assert!(second.effects.is_empty());
        assert_eq!(
            second.stolen_record.recovered_description.as_deref(),
            Some("more detail")
        );
    }

    #[test]
    fn test_inactive_alert_emits_nothing() {
        let mut fx = fixture();
        fx.storage
            .create_theft_alert(fx.record_id, TheftAlertStatus::Pending, None)
            .unwrap();
        fx.storage
            .create_theft_alert(fx.record_id, TheftAlertStatus::Inactive, None)
            .unwrap();

        assert!(record(&mut fx, &RecoveryReport::default()).effects.is_empty());
    }

    #[test]
    fn test_recovery_releases_alert_image() {
        let mut fx = fixture();
        fx.storage.add_photo(fx.bike_id, "bike.jpg", false).unwrap();
        fx.storage
            .generate_alert_image(fx.record_id, None, &PathRenderer::new("alerts", ["jpg"]))
            .unwrap()
            .unwrap();

        let outcome = record(&mut fx, &RecoveryReport::default());
        assert!(outcome.released_alert_image);
        assert!(fx.storage.alert_image(fx.record_id).unwrap().is_none());
    }

    #[test]
    fn test_failed_write_rolls_back_everything() {
        let mut fx = fixture();
        fx.storage
            .create_theft_alert(fx.record_id, TheftAlertStatus::Active, None)
            .unwrap();
        fx.storage.add_photo(fx.bike_id, "bike.jpg", false).unwrap();
        let image = fx
            .storage
            .generate_alert_image(fx.record_id, None, &PathRenderer::new("alerts", ["jpg"]))
            .unwrap()
            .unwrap();

        let tx = fx.storage.transaction().unwrap();
        tx.execute_batch(
            "CREATE TRIGGER bikes_read_only BEFORE UPDATE ON bikes \
             BEGIN SELECT RAISE(ABORT, 'bikes are read only'); END;",
        )
        .unwrap();
        tx.commit().unwrap();

        let report = RecoveryReport {
            can_share_recovery: true,
            ..RecoveryReport::default()
        };
        let result = record_recovery(&mut fx.storage, fx.record_id, &report, Tz::UTC, Utc::now());
        assert!(matches!(result, Err(Error::DatabaseQuery(_))));

        let stored = fx.storage.get_stolen_record(fx.record_id).unwrap().unwrap();
        assert!(stored.current);
        assert_eq!(stored.recovered_at, None);
        assert!(!stored.can_share_recovery);

        let bike = fx.storage.get_bike(fx.bike_id).unwrap().unwrap();
        assert_eq!(bike.status, BikeStatus::StatusStolen);
        assert_eq!(bike.current_stolen_record_id, Some(fx.record_id));
        assert_eq!(fx.storage.alert_image(fx.record_id).unwrap(), Some(image));
    }

    #[test]
    fn test_unstorable_time_falls_back_to_now() {
        let mut fx = fixture();
        let now = Utc::now();
        let report = RecoveryReport {
            recovered_at: Some("300000000000".to_string()),
            ..RecoveryReport::default()
        };

        record_recovery(&mut fx.storage, fx.record_id, &report, Tz::UTC, now).unwrap();
        let stored = fx.storage.get_stolen_record(fx.record_id).unwrap().unwrap();
        assert!(!stored.current);
        assert_eq!(
            stored.recovered_at.map(|t| t.timestamp_micros()),
            Some(now.timestamp_micros())
        );
    }

    #[test]
    fn test_old_record_leaves_newer_theft_alone() {
        let mut fx = fixture();
        let newer = fx
            .storage
            .report_stolen(fx.bike_id, NewStolenRecord::default())
            .unwrap();

        record(&mut fx, &RecoveryReport::default());

        let bike = fx.storage.get_bike(fx.bike_id).unwrap().unwrap();
        assert_eq!(bike.status, BikeStatus::StatusStolen);
        assert_eq!(bike.current_stolen_record_id, Some(newer.id));
    }

    #[test]
    fn test_report_from_form_strings() {
        let report: RecoveryReport = serde_json::from_str(
            r#"{
                "recovered_description": "stuff",
                "index_helped_recovery": "true",
                "can_share_recovery": "0",
                "recovering_user_id": 69,
                "timezone": "America/Chicago"
            }"#,
        )
        .unwrap();
        assert!(report.index_helped_recovery);
        assert!(!report.can_share_recovery);
        assert_eq!(report.recovering_user_id, Some(69));
    }

    #[test]
    fn test_report_defaults_sharing_to_false() {
        let report: RecoveryReport = serde_json::from_str("{}").unwrap();
        assert_eq!(report, RecoveryReport::default());

        let report: RecoveryReport =
            serde_json::from_str(r#"{"can_share_recovery": null, "index_helped_recovery": 1}"#)
                .unwrap();
        assert!(!report.can_share_recovery);
        assert!(report.index_helped_recovery);
    }

    #[test]
    fn test_report_rejects_non_boolean_text() {
        let result: std::result::Result<RecoveryReport, _> =
            serde_json::from_str(r#"{"can_share_recovery": "perhaps"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_effect_serialization() {
        let effect = Effect::NotifyPromotedAlertRecovery {
            stolen_record_id: 1,
            theft_alert_id: 2,
        };
        let json = serde_json::to_value(effect).unwrap();
        assert_eq!(json["type"], "notify_promoted_alert_recovery");
        assert_eq!(json["theft_alert_id"], 2);
    }
}
