//! Recovery displays: curated public stories about a recovered bike.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::StolenRecord;

/// Hour of day (UTC) assigned to displays created from a bare date.
const DATE_INPUT_HOUR: u32 = 6;

/// A published recovery story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryDisplay {
    /// Storage id (assigned by storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Record the story is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stolen_record_id: Option<i64>,
    /// The quoted recovery story.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    /// Who the quote is attributed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_by: Option<String>,
    /// When the bike was recovered.
    pub date_recovered: DateTime<Utc>,
    /// Optional link to more of the story.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl RecoveryDisplay {
    /// An empty display dated `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            stolen_record_id: None,
            quote: None,
            quote_by: None,
            date_recovered: now,
            link: None,
        }
    }

    /// Build a display from a recovered record, linking the record's bike.
    ///
    /// A missing record yields an empty display rather than an error.
    #[must_use]
    pub fn from_stolen_record(
        record: Option<&StolenRecord>,
        owner_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut display = Self::new(now);
        let Some(record) = record else {
            return display;
        };

        display.stolen_record_id = Some(record.id);
        display.quote = record.recovered_description.clone();
        display.quote_by = owner_name.map(str::to_string);
        display.date_recovered = record.recovered_at.unwrap_or(now);
        display.link = record.bike_id.map(|bike_id| format!("/bikes/{bike_id}"));
        display
    }

    /// Set the recovery date from `MM-DD-YYYY` input, at 06:00 UTC.
    ///
    /// Missing or unparseable input dates the display `now`.
    pub fn set_time(&mut self, date_input: Option<&str>, now: DateTime<Utc>) {
        self.date_recovered = date_input
            .and_then(|input| NaiveDate::parse_from_str(input.trim(), "%m-%d-%Y").ok())
            .and_then(|date| {
                NaiveTime::from_hms_opt(DATE_INPUT_HOUR, 0, 0).map(|time| date.and_time(time))
            })
            .map_or(now, |naive| naive.and_utc());
    }
}
