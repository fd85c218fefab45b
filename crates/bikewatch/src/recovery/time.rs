//! Timezone-aware parsing of submitted recovery times.

use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, warn};

/// Local formats accepted for naive timestamps, tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Years a stored timestamp can hold; storage writes four-digit years.
const STORABLE_YEARS: RangeInclusive<i32> = 0..=9999;

/// Why a submitted time could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    /// The timezone is not an IANA zone name.
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    /// The timestamp matches none of the accepted formats.
    #[error("unrecognized timestamp: {0:?}")]
    Unrecognized(String),

    /// The local time falls in a DST gap.
    #[error("{time} does not exist in {zone}")]
    NonexistentLocalTime {
        /// The submitted local time.
        time: String,
        /// The zone it was interpreted in.
        zone: String,
    },
}

/// Parse a submitted timestamp into a UTC instant.
///
/// Accepts Unix seconds, RFC 3339 (its offset wins over `timezone`), and
/// naive date/time forms interpreted in `timezone` or `default_tz`. Ambiguous
/// local times resolve to the earlier instant.
///
/// # Errors
///
/// Returns an error for unknown zones, unrecognized formats, local times
/// skipped by a DST transition, and instants outside years 0 to 9999.
pub fn parse_timestamp(
    input: &str,
    timezone: Option<&str>,
    default_tz: Tz,
) -> Result<DateTime<Utc>, TimeParseError> {
    let input = input.trim();
    let instant = parse_instant(input, timezone, default_tz)?;
    if !STORABLE_YEARS.contains(&instant.year()) {
        return Err(TimeParseError::Unrecognized(input.to_string()));
    }
    Ok(instant)
}

fn parse_instant(
    input: &str,
    timezone: Option<&str>,
    default_tz: Tz,
) -> Result<DateTime<Utc>, TimeParseError> {
    if input.is_empty() {
        return Err(TimeParseError::Unrecognized(String::new()));
    }

    if let Ok(seconds) = input.parse::<i64>() {
        return DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| TimeParseError::Unrecognized(input.to_string()));
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(input) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    let zone = match timezone.map(str::trim).filter(|tz| !tz.is_empty()) {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| TimeParseError::UnknownTimezone(name.to_string()))?,
        None => default_tz,
    };

    let naive =
        parse_naive(input).ok_or_else(|| TimeParseError::Unrecognized(input.to_string()))?;

    zone.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| TimeParseError::NonexistentLocalTime {
            time: input.to_string(),
            zone: zone.name().to_string(),
        })
}

fn parse_naive(input: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Resolve the recovery time for a report.
///
/// Absent input means "now". A parse failure also falls back to `now` with a
/// warning; a cosmetic date error never blocks a recovery.
#[must_use]
pub fn resolve_recovered_at(
    input: Option<&str>,
    timezone: Option<&str>,
    default_tz: Tz,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let Some(input) = input.filter(|i| !i.trim().is_empty()) else {
        return now;
    };
    match parse_timestamp(input, timezone, default_tz) {
        Ok(instant) => {
            debug!(%instant, "resolved recovery time");
            instant
        }
        Err(err) => {
            warn!(error = %err, "unusable recovery time, using current time");
            now
        }
    }
}
