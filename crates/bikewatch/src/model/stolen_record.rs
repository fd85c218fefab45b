//! Stolen records: one per theft report.
//!
//! Besides the record itself this module holds the attribute normalization
//! applied before a record is written (phone numbers, city names, theft
//! dates) and the location formatting used by exports and listings.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::Bike;
use crate::recovery::DisplayOverride;

/// Header line matching [`StolenRecord::tsv_row`].
pub const TSV_HEADER: &str = "Make\tModel\tSerial\tDescription\tArticleOrGun\tDateOfTheft\t\
     Thief\tLocation\tPoliceReport\tPoliceReportSt";

/// Trailing phone extension, e.g. `"ext. 12"`, `"extension: 000"`, `"x5"`.
static PHONE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:extension|ext\.?|x)\s*:?\s*(\d+)\s*$").expect("valid extension regex")
});

/// Where a theft happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    /// Street address; only shown publicly when forced.
    pub street: Option<String>,
    /// City name.
    pub city: Option<String>,
    /// State or province abbreviation.
    pub state: Option<String>,
    /// Postal code.
    pub zipcode: Option<String>,
    /// ISO country code.
    pub country: Option<String>,
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn round_public(coordinate: Option<f64>) -> Option<f64> {
    coordinate.map(|c| (c * 100.0).round() / 100.0)
}

impl Location {
    /// Full address, e.g. `"Chicago, IL 60647, US"`.
    ///
    /// Returns `None` without a country. The street is included only when
    /// `force_show_street` is set.
    #[must_use]
    pub fn address(&self, force_show_street: bool) -> Option<String> {
        let country = non_blank(self.country.as_ref())?;

        let mut parts: Vec<String> = Vec::new();
        if force_show_street {
            if let Some(street) = non_blank(self.street.as_ref()) {
                parts.push(street.to_string());
            }
        }
        if let Some(city) = non_blank(self.city.as_ref()) {
            parts.push(city.to_string());
        }
        let state_zip = [
            non_blank(self.state.as_ref()),
            non_blank(self.zipcode.as_ref()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        if !state_zip.is_empty() {
            parts.push(state_zip);
        }
        parts.push(country.to_string());

        Some(parts.join(", "))
    }

    /// Short public location, e.g. `"New York, NY"` or `"Amsterdam - NL"`.
    ///
    /// US locations need a state; the country is appended for non-US
    /// locations or when `include_all` is set.
    #[must_use]
    pub fn address_location(&self, include_all: bool) -> Option<String> {
        let state = non_blank(self.state.as_ref());
        let country = non_blank(self.country.as_ref());
        let domestic = country.map_or(true, |c| c.eq_ignore_ascii_case("US"));

        if state.is_none() && domestic {
            return None;
        }

        let city_state = [non_blank(self.city.as_ref()), state]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        let country = country.filter(|_| include_all || !domestic);

        let location = [Some(city_state.as_str()).filter(|s| !s.is_empty()), country]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" - ");
        Some(location).filter(|l| !l.is_empty())
    }

    /// No street given.
    #[must_use]
    pub fn without_street(&self) -> bool {
        non_blank(self.street.as_ref()).is_none()
    }
}

/// A theft report for a bike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StolenRecord {
    /// Storage id.
    pub id: i64,
    /// Owning bike; `None` once detached.
    pub bike_id: Option<i64>,
    /// True while the bike is actively reported stolen.
    pub current: bool,
    /// Reviewed by an admin.
    pub approved: bool,
    /// When the theft happened.
    pub date_stolen: Option<DateTime<Utc>>,
    /// Owner's account of the theft.
    pub theft_description: Option<String>,
    /// Where the theft happened.
    pub location: Location,
    /// Contact phone.
    pub phone: Option<String>,
    /// Secondary contact phone.
    pub secondary_phone: Option<String>,
    /// Police report number.
    pub police_report_number: Option<String>,
    /// Police department holding the report.
    pub police_report_department: Option<String>,
    /// Last time the record went out in a TSV export.
    pub tsved_at: Option<DateTime<Utc>>,
    /// When the bike was recovered.
    pub recovered_at: Option<DateTime<Utc>>,
    /// Owner's account of the recovery.
    pub recovered_description: Option<String>,
    /// The registry helped with the recovery.
    pub index_helped_recovery: bool,
    /// Owner consents to the recovery being publicized.
    pub can_share_recovery: bool,
    /// Manual curation of the recovery display status.
    pub recovery_display_override: Option<DisplayOverride>,
    /// User who reported the recovery.
    pub recovering_user_id: Option<i64>,
    /// Recovery has been posted publicly.
    pub recovery_posted: bool,
    /// Token for the emailed "mark recovered" link.
    pub recovery_link_token: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl StolenRecord {
    /// The record has left stolen status.
    #[must_use]
    pub fn is_recovered(&self) -> bool {
        !self.current
    }

    /// See [`Location::address`].
    #[must_use]
    pub fn address(&self, force_show_street: bool) -> Option<String> {
        self.location.address(force_show_street)
    }

    /// See [`Location::address_location`].
    #[must_use]
    pub fn address_location(&self, include_all: bool) -> Option<String> {
        self.location.address_location(include_all)
    }

    /// No street address was given.
    #[must_use]
    pub fn without_location(&self) -> bool {
        self.location.without_street()
    }

    /// Enough location detail to show the theft checklist.
    #[must_use]
    pub fn display_checklist(&self) -> bool {
        self.address(false).is_some()
    }

    /// Latitude rounded to two decimals for public display.
    #[must_use]
    pub fn latitude_public(&self) -> Option<f64> {
        round_public(self.location.latitude)
    }

    /// Longitude rounded to two decimals for public display.
    #[must_use]
    pub fn longitude_public(&self) -> Option<f64> {
        round_public(self.location.longitude)
    }

    /// Recovery was reported by the bike's owner.
    #[must_use]
    pub fn recovered_by_owner(&self, owner_id: Option<i64>) -> bool {
        matches!((self.recovering_user_id, owner_id), (Some(user), Some(owner)) if user == owner)
    }

    /// Recovery was reported by someone other than the owner.
    #[must_use]
    pub fn recovered_by_other_user(&self, owner_id: Option<i64>) -> bool {
        self.recovering_user_id.is_some() && !self.recovered_by_owner(owner_id)
    }

    /// One export row, ten tab-separated columns, see [`TSV_HEADER`].
    #[must_use]
    pub fn tsv_row(&self, bike: &Bike) -> String {
        let date_stolen = self
            .date_stolen
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let columns = [
            bike.manufacturer.clone(),
            bike.model.clone().unwrap_or_default(),
            bike.serial_number.clone(),
            bike.description.clone().unwrap_or_default(),
            "1".to_string(),
            date_stolen,
            String::new(),
            self.address_location(true).unwrap_or_default(),
            self.police_report_number.clone().unwrap_or_default(),
            self.police_report_department.clone().unwrap_or_default(),
        ];
        columns
            .iter()
            .map(|c| tsv_escape(c))
            .collect::<Vec<_>>()
            .join("\t")
    }
}

fn tsv_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\r', "")
        .replace('\n', "\\n")
}

/// Input for reporting a theft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewStolenRecord {
    /// Reviewed by an admin.
    pub approved: bool,
    /// When the theft happened.
    pub date_stolen: Option<DateTime<Utc>>,
    /// Owner's account of the theft.
    pub theft_description: Option<String>,
    /// Where the theft happened.
    pub location: Location,
    /// Contact phone.
    pub phone: Option<String>,
    /// Secondary contact phone.
    pub secondary_phone: Option<String>,
    /// Police report number.
    pub police_report_number: Option<String>,
    /// Police department holding the report.
    pub police_report_department: Option<String>,
}

impl NewStolenRecord {
    /// Apply the calculated attributes written with every theft report.
    pub fn normalize(&mut self, now: DateTime<Utc>) {
        self.phone = self.phone.as_deref().and_then(normalize_phone);
        self.secondary_phone = self.secondary_phone.as_deref().and_then(normalize_phone);
        self.location.city = self.location.city.as_deref().and_then(normalize_city);
        self.date_stolen = self.date_stolen.map(|d| correct_date_stolen(d, now));
    }
}

/// Normalize a phone number to digits, keeping a `+` country code and an
/// extension: `"+220000000000 extension: 000"` becomes `"+22 0000000000 x000"`.
///
/// Returns `None` when no digits remain.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (number, extension) = match PHONE_EXTENSION.captures(trimmed) {
        Some(caps) => {
            let start = caps.get(0).map_or(trimmed.len(), |m| m.start());
            (&trimmed[..start], caps.get(1).map(|m| m.as_str()))
        }
        None => (trimmed, None),
    };

    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    let mut phone = if number.trim_start().starts_with('+') && digits.len() > 10 {
        let split = digits.len() - 10;
        format!("+{} {}", &digits[..split], &digits[split..])
    } else {
        digits
    };
    if let Some(ext) = extension {
        phone.push_str(" x");
        phone.push_str(ext);
    }
    Some(phone)
}

/// Keep the part of a city before the first comma, title-cased:
/// `"INDIANAPOLIS, IN USA"` becomes `"Indianapolis"`.
#[must_use]
pub fn normalize_city(raw: &str) -> Option<String> {
    let city = raw.split(',').next().unwrap_or_default();
    let words: Vec<String> = city
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect();
    Some(words.join(" ")).filter(|c| !c.is_empty())
}

/// Repair obviously mistyped theft dates.
///
/// Two-digit years land in this century, years more than a century back are
/// moved forward a century, and dates in the future move back one year.
#[must_use]
pub fn correct_date_stolen(date: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let mut corrected = date;
    if corrected.year() < 100 {
        corrected = shift_year(corrected, 2000 + corrected.year());
    } else if corrected.year() < now.year() - 100 {
        corrected = shift_year(corrected, corrected.year() + 100);
    }
    if corrected > now {
        corrected = shift_year(corrected, corrected.year() - 1);
    }
    corrected
}

fn shift_year(date: DateTime<Utc>, year: i32) -> DateTime<Utc> {
    // Feb 29 has no counterpart in most years.
    date.with_year(year)
        .or_else(|| (date - Duration::days(1)).with_year(year))
        .unwrap_or(date)
}
