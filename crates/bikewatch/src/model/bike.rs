//! Bikes and their photos.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ownership status of a bike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BikeStatus {
    /// Registered and in the owner's hands.
    #[default]
    StatusWithOwner,
    /// Has a current stolen record.
    StatusStolen,
    /// Held by an impounding organization.
    StatusImpounded,
    /// Reported as abandoned.
    StatusAbandoned,
}

impl BikeStatus {
    /// The stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusWithOwner => "status_with_owner",
            Self::StatusStolen => "status_stolen",
            Self::StatusImpounded => "status_impounded",
            Self::StatusAbandoned => "status_abandoned",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "status_with_owner" => Some(Self::StatusWithOwner),
            "status_stolen" => Some(Self::StatusStolen),
            "status_impounded" => Some(Self::StatusImpounded),
            "status_abandoned" => Some(Self::StatusAbandoned),
            _ => None,
        }
    }

    /// Stolen or impounded bikes cannot be reported stolen again.
    #[must_use]
    pub fn is_stolen_or_impounded(&self) -> bool {
        matches!(self, Self::StatusStolen | Self::StatusImpounded)
    }
}

impl std::fmt::Display for BikeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered bike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bike {
    /// Storage id.
    pub id: i64,
    /// Frame serial number.
    pub serial_number: String,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model name, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Primary color, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Id of the owning user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
    /// Display name of the owning user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    /// Ownership status.
    pub status: BikeStatus,
    /// Cached reference to the current stolen record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stolen_record_id: Option<i64>,
    /// When the bike was registered.
    pub created_at: DateTime<Utc>,
}

impl Bike {
    /// Whether the bike is currently reported stolen.
    #[must_use]
    pub fn is_stolen(&self) -> bool {
        self.status == BikeStatus::StatusStolen
    }

    /// Title used in exports, e.g. `"Surly Cross-Check"`.
    #[must_use]
    pub fn title(&self) -> String {
        match &self.model {
            Some(model) if !model.trim().is_empty() => format!("{} {}", self.manufacturer, model),
            _ => self.manufacturer.clone(),
        }
    }
}

/// Input for registering a bike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewBike {
    /// Frame serial number.
    pub serial_number: String,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model name.
    pub model: Option<String>,
    /// Primary color.
    pub color: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Id of the owning user.
    pub owner_id: Option<i64>,
    /// Display name of the owning user.
    pub owner_name: Option<String>,
}

impl NewBike {
    /// Create a registration with the required fields.
    #[must_use]
    pub fn new(serial_number: impl Into<String>, manufacturer: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            manufacturer: manufacturer.into(),
            ..Self::default()
        }
    }
}

/// A photo attached to a bike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BikePhoto {
    /// Storage id.
    pub id: i64,
    /// Owning bike.
    pub bike_id: i64,
    /// Location of the image file.
    pub path: String,
    /// Sort position; lowest public photo is the bike's first photo.
    pub position: i64,
    /// Private photos are never used for public images.
    pub is_private: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bike() -> Bike {
        Bike {
            id: 1,
            serial_number: "WSBC602".to_string(),
            manufacturer: "Surly".to_string(),
            model: Some("Cross-Check".to_string()),
            color: None,
            description: None,
            owner_id: Some(4),
            owner_name: None,
            status: BikeStatus::StatusWithOwner,
            current_stolen_record_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            BikeStatus::StatusWithOwner,
            BikeStatus::StatusStolen,
            BikeStatus::StatusImpounded,
            BikeStatus::StatusAbandoned,
        ] {
            assert_eq!(BikeStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BikeStatus::parse("status_unknown"), None);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(BikeStatus::StatusStolen.to_string(), "status_stolen");
    }

    #[test]
    fn test_stolen_or_impounded() {
        assert!(BikeStatus::StatusStolen.is_stolen_or_impounded());
        assert!(BikeStatus::StatusImpounded.is_stolen_or_impounded());
        assert!(!BikeStatus::StatusWithOwner.is_stolen_or_impounded());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&BikeStatus::StatusWithOwner).unwrap();
        assert_eq!(json, "\"status_with_owner\"");
    }

    #[test]
    fn test_title() {
        let mut bike = sample_bike();
        assert_eq!(bike.title(), "Surly Cross-Check");

        bike.model = None;
        assert_eq!(bike.title(), "Surly");
    }

    #[test]
    fn test_is_stolen() {
        let mut bike = sample_bike();
        assert!(!bike.is_stolen());
        bike.status = BikeStatus::StatusStolen;
        assert!(bike.is_stolen());
    }
}
