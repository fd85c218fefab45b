//! Promoted theft alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a promoted alert campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TheftAlertStatus {
    /// Purchased, not yet running.
    #[default]
    Pending,
    /// Running.
    Active,
    /// Finished or cancelled.
    Inactive,
}

impl TheftAlertStatus {
    /// The stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for TheftAlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A paid theft-alert campaign attached to a stolen record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheftAlert {
    /// Storage id.
    pub id: i64,
    /// Record being promoted.
    pub stolen_record_id: i64,
    /// Campaign status.
    pub status: TheftAlertStatus,
    /// User who purchased the alert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// When the alert was created.
    pub created_at: DateTime<Utc>,
}

impl TheftAlert {
    /// Whether the campaign is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == TheftAlertStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(TheftAlertStatus::parse("active"), Some(TheftAlertStatus::Active));
        assert_eq!(TheftAlertStatus::parse("pending"), Some(TheftAlertStatus::Pending));
        assert_eq!(TheftAlertStatus::parse("paid"), None);
    }

    #[test]
    fn test_default_is_pending() {
        assert_eq!(TheftAlertStatus::default(), TheftAlertStatus::Pending);
    }

    #[test]
    fn test_is_active() {
        let mut alert = TheftAlert {
            id: 1,
            stolen_record_id: 2,
            status: TheftAlertStatus::Pending,
            user_id: None,
            created_at: Utc::now(),
        };
        assert!(!alert.is_active());
        alert.status = TheftAlertStatus::Active;
        assert!(alert.is_active());
    }
}
