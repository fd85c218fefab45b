//! Recovery display status derivation.
//!
//! A recovered record is classified into one of five display states. Manual
//! curation is stored as an optional [`DisplayOverride`]; everything else is
//! computed from the record's facts on read.

use serde::{Deserialize, Serialize};

use crate::model::StolenRecord;

/// Display state of a recovery, as consumed by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryDisplayStatus {
    /// Still stolen, or the owner did not consent to sharing.
    NotEligible,
    /// Shareable, but the bike has no photo to show.
    DisplayableNoPhoto,
    /// Shareable with a photo; nobody has curated it yet.
    WaitingOnDecision,
    /// A recovery story is published.
    Displayed,
    /// Curated out of display.
    NotDisplayed,
}

impl RecoveryDisplayStatus {
    /// The wire tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotEligible => "not_eligible",
            Self::DisplayableNoPhoto => "displayable_no_photo",
            Self::WaitingOnDecision => "waiting_on_decision",
            Self::Displayed => "displayed",
            Self::NotDisplayed => "not_displayed",
        }
    }
}

impl std::fmt::Display for RecoveryDisplayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A manually curated display status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayOverride {
    /// Keep the recovery off public listings.
    NotDisplayed,
    /// Show the recovery.
    Displayed,
}

impl DisplayOverride {
    /// The stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.status().as_str()
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_displayed" => Some(Self::NotDisplayed),
            "displayed" => Some(Self::Displayed),
            _ => None,
        }
    }

    /// The display status this override pins.
    #[must_use]
    pub fn status(&self) -> RecoveryDisplayStatus {
        match self {
            Self::NotDisplayed => RecoveryDisplayStatus::NotDisplayed,
            Self::Displayed => RecoveryDisplayStatus::Displayed,
        }
    }
}

/// Outcome of derivation: either computed from facts or pinned by curation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "status", rename_all = "snake_case")]
pub enum DerivedDisplayStatus {
    /// Computed from the record's facts.
    Computed(RecoveryDisplayStatus),
    /// Pinned by a stored override.
    Overridden(DisplayOverride),
}

impl DerivedDisplayStatus {
    /// The resulting display status.
    #[must_use]
    pub fn status(&self) -> RecoveryDisplayStatus {
        match self {
            Self::Computed(status) => *status,
            Self::Overridden(display_override) => display_override.status(),
        }
    }

    /// Whether curation decided the result.
    #[must_use]
    pub fn is_overridden(&self) -> bool {
        matches!(self, Self::Overridden(_))
    }
}

/// Everything derivation looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayFacts {
    /// Record is still the bike's active theft report.
    pub current: bool,
    /// Owner consented to sharing the recovery.
    pub can_share_recovery: bool,
    /// Stored curation, if any.
    pub display_override: Option<DisplayOverride>,
    /// A recovery display is linked to the record.
    pub has_recovery_display: bool,
    /// The bike has a public photo.
    pub has_photo: bool,
}

impl DisplayFacts {
    /// Gather facts for a record; linked display and photo presence come
    /// from storage.
    #[must_use]
    pub fn for_record(record: &StolenRecord, has_recovery_display: bool, has_photo: bool) -> Self {
        Self {
            current: record.current,
            can_share_recovery: record.can_share_recovery,
            display_override: record.recovery_display_override,
            has_recovery_display,
            has_photo,
        }
    }
}

/// Classify a record. First match wins:
///
/// 1. still current, or no sharing consent: `not_eligible`
/// 2. stored override: returned verbatim
/// 3. linked recovery display: `displayed`
/// 4. no photo: `displayable_no_photo`
/// 5. otherwise: `waiting_on_decision`
#[must_use]
pub fn derive_display_status(facts: &DisplayFacts) -> DerivedDisplayStatus {
    if facts.current || !facts.can_share_recovery {
        return DerivedDisplayStatus::Computed(RecoveryDisplayStatus::NotEligible);
    }
    if let Some(display_override) = facts.display_override {
        return DerivedDisplayStatus::Overridden(display_override);
    }
    let status = if facts.has_recovery_display {
        RecoveryDisplayStatus::Displayed
    } else if !facts.has_photo {
        RecoveryDisplayStatus::DisplayableNoPhoto
    } else {
        RecoveryDisplayStatus::WaitingOnDecision
    };
    DerivedDisplayStatus::Computed(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recovered_shareable() -> DisplayFacts {
        DisplayFacts {
            current: false,
            can_share_recovery: true,
            ..DisplayFacts::default()
        }
    }

    fn all_fact_combinations() -> Vec<DisplayFacts> {
        let overrides = [
            None,
            Some(DisplayOverride::Displayed),
            Some(DisplayOverride::NotDisplayed),
        ];
        let mut combos = Vec::new();
        for current in [true, false] {
            for can_share_recovery in [true, false] {
                for display_override in overrides {
                    for has_recovery_display in [true, false] {
                        for has_photo in [true, false] {
                            combos.push(DisplayFacts {
                                current,
                                can_share_recovery,
                                display_override,
                                has_recovery_display,
                                has_photo,
                            });
                        }
                    }
                }
            }
        }
        combos
    }

    #[test]
    fn test_current_records_are_never_eligible() {
        for facts in all_fact_combinations().into_iter().filter(|f| f.current) {
            assert_eq!(
                derive_display_status(&facts).status(),
                RecoveryDisplayStatus::NotEligible,
                "{facts:?}"
            );
        }
    }

    #[test]
    fn test_unshareable_records_are_never_eligible() {
        for facts in all_fact_combinations()
            .into_iter()
            .filter(|f| !f.can_share_recovery)
        {
            assert_eq!(
                derive_display_status(&facts),
                DerivedDisplayStatus::Computed(RecoveryDisplayStatus::NotEligible),
                "{facts:?}"
            );
        }
    }

    #[test]
    fn test_override_wins_over_display_and_photo() {
        for display_override in [DisplayOverride::Displayed, DisplayOverride::NotDisplayed] {
            let facts = DisplayFacts {
                display_override: Some(display_override),
                has_recovery_display: true,
                has_photo: true,
                ..recovered_shareable()
            };
            let derived = derive_display_status(&facts);
            assert!(derived.is_overridden());
            assert_eq!(derived.status(), display_override.status());
        }
    }

    #[test]
    fn test_not_displayed_override_with_linked_display() {
        let facts = DisplayFacts {
            display_override: Some(DisplayOverride::NotDisplayed),
            has_recovery_display: true,
            ..recovered_shareable()
        };
        assert_eq!(
            derive_display_status(&facts).status(),
            RecoveryDisplayStatus::NotDisplayed
        );
    }

    #[test]
    fn test_linked_display_is_displayed() {
        let facts = DisplayFacts {
            has_recovery_display: true,
            ..recovered_shareable()
        };
        assert_eq!(
            derive_display_status(&facts),
            DerivedDisplayStatus::Computed(RecoveryDisplayStatus::Displayed)
        );
    }

    #[test]
    fn test_no_photo_is_displayable_no_photo() {
        assert_eq!(
            derive_display_status(&recovered_shareable()).status(),
            RecoveryDisplayStatus::DisplayableNoPhoto
        );
    }

    #[test]
    fn test_photo_without_display_is_waiting_on_decision() {
        let facts = DisplayFacts {
            has_photo: true,
            ..recovered_shareable()
        };
        assert_eq!(
            derive_display_status(&facts).status(),
            RecoveryDisplayStatus::WaitingOnDecision
        );
    }

    #[test]
    fn test_status_tags() {
        assert_eq!(RecoveryDisplayStatus::NotEligible.to_string(), "not_eligible");
        assert_eq!(
            RecoveryDisplayStatus::DisplayableNoPhoto.to_string(),
            "displayable_no_photo"
        );
        assert_eq!(
            serde_json::to_string(&RecoveryDisplayStatus::WaitingOnDecision).unwrap(),
            "\"waiting_on_decision\""
        );
    }

    #[test]
    fn test_override_parse() {
        assert_eq!(
            DisplayOverride::parse("not_displayed"),
            Some(DisplayOverride::NotDisplayed)
        );
        assert_eq!(DisplayOverride::parse("displayed"), Some(DisplayOverride::Displayed));
        assert_eq!(DisplayOverride::parse("waiting_on_decision"), None);
        assert_eq!(DisplayOverride::Displayed.as_str(), "displayed");
    }
}
