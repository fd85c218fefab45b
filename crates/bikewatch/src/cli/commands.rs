//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand, ValueEnum};

use crate::model::{Location, NewBike, NewStolenRecord, TheftAlertStatus};
use crate::recovery::{DisplayOverride, RecoveryReport};
use crate::storage::RecordScope;

/// Bike commands.
#[derive(Debug, Subcommand)]
pub enum BikeCommand {
    /// Register a bike
    Register(RegisterBikeArgs),

    /// Show a bike with its photos and stolen records
    Show {
        /// Bike id
        id: i64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },

    /// Attach a photo to a bike
    PhotoAdd {
        /// Bike id
        bike_id: i64,

        /// Path of the image file
        path: String,

        /// Keep the photo out of public images
        #[arg(long)]
        private: bool,
    },

    /// Remove a photo, releasing alert images made from it
    PhotoRemove {
        /// Photo id
        photo_id: i64,
    },
}

/// Arguments for registering a bike.
#[derive(Debug, Args)]
pub struct RegisterBikeArgs {
    /// Frame serial number
    pub serial: String,

    /// Manufacturer name
    pub manufacturer: String,

    /// Model name
    #[arg(long)]
    pub model: Option<String>,

    /// Primary color
    #[arg(long)]
    pub color: Option<String>,

    /// Free-form description
    #[arg(long)]
    pub description: Option<String>,

    /// Id of the owning user
    #[arg(long)]
    pub owner_id: Option<i64>,

    /// Display name of the owning user
    #[arg(long)]
    pub owner_name: Option<String>,
}

impl RegisterBikeArgs {
    /// The registration these arguments describe.
    #[must_use]
    pub fn to_new_bike(&self) -> NewBike {
        NewBike {
            serial_number: self.serial.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            color: self.color.clone(),
            description: self.description.clone(),
            owner_id: self.owner_id,
            owner_name: self.owner_name.clone(),
        }
    }
}

/// Stolen record commands.
#[derive(Debug, Subcommand)]
pub enum StolenCommand {
    /// Report a bike stolen
    Report(ReportArgs),

    /// Mark a stolen record recovered
    Recover(RecoverArgs),

    /// Show a record's recovery display status
    Status {
        /// Stolen record id
        id: i64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },

    /// Make a record its bike's current record
    Promote {
        /// Stolen record id
        id: i64,
    },

    /// Detach a record from its bike
    Detach {
        /// Stolen record id
        id: i64,
    },

    /// Curate a recovery's display status
    Override {
        /// Stolen record id
        id: i64,

        /// Curated status
        #[arg(value_enum)]
        status: OverrideArg,
    },

    /// Update the police report
    PoliceReport {
        /// Stolen record id
        id: i64,

        /// Report number
        #[arg(long)]
        number: Option<String>,

        /// Department holding the report
        #[arg(long)]
        department: Option<String>,
    },

    /// Print the recovery link token, creating it if needed
    RecoveryLink {
        /// Stolen record id
        id: i64,
    },

    /// List shareable recoveries
    Displayable {
        /// Only recoveries not yet posted
        #[arg(long)]
        unposted: bool,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },

    /// Export stolen records as TSV
    Tsv {
        /// Records to export
        #[arg(short, long, value_enum, default_value = "not-tsved")]
        scope: TsvScopeArg,

        /// Stamp exported records
        #[arg(long)]
        mark: bool,

        /// Maximum number of rows
        #[arg(short, long, default_value = "1000")]
        limit: usize,
    },
}

/// Arguments for reporting a theft.
#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Bike id
    pub bike_id: i64,

    /// When the theft happened (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub date_stolen: Option<String>,

    /// What happened
    #[arg(long)]
    pub description: Option<String>,

    /// Street address
    #[arg(long)]
    pub street: Option<String>,

    /// City
    #[arg(long)]
    pub city: Option<String>,

    /// State or province
    #[arg(long)]
    pub state: Option<String>,

    /// Postal code
    #[arg(long)]
    pub zipcode: Option<String>,

    /// Country code
    #[arg(long)]
    pub country: Option<String>,

    /// Contact phone
    #[arg(long)]
    pub phone: Option<String>,

    /// Police report number
    #[arg(long)]
    pub police_report_number: Option<String>,

    /// Police department
    #[arg(long)]
    pub police_report_department: Option<String>,

    /// Mark the report as reviewed
    #[arg(long)]
    pub approved: bool,
}

impl ReportArgs {
    /// The theft report these arguments describe. `date_stolen` is parsed
    /// by the caller.
    #[must_use]
    pub fn to_new_record(&self, date_stolen: Option<DateTime<Utc>>) -> NewStolenRecord {
        NewStolenRecord {
            approved: self.approved,
            date_stolen,
            theft_description: self.description.clone(),
            location: Location {
                street: self.street.clone(),
                city: self.city.clone(),
                state: self.state.clone(),
                zipcode: self.zipcode.clone(),
                country: self.country.clone(),
                latitude: None,
                longitude: None,
            },
            phone: self.phone.clone(),
            secondary_phone: None,
            police_report_number: self.police_report_number.clone(),
            police_report_department: self.police_report_department.clone(),
        }
    }
}

/// Arguments for recording a recovery.
#[derive(Debug, Args)]
pub struct RecoverArgs {
    /// Stolen record id
    pub id: i64,

    /// Read the report as JSON from a file (`-` for stdin); flags are ignored
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// How the bike was recovered
    #[arg(long)]
    pub description: Option<String>,

    /// The registry helped with the recovery
    #[arg(long)]
    pub index_helped: bool,

    /// The owner agrees to share the recovery
    #[arg(long)]
    pub can_share: bool,

    /// User reporting the recovery
    #[arg(long)]
    pub user_id: Option<i64>,

    /// When the bike was recovered
    #[arg(long)]
    pub at: Option<String>,

    /// IANA timezone for `--at`
    #[arg(long)]
    pub timezone: Option<String>,
}

impl RecoverArgs {
    /// The report described by the flags.
    #[must_use]
    pub fn to_report(&self) -> RecoveryReport {
        RecoveryReport {
            recovered_description: self.description.clone(),
            index_helped_recovery: self.index_helped,
            can_share_recovery: self.can_share,
            recovering_user_id: self.user_id,
            recovered_at: self.at.clone(),
            timezone: self.timezone.clone(),
        }
    }
}

/// Theft alert commands.
#[derive(Debug, Subcommand)]
pub enum AlertCommand {
    /// Create a promoted theft alert for a stolen record
    Promote {
        /// Stolen record id
        stolen_record_id: i64,

        /// Initial alert status
        #[arg(short, long, value_enum, default_value = "active")]
        status: AlertStatusArg,

        /// User who paid for the promotion
        #[arg(long)]
        user_id: Option<i64>,
    },

    /// Change a theft alert's status
    SetStatus {
        /// Theft alert id
        alert_id: i64,

        /// New status
        #[arg(value_enum)]
        status: AlertStatusArg,
    },

    /// Generate the alert image for a stolen record
    Image {
        /// Stolen record id
        stolen_record_id: i64,

        /// Photo to render instead of the bike's first photo
        #[arg(long)]
        photo_id: Option<i64>,
    },
}

/// Recovery display commands.
#[derive(Debug, Subcommand)]
pub enum DisplayCommand {
    /// Publish a recovery story
    Create {
        /// Prefill from this stolen record
        #[arg(long)]
        stolen_record_id: Option<i64>,

        /// The story
        #[arg(long)]
        quote: Option<String>,

        /// Who tells it
        #[arg(long)]
        quote_by: Option<String>,

        /// Recovery date (MM-DD-YYYY)
        #[arg(long)]
        date: Option<String>,

        /// Link to more of the story
        #[arg(long)]
        link: Option<String>,
    },

    /// Show a recovery story
    Show {
        /// Recovery display id
        id: i64,
    },

    /// Delete a recovery story
    Delete {
        /// Recovery display id
        id: i64,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Curated display status argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverrideArg {
    /// Show the recovery
    Displayed,
    /// Keep the recovery off listings
    NotDisplayed,
    /// Remove the curation
    Clear,
}

impl From<OverrideArg> for Option<DisplayOverride> {
    fn from(arg: OverrideArg) -> Self {
        match arg {
            OverrideArg::Displayed => Some(DisplayOverride::Displayed),
            OverrideArg::NotDisplayed => Some(DisplayOverride::NotDisplayed),
            OverrideArg::Clear => None,
        }
    }
}

/// Theft alert status argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlertStatusArg {
    /// Awaiting activation
    Pending,
    /// Currently promoted
    Active,
    /// Finished
    Inactive,
}

impl From<AlertStatusArg> for TheftAlertStatus {
    fn from(arg: AlertStatusArg) -> Self {
        match arg {
            AlertStatusArg::Pending => Self::Pending,
            AlertStatusArg::Active => Self::Active,
            AlertStatusArg::Inactive => Self::Inactive,
        }
    }
}

/// Which records a TSV export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TsvScopeArg {
    /// Current records never exported
    NotTsved,
    /// Current records not exported before today
    Today,
    /// Approved current records
    Approved,
    /// Approved current records with a police report
    ApprovedWithReports,
}

impl TsvScopeArg {
    /// The storage scope, with `today` starting at `day_start`.
    #[must_use]
    pub fn scope(self, day_start: DateTime<Utc>) -> RecordScope {
        match self {
            Self::NotTsved => RecordScope::NotTsved,
            Self::Today => RecordScope::TsvSince(day_start),
            Self::Approved => RecordScope::Approved,
            Self::ApprovedWithReports => RecordScope::ApprovedWithReports,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_override_arg_conversion() {
        assert_eq!(
            Option::<DisplayOverride>::from(OverrideArg::Displayed),
            Some(DisplayOverride::Displayed)
        );
        assert_eq!(
            Option::<DisplayOverride>::from(OverrideArg::NotDisplayed),
            Some(DisplayOverride::NotDisplayed)
        );
        assert_eq!(Option::<DisplayOverride>::from(OverrideArg::Clear), None);
    }

    #[test]
    fn test_alert_status_arg_conversion() {
        assert_eq!(
            TheftAlertStatus::from(AlertStatusArg::Active),
            TheftAlertStatus::Active
        );
        assert_eq!(
            TheftAlertStatus::from(AlertStatusArg::Inactive),
            TheftAlertStatus::Inactive
        );
    }

    #[test]
    fn test_tsv_scope_today() {
        let day_start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(
            TsvScopeArg::Today.scope(day_start),
            RecordScope::TsvSince(day_start)
        );
        assert_eq!(
            TsvScopeArg::NotTsved.scope(day_start),
            RecordScope::NotTsved
        );
    }

    #[test]
    fn test_recover_args_to_report() {
        let args = RecoverArgs {
            id: 3,
            report: None,
            description: Some("found".to_string()),
            index_helped: true,
            can_share: false,
            user_id: Some(8),
            at: Some("2017-01-31T23:57:56".to_string()),
            timezone: Some("Atlantic/Reykjavik".to_string()),
        };
        let report = args.to_report();
        assert!(report.index_helped_recovery);
        assert!(!report.can_share_recovery);
        assert_eq!(report.recovering_user_id, Some(8));
        assert_eq!(report.timezone.as_deref(), Some("Atlantic/Reykjavik"));
    }

    #[test]
    fn test_report_args_to_new_record() {
        let args = ReportArgs {
            bike_id: 1,
            date_stolen: None,
            description: None,
            street: None,
            city: Some("Chicago".to_string()),
            state: Some("IL".to_string()),
            zipcode: None,
            country: Some("US".to_string()),
            phone: None,
            police_report_number: None,
            police_report_department: None,
            approved: true,
        };
        let new = args.to_new_record(None);
        assert!(new.approved);
        assert_eq!(new.location.address_location(false).as_deref(), Some("Chicago, IL"));
    }

    #[test]
    fn test_register_args_to_new_bike() {
        let args = RegisterBikeArgs {
            serial: "WSBC602".to_string(),
            manufacturer: "Surly".to_string(),
            model: None,
            color: None,
            description: None,
            owner_id: Some(2),
            owner_name: None,
        };
        let new = args.to_new_bike();
        assert_eq!(new.serial_number, "WSBC602");
        assert_eq!(new.owner_id, Some(2));
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }
}
