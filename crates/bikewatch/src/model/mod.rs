//! Core record types for bikewatch.
//!
//! These are plain data types; persistence lives in [`crate::storage`] and
//! the recovery workflow in [`crate::recovery`].

mod bike;
mod recovery_display;
mod stolen_record;
mod theft_alert;

pub use bike::{Bike, BikePhoto, BikeStatus, NewBike};
pub use recovery_display::RecoveryDisplay;
pub use stolen_record::{
    correct_date_stolen, normalize_city, normalize_phone, Location, NewStolenRecord,
    StolenRecord, TSV_HEADER,
};
pub use theft_alert::{TheftAlert, TheftAlertStatus};
