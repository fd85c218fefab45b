//! Stolen records: reporting, promotion, curation, and listing scopes.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Location, NewStolenRecord, StolenRecord};
use crate::recovery::{derive_display_status, DerivedDisplayStatus, DisplayFacts, DisplayOverride};

use super::{alerts, bikes, displays, sql_limit, time_from_sql, time_to_sql, Storage};

const RECORD_COLUMNS: &str = "id, bike_id, current, approved, date_stolen, theft_description, \
     street, city, state, zipcode, country, latitude, longitude, phone, secondary_phone, \
     police_report_number, police_report_department, tsved_at, recovered_at, \
     recovered_description, index_helped_recovery, can_share_recovery, \
     recovery_display_status, recovering_user_id, recovery_posted, recovery_link_token, \
     created_at";

/// Named record listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    /// Active theft reports.
    Current,
    /// Active reports reviewed by an admin.
    Approved,
    /// Approved reports with a police report number and department.
    ApprovedWithReports,
    /// Active reports never exported.
    NotTsved,
    /// Active reports not exported, or exported at or after the given instant.
    TsvSince(DateTime<Utc>),
    /// Recovered records, most recent recovery first.
    Recovered,
    /// Recovered records whose owners consented to sharing, most recent first.
    Displayable,
    /// Displayable records not yet posted.
    RecoveryUnposted,
}

impl RecordScope {
    fn filter(&self) -> &'static str {
        match self {
            Self::Current => "current = 1",
            Self::Approved => "current = 1 AND approved = 1",
            Self::ApprovedWithReports => {
                "current = 1 AND approved = 1 \
                 AND TRIM(COALESCE(police_report_number, '')) != '' \
                 AND TRIM(COALESCE(police_report_department, '')) != ''"
            }
            Self::NotTsved => "current = 1 AND tsved_at IS NULL",
            Self::TsvSince(_) => "current = 1 AND (tsved_at IS NULL OR tsved_at >= ?2)",
            Self::Recovered => "current = 0",
            Self::Displayable => "current = 0 AND can_share_recovery = 1",
            Self::RecoveryUnposted => {
                "current = 0 AND can_share_recovery = 1 AND recovery_posted = 0"
            }
        }
    }

    fn order(&self) -> &'static str {
        match self {
            Self::Recovered | Self::Displayable | Self::RecoveryUnposted => {
                "recovered_at DESC, id DESC"
            }
            _ => "id",
        }
    }
}

impl Storage {
    /// Report a bike stolen.
    ///
    /// Normalizes the input, inserts the record, and promotes it to the
    /// bike's current record in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BikeNotFound`] for an unknown bike, or a database error.
    pub fn report_stolen(
        &mut self,
        bike_id: i64,
        mut new: NewStolenRecord,
    ) -> Result<StolenRecord> {
        new.normalize(Utc::now());

        let tx = self.transaction()?;
        bikes::require_bike(&tx, bike_id)?;
        let id = insert_record(&tx, bike_id, &new)?;
        let record = promote_current(&tx, id)?;
        tx.commit()?;

        info!(bike_id, stolen_record_id = id, "Reported bike stolen");
        Ok(record)
    }

    /// Make a record its bike's current record, demoting any other current
    /// record of the same bike.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StolenRecordNotFound`], [`Error::InvalidInput`] for a
    /// detached record, or a database error.
    pub fn promote_to_current(&mut self, stolen_record_id: i64) -> Result<StolenRecord> {
        let tx = self.transaction()?;
        let record = promote_current(&tx, stolen_record_id)?;
        tx.commit()?;
        Ok(record)
    }

    /// Get a stolen record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_stolen_record(&self, id: i64) -> Result<Option<StolenRecord>> {
        fetch_record(&self.conn, id)
    }

    /// The bike's current stolen record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn current_stolen_record(&self, bike_id: i64) -> Result<Option<StolenRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM stolen_records WHERE bike_id = ?1 AND current = 1"
                ),
                [bike_id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Every stolen record of a bike, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stolen_records_for_bike(&self, bike_id: i64) -> Result<Vec<StolenRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM stolen_records WHERE bike_id = ?1 ORDER BY id"
        ))?;
        let records = stmt
            .query_map([bike_id], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// List records in a scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_stolen_records(
        &self,
        scope: RecordScope,
        limit: usize,
    ) -> Result<Vec<StolenRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM stolen_records WHERE {} ORDER BY {} LIMIT ?1",
            scope.filter(),
            scope.order()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match scope {
            RecordScope::TsvSince(since) => {
                stmt.query_map(params![sql_limit(limit), time_to_sql(&since)], row_to_record)?
            }
            _ => stmt.query_map([sql_limit(limit)], row_to_record)?,
        };
        let records = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(?scope, count = records.len(), "Listed stolen records");
        Ok(records)
    }

    /// Update the police report. A change to either field clears `tsved_at`
    /// so the record goes out in the next export.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StolenRecordNotFound`] or a database error.
    pub fn update_police_report(
        &self,
        id: i64,
        number: Option<&str>,
        department: Option<&str>,
    ) -> Result<StolenRecord> {
        let record = require_record(&self.conn, id)?;
        let clean = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let (number, department) = (clean(number), clean(department));

        if number == record.police_report_number && department == record.police_report_department
        {
            return Ok(record);
        }

        self.conn.execute(
            r"
            UPDATE stolen_records
            SET police_report_number = ?1, police_report_department = ?2, tsved_at = NULL
            WHERE id = ?3
            ",
            params![number, department, id],
        )?;
        debug!(stolen_record_id = id, "Police report changed, cleared tsved_at");
        require_record(&self.conn, id)
    }

    /// Stamp records as exported.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn mark_tsved(&mut self, ids: &[i64], at: DateTime<Utc>) -> Result<usize> {
        let tx = self.transaction()?;
        let stamp = time_to_sql(&at);
        let mut updated = 0;
        for id in ids {
            updated += tx.execute(
                "UPDATE stolen_records SET tsved_at = ?1 WHERE id = ?2",
                params![stamp, id],
            )?;
        }
        tx.commit()?;
        Ok(updated)
    }

    /// Return the record's recovery link token, creating one on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StolenRecordNotFound`] or a database error.
    pub fn find_or_create_recovery_link_token(&self, id: i64) -> Result<String> {
        let record = require_record(&self.conn, id)?;
        if let Some(token) = record.recovery_link_token.filter(|t| !t.is_empty()) {
            return Ok(token);
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        self.conn.execute(
            "UPDATE stolen_records SET recovery_link_token = ?1 WHERE id = ?2",
            params![token, id],
        )?;
        debug!(stolen_record_id = id, "Created recovery link token");
        Ok(token)
    }

    /// Store or clear the curated display status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StolenRecordNotFound`] or a database error.
    pub fn set_display_override(
        &self,
        id: i64,
        display_override: Option<DisplayOverride>,
    ) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE stolen_records SET recovery_display_status = ?1 WHERE id = ?2",
            params![display_override.map(|o| o.as_str()), id],
        )?;
        if updated == 0 {
            return Err(Error::StolenRecordNotFound(id));
        }
        info!(stolen_record_id = id, ?display_override, "Set display override");
        Ok(())
    }

    /// Derive the recovery display status of a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StolenRecordNotFound`] or a database error.
    pub fn display_status(&self, id: i64) -> Result<DerivedDisplayStatus> {
        let record = require_record(&self.conn, id)?;
        let facts = display_facts(&self.conn, &record)?;
        Ok(derive_display_status(&facts))
    }

    /// Detach a record from its bike.
    ///
    /// The bike returns to its owner if this was its current record, and the
    /// record's alert image is released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StolenRecordNotFound`] or a database error.
    pub fn detach_bike(&mut self, id: i64) -> Result<StolenRecord> {
        let tx = self.transaction()?;
        let record = require_record(&tx, id)?;

        if let Some(bike_id) = record.bike_id {
            tx.execute("UPDATE stolen_records SET bike_id = NULL WHERE id = ?1", [id])?;
            bikes::release_stolen_status(&tx, bike_id, id)?;
        }
        let released = alerts::delete_alert_image(&tx, id)?;
        let detached = require_record(&tx, id)?;
        tx.commit()?;

        info!(
            stolen_record_id = id,
            previous_bike_id = ?record.bike_id,
            released_alert_image = released,
            "Detached bike from stolen record"
        );
        Ok(detached)
    }
}

/// Facts the display deriver needs, gathered from storage.
pub(crate) fn display_facts(conn: &Connection, record: &StolenRecord) -> Result<DisplayFacts> {
    let has_display = displays::exists_for_record(conn, record.id)?;
    let has_photo = match record.bike_id {
        Some(bike_id) => bikes::first_public_photo(conn, bike_id)?.is_some(),
        None => false,
    };
    Ok(DisplayFacts::for_record(record, has_display, has_photo))
}

fn insert_record(conn: &Connection, bike_id: i64, new: &NewStolenRecord) -> Result<i64> {
    let Location {
        street,
        city,
        state,
        zipcode,
        country,
        latitude,
        longitude,
    } = &new.location;

    conn.execute(
        r"
        INSERT INTO stolen_records (
            bike_id, current, approved, date_stolen, theft_description,
            street, city, state, zipcode, country, latitude, longitude,
            phone, secondary_phone, police_report_number, police_report_department,
            created_at
        ) VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        ",
        params![
            bike_id,
            new.approved,
            new.date_stolen.as_ref().map(time_to_sql),
            new.theft_description,
            street,
            city,
            state,
            zipcode,
            country,
            latitude,
            longitude,
            new.phone,
            new.secondary_phone,
            new.police_report_number,
            new.police_report_department,
            time_to_sql(&Utc::now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Demote the bike's other current records, releasing their alert images,
/// then mark this record current and point the bike at it.
pub(crate) fn promote_current(conn: &Connection, id: i64) -> Result<StolenRecord> {
    let record = require_record(conn, id)?;
    let bike_id = record
        .bike_id
        .ok_or_else(|| Error::invalid_input(format!("stolen record {id} has no bike")))?;

    conn.execute(
        r"
        DELETE FROM alert_images WHERE stolen_record_id IN (
            SELECT id FROM stolen_records WHERE bike_id = ?1 AND id != ?2 AND current = 1
        )
        ",
        params![bike_id, id],
    )?;
    let demoted = conn.execute(
        "UPDATE stolen_records SET current = 0 WHERE bike_id = ?1 AND id != ?2 AND current = 1",
        params![bike_id, id],
    )?;
    conn.execute("UPDATE stolen_records SET current = 1 WHERE id = ?1", [id])?;
    bikes::mark_stolen(conn, bike_id, id)?;

    if demoted > 0 {
        info!(bike_id, stolen_record_id = id, demoted, "Demoted previous current records");
    }
    require_record(conn, id)
}

/// Persist the recovery fields of a record.
pub(crate) fn save_recovery(conn: &Connection, record: &StolenRecord) -> Result<()> {
    conn.execute(
        r"
        UPDATE stolen_records
        SET current = ?1, recovered_at = ?2, recovered_description = ?3,
            index_helped_recovery = ?4, can_share_recovery = ?5, recovering_user_id = ?6
        WHERE id = ?7
        ",
        params![
            record.current,
            record.recovered_at.as_ref().map(time_to_sql),
            record.recovered_description,
            record.index_helped_recovery,
            record.can_share_recovery,
            record.recovering_user_id,
            record.id,
        ],
    )?;
    Ok(())
}

pub(crate) fn mark_recovery_posted(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE stolen_records SET recovery_posted = 1 WHERE id = ?1",
        [id],
    )?;
    Ok(())
}

pub(crate) fn fetch_record(conn: &Connection, id: i64) -> Result<Option<StolenRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM stolen_records WHERE id = ?1"),
            [id],
            row_to_record,
        )
        .optional()?;
    Ok(record)
}

pub(crate) fn require_record(conn: &Connection, id: i64) -> Result<StolenRecord> {
    fetch_record(conn, id)?.ok_or(Error::StolenRecordNotFound(id))
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<StolenRecord> {
    let id: i64 = row.get("id")?;
    let override_str: Option<String> = row.get("recovery_display_status")?;
    let recovery_display_override = override_str.and_then(|value| {
        let parsed = DisplayOverride::parse(&value);
        if parsed.is_none() {
            warn!(
                stolen_record_id = id,
                "Unknown display override: {}, ignoring", value
            );
        }
        parsed
    });

    Ok(StolenRecord {
        id,
        bike_id: row.get("bike_id")?,
        current: row.get("current")?,
        approved: row.get("approved")?,
        date_stolen: time_from_sql("date_stolen", row.get("date_stolen")?),
        theft_description: row.get("theft_description")?,
        location: Location {
            street: row.get("street")?,
            city: row.get("city")?,
            state: row.get("state")?,
            zipcode: row.get("zipcode")?,
            country: row.get("country")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
        },
        phone: row.get("phone")?,
        secondary_phone: row.get("secondary_phone")?,
        police_report_number: row.get("police_report_number")?,
        police_report_department: row.get("police_report_department")?,
        tsved_at: time_from_sql("tsved_at", row.get("tsved_at")?),
        recovered_at: time_from_sql("recovered_at", row.get("recovered_at")?),
        recovered_description: row.get("recovered_description")?,
        index_helped_recovery: row.get("index_helped_recovery")?,
        can_share_recovery: row.get("can_share_recovery")?,
        recovery_display_override,
        recovering_user_id: row.get("recovering_user_id")?,
        recovery_posted: row.get("recovery_posted")?,
        recovery_link_token: row.get("recovery_link_token")?,
        created_at: time_from_sql("created_at", row.get("created_at")?).unwrap_or_else(Utc::now),
    })
}
