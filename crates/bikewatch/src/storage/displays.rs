//! Recovery displays.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result};
use crate::model::RecoveryDisplay;

use super::{bikes, stolen_records, time_from_sql, time_to_sql, Storage};

const DISPLAY_COLUMNS: &str = "id, stolen_record_id, quote, quote_by, date_recovered, link";

impl Storage {
    /// Prefill a recovery display from a stolen record and its bike's owner.
    ///
    /// A missing record yields an empty display.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recovery_display_from_record(&self, stolen_record_id: i64) -> Result<RecoveryDisplay> {
        let record = stolen_records::fetch_record(&self.conn, stolen_record_id)?;
        let owner_name = match record.as_ref().and_then(|r| r.bike_id) {
            Some(bike_id) => bikes::fetch_bike(&self.conn, bike_id)?.and_then(|b| b.owner_name),
            None => None,
        };
        Ok(RecoveryDisplay::from_stolen_record(
            record.as_ref(),
            owner_name.as_deref(),
            Utc::now(),
        ))
    }

    /// Store a recovery display. A linked record is marked as posted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StolenRecordNotFound`] for an unknown linked record,
    /// [`Error::InvalidInput`] if the record already has a display, or a
    /// database error.
    pub fn create_recovery_display(
        &mut self,
        entry: &RecoveryDisplay,
    ) -> Result<RecoveryDisplay> {
        let tx = self.transaction()?;
        if let Some(record_id) = entry.stolen_record_id {
            stolen_records::require_record(&tx, record_id)?;
            if exists_for_record(&tx, record_id)? {
                return Err(Error::invalid_input(format!(
                    "stolen record {record_id} already has a recovery display"
                )));
            }
        }

        tx.execute(
            r"
            INSERT INTO recovery_displays
                (stolen_record_id, quote, quote_by, date_recovered, link, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                entry.stolen_record_id,
                entry.quote,
                entry.quote_by,
                time_to_sql(&entry.date_recovered),
                entry.link,
                time_to_sql(&Utc::now()),
            ],
        )?;
        let id = tx.last_insert_rowid();
        if let Some(record_id) = entry.stolen_record_id {
            stolen_records::mark_recovery_posted(&tx, record_id)?;
        }
        let created = fetch_display(&tx, id)?.ok_or(Error::RecoveryDisplayNotFound(id))?;
        tx.commit()?;

        info!(
            recovery_display_id = id,
            stolen_record_id = ?created.stolen_record_id,
            "Created recovery display"
        );
        Ok(created)
    }

    /// Get a recovery display by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_recovery_display(&self, id: i64) -> Result<Option<RecoveryDisplay>> {
        fetch_display(&self.conn, id)
    }

    /// Delete a recovery display. The linked record keeps `recovery_posted`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecoveryDisplayNotFound`] or a database error.
    pub fn delete_recovery_display(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM recovery_displays WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(Error::RecoveryDisplayNotFound(id));
        }
        info!(recovery_display_id = id, "Deleted recovery display");
        Ok(())
    }
}

pub(crate) fn exists_for_record(conn: &Connection, stolen_record_id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM recovery_displays WHERE stolen_record_id = ?1",
        [stolen_record_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn fetch_display(conn: &Connection, id: i64) -> Result<Option<RecoveryDisplay>> {
    let display = conn
        .query_row(
            &format!("SELECT {DISPLAY_COLUMNS} FROM recovery_displays WHERE id = ?1"),
            [id],
            row_to_display,
        )
        .optional()?;
    Ok(display)
}

fn row_to_display(row: &rusqlite::Row) -> rusqlite::Result<RecoveryDisplay> {
    Ok(RecoveryDisplay {
        id: Some(row.get("id")?),
        stolen_record_id: row.get("stolen_record_id")?,
        quote: row.get("quote")?,
        quote_by: row.get("quote_by")?,
        date_recovered: time_from_sql("date_recovered", row.get("date_recovered")?)
            .unwrap_or_else(Utc::now),
        link: row.get("link")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewBike, NewStolenRecord};
    use crate::recovery::RecoveryDisplayStatus;

    fn recovered_record(storage: &mut Storage) -> i64 {
        let mut new = NewBike::new("ABC", "Trek");
        new.owner_name = Some("somebody special".to_string());
        let bike = storage.register_bike(&new).unwrap();
        let record = storage
            .report_stolen(bike.id, NewStolenRecord::default())
            .unwrap();
        storage
            .conn
            .execute(
                "UPDATE stolen_records SET current = 0, can_share_recovery = 1, \
                 recovered_description = 'stuff' WHERE id = ?1",
                [record.id],
            )
            .unwrap();
        record.id
    }

    #[test]
    fn test_prefill_from_record() {
        let mut storage = Storage::open_in_memory().unwrap();
        let record_id = recovered_record(&mut storage);

        let display = storage.recovery_display_from_record(record_id).unwrap();
        assert_eq!(display.stolen_record_id, Some(record_id));
        assert_eq!(display.quote.as_deref(), Some("stuff"));
        assert_eq!(display.quote_by.as_deref(), Some("somebody special"));
    }

    #[test]
    fn test_prefill_from_missing_record() {
        let storage = Storage::open_in_memory().unwrap();
        let display = storage.recovery_display_from_record(99).unwrap();
        assert_eq!(display.stolen_record_id, None);
        assert_eq!(display.quote, None);
    }

    #[test]
    fn test_create_marks_posted_and_displayed() {
        let mut storage = Storage::open_in_memory().unwrap();
        let record_id = recovered_record(&mut storage);
        let display = storage.recovery_display_from_record(record_id).unwrap();

        let created = storage.create_recovery_display(&display).unwrap();
        assert!(created.id.is_some());
        assert_eq!(
            storage.get_recovery_display(created.id.unwrap()).unwrap(),
            Some(created.clone())
        );

        let record = storage.get_stolen_record(record_id).unwrap().unwrap();
        assert!(record.recovery_posted);
        assert_eq!(
            storage.display_status(record_id).unwrap().status(),
            RecoveryDisplayStatus::Displayed
        );
    }

    #[test]
    fn test_one_display_per_record() {
        let mut storage = Storage::open_in_memory().unwrap();
        let record_id = recovered_record(&mut storage);
        let display = storage.recovery_display_from_record(record_id).unwrap();
        storage.create_recovery_display(&display).unwrap();

        assert!(matches!(
            storage.create_recovery_display(&display),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_create_unlinked_display() {
        let mut storage = Storage::open_in_memory().unwrap();
        let mut display = RecoveryDisplay::new(Utc::now());
        display.set_time(Some("04-27-1999"), Utc::now());
        display.quote = Some("Got it back!".to_string());

        let created = storage.create_recovery_display(&display).unwrap();
        assert_eq!(created.stolen_record_id, None);
        assert_eq!(created.date_recovered, display.date_recovered);
    }

    #[test]
    fn test_delete_display() {
        let mut storage = Storage::open_in_memory().unwrap();
        let record_id = recovered_record(&mut storage);
        let display = storage.recovery_display_from_record(record_id).unwrap();
        let id = storage.create_recovery_display(&display).unwrap().id.unwrap();

        storage.delete_recovery_display(id).unwrap();
        assert!(storage.get_recovery_display(id).unwrap().is_none());
        assert!(matches!(
            storage.delete_recovery_display(id),
            Err(Error::RecoveryDisplayNotFound(_))
        ));
    }
}
