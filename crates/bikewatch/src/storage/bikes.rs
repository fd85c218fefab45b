//! Bikes and bike photos.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Bike, BikePhoto, BikeStatus, NewBike};

use super::{time_from_sql, time_to_sql, Storage};

const BIKE_COLUMNS: &str = "id, serial_number, manufacturer, model, color, description, \
     owner_id, owner_name, status, current_stolen_record_id, created_at";

const PHOTO_COLUMNS: &str = "id, bike_id, path, position, is_private";

impl Storage {
    /// Register a bike.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the serial or manufacturer is
    /// blank, or a database error.
    pub fn register_bike(&self, new: &NewBike) -> Result<Bike> {
        if new.serial_number.trim().is_empty() {
            return Err(Error::invalid_input("serial number is required"));
        }
        if new.manufacturer.trim().is_empty() {
            return Err(Error::invalid_input("manufacturer is required"));
        }

        self.conn.execute(
            r"
            INSERT INTO bikes (serial_number, manufacturer, model, color, description,
                               owner_id, owner_name, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                new.serial_number.trim(),
                new.manufacturer.trim(),
                new.model,
                new.color,
                new.description,
                new.owner_id,
                new.owner_name,
                BikeStatus::StatusWithOwner.as_str(),
                time_to_sql(&Utc::now()),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        info!(bike_id = id, serial = %new.serial_number, "Registered bike");
        require_bike(&self.conn, id)
    }

    /// Get a bike by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_bike(&self, id: i64) -> Result<Option<Bike>> {
        fetch_bike(&self.conn, id)
    }

    /// Attach a photo to a bike, after its existing photos.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BikeNotFound`] for an unknown bike, [`Error::InvalidInput`]
    /// for a blank path, or a database error.
    pub fn add_photo(&self, bike_id: i64, path: &str, is_private: bool) -> Result<BikePhoto> {
        require_bike(&self.conn, bike_id)?;
        if path.trim().is_empty() {
            return Err(Error::invalid_input("photo path is required"));
        }

        self.conn.execute(
            r"
            INSERT INTO bike_photos (bike_id, path, position, is_private)
            VALUES (?1, ?2,
                    (SELECT COALESCE(MAX(position), -1) + 1 FROM bike_photos WHERE bike_id = ?1),
                    ?3)
            ",
            params![bike_id, path.trim(), is_private],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(bike_id, photo_id = id, "Added photo");
        fetch_photo(&self.conn, id)?.ok_or(Error::PhotoNotFound(id))
    }

    /// Remove a photo, releasing alert images generated from it.
    ///
    /// Returns `false` when the photo did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_photo(&mut self, photo_id: i64) -> Result<bool> {
        let tx = self.transaction()?;
        let released = tx.execute(
            "DELETE FROM alert_images WHERE source_photo_id = ?1",
            [photo_id],
        )?;
        let removed = tx.execute("DELETE FROM bike_photos WHERE id = ?1", [photo_id])?;
        tx.commit()?;

        if released > 0 {
            info!(photo_id, released, "Released alert images for removed photo");
        }
        Ok(removed > 0)
    }

    /// All photos of a bike in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn photos(&self, bike_id: i64) -> Result<Vec<BikePhoto>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM bike_photos WHERE bike_id = ?1 ORDER BY position, id"
        ))?;
        let photos = stmt
            .query_map([bike_id], row_to_photo)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    /// The bike's first public photo.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn first_photo(&self, bike_id: i64) -> Result<Option<BikePhoto>> {
        first_public_photo(&self.conn, bike_id)
    }
}

pub(crate) fn fetch_bike(conn: &Connection, id: i64) -> Result<Option<Bike>> {
    let bike = conn
        .query_row(
            &format!("SELECT {BIKE_COLUMNS} FROM bikes WHERE id = ?1"),
            [id],
            row_to_bike,
        )
        .optional()?;
    Ok(bike)
}

pub(crate) fn require_bike(conn: &Connection, id: i64) -> Result<Bike> {
    fetch_bike(conn, id)?.ok_or(Error::BikeNotFound(id))
}

pub(crate) fn fetch_photo(conn: &Connection, id: i64) -> Result<Option<BikePhoto>> {
    let photo = conn
        .query_row(
            &format!("SELECT {PHOTO_COLUMNS} FROM bike_photos WHERE id = ?1"),
            [id],
            row_to_photo,
        )
        .optional()?;
    Ok(photo)
}

pub(crate) fn first_public_photo(conn: &Connection, bike_id: i64) -> Result<Option<BikePhoto>> {
    let photo = conn
        .query_row(
            &format!(
                "SELECT {PHOTO_COLUMNS} FROM bike_photos \
                 WHERE bike_id = ?1 AND is_private = 0 ORDER BY position, id LIMIT 1"
            ),
            [bike_id],
            row_to_photo,
        )
        .optional()?;
    Ok(photo)
}

/// Point the bike at its current stolen record.
pub(crate) fn mark_stolen(conn: &Connection, bike_id: i64, stolen_record_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE bikes SET status = ?1, current_stolen_record_id = ?2 WHERE id = ?3",
        params![BikeStatus::StatusStolen.as_str(), stolen_record_id, bike_id],
    )?;
    Ok(())
}

/// Return the bike to its owner if `stolen_record_id` is its current record,
/// or if it is stolen without any record reference.
///
/// A bike pointing at a different record is left alone.
pub(crate) fn release_stolen_status(
    conn: &Connection,
    bike_id: i64,
    stolen_record_id: i64,
) -> Result<bool> {
    let updated = conn.execute(
        r"
        UPDATE bikes SET status = ?1, current_stolen_record_id = NULL
        WHERE id = ?2
          AND (current_stolen_record_id = ?3
               OR (current_stolen_record_id IS NULL AND status = ?4))
        ",
        params![
            BikeStatus::StatusWithOwner.as_str(),
            bike_id,
            stolen_record_id,
            BikeStatus::StatusStolen.as_str(),
        ],
    )?;
    if updated == 0 {
        debug!(
            bike_id,
            stolen_record_id, "Bike not tied to this stolen record, status unchanged"
        );
    }
    Ok(updated > 0)
}

fn row_to_bike(row: &rusqlite::Row) -> rusqlite::Result<Bike> {
    let status_str: String = row.get("status")?;
    let status = BikeStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(
            "Unknown bike status: {}, defaulting to status_with_owner",
            status_str
        );
        BikeStatus::StatusWithOwner
    });

    Ok(Bike {
        id: row.get("id")?,
        serial_number: row.get("serial_number")?,
        manufacturer: row.get("manufacturer")?,
        model: row.get("model")?,
        color: row.get("color")?,
        description: row.get("description")?,
        owner_id: row.get("owner_id")?,
        owner_name: row.get("owner_name")?,
        status,
        current_stolen_record_id: row.get("current_stolen_record_id")?,
        created_at: time_from_sql("created_at", row.get("created_at")?).unwrap_or_else(Utc::now),
    })
}

fn row_to_photo(row: &rusqlite::Row) -> rusqlite::Result<BikePhoto> {
    Ok(BikePhoto {
        id: row.get("id")?,
        bike_id: row.get("bike_id")?,
        path: row.get("path")?,
        position: row.get("position")?,
        is_private: row.get("is_private")?,
    })
}
