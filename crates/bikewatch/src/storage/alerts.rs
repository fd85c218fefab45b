//! Theft alerts and the alert images generated for them.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::alert_image::{fingerprint, AlertImage, AlertImageRenderer};
use crate::error::{Error, Result};
use crate::model::{BikePhoto, TheftAlert, TheftAlertStatus};

use super::{bikes, stolen_records, time_from_sql, time_to_sql, Storage};

const ALERT_COLUMNS: &str = "id, stolen_record_id, status, user_id, created_at";

const IMAGE_COLUMNS: &str =
    "id, stolen_record_id, source_photo_id, source_fingerprint, path, created_at";

/// Where an alert image comes from.
enum Source {
    Photo(BikePhoto),
    /// The bike has no public photo.
    Missing,
    /// The caller picked a photo that cannot be used.
    Rejected,
}

impl Storage {
    /// Create a theft alert for a stolen record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StolenRecordNotFound`] or a database error.
    pub fn create_theft_alert(
        &self,
        stolen_record_id: i64,
        status: TheftAlertStatus,
        user_id: Option<i64>,
    ) -> Result<TheftAlert> {
        stolen_records::require_record(&self.conn, stolen_record_id)?;

        self.conn.execute(
            "INSERT INTO theft_alerts (stolen_record_id, status, user_id, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![stolen_record_id, status.as_str(), user_id, time_to_sql(&Utc::now())],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(stolen_record_id, theft_alert_id = id, %status, "Created theft alert");
        require_alert(&self.conn, id)
    }

    /// Change a theft alert's status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown alert, or a database error.
    pub fn set_theft_alert_status(
        &self,
        alert_id: i64,
        status: TheftAlertStatus,
    ) -> Result<TheftAlert> {
        let updated = self.conn.execute(
            "UPDATE theft_alerts SET status = ?1 WHERE id = ?2",
            params![status.as_str(), alert_id],
        )?;
        if updated == 0 {
            return Err(Error::invalid_input(format!("theft alert {alert_id} not found")));
        }
        debug!(theft_alert_id = alert_id, %status, "Updated theft alert");
        require_alert(&self.conn, alert_id)
    }

    /// All theft alerts of a stolen record, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn theft_alerts(&self, stolen_record_id: i64) -> Result<Vec<TheftAlert>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM theft_alerts WHERE stolen_record_id = ?1 ORDER BY id"
        ))?;
        let alerts = stmt
            .query_map([stolen_record_id], row_to_alert)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(alerts)
    }

    /// The alert image of a stolen record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn alert_image(&self, stolen_record_id: i64) -> Result<Option<AlertImage>> {
        fetch_alert_image(&self.conn, stolen_record_id)
    }

    /// Release a record's alert image. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn release_alert_image(&self, stolen_record_id: i64) -> Result<bool> {
        delete_alert_image(&self.conn, stolen_record_id)
    }

    /// An active theft alert exists but there is no alert image for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn theft_alert_missing_photo(&self, stolen_record_id: i64) -> Result<bool> {
        Ok(active_theft_alert(&self.conn, stolen_record_id)?.is_some()
            && fetch_alert_image(&self.conn, stolen_record_id)?.is_none())
    }

    /// Generate (or reuse) the alert image of a current stolen record.
    ///
    /// The source is `selected_photo_id` when it names a public photo of the
    /// record's bike, otherwise the bike's first public photo. Without any
    /// source the existing image is released; a rejected selection changes
    /// nothing. An existing image rendered
    /// from the same photo and fingerprint is returned unchanged. Rendering
    /// failures return `None` and leave stored state untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StolenRecordNotFound`] or a database error.
    pub fn generate_alert_image(
        &mut self,
        stolen_record_id: i64,
        selected_photo_id: Option<i64>,
        renderer: &dyn AlertImageRenderer,
    ) -> Result<Option<AlertImage>> {
        let record = stolen_records::require_record(&self.conn, stolen_record_id)?;
        if !record.current {
            debug!(stolen_record_id, "Record is not current, no alert image");
            return Ok(None);
        }
        let Some(bike_id) = record.bike_id else {
            debug!(stolen_record_id, "Record has no bike, no alert image");
            return Ok(None);
        };

        let source = match select_source(&self.conn, bike_id, selected_photo_id)? {
            Source::Photo(photo) => photo,
            Source::Missing => {
                if delete_alert_image(&self.conn, stolen_record_id)? {
                    info!(stolen_record_id, "Released alert image, bike has no photo");
                }
                return Ok(None);
            }
            Source::Rejected => return Ok(None),
        };

        let source_fingerprint = fingerprint(&source);
        if let Some(existing) = fetch_alert_image(&self.conn, stolen_record_id)? {
            if existing.source_photo_id == source.id
                && existing.source_fingerprint == source_fingerprint
            {
                debug!(
                    stolen_record_id,
                    alert_image_id = existing.id,
                    "Alert image is up to date"
                );
                return Ok(Some(existing));
            }
        }

        let path = match renderer.render(stolen_record_id, &source, &source_fingerprint) {
            Ok(path) => path,
            Err(err) => {
                warn!(
                    stolen_record_id,
                    photo_id = source.id,
                    error = %err,
                    "Alert image generation failed"
                );
                return Ok(None);
            }
        };

        let tx = self.transaction()?;
        delete_alert_image(&tx, stolen_record_id)?;
        tx.execute(
            r"
            INSERT INTO alert_images
                (stolen_record_id, source_photo_id, source_fingerprint, path, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                stolen_record_id,
                source.id,
                source_fingerprint,
                path,
                time_to_sql(&Utc::now())
            ],
        )?;
        let image = fetch_alert_image(&tx, stolen_record_id)?
            .ok_or_else(|| Error::internal("alert image missing after insert"))?;
        tx.commit()?;

        info!(
            stolen_record_id,
            alert_image_id = image.id,
            path = %image.path,
            "Generated alert image"
        );
        Ok(Some(image))
    }
}

fn select_source(
    conn: &Connection,
    bike_id: i64,
    selected_photo_id: Option<i64>,
) -> Result<Source> {
    let selected = match selected_photo_id {
        Some(photo_id) => bikes::fetch_photo(conn, photo_id)?,
        None => None,
    };
    match selected {
        Some(photo) if photo.bike_id == bike_id && !photo.is_private => Ok(Source::Photo(photo)),
        Some(photo) => {
            warn!(
                photo_id = photo.id,
                bike_id,
                photo_bike_id = photo.bike_id,
                "Selected photo is not a public photo of this bike"
            );
            Ok(Source::Rejected)
        }
        None => Ok(bikes::first_public_photo(conn, bike_id)?
            .map_or(Source::Missing, Source::Photo)),
    }
}

/// The most recent active alert of a stolen record.
pub(crate) fn active_theft_alert(
    conn: &Connection,
    stolen_record_id: i64,
) -> Result<Option<TheftAlert>> {
    let alert = conn
        .query_row(
            &format!(
                "SELECT {ALERT_COLUMNS} FROM theft_alerts \
                 WHERE stolen_record_id = ?1 AND status = ?2 ORDER BY id DESC LIMIT 1"
            ),
            params![stolen_record_id, TheftAlertStatus::Active.as_str()],
            row_to_alert,
        )
        .optional()?;
    Ok(alert)
}

pub(crate) fn fetch_alert_image(
    conn: &Connection,
    stolen_record_id: i64,
) -> Result<Option<AlertImage>> {
    let image = conn
        .query_row(
            &format!("SELECT {IMAGE_COLUMNS} FROM alert_images WHERE stolen_record_id = ?1"),
            [stolen_record_id],
            row_to_image,
        )
        .optional()?;
    Ok(image)
}

pub(crate) fn delete_alert_image(conn: &Connection, stolen_record_id: i64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM alert_images WHERE stolen_record_id = ?1",
        [stolen_record_id],
    )?;
    Ok(deleted > 0)
}

fn require_alert(conn: &Connection, id: i64) -> Result<TheftAlert> {
    conn.query_row(
        &format!("SELECT {ALERT_COLUMNS} FROM theft_alerts WHERE id = ?1"),
        [id],
        row_to_alert,
    )
    .optional()?
    .ok_or_else(|| Error::internal(format!("theft alert {id} vanished")))
}

fn row_to_alert(row: &rusqlite::Row) -> rusqlite::Result<TheftAlert> {
    let status_str: String = row.get("status")?;
    let status = TheftAlertStatus::parse(&status_str).unwrap_or_else(|| {
        warn!("Unknown theft alert status: {}, defaulting to pending", status_str);
        TheftAlertStatus::Pending
    });

    Ok(TheftAlert {
        id: row.get("id")?,
        stolen_record_id: row.get("stolen_record_id")?,
        status,
        user_id: row.get("user_id")?,
        created_at: time_from_sql("created_at", row.get("created_at")?).unwrap_or_else(Utc::now),
    })
}

fn row_to_image(row: &rusqlite::Row) -> rusqlite::Result<AlertImage> {
    Ok(AlertImage {
        id: row.get("id")?,
        stolen_record_id: row.get("stolen_record_id")?,
        source_photo_id: row.get("source_photo_id")?,
        source_fingerprint: row.get("source_fingerprint")?,
        path: row.get("path")?,
        created_at: time_from_sql("created_at", row.get("created_at")?).unwrap_or_else(Utc::now),
    })
}
