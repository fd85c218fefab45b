//! Alert images: the promotional image of a stolen bike used by theft alerts.
//!
//! Storage decides when an image is generated, reused, or released; the
//! pixels are produced by an [`AlertImageRenderer`].

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AlertImageConfig;
use crate::model::BikePhoto;

/// A generated alert image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertImage {
    /// Storage id.
    pub id: i64,
    /// Record the image promotes. One image per record.
    pub stolen_record_id: i64,
    /// Photo the image was rendered from.
    pub source_photo_id: i64,
    /// Fingerprint of the source photo at render time.
    pub source_fingerprint: String,
    /// Location of the rendered image.
    pub path: String,
    /// When the image was rendered.
    pub created_at: DateTime<Utc>,
}

/// Why an image could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The source photo has no usable path.
    #[error("photo {photo_id} has no image file")]
    EmptySource {
        /// The source photo.
        photo_id: i64,
    },

    /// The source file is not an accepted image format.
    #[error("photo {photo_id} is not a supported image: {path}")]
    UnsupportedFormat {
        /// The source photo.
        photo_id: i64,
        /// The rejected path.
        path: String,
    },
}

/// Produces an alert image from a bike photo.
pub trait AlertImageRenderer: std::fmt::Debug {
    /// Render the image for `stolen_record_id` and return its path.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] when the source cannot be rendered.
    fn render(
        &self,
        stolen_record_id: i64,
        source: &BikePhoto,
        fingerprint: &str,
    ) -> Result<String, RenderError>;
}

/// Derives output paths from the source, without touching pixels.
///
/// The output keeps the source file name under
/// `<output_dir>/<record id>/<fingerprint prefix>/`, so a changed source
/// always lands at a new path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRenderer {
    output_dir: String,
    allowed_extensions: Vec<String>,
}

impl PathRenderer {
    /// Create a renderer writing under `output_dir`.
    #[must_use]
    pub fn new<I, S>(output_dir: impl Into<String>, allowed_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            output_dir: output_dir.into().trim_end_matches('/').to_string(),
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Create a renderer from configuration.
    #[must_use]
    pub fn from_config(config: &AlertImageConfig) -> Self {
        Self::new(config.output_dir.clone(), &config.allowed_extensions)
    }
}

impl AlertImageRenderer for PathRenderer {
    fn render(
        &self,
        stolen_record_id: i64,
        source: &BikePhoto,
        fingerprint: &str,
    ) -> Result<String, RenderError> {
        let path = Path::new(source.path.trim());
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or(RenderError::EmptySource {
                photo_id: source.id,
            })?;

        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| self.allowed_extensions.contains(&ext));
        if !supported {
            return Err(RenderError::UnsupportedFormat {
                photo_id: source.id,
                path: source.path.clone(),
            });
        }

        let prefix: String = fingerprint.chars().take(16).collect();
        Ok(format!(
            "{}/{stolen_record_id}/{prefix}/{file_name}",
            self.output_dir
        ))
    }
}

/// Fingerprint of a photo's identity and file, used to detect a changed
/// source.
#[must_use]
pub fn fingerprint(photo: &BikePhoto) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&photo.id.to_le_bytes());
    hasher.update(photo.path.as_bytes());
    hasher.finalize().to_hex().to_string()
}
