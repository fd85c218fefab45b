//! `SQLite` schema definitions for bikewatch.
//!
//! Timestamps are stored as RFC 3339 text in UTC with fixed microsecond
//! precision so that text ordering matches time ordering.

/// Registered bikes.
pub const CREATE_BIKES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS bikes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    serial_number TEXT NOT NULL,
    manufacturer TEXT NOT NULL,
    model TEXT,
    color TEXT,
    description TEXT,
    owner_id INTEGER,
    owner_name TEXT,
    status TEXT NOT NULL DEFAULT 'status_with_owner',
    current_stolen_record_id INTEGER,
    created_at TEXT NOT NULL
)
";

/// Photos attached to bikes.
pub const CREATE_BIKE_PHOTOS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS bike_photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bike_id INTEGER NOT NULL,
    path TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    is_private INTEGER NOT NULL DEFAULT 0
)
";

/// Photo lookup by bike, in display order.
pub const CREATE_PHOTOS_BIKE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_bike_photos_bike ON bike_photos(bike_id, position, id)
";

/// Theft reports.
pub const CREATE_STOLEN_RECORDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS stolen_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bike_id INTEGER,
    current INTEGER NOT NULL DEFAULT 1,
    approved INTEGER NOT NULL DEFAULT 0,
    date_stolen TEXT,
    theft_description TEXT,
    street TEXT,
    city TEXT,
    state TEXT,
    zipcode TEXT,
    country TEXT,
    latitude REAL,
    longitude REAL,
    phone TEXT,
    secondary_phone TEXT,
    police_report_number TEXT,
    police_report_department TEXT,
    tsved_at TEXT,
    recovered_at TEXT,
    recovered_description TEXT,
    index_helped_recovery INTEGER NOT NULL DEFAULT 0,
    can_share_recovery INTEGER NOT NULL DEFAULT 0,
    recovery_display_status TEXT,
    recovering_user_id INTEGER,
    recovery_posted INTEGER NOT NULL DEFAULT 0,
    recovery_link_token TEXT,
    created_at TEXT NOT NULL
)
";

/// At most one current stolen record per bike.
pub const CREATE_ONE_CURRENT_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_stolen_records_one_current
ON stolen_records(bike_id) WHERE current = 1
";

/// Stolen record history by bike.
pub const CREATE_STOLEN_BIKE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_stolen_records_bike ON stolen_records(bike_id)
";

/// Recovered listings are ordered by recovery time.
pub const CREATE_RECOVERED_AT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_stolen_records_recovered_at ON stolen_records(recovered_at DESC)
";

/// Promoted theft alerts.
pub const CREATE_THEFT_ALERTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS theft_alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stolen_record_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    user_id INTEGER,
    created_at TEXT NOT NULL
)
";

/// Alert lookup by stolen record.
pub const CREATE_THEFT_ALERTS_RECORD_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_theft_alerts_record ON theft_alerts(stolen_record_id, status)
";

/// Generated alert images, one per stolen record.
pub const CREATE_ALERT_IMAGES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS alert_images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stolen_record_id INTEGER NOT NULL UNIQUE,
    source_photo_id INTEGER NOT NULL,
    source_fingerprint TEXT NOT NULL,
    path TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// Alert images by source photo, for release on photo removal.
pub const CREATE_ALERT_IMAGES_SOURCE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_alert_images_source ON alert_images(source_photo_id)
";

/// Published recovery stories.
pub const CREATE_RECOVERY_DISPLAYS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS recovery_displays (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stolen_record_id INTEGER UNIQUE,
    quote TEXT,
    quote_by TEXT,
    date_recovered TEXT NOT NULL,
    link TEXT,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_BIKES_TABLE,
    CREATE_BIKE_PHOTOS_TABLE,
    CREATE_PHOTOS_BIKE_INDEX,
    CREATE_STOLEN_RECORDS_TABLE,
    CREATE_ONE_CURRENT_INDEX,
    CREATE_STOLEN_BIKE_INDEX,
    CREATE_RECOVERED_AT_INDEX,
    CREATE_THEFT_ALERTS_TABLE,
    CREATE_THEFT_ALERTS_RECORD_INDEX,
    CREATE_ALERT_IMAGES_TABLE,
    CREATE_ALERT_IMAGES_SOURCE_INDEX,
    CREATE_RECOVERY_DISPLAYS_TABLE,
    CREATE_METADATA_TABLE,
];
