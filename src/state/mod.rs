// State management module
// SQLite event document, settings, and file system locations

pub mod db;
pub mod document;
pub mod models;
pub mod queries;
pub mod settings;
pub mod storage;

pub use db::{init_db, init_default_db, init_memory_db, DbConnection, DbError, DbResult};
pub use document::{Document, EventStore};
pub use models::{EventEdit, EventStatus, PickMethod, PickMode, RecordEntry, SeismicEvent};
pub use queries::{
    create_event, delete_event, get_event, get_record_by_sha256, list_events_for_record,
    register_record, update_event,
};
pub use settings::{
    FixedSettings, SettingsError, SettingsFile, SettingsProvider, DEFAULT_MARGIN_SECS,
    MARGIN_KEY, SETTINGS_GROUP,
};
