// Event document
// The store a refinement session commits accepted picks to

use uuid::Uuid;

use super::db::{DbConnection, DbError, DbResult};
use super::models::{EventEdit, EventStatus, PickMethod, PickMode, RecordEntry, SeismicEvent};
use super::queries;
use crate::record::Record;

/// Writes picked events for one record
pub trait EventStore {
    fn create_event(
        &mut self,
        time: usize,
        method: PickMethod,
        mode: PickMode,
        status: EventStatus,
    ) -> DbResult<SeismicEvent>;

    fn edit_event(&mut self, event: &SeismicEvent, edit: EventEdit) -> DbResult<SeismicEvent>;
}

/// SQLite-backed document for one record
#[derive(Clone)]
pub struct Document {
    db: DbConnection,
    record: RecordEntry,
}

impl Document {
    /// Open the document for `record`, registering it if it is new
    pub fn open(db: DbConnection, record: &Record) -> DbResult<Self> {
        let record = queries::register_record(&db, record)?;
        Ok(Document { db, record })
    }

    pub fn record(&self) -> &RecordEntry {
        &self.record
    }

    /// Events of this record in time order
    pub fn events(&self) -> DbResult<Vec<SeismicEvent>> {
        queries::list_events_for_record(&self.db, &self.record.id)
    }

    /// Look up an event of this record
    pub fn event(&self, id: &Uuid) -> DbResult<Option<SeismicEvent>> {
        Ok(queries::get_event(&self.db, id)?.filter(|e| e.record_id == self.record.id))
    }
}

impl EventStore for Document {
    fn create_event(
        &mut self,
        time: usize,
        method: PickMethod,
        mode: PickMode,
        status: EventStatus,
    ) -> DbResult<SeismicEvent> {
        let event = queries::create_event(&self.db, self.record.id, time, method, mode, status)?;
        log::info!(
            "Created {} event {} at sample {}",
            method.as_str(),
            event.id,
            time
        );
        Ok(event)
    }

    fn edit_event(&mut self, event: &SeismicEvent, edit: EventEdit) -> DbResult<SeismicEvent> {
        if event.record_id != self.record.id {
            return Err(DbError::EventNotFound(event.id));
        }

        let updated = queries::update_event(&self.db, &event.id, &edit)?;
        log::info!(
            "Edited event {}: sample {} -> {}",
            event.id,
            event.time,
            updated.time
        );
        Ok(updated)
    }
}
