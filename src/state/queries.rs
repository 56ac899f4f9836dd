// Database CRUD operations
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::db::{DbConnection, DbError, DbResult};
use super::models::{EventEdit, EventStatus, PickMethod, PickMode, RecordEntry, SeismicEvent};
use crate::record::Record;

fn parse_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_sample(row: &Row, idx: usize) -> rusqlite::Result<usize> {
    let value: i64 = row.get(idx)?;
    usize::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

// ==================== RECORD QUERIES ====================

fn record_from_row(row: &Row) -> rusqlite::Result<RecordEntry> {
    Ok(RecordEntry {
        id: parse_uuid(row, 0)?,
        name: row.get(1)?,
        created_at: parse_timestamp(row, 2)?,
        sha256: row.get(3)?,
        sample_rate: row.get(4)?,
        sample_count: row.get(5)?,
    })
}

/// Find a record by its sample fingerprint
pub fn get_record_by_sha256(db: &DbConnection, sha256: &str) -> DbResult<Option<RecordEntry>> {
    let conn = db.lock();
    find_record(&conn, sha256)
}

fn find_record(conn: &Connection, sha256: &str) -> DbResult<Option<RecordEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, created_at, sha256, sample_rate, sample_count
         FROM records WHERE sha256 = ?1",
    )?;

    match stmt.query_row([sha256], record_from_row) {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Register a record, or return the existing entry with the same samples
pub fn register_record(db: &DbConnection, record: &Record) -> DbResult<RecordEntry> {
    // Lookup and insert under one lock
    let conn = db.lock();
    if let Some(existing) = find_record(&conn, record.sha256())? {
        return Ok(existing);
    }

    let entry = RecordEntry {
        id: Uuid::new_v4(),
        name: record.name().to_string(),
        created_at: Utc::now(),
        sha256: record.sha256().to_string(),
        sample_rate: record.sample_rate(),
        sample_count: record.len() as i64,
    };

    conn.execute(
        "INSERT INTO records (id, name, created_at, sha256, sample_rate, sample_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id.to_string(),
            entry.name,
            entry.created_at.to_rfc3339(),
            entry.sha256,
            entry.sample_rate,
            entry.sample_count,
        ],
    )?;

    log::info!("Registered record {} as {}", entry.name, entry.id);
    Ok(entry)
}

// ==================== EVENT QUERIES ====================

fn event_from_row(row: &Row) -> rusqlite::Result<SeismicEvent> {
    Ok(SeismicEvent {
        id: parse_uuid(row, 0)?,
        record_id: parse_uuid(row, 1)?,
        time: parse_sample(row, 2)?,
        method: PickMethod::from_string(&row.get::<_, String>(3)?),
        mode: PickMode::from_string(&row.get::<_, String>(4)?),
        status: EventStatus::from_string(&row.get::<_, String>(5)?),
        created_at: parse_timestamp(row, 6)?,
        updated_at: parse_timestamp(row, 7)?,
    })
}

/// Create a new event on a record
pub fn create_event(
    db: &DbConnection,
    record_id: Uuid,
    time: usize,
    method: PickMethod,
    mode: PickMode,
    status: EventStatus,
) -> DbResult<SeismicEvent> {
    let now = Utc::now();
    let event = SeismicEvent {
        id: Uuid::new_v4(),
        record_id,
        time,
        method,
        mode,
        status,
        created_at: now,
        updated_at: now,
    };

    let conn = db.lock();
    conn.execute(
        "INSERT INTO events (id, record_id, time_sample, method, mode, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.id.to_string(),
            event.record_id.to_string(),
            event.time as i64,
            event.method.as_str(),
            event.mode.as_str(),
            event.status.as_str(),
            event.created_at.to_rfc3339(),
            event.updated_at.to_rfc3339(),
        ],
    )?;

    Ok(event)
}

/// Get an event by ID
pub fn get_event(db: &DbConnection, id: &Uuid) -> DbResult<Option<SeismicEvent>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(
        "SELECT id, record_id, time_sample, method, mode, status, created_at, updated_at
         FROM events WHERE id = ?1",
    )?;

    match stmt.query_row([id.to_string()], event_from_row) {
        Ok(event) => Ok(Some(event)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List the events of a record in time order
pub fn list_events_for_record(db: &DbConnection, record_id: &Uuid) -> DbResult<Vec<SeismicEvent>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(
        "SELECT id, record_id, time_sample, method, mode, status, created_at, updated_at
         FROM events
         WHERE record_id = ?1
         ORDER BY time_sample ASC",
    )?;

    let events = stmt
        .query_map([record_id.to_string()], event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Apply an edit to an event and return the updated event
pub fn update_event(db: &DbConnection, id: &Uuid, edit: &EventEdit) -> DbResult<SeismicEvent> {
    {
        let conn = db.lock();
        let id_text = id.to_string();

        if let Some(time) = edit.time {
            conn.execute(
                "UPDATE events SET time_sample = ?1 WHERE id = ?2",
                params![time as i64, id_text],
            )?;
        }

        if let Some(method) = edit.method {
            conn.execute(
                "UPDATE events SET method = ?1 WHERE id = ?2",
                params![method.as_str(), id_text],
            )?;
        }

        if let Some(mode) = edit.mode {
            conn.execute(
                "UPDATE events SET mode = ?1 WHERE id = ?2",
                params![mode.as_str(), id_text],
            )?;
        }

        if let Some(status) = edit.status {
            conn.execute(
                "UPDATE events SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id_text],
            )?;
        }

        let updated = conn.execute(
            "UPDATE events SET updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id_text],
        )?;
        if updated == 0 {
            return Err(DbError::EventNotFound(*id));
        }
    }

    get_event(db, id)?.ok_or(DbError::EventNotFound(*id))
}

/// Delete an event
pub fn delete_event(db: &DbConnection, id: &Uuid) -> DbResult<()> {
    let conn = db.lock();
    conn.execute("DELETE FROM events WHERE id = ?1", params![id.to_string()])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::db::init_memory_db;
    use std::sync::Arc;
    use std::thread;

    fn test_record(samples: Vec<f32>) -> Record {
        Record::new("station.wav", samples, 100.0).unwrap()
    }

    #[test]
    fn test_register_record_deduplicates() {
        let db = init_memory_db().unwrap();
        let record = test_record(vec![0.0, 1.0, 2.0]);

        let first = register_record(&db, &record).unwrap();
        let second = register_record(&db, &record).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.sample_count, 3);
        assert_eq!(first.sample_rate, 100.0);

        let other = register_record(&db, &test_record(vec![5.0, 1.0])).unwrap();
        assert_ne!(first.id, other.id);
    }

    #[test]
    fn test_concurrent_registration_deduplicates() {
        let db = init_memory_db().unwrap();
        let record = Arc::new(test_record(vec![0.25; 64]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                let record = Arc::clone(&record);
                thread::spawn(move || register_record(&db, &record).unwrap().id)
            })
            .collect();
        let ids: Vec<Uuid> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(ids.iter().all(|id| *id == ids[0]));
        let count: i64 = db
            .lock()
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_create_and_get_event() {
        let db = init_memory_db().unwrap();
        let record = register_record(&db, &test_record(vec![0.0; 100])).unwrap();

        let event = create_event(
            &db,
            record.id,
            42,
            PickMethod::Stalta,
            PickMode::Manual,
            EventStatus::Preliminary,
        )
        .unwrap();

        let loaded = get_event(&db, &event.id).unwrap().unwrap();
        assert_eq!(loaded.id, event.id);
        assert_eq!(loaded.record_id, record.id);
        assert_eq!(loaded.time, 42);
        assert_eq!(loaded.method, PickMethod::Stalta);
        assert_eq!(loaded.mode, PickMode::Manual);
        assert_eq!(loaded.status, EventStatus::Preliminary);

        assert!(get_event(&db, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_update_event_applies_only_given_fields() {
        let db = init_memory_db().unwrap();
        let record = register_record(&db, &test_record(vec![0.0; 100])).unwrap();
        let event = create_event(
            &db,
            record.id,
            10,
            PickMethod::Ampa,
            PickMode::Manual,
            EventStatus::Preliminary,
        )
        .unwrap();

        let edit = EventEdit {
            status: Some(EventStatus::Confirmed),
            ..EventEdit::default()
        };
        let updated = update_event(&db, &event.id, &edit).unwrap();
        assert_eq!(updated.time, 10);
        assert_eq!(updated.method, PickMethod::Ampa);
        assert_eq!(updated.status, EventStatus::Confirmed);
        assert!(updated.updated_at >= event.updated_at);

        let updated = update_event(&db, &event.id, &EventEdit::takanami(55)).unwrap();
        assert_eq!(updated.time, 55);
        assert_eq!(updated.method, PickMethod::Takanami);
        assert_eq!(updated.mode, PickMode::Automatic);
        assert_eq!(updated.status, EventStatus::Reported);
    }

    #[test]
    fn test_update_missing_event_fails() {
        let db = init_memory_db().unwrap();
        let missing = Uuid::new_v4();

        let result = update_event(&db, &missing, &EventEdit::takanami(1));
        assert!(matches!(result, Err(DbError::EventNotFound(id)) if id == missing));
    }

    #[test]
    fn test_list_and_delete_events() {
        let db = init_memory_db().unwrap();
        let record = register_record(&db, &test_record(vec![0.0; 100])).unwrap();

        for time in [30, 10, 20] {
            create_event(
                &db,
                record.id,
                time,
                PickMethod::Takanami,
                PickMode::Automatic,
                EventStatus::Reported,
            )
            .unwrap();
        }

        let events = list_events_for_record(&db, &record.id).unwrap();
        let times: Vec<usize> = events.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![10, 20, 30]);

        delete_event(&db, &events[0].id).unwrap();
        assert_eq!(list_events_for_record(&db, &record.id).unwrap().len(), 2);
    }
}
