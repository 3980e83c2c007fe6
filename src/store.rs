use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::calc;
use crate::db;
use crate::settings::RosterConfig;

const ROSTER_SETTINGS_KEY: &str = "roster.config";

/// One behavioral scoring record. Immutable once appended; identity is the
/// store-assigned key. The stored `week` always equals the identifier derived
/// from `date` because the append path derives it itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEvent {
    pub key: String,
    pub date: String,
    pub week: String,
    pub period: String,
    pub grade: i64,
    pub class_id: String,
    pub score: i64,
    #[serde(default)]
    pub note: String,
    pub created_at: String,
    pub rater_uid: String,
}

/// An event as handed to the store: no key, no creation timestamp, no week.
/// The store assigns all three at append time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScoreEvent {
    pub date: String,
    pub period: String,
    pub grade: i64,
    pub class_id: String,
    pub score: i64,
    pub note: String,
    pub rater_uid: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("score store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid calendar date: {0}")]
    InvalidDate(String),
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Appends a batch in one transaction: either every event persists or none
/// does. Keys are fresh UUIDs; the creation timestamp is shared by the whole
/// batch, with insert order as the monotonic tiebreak.
pub fn append_events(conn: &Connection, batch: &[NewScoreEvent]) -> Result<usize, StoreError> {
    if batch.is_empty() {
        return Ok(0);
    }
    let tx = conn.unchecked_transaction().map_err(unavailable)?;
    let created_at = Utc::now().to_rfc3339();
    for event in batch {
        let week = calc::week_identifier(&event.date)
            .map_err(|e| StoreError::InvalidDate(e.message))?;
        tx.execute(
            "INSERT INTO score_events(
                id, date, week, period, grade, class_id, score, note, created_at, rater_uid
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &event.date,
                &week,
                &event.period,
                event.grade,
                &event.class_id,
                event.score,
                &event.note,
                &created_at,
                &event.rater_uid,
            ),
        )
        .map_err(unavailable)?;
    }
    tx.commit().map_err(unavailable)?;
    debug!(count = batch.len(), "appended score event batch");
    Ok(batch.len())
}

/// Deletes one event by key. Idempotent: deleting an absent key succeeds.
pub fn delete_event(conn: &Connection, key: &str) -> Result<(), StoreError> {
    conn.execute("DELETE FROM score_events WHERE id = ?", [key])
        .map_err(unavailable)?;
    Ok(())
}

/// Deletes exactly the provided keys in one transaction. Events appended by
/// another writer after the caller took its key snapshot are untouched, so a
/// snapshot-then-delete bulk clear is not a drain-to-empty.
pub fn delete_all(conn: &Connection, keys: &[String]) -> Result<usize, StoreError> {
    let tx = conn.unchecked_transaction().map_err(unavailable)?;
    for key in keys {
        tx.execute("DELETE FROM score_events WHERE id = ?", [key])
            .map_err(unavailable)?;
    }
    tx.commit().map_err(unavailable)?;
    debug!(count = keys.len(), "deleted score event batch");
    Ok(keys.len())
}

/// Replaces the whole collection in one transaction, preserving keys and
/// creation timestamps. `week` is re-derived from each event's date rather
/// than trusted from the input.
pub fn replace_all(conn: &Connection, events: &[ScoreEvent]) -> Result<usize, StoreError> {
    let tx = conn.unchecked_transaction().map_err(unavailable)?;
    tx.execute("DELETE FROM score_events", [])
        .map_err(unavailable)?;
    for event in events {
        let week = calc::week_identifier(&event.date)
            .map_err(|e| StoreError::InvalidDate(e.message))?;
        tx.execute(
            "INSERT INTO score_events(
                id, date, week, period, grade, class_id, score, note, created_at, rater_uid
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &event.key,
                &event.date,
                &week,
                &event.period,
                event.grade,
                &event.class_id,
                event.score,
                &event.note,
                &event.created_at,
                &event.rater_uid,
            ),
        )
        .map_err(unavailable)?;
    }
    tx.commit().map_err(unavailable)?;
    Ok(events.len())
}

/// The full collection, newest first.
pub fn events_snapshot(conn: &Connection) -> Result<Vec<ScoreEvent>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, date, week, period, grade, class_id, score, note, created_at, rater_uid
             FROM score_events
             ORDER BY created_at DESC, rowid DESC",
        )
        .map_err(unavailable)?;
    stmt.query_map([], |row| {
        Ok(ScoreEvent {
            key: row.get(0)?,
            date: row.get(1)?,
            week: row.get(2)?,
            period: row.get(3)?,
            grade: row.get(4)?,
            class_id: row.get(5)?,
            score: row.get(6)?,
            note: row.get(7)?,
            created_at: row.get(8)?,
            rater_uid: row.get(9)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(unavailable)
}

/// Every key currently present, for bulk clear.
pub fn all_keys(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT id FROM score_events")
        .map_err(unavailable)?;
    stmt.query_map([], |row| row.get::<_, String>(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(unavailable)
}

pub fn read_settings(conn: &Connection) -> Result<Option<RosterConfig>, StoreError> {
    let raw = db::settings_get_json(conn, ROSTER_SETTINGS_KEY)
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    match raw {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Unavailable(format!("settings record malformed: {}", e))),
        None => Ok(None),
    }
}

/// Upserts the single settings record.
pub fn write_settings(conn: &Connection, config: &RosterConfig) -> Result<(), StoreError> {
    let value = serde_json::to_value(config)
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    db::settings_set_json(conn, ROSTER_SETTINGS_KEY, &value)
        .map_err(|e| StoreError::Unavailable(e.to_string()))
}
