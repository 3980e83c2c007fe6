use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::calc;
use crate::settings;
use crate::store::{self, NewScoreEvent, StoreError};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no class has a score selected")]
    EmptySelection,
    #[error("no target date is set")]
    MissingDate,
    #[error("invalid target date: {0}")]
    InvalidDate(String),
    #[error("a submission is already in flight")]
    Busy,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    Submitting,
}

/// In-progress scoring submission: target date, period, optional note and a
/// class-to-score selection. One `submit` turns the selection into a batch of
/// events that persist atomically. A failed submit keeps every input intact
/// so the rater can retry without re-entering anything.
pub struct ScoringSession {
    date: Option<String>,
    period: String,
    note: String,
    selection: BTreeMap<String, i64>,
    in_flight: bool,
}

impl ScoringSession {
    pub fn new() -> Self {
        Self {
            date: None,
            period: settings::default_periods()
                .into_iter()
                .next()
                .unwrap_or_default(),
            note: String::new(),
            selection: BTreeMap::new(),
            in_flight: false,
        }
    }

    pub fn set_date(&mut self, date: &str) {
        self.date = Some(date.to_string());
    }

    pub fn set_period(&mut self, period: &str) {
        self.period = period.to_string();
    }

    pub fn set_note(&mut self, note: &str) {
        self.note = note.to_string();
    }

    /// Records a score choice for one class. Selecting again overwrites; an
    /// explicit zero is a real selection and produces an event.
    pub fn select(&mut self, class_id: &str, score: i64) {
        self.selection.insert(class_id.to_string(), score);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn period(&self) -> &str {
        &self.period
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn selection(&self) -> &BTreeMap<String, i64> {
        &self.selection
    }

    pub fn phase(&self) -> SessionPhase {
        if self.in_flight {
            SessionPhase::Submitting
        } else {
            SessionPhase::Idle
        }
    }

    /// Validates the in-progress state and builds the event batch. Entries
    /// whose class id does not encode a grade are skipped per-entry; a batch
    /// that is empty after skipping counts as an empty selection.
    pub fn build_batch(&self, rater_uid: &str) -> Result<Vec<NewScoreEvent>, SubmitError> {
        if self.selection.is_empty() {
            return Err(SubmitError::EmptySelection);
        }
        let date = match self.date.as_deref() {
            Some(d) if !d.trim().is_empty() => d.trim().to_string(),
            _ => return Err(SubmitError::MissingDate),
        };
        calc::week_identifier(&date).map_err(|e| SubmitError::InvalidDate(e.message))?;

        let mut batch = Vec::with_capacity(self.selection.len());
        for (class_id, score) in &self.selection {
            let Some(grade) = calc::grade_of_class_id(class_id) else {
                debug!(class_id = %class_id, "skipping selection with unparseable class id");
                continue;
            };
            batch.push(NewScoreEvent {
                date: date.clone(),
                period: self.period.clone(),
                grade,
                class_id: class_id.clone(),
                score: *score,
                note: self.note.trim().to_string(),
                rater_uid: rater_uid.to_string(),
            });
        }
        if batch.is_empty() {
            return Err(SubmitError::EmptySelection);
        }
        Ok(batch)
    }

    /// Runs one submission: validate, build the batch, persist atomically.
    /// On success the selection and note are cleared and the written count
    /// returned; on failure both stay for retry. The in-flight flag is reset
    /// on every exit path.
    pub fn submit(&mut self, conn: &Connection, rater_uid: &str) -> Result<usize, SubmitError> {
        if self.in_flight {
            return Err(SubmitError::Busy);
        }
        self.in_flight = true;
        let result = self
            .build_batch(rater_uid)
            .and_then(|batch| store::append_events(conn, &batch).map_err(SubmitError::from));
        self.in_flight = false;

        if result.is_ok() {
            self.selection.clear();
            self.note.clear();
        }
        result
    }
}
