use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::settings::RosterConfig;
use crate::store::{self, ScoreEvent, StoreError};

/// Store reads and writes are deferred until a workspace is open and the
/// rater identity has been established. Returns the error response to send
/// when the daemon is not ready yet.
pub fn ensure_ready(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    if state.db.is_none() {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    }
    if state.rater_uid.is_none() {
        return Some(err(
            &req.id,
            "permission_denied",
            "rater identity not established",
            None,
        ));
    }
    None
}

/// Admin operations additionally require the caller to assert authorization.
/// The passphrase check itself lives in the host shell.
pub fn ensure_authorized(req: &Request) -> Option<serde_json::Value> {
    let authorized = req
        .params
        .get("authorized")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !authorized {
        return Some(err(
            &req.id,
            "permission_denied",
            "administrative authorization required",
            None,
        ));
    }
    None
}

pub fn store_error_code(e: &StoreError) -> &'static str {
    match e {
        StoreError::Unavailable(_) => "store_unavailable",
        StoreError::InvalidDate(_) => "invalid_date",
    }
}

/// Publishes a fresh full snapshot of the event collection to subscribers.
pub fn publish_events(state: &mut AppState) -> Result<(), StoreError> {
    let snapshot = match state.db.as_ref() {
        Some(conn) => store::events_snapshot(conn)?,
        None => Vec::new(),
    };
    state.events_feed.publish(snapshot);
    Ok(())
}

/// Publishes the current settings record (or its absence) to subscribers.
pub fn publish_settings(state: &mut AppState) -> Result<(), StoreError> {
    let snapshot = match state.db.as_ref() {
        Some(conn) => store::read_settings(conn)?,
        None => None,
    };
    state.settings_feed.publish(snapshot);
    Ok(())
}

/// Latest event snapshot visible to this process, empty before the first
/// push.
pub fn current_events(state: &mut AppState) -> Vec<ScoreEvent> {
    state.events_feed.refresh();
    state.events_feed.latest().cloned().unwrap_or_default()
}

/// Effective roster configuration: the synced settings record when one is
/// stored, the hardcoded deployment default otherwise.
pub fn effective_settings(state: &mut AppState) -> RosterConfig {
    state.settings_feed.refresh();
    state
        .settings_feed
        .latest()
        .and_then(|stored| stored.clone())
        .unwrap_or_default()
}
