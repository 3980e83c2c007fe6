use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;
use tracing::info;

fn handle_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let events = helpers::current_events(state);
    let count = events.len();
    match serde_json::to_value(&events) {
        Ok(events) => ok(&req.id, json!({ "events": events, "count": count })),
        Err(e) => err(&req.id, "store_unavailable", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let key = match req.params.get("key").and_then(|v| v.as_str()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing key", None),
    };

    let result = {
        let Some(conn) = state.db.as_ref() else {
            return err(&req.id, "no_workspace", "select a workspace first", None);
        };
        store::delete_event(conn, &key)
    };
    if let Err(e) = result {
        return err(&req.id, helpers::store_error_code(&e), e.to_string(), None);
    }
    if let Err(e) = helpers::publish_events(state) {
        return err(&req.id, helpers::store_error_code(&e), e.to_string(), None);
    }
    ok(&req.id, json!({ "key": key }))
}

fn handle_clear_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    if let Some(resp) = helpers::ensure_authorized(req) {
        return resp;
    }

    // Read-then-delete: only what the key snapshot saw is cleared. An event
    // appended by a concurrent writer in between survives the clear.
    let result = {
        let Some(conn) = state.db.as_ref() else {
            return err(&req.id, "no_workspace", "select a workspace first", None);
        };
        store::all_keys(conn).and_then(|keys| store::delete_all(conn, &keys))
    };
    match result {
        Ok(deleted) => {
            if let Err(e) = helpers::publish_events(state) {
                return err(&req.id, helpers::store_error_code(&e), e.to_string(), None);
            }
            info!(deleted, "score history cleared");
            ok(&req.id, json!({ "deleted": deleted }))
        }
        Err(e) => err(&req.id, helpers::store_error_code(&e), e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.history" => Some(handle_history(state, req)),
        "scores.delete" => Some(handle_delete(state, req)),
        "scores.clearAll" => Some(handle_clear_all(state, req)),
        _ => None,
    }
}
