use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "identityReady": state.rater_uid.is_some()
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            // Seed subscribers with the collection and settings record as
            // they stand, replacing any projection from a prior workspace.
            if let Err(e) = helpers::publish_events(state) {
                return err(&req.id, "store_unavailable", e.to_string(), None);
            }
            if let Err(e) = helpers::publish_settings(state) {
                return err(&req.id, "store_unavailable", e.to_string(), None);
            }
            info!(workspace = %path.to_string_lossy(), "workspace opened");
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn handle_session_establish(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rater_uid = match req.params.get("raterUid").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing raterUid", None),
    };
    info!("rater identity established");
    state.rater_uid = Some(rater_uid.clone());
    ok(&req.id, json!({ "raterUid": rater_uid }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "session.establish" => Some(handle_session_establish(state, req)),
        _ => None,
    }
}
