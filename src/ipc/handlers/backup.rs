use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_export_events(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    if let Some(resp) = helpers::ensure_authorized(req) {
        return resp;
    }
    let Some(out_path) = req
        .params
        .get("outPath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };

    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let events = match store::events_snapshot(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, helpers::store_error_code(&e), e.to_string(), None),
    };
    let settings = match store::read_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, helpers::store_error_code(&e), e.to_string(), None),
    };

    match backup::export_events(&out_path, &events, settings.as_ref()) {
        Ok(summary) => {
            info!(events = summary.event_count, "event bundle exported");
            ok(
                &req.id,
                json!({
                    "bundleFormat": summary.bundle_format,
                    "eventCount": summary.event_count,
                    "outPath": out_path.to_string_lossy()
                }),
            )
        }
        Err(e) => err(&req.id, "backup_failed", format!("{e:?}"), None),
    }
}

fn handle_import_events(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    if let Some(resp) = helpers::ensure_authorized(req) {
        return resp;
    }
    let Some(in_path) = req
        .params
        .get("inPath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };

    let bundle = match backup::import_events(&in_path) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bundle_invalid", format!("{e:?}"), None),
    };

    let result = {
        let Some(conn) = state.db.as_ref() else {
            return err(&req.id, "no_workspace", "select a workspace first", None);
        };
        store::replace_all(conn, &bundle.events).and_then(|imported| {
            if let Some(config) = bundle.settings.as_ref() {
                store::write_settings(conn, config)?;
            }
            Ok(imported)
        })
    };
    match result {
        Ok(imported) => {
            if let Err(e) = helpers::publish_events(state) {
                return err(&req.id, helpers::store_error_code(&e), e.to_string(), None);
            }
            if let Err(e) = helpers::publish_settings(state) {
                return err(&req.id, helpers::store_error_code(&e), e.to_string(), None);
            }
            info!(imported, "event bundle imported");
            ok(
                &req.id,
                json!({
                    "imported": imported,
                    "settingsRestored": bundle.settings.is_some()
                }),
            )
        }
        Err(e) => err(&req.id, helpers::store_error_code(&e), e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportEvents" => Some(handle_export_events(state, req)),
        "backup.importEvents" => Some(handle_import_events(state, req)),
        _ => None,
    }
}
