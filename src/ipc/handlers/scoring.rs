use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::session::SubmitError;
use crate::store::StoreError;
use serde_json::json;
use tracing::{debug, warn};

fn submit_error_code(e: &SubmitError) -> &'static str {
    match e {
        SubmitError::EmptySelection => "empty_selection",
        SubmitError::MissingDate => "missing_date",
        SubmitError::InvalidDate(_) => "invalid_date",
        SubmitError::Busy => "busy",
        SubmitError::Store(StoreError::InvalidDate(_)) => "invalid_date",
        SubmitError::Store(StoreError::Unavailable(_)) => "store_unavailable",
    }
}

fn handle_set_date(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let Some(date) = req.params.get("date").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing date", None);
    };
    state.scoring.set_date(date);
    ok(&req.id, json!({ "date": date }))
}

fn handle_set_period(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let period = match req.params.get("period").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim(),
        _ => return err(&req.id, "bad_params", "missing period", None),
    };
    state.scoring.set_period(period);
    ok(&req.id, json!({ "period": period }))
}

fn handle_set_note(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let note = req.params.get("note").and_then(|v| v.as_str()).unwrap_or("");
    state.scoring.set_note(note);
    ok(&req.id, json!({ "note": note }))
}

fn handle_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let class_id = match req.params.get("classId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing classId", None),
    };
    let Some(score) = req.params.get("score").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "score must be a signed integer", None);
    };
    state.scoring.select(&class_id, score);
    ok(
        &req.id,
        json!({ "classId": class_id, "score": score, "selected": state.scoring.selection().len() }),
    )
}

fn handle_clear_selection(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    state.scoring.clear_selection();
    ok(&req.id, json!({ "selected": 0 }))
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    ok(
        &req.id,
        json!({
            "date": state.scoring.date(),
            "period": state.scoring.period(),
            "note": state.scoring.note(),
            "selection": state.scoring.selection(),
            "phase": state.scoring.phase()
        }),
    )
}

fn handle_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let rater_uid = state.rater_uid.clone().unwrap_or_default();
    let result = {
        let Some(conn) = state.db.as_ref() else {
            return err(&req.id, "no_workspace", "select a workspace first", None);
        };
        state.scoring.submit(conn, &rater_uid)
    };

    match result {
        Ok(written) => {
            if let Err(e) = helpers::publish_events(state) {
                return err(&req.id, helpers::store_error_code(&e), e.to_string(), None);
            }
            debug!(written, "scoring batch committed");
            ok(&req.id, json!({ "written": written }))
        }
        Err(e) => {
            warn!(code = submit_error_code(&e), "scoring submit failed");
            err(&req.id, submit_error_code(&e), e.to_string(), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scoring.setDate" => Some(handle_set_date(state, req)),
        "scoring.setPeriod" => Some(handle_set_period(state, req)),
        "scoring.setNote" => Some(handle_set_note(state, req)),
        "scoring.select" => Some(handle_select(state, req)),
        "scoring.clearSelection" => Some(handle_clear_selection(state, req)),
        "scoring.status" => Some(handle_status(state, req)),
        "scoring.submit" => Some(handle_submit(state, req)),
        _ => None,
    }
}
