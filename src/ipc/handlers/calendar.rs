use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_week_of(req: &Request) -> serde_json::Value {
    let date = req
        .params
        .get("date")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    match calc::week_identifier(date) {
        Ok(week) => ok(&req.id, json!({ "week": week })),
        Err(e) => err(&req.id, &e.code, e.message, None),
    }
}

fn handle_step_week(req: &Request) -> serde_json::Value {
    let Some(week) = req.params.get("week").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing week", None);
    };
    let delta = req.params.get("delta").and_then(|v| v.as_i64()).unwrap_or(0);
    match calc::step_week(week, delta) {
        Ok(next) => ok(&req.id, json!({ "week": next })),
        Err(e) => err(&req.id, &e.code, e.message, None),
    }
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calendar.weekOf" => Some(handle_week_of(req)),
        "calendar.stepWeek" => Some(handle_step_week(req)),
        _ => None,
    }
}
