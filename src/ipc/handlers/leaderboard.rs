use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::settings::GRADES;
use serde_json::{json, Map};

fn week_param(req: &Request) -> Result<String, serde_json::Value> {
    let Some(week) = req.params.get("week").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", "missing week", None));
    };
    if let Err(e) = calc::parse_week(week) {
        return Err(err(&req.id, &e.code, e.message, None));
    }
    Ok(week.to_string())
}

fn handle_totals_week(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let week = match week_param(req) {
        Ok(w) => w,
        Err(resp) => return resp,
    };
    let events = helpers::current_events(state);
    let config = helpers::effective_settings(state);
    let totals = calc::weekly_totals(&events, &week, &GRADES, &config);
    ok(&req.id, json!({ "week": week, "totals": totals }))
}

fn handle_rankings_week(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let week = match week_param(req) {
        Ok(w) => w,
        Err(resp) => return resp,
    };
    let events = helpers::current_events(state);
    let config = helpers::effective_settings(state);
    let totals = calc::weekly_totals(&events, &week, &GRADES, &config);

    let mut grades = Map::new();
    for grade in GRADES {
        let ranked = calc::rank(&totals, grade);
        match serde_json::to_value(&ranked) {
            Ok(value) => {
                grades.insert(grade.to_string(), value);
            }
            Err(e) => return err(&req.id, "store_unavailable", e.to_string(), None),
        }
    }
    ok(&req.id, json!({ "week": week, "grades": grades }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "totals.week" => Some(handle_totals_week(state, req)),
        "rankings.week" => Some(handle_rankings_week(state, req)),
        _ => None,
    }
}
