use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::settings::SettingsDraft;
use crate::store;
use serde_json::json;
use tracing::info;

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    state.settings_feed.refresh();
    let stored = state
        .settings_feed
        .latest()
        .map(|record| record.is_some())
        .unwrap_or(false);
    let config = helpers::effective_settings(state);
    ok(
        &req.id,
        json!({
            "classCounts": config.class_counts,
            "periods": config.periods,
            "stored": stored
        }),
    )
}

fn handle_roster_class_ids(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let Some(grade) = req.params.get("grade").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing grade", None);
    };
    let config = helpers::effective_settings(state);
    let class_ids = calc::class_ids_for_grade(grade, &config);
    ok(&req.id, json!({ "grade": grade, "classIds": class_ids }))
}

fn handle_draft_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let config = helpers::effective_settings(state);
    let draft = SettingsDraft::from_config(&config);
    let counts = draft.counts().clone();
    state.settings_draft = Some(draft);
    ok(&req.id, json!({ "classCounts": counts }))
}

fn handle_draft_adjust(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let Some(grade) = req.params.get("grade").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing grade", None);
    };
    let Some(delta) = req.params.get("delta").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing delta", None);
    };
    let Some(draft) = state.settings_draft.as_mut() else {
        return err(&req.id, "no_draft", "open a settings draft first", None);
    };
    match draft.adjust(grade, delta) {
        Ok(count) => {
            let counts = draft.counts().clone();
            ok(
                &req.id,
                json!({ "grade": grade, "count": count, "classCounts": counts }),
            )
        }
        Err(msg) => err(&req.id, "bad_params", msg, None),
    }
}

fn handle_draft_discard(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    let discarded = state.settings_draft.take().is_some();
    ok(&req.id, json!({ "discarded": discarded }))
}

fn handle_draft_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = helpers::ensure_ready(state, req) {
        return resp;
    }
    if let Some(resp) = helpers::ensure_authorized(req) {
        return resp;
    }
    let Some(draft) = state.settings_draft.clone() else {
        return err(&req.id, "no_draft", "open a settings draft first", None);
    };
    let periods = helpers::effective_settings(state).periods;
    let config = draft.into_config(periods);

    let result = {
        let Some(conn) = state.db.as_ref() else {
            return err(&req.id, "no_workspace", "select a workspace first", None);
        };
        store::write_settings(conn, &config)
    };
    if let Err(e) = result {
        // Keep the draft so the admin can retry the save.
        return err(&req.id, helpers::store_error_code(&e), e.to_string(), None);
    }
    if let Err(e) = helpers::publish_settings(state) {
        return err(&req.id, helpers::store_error_code(&e), e.to_string(), None);
    }
    state.settings_draft = None;
    info!("roster settings updated");
    ok(
        &req.id,
        json!({ "classCounts": config.class_counts, "periods": config.periods }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_get(state, req)),
        "roster.classIds" => Some(handle_roster_class_ids(state, req)),
        "settings.draftOpen" => Some(handle_draft_open(state, req)),
        "settings.draftAdjust" => Some(handle_draft_adjust(state, req)),
        "settings.draftDiscard" => Some(handle_draft_discard(state, req)),
        "settings.draftSave" => Some(handle_draft_save(state, req)),
        _ => None,
    }
}
