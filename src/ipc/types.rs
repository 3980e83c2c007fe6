use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::session::ScoringSession;
use crate::settings::{RosterConfig, SettingsDraft};
use crate::store::ScoreEvent;
use crate::sync::Feed;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Opaque rater identity from the host shell. Until it is established
    /// every store read and write is deferred.
    pub rater_uid: Option<String>,
    pub scoring: ScoringSession,
    pub settings_draft: Option<SettingsDraft>,
    pub events_feed: Feed<Vec<ScoreEvent>>,
    pub settings_feed: Feed<Option<RosterConfig>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            rater_uid: None,
            scoring: ScoringSession::new(),
            settings_draft: None,
            events_feed: Feed::new(),
            settings_feed: Feed::new(),
        }
    }
}
