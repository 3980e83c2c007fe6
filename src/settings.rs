use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grades scored by the deployment. Fixed; class counts per grade are not.
pub const GRADES: [i64; 3] = [1, 2, 3];

pub const MIN_CLASS_COUNT: i64 = 1;
pub const MAX_CLASS_COUNT: i64 = 20;

pub fn default_class_counts() -> BTreeMap<i64, i64> {
    [(1, 4), (2, 5), (3, 5)].into_iter().collect()
}

pub fn default_periods() -> Vec<String> {
    [
        "morning-study",
        "assembly",
        "class-order",
        "lunch-rest",
        "cleaning",
        "dismissal",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// The settings record as stored and synced: per-grade class counts plus the
/// deployment's evaluation-period list. Periods are opaque strings to the
/// scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterConfig {
    pub class_counts: BTreeMap<i64, i64>,
    #[serde(default = "default_periods")]
    pub periods: Vec<String>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            class_counts: default_class_counts(),
            periods: default_periods(),
        }
    }
}

impl RosterConfig {
    pub fn class_count(&self, grade: i64) -> i64 {
        self.class_counts.get(&grade).copied().unwrap_or(0)
    }
}

/// Editable copy of the class counts for an in-progress administrative edit.
/// Nothing is persisted until the draft is saved as the new current config.
#[derive(Debug, Clone)]
pub struct SettingsDraft {
    counts: BTreeMap<i64, i64>,
}

impl SettingsDraft {
    pub fn from_config(config: &RosterConfig) -> Self {
        let mut counts = default_class_counts();
        for (grade, count) in &config.class_counts {
            counts.insert(*grade, *count);
        }
        Self { counts }
    }

    pub fn counts(&self) -> &BTreeMap<i64, i64> {
        &self.counts
    }

    /// Adjusts one grade's class count, clamped into
    /// `MIN_CLASS_COUNT..=MAX_CLASS_COUNT`. Returns the new count.
    pub fn adjust(&mut self, grade: i64, delta: i64) -> Result<i64, String> {
        if !GRADES.contains(&grade) {
            return Err(format!("unknown grade: {}", grade));
        }
        let current = self.counts.get(&grade).copied().unwrap_or(0);
        let next = current
            .saturating_add(delta)
            .clamp(MIN_CLASS_COUNT, MAX_CLASS_COUNT);
        self.counts.insert(grade, next);
        Ok(next)
    }

    /// The draft counts combined with the (non-editable) period list of the
    /// config being replaced.
    pub fn into_config(self, periods: Vec<String>) -> RosterConfig {
        RosterConfig {
            class_counts: self.counts,
            periods,
        }
    }
}
