use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::settings::RosterConfig;
use crate::store::ScoreEvent;

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// ISO-8601 week identifier for a civil date, e.g. `2025-W37`.
///
/// Weeks start Monday; week 1 is the week containing the first Thursday of
/// the year, so the ISO year near Dec 31 / Jan 1 can differ from the
/// calendar year. Pure function of the input date.
pub fn week_identifier(date: &str) -> Result<String, CalcError> {
    let trimmed = date.trim();
    if trimmed.is_empty() {
        return Err(CalcError::new("invalid_date", "date is required"));
    }
    let parsed = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        CalcError::new(
            "invalid_date",
            format!("not a calendar date: {}", trimmed),
        )
    })?;
    Ok(identifier_for(parsed))
}

fn identifier_for(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{:04}-W{:02}", iso.year(), iso.week())
}

/// Moves a week identifier by `delta` whole weeks.
///
/// Steps the Monday of the ISO week by days and re-derives the identifier,
/// so 53-week years (`2020-W53`) are handled exactly instead of wrapping at
/// a fixed 52.
pub fn step_week(week: &str, delta: i64) -> Result<String, CalcError> {
    let (year, num) = parse_week(week)?;
    let monday = NaiveDate::from_isoywd_opt(year, num, Weekday::Mon)
        .ok_or_else(|| CalcError::new("invalid_week", format!("no such ISO week: {}", week)))?;
    let stepped = chrono::Duration::try_weeks(delta)
        .and_then(|d| monday.checked_add_signed(d))
        .ok_or_else(|| CalcError::new("invalid_week", "week arithmetic out of range"))?;
    Ok(identifier_for(stepped))
}

pub fn parse_week(week: &str) -> Result<(i32, u32), CalcError> {
    let bad = || CalcError::new("invalid_week", format!("not a week identifier: {}", week));
    let Some((year_part, week_part)) = week.split_once("-W") else {
        return Err(bad());
    };
    let year: i32 = year_part.parse().map_err(|_| bad())?;
    let num: u32 = week_part.parse().map_err(|_| bad())?;
    if !(1..=53).contains(&num) {
        return Err(bad());
    }
    Ok((year, num))
}

/// Grade encoded in a class id: the digits before the trailing two-digit
/// sequence number, e.g. `"205"` -> 2, `"1203"` -> 12.
pub fn grade_of_class_id(class_id: &str) -> Option<i64> {
    if !class_id.is_ascii() || class_id.len() <= 2 {
        return None;
    }
    let (prefix, seq) = class_id.split_at(class_id.len() - 2);
    if !seq.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    prefix.parse::<i64>().ok().filter(|g| *g > 0)
}

/// Active class ids for a grade: `<grade><seq>` with a two-digit sequence
/// starting at `01`. A zero or missing count yields an empty roster.
pub fn class_ids_for_grade(grade: i64, roster: &RosterConfig) -> Vec<String> {
    let count = roster.class_count(grade).max(0);
    (1..=count)
        .map(|seq| format!("{}{:02}", grade, seq))
        .collect()
}

/// Per-class signed score totals for one week.
///
/// Every roster class id for every listed grade is present with an explicit
/// zero; events for class ids outside the current roster still accumulate
/// under their own key, so shrinking the roster never drops history from a
/// computed total. Events are matched on the stored `week` string, never
/// re-derived from `date`.
pub fn weekly_totals(
    events: &[ScoreEvent],
    target_week: &str,
    grades: &[i64],
    roster: &RosterConfig,
) -> BTreeMap<String, i64> {
    let mut totals: BTreeMap<String, i64> = BTreeMap::new();
    for grade in grades {
        for class_id in class_ids_for_grade(*grade, roster) {
            totals.insert(class_id, 0);
        }
    }
    for event in events {
        if event.week != target_week {
            continue;
        }
        *totals.entry(event.class_id.clone()).or_insert(0) += event.score;
    }
    totals
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub class_id: String,
    pub total: i64,
}

/// Full ranking for one grade, descending by total. Equal totals order by
/// ascending class id so the output is stable across runs and processes.
pub fn rank(totals: &BTreeMap<String, i64>, grade: i64) -> Vec<RankEntry> {
    let mut entries: Vec<RankEntry> = totals
        .iter()
        .filter(|(class_id, _)| grade_of_class_id(class_id) == Some(grade))
        .map(|(class_id, total)| RankEntry {
            class_id: class_id.clone(),
            total: *total,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.class_id.cmp(&b.class_id))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GRADES;
    use std::collections::BTreeMap;

    fn event(class_id: &str, score: i64, week: &str) -> ScoreEvent {
        ScoreEvent {
            key: format!("k-{}-{}", class_id, score),
            date: "2025-03-03".to_string(),
            week: week.to_string(),
            period: "morning-study".to_string(),
            grade: grade_of_class_id(class_id).unwrap_or(0),
            class_id: class_id.to_string(),
            score,
            note: String::new(),
            created_at: "2025-03-03T08:00:00+00:00".to_string(),
            rater_uid: "rater-1".to_string(),
        }
    }

    fn roster(counts: &[(i64, i64)]) -> RosterConfig {
        let mut config = RosterConfig::default();
        config.class_counts = counts.iter().copied().collect();
        config
    }

    #[test]
    fn week_identifier_formats_iso_week() {
        assert_eq!(week_identifier("2025-09-08").unwrap(), "2025-W37");
        assert_eq!(week_identifier("2025-03-03").unwrap(), "2025-W10");
    }

    #[test]
    fn week_identifier_is_stable() {
        let a = week_identifier("2024-06-14").unwrap();
        let b = week_identifier("2024-06-14").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn week_identifier_year_boundaries() {
        // Dec 31 2024 is a Tuesday of ISO week 1 of 2025.
        assert_eq!(week_identifier("2024-12-31").unwrap(), "2025-W01");
        // Jan 1 2023 is a Sunday of ISO week 52 of 2022.
        assert_eq!(week_identifier("2023-01-01").unwrap(), "2022-W52");
    }

    #[test]
    fn week_identifier_rejects_bad_input() {
        for bad in ["", "   ", "not-a-date", "2025-02-30", "2025/03/03"] {
            let err = week_identifier(bad).unwrap_err();
            assert_eq!(err.code, "invalid_date", "input {:?}", bad);
        }
    }

    #[test]
    fn step_week_crosses_year_boundaries() {
        assert_eq!(step_week("2025-W01", -1).unwrap(), "2024-W52");
        assert_eq!(step_week("2024-W52", 1).unwrap(), "2025-W01");
        assert_eq!(step_week("2025-W10", 0).unwrap(), "2025-W10");
    }

    #[test]
    fn step_week_handles_53_week_years() {
        // 2020 has 53 ISO weeks.
        assert_eq!(step_week("2020-W52", 1).unwrap(), "2020-W53");
        assert_eq!(step_week("2020-W53", 1).unwrap(), "2021-W01");
        assert_eq!(step_week("2021-W01", -1).unwrap(), "2020-W53");
    }

    #[test]
    fn step_week_rejects_bad_identifiers() {
        assert_eq!(step_week("2025-10", 1).unwrap_err().code, "invalid_week");
        assert_eq!(step_week("2025-W00", 1).unwrap_err().code, "invalid_week");
        assert_eq!(step_week("2025-W54", 1).unwrap_err().code, "invalid_week");
        // W53 only exists in long years.
        assert_eq!(step_week("2025-W53", 1).unwrap_err().code, "invalid_week");
    }

    #[test]
    fn grade_of_class_id_strips_two_digit_sequence() {
        assert_eq!(grade_of_class_id("101"), Some(1));
        assert_eq!(grade_of_class_id("205"), Some(2));
        assert_eq!(grade_of_class_id("1203"), Some(12));
        assert_eq!(grade_of_class_id("05"), None);
        assert_eq!(grade_of_class_id("x01"), None);
        assert_eq!(grade_of_class_id("10a"), None);
        assert_eq!(grade_of_class_id(""), None);
    }

    #[test]
    fn class_ids_follow_roster_counts() {
        let config = roster(&[(1, 4), (2, 2)]);
        assert_eq!(
            class_ids_for_grade(1, &config),
            vec!["101", "102", "103", "104"]
        );
        assert_eq!(class_ids_for_grade(2, &config), vec!["201", "202"]);
        assert!(class_ids_for_grade(3, &config).is_empty());
    }

    #[test]
    fn weekly_totals_match_reference_scenario() {
        let config = roster(&[(1, 4)]);
        let events = vec![
            event("101", 2, "2025-W10"),
            event("101", -1, "2025-W10"),
            event("102", 3, "2025-W10"),
        ];
        let totals = weekly_totals(&events, "2025-W10", &[1], &config);
        let expected: BTreeMap<String, i64> = [
            ("101".to_string(), 1),
            ("102".to_string(), 3),
            ("103".to_string(), 0),
            ("104".to_string(), 0),
        ]
        .into_iter()
        .collect();
        assert_eq!(totals, expected);

        let ranked = rank(&totals, 1);
        assert_eq!(
            ranked,
            vec![
                RankEntry { class_id: "102".to_string(), total: 3 },
                RankEntry { class_id: "101".to_string(), total: 1 },
                RankEntry { class_id: "103".to_string(), total: 0 },
                RankEntry { class_id: "104".to_string(), total: 0 },
            ]
        );
    }

    #[test]
    fn weekly_totals_sum_matches_event_sum() {
        let config = roster(&[(1, 4), (2, 5), (3, 5)]);
        let events = vec![
            event("101", 3, "2025-W10"),
            event("204", -2, "2025-W10"),
            event("305", 1, "2025-W10"),
            event("305", 1, "2025-W10"),
            event("101", -3, "2025-W11"),
        ];
        let totals = weekly_totals(&events, "2025-W10", &GRADES, &config);
        let total_sum: i64 = totals.values().sum();
        let event_sum: i64 = events
            .iter()
            .filter(|e| e.week == "2025-W10")
            .map(|e| e.score)
            .sum();
        assert_eq!(total_sum, event_sum);
        // Full roster present even where no events landed.
        assert_eq!(totals.len(), 14);
        assert_eq!(totals["103"], 0);
    }

    #[test]
    fn weekly_totals_count_lookalike_duplicates() {
        // Two distinct events with identical fields both count.
        let config = roster(&[(1, 2)]);
        let mut a = event("101", 2, "2025-W10");
        let mut b = event("101", 2, "2025-W10");
        a.key = "k1".to_string();
        b.key = "k2".to_string();
        let totals = weekly_totals(&[a, b], "2025-W10", &[1], &config);
        assert_eq!(totals["101"], 4);
    }

    #[test]
    fn weekly_totals_keep_out_of_roster_history() {
        let config = roster(&[(1, 2)]);
        let events = vec![event("104", 5, "2025-W10")];
        let totals = weekly_totals(&events, "2025-W10", &[1], &config);
        assert_eq!(totals["104"], 5);
        assert_eq!(totals["101"], 0);
        assert_eq!(totals["102"], 0);
        assert_eq!(totals.len(), 3);
    }

    #[test]
    fn weekly_totals_are_order_independent() {
        let config = roster(&[(1, 4)]);
        let mut events = vec![
            event("101", 2, "2025-W10"),
            event("102", 3, "2025-W10"),
            event("101", -1, "2025-W10"),
        ];
        let forward = weekly_totals(&events, "2025-W10", &[1], &config);
        events.reverse();
        let backward = weekly_totals(&events, "2025-W10", &[1], &config);
        assert_eq!(forward, backward);
        // Recomputing on an unchanged snapshot is idempotent.
        assert_eq!(backward, weekly_totals(&events, "2025-W10", &[1], &config));
    }

    #[test]
    fn rank_is_sorted_and_complete_with_stable_ties() {
        let config = roster(&[(2, 5)]);
        let events = vec![
            event("202", 4, "2025-W10"),
            event("205", 4, "2025-W10"),
            event("201", -1, "2025-W10"),
        ];
        let totals = weekly_totals(&events, "2025-W10", &[2], &config);
        let ranked = rank(&totals, 2);
        assert_eq!(ranked.len(), 5);
        for pair in ranked.windows(2) {
            assert!(pair[0].total >= pair[1].total);
        }
        // 202 and 205 tie at 4; ascending class id breaks the tie.
        assert_eq!(ranked[0].class_id, "202");
        assert_eq!(ranked[1].class_id, "205");
        // 203 and 204 tie at zero.
        assert_eq!(ranked[2].class_id, "203");
        assert_eq!(ranked[3].class_id, "204");
        assert_eq!(ranked[4].class_id, "201");
    }

    #[test]
    fn rank_filters_by_grade_prefix_rule() {
        let config = roster(&[(1, 2), (12, 1)]);
        let events = vec![event("1201", 7, "2025-W10")];
        let totals = weekly_totals(&events, "2025-W10", &[1, 12], &config);
        let grade_one = rank(&totals, 1);
        assert_eq!(grade_one.len(), 2);
        assert!(grade_one.iter().all(|e| e.class_id.len() == 3));
        let grade_twelve = rank(&totals, 12);
        assert_eq!(grade_twelve.len(), 1);
        assert_eq!(grade_twelve[0].class_id, "1201");
    }
}
