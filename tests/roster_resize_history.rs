use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_orderlyd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn orderlyd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn shrinking_the_roster_hides_input_rows_but_keeps_history_in_totals() {
    let workspace = temp_dir("orderlyd-roster-resize");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.establish",
        json!({ "raterUid": "rater-epsilon" }),
    );

    // History lands for class 104 while the grade-1 roster still has 4.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "scoring.setDate",
        json!({ "date": "2025-03-03" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "scoring.select",
        json!({ "classId": "104", "score": 5 }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "5", "scoring.submit", json!({}));

    // Administrative shrink: grade 1 from 4 classes down to 2.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "settings.draftOpen",
        json!({}),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "settings.draftAdjust",
        json!({ "grade": 1, "delta": -1 }),
    );
    let adjusted = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "settings.draftAdjust",
        json!({ "grade": 1, "delta": -1 }),
    );
    assert_eq!(adjusted.get("count").and_then(|v| v.as_i64()), Some(2));
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "settings.draftSave",
        json!({ "authorized": true }),
    );
    assert_eq!(
        saved
            .get("classCounts")
            .and_then(|m| m.get("1"))
            .and_then(|v| v.as_i64()),
        Some(2)
    );

    // Input roster only offers the two remaining classes.
    let roster = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "roster.classIds",
        json!({ "grade": 1 }),
    );
    let ids: Vec<&str> = roster
        .get("classIds")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec!["101", "102"]);

    let settings = request_ok(&mut stdin, &mut reader, "11", "settings.get", json!({}));
    assert_eq!(settings.get("stored").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        settings
            .get("classCounts")
            .and_then(|m| m.get("1"))
            .and_then(|v| v.as_i64()),
        Some(2)
    );

    // The out-of-roster class still reports its accumulated total.
    let totals = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "totals.week",
        json!({ "week": "2025-W10" }),
    );
    let map = totals
        .get("totals")
        .and_then(|v| v.as_object())
        .cloned()
        .expect("totals map");
    assert_eq!(map.get("104").and_then(|v| v.as_i64()), Some(5));
    assert_eq!(map.get("101").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(map.get("102").and_then(|v| v.as_i64()), Some(0));
    assert!(map.get("103").is_none());

    // And it still outranks the zeroed roster classes for its grade.
    let rankings = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "rankings.week",
        json!({ "week": "2025-W10" }),
    );
    let grade_one = rankings
        .get("grades")
        .and_then(|g| g.get("1"))
        .and_then(|v| v.as_array())
        .cloned()
        .expect("grade 1 ranking");
    assert_eq!(
        grade_one
            .first()
            .and_then(|e| e.get("classId"))
            .and_then(|v| v.as_str()),
        Some("104")
    );
    assert_eq!(grade_one.len(), 3);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
