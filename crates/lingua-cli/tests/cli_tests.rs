//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const MODULE_1: &str = "../../content/a1-module1.json";
const MODULE_2: &str = "../../content/a1-module2.json";
const NOW: &str = "2026-03-01T09:00:00Z";

fn lingua() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("lingua").unwrap();
    cmd.env_remove("LINGUA_NEW_WORDS_PER_DAY")
        .env_remove("LINGUA_REVIEWS_PER_DAY")
        .env_remove("RUST_LOG");
    cmd
}

/// A command bound to `state` with the clock pinned.
fn lingua_at(state: &Path) -> Command {
    let mut cmd = lingua();
    cmd.arg("--state").arg(state).arg("--now").arg(NOW);
    cmd
}

/// Fresh state with both A1 modules imported.
fn imported() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state.json");
    for module in [MODULE_1, MODULE_2] {
        lingua_at(&state)
            .arg("import")
            .arg("--path")
            .arg(module)
            .assert()
            .success();
    }
    (dir, state)
}

#[test]
fn validate_module_file() {
    lingua()
        .arg("validate")
        .arg("--path")
        .arg(MODULE_1)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Module: Greetings and first words (A1, 7 lessons)",
        ))
        .stdout(predicate::str::contains("All modules valid"));
}

#[test]
fn validate_directory() {
    lingua()
        .arg("validate")
        .arg("--path")
        .arg("../../content")
        .assert()
        .success()
        .stdout(predicate::str::contains("Greetings and first words"))
        .stdout(predicate::str::contains("Family"));
}

#[test]
fn validate_nonexistent_file() {
    lingua()
        .arg("validate")
        .arg("--path")
        .arg("nonexistent.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_reports_content_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(
        &path,
        r#"{"module": {"title": "Broken", "level": "A2", "lessons": [
            {"title": "Empty quiz", "type": "quiz", "content": {"questions": []}},
            {"title": "Mystery", "type": "karaoke", "content": {}}
        ]}}"#,
    )
    .unwrap();

    lingua()
        .arg("validate")
        .arg("--path")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[Empty quiz] WARNING: invalid lesson content"))
        .stdout(predicate::str::contains("[Mystery] WARNING: unknown lesson type"))
        .stdout(predicate::str::contains("2 warning(s) found"));
}

#[test]
fn validate_raw_content_by_kind() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("quiz.json");
    std::fs::write(
        &good,
        r#"[{"question": "2+2?", "options": ["3", "4"], "correct": "4"}]"#,
    )
    .unwrap();
    lingua()
        .arg("validate")
        .arg("--path")
        .arg(&good)
        .arg("--kind")
        .arg("quiz")
        .assert()
        .success()
        .stdout(predicate::str::contains("Valid quiz content"));

    let bad = dir.path().join("matching.json");
    std::fs::write(&bad, r#"{"pairs": []}"#).unwrap();
    lingua()
        .arg("validate")
        .arg("--path")
        .arg(&bad)
        .arg("--kind")
        .arg("listening")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid lesson content"));
}

#[test]
fn import_writes_state() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("nested/state.json");
    lingua_at(&state)
        .arg("import")
        .arg("--path")
        .arg(MODULE_1)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported module 1"))
        .stdout(predicate::str::contains("7 lessons"));
    assert!(state.exists());
}

#[test]
fn enter_first_lesson_then_locked_module() {
    let (_dir, state) = imported();

    lingua_at(&state)
        .arg("enter")
        .arg("--lesson")
        .arg("101")
        .assert()
        .success()
        .stdout(predicate::str::contains("Lesson 101: in_progress"));

    lingua_at(&state)
        .arg("enter")
        .arg("--lesson")
        .arg("201")
        .assert()
        .failure()
        .stderr(predicate::str::contains("complete at least 80% of Module 1"));
}

#[test]
fn grade_quiz_and_report_stats() {
    let (_dir, state) = imported();
    lingua_at(&state)
        .args(["enter", "--lesson", "101"])
        .assert()
        .success();

    lingua_at(&state)
        .args(["grade", "--lesson", "104", "--answers", r#"{"0": 1, "1": "6"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("Score: 100% (2/2), lesson completed"))
        .stdout(predicate::str::contains("Attempt #1"));

    lingua_at(&state)
        .args(["grade", "--lesson", "104", "--answers", r#"[0, "6"]"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("Score: 50% (1/2)"))
        .stdout(predicate::str::contains("Attempt #2"));

    lingua_at(&state)
        .args(["stats", "--lesson", "104"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 completed"))
        .stdout(predicate::str::contains("2 attempt(s), best 100.0%"))
        .stdout(predicate::str::contains("First passed on attempt #1"));
}

#[test]
fn grade_json_output() {
    let (_dir, state) = imported();
    lingua_at(&state)
        .args(["enter", "--lesson", "101"])
        .assert()
        .success();

    let output = lingua_at(&state)
        .args(["--json", "grade", "--lesson", "104", "--answers", r#"{"0": 0}"#])
        .output()
        .unwrap();
    assert!(output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["score"], 0);
    assert_eq!(response["completed"], false);
    assert_eq!(response["feedback"]["1"]["message"], "No answer given.");
}

#[test]
fn grade_rejects_malformed_answers() {
    let (_dir, state) = imported();
    lingua_at(&state)
        .args(["grade", "--lesson", "104", "--answers", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("answers are not valid JSON"));
}

#[test]
fn due_and_review_cards() {
    let (_dir, state) = imported();
    lingua_at(&state)
        .args(["enter", "--lesson", "101"])
        .assert()
        .success();

    lingua_at(&state)
        .args(["due", "--lesson", "103", "--seed", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("good morning"))
        .stdout(predicate::str::contains("доброе утро"))
        .stdout(predicate::str::contains("3 card(s) due"));

    // Word 5 is "good morning": hello and goodbye were registered first.
    lingua_at(&state)
        .args(["review", "--lesson", "103", "--word", "5", "--quality", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Next review of word 5 (src-tgt) in 3 day(s), on 2026-03-04",
        ));

    lingua_at(&state)
        .args(["review", "--lesson", "103", "--word", "1", "--quality", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Again: word 1 (src-tgt) stays due"));
}

#[test]
fn review_rejects_out_of_range_quality() {
    let (_dir, state) = imported();
    lingua_at(&state)
        .args(["enter", "--lesson", "101"])
        .assert()
        .success();
    lingua_at(&state)
        .args(["review", "--lesson", "103", "--word", "1", "--quality", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("quality must be between 0 and 5"));
}

#[test]
fn access_explains_locked_module() {
    let (_dir, state) = imported();
    lingua_at(&state)
        .args(["access", "--module", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Module 1: open"));
    lingua_at(&state)
        .args(["access", "--module", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Module 2: locked"))
        .stdout(predicate::str::contains("Previous module completed: 0%"));
}

#[test]
fn missing_lesson_is_an_error() {
    let (_dir, state) = imported();
    lingua_at(&state)
        .args(["enter", "--lesson", "999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lesson not found: 999"));
}

#[test]
fn plan_previews_intervals() {
    lingua()
        .args(["plan", "--repetitions", "3", "--interval", "10", "--ease", "2.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("8d"))
        .stdout(predicate::str::contains("20d"))
        .stdout(predicate::str::contains("26d"));

    lingua()
        .args(["--json", "plan", "--session-attempts", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"good\": 1"))
        .stdout(predicate::str::contains("\"easy\": 3"));
}

#[test]
fn plan_rejects_low_ease() {
    lingua()
        .args(["plan", "--ease", "1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ease must be at least 1.3"));
}

#[test]
fn help_output() {
    lingua()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "CEFR lesson grading and spaced repetition",
        ));
}

#[test]
fn version_output() {
    lingua()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lingua"));
}
