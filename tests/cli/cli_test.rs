//! CLI contract tests.

use std::io::Write;

use assert_cmd::Command;

/// The binary with a config path that does not exist, so defaults apply.
fn parlance(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("parlance").expect("binary");
    cmd.env_remove("PARLANCE_PATTERNS")
        .env_remove("PARLANCE_SIMILARITY_FLOOR")
        .env_remove("PARLANCE_MAX_RECORDS")
        .env("RUST_LOG", "error")
        .arg("--config")
        .arg(dir.path().join("parlance.toml"));
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("utf8")
}

#[test]
fn classify_prints_the_result_as_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stdout = stdout_of(parlance(&dir).args(["classify", "turn on the living room lights"]));
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("json");
    assert_eq!(json["category"], "action");
    assert_eq!(json["sub_category"], "switch");
    assert_eq!(json["method"], "pattern");
    assert_eq!(json["matched_pattern"], "action.switch");
}

#[test]
fn classify_accepts_context_flags() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stdout = stdout_of(parlance(&dir).args([
        "classify",
        "is the hallway heater on",
        "--entity",
        "hallway heater",
        "--speaker",
        "sam",
        "--urgency",
        "high",
    ]));
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("json");
    assert_eq!(json["context"]["speaker"], "sam");
    assert_eq!(json["context"]["urgency"], "high");
}

#[test]
fn classify_rejects_blank_entity() {
    let dir = tempfile::tempdir().expect("tempdir");
    parlance(&dir)
        .args(["classify", "hello", "--entity", " "])
        .assert()
        .failure();
}

#[test]
fn diagnose_explains_a_typo() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stdout = stdout_of(parlance(&dir).args(["diagnose", "trun off the kitchen light"]));
    assert!(stdout.contains("no pattern matched"));
    assert!(stdout.contains("action.switch"));
    assert!(stdout.contains("Add typo variant \"trun\" for \"turn\""));
}

#[test]
fn diagnose_json_lists_near_misses() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stdout = stdout_of(parlance(&dir).args([
        "diagnose",
        "trun off the kitchen light",
        "--json",
    ]));
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("json");
    assert_eq!(json["near_misses"][0]["group"], "action");
    assert_eq!(json["near_misses"][0]["failure_reason"], "TYPO");
}

#[test]
fn patterns_list_show_and_check() {
    let dir = tempfile::tempdir().expect("tempdir");
    let list = stdout_of(parlance(&dir).args(["patterns", "list"]));
    assert!(list.lines().any(|l| l.starts_with("emergency\t")));
    assert!(list.lines().any(|l| l.starts_with("action\t")));

    let show = stdout_of(parlance(&dir).args(["patterns", "show", "gesture", "greeting"]));
    let json: serde_json::Value = serde_json::from_str(&show).expect("json");
    assert_eq!(json["name"], "greeting");

    let check = stdout_of(parlance(&dir).args(["patterns", "check"]));
    assert!(check.contains("all pattern examples match"));
}

#[test]
fn patterns_show_unknown_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    parlance(&dir)
        .args(["patterns", "show", "gesture", "nope"])
        .assert()
        .failure();
}

#[test]
fn report_classifies_each_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("utterances.txt");
    let mut file = std::fs::File::create(&input).expect("create");
    writeln!(file, "hello\nwhat time is it\n\npurple monkey dishwasher").expect("write");

    let stdout = stdout_of(parlance(&dir).arg("report").arg(&input));
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("json");
    assert_eq!(json["total_records"], 3);
    assert_eq!(json["unique_inputs"], 3);
}

#[test]
fn custom_config_file_is_honored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let patterns = dir.path().join("patterns.toml");
    std::fs::write(
        &patterns,
        "[[patterns.action]]\nname = \"pod_bay\"\npattern = \"^open the pod bay doors$\"\nsub_category = \"door\"\nconfidence = 0.9\n",
    )
    .expect("write patterns");
    std::fs::write(
        dir.path().join("parlance.toml"),
        format!("patterns_path = {:?}\n", patterns.display().to_string()),
    )
    .expect("write config");

    let list = stdout_of(parlance(&dir).args(["patterns", "list"]));
    assert_eq!(list.lines().count(), 1);
    assert!(list.starts_with("action\t1\t1 enabled"));
}
