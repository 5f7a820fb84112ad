//! File loading and pattern document resolution.

use parlance::config::ParlanceConfig;

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ParlanceConfig::load_from(&dir.path().join("absent.toml")).expect("load");
    assert_eq!(config, ParlanceConfig::default());
}

#[test]
fn file_values_are_loaded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("parlance.toml");
    std::fs::write(
        &path,
        "[monitor]\nmax_records = 5\n\n[classifier]\nllm_timeout_ms = 100\n",
    )
    .expect("write");

    let config = ParlanceConfig::load_from(&path).expect("load");
    assert_eq!(config.monitor.max_records, 5);
    assert_eq!(config.classifier.llm_timeout_ms, 100);
    assert_eq!(config.classifier.llm_timeout().as_millis(), 100);
}

#[test]
fn malformed_file_names_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("parlance.toml");
    std::fs::write(&path, "[monitor\nmax_records = ").expect("write");

    let err = ParlanceConfig::load_from(&path).expect_err("malformed");
    assert!(format!("{err:#}").contains("parlance.toml"));
}

#[test]
fn unreadable_pattern_document_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ParlanceConfig {
        patterns_path: Some(dir.path().join("missing-patterns.toml")),
        ..ParlanceConfig::default()
    };
    let err = config.pattern_document().expect_err("missing");
    assert!(format!("{err:#}").contains("missing-patterns.toml"));
}

#[test]
fn pattern_document_is_read_from_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("patterns.toml");
    std::fs::write(
        &path,
        "[[patterns.memory]]\nname = \"note\"\npattern = \"^note that\"\nsub_category = \"store\"\nconfidence = 0.8\n",
    )
    .expect("write");

    let config = ParlanceConfig {
        patterns_path: Some(path),
        ..ParlanceConfig::default()
    };
    let document = config.pattern_document().expect("document");
    assert_eq!(document.len(), 1);
    assert!(document.patterns.contains_key("memory"));
}
