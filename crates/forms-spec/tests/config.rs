use std::fs;

use forms_spec::{DeadEndPolicy, EngineConfig, FormsError, ValidatorRegistry};

#[test]
fn config_file_sets_policy_and_disabled_validators() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("forms.json");
    fs::write(
        &path,
        r#"{ "dead_end": "finish", "disabled_validators": ["pattern", "contains"] }"#,
    )
    .expect("write");

    let config = EngineConfig::from_file(&path).expect("config");
    assert_eq!(config.dead_end, DeadEndPolicy::Finish);
    assert!(!config.is_validator_enabled("pattern"));
    assert!(config.is_validator_enabled("equals"));

    let registry = ValidatorRegistry::from_config(&config);
    assert_eq!(registry.len(), ValidatorRegistry::with_defaults().len() - 2);
    assert!(registry.get("contains").is_err());
}

#[test]
fn empty_config_file_means_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("empty.json");
    fs::write(&path, "\n").expect("write");
    assert_eq!(EngineConfig::from_file(&path).expect("config"), EngineConfig::default());
}

#[test]
fn malformed_config_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{ "dead_end": "sometimes" }"#).expect("write");
    let err = EngineConfig::from_file(&path).expect_err("bad policy");
    assert!(matches!(err, FormsError::Config(_)));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = EngineConfig::from_file(&dir.path().join("absent.json")).expect_err("missing");
    assert!(matches!(err, FormsError::Io(_)));
}

#[test]
fn policy_parses_case_insensitively() {
    assert_eq!("Finish".parse::<DeadEndPolicy>().expect("parse"), DeadEndPolicy::Finish);
    assert_eq!(" error ".parse::<DeadEndPolicy>().expect("parse"), DeadEndPolicy::Error);
    assert!("never".parse::<DeadEndPolicy>().is_err());
}
