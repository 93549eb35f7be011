use super::loader::{parse, read};
use super::*;

#[test]
fn default_config_has_expected_values() {
    let mut config = Config::default();
    config.validate();

    assert!(!config.log.enabled);
    assert!(config.services.hide_trusted_publishers);
    assert_eq!(config.services.trusted_issuer, "CN=Microsoft");
    assert_eq!(config.tasks.excluded_folders, [r"\Microsoft\"]);
    assert_eq!(config.tasks.description, DEFAULT_DESCRIPTION);
}

#[test]
fn empty_file_is_all_defaults() {
    let config = parse("").unwrap();

    assert_eq!(config, Config::default());
}

#[test]
fn partial_sections_keep_other_defaults() {
    // Arrange
    let toml = r#"
        [services]
        hide_trusted_publishers = false

        [log]
        enabled = true
        level = "debug"
    "#;

    // Act
    let config = parse(toml).unwrap();

    // Assert
    assert!(!config.services.hide_trusted_publishers);
    assert_eq!(config.services.trusted_issuer, "CN=Microsoft");
    assert!(config.log.enabled);
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.log.max_file_mb, 10);
    assert_eq!(config.tasks, TaskConfig::default());
}

#[test]
fn validate_normalizes_task_folders() {
    // Arrange
    let mut config = Config {
        tasks: TaskConfig {
            excluded_folders: vec![
                r"\Microsoft\".into(),
                "Vendor".into(),
                r" \Contoso\Agents ".into(),
                r"\".into(),
                String::new(),
            ],
            description: "  ".into(),
        },
        ..Default::default()
    };

    // Act
    config.validate();

    // Assert
    assert_eq!(
        config.tasks.excluded_folders,
        [r"\Microsoft\", r"\Vendor\", r"\Contoso\Agents\"]
    );
    assert_eq!(config.tasks.description, DEFAULT_DESCRIPTION);
}

#[test]
fn validate_restores_blank_issuer_and_clamps_log_size() {
    let mut config = Config::default();
    config.services.trusted_issuer = " ".into();
    config.log.max_file_mb = 0;

    config.validate();

    assert_eq!(config.services.trusted_issuer, DEFAULT_TRUSTED_ISSUER);
    assert_eq!(config.log.max_file_mb, 1);
}

#[test]
fn invalid_toml_is_an_error() {
    assert!(parse("[services\nhide_trusted_publishers = 3").is_err());
    assert!(parse("[services]\nhide_trusted_publishers = \"yes\"").is_err());
}

#[test]
fn read_reports_path_on_failure() {
    let path = std::env::temp_dir().join("autorun-config-test-missing.toml");

    let err = read(&path).unwrap_err();

    assert!(err.contains("autorun-config-test-missing.toml"));
}

#[test]
fn config_path_is_under_home() {
    if let Some(path) = config_path() {
        assert!(path.ends_with(".config/autorun/config.toml"));
    }
}
