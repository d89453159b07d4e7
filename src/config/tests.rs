use std::io::Write;

use super::*;

fn env_with(pairs: &[(&str, &str)]) -> Environment {
    let mut map = config::Map::new();
    for (key, value) in pairs {
        map.insert((*key).to_string(), (*value).to_string());
    }
    environment().source(Some(map))
}

#[test]
fn defaults_apply_without_sources() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.database.url.is_none());
    assert_eq!(settings.database.max_connections.get(), 5);
    assert_eq!(settings.cache.capacity.get(), 1000);
    assert_eq!(settings.cache.load_timeout, Duration::from_secs(10));
    assert_eq!(settings.templates.timeout, Duration::from_secs(5));
    assert_eq!(settings.templates.max_bytes.get(), 1024 * 1024);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.cache.capacity = Some(10);
    raw.logging.level = Some("info".to_string());

    let overrides = GlobalOverrides {
        cache_capacity: Some(25),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.cache.capacity.get(), 25);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.capacity = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero capacity must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.capacity",
            ..
        }
    ));
}

#[test]
fn zero_load_timeout_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.load_timeout_ms = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero timeout must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.load_timeout_ms",
            ..
        }
    ));
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "logging.level",
            ..
        })
    ));
}

#[test]
fn blank_database_url_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn environment_overrides_file_and_cli_overrides_environment() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config file");
    writeln!(
        file,
        "[cache]\ncapacity = 10\nload_timeout_ms = 250\n\n[templates]\ntimeout_ms = 750"
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        "docasm",
        "--config-file",
        file.path().to_str().expect("utf-8 path"),
        "--cache-load-timeout-ms",
        "900",
        "list",
    ]);
    let env = env_with(&[
        ("DOCASM__CACHE__CAPACITY", "20"),
        ("DOCASM__CACHE__LOAD_TIMEOUT_MS", "500"),
    ]);

    let settings = load_with_environment(&args, env).expect("settings load");

    assert_eq!(settings.cache.capacity.get(), 20);
    assert_eq!(settings.cache.load_timeout, Duration::from_millis(900));
    assert_eq!(settings.templates.timeout, Duration::from_millis(750));
}

#[test]
fn missing_explicit_config_file_fails() {
    let args = CliArgs::parse_from([
        "docasm",
        "--config-file",
        "/nonexistent/docasm-test.toml",
        "migrate",
    ]);

    assert!(matches!(
        load_with_environment(&args, env_with(&[])),
        Err(LoadError::Build(_))
    ));
}

#[test]
fn parse_get_with_repeated_keys() {
    let args = CliArgs::parse_from([
        "docasm", "get", "--id", "1", "--name", "DOC_1", "--name", "DOC_2",
    ]);

    match args.command {
        Command::Get(get) => {
            assert_eq!(get.ids, vec![1]);
            assert_eq!(get.names, vec!["DOC_1".to_string(), "DOC_2".to_string()]);
            assert!(!get.no_template);
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn get_requires_a_key() {
    assert!(CliArgs::try_parse_from(["docasm", "get"]).is_err());
}

#[test]
fn delete_accepts_exactly_one_key() {
    let args = CliArgs::parse_from(["docasm", "delete", "--name", "DOC_1"]);
    match args.command {
        Command::Delete(delete) => {
            assert_eq!(delete.name.as_deref(), Some("DOC_1"));
            assert!(delete.id.is_none());
        }
        _ => panic!("wrong command parsed"),
    }

    assert!(CliArgs::try_parse_from(["docasm", "delete", "--id", "1", "--name", "DOC_1"]).is_err());
}

#[test]
fn update_rejects_setting_and_clearing_together() {
    assert!(
        CliArgs::try_parse_from([
            "docasm",
            "update",
            "--id",
            "1",
            "--template-uri",
            "https://example.com/a",
            "--clear-template-uri",
        ])
        .is_err()
    );
}

#[test]
fn global_overrides_parse_after_subcommand() {
    let args = CliArgs::parse_from([
        "docasm",
        "list",
        "--database-url",
        "postgres://example",
        "--limit",
        "5",
    ]);

    assert_eq!(
        args.overrides.database_url.as_deref(),
        Some("postgres://example")
    );
    match args.command {
        Command::List(list) => {
            assert_eq!(list.limit, 5);
            assert_eq!(list.offset, 0);
        }
        _ => panic!("wrong command parsed"),
    }
}
