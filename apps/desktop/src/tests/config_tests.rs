use super::{load_settings_with, Overrides, Settings};

use std::{
    collections::HashMap,
    env, fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_config(name: &str, contents: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("lesion_desktop_config_test_{name}_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("desktop.toml");
    fs::write(&path, contents).expect("write config");
    path
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn missing_file() -> PathBuf {
    env::temp_dir().join("lesion_desktop_config_test_missing/desktop.toml")
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings =
        load_settings_with(&missing_file(), &Overrides::default(), env_from(&[])).expect("load");

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.request_timeout().as_secs(), 30);
    assert_eq!(settings.confirmation_ttl().as_secs(), 3);
}

#[test]
fn file_then_env_then_flags_take_precedence() {
    let path = temp_config(
        "precedence",
        "server_url = \"http://file:5000/\"\nrequest_timeout_secs = 10\nlog_filter = \"debug\"\n",
    );
    let env = env_from(&[
        ("CLASSIFIER_SERVER_URL", "http://legacy:5000"),
        ("APP__SERVER_URL", "http://env:5000"),
        ("APP__CONFIRMATION_TTL_SECS", "5"),
    ]);

    let from_env = load_settings_with(&path, &Overrides::default(), &env).expect("load");
    assert_eq!(from_env.server_url, "http://env:5000");
    assert_eq!(from_env.request_timeout_secs, 10);
    assert_eq!(from_env.confirmation_ttl_secs, 5);
    assert_eq!(from_env.log_filter, "debug");

    let overrides = Overrides {
        server_url: Some("https://flag.example/".into()),
        request_timeout_secs: Some(2),
    };
    let from_flags = load_settings_with(&path, &overrides, &env).expect("load");
    assert_eq!(from_flags.server_url, "https://flag.example");
    assert_eq!(from_flags.request_timeout_secs, 2);

    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn rejects_non_http_server_url() {
    let err = load_settings_with(
        &missing_file(),
        &Overrides::default(),
        env_from(&[("APP__SERVER_URL", "ftp://example.com")]),
    )
    .expect_err("ftp is not allowed");

    assert!(err.to_string().contains("invalid classifier server url"));
}

#[test]
fn rejects_malformed_numbers_and_zero_timeout() {
    assert!(load_settings_with(
        &missing_file(),
        &Overrides::default(),
        env_from(&[("APP__REQUEST_TIMEOUT_SECS", "soon")]),
    )
    .is_err());

    let zero = Overrides {
        request_timeout_secs: Some(0),
        ..Overrides::default()
    };
    assert!(load_settings_with(&missing_file(), &zero, env_from(&[])).is_err());
}

#[test]
fn unknown_file_keys_are_errors() {
    let path = temp_config("unknown_key", "database_url = \"sqlite://x.db\"\n");

    let err = load_settings_with(&path, &Overrides::default(), env_from(&[]))
        .expect_err("unknown key");

    assert!(err.to_string().contains("parsing"));
    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}
