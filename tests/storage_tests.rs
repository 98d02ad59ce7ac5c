use chrono::{Duration, Utc};
use favcards::error::RunError;
use favcards::storage::SessionCookie;
use favcards::{AuthState, ProcessedIds};
use spectral::assert_that;
use spectral::boolean::BooleanAssertions;
use std::fs;

fn cookie(name: &str, expires: Option<f64>) -> SessionCookie {
    SessionCookie {
        name: name.to_owned(),
        value: format!("{name}-value"),
        domain: "translate.example.com".to_owned(),
        path: Some("/".to_owned()),
        expires,
    }
}

#[test]
fn missing_id_file_is_empty_store() {
    let dir = tempfile::tempdir().expect("temp dir");

    let store = ProcessedIds::load(dir.path().join("processed_ids.json")).expect("Expected an empty store.");

    assert_that(&store.is_empty()).is_true();
    assert_that(&store.is_dirty()).is_false();
}

#[test]
fn corrupt_id_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("processed_ids.json");
    fs::write(&path, "[\"a\", ").expect("file written");

    assert_that(&ProcessedIds::load(&path).is_err()).is_true();
}

#[test]
fn id_file_must_hold_a_list() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("processed_ids.json");
    fs::write(&path, r#"{"ids": ["a"]}"#).expect("file written");

    assert_that(&ProcessedIds::load(&path).is_err()).is_true();
}

#[test]
fn flush_writes_sorted_ids_that_survive_reload() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("nested").join("processed_ids.json");

    let mut store = ProcessedIds::load(&path).expect("store");
    assert_that(&store.insert("b")).is_true();
    assert_that(&store.insert("a")).is_true();
    assert_that(&store.insert("b")).is_false();
    store.flush().expect("Expected the store to be written.");

    let written: Vec<String> =
        serde_json::from_str(&fs::read_to_string(&path).expect("file")).expect("JSON list");
    assert_that(&written).is_equal_to(vec!["a".to_owned(), "b".to_owned()]);

    let reloaded = ProcessedIds::load(&path).expect("store");
    assert_that(&reloaded.len()).is_equal_to(2);
    assert_that(&reloaded.contains("a")).is_true();
}

#[test]
fn clean_store_is_not_written() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("processed_ids.json");

    let mut store = ProcessedIds::load(&path).expect("store");
    store.flush().expect("flush");

    assert_that(&path.exists()).is_false();
}

#[test]
fn missing_session_is_reported_as_missing() {
    let dir = tempfile::tempdir().expect("temp dir");

    let result = AuthState::load(&dir.path().join("auth_state.json"));

    assert_that(&matches!(result, Err(RunError::AuthMissing { .. }))).is_true();
}

#[test]
fn unparsable_session_is_invalid() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("auth_state.json");
    fs::write(&path, "not json").expect("file written");

    let result = AuthState::load(&path);

    assert_that(&matches!(result, Err(RunError::AuthInvalid { .. }))).is_true();
    assert_that(&result.is_err_and(|e| e.needs_login())).is_true();
}

#[test]
fn session_without_cookies_is_invalid() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("auth_state.json");
    fs::write(&path, r#"{"cookies": [], "origins": []}"#).expect("file written");

    assert_that(&matches!(AuthState::load(&path), Err(RunError::AuthInvalid { .. }))).is_true();
}

#[test]
fn session_with_only_expired_cookies_is_invalid() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("auth_state.json");
    let yesterday = (Utc::now() - Duration::days(1)).timestamp() as f64;
    let state = AuthState {
        cookies: vec![cookie("SID", Some(yesterday)), cookie("HSID", Some(yesterday))],
        saved_at: None,
    };
    fs::write(&path, serde_json::to_string(&state).expect("JSON")).expect("file written");

    assert_that(&matches!(AuthState::load(&path), Err(RunError::AuthInvalid { .. }))).is_true();
}

#[test]
fn session_cookies_never_expire() {
    let yesterday = (Utc::now() - Duration::days(1)).timestamp() as f64;
    let state = AuthState {
        cookies: vec![cookie("SID", Some(yesterday)), cookie("NID", Some(-1.0)), cookie("PREF", None)],
        saved_at: None,
    };

    assert_that(&state.is_expired_at(Utc::now())).is_true();

    let only_session = AuthState {
        cookies: vec![cookie("NID", Some(-1.0)), cookie("PREF", None)],
        saved_at: None,
    };
    assert_that(&only_session.is_expired_at(Utc::now())).is_false();
}

#[test]
fn saved_session_loads_back() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("auth_state.json");
    let mut state = AuthState::from_cookie_header(" SID=abc ; HSID=def;broken", "translate.example.com");

    state.save(&path).expect("Expected the session to be saved.");
    let loaded = AuthState::load(&path).expect("Expected a valid session.");

    assert_that(&loaded.cookie_header()).is_equal_to("SID=abc; HSID=def".to_owned());
    assert_that(&loaded.saved_at.is_some()).is_true();
}

#[test]
fn set_cookie_updates_and_adds_cookies() {
    let mut state = AuthState::from_cookie_header("SID=abc", "translate.example.com");

    assert_that(&state.absorb_set_cookie("SID=abc; Path=/", "translate.example.com")).is_false();
    assert_that(&state.absorb_set_cookie("SID=xyz; Max-Age=60; HttpOnly", "translate.example.com"))
        .is_true();
    assert_that(&state.absorb_set_cookie("NID=42; Path=/", "translate.example.com")).is_true();
    assert_that(&state.absorb_set_cookie("=nameless", "translate.example.com")).is_false();

    assert_that(&state.cookie_header()).is_equal_to("SID=xyz; NID=42".to_owned());
    let sid = state.cookies.first().expect("SID cookie");
    assert_that(&sid.expires.is_some_and(|expires| expires > Utc::now().timestamp() as f64))
        .is_true();
}
