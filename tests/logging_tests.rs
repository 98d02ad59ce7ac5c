use favcards::logging::{RotatingLog, rotate};
use spectral::assert_that;
use spectral::boolean::BooleanAssertions;
use std::fs;
use std::io::Write;

#[test]
fn small_log_is_left_in_place() {
    let dir = tempfile::tempdir().expect("temp dir");
    let log = dir.path().join("app.log");
    fs::write(&log, "short").expect("log written");

    rotate(&log, 1024, 3).expect("Expected rotation to succeed.");

    assert_that(&fs::read_to_string(&log).expect("log")).is_equal_to("short".to_owned());
    assert_that(&dir.path().join("app.log.1").exists()).is_false();
}

#[test]
fn missing_log_is_not_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");

    assert_that(&rotate(&dir.path().join("app.log"), 10, 3).is_ok()).is_true();
}

#[test]
fn oversized_log_shifts_backups_and_drops_the_oldest() {
    let dir = tempfile::tempdir().expect("temp dir");
    let log = dir.path().join("app.log");
    fs::write(&log, "current log contents").expect("log written");
    fs::write(dir.path().join("app.log.1"), "one").expect("backup written");
    fs::write(dir.path().join("app.log.2"), "two").expect("backup written");
    fs::write(dir.path().join("app.log.3"), "three").expect("backup written");

    rotate(&log, 4, 3).expect("Expected rotation to succeed.");

    let read = |name: &str| fs::read_to_string(dir.path().join(name)).expect("backup");
    assert_that(&log.exists()).is_false();
    assert_that(&read("app.log.1")).is_equal_to("current log contents".to_owned());
    assert_that(&read("app.log.2")).is_equal_to("one".to_owned());
    assert_that(&read("app.log.3")).is_equal_to("two".to_owned());
    assert_that(&dir.path().join("app.log.4").exists()).is_false();
}

#[test]
fn writes_past_the_cap_roll_the_log_over() {
    let dir = tempfile::tempdir().expect("temp dir");
    let log_path = dir.path().join("app.log");
    let mut log = RotatingLog::open(&log_path, 64, 2).expect("Expected the log to open.");

    let records = ["first record\n", "second record\n", "third record\n"];
    for record in records {
        log.write_all(record.repeat(3).as_bytes())
            .expect("Expected the record to be written.");
    }
    log.flush().expect("flush");

    let read = |name: &str| fs::read_to_string(dir.path().join(name)).expect("log file");
    assert_that(&read("app.log")).is_equal_to("third record\n".repeat(3));
    assert_that(&read("app.log.1")).is_equal_to("second record\n".repeat(3));
    assert_that(&read("app.log.2")).is_equal_to("first record\n".repeat(3));
    assert_that(&dir.path().join("app.log.3").exists()).is_false();
}

#[test]
fn reopened_log_counts_existing_contents() {
    let dir = tempfile::tempdir().expect("temp dir");
    let log_path = dir.path().join("app.log");
    fs::write(&log_path, "x".repeat(50)).expect("log written");

    let mut log = RotatingLog::open(&log_path, 64, 1).expect("Expected the log to open.");
    log.write_all(&[b'y'; 20]).expect("Expected the record to be written.");
    log.flush().expect("flush");

    assert_that(&fs::read_to_string(&log_path).expect("log")).is_equal_to("y".repeat(20));
    assert_that(&fs::read_to_string(dir.path().join("app.log.1")).expect("backup"))
        .is_equal_to("x".repeat(50));
}
