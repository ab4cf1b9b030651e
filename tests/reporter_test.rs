mod common;

use common::*;
use mailbot::reporter::{write_token, ErrorReporter, ErrorState, ReportOutcome, DIGEST_SUBJECT};
use std::path::PathBuf;
use tempfile::TempDir;
use tokio_test::assert_ok;

fn reporter(dir: &TempDir) -> ErrorReporter {
    let config = test_config(dir.path());
    ErrorReporter::new(&config, &test_credentials())
}

fn token(dir: &TempDir) -> PathBuf {
    dir.path().join("mailbot_token.txt")
}

fn write_logs(dir: &TempDir) {
    std::fs::write(dir.path().join("email.log"), "INFO cycle done\n").unwrap();
    std::fs::write(dir.path().join("printer.log"), "ERROR lp failed\n").unwrap();
}

#[tokio::test]
async fn test_no_token_means_no_mail() {
    let dir = TempDir::new().unwrap();
    write_logs(&dir);
    let outbox = FakeOutbox::default();

    let outcome = assert_ok!(reporter(&dir).report(&outbox).await);

    assert_eq!(outcome, ReportOutcome::NothingToReport);
    assert!(outbox.sent().is_empty());
    assert!(dir.path().join("email.log").exists());
}

#[tokio::test]
async fn test_raised_error_state_produces_one_digest() {
    let dir = TempDir::new().unwrap();
    write_logs(&dir);
    let mut state = ErrorState::new(token(&dir));
    state.raise("printer: lp exited with 1");
    state.raise("a second failure");
    assert_eq!(state.cause(), Some("printer: lp exited with 1"));

    let outbox = FakeOutbox::default();
    let outcome = assert_ok!(reporter(&dir).report(&outbox).await);
    assert_eq!(outcome, ReportOutcome::Sent { logs_attached: 2 });

    let sent = outbox.sent();
    assert_eq!(sent.len(), 1, "one message for all contacts");
    assert_eq!(sent[0].subject, DIGEST_SUBJECT);
    assert_eq!(sent[0].to, vec![ALICE.to_string(), BOB.to_string()]);

    let names: Vec<_> = sent[0]
        .attachments
        .iter()
        .map(|a| a.name.clone().unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["email.log", "printer.log"]);
    assert_eq!(sent[0].attachments[1].content, b"ERROR lp failed\n");

    assert!(!token(&dir).exists());
    assert!(!dir.path().join("email.log").exists());
    assert!(!dir.path().join("printer.log").exists());
}

#[tokio::test]
async fn test_missing_log_is_skipped() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("printer.log"), "ERROR\n").unwrap();
    write_token(&token(&dir), "1").unwrap();
    let outbox = FakeOutbox::default();

    let outcome = assert_ok!(reporter(&dir).report(&outbox).await);

    assert_eq!(outcome, ReportOutcome::Sent { logs_attached: 1 });
    assert_eq!(outbox.sent()[0].attachments[0].name.as_deref(), Some("printer.log"));
}

#[tokio::test]
async fn test_send_failure_keeps_token_and_logs() {
    let dir = TempDir::new().unwrap();
    write_logs(&dir);
    write_token(&token(&dir), "1").unwrap();

    let result = reporter(&dir).report(&FakeOutbox::failing()).await;

    assert!(result.is_err());
    assert!(token(&dir).exists());
    assert!(dir.path().join("email.log").exists());
    assert!(dir.path().join("printer.log").exists());
}

#[test]
fn test_pending_status_reads_token() {
    let dir = TempDir::new().unwrap();
    let reporter = reporter(&dir);
    assert_eq!(reporter.pending_status().unwrap(), None);

    write_token(&token(&dir), "1\n").unwrap();
    assert_eq!(reporter.pending_status().unwrap(), Some("1".to_string()));
}
