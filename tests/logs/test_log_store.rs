//! Tests for `LogStore`
//!
//! Provisioning, silent writes after closure and the single terminal marker.

use kodegen_agent_sessions::logs::LogHeader;
use kodegen_agent_sessions::{LogStore, SessionKey, TerminalMarker, read_tail};
use tempfile::TempDir;
use tokio_test::assert_ok;

fn store() -> (TempDir, LogStore) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().expect("tempdir");
    let store = LogStore::new(dir.path());
    (dir, store)
}

#[tokio::test]
async fn test_ensure_is_idempotent() {
    let (_dir, store) = store();
    let key = SessionKey::new("claude", "ws1");

    let first = assert_ok!(store.ensure(&key).await);
    assert!(store.append(&key, "kept\n").await);
    let second = assert_ok!(store.ensure(&key).await);

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    let content = assert_ok!(tokio::fs::read_to_string(store.log_path(&key)).await);
    assert_eq!(content, "kept\n");
}

#[tokio::test]
async fn test_append_to_unprovisioned_key_is_silent() {
    let (dir, store) = store();
    let key = SessionKey::new("claude", "never-started");

    assert!(!store.append(&key, "lost\n").await);
    assert!(!store.is_provisioned(&key));
    assert!(!store.log_path(&key).exists());
    assert!(!dir.path().join("agent").exists());
}

#[tokio::test]
async fn test_append_after_finalize_is_silent() {
    let (_dir, store) = store();
    let key = SessionKey::new("claude", "ws1");

    assert_ok!(store.ensure(&key).await);
    assert_ok!(
        store
            .write_header(&key, &LogHeader::new(&key, "do the thing"))
            .await
    );
    assert!(store.append(&key, "working\n").await);
    assert!(
        store
            .finalize(&key, &TerminalMarker::Complete { exit_code: 0 })
            .await
    );

    assert!(!store.append(&key, "late\n").await);
    assert!(!store.is_provisioned(&key));

    let content = assert_ok!(tokio::fs::read_to_string(store.log_path(&key)).await);
    assert_eq!(
        content,
        "Provider: claude\nWorkspace: ws1\nMessage: do the thing\n\nworking\n[COMPLETE] exit code 0\n"
    );
}

#[tokio::test]
async fn test_only_first_marker_is_written() {
    let (_dir, store) = store();
    let key = SessionKey::new("codex", "ws2");

    let log = assert_ok!(store.ensure(&key).await);
    assert!(log.append("partial line without newline").await);

    assert!(store.finalize_log(&log, &TerminalMarker::Cancelled).await);
    assert!(
        !store
            .finalize_log(
                &log,
                &TerminalMarker::Failed {
                    message: "boom".into()
                }
            )
            .await
    );
    assert!(!store.finalize(&key, &TerminalMarker::Cancelled).await);
    assert!(log.is_finalized());

    let content = assert_ok!(tokio::fs::read_to_string(log.path()).await);
    assert_eq!(content, "partial line without newline\n[CANCELLED]\n");
}

#[tokio::test]
async fn test_fresh_session_replaces_old_file() {
    let (_dir, store) = store();
    let key = SessionKey::new("claude", "ws1");

    let old = assert_ok!(store.ensure(&key).await);
    assert!(old.append("old session\n").await);
    assert!(store.finalize(&key, &TerminalMarker::Complete { exit_code: 1 }).await);

    let new = assert_ok!(store.ensure(&key).await);
    assert!(!std::sync::Arc::ptr_eq(&old, &new));
    assert!(new.append("new session\n").await);

    let content = assert_ok!(tokio::fs::read_to_string(store.log_path(&key)).await);
    assert_eq!(content, "new session\n");
}

#[tokio::test]
async fn test_read_tail_respects_char_boundaries() {
    let (_dir, store) = store();
    let key = SessionKey::new("claude", "ws1");

    let log = assert_ok!(store.ensure(&key).await);
    assert!(log.append("ééééé\n").await);

    // 4 bytes from the end lands inside the second-to-last "é"
    let tail = assert_ok!(read_tail(log.path(), 4).await);
    assert_eq!(tail, "é\n");

    let whole = assert_ok!(read_tail(log.path(), 1024).await);
    assert_eq!(whole, "ééééé\n");
}

#[test]
fn test_paths_are_sanitized() {
    let store = LogStore::new("/data");
    let path = store.log_path(&SessionKey::new("claude", "../escape"));
    assert_eq!(
        path,
        std::path::PathBuf::from("/data/agent/claude/.._escape/stream.log")
    );
}
