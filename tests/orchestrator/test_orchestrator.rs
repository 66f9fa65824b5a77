//! Tests for `SessionOrchestrator`
//!
//! Sessions run on a scripted transport so every chunk, exit status and
//! cancellation is under the test's control.

use futures::future::BoxFuture;
use kodegen_agent_sessions::transport::{
    Acquisition, LaunchSpec, LaunchedTransport, TransportCancel, TransportEvent, TransportExit,
    TransportFactory, TransportKind,
};
use kodegen_agent_sessions::{
    CorrelationId, FragmentOrigin, FragmentStore, OrchestratorConfig, SessionError, SessionEvent,
    SessionKey, SessionOrchestrator, SessionRequest, StaticResolver, StreamTransportFactory,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};
use tokio_test::{assert_err, assert_ok};

// ============================================================================
// Scripted transport
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Launch,
    Unavailable,
    FailLaunch,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CancelReply {
    Acknowledge,
    Refuse,
    Never,
}

struct ScriptedFactory {
    behavior: Behavior,
    cancel_reply: CancelReply,
    senders: Mutex<Vec<mpsc::UnboundedSender<TransportEvent>>>,
    specs: Mutex<Vec<LaunchSpec>>,
    cancels: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    fn new(behavior: Behavior) -> Arc<Self> {
        Self::with_cancel_reply(behavior, CancelReply::Acknowledge)
    }

    fn refusing_cancel() -> Arc<Self> {
        Self::with_cancel_reply(Behavior::Launch, CancelReply::Refuse)
    }

    fn with_cancel_reply(behavior: Behavior, cancel_reply: CancelReply) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            cancel_reply,
            senders: Mutex::new(Vec::new()),
            specs: Mutex::new(Vec::new()),
            cancels: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn sender(&self, launch: usize) -> mpsc::UnboundedSender<TransportEvent> {
        self.senders.lock().unwrap()[launch].clone()
    }

    fn launches(&self) -> usize {
        self.specs.lock().unwrap().len()
    }

    fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl TransportFactory for ScriptedFactory {
    fn kind(&self) -> TransportKind {
        TransportKind::Process
    }

    fn acquire<'a>(
        &'a self,
        spec: &'a LaunchSpec,
    ) -> BoxFuture<'a, kodegen_agent_sessions::Result<Acquisition>> {
        Box::pin(async move {
            match self.behavior {
                Behavior::Unavailable => return Ok(Acquisition::Unavailable("scripted".into())),
                Behavior::FailLaunch => return Err(SessionError::launch("scripted failure")),
                Behavior::Launch => {}
            }

            let (tx, rx) = mpsc::unbounded_channel();
            self.senders.lock().unwrap().push(tx.clone());
            self.specs.lock().unwrap().push(spec.clone());
            Ok(Acquisition::Launched(LaunchedTransport {
                kind: TransportKind::Process,
                pid: Some(4242),
                events: rx,
                canceller: Arc::new(ScriptedCancel {
                    tx,
                    reply: self.cancel_reply,
                    count: Arc::clone(&self.cancels),
                }),
            }))
        })
    }
}

struct ScriptedCancel {
    tx: mpsc::UnboundedSender<TransportEvent>,
    reply: CancelReply,
    count: Arc<AtomicUsize>,
}

impl TransportCancel for ScriptedCancel {
    fn cancel(&self) -> BoxFuture<'_, kodegen_agent_sessions::Result<()>> {
        Box::pin(async move {
            self.count.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                CancelReply::Acknowledge => {}
                CancelReply::Refuse => return Err(SessionError::cancel("scripted refusal")),
                CancelReply::Never => std::future::pending::<()>().await,
            }
            let _ = self
                .tx
                .send(TransportEvent::Exited(TransportExit::Cancelled));
            Ok(())
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    _dir: TempDir,
    orchestrator: SessionOrchestrator,
    events: broadcast::Receiver<SessionEvent>,
}

fn harness(factories: Vec<Arc<dyn TransportFactory>>) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let config = OrchestratorConfig::builder()
        .data_dir(dir.path())
        .cancel_timeout_ms(2000)
        .build();
    let orchestrator = SessionOrchestrator::builder(config)
        .transport_factories(factories)
        .build()
        .unwrap();
    let events = orchestrator.subscribe();
    Harness {
        _dir: dir,
        orchestrator,
        events,
    }
}

fn as_dyn<F: TransportFactory + 'static>(factory: &Arc<F>) -> Arc<dyn TransportFactory> {
    factory.clone()
}

fn request(message: &str) -> SessionRequest {
    SessionRequest::new(message, std::env::temp_dir())
}

async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event bus closed")
}

/// Poll until `condition` holds
async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held");
}

/// Events for `key` up to and including its `Complete`
async fn until_complete(
    events: &mut broadcast::Receiver<SessionEvent>,
    key: &SessionKey,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        if event.key() != key {
            continue;
        }
        let done = matches!(event, SessionEvent::Complete { .. });
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn output(key: &SessionKey, text: &str) -> SessionEvent {
    SessionEvent::Output {
        key: key.clone(),
        text: text.into(),
    }
}

fn complete(key: &SessionKey, exit_code: Option<i32>) -> SessionEvent {
    SessionEvent::Complete {
        key: key.clone(),
        exit_code,
    }
}

async fn log_content(orchestrator: &SessionOrchestrator, key: &SessionKey) -> String {
    tokio::fs::read_to_string(orchestrator.logs().log_path(key))
        .await
        .unwrap()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_completion_with_exit_code_seven() {
    let factory = ScriptedFactory::new(Behavior::Launch);
    let Harness {
        _dir,
        orchestrator,
        mut events,
    } = harness(vec![as_dyn(&factory)]);
    let key = SessionKey::new("claude", "ws1");

    assert_ok!(orchestrator.start(key.clone(), request("hello agent")).await);
    assert!(orchestrator.is_active(&key));

    let tx = factory.sender(0);
    tx.send(TransportEvent::Stdout(
        br#"{"type":"assistant","message":{"content":[{"type":"text","text":"Hi"}]}}
{"result":"o"#
            .to_vec(),
    ))
    .unwrap();
    tx.send(TransportEvent::Stdout(b"k\"}\nplain".to_vec())).unwrap();
    tx.send(TransportEvent::Stderr(b"warning\n".to_vec())).unwrap();
    tx.send(TransportEvent::Exited(TransportExit::Completed(7)))
        .unwrap();

    let seen = until_complete(&mut events, &key).await;
    assert_eq!(
        seen,
        [
            output(&key, "Hi"),
            output(&key, "ok"),
            SessionEvent::Error {
                key: key.clone(),
                text: "warning".into(),
                terminal: false
            },
            output(&key, "plain"),
            complete(&key, Some(7)),
        ]
    );

    assert!(!orchestrator.is_active(&key));
    assert!(orchestrator.registry().is_empty());
    assert_eq!(
        log_content(&orchestrator, &key).await,
        "Provider: claude\nWorkspace: ws1\nMessage: hello agent\n\n\
         Hi\nok\n[stderr] warning\nplain\n[COMPLETE] exit code 7\n"
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_failure_publishes_error_and_marker() {
    let factory = ScriptedFactory::new(Behavior::Launch);
    let Harness {
        _dir,
        orchestrator,
        mut events,
    } = harness(vec![as_dyn(&factory)]);
    let key = SessionKey::new("claude", "ws1");

    assert_ok!(orchestrator.start(key.clone(), request("hello")).await);
    factory
        .sender(0)
        .send(TransportEvent::Exited(TransportExit::Failed("crashed".into())))
        .unwrap();

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Error {
            key: key.clone(),
            text: "crashed".into(),
            terminal: true
        }
    );
    assert!(!orchestrator.is_active(&key));
    assert!(log_content(&orchestrator, &key).await.ends_with("\n\n[ERROR] crashed\n"));
}

// ============================================================================
// Stop
// ============================================================================

#[tokio::test]
async fn test_stop_unknown_key_is_success() {
    let factory = ScriptedFactory::new(Behavior::Launch);
    let Harness {
        _dir,
        orchestrator,
        mut events,
    } = harness(vec![as_dyn(&factory)]);
    let key = SessionKey::new("claude", "nothing-here");

    assert!(orchestrator.stop(&key).await);
    assert!(orchestrator.stop(&key).await);
    assert_eq!(factory.cancels(), 0);
    assert!(events.try_recv().is_err());
    assert!(!orchestrator.logs().log_path(&key).exists());
}

#[tokio::test]
async fn test_repeated_stop_cancels_once() {
    let factory = ScriptedFactory::new(Behavior::Launch);
    let Harness {
        _dir,
        orchestrator,
        mut events,
    } = harness(vec![as_dyn(&factory)]);
    let key = SessionKey::new("claude", "ws1");

    assert_ok!(orchestrator.start(key.clone(), request("hello")).await);

    let (first, second) = tokio::join!(orchestrator.stop(&key), orchestrator.stop(&key));
    assert!(first && second);
    assert!(orchestrator.stop(&key).await);
    assert_eq!(factory.cancels(), 1);

    assert_eq!(until_complete(&mut events, &key).await, [complete(&key, None)]);
    let content = log_content(&orchestrator, &key).await;
    assert_eq!(content.matches("[CANCELLED]").count(), 1);
    assert!(content.ends_with("[CANCELLED]\n"));

    // Give the pump a chance to observe the transport's own exit
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_cancel_still_cleans_up() {
    let factory = ScriptedFactory::refusing_cancel();
    let Harness {
        _dir,
        orchestrator,
        mut events,
    } = harness(vec![as_dyn(&factory)]);
    let key = SessionKey::new("claude", "ws1");

    assert_ok!(orchestrator.start(key.clone(), request("hello")).await);
    assert!(!orchestrator.stop(&key).await);

    assert!(!orchestrator.is_active(&key));
    assert_eq!(until_complete(&mut events, &key).await, [complete(&key, None)]);
    assert!(log_content(&orchestrator, &key).await.ends_with("[CANCELLED]\n"));

    // Already removed: a second stop is a no-op success
    assert!(orchestrator.stop(&key).await);
    assert_eq!(factory.cancels(), 1);
}

#[tokio::test]
async fn test_output_after_completion_is_dropped() {
    let factory = ScriptedFactory::new(Behavior::Launch);
    let Harness {
        _dir,
        orchestrator,
        mut events,
    } = harness(vec![as_dyn(&factory)]);
    let key = SessionKey::new("claude", "ws1");

    assert_ok!(orchestrator.start(key.clone(), request("hello")).await);
    let tx = factory.sender(0);
    tx.send(TransportEvent::Exited(TransportExit::Completed(0)))
        .unwrap();
    tx.send(TransportEvent::Stdout(b"too late\n".to_vec()))
        .unwrap();

    assert_eq!(until_complete(&mut events, &key).await, [complete(&key, Some(0))]);
    assert!(orchestrator.stop(&key).await);
    assert!(!orchestrator.append(&key, "also too late").await);

    let content = log_content(&orchestrator, &key).await;
    assert_eq!(content.matches("[COMPLETE]").count(), 1);
    assert!(!content.contains("too late"));
    assert_eq!(factory.cancels(), 0);
}

#[tokio::test]
async fn test_shutdown_stops_every_session() {
    let factory = ScriptedFactory::new(Behavior::Launch);
    let Harness {
        _dir, orchestrator, ..
    } = harness(vec![as_dyn(&factory)]);

    assert_ok!(
        orchestrator
            .start(SessionKey::new("claude", "ws1"), request("a"))
            .await
    );
    assert_ok!(
        orchestrator
            .start(SessionKey::new("claude", "ws2"), request("b"))
            .await
    );
    assert_eq!(orchestrator.list_sessions().len(), 2);

    assert_eq!(orchestrator.shutdown().await, 0);
    assert!(orchestrator.registry().is_empty());
    assert_eq!(factory.cancels(), 2);
}

// ============================================================================
// Workspace exclusivity
// ============================================================================

#[tokio::test]
async fn test_workspace_exclusivity_across_providers() {
    let factory = ScriptedFactory::new(Behavior::Launch);
    let Harness {
        _dir,
        orchestrator,
        mut events,
    } = harness(vec![as_dyn(&factory)]);
    let claude = SessionKey::new("claude", "ws1");
    let codex = SessionKey::new("codex", "ws1");
    let other = SessionKey::new("claude", "ws2");

    assert_ok!(orchestrator.start(claude.clone(), request("first")).await);
    assert_ok!(orchestrator.start(other.clone(), request("elsewhere")).await);
    assert_ok!(orchestrator.start(codex.clone(), request("second")).await);

    assert_eq!(orchestrator.registry().keys(), [other.clone(), codex.clone()]);
    assert_eq!(until_complete(&mut events, &claude).await, [complete(&claude, None)]);
    eventually(|| factory.cancels() == 1).await;
    assert!(log_content(&orchestrator, &claude).await.ends_with("[CANCELLED]\n"));
    assert!(
        log_content(&orchestrator, &codex)
            .await
            .starts_with("Provider: codex\nWorkspace: ws1\nMessage: second\n")
    );
}

#[tokio::test]
async fn test_restart_same_key_replaces_session() {
    let factory = ScriptedFactory::refusing_cancel();
    let Harness {
        _dir,
        orchestrator,
        mut events,
    } = harness(vec![as_dyn(&factory)]);
    let key = SessionKey::new("claude", "ws1");

    let first = assert_ok!(orchestrator.start(key.clone(), request("one")).await);
    // Eviction swallows the predecessor's cancellation failure
    let second = assert_ok!(orchestrator.start(key.clone(), request("two")).await);
    assert_ne!(first, second);

    assert_eq!(until_complete(&mut events, &key).await, [complete(&key, None)]);
    let sessions = orchestrator.list_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, second);

    // The evicted transport reporting late must not touch the new session
    factory
        .sender(0)
        .send(TransportEvent::Exited(TransportExit::Completed(3)))
        .unwrap();
    factory
        .sender(1)
        .send(TransportEvent::Stdout(b"{\"result\":\"fresh\"}\n".to_vec()))
        .unwrap();
    assert_eq!(next_event(&mut events).await, output(&key, "fresh"));
    assert!(orchestrator.is_active(&key));
    assert_eq!(
        log_content(&orchestrator, &key).await,
        "Provider: claude\nWorkspace: ws1\nMessage: two\n\nfresh\n"
    );
}

#[tokio::test]
async fn test_unresponsive_predecessor_does_not_delay_start() {
    let factory = ScriptedFactory::with_cancel_reply(Behavior::Launch, CancelReply::Never);
    let Harness {
        _dir,
        orchestrator,
        mut events,
    } = harness(vec![as_dyn(&factory)]);
    let key = SessionKey::new("claude", "ws1");

    assert_ok!(orchestrator.start(key.clone(), request("one")).await);
    let started = std::time::Instant::now();
    let second = assert_ok!(
        tokio::time::timeout(
            Duration::from_millis(500),
            orchestrator.start(key.clone(), request("two"))
        )
        .await
        .expect("start waited on the evicted transport")
    );
    assert!(started.elapsed() < orchestrator.config().cancel_timeout());

    assert_eq!(until_complete(&mut events, &key).await, [complete(&key, None)]);
    eventually(|| factory.cancels() == 1).await;
    assert_eq!(orchestrator.session_info(&key).unwrap().session_id, second);
    assert_eq!(
        log_content(&orchestrator, &key).await,
        "Provider: claude\nWorkspace: ws1\nMessage: two\n\n"
    );
}

// ============================================================================
// Transport acquisition
// ============================================================================

#[tokio::test]
async fn test_launch_failure_registers_nothing() {
    let Harness {
        _dir, orchestrator, ..
    } = harness(vec![as_dyn(&ScriptedFactory::new(Behavior::FailLaunch))]);
    let key = SessionKey::new("claude", "ws1");

    let err = assert_err!(orchestrator.start(key.clone(), request("hello")).await);
    assert!(err.is_launch_failure());
    assert!(orchestrator.registry().is_empty());
    assert!(!orchestrator.logs().log_path(&key).exists());
}

#[tokio::test]
async fn test_launch_failure_does_not_fall_back() {
    let fallback = ScriptedFactory::new(Behavior::Launch);
    let Harness {
        _dir, orchestrator, ..
    } = harness(vec![
        as_dyn(&ScriptedFactory::new(Behavior::FailLaunch)),
        as_dyn(&fallback),
    ]);

    assert_err!(
        orchestrator
            .start(SessionKey::new("claude", "ws1"), request("hello"))
            .await
    );
    assert_eq!(fallback.launches(), 0);
}

#[tokio::test]
async fn test_unavailable_stream_falls_back_to_process() {
    let process = ScriptedFactory::new(Behavior::Launch);
    let stream = Arc::new(StreamTransportFactory::new(Arc::new(StaticResolver::new())));
    let Harness {
        _dir, orchestrator, ..
    } = harness(vec![as_dyn(&stream), as_dyn(&process)]);
    let key = SessionKey::new("claude", "ws1");

    assert_ok!(orchestrator.start(key.clone(), request("hello")).await);
    assert_eq!(process.launches(), 1);

    let info = orchestrator.session_info(&key).unwrap();
    assert_eq!(info.transport, "process");
    assert_eq!(info.pid, Some(4242));

    let spec = process.specs.lock().unwrap()[0].clone();
    assert_eq!(spec.message, "hello");
    assert_eq!(spec.key, key);
}

#[tokio::test]
async fn test_all_unavailable_is_no_transport() {
    let Harness {
        _dir, orchestrator, ..
    } = harness(vec![as_dyn(&ScriptedFactory::new(Behavior::Unavailable))]);

    let err = assert_err!(
        orchestrator
            .start(SessionKey::new("claude", "ws1"), request("hello"))
            .await
    );
    assert!(matches!(err, SessionError::NoTransport(provider) if provider == "claude"));
}

// ============================================================================
// Queries and collaborators
// ============================================================================

#[tokio::test]
async fn test_tail_log_only_for_registered_sessions() {
    let factory = ScriptedFactory::new(Behavior::Launch);
    let Harness {
        _dir,
        orchestrator,
        mut events,
    } = harness(vec![as_dyn(&factory)]);
    let key = SessionKey::new("claude", "ws1");

    assert_ok!(orchestrator.start(key.clone(), request("hello")).await);
    assert!(orchestrator.append(&key, "manual note").await);
    assert_eq!(next_event(&mut events).await, output(&key, "manual note"));

    let tail = assert_ok!(orchestrator.tail_log(&key, None).await);
    assert!(tail.started_at.is_some());
    assert_eq!(
        tail.content,
        "Provider: claude\nWorkspace: ws1\nMessage: hello\n\nmanual note\n"
    );

    let short = assert_ok!(orchestrator.tail_log(&key, Some(5)).await);
    assert_eq!(short.content, "note\n");

    assert!(orchestrator.stop(&key).await);
    let gone = assert_ok!(orchestrator.tail_log(&key, None).await);
    assert!(gone.is_empty());
    assert!(orchestrator.logs().log_path(&key).exists());
}

#[derive(Default)]
struct RecordingStore {
    fragments: Mutex<Vec<(CorrelationId, String, FragmentOrigin)>>,
}

impl FragmentStore for RecordingStore {
    fn persist(
        &self,
        correlation_id: &CorrelationId,
        text: &str,
        origin: FragmentOrigin,
    ) -> BoxFuture<'static, kodegen_agent_sessions::Result<()>> {
        if text == "unstorable" {
            return Box::pin(async { Err(SessionError::Persistence("disk full".into())) });
        }
        self.fragments
            .lock()
            .unwrap()
            .push((correlation_id.clone(), text.to_string(), origin));
        Box::pin(async { Ok(()) })
    }
}

#[tokio::test]
async fn test_fragments_forwarded_for_correlated_sessions() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let factory = ScriptedFactory::new(Behavior::Launch);
    let store = Arc::new(RecordingStore::default());
    let orchestrator = SessionOrchestrator::builder(
        OrchestratorConfig::builder().data_dir(dir.path()).build(),
    )
    .transport_factories(vec![as_dyn(&factory)])
    .fragment_store(store.clone())
    .build()
    .unwrap();
    let mut events = orchestrator.subscribe();
    let key = SessionKey::new("claude", "ws1");

    assert_ok!(
        orchestrator
            .start(
                key.clone(),
                request("hello").with_correlation_id("conv-1")
            )
            .await
    );
    let tx = factory.sender(0);
    tx.send(TransportEvent::Stdout(
        b"{\"result\":\"unstorable\"}\n{\"result\":\"saved\"}\n".to_vec(),
    ))
    .unwrap();
    tx.send(TransportEvent::Exited(TransportExit::Completed(0)))
        .unwrap();

    // Persistence failures never reach the session
    assert_eq!(
        until_complete(&mut events, &key).await,
        [
            output(&key, "unstorable"),
            output(&key, "saved"),
            complete(&key, Some(0))
        ]
    );

    for _ in 0..100 {
        if !store.fragments.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        *store.fragments.lock().unwrap(),
        [(
            CorrelationId::from("conv-1"),
            "saved".to_string(),
            FragmentOrigin::Agent
        )]
    );
}
