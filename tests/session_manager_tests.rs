// Session manager tests: Idle/Active transitions and their rejections

mod common;

use common::{ScriptedProbe, snapshot};
use std::sync::Arc;
use std::time::Duration;
use stressmon::coordination::CommandMessage;
use stressmon::error::Error;
use stressmon::polling::{PollingConfig, SessionExit};
use stressmon::reader::SnapshotReader;
use stressmon::session_manager::{SessionManager, SessionManagerConfig, SessionState, Transition};
use stressmon::sink::AggregateSink;
use stressmon::store::{MemoryStore, StateStore};

fn manager(store: &Arc<MemoryStore>, interval_ms: u64) -> SessionManager {
    SessionManager::new(
        Arc::new(ScriptedProbe::constant(snapshot(10.0, vec![]))),
        Arc::new(AggregateSink::new(store.clone())),
        SessionManagerConfig {
            polling: PollingConfig {
                sample_interval_ms: interval_ms,
                max_failed_ticks: 3,
            },
            stop_timeout: Duration::from_secs(1),
        },
    )
}

#[tokio::test]
async fn test_start_then_stop() {
    let store = Arc::new(MemoryStore::new());
    let mut m = manager(&store, 20);
    assert_eq!(m.state(), SessionState::Idle);

    let t = m.handle(&CommandMessage::start("t1")).await.unwrap();
    assert_eq!(t, Transition::Started("t1".into()));
    assert_eq!(m.state(), SessionState::Active("t1".into()));

    tokio::time::sleep(Duration::from_millis(80)).await;
    let t = m.handle(&CommandMessage::stop("t1")).await.unwrap();
    assert_eq!(
        t,
        Transition::Stopped {
            test_id: "t1".into(),
            exit: SessionExit::Cancelled
        }
    );
    assert_eq!(m.state(), SessionState::Idle);

    let report = SnapshotReader::new(store).read("t1").await.unwrap().unwrap();
    assert!(report.steps >= 1);
    assert_eq!(report.cpu_percent, 10.0);
}

#[tokio::test]
async fn test_start_while_active_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let mut m = manager(&store, 20);
    m.start("t1").await.unwrap();

    for id in ["t2", "t1"] {
        let err = m.start(id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition(_)));
        assert_eq!(m.state(), SessionState::Active("t1".into()));
    }

    tokio::time::sleep(Duration::from_millis(80)).await;
    m.stop("t1").await.unwrap();
    assert_eq!(store.get("t2:steps").await.unwrap(), None);
    assert!(store.get("t1:steps").await.unwrap().is_some());
}

#[tokio::test]
async fn test_stop_while_idle_is_rejected_and_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let mut m = manager(&store, 20);
    for _ in 0..2 {
        let err = m.handle(&CommandMessage::stop("t1")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition(_)));
        assert_eq!(m.state(), SessionState::Idle);
    }
    assert_eq!(m.shutdown().await, None);
}

#[tokio::test]
async fn test_stop_with_other_id_still_stops_active_session() {
    let store = Arc::new(MemoryStore::new());
    let mut m = manager(&store, 20);
    m.start("t1").await.unwrap();

    let (stopped, exit) = m.stop("something-else").await.unwrap();
    assert_eq!(stopped, "t1");
    assert_eq!(exit, SessionExit::Cancelled);
    assert_eq!(m.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_immediate_start_stop_reads_as_empty() {
    let store = Arc::new(MemoryStore::new());
    let mut m = manager(&store, 10_000);
    m.start("t1").await.unwrap();
    m.stop("t1").await.unwrap();

    let reader = SnapshotReader::new(store);
    assert_eq!(reader.read("t1").await.unwrap(), None);
    assert_eq!(reader.load_sums("t1").await.unwrap().steps, 0);
}

#[tokio::test]
async fn test_self_terminated_session_reads_as_idle() {
    let store = Arc::new(MemoryStore::new());
    store.fail_writes_to("t1:steps");
    let mut m = manager(&store, 10);
    m.start("t1").await.unwrap();

    assert!(common::wait_until(|| m.state() == SessionState::Idle).await);

    // stop of an already-ended session is a plain "nothing to stop", not a hang
    let stop = tokio::time::timeout(Duration::from_secs(1), m.stop("t1"))
        .await
        .unwrap();
    assert!(matches!(stop, Err(Error::InvalidStateTransition(_))));

    // and a new session may start
    m.start("t2").await.unwrap();
    assert_eq!(m.state(), SessionState::Active("t2".into()));
    assert!(m.shutdown().await.is_some());
}

#[tokio::test]
async fn test_shutdown_stops_active_session() {
    let store = Arc::new(MemoryStore::new());
    let mut m = manager(&store, 20);
    m.start("t1").await.unwrap();
    assert_eq!(m.shutdown().await, Some(SessionExit::Cancelled));
    assert_eq!(m.state(), SessionState::Idle);
}
