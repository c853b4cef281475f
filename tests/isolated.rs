//! Peas whose runtime runs in a forked process.

mod common;

use std::time::Duration;

use common::{LONG, config, drain, read_env_dump, registry};
use peapod::testing::{Script, Sent};
use peapod::{
    ENV_LOG_ID, ENV_PEA_NAME, EventKind, ExecutionModel, LOCAL_RUNTIME, Pea, PeaConfig, PeaError,
    PeaState,
};

const ISO: ExecutionModel = ExecutionModel::Isolated;

#[tokio::test]
async fn ready_then_graceful_close() {
    let (reg, sent) = registry(LOCAL_RUNTIME, Script::default());
    let cfg = config("executor", ISO)
        .with_uses("executor://foo")
        .with_timeout_ready(Duration::from_millis(500));
    let pea = Pea::new(cfg, &reg).unwrap();
    assert!(pea.control_addresses().local.is_ipc());
    let mut events = pea.subscribe();

    pea.start().await.unwrap();
    assert!(pea.is_ready());
    assert_eq!(pea.state(), PeaState::Running);

    pea.close().await;
    assert!(pea.is_shutdown());
    assert!(!pea.is_ready());
    assert_eq!(pea.state(), PeaState::Stopped);
    assert!(pea.join(Some(Duration::from_millis(10))).await);

    assert_eq!(
        sent.all(),
        vec![Sent::Cancel(pea.control_addresses().local.clone())]
    );
    assert_eq!(
        drain(&mut events),
        vec![
            EventKind::Starting,
            EventKind::Ready,
            EventKind::CancelSent,
            EventKind::Stopped
        ]
    );
}

#[tokio::test]
async fn slow_setup_times_out_and_is_killed() {
    let script = Script::default().with_setup_delay(Duration::from_millis(1000));
    let (reg, sent) = registry(LOCAL_RUNTIME, script);
    let cfg = config("slow", ISO).with_timeout_ready(Duration::from_millis(10));
    let pea = Pea::new(cfg, &reg).unwrap();
    let mut events = pea.subscribe();

    let err = pea.start().await.unwrap_err();
    assert!(matches!(err, PeaError::Timeout { .. }), "{err}");

    assert!(pea.join(Some(Duration::from_millis(10))).await);
    assert!(pea.is_shutdown());
    assert_eq!(pea.state(), PeaState::Failed);
    assert!(sent.all().is_empty());
    assert_eq!(
        drain(&mut events),
        vec![
            EventKind::Starting,
            EventKind::ReadyTimeout,
            EventKind::Terminated,
            EventKind::Stopped
        ]
    );
}

#[tokio::test]
async fn setup_failure_in_child_is_startup_failure() {
    let (reg, _) = registry(LOCAL_RUNTIME, Script::default().with_setup_error("bad weights"));
    let pea = Pea::new(config("encoder", ISO), &reg).unwrap();

    let err = pea.start().await.unwrap_err();
    assert!(matches!(err, PeaError::StartupFailure { .. }), "{err}");
    assert!(pea.join(Some(LONG)).await);
    assert_eq!(pea.state(), PeaState::Failed);
    pea.close().await;
}

#[tokio::test]
async fn environment_is_injected_into_child_only() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("env.txt");
    let script = Script::default().with_env_dump(&dump, &["PEA_"]);
    let (reg, _) = registry(LOCAL_RUNTIME, script);
    let cfg = config("encoder", ISO).with_env("PEA_ISO_MODEL", "v2");
    let identity = cfg.identity.clone();
    let pea = Pea::new(cfg, &reg).unwrap();

    pea.start().await.unwrap();
    let seen = read_env_dump(&dump);
    assert!(seen.contains(&(ENV_PEA_NAME.to_string(), "encoder".to_string())));
    assert!(seen.contains(&(ENV_LOG_ID.to_string(), identity)));
    assert!(seen.contains(&("PEA_ISO_MODEL".to_string(), "v2".to_string())));
    assert!(std::env::var("PEA_ISO_MODEL").is_err());

    pea.close().await;
}

#[tokio::test]
async fn terminate_kills_a_serving_child() {
    let (reg, sent) = registry(LOCAL_RUNTIME, Script::default());
    let pea = Pea::new(config("encoder", ISO), &reg).unwrap();
    let mut events = pea.subscribe();

    pea.start().await.unwrap();
    pea.terminate();
    assert!(pea.join(Some(Duration::from_millis(10))).await);
    assert!(pea.is_shutdown());
    assert_eq!(pea.state(), PeaState::Failed);

    // Nothing is serving any more, so close does not signal.
    pea.close().await;
    assert!(sent.all().is_empty());
    let kinds = drain(&mut events);
    assert!(kinds.contains(&EventKind::Terminated));
    assert_eq!(kinds.last(), Some(&EventKind::Stopped));
}

#[tokio::test]
async fn daemon_close_does_not_join() {
    let (reg, sent) = registry(LOCAL_RUNTIME, Script::default());
    let cfg = PeaConfig {
        daemon: true,
        ..config("encoder", ISO)
    };
    let pea = Pea::new(cfg, &reg).unwrap();

    pea.start().await.unwrap();
    pea.close().await;
    assert!(pea.is_shutdown());
    assert_eq!(sent.all().len(), 1);
    assert!(pea.join(Some(LONG)).await);
}
