#![allow(dead_code)]

use std::time::Duration;

use peapod::testing::{Script, ScriptedFactory, SentLog};
use peapod::{EventKind, ExecutionModel, PeaConfig, RuntimeRegistry};
use tokio::sync::broadcast;

pub const LONG: Duration = Duration::from_secs(10);

/// Registry holding one scripted factory under `name`.
pub fn registry(name: &str, script: Script) -> (RuntimeRegistry, SentLog) {
    let factory = ScriptedFactory::new(name, script);
    let sent = factory.sent();
    let mut reg = RuntimeRegistry::new();
    reg.register(factory);
    (reg, sent)
}

/// Config controlled over an IPC socket, so parallel tests never race for ports.
pub fn config(name: &str, execution: ExecutionModel) -> PeaConfig {
    PeaConfig {
        ctrl_with_ipc: true,
        timeout_ready: LONG,
        ..PeaConfig::default()
            .with_name(name)
            .with_execution(execution)
    }
}

/// Everything published so far, oldest first.
pub fn drain(rx: &mut broadcast::Receiver<peapod::Event>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        kinds.push(ev.kind);
    }
    kinds
}

/// Reads a `KEY=VALUE` dump written by a scripted runtime.
pub fn read_env_dump(path: &std::path::Path) -> Vec<(String, String)> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
