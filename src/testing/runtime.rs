//! Scripted runtime: a [`Runtime`] whose behaviour is set up front.
//!
//! It serves a [`ControlServer`] on its control address, so a pea drives it
//! through the same cancel/deactivate path as a production runtime.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::PeaConfig;
use crate::control::ControlAddress;
use crate::error::RuntimeError;
use crate::runtimes::{Runtime, RuntimeFactory};

use super::control::{CMD_CANCEL, CMD_DEACTIVATE, ControlServer, send_command};

/// What a scripted runtime does at each step.
#[derive(Clone, Debug, Default)]
pub struct Script {
    /// Sleep before `setup()` completes.
    pub setup_delay: Duration,
    /// Make `setup()` fail with this reason.
    pub setup_error: Option<String>,
    /// Panic inside `setup()`.
    pub setup_panic: bool,
    /// Make `run_forever()` fail with this reason right away.
    pub run_error: Option<String>,
    /// Make `teardown()` fail with this reason.
    pub teardown_error: Option<String>,
    /// Write the environment seen by `setup()` to this file, one `KEY=VALUE` per line.
    ///
    /// Only variables whose name starts with one of [`Script::env_prefixes`] are written.
    pub env_dump: Option<PathBuf>,
    /// Prefixes selecting the variables written to [`Script::env_dump`].
    pub env_prefixes: Vec<String>,
    /// Make the factory's `cancel` fail without sending anything.
    pub cancel_error: Option<String>,
    /// Make the factory's `deactivate` fail without sending anything.
    pub deactivate_error: Option<String>,
}

impl Script {
    pub fn with_setup_delay(mut self, delay: Duration) -> Self {
        self.setup_delay = delay;
        self
    }

    pub fn with_setup_error(mut self, reason: impl Into<String>) -> Self {
        self.setup_error = Some(reason.into());
        self
    }

    pub fn with_setup_panic(mut self) -> Self {
        self.setup_panic = true;
        self
    }

    pub fn with_run_error(mut self, reason: impl Into<String>) -> Self {
        self.run_error = Some(reason.into());
        self
    }

    pub fn with_teardown_error(mut self, reason: impl Into<String>) -> Self {
        self.teardown_error = Some(reason.into());
        self
    }

    pub fn with_cancel_error(mut self, reason: impl Into<String>) -> Self {
        self.cancel_error = Some(reason.into());
        self
    }

    pub fn with_deactivate_error(mut self, reason: impl Into<String>) -> Self {
        self.deactivate_error = Some(reason.into());
        self
    }

    pub fn with_env_dump(mut self, path: impl Into<PathBuf>, prefixes: &[&str]) -> Self {
        self.env_dump = Some(path.into());
        self.env_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }
}

/// A control signal the factory delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Cancel(ControlAddress),
    Deactivate(ControlAddress),
}

/// Factory for [`Script`]-driven runtimes. Records every signal it sends.
///
/// Signals are sent from the supervisor side, so the record is complete even
/// when runtimes execute in a forked process.
pub struct ScriptedFactory {
    name: String,
    script: Script,
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl ScriptedFactory {
    /// Creates a factory registered under `name`.
    pub fn new(name: impl Into<String>, script: Script) -> Self {
        Self {
            name: name.into(),
            script,
            sent: Arc::default(),
        }
    }

    /// Handle on the signal record, usable after the factory is registered.
    pub fn sent(&self) -> SentLog {
        SentLog(Arc::clone(&self.sent))
    }

    fn record(&self, s: Sent) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(s);
    }
}

/// Shared view of the signals a [`ScriptedFactory`] sent.
#[derive(Clone, Debug)]
pub struct SentLog(Arc<Mutex<Vec<Sent>>>);

impl SentLog {
    /// Snapshot of everything sent so far, in order.
    pub fn all(&self) -> Vec<Sent> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl RuntimeFactory for ScriptedFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(
        &self,
        _cfg: &PeaConfig,
        ctrl_addr: &ControlAddress,
    ) -> Result<Box<dyn Runtime>, RuntimeError> {
        Ok(Box::new(ScriptedRuntime {
            script: self.script.clone(),
            ctrl_addr: ctrl_addr.clone(),
            server: None,
        }))
    }

    async fn cancel(&self, addr: &ControlAddress, timeout: Duration) -> Result<(), RuntimeError> {
        if let Some(reason) = &self.script.cancel_error {
            return Err(refused(addr, reason));
        }
        send_command(addr, CMD_CANCEL, timeout).await?;
        self.record(Sent::Cancel(addr.clone()));
        Ok(())
    }

    async fn deactivate(
        &self,
        addr: &ControlAddress,
        timeout: Duration,
    ) -> Result<(), RuntimeError> {
        if let Some(reason) = &self.script.deactivate_error {
            return Err(refused(addr, reason));
        }
        send_command(addr, CMD_DEACTIVATE, timeout).await?;
        self.record(Sent::Deactivate(addr.clone()));
        Ok(())
    }
}

fn refused(addr: &ControlAddress, reason: &str) -> RuntimeError {
    RuntimeError::Control {
        addr: addr.to_string(),
        reason: reason.to_string(),
    }
}

/// Runtime built by [`ScriptedFactory`].
pub struct ScriptedRuntime {
    script: Script,
    ctrl_addr: ControlAddress,
    server: Option<ControlServer>,
}

impl ScriptedRuntime {
    fn dump_env(&self) -> Result<(), RuntimeError> {
        let Some(path) = &self.script.env_dump else {
            return Ok(());
        };
        let seen: BTreeMap<String, String> = std::env::vars()
            .filter(|(k, _)| self.script.env_prefixes.iter().any(|p| k.starts_with(p)))
            .collect();
        let body: String = seen.iter().map(|(k, v)| format!("{k}={v}\n")).collect();
        std::fs::write(path, body).map_err(RuntimeError::startup)
    }
}

#[async_trait]
impl Runtime for ScriptedRuntime {
    async fn setup(&mut self) -> Result<(), RuntimeError> {
        if !self.script.setup_delay.is_zero() {
            tokio::time::sleep(self.script.setup_delay).await;
        }
        if self.script.setup_panic {
            panic!("scripted setup panic");
        }
        if let Some(reason) = &self.script.setup_error {
            return Err(RuntimeError::startup(reason));
        }
        self.dump_env()?;

        let server = ControlServer::bind(&self.ctrl_addr)
            .await
            .map_err(RuntimeError::startup)?;
        self.server = Some(server);
        Ok(())
    }

    async fn run_forever(&mut self) -> Result<(), RuntimeError> {
        if let Some(reason) = &self.script.run_error {
            return Err(RuntimeError::failed(reason));
        }
        match &self.server {
            Some(server) => {
                server.cancelled().await;
                Err(RuntimeError::Terminated)
            }
            None => Err(RuntimeError::failed("control server is not bound")),
        }
    }

    async fn teardown(&mut self) -> Result<(), RuntimeError> {
        self.server = None;
        match &self.script.teardown_error {
            Some(reason) => Err(RuntimeError::failed(reason)),
            None => Ok(()),
        }
    }
}
