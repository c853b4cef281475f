//! # Lifecycle body: drive one runtime from construction to teardown.
//!
//! Runs inside the execution context. It is the error boundary of a pea: every
//! failure, including a panic, becomes a log entry plus the shutdown signal.
//!
//! ## Flow
//! ```text
//! create runtime ──Err──────────────────────────────────────────┐
//!      │ Ok                                                     │
//! inject env (isolated) / warn (cooperative)                    │
//!      │                                                        │
//! setup() ──Err─────────────────────────────┐                   │
//!      │ Ok                                 │                   │
//! set(Ready)                                │                   │
//!      │                                    │                   │
//! run_forever() ─┬─ Ok / Terminated  → info │                   │
//!  (or interrupt)├─ Interrupted      → info │                   │
//!                └─ other            → error│                   │
//!      │                                    ▼                   │
//! teardown() ◄──────────────────────────────┘                   │
//!      │                                                        │
//!      ▼                                                        ▼
//! Finalizer::drop: finish(faulted) ─► revert env   (every exit path, panics included)
//! ```

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{Instrument, Span};

use crate::config::{ExecutionModel, PeaConfig};
use crate::context::Body;
use crate::control::ControlAddress;
use crate::core::env::EnvGuard;
use crate::core::shutdown::wait_for_interrupt;
use crate::error::RuntimeError;
use crate::readiness::{DualEvent, Flag};
use crate::runtimes::{Runtime, RuntimeRef};

/// Everything the body needs; moved into the execution context.
pub(crate) struct Lifecycle {
    pub cfg: Arc<PeaConfig>,
    pub factory: RuntimeRef,
    pub ctrl_addr: ControlAddress,
    pub flags: DualEvent,
    pub envs: BTreeMap<String, String>,
    pub model: ExecutionModel,
}

/// Guaranteed final transition: shutdown set and ready cleared, then env reverted.
struct Finalizer {
    flags: DualEvent,
    env: EnvGuard,
    faulted: bool,
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        self.flags.finish(self.faulted);
        self.env.revert();
    }
}

impl Lifecycle {
    /// Wraps the lifecycle into a context body instrumented with the pea's span.
    pub fn into_body(self, span: Span) -> Body {
        Box::pin(self.run().instrument(span))
    }

    async fn run(self) {
        let mut fin = Finalizer {
            flags: self.flags.clone(),
            env: EnvGuard::new(),
            faulted: true,
        };

        let driven = AssertUnwindSafe(self.drive(&mut fin)).catch_unwind().await;
        if let Err(panic) = driven {
            tracing::error!(panic = %panic_message(&*panic), "lifecycle body panicked");
            fin.faulted = true;
        }
    }

    async fn drive(&self, fin: &mut Finalizer) {
        let mut runtime = match self.factory.create(&self.cfg, &self.ctrl_addr) {
            Ok(runtime) => runtime,
            Err(err) => {
                let err = match err {
                    err @ RuntimeError::StartupFailure { .. } => err,
                    other => RuntimeError::startup(other),
                };
                self.report(&err, "create");
                return;
            }
        };

        self.inject_env(&mut fin.env);
        if !self.cfg.quiet {
            tracing::info!(runtime = self.factory.name(), ctrl = %self.ctrl_addr, "starting runtime");
        }

        match runtime.setup().await {
            Ok(()) => {
                self.flags.set(Flag::Ready);
                fin.faulted = !self.serve(runtime.as_mut()).await;
            }
            Err(err) => self.report(&err, "setup"),
        }

        if let Err(err) = runtime.teardown().await {
            self.report(&err, "teardown");
        }
    }

    /// Runs `run_forever()`; returns `true` when it ended the expected way.
    async fn serve(&self, runtime: &mut dyn Runtime) -> bool {
        let armed = self.model == ExecutionModel::Isolated;
        let res = tokio::select! {
            res = runtime.run_forever() => res,
            () = wait_for_interrupt(armed) => Err(RuntimeError::Interrupted),
        };

        match res {
            Ok(()) | Err(RuntimeError::Terminated) => {
                tracing::info!(runtime = self.factory.name(), "runtime is end");
                true
            }
            Err(RuntimeError::Interrupted) => {
                tracing::info!(runtime = self.factory.name(), "runtime is interrupted by user");
                true
            }
            Err(err) => {
                self.report(&err, "run_forever");
                false
            }
        }
    }

    fn inject_env(&self, env: &mut EnvGuard) {
        match self.model {
            ExecutionModel::Isolated => env.apply(&self.envs),
            ExecutionModel::Cooperative => {
                if !self.cfg.env.is_empty() {
                    tracing::warn!(
                        keys = ?self.cfg.env.keys().collect::<Vec<_>>(),
                        "environment variables are not set for a cooperative pea; they would leak into the whole process"
                    );
                }
            }
        }
    }

    fn report(&self, err: &RuntimeError, during: &'static str) {
        if self.cfg.quiet_error {
            tracing::error!(during, label = err.as_label(), "runtime failure");
        } else {
            tracing::error!(
                during,
                error = %err,
                details = ?err,
                "runtime failure; set quiet_error to suppress the details"
            );
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::core::env::pea_envs;
    use crate::runtimes::RuntimeFactory;

    const KEY: &str = "PEAPOD_LIFECYCLE_TEST_MODEL";

    type Seen = Arc<Mutex<Vec<(&'static str, Option<String>)>>>;

    /// Records `KEY` at setup and teardown; setup fails so nothing serves.
    struct Recorder(Seen);

    struct Recording(Seen);

    impl Recording {
        fn note(&self, step: &'static str) {
            self.0.lock().unwrap().push((step, std::env::var(KEY).ok()));
        }
    }

    #[async_trait]
    impl Runtime for Recording {
        async fn setup(&mut self) -> Result<(), RuntimeError> {
            self.note("setup");
            Err(RuntimeError::startup("stop here"))
        }
        async fn run_forever(&mut self) -> Result<(), RuntimeError> {
            unreachable!("setup always fails")
        }
        async fn teardown(&mut self) -> Result<(), RuntimeError> {
            self.note("teardown");
            Ok(())
        }
    }

    #[async_trait]
    impl RuntimeFactory for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }
        fn create(
            &self,
            _cfg: &PeaConfig,
            _ctrl_addr: &ControlAddress,
        ) -> Result<Box<dyn Runtime>, RuntimeError> {
            Ok(Box::new(Recording(Arc::clone(&self.0))))
        }
        async fn cancel(
            &self,
            _: &ControlAddress,
            _: std::time::Duration,
        ) -> Result<(), RuntimeError> {
            Ok(())
        }
        async fn deactivate(
            &self,
            _: &ControlAddress,
            _: std::time::Duration,
        ) -> Result<(), RuntimeError> {
            Ok(())
        }
    }

    fn lifecycle(model: ExecutionModel, seen: &Seen) -> Lifecycle {
        let cfg = PeaConfig::default()
            .with_name("recorder")
            .with_execution(model)
            .with_env(KEY, "v2");
        Lifecycle {
            envs: pea_envs(cfg.display_name(), &cfg),
            cfg: Arc::new(cfg),
            factory: Arc::new(Recorder(Arc::clone(seen))),
            ctrl_addr: ControlAddress::Ipc {
                path: std::env::temp_dir().join("pea-lifecycle-test.ctrl"),
            },
            flags: DualEvent::in_memory(),
            model,
        }
    }

    #[tokio::test]
    async fn isolated_env_is_present_until_teardown_then_reverted() {
        let seen = Seen::default();
        let lc = lifecycle(ExecutionModel::Isolated, &seen);
        let flags = lc.flags.clone();

        lc.into_body(Span::none()).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("setup", Some("v2".to_string())),
                ("teardown", Some("v2".to_string())),
            ]
        );
        assert!(std::env::var(KEY).is_err());
        let s = flags.snapshot();
        assert!(s.shutdown && s.faulted && !s.served);
    }

    #[tokio::test]
    async fn cooperative_env_is_never_applied() {
        let seen = Seen::default();
        lifecycle(ExecutionModel::Cooperative, &seen)
            .into_body(Span::none())
            .await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("setup", None), ("teardown", None)]
        );
    }

    #[test]
    fn panic_messages() {
        let msg: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*msg), "static");
        let msg: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*msg), "owned");
        let msg: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*msg), "unknown panic");
    }
}
