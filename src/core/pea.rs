//! # Pea: supervisor of one runtime.
//!
//! A [`Pea`] owns one [`ExecutionContext`] and drives a runtime through
//! setup → serve → teardown inside it, exposing `start`/`wait_start_success`/
//! `close`/`terminate`/`join` to its owner.
//!
//! ## Startup
//! ```text
//! start()
//!   ├─► ctx.start(lifecycle body)          publish Starting
//!   └─► [unless noblock_on_start] wait_start_success()
//!          wait_either(ready, shutdown; timeout_ready)
//!            ├─ ready                 → Ok                      publish Ready
//!            ├─ shutdown, not ready   → Err(StartupFailure)     publish StartFailed
//!            └─ timeout               → close(), Err(Timeout)   publish ReadyTimeout
//! ```
//!
//! ## Shutdown
//! ```text
//! close()                       (idempotent)
//!   ├─► join(100ms)             lets a pre-ready failure finish unwinding
//!   ├─ serving (ready && !shutdown):
//!   │     ├─ dealer: deactivate(addr), sleep(100ms)   (a failure is logged; cancel still goes out)
//!   │     ├─ cancel(addr)       addr = remote if remote-controlled, else local
//!   │     ├─ wait shutdown
//!   │     ├─ unless daemon: join()
//!   │     └─ cancel failed, unless daemon: join(timeout_ctrl), then terminate()
//!   ├─ otherwise: terminate()
//!   └─► log stop, publish Stopped   (reason set when the runtime may still be serving)
//! ```
//! Cancellation never interrupts the runtime from outside: it is a control-plane
//! message the runtime observes inside `run_forever()`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{Instrument, Span};

use crate::config::{DEFAULT_HOST, ExecutionModel, PeaConfig, PeaRole};
use crate::context::ExecutionContext;
use crate::control::{self, ControlAddresses};
use crate::core::env::pea_envs;
use crate::core::lifecycle::Lifecycle;
use crate::core::state::{self, PeaState, Phase, PhaseCell};
use crate::error::{PeaError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::readiness::{DualEvent, Flag};
use crate::runtimes::{RuntimeRef, RuntimeRegistry, select};

/// Grace join at the start of `close()`.
const CLOSE_GRACE: Duration = Duration::from_millis(100);
/// Pause between deactivate and cancel so in-flight router messages drain.
const DEACTIVATE_DRAIN: Duration = Duration::from_millis(100);

/// Supervisor of one runtime in one execution context.
pub struct Pea {
    name: Arc<str>,
    cfg: Arc<PeaConfig>,
    ctx: ExecutionContext,
    flags: DualEvent,
    factory: RuntimeRef,
    remote_controlled: bool,
    addrs: ControlAddresses,
    envs: BTreeMap<String, String>,
    bus: Bus,
    span: Span,
    phase: PhaseCell,
    closed: AtomicBool,
}

impl Pea {
    /// Builds a pea from `cfg`, selecting its runtime from `registry`.
    ///
    /// No I/O besides address resolution and, for isolated execution, mapping
    /// the shared signal page.
    pub fn new(cfg: PeaConfig, registry: &RuntimeRegistry) -> Result<Self, PeaError> {
        let name: Arc<str> = cfg.display_name().into();
        let span = tracing::info_span!("pea", name = %name, identity = %cfg.identity);

        let selection = select(
            &cfg.runtime,
            &cfg.target_host,
            DEFAULT_HOST,
            &cfg.uses,
            registry,
        )?;
        let addrs = control::resolve(&cfg);
        let flags = DualEvent::new(cfg.execution)?;
        let ctx = ExecutionContext::new(cfg.execution, cfg.daemon);
        let envs = pea_envs(&name, &cfg);

        span.in_scope(|| {
            if cfg.execution == ExecutionModel::Cooperative {
                tracing::debug!(
                    "cooperative execution shares the supervisor's process; avoid mixing it with isolated peas in production"
                );
            }
            tracing::debug!(
                runtime = selection.factory.name(),
                remote_controlled = selection.remote_controlled,
                local = %addrs.local,
                remote = %addrs.remote,
                "pea created"
            );
        });

        Ok(Self {
            name,
            cfg: Arc::new(cfg),
            ctx,
            flags,
            factory: selection.factory,
            remote_controlled: selection.remote_controlled,
            addrs,
            envs,
            bus: Bus::default(),
            span,
            phase: PhaseCell::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Launches the lifecycle body and, unless `noblock_on_start`, waits for readiness.
    ///
    /// A pea can be started once; its runtime is never re-instantiated.
    pub async fn start(&self) -> Result<(), PeaError> {
        async {
            if !self.phase.advance(Phase::Created, Phase::Started) {
                return Err(PeaError::AlreadyStarted {
                    pea: self.name.to_string(),
                });
            }

            let body = Lifecycle {
                cfg: Arc::clone(&self.cfg),
                factory: Arc::clone(&self.factory),
                ctrl_addr: self.ctrl_addr().clone(),
                flags: self.flags.clone(),
                envs: self.envs.clone(),
                model: self.cfg.execution,
            }
            .into_body(self.span.clone());

            if let Err(err) = self.ctx.start(body) {
                tracing::error!(error = %err, "failed to launch execution context");
                self.flags.finish(true);
                return Err(err);
            }
            self.publish(
                Event::new(EventKind::Starting).with_reason(format!("{:?}", self.cfg.execution)),
            );

            if !self.cfg.noblock_on_start {
                self.wait_start_success().await?;
            }
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Blocks until the runtime is ready or has shut down, up to the ready timeout.
    ///
    /// On timeout the pea is closed before [`PeaError::Timeout`] is returned.
    pub async fn wait_start_success(&self) -> Result<(), PeaError> {
        async {
            let timeout = self.cfg.ready_timeout();
            if !self.flags.wait_either(timeout).await {
                let timeout = timeout.unwrap_or_default();
                tracing::warn!(
                    runtime = self.factory.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "runtime timeout while waiting for readiness; increase timeout_ready if it takes time to load"
                );
                self.publish(Event::new(EventKind::ReadyTimeout).with_timeout(timeout));
                self.close().await;
                return Err(PeaError::Timeout {
                    pea: self.name.to_string(),
                    timeout,
                });
            }

            let signals = self.flags.snapshot();
            if signals.shutdown && !signals.ready {
                if self.cfg.quiet_error {
                    tracing::error!(
                        runtime = self.factory.name(),
                        "fail to start because the runtime throws some exception; disable quiet_error to see the details"
                    );
                }
                self.publish(Event::new(EventKind::StartFailed));
                return Err(PeaError::StartupFailure {
                    pea: self.name.to_string(),
                    reason: format!(
                        "runtime `{}` shut down before start succeeded",
                        self.factory.name()
                    ),
                });
            }

            self.phase.advance(Phase::Started, Phase::Confirmed);
            if !self.cfg.quiet {
                tracing::info!("ready and listening");
            }
            self.publish(Event::new(EventKind::Ready));
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Gracefully stops the pea. Idempotent; never fails.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        async {
            self.phase.set(Phase::Closing);
            self.ctx.join(Some(CLOSE_GRACE)).await;

            let signals = self.flags.snapshot();
            if signals.ready && !signals.shutdown {
                match self.signal_stop().await {
                    Ok(()) => {
                        if !self.cfg.daemon {
                            self.ctx.join(None).await;
                        }
                    }
                    // The runtime never heard the cancel; an unbounded join would hang.
                    // A daemon pea waives the join here too and is left to its context.
                    Err(err) => {
                        self.report_signal_failure(&err);
                        if !self.cfg.daemon && !self.ctx.join(Some(self.cfg.timeout_ctrl)).await {
                            self.terminate();
                        }
                    }
                }
            } else {
                self.terminate();
            }

            self.phase.set(Phase::Closed);
            let mut stopped = Event::new(EventKind::Stopped);
            if self.phase.launched() && !self.flags.is_set(Flag::Shutdown) {
                tracing::warn!(
                    runtime = self.factory.name(),
                    "pea closed but its runtime did not shut down"
                );
                stopped = stopped.with_reason("runtime did not shut down");
            } else if !self.cfg.quiet {
                tracing::info!("pea stopped");
            }
            self.publish(stopped);
        }
        .instrument(self.span.clone())
        .await
    }

    /// Deactivate (dealer only), cancel, then wait for the body to shut down.
    async fn signal_stop(&self) -> Result<(), RuntimeError> {
        let addr = self.ctrl_addr();
        let timeout = self.cfg.timeout_ctrl;

        if self.cfg.socket_in.is_dealer() {
            match self.factory.deactivate(addr, timeout).await {
                Ok(()) => {
                    self.publish(
                        Event::new(EventKind::DeactivateSent).with_addr(addr.to_string()),
                    );
                    tokio::time::sleep(DEACTIVATE_DRAIN).await;
                }
                Err(err) => self.report_signal_failure(&err),
            }
        }

        self.factory.cancel(addr, timeout).await?;
        self.publish(Event::new(EventKind::CancelSent).with_addr(addr.to_string()));

        // A body that dies without signalling must not hang close() forever.
        tokio::select! {
            _ = self.flags.wait(Flag::Shutdown, None) => {}
            _ = self.ctx.join(None) => {}
        }
        Ok(())
    }

    fn report_signal_failure(&self, err: &RuntimeError) {
        if self.cfg.quiet_error {
            tracing::error!(label = err.as_label(), "failed to signal runtime");
        } else {
            tracing::error!(
                error = %err,
                details = ?err,
                "failed to signal runtime; set quiet_error to suppress the details"
            );
        }
        self.publish(
            Event::new(EventKind::SignalFailed)
                .with_addr(self.ctrl_addr().to_string())
                .with_reason(err.to_string()),
        );
    }

    /// Forcibly stops the execution context, bypassing the graceful sequence.
    ///
    /// Has no effect on a cooperative context.
    pub fn terminate(&self) {
        if self.ctx.terminate() {
            // A killed body can not report its own shutdown.
            self.flags.finish(true);
            self.publish(Event::new(EventKind::Terminated));
        }
    }

    /// Waits for the execution context to finish; `None` waits forever.
    ///
    /// Returns `false` if the timeout elapsed first.
    pub async fn join(&self, timeout: Option<Duration>) -> bool {
        self.ctx.join(timeout).await
    }

    /// Subscribes to lifecycle events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PeaState {
        state::derive(self.phase.get(), self.phase.launched(), self.flags.snapshot())
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the pea was built from.
    pub fn config(&self) -> &PeaConfig {
        &self.cfg
    }

    /// Role of this pea in its pod.
    pub fn role(&self) -> PeaRole {
        self.cfg.pea_role
    }

    /// `true` for singleton and parallel peas, `false` for head/tail relays.
    pub fn inner(&self) -> bool {
        matches!(self.role(), PeaRole::Singleton | PeaRole::Parallel)
    }

    /// Whether the runtime is currently ready.
    pub fn is_ready(&self) -> bool {
        self.flags.is_set(Flag::Ready)
    }

    /// Whether the lifecycle body has finished.
    pub fn is_shutdown(&self) -> bool {
        self.flags.is_set(Flag::Shutdown)
    }

    /// Whether the unit runs elsewhere and this pea only relays control.
    pub fn is_remote_controlled(&self) -> bool {
        self.remote_controlled
    }

    /// Local and remote control addresses.
    pub fn control_addresses(&self) -> &ControlAddresses {
        &self.addrs
    }

    /// Name of the selected runtime implementation.
    pub fn runtime_name(&self) -> &str {
        self.factory.name()
    }

    /// Variables injected into an isolated runtime.
    pub fn envs(&self) -> &BTreeMap<String, String> {
        &self.envs
    }

    fn ctrl_addr(&self) -> &control::ControlAddress {
        self.addrs.effective(self.remote_controlled)
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_pea(Arc::clone(&self.name)));
    }
}

impl std::fmt::Debug for Pea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pea")
            .field("name", &self.name)
            .field("runtime", &self.factory.name())
            .field("execution", &self.cfg.execution)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::control::ControlAddress;
    use crate::runtimes::{LOCAL_RUNTIME, REMOTE_RUNTIME, Runtime, RuntimeFactory};

    /// Factory whose runtime fails construction; enough to exercise properties.
    struct Broken(&'static str);

    #[async_trait]
    impl RuntimeFactory for Broken {
        fn name(&self) -> &str {
            self.0
        }
        fn create(
            &self,
            _cfg: &PeaConfig,
            _ctrl_addr: &ControlAddress,
        ) -> Result<Box<dyn Runtime>, RuntimeError> {
            Err(RuntimeError::failed("cannot build"))
        }
        async fn cancel(&self, _: &ControlAddress, _: Duration) -> Result<(), RuntimeError> {
            Ok(())
        }
        async fn deactivate(&self, _: &ControlAddress, _: Duration) -> Result<(), RuntimeError> {
            Ok(())
        }
    }

    fn registry() -> RuntimeRegistry {
        let mut reg = RuntimeRegistry::new();
        reg.register(Broken(LOCAL_RUNTIME)).register(Broken(REMOTE_RUNTIME));
        reg
    }

    #[test]
    fn inner_only_for_singleton_and_parallel() {
        for (role, inner) in [
            (PeaRole::Singleton, true),
            (PeaRole::Parallel, true),
            (PeaRole::Head, false),
            (PeaRole::Tail, false),
        ] {
            let cfg = PeaConfig {
                pea_role: role,
                ..PeaConfig::default()
            };
            let pea = Pea::new(cfg, &registry()).unwrap();
            assert_eq!(pea.role(), role);
            assert_eq!(pea.inner(), inner);
        }
    }

    #[test]
    fn construction_resolves_runtime_and_addresses() {
        let cfg = PeaConfig::default().with_name("enc").with_target_host("remote.example");
        let pea = Pea::new(cfg, &registry()).unwrap();
        assert_eq!(pea.name(), "enc");
        assert_eq!(pea.runtime_name(), REMOTE_RUNTIME);
        assert!(pea.is_remote_controlled());
        assert_eq!(pea.ctrl_addr(), &pea.control_addresses().remote);
        assert_eq!(pea.state(), PeaState::Created);
    }

    #[test]
    fn unknown_runtime_fails_construction() {
        let cfg = PeaConfig::default().with_runtime("missing");
        let err = Pea::new(cfg, &registry()).unwrap_err();
        assert!(matches!(err, PeaError::Configuration { .. }));
    }

    #[tokio::test]
    async fn construction_failure_is_startup_failure() {
        let pea = Pea::new(PeaConfig::default(), &registry()).unwrap();
        let mut events = pea.subscribe();

        let err = pea.start().await.unwrap_err();
        assert!(matches!(err, PeaError::StartupFailure { .. }));
        assert!(pea.is_shutdown());
        assert!(!pea.is_ready());
        assert_eq!(pea.state(), PeaState::Failed);

        assert_eq!(events.recv().await.unwrap().kind, EventKind::Starting);
        assert_eq!(events.recv().await.unwrap().kind, EventKind::StartFailed);

        pea.close().await;
        assert_eq!(events.recv().await.unwrap().kind, EventKind::Stopped);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let cfg = PeaConfig {
            noblock_on_start: true,
            ..PeaConfig::default()
        };
        let pea = Pea::new(cfg, &registry()).unwrap();
        pea.start().await.unwrap();
        let err = pea.start().await.unwrap_err();
        assert!(matches!(err, PeaError::AlreadyStarted { .. }));
        pea.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let pea = Pea::new(PeaConfig::default(), &registry()).unwrap();
        let mut events = pea.subscribe();
        pea.close().await;
        pea.close().await;
        assert_eq!(pea.state(), PeaState::Stopped);

        assert_eq!(events.recv().await.unwrap().kind, EventKind::Stopped);
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
