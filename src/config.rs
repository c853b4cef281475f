//! # Pea configuration.
//!
//! Provides [`PeaConfig`], the read-only settings a [`Pea`](crate::Pea) is constructed from,
//! plus the small enums describing its place in the pipeline.
//!
//! ## Sentinel values
//! - `timeout_ready = 0s` → wait for readiness indefinitely (`ready_timeout()` returns `None`)
//! - `name = None` → the pea is called `"Pea"`

use std::collections::BTreeMap;
use std::time::Duration;

use rand::Rng;

use crate::runtimes::LOCAL_RUNTIME;

/// Host a pea runs on when it is not remote.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Name used when the configuration carries none.
pub const DEFAULT_PEA_NAME: &str = "Pea";

/// How the lifecycle body is executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionModel {
    /// Separate OS process (forked). Environment injection is allowed.
    ///
    /// The process is forked without exec, so the pea must be started from a
    /// current-thread tokio runtime with no other threads holding locks;
    /// [`Pea::start`](crate::Pea::start) refuses a multi-thread runtime.
    Isolated,
    /// Task on the caller's tokio runtime. Cannot be forcibly terminated.
    #[default]
    Cooperative,
}

/// Position of a pea inside its pod.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PeaRole {
    /// The only pea of its pod.
    #[default]
    Singleton,
    /// One of several replicas.
    Parallel,
    /// Relay in front of the replicas.
    Head,
    /// Relay behind the replicas.
    Tail,
}

/// Inbound socket role of a pea.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SocketType {
    #[default]
    PullBind,
    PullConnect,
    SubConnect,
    RouterBind,
    /// Actively connects to a router and must be deactivated before cancel.
    DealerConnect,
    PairBind,
    PairConnect,
}

impl SocketType {
    /// Whether this socket connects outward to a routing peer.
    #[inline]
    pub fn is_dealer(&self) -> bool {
        matches!(self, SocketType::DealerConnect)
    }
}

/// Settings for one pea.
///
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct PeaConfig {
    /// Display name; `None` means [`DEFAULT_PEA_NAME`].
    pub name: Option<String>,
    /// Unique identity, used in logs and IPC control paths.
    pub identity: String,
    /// Isolated process or cooperative task.
    pub execution: ExecutionModel,
    /// Host the control socket binds to.
    pub host: String,
    /// Control port.
    pub port_ctrl: u16,
    /// Use a local IPC socket for control instead of `host:port_ctrl`.
    pub ctrl_with_ipc: bool,
    /// Maximum wait for readiness (`0s` = wait forever).
    pub timeout_ready: Duration,
    /// Timeout for a single control round-trip.
    pub timeout_ctrl: Duration,
    /// Skip the final join in `close()`.
    pub daemon: bool,
    /// `start()` returns without waiting for readiness.
    pub noblock_on_start: bool,
    /// Ask the runtime to keep its own logs quiet.
    pub quiet: bool,
    /// Drop error details from failure logs.
    pub quiet_error: bool,
    /// Environment overrides applied inside an isolated runtime.
    pub env: BTreeMap<String, String>,
    /// Inbound socket role.
    pub socket_in: SocketType,
    /// Role inside the pod.
    pub pea_role: PeaRole,
    /// Requested runtime implementation name.
    pub runtime: String,
    /// Resource descriptor handed to the runtime (may start with `docker://`).
    pub uses: String,
    /// Host the unit actually runs on.
    pub target_host: String,
}

impl PeaConfig {
    /// Returns the display name of the pea.
    #[inline]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_PEA_NAME)
    }

    /// Returns the ready timeout as an `Option`.
    ///
    /// - `None` → wait indefinitely
    /// - `Some(d)` → give up after `d`
    #[inline]
    pub fn ready_timeout(&self) -> Option<Duration> {
        if self.timeout_ready == Duration::ZERO {
            None
        } else {
            Some(self.timeout_ready)
        }
    }

    /// Whether the unit runs on another host and is only relayed to.
    #[inline]
    pub fn targets_remote_host(&self) -> bool {
        self.target_host != DEFAULT_HOST
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the execution model.
    pub fn with_execution(mut self, execution: ExecutionModel) -> Self {
        self.execution = execution;
        self
    }

    /// Sets the requested runtime implementation.
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// Sets the resource descriptor.
    pub fn with_uses(mut self, uses: impl Into<String>) -> Self {
        self.uses = uses.into();
        self
    }

    /// Sets the ready timeout (`Duration::ZERO` = wait forever).
    pub fn with_timeout_ready(mut self, timeout: Duration) -> Self {
        self.timeout_ready = timeout;
        self
    }

    /// Adds one environment override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the host the unit runs on.
    pub fn with_target_host(mut self, host: impl Into<String>) -> Self {
        self.target_host = host.into();
        self
    }
}

impl Default for PeaConfig {
    /// Default configuration:
    ///
    /// - cooperative execution on `0.0.0.0`, random control port in the dynamic range
    /// - `timeout_ready = 600s`, `timeout_ctrl = 5s`
    /// - singleton role, `PullBind` inbound socket, `local` runtime
    fn default() -> Self {
        Self {
            name: None,
            identity: uuid::Uuid::new_v4().to_string(),
            execution: ExecutionModel::default(),
            host: DEFAULT_HOST.to_string(),
            port_ctrl: rand::thread_rng().gen_range(49152..=65535),
            ctrl_with_ipc: false,
            timeout_ready: Duration::from_secs(600),
            timeout_ctrl: Duration::from_secs(5),
            daemon: false,
            noblock_on_start: false,
            quiet: false,
            quiet_error: false,
            env: BTreeMap::new(),
            socket_in: SocketType::default(),
            pea_role: PeaRole::default(),
            runtime: LOCAL_RUNTIME.to_string(),
            uses: String::new(),
            target_host: DEFAULT_HOST.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ready_timeout_means_forever() {
        let cfg = PeaConfig::default().with_timeout_ready(Duration::ZERO);
        assert_eq!(cfg.ready_timeout(), None);

        let cfg = cfg.with_timeout_ready(Duration::from_millis(500));
        assert_eq!(cfg.ready_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn defaults_are_local() {
        let cfg = PeaConfig::default();
        assert_eq!(cfg.display_name(), DEFAULT_PEA_NAME);
        assert_eq!(cfg.runtime, LOCAL_RUNTIME);
        assert!(!cfg.targets_remote_host());
        assert!(cfg.port_ctrl >= 49152);
    }

    #[test]
    fn identities_are_unique() {
        assert_ne!(PeaConfig::default().identity, PeaConfig::default().identity);
    }

    #[test]
    fn only_dealer_connect_is_dealer() {
        assert!(SocketType::DealerConnect.is_dealer());
        assert!(!SocketType::RouterBind.is_dealer());
        assert!(!SocketType::PullBind.is_dealer());
    }
}
