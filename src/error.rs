//! Error types used by the pea supervisor and runtime implementations.
//!
//! This module defines two main error enums:
//!
//! - [`PeaError`]: errors surfaced to the caller of a [`Pea`](crate::Pea).
//! - [`RuntimeError`]: errors raised by a [`Runtime`](crate::Runtime) or its factory.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! A [`RuntimeError`] never crosses the execution boundary: the lifecycle body turns
//! every one of them into a log entry plus the shutdown signal.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the pea supervisor.
///
/// These are observed synchronously by the caller of `Pea::new`, `Pea::start`
/// or `Pea::wait_start_success`. `Pea::close` never fails.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PeaError {
    /// The requested (or derived) runtime implementation is not registered.
    #[error("unknown runtime implementation `{runtime}`")]
    Configuration {
        /// Name that failed to resolve.
        runtime: String,
    },

    /// The runtime could not be constructed or `setup()` failed.
    #[error("pea `{pea}` failed to start: {reason}")]
    StartupFailure {
        /// Name of the pea.
        pea: String,
        /// Short description of the failure.
        reason: String,
    },

    /// Neither readiness nor shutdown was signalled within the ready timeout.
    #[error("pea `{pea}` can not be initialized after {timeout:?}")]
    Timeout {
        /// Name of the pea.
        pea: String,
        /// The ready timeout that was exceeded.
        timeout: Duration,
    },

    /// `start()` was called on a pea that already owns a runtime.
    #[error("pea `{pea}` was already started")]
    AlreadyStarted {
        /// Name of the pea.
        pea: String,
    },

    /// The execution context or its signaling primitive could not be created.
    #[error("execution context failure: {reason}")]
    Context {
        /// Underlying OS error message.
        reason: String,
    },
}

impl PeaError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use peapod::PeaError;
    /// use std::time::Duration;
    ///
    /// let err = PeaError::Timeout { pea: "encoder".into(), timeout: Duration::from_millis(10) };
    /// assert_eq!(err.as_label(), "pea_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PeaError::Configuration { .. } => "pea_configuration",
            PeaError::StartupFailure { .. } => "pea_startup_failure",
            PeaError::Timeout { .. } => "pea_timeout",
            PeaError::AlreadyStarted { .. } => "pea_already_started",
            PeaError::Context { .. } => "pea_context",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            PeaError::Configuration { runtime } => format!("runtime not registered: {runtime}"),
            PeaError::StartupFailure { pea, reason } => format!("start failed: pea={pea} {reason}"),
            PeaError::Timeout { pea, timeout } => format!("ready timeout: pea={pea} {timeout:?}"),
            PeaError::AlreadyStarted { pea } => format!("already started: pea={pea}"),
            PeaError::Context { reason } => format!("context: {reason}"),
        }
    }
}

/// # Errors produced by runtime implementations.
///
/// `run_forever()` is expected to end with [`RuntimeError::Terminated`] once it
/// observes a cancel signal on its control address; that outcome is a clean exit.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Construction or `setup()` failed, or a start failure surfaced while serving.
    #[error("runtime failed to start: {reason}")]
    StartupFailure {
        /// The underlying error message.
        reason: String,
    },

    /// The runtime observed a cancel signal and stopped serving.
    #[error("runtime terminated")]
    Terminated,

    /// Serving was interrupted by an OS signal (SIGINT/SIGTERM/SIGQUIT).
    #[error("runtime interrupted by user")]
    Interrupted,

    /// Any other failure while serving or tearing down.
    #[error("runtime failed: {reason}")]
    Failed {
        /// The underlying error message.
        reason: String,
    },

    /// A control-plane signal could not be delivered.
    #[error("control signal to {addr} failed: {reason}")]
    Control {
        /// Address the signal was sent to.
        addr: String,
        /// The underlying error message.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use peapod::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::Terminated.as_label(), "runtime_terminated");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::StartupFailure { .. } => "runtime_startup_failure",
            RuntimeError::Terminated => "runtime_terminated",
            RuntimeError::Interrupted => "runtime_interrupted",
            RuntimeError::Failed { .. } => "runtime_failed",
            RuntimeError::Control { .. } => "runtime_control",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::StartupFailure { reason } => format!("startup failure: {reason}"),
            RuntimeError::Terminated => "terminated".to_string(),
            RuntimeError::Interrupted => "interrupted by user".to_string(),
            RuntimeError::Failed { reason } => format!("error: {reason}"),
            RuntimeError::Control { addr, reason } => format!("control: addr={addr} {reason}"),
        }
    }

    /// Indicates whether the runtime stopped the expected way.
    ///
    /// Returns `true` for [`RuntimeError::Terminated`] and [`RuntimeError::Interrupted`],
    /// `false` otherwise.
    ///
    /// # Example
    /// ```
    /// use peapod::RuntimeError;
    ///
    /// assert!(RuntimeError::Terminated.is_clean_exit());
    /// assert!(!RuntimeError::Failed { reason: "boom".into() }.is_clean_exit());
    /// ```
    pub fn is_clean_exit(&self) -> bool {
        matches!(self, RuntimeError::Terminated | RuntimeError::Interrupted)
    }

    /// Wraps any displayable error as a [`RuntimeError::StartupFailure`].
    pub fn startup(err: impl std::fmt::Display) -> Self {
        RuntimeError::StartupFailure {
            reason: err.to_string(),
        }
    }

    /// Wraps any displayable error as a [`RuntimeError::Failed`].
    pub fn failed(err: impl std::fmt::Display) -> Self {
        RuntimeError::Failed {
            reason: err.to_string(),
        }
    }
}
