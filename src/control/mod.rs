//! # Control-plane addresses.
//!
//! A running runtime accepts administrative signals (cancel, deactivate) on a
//! control address. [`resolve`] computes both candidate addresses from a
//! [`PeaConfig`] before the runtime exists.
//!
//! ## Rules
//! - **Pure**: no I/O, same config → same addresses.
//! - `local` is `tcp://host:port` or, with `ctrl_with_ipc`, an IPC socket path.
//! - `remote` is always an IPC socket path; it is the relay endpoint used when
//!   the unit runs outside this process's network namespace.

use std::fmt;
use std::path::PathBuf;

use crate::config::PeaConfig;

/// One control-plane endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ControlAddress {
    /// TCP endpoint.
    Tcp {
        /// Host name or IP.
        host: String,
        /// Control port.
        port: u16,
    },
    /// Unix domain socket.
    Ipc {
        /// Socket path.
        path: PathBuf,
    },
}

impl ControlAddress {
    /// Whether this is a local IPC socket.
    #[inline]
    pub fn is_ipc(&self) -> bool {
        matches!(self, ControlAddress::Ipc { .. })
    }
}

impl fmt::Display for ControlAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAddress::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            ControlAddress::Ipc { path } => write!(f, "ipc://{}", path.display()),
        }
    }
}

/// Local and remote control addresses of one pea.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlAddresses {
    /// Address of a runtime executing in this process's namespace.
    pub local: ControlAddress,
    /// Relay address for a remote-controlled runtime.
    pub remote: ControlAddress,
}

impl ControlAddresses {
    /// Returns the address the runtime listens on and `close()` signals.
    #[inline]
    pub fn effective(&self, remote_controlled: bool) -> &ControlAddress {
        if remote_controlled {
            &self.remote
        } else {
            &self.local
        }
    }
}

/// Computes the control addresses of a pea.
pub fn resolve(cfg: &PeaConfig) -> ControlAddresses {
    let local = if cfg.ctrl_with_ipc {
        ipc_address(&cfg.identity, &cfg.port_ctrl.to_string())
    } else {
        ControlAddress::Tcp {
            host: strip_user(&cfg.host).to_string(),
            port: cfg.port_ctrl,
        }
    };

    ControlAddresses {
        local,
        remote: ipc_address(&cfg.identity, "remote"),
    }
}

/// `user@host` → `host`.
fn strip_user(host: &str) -> &str {
    host.rsplit('@').next().unwrap_or(host)
}

fn ipc_address(identity: &str, suffix: &str) -> ControlAddress {
    ControlAddress::Ipc {
        path: std::env::temp_dir().join(format!("pea-{identity}-{suffix}.ctrl")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PeaConfig {
        PeaConfig {
            identity: "abc".into(),
            port_ctrl: 50123,
            ..PeaConfig::default()
        }
    }

    #[test]
    fn tcp_when_ipc_not_preferred() {
        let addrs = resolve(&cfg());
        assert_eq!(
            addrs.local,
            ControlAddress::Tcp {
                host: "0.0.0.0".into(),
                port: 50123
            }
        );
        assert_eq!(addrs.local.to_string(), "tcp://0.0.0.0:50123");
    }

    #[test]
    fn ipc_when_preferred() {
        let cfg = PeaConfig {
            ctrl_with_ipc: true,
            ..cfg()
        };
        let addrs = resolve(&cfg);
        assert!(addrs.local.is_ipc());
        assert!(addrs.local.to_string().ends_with("pea-abc-50123.ctrl"));
    }

    #[test]
    fn remote_is_ipc_and_distinct() {
        let addrs = resolve(&cfg());
        assert!(addrs.remote.is_ipc());
        assert_ne!(addrs.local, addrs.remote);
        assert_eq!(addrs.effective(true), &addrs.remote);
        assert_eq!(addrs.effective(false), &addrs.local);
    }

    #[test]
    fn deterministic() {
        let cfg = PeaConfig {
            ctrl_with_ipc: true,
            ..cfg()
        };
        assert_eq!(resolve(&cfg), resolve(&cfg));
    }

    #[test]
    fn user_prefix_is_stripped() {
        let cfg = PeaConfig {
            host: "ops@10.0.0.7".into(),
            ..cfg()
        };
        assert_eq!(resolve(&cfg).local.to_string(), "tcp://10.0.0.7:50123");
    }
}
