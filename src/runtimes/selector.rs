//! # Runtime selection.
//!
//! Decides which registered implementation a pea instantiates and whether the
//! pea only relays control signals to a unit running elsewhere.
//!
//! ## Decision order
//! ```text
//! target_host != default_host                      → REMOTE_RUNTIME,   remote_controlled
//! requested == LOCAL_RUNTIME && uses = docker://…  → CONTAINER_RUNTIME
//! otherwise                                        → requested
//! ```
//! An unregistered final name fails with [`PeaError::Configuration`].

use crate::error::PeaError;

use super::registry::RuntimeRegistry;
use super::runtime::RuntimeRef;

/// Default in-process implementation.
pub const LOCAL_RUNTIME: &str = "local";
/// Implementation that runs the unit inside a container.
pub const CONTAINER_RUNTIME: &str = "container";
/// Implementation that relays control to a unit on another host.
pub const REMOTE_RUNTIME: &str = "remote";
/// Resource descriptor prefix that selects [`CONTAINER_RUNTIME`].
pub const CONTAINER_SCHEME: &str = "docker://";

/// Outcome of [`select`].
#[derive(Clone)]
pub struct Selection {
    /// Factory of the chosen implementation.
    pub factory: RuntimeRef,
    /// The unit runs elsewhere; this pea only relays control signals.
    pub remote_controlled: bool,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("runtime", &self.factory.name())
            .field("remote_controlled", &self.remote_controlled)
            .finish()
    }
}

/// Returns the implementation name the decision order arrives at.
pub fn resolve_name<'a>(
    requested: &'a str,
    target_host: &str,
    default_host: &str,
    uses: &str,
) -> (&'a str, bool) {
    if target_host != default_host {
        (REMOTE_RUNTIME, true)
    } else if requested == LOCAL_RUNTIME && uses.starts_with(CONTAINER_SCHEME) {
        (CONTAINER_RUNTIME, false)
    } else {
        (requested, false)
    }
}

/// Picks the factory for a pea.
pub fn select(
    requested: &str,
    target_host: &str,
    default_host: &str,
    uses: &str,
    registry: &RuntimeRegistry,
) -> Result<Selection, PeaError> {
    let (name, remote_controlled) = resolve_name(requested, target_host, default_host, uses);
    let factory = registry.get(name)?;
    Ok(Selection {
        factory,
        remote_controlled,
    })
}
