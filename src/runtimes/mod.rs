//! Runtime abstractions, registry and selection.
//!
//! This module provides:
//! - [`Runtime`] / [`RuntimeFactory`] - the collaborator contract a pea drives
//! - [`RuntimeRegistry`] - name → factory table
//! - [`select`] - picks the implementation and decides remote control

mod registry;
mod runtime;
mod selector;

pub use registry::RuntimeRegistry;
pub use runtime::{Runtime, RuntimeFactory, RuntimeRef};
pub use selector::{
    CONTAINER_RUNTIME, CONTAINER_SCHEME, LOCAL_RUNTIME, REMOTE_RUNTIME, Selection, resolve_name,
    select,
};
