//! # Environment injection for isolated runtimes.
//!
//! Environment variables are process-wide state. Inside a forked child they only
//! affect that child, so a pea injects its variables there before `setup()` and
//! restores the previous values after `teardown()`.
//!
//! In a cooperative context the same variables would leak into the supervisor and
//! every sibling pea sharing the process, so injection is refused there.

use std::collections::BTreeMap;
use std::ffi::OsString;

use crate::config::PeaConfig;

/// Name of the pea.
pub const ENV_PEA_NAME: &str = "PEA_NAME";
/// Identity used as log id.
pub const ENV_LOG_ID: &str = "PEA_LOG_ID";
/// Set to `QUIET` when the pea is configured quiet.
pub const ENV_LOG_CONFIG: &str = "PEA_LOG_CONFIG";

/// Builds the variables a pea injects: its own name and identity, then the user's overrides.
pub fn pea_envs(name: &str, cfg: &PeaConfig) -> BTreeMap<String, String> {
    let mut envs = BTreeMap::new();
    envs.insert(ENV_PEA_NAME.to_string(), name.to_string());
    envs.insert(ENV_LOG_ID.to_string(), cfg.identity.clone());
    if cfg.quiet {
        envs.insert(ENV_LOG_CONFIG.to_string(), "QUIET".to_string());
    }
    envs.extend(cfg.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    envs
}

/// Remembers what it changed so it can put the environment back.
#[derive(Debug, Default)]
pub struct EnvGuard {
    saved: Vec<(String, Option<OsString>)>,
}

impl EnvGuard {
    /// Creates a guard that has changed nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets every variable in `vars`, remembering previous values.
    ///
    /// Must only be used where no other thread reads or writes the environment,
    /// i.e. inside an isolated context.
    pub fn apply(&mut self, vars: &BTreeMap<String, String>) {
        for (key, value) in vars {
            self.saved.push((key.clone(), std::env::var_os(key)));
            // SAFETY: called only inside a forked child, where the lifecycle body is
            // the sole user of the environment.
            unsafe { std::env::set_var(key, value) };
        }
    }

    /// Restores the previous values (or removes keys that did not exist). Idempotent.
    pub fn revert(&mut self) {
        while let Some((key, previous)) = self.saved.pop() {
            // SAFETY: same single-user condition as in `apply`.
            unsafe {
                match previous {
                    Some(value) => std::env::set_var(&key, value),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }

    /// Whether anything is currently applied.
    pub fn is_applied(&self) -> bool {
        !self.saved.is_empty()
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        self.revert();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envs_carry_identity_quiet_and_overrides() {
        let cfg = PeaConfig {
            identity: "id-1".into(),
            quiet: true,
            ..PeaConfig::default()
        }
        .with_env("MODEL", "small")
        .with_env(ENV_PEA_NAME, "override");

        let envs = pea_envs("encoder", &cfg);
        assert_eq!(envs[ENV_LOG_ID], "id-1");
        assert_eq!(envs[ENV_LOG_CONFIG], "QUIET");
        assert_eq!(envs["MODEL"], "small");
        assert_eq!(envs[ENV_PEA_NAME], "override");
    }

    #[test]
    fn not_quiet_has_no_log_config() {
        let envs = pea_envs("encoder", &PeaConfig::default());
        assert!(!envs.contains_key(ENV_LOG_CONFIG));
        assert_eq!(envs[ENV_PEA_NAME], "encoder");
    }

    // Single test touching the process environment, with keys unique to it.
    #[test]
    fn apply_then_revert_restores_previous_values() {
        let existing = "PEAPOD_ENV_GUARD_TEST_EXISTING";
        let fresh = "PEAPOD_ENV_GUARD_TEST_FRESH";
        unsafe { std::env::set_var(existing, "before") };

        let mut vars = BTreeMap::new();
        vars.insert(existing.to_string(), "during".to_string());
        vars.insert(fresh.to_string(), "during".to_string());

        let mut guard = EnvGuard::new();
        guard.apply(&vars);
        assert!(guard.is_applied());
        assert_eq!(std::env::var(existing).unwrap(), "during");
        assert_eq!(std::env::var(fresh).unwrap(), "during");

        guard.revert();
        guard.revert();
        assert!(!guard.is_applied());
        assert_eq!(std::env::var(existing).unwrap(), "before");
        assert!(std::env::var_os(fresh).is_none());

        unsafe { std::env::remove_var(existing) };
    }
}
