//! Process environment capability.
//!
//! Lookups of `SCRIPTHAUS_HOME`, `HOME` and the working directory go through
//! [`Environment`] so resolution can be tested without mutating process
//! state.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use super::error::{ResolveError, ResolveResult};

/// Overrides the global playbook root.
pub const SC_HOME_VAR: &str = "SCRIPTHAUS_HOME";

/// Fallback source for the global playbook root.
pub const HOME_VAR: &str = "HOME";

/// Directory name under `$HOME` used when `SCRIPTHAUS_HOME` is unset.
pub const SC_HOME_DIR_NAME: &str = "scripthaus";

/// Read-only view of the process environment.
pub trait Environment: Send + Sync {
    /// Value of an environment variable, `None` if unset or empty.
    fn var(&self, key: &str) -> Option<String>;

    /// Current working directory (absolute).
    fn current_dir(&self) -> io::Result<PathBuf>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }
}

/// Fixed variables and working directory.
#[derive(Debug, Clone)]
pub struct FixedEnvironment {
    vars: HashMap<String, String>,
    cwd: PathBuf,
}

impl FixedEnvironment {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { vars: HashMap::new(), cwd: cwd.into() }
    }

    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl Environment for FixedEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        Ok(self.cwd.clone())
    }
}

/// The global ScriptHaus directory: `SCRIPTHAUS_HOME`, else `$HOME/scripthaus`.
pub fn scripthaus_home(env: &dyn Environment) -> ResolveResult<PathBuf> {
    if let Some(home) = env.var(SC_HOME_VAR) {
        return Ok(PathBuf::from(home));
    }
    env.var(HOME_VAR)
        .map(|home| Path::new(&home).join(SC_HOME_DIR_NAME))
        .ok_or(ResolveError::HomeNotSet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_prefers_override() {
        let env = FixedEnvironment::new("/")
            .with_var(HOME_VAR, "/home/mike")
            .with_var(SC_HOME_VAR, "/opt/sc");
        assert_eq!(scripthaus_home(&env).unwrap(), PathBuf::from("/opt/sc"));
    }

    #[test]
    fn test_home_falls_back_to_home_var() {
        let env = FixedEnvironment::new("/").with_var(HOME_VAR, "/home/mike");
        assert_eq!(scripthaus_home(&env).unwrap(), PathBuf::from("/home/mike/scripthaus"));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let env = FixedEnvironment::new("/")
            .with_var(HOME_VAR, "/home/mike")
            .with_var(SC_HOME_VAR, "");
        assert_eq!(scripthaus_home(&env).unwrap(), PathBuf::from("/home/mike/scripthaus"));
    }

    #[test]
    fn test_home_not_set() {
        let env = FixedEnvironment::new("/");
        assert!(matches!(scripthaus_home(&env), Err(ResolveError::HomeNotSet)));
    }
}
