//! Ambient environment capture and scoped merging.
//!
//! The matrix never mutates the process environment. The ambient state is
//! captured once at startup into an [`EnvironmentSnapshot`] and each variant
//! merges its own overrides over that snapshot for the duration of a single
//! invocation, so an override set by one variant (e.g. `sysv` disabling
//! process-shared POSIX primitives) can never leak into the next.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Compiler-flags override honored by the configure step.
pub const CFLAGS_VAR: &str = "CFLAGS";

/// Preferred viewer for HTML reports produced by the ABI tooling.
pub const BROWSER_VAR: &str = "BROWSER";

/// Immutable snapshot of the ambient process environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvironmentSnapshot {
    /// Capture the full ambient environment of the current process.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit variables. Test seam.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a variable in the snapshot.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// The preferred HTML report viewer, defaulting to `xdg-open`.
    pub fn browser(&self) -> &str {
        self.get(BROWSER_VAR).unwrap_or("xdg-open")
    }

    /// Effective environment for one invocation: the snapshot with
    /// `overrides` layered on top (overrides win). The snapshot itself
    /// is never modified.
    pub fn merged(&self, overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut env = self.vars.clone();
        for (key, value) in overrides {
            env.insert(key.clone(), value.clone());
        }
        env
    }

    /// The snapshot as a plain map, with no overrides applied.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.vars.clone()
    }
}
