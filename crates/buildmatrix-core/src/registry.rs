//! Build-variant configurations and the registry that holds them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MatrixError, Result};

/// Environment override disabling process-shared POSIX primitives,
/// applied by the `sysv` and `mac` variants for their own invocation only.
pub const DISABLE_PSHARED: (&str, &str) = ("DISABLE_PSHARED", "1");

/// Builtin build variants, in the order `all` runs them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinVariant {
    /// Strict ANSI C mode (`CFLAGS=-ansi`).
    Ansi,

    /// Linker section attributes disabled.
    Nosection,

    /// SysV semaphores instead of POSIX.
    Sysv,

    /// `poll(2)` event loop instead of `epoll(7)`.
    Noepoll,

    /// No monotonic clock support.
    Nogettime,

    /// BSD-like feature set (no epoll, no timed semaphore waits).
    Bsd,

    /// Distribution tarball check (`make distcheck`).
    Dist,

    /// Binary RPM package build (`make rpm`).
    Rpm,

    /// Mac-like feature set (BSD minus the monotonic clock).
    Mac,
}

impl BuiltinVariant {
    /// Every builtin variant, in registration order. The first eight
    /// mirror the fixed `all` sequence; `mac` is the named-only extra
    /// folded into the same registry.
    pub const ALL: [BuiltinVariant; 9] = [
        BuiltinVariant::Ansi,
        BuiltinVariant::Nosection,
        BuiltinVariant::Sysv,
        BuiltinVariant::Noepoll,
        BuiltinVariant::Nogettime,
        BuiltinVariant::Bsd,
        BuiltinVariant::Dist,
        BuiltinVariant::Rpm,
        BuiltinVariant::Mac,
    ];

    /// The variant name as used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinVariant::Ansi => "ansi",
            BuiltinVariant::Nosection => "nosection",
            BuiltinVariant::Sysv => "sysv",
            BuiltinVariant::Noepoll => "noepoll",
            BuiltinVariant::Nogettime => "nogettime",
            BuiltinVariant::Bsd => "bsd",
            BuiltinVariant::Dist => "dist",
            BuiltinVariant::Rpm => "rpm",
            BuiltinVariant::Mac => "mac",
        }
    }

    /// Configure-time flags. Order is significant: later flags override
    /// earlier ones in the underlying build system.
    pub fn configure_flags(&self) -> Vec<String> {
        let flags: &[&str] = match self {
            BuiltinVariant::Ansi => &["--enable-ansi"],
            BuiltinVariant::Nosection => &["--disable-section-attributes"],
            BuiltinVariant::Sysv => &["--disable-posix-sems"],
            BuiltinVariant::Noepoll => &["--disable-epoll"],
            BuiltinVariant::Nogettime => &["ac_cv_func_clock_gettime=no"],
            BuiltinVariant::Bsd => {
                &["ac_cv_func_epoll_create=no", "ac_cv_func_sem_timedwait=no"]
            }
            BuiltinVariant::Dist | BuiltinVariant::Rpm => &[],
            BuiltinVariant::Mac => &[
                "ac_cv_func_epoll_create=no",
                "ac_cv_func_sem_timedwait=no",
                "ac_cv_func_clock_gettime=no",
            ],
        };
        flags.iter().map(|f| f.to_string()).collect()
    }

    /// Environment overrides scoped to this variant's invocation.
    pub fn env_overrides(&self) -> BTreeMap<String, String> {
        let mut overrides = BTreeMap::new();
        match self {
            BuiltinVariant::Ansi => {
                overrides.insert("CFLAGS".to_string(), "-ansi".to_string());
            }
            BuiltinVariant::Sysv | BuiltinVariant::Mac => {
                let (key, value) = DISABLE_PSHARED;
                overrides.insert(key.to_string(), value.to_string());
            }
            _ => {}
        }
        overrides
    }

    /// Build-step arguments replacing the executor's default (`check`).
    /// The packaging variants run a different make target after the same
    /// configure step.
    pub fn build_args(&self) -> Option<Vec<String>> {
        match self {
            BuiltinVariant::Dist => Some(vec!["distcheck".to_string()]),
            BuiltinVariant::Rpm => Some(vec!["rpm".to_string()]),
            _ => None,
        }
    }

    /// Materialize this variant into a registrable configuration.
    pub fn configuration(&self) -> Configuration {
        Configuration {
            name: self.name().to_string(),
            configure_flags: self.configure_flags(),
            env_overrides: self.env_overrides(),
            build_args: self.build_args(),
            skip_on_missing_tool: false,
        }
    }
}

/// A named build configuration. Immutable after registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Configuration {
    /// Unique name within a registry.
    pub name: String,

    /// Configure-time flags, in precedence order.
    pub configure_flags: Vec<String>,

    /// Environment overrides scoped to this configuration's runs.
    pub env_overrides: BTreeMap<String, String>,

    /// Build-step arguments replacing the executor's default target.
    pub build_args: Option<Vec<String>>,

    /// Report `Skipped` instead of `Failed` when the external build tool
    /// cannot be spawned.
    pub skip_on_missing_tool: bool,
}

impl Configuration {
    /// Create a configuration with the given name and configure flags.
    pub fn new(name: impl Into<String>, configure_flags: Vec<String>) -> Self {
        Self {
            name: name.into(),
            configure_flags,
            env_overrides: BTreeMap::new(),
            build_args: None,
            skip_on_missing_tool: false,
        }
    }

    /// Add an environment override scoped to this configuration.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(key.into(), value.into());
        self
    }

    /// Replace the executor's default build-step arguments.
    pub fn with_build_args(mut self, args: Vec<String>) -> Self {
        self.build_args = Some(args);
        self
    }

    /// Mark the configuration as skippable when its tool is missing.
    pub fn skip_on_missing_tool(mut self) -> Self {
        self.skip_on_missing_tool = true;
        self
    }
}

/// Ordered registry of build configurations.
///
/// Registration order is the execution order of an `all` run.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationRegistry {
    configs: Vec<Configuration>,
}

impl ConfigurationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the builtin variants, in their fixed
    /// order: ansi, nosection, sysv, noepoll, nogettime, bsd, dist, rpm,
    /// mac.
    pub fn builtin() -> Self {
        Self {
            configs: BuiltinVariant::ALL.iter().map(|v| v.configuration()).collect(),
        }
    }

    /// Register a configuration. Fails if the name is already taken.
    pub fn register(&mut self, config: Configuration) -> Result<()> {
        if self.configs.iter().any(|c| c.name == config.name) {
            return Err(MatrixError::DuplicateConfiguration(config.name));
        }
        self.configs.push(config);
        Ok(())
    }

    /// Look up a configuration by name.
    pub fn get(&self, name: &str) -> Result<&Configuration> {
        self.configs
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| MatrixError::ConfigurationNotFound(name.to_string()))
    }

    /// All configurations, in registration order.
    pub fn list_all(&self) -> &[Configuration] {
        &self.configs
    }

    /// Number of registered configurations.
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}
