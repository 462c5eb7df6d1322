//! Stable identity of a matrix run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::registry::Configuration;

/// Identity of one matrix invocation: where it ran, what was selected,
/// and (when available) the commit it ran against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatrixIdentity {
    /// Project root the matrix ran from.
    pub workspace_path: PathBuf,

    /// SHA-256 digest over the ordered variant definitions.
    pub variants_digest: String,

    /// Git HEAD at execution time, when inside a repository.
    pub git_sha: Option<String>,
}

impl MatrixIdentity {
    pub fn new(workspace_path: PathBuf, configs: &[Configuration], git_sha: Option<String>) -> Self {
        Self {
            workspace_path,
            variants_digest: variants_digest(configs),
            git_sha,
        }
    }
}

/// Deterministic digest over ordered variant names and flags. Two runs
/// selecting the same variants in the same order share a digest.
pub fn variants_digest(configs: &[Configuration]) -> String {
    let mut hasher = Sha256::new();
    for config in configs {
        hasher.update(config.name.as_bytes());
        hasher.update(b"\0");
        for flag in &config.configure_flags {
            hasher.update(flag.as_bytes());
            hasher.update(b"\0");
        }
        for (key, value) in &config.env_overrides {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\0");
        }
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BuiltinVariant;

    fn configs() -> Vec<Configuration> {
        vec![
            BuiltinVariant::Ansi.configuration(),
            BuiltinVariant::Sysv.configuration(),
        ]
    }

    #[test]
    fn test_digest_deterministic() {
        assert_eq!(variants_digest(&configs()), variants_digest(&configs()));
    }

    #[test]
    fn test_digest_order_sensitive() {
        let forward = configs();
        let mut reversed = configs();
        reversed.reverse();
        assert_ne!(variants_digest(&forward), variants_digest(&reversed));
    }

    #[test]
    fn test_digest_sensitive_to_flags() {
        let base = vec![Configuration::new("x", vec!["--a".to_string()])];
        let changed = vec![Configuration::new("x", vec!["--b".to_string()])];
        assert_ne!(variants_digest(&base), variants_digest(&changed));
    }

    #[test]
    fn test_identity_carries_git_sha() {
        let identity = MatrixIdentity::new(
            PathBuf::from("/src/project"),
            &configs(),
            Some("abc123".to_string()),
        );
        assert_eq!(identity.git_sha.as_deref(), Some("abc123"));
        assert!(!identity.variants_digest.is_empty());
    }
}
