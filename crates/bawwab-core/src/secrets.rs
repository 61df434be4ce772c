//! Secret resolution
//!
//! Secrets are referenced by label: the upper-cased label names an
//! environment variable, the lower-cased label a file under the secrets
//! directory (the Docker secrets convention). Resolution fails open to
//! an empty string; callers treat empty as "unset" and decide policy.

use std::path::PathBuf;
use tracing::warn;

/// Default secrets directory (Docker secrets mount point)
pub const DEFAULT_SECRETS_DIR: &str = "/run/secrets";

/// Resolves named secrets from the environment or a secrets directory.
#[derive(Debug, Clone)]
pub struct SecretResolver {
    secrets_dir: PathBuf,
}

impl Default for SecretResolver {
    fn default() -> Self {
        Self {
            secrets_dir: PathBuf::from(DEFAULT_SECRETS_DIR),
        }
    }
}

impl SecretResolver {
    pub fn new(secrets_dir: impl Into<PathBuf>) -> Self {
        Self {
            secrets_dir: secrets_dir.into(),
        }
    }

    /// Resolve a secret by label.
    ///
    /// Tries the environment variable named by the upper-cased label
    /// first, then a file named by the lower-cased label under the
    /// secrets directory, trimming surrounding whitespace.
    pub fn resolve(&self, label: &str) -> String {
        if let Ok(value) = std::env::var(label.to_uppercase()) {
            if !value.is_empty() {
                return value;
            }
        }

        let path = self.secrets_dir.join(label.to_lowercase());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let value = contents.trim().to_string();
                if value.is_empty() {
                    warn!(label = %label, path = %path.display(), "secret file is empty");
                }
                value
            }
            Err(e) => {
                warn!(
                    label = %label,
                    path = %path.display(),
                    error = %e,
                    "secret not found in environment or secrets directory"
                );
                String::new()
            }
        }
    }
}
