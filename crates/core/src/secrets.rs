//! Secret storage contract and the credential accessor built on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::errors::{Error, Result};

/// Fixed key under which the bearer token is persisted.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Key/value storage for secrets.
///
/// Implementations report storage failures as errors; callers that must keep
/// working without storage access wrap the store in [`CredentialStore`].
pub trait SecretStore: Send + Sync {
    fn get_secret(&self, key: &str) -> Result<Option<String>>;
    fn set_secret(&self, key: &str, value: &str) -> Result<()>;
    fn delete_secret(&self, key: &str) -> Result<()>;
}

/// Process-local secret store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for InMemorySecretStore {
    fn get_secret(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| Error::secret("In-memory secret store is poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::secret("In-memory secret store is poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_secret(&self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::secret("In-memory secret store is poisoned"))?;
        values.remove(key);
        Ok(())
    }
}

/// Access to the stored bearer token.
///
/// A missing token is a normal state, not an error. Storage failures are
/// logged and swallowed: reads degrade to `None`, writes to no-ops.
#[derive(Clone)]
pub struct CredentialStore {
    secrets: Arc<dyn SecretStore>,
}

impl CredentialStore {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    /// Credential store with no backing storage beyond this process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySecretStore::new()))
    }

    /// Current token, if one is stored and non-empty.
    pub fn load(&self) -> Option<String> {
        match self.secrets.get_secret(AUTH_TOKEN_KEY) {
            Ok(Some(token)) if !token.trim().is_empty() => Some(token),
            Ok(_) => {
                debug!("[DataSync] No stored credential");
                None
            }
            Err(err) => {
                warn!("[DataSync] Failed to read stored credential: {}", err);
                None
            }
        }
    }

    pub fn store(&self, token: &str) {
        if let Err(err) = self.secrets.set_secret(AUTH_TOKEN_KEY, token) {
            warn!("[DataSync] Failed to persist credential: {}", err);
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.secrets.delete_secret(AUTH_TOKEN_KEY) {
            warn!("[DataSync] Failed to clear credential: {}", err);
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
