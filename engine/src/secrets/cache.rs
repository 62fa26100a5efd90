use crate::secrets::string::SecretString;
use crate::secrets::SecretManager;
use sdk::errors::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// An in-memory cache for secrets.
///
/// Each key is resolved once: first from an environment variable
/// (uppercased key, e.g. `GEMINI_API_KEY`), then from the OS keychain
/// through `SecretManager`. The resolved value is kept for the process
/// lifetime.
#[derive(Clone)]
pub struct SecretCache {
    manager: Arc<SecretManager>,
    cache: Arc<RwLock<HashMap<String, SecretString>>>,
}

impl SecretCache {
    /// Creates a new SecretCache wrapping the provided SecretManager
    pub fn new(manager: Arc<SecretManager>) -> Self {
        Self {
            manager,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seeds the cache with a known value. Used by tests and by callers
    /// that already hold the key.
    pub fn insert(&self, key: &str, value: impl Into<SecretString>) {
        let mut cache = self.cache.write().expect("SecretCache lock poisoned");
        cache.insert(key.to_string(), value.into());
    }

    /// Retrieves a secret, checking the memory cache first.
    ///
    /// # Errors
    /// `EngineError::MissingApiKey` when neither the environment nor the
    /// keychain has a value; `EngineError::KeyringError` when the keychain
    /// itself fails.
    pub fn get_secret(&self, key: &str) -> Result<SecretString, EngineError> {
        {
            let cache = self.cache.read().expect("SecretCache lock poisoned");
            if let Some(secret) = cache.get(key) {
                return Ok(secret.clone());
            }
        }

        let from_env = std::env::var(key.to_uppercase())
            .ok()
            .map(SecretString::new)
            .filter(|secret| !secret.is_empty());

        let secret = match from_env {
            Some(secret) => {
                tracing::debug!("Using secret '{}' from environment", key);
                secret
            }
            None => match self.manager.get_secret(key)? {
                Some(value) => SecretString::new(value),
                None => return Err(EngineError::MissingApiKey(key.to_uppercase())),
            },
        };

        {
            let mut cache = self.cache.write().expect("SecretCache lock poisoned");
            cache.insert(key.to_string(), secret.clone());
        }

        Ok(secret)
    }

    /// True when the secret can be resolved without error.
    pub fn has_secret(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }
}
