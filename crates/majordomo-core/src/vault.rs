//! Credential vault adapter.
//!
//! Secrets are referenced everywhere else by symbolic name; only this module
//! knows where the bytes live. Resolution order is store order: the OS
//! keychain first, then `MAJORDOMO_SECRET_*` environment variables as a
//! development fallback. Resolved values are cached in-memory for the process
//! lifetime.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{MajordomoError, Result};

/// Opaque secret value that never appears in logs.
///
/// Debug output always shows `__REDACTED__` to prevent accidental leakage in
/// logs, error messages, or debug output.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret. Use only at the point of authentication.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("__REDACTED__")
    }
}

/// A backend that can resolve a symbolic secret name.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Resolve `name`, returning `Ok(None)` when this store has no entry.
    async fn fetch(&self, name: &str) -> Result<Option<SecretValue>>;
}

/// OS keychain store — shells out to the platform keychain tool.
///
/// On macOS this is `security find-generic-password -s <service> -w`, where
/// the service is `{prefix}.{name}`. A non-zero exit means "not found".
pub struct KeychainStore {
    service_prefix: String,
}

impl KeychainStore {
    pub fn new(service_prefix: impl Into<String>) -> Self {
        Self {
            service_prefix: service_prefix.into(),
        }
    }
}

#[async_trait]
impl SecretStore for KeychainStore {
    async fn fetch(&self, name: &str) -> Result<Option<SecretValue>> {
        let service = format!("{}.{}", self.service_prefix, name);
        let output = tokio::process::Command::new("security")
            .args(["find-generic-password", "-s", &service, "-w"])
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let value = String::from_utf8_lossy(&out.stdout).trim_end().to_string();
                if value.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(SecretValue::new(value)))
                }
            }
            // Item not found, or no keychain on this platform.
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MajordomoError::Vault(format!(
                "keychain lookup for {service}: {e}"
            ))),
        }
    }
}

/// Environment store — reads `MAJORDOMO_SECRET_<NAME>` with the name
/// uppercased and dashes mapped to underscores.
pub struct EnvStore;

#[async_trait]
impl SecretStore for EnvStore {
    async fn fetch(&self, name: &str) -> Result<Option<SecretValue>> {
        let var = format!(
            "MAJORDOMO_SECRET_{}",
            name.to_ascii_uppercase().replace('-', "_")
        );
        match std::env::var(&var) {
            Ok(value) if !value.is_empty() => Ok(Some(SecretValue::new(value))),
            _ => Ok(None),
        }
    }
}

/// Caching front door over the configured stores.
pub struct Vault {
    stores: Vec<Box<dyn SecretStore>>,
    cache: RwLock<HashMap<String, SecretValue>>,
}

impl Vault {
    /// Standard store order: keychain, then env fallback.
    pub fn with_default_stores(service_prefix: &str) -> Self {
        Self::new(vec![
            Box::new(KeychainStore::new(service_prefix)),
            Box::new(EnvStore),
        ])
    }

    pub fn new(stores: Vec<Box<dyn SecretStore>>) -> Self {
        Self {
            stores,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a secret by symbolic name, consulting the cache first.
    ///
    /// # Errors
    ///
    /// Returns [`MajordomoError::SecretNotFound`] when no store has the name,
    /// or [`MajordomoError::Vault`] on a store failure.
    pub async fn get(&self, name: &str) -> Result<SecretValue> {
        if let Some(hit) = self.cache.read().await.get(name) {
            return Ok(hit.clone());
        }

        for store in &self.stores {
            if let Some(value) = store.fetch(name).await? {
                debug!(secret = name, "secret resolved");
                self.cache
                    .write()
                    .await
                    .insert(name.to_string(), value.clone());
                return Ok(value);
            }
        }

        Err(MajordomoError::SecretNotFound {
            name: name.to_string(),
        })
    }

    /// Drop a cached entry so the next `get` re-resolves it.
    pub async fn invalidate(&self, name: &str) {
        self.cache.write().await.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore(&'static str, &'static str);

    #[async_trait]
    impl SecretStore for FixedStore {
        async fn fetch(&self, name: &str) -> Result<Option<SecretValue>> {
            if name == self.0 {
                Ok(Some(SecretValue::new(self.1)))
            } else {
                Ok(None)
            }
        }
    }

    #[test]
    fn secret_value_debug_is_redacted() {
        let v = SecretValue::new("hunter2");
        assert_eq!(format!("{v:?}"), "__REDACTED__");
        assert_eq!(v.expose(), "hunter2");
    }

    #[tokio::test]
    async fn first_matching_store_wins() {
        let vault = Vault::new(vec![
            Box::new(FixedStore("token", "from-first")),
            Box::new(FixedStore("token", "from-second")),
        ]);
        assert_eq!(vault.get("token").await.unwrap().expose(), "from-first");
    }

    #[tokio::test]
    async fn missing_secret_is_an_error() {
        let vault = Vault::new(vec![Box::new(FixedStore("a", "1"))]);
        let err = vault.get("b").await.unwrap_err();
        assert_eq!(err.code(), "SECRET_NOT_FOUND");
    }

    #[tokio::test]
    async fn env_store_resolves_and_caches() {
        std::env::set_var("MAJORDOMO_SECRET_CACHE_PROBE", "v1");
        let vault = Vault::new(vec![Box::new(EnvStore)]);
        assert_eq!(vault.get("cache-probe").await.unwrap().expose(), "v1");

        // Cached — a changed env var is not observed until invalidation.
        std::env::set_var("MAJORDOMO_SECRET_CACHE_PROBE", "v2");
        assert_eq!(vault.get("cache-probe").await.unwrap().expose(), "v1");
        vault.invalidate("cache-probe").await;
        assert_eq!(vault.get("cache-probe").await.unwrap().expose(), "v2");
        std::env::remove_var("MAJORDOMO_SECRET_CACHE_PROBE");
    }
}
