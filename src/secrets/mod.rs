use std::sync::Arc;

use anyhow::{Result, anyhow};
use moka::future::Cache;
use sha1::{Digest, Sha1};

use crate::platform::PlatformClient;

/// Derive the config key a route's signing secret is stored under on the
/// platform: hex SHA-1 of `"{app_id}_{route}"`. Namespacing only; the key is
/// public, the value it points at is the secret.
pub fn route_secret_key(app_id: &str, route: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(app_id.as_bytes());
    hasher.update(b"_");
    hasher.update(route.as_bytes());
    hex::encode(hasher.finalize())
}

/// Per-route signing secrets, fetched lazily from the platform and held for
/// the process lifetime. No TTL, no rotation: once cached, a route's secret
/// is immutable until restart.
pub struct SecretCache {
    platform: Arc<PlatformClient>,
    cache: Cache<String, Vec<u8>>,
}

impl SecretCache {
    pub fn new(platform: Arc<PlatformClient>) -> Self {
        Self {
            platform,
            // A handful of routes per process; capacity is a formality
            cache: Cache::new(64),
        }
    }

    /// Return the signing secret for `route`, fetching it on first access.
    ///
    /// Concurrent first accesses for the same route coalesce into a single
    /// platform fetch; every caller sees the same bytes.
    pub async fn get(&self, route: &str) -> Result<Vec<u8>> {
        let key = route_secret_key(&self.platform.identity().app_id, route);
        self.cache
            .try_get_with(key.clone(), async {
                let value = self.platform.config_value(&key).await?;
                Ok::<_, anyhow::Error>(value.into_bytes())
            })
            .await
            .map_err(|e| anyhow!("failed to resolve secret for route {}: {}", route, e))
    }

    /// Seed the cache with a secret returned by bot registration, keyed by
    /// the id the platform handed back (the derived config key).
    pub async fn insert(&self, key: String, secret: String) {
        self.cache.insert(key, secret.into_bytes()).await;
    }
}
