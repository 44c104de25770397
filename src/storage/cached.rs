// Grant lookup decorator backed by a moka cache

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::case_lifecycle::errors::LookupError;
use crate::case_lifecycle::traits::PermissionLookup;
use crate::case_lifecycle::types::{ActorId, Grant, ProjectId};
use crate::config::PermissionCacheConfig;

/// Caches resolved grants per (actor, project), including "not a member".
/// Lookup errors are passed through and never cached.
#[derive(Clone)]
pub struct CachedPermissionLookup {
    inner: Arc<dyn PermissionLookup>,
    cache: Cache<(ActorId, ProjectId), Option<Grant>>,
}

impl CachedPermissionLookup {
    pub fn new(inner: Arc<dyn PermissionLookup>, ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    pub fn from_config(inner: Arc<dyn PermissionLookup>, config: &PermissionCacheConfig) -> Self {
        Self::new(
            inner,
            Duration::from_secs(config.cache_ttl_seconds),
            config.cache_capacity,
        )
    }

    /// Forget the cached grant, e.g. after a role change
    pub async fn invalidate(&self, actor: &ActorId, project: &ProjectId) {
        self.cache.invalidate(&(actor.clone(), *project)).await;
    }
}

#[async_trait]
impl PermissionLookup for CachedPermissionLookup {
    async fn resolve_grant(
        &self,
        actor: &ActorId,
        project: &ProjectId,
    ) -> Result<Option<Grant>, LookupError> {
        let key = (actor.clone(), *project);
        if let Some(grant) = self.cache.get(&key).await {
            tracing::trace!(actor = %actor, project = %project, "Grant cache hit");
            return Ok(grant);
        }

        let grant = self.inner.resolve_grant(actor, project).await?;
        self.cache.insert(key, grant.clone()).await;
        Ok(grant)
    }
}
