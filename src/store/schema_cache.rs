use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::logic::InheritanceResolver;
use crate::store::traits::TemplateStore;

/// Process-wide cache of template definitions. Templates are read on every
/// save and written rarely, so the resolver is built once and replaced
/// explicitly whenever a template is saved.
#[derive(Debug, Default)]
pub struct SchemaCache {
    resolver: RwLock<Option<Arc<InheritanceResolver>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached resolver, if one has been loaded since the last invalidation
    pub async fn get(&self) -> Option<Arc<InheritanceResolver>> {
        self.resolver.read().await.clone()
    }

    /// Cached resolver, loading all templates from `store` on a miss
    pub async fn get_or_load<S: TemplateStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Arc<InheritanceResolver>> {
        if let Some(resolver) = self.get().await {
            return Ok(resolver);
        }

        let mut cached = self.resolver.write().await;
        // Another task may have loaded it while we waited for the lock
        if let Some(existing) = cached.as_ref() {
            return Ok(existing.clone());
        }

        let templates = store.list_templates().await?;
        log::debug!("Loaded {} templates into schema cache", templates.len());
        let resolver = Arc::new(InheritanceResolver::new(templates));
        *cached = Some(resolver.clone());
        Ok(resolver)
    }

    /// Replace the cached snapshot, e.g. with one validated during a template save
    pub async fn put(&self, resolver: Arc<InheritanceResolver>) {
        *self.resolver.write().await = Some(resolver);
    }

    pub async fn invalidate(&self) {
        *self.resolver.write().await = None;
    }
}
