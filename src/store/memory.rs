use anyhow::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::model::{Entity, Id, Language, Template, Thesaurus};
use crate::store::traits::{EntityStore, TemplateStore, ThesaurusStore};

/// Process-local store. Answers referrer lookups with a scan over metadata.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<BTreeMap<(Id, Language), Entity>>,
    templates: RwLock<BTreeMap<Id, Template>>,
    thesauri: RwLock<BTreeMap<Id, Thesaurus>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EntityStore for MemoryStore {
    async fn get_entity(&self, shared_id: &str, language: &str) -> Result<Option<Entity>> {
        let key = (shared_id.to_string(), language.to_string());
        Ok(self.entities.read().get(&key).cloned())
    }

    async fn get_entity_documents(&self, shared_id: &str) -> Result<Vec<Entity>> {
        Ok(self
            .entities
            .read()
            .values()
            .filter(|e| e.shared_id == shared_id)
            .cloned()
            .collect())
    }

    async fn list_entities(&self) -> Result<Vec<Entity>> {
        Ok(self.entities.read().values().cloned().collect())
    }

    async fn upsert_entity(&self, entity: Entity) -> Result<Entity> {
        let key = (entity.shared_id.clone(), entity.language.clone());
        self.entities.write().insert(key, entity.clone());
        Ok(entity)
    }

    async fn delete_entity(&self, shared_id: &str, language: &str) -> Result<bool> {
        let key = (shared_id.to_string(), language.to_string());
        Ok(self.entities.write().remove(&key).is_some())
    }

    async fn find_by_metadata_value(
        &self,
        properties: &[String],
        value: &str,
    ) -> Result<Vec<Entity>> {
        Ok(self
            .entities
            .read()
            .values()
            .filter(|entity| {
                properties.iter().any(|property| {
                    entity
                        .values(property)
                        .iter()
                        .any(|v| v.value.as_str() == Some(value))
                })
            })
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl TemplateStore for MemoryStore {
    async fn get_template(&self, id: &Id) -> Result<Option<Template>> {
        Ok(self.templates.read().get(id).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<Template>> {
        Ok(self.templates.read().values().cloned().collect())
    }

    async fn upsert_template(&self, template: Template) -> Result<()> {
        self.templates.write().insert(template.id.clone(), template);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ThesaurusStore for MemoryStore {
    async fn get_thesaurus(&self, id: &Id) -> Result<Option<Thesaurus>> {
        Ok(self.thesauri.read().get(id).cloned())
    }

    async fn upsert_thesaurus(&self, thesaurus: Thesaurus) -> Result<()> {
        self.thesauri.write().insert(thesaurus.id.clone(), thesaurus);
        Ok(())
    }
}
