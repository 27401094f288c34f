use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{EngineError, InheritanceError};
use crate::logic::denormalize::Denormalizer;
use crate::logic::indexing::{from_index_shape, project_schema, Indexer, ReindexReport};
use crate::logic::inheritance::{InheritanceResolver, ResolvedProperty};
use crate::logic::propagation::Propagator;
use crate::logic::vocabulary::propagate_thesaurus_change;
use crate::model::{
    generate_id, Entity, EntityInput, Id, IndexFieldMap, Language, NewTemplate,
    PropagationReport, SearchQuery, Template, Thesaurus, Triple, TITLE_PROPERTY,
};
use crate::store::schema_cache::SchemaCache;
use crate::store::traits::{SearchIndex, Store};

/// Result of a write together with the propagation it triggered. The write
/// itself has been committed even when `warnings` is not empty.
#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome<T> {
    pub saved: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<PropagationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> WriteOutcome<T> {
    fn new(saved: T) -> Self {
        Self {
            saved,
            propagation: None,
            warnings: Vec::new(),
        }
    }
}

/// Entry point for every write that can affect denormalized values
pub struct Engine<S: Store> {
    store: Arc<S>,
    index: Arc<dyn SearchIndex>,
    schema: SchemaCache,
    /// Held from schema snapshot to cache update so template saves apply in order
    template_writes: Mutex<()>,
}

impl<S: Store> Engine<S> {
    pub fn new(store: Arc<S>, index: Arc<dyn SearchIndex>) -> Self {
        Self {
            store,
            index,
            schema: SchemaCache::new(),
            template_writes: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Current template snapshot
    pub async fn schema(&self) -> Result<Arc<InheritanceResolver>, EngineError> {
        Ok(self.schema.get_or_load(self.store.as_ref()).await?)
    }

    /// Validate stored templates and publish the index mapping
    pub async fn init(&self) -> Result<IndexFieldMap, EngineError> {
        self.schema.invalidate().await;
        let resolver = self.schema().await?;
        resolver.validate()?;
        Indexer::new(self.index.as_ref())
            .refresh_mapping(&resolver)
            .await
    }

    // Templates

    pub async fn get_template(&self, id: &Id) -> Result<Template, EngineError> {
        self.store
            .get_template(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Template {}", id)))
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>, EngineError> {
        Ok(self.store.list_templates().await?)
    }

    /// Create or replace a template. The new definition is validated against
    /// every other template before anything is written.
    pub async fn save_template(
        &self,
        input: NewTemplate,
        user_id: &str,
    ) -> Result<Template, EngineError> {
        if input.properties.iter().any(|def| def.name == TITLE_PROPERTY) {
            return Err(EngineError::Invalid(format!(
                "'{}' is reserved for the entity title",
                TITLE_PROPERTY
            )));
        }
        if let Some(name) = input.properties.iter().map(|def| &def.name).duplicates().next() {
            return Err(EngineError::Invalid(format!("Duplicate property '{}'", name)));
        }

        let _writing = self.template_writes.lock().await;
        let existing = match &input.id {
            Some(id) => self.store.get_template(id).await?,
            None => None,
        };
        let template = match existing {
            Some(mut template) => {
                template.apply_update(input, user_id.to_string());
                template
            }
            None => Template::from_new(input, user_id.to_string()),
        };

        let resolver = self.schema().await?.with_template(template.clone());
        resolver.validate()?;
        let mapping = project_schema(&resolver)?;

        self.store.upsert_template(template.clone()).await?;
        self.schema.put(Arc::new(resolver)).await;
        self.index.put_mapping(mapping).await?;

        log::info!("Saved template {} ({})", template.name, template.id);
        Ok(template)
    }

    // Thesauri

    pub async fn get_thesaurus(&self, id: &Id) -> Result<Thesaurus, EngineError> {
        self.store
            .get_thesaurus(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Thesaurus {}", id)))
    }

    pub async fn save_thesaurus(
        &self,
        thesaurus: Thesaurus,
    ) -> Result<WriteOutcome<Thesaurus>, EngineError> {
        if let Some(id) = thesaurus.values.iter().map(|e| &e.id).duplicates().next() {
            return Err(EngineError::Invalid(format!(
                "Duplicate thesaurus entry '{}'",
                id
            )));
        }

        let previous = self.store.get_thesaurus(&thesaurus.id).await?;
        self.store.upsert_thesaurus(thesaurus.clone()).await?;

        let resolver = self.schema().await?;
        let mut outcome = WriteOutcome::new(thesaurus);
        let result = propagate_thesaurus_change(
            self.store.as_ref(),
            &resolver,
            self.index.as_ref(),
            &outcome.saved,
            previous.as_ref(),
        )
        .await;
        match result {
            Ok(report) => outcome.propagation = Some(report),
            Err(e) => {
                log::warn!("Thesaurus {} saved, propagation failed: {}", outcome.saved.id, e);
                outcome.warnings.push(e.to_string());
            }
        }
        Ok(outcome)
    }

    // Entities

    pub async fn get_entity(&self, shared_id: &str, language: &str) -> Result<Entity, EngineError> {
        self.store
            .get_entity(shared_id, language)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Entity {}/{}", shared_id, language)))
    }

    /// Save one language document: denormalize its own values, persist,
    /// index, then propagate whatever changed to its referrers
    pub async fn save_entity(&self, input: EntityInput) -> Result<WriteOutcome<Entity>, EngineError> {
        let resolver = self.schema().await?;
        let shared_id = input.shared_id.clone().unwrap_or_else(generate_id);
        let previous = self.store.get_entity(&shared_id, &input.language).await?;

        let template_id = input
            .template
            .clone()
            .or_else(|| previous.as_ref().map(|p| p.template.clone()))
            .ok_or_else(|| EngineError::Invalid("template is required".to_string()))?;
        let template = resolver
            .template(&template_id)
            .ok_or_else(|| EngineError::NotFound(format!("Template {}", template_id)))?;
        if previous.is_none() && input.title.as_deref().map_or(true, str::is_empty) {
            return Err(EngineError::Invalid("title is required".to_string()));
        }
        validate_input(&resolver, &template_id, &input)?;

        let mut entity = input.merge_into(shared_id, template_id.clone(), previous.as_ref());
        // Properties the template no longer defines, e.g. after a template switch
        entity.metadata.retain(|name, _| template.property(name).is_some());

        let own = Denormalizer::new(self.store.as_ref(), &resolver)
            .denormalize_entity(&mut entity)
            .await?;
        let changed = entity.changed_properties(previous.as_ref());
        let retemplated = previous
            .as_ref()
            .map_or(false, |p| p.template != entity.template);
        let saved = self.store.upsert_entity(entity).await?;
        log::info!(
            "Saved entity {}/{} ({} changed properties, {} dangling references)",
            saved.shared_id,
            saved.language,
            changed.len(),
            own.dangling
        );

        let mut outcome = WriteOutcome::new(saved);
        self.index_or_warn(&outcome.saved, &mut outcome.warnings).await;

        if !changed.is_empty() {
            let seeds = changed
                .iter()
                .map(|property| {
                    Triple::new(&outcome.saved.shared_id, &outcome.saved.language, property)
                })
                .collect();
            self.propagate_or_warn(&resolver, seeds, retemplated, &mut outcome)
                .await;
        }
        Ok(outcome)
    }

    /// Delete one language document, or all of them. Referrers keep their
    /// values but their inherited values collapse to empty.
    pub async fn delete_entity(
        &self,
        shared_id: &str,
        language: Option<&str>,
    ) -> Result<WriteOutcome<Vec<Language>>, EngineError> {
        let languages: Vec<Language> = match language {
            Some(language) => vec![language.to_string()],
            None => self
                .store
                .get_entity_documents(shared_id)
                .await?
                .into_iter()
                .map(|e| e.language)
                .collect(),
        };

        let mut deleted = Vec::new();
        for language in languages {
            if self.store.delete_entity(shared_id, &language).await? {
                deleted.push(language);
            }
        }
        if deleted.is_empty() {
            return Err(EngineError::NotFound(format!("Entity {}", shared_id)));
        }

        let resolver = self.schema().await?;
        let mut outcome = WriteOutcome::new(Vec::new());
        let indexer = Indexer::new(self.index.as_ref());
        for language in &deleted {
            if let Err(e) = indexer.remove(shared_id, language).await {
                log::warn!("Failed to remove {}/{} from index: {}", shared_id, language, e);
                outcome.warnings.push(e.to_string());
            }
        }
        log::info!("Deleted entity {} in {}", shared_id, deleted.join(", "));

        let seeds = deleted
            .iter()
            .map(|language| Triple::new(shared_id, language, TITLE_PROPERTY))
            .collect();
        self.propagate_or_warn(&resolver, seeds, false, &mut outcome)
            .await;
        outcome.saved = deleted;
        Ok(outcome)
    }

    /// Re-run propagation from every property of a stored document. Repairs
    /// referrers left stale by an aborted pass.
    pub async fn propagate_from(
        &self,
        shared_id: &str,
        language: &str,
    ) -> Result<PropagationReport, EngineError> {
        let entity = self.get_entity(shared_id, language).await?;
        let resolver = self.schema().await?;
        let seeds = entity
            .changed_properties(None)
            .iter()
            .map(|property| Triple::new(shared_id, language, property))
            .collect();
        Ok(Propagator::new(self.store.as_ref(), &resolver, self.index.as_ref())
            .run(seeds)
            .await?)
    }

    // Search

    /// Query the index; results come back in storage shape
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Entity>, EngineError> {
        let documents = self.index.search(query).await?;
        Ok(documents.into_iter().map(from_index_shape).collect())
    }

    pub async fn mapping(&self) -> Result<IndexFieldMap, EngineError> {
        Ok(self.index.get_mapping().await?)
    }

    /// Rebuild the index from storage without re-deriving any value
    pub async fn reindex_all(&self) -> Result<ReindexReport, EngineError> {
        let entities = self.store.list_entities().await?;
        Ok(Indexer::new(self.index.as_ref())
            .reindex_all(entities)
            .await?)
    }

    async fn index_or_warn(&self, entity: &Entity, warnings: &mut Vec<String>) {
        if let Err(e) = Indexer::new(self.index.as_ref()).index_entity(entity).await {
            log::warn!(
                "Entity {}/{} saved but not indexed: {}",
                entity.shared_id,
                entity.language,
                e
            );
            warnings.push(e.to_string());
        }
    }

    async fn propagate_or_warn<T>(
        &self,
        resolver: &InheritanceResolver,
        seeds: Vec<Triple>,
        any_source_template: bool,
        outcome: &mut WriteOutcome<T>,
    ) {
        let mut propagator = Propagator::new(self.store.as_ref(), resolver, self.index.as_ref());
        if any_source_template {
            propagator = propagator.any_source_template();
        }
        match propagator.run(seeds).await {
            Ok(report) => {
                for failure in &report.index_failures {
                    outcome.warnings.push(format!(
                        "{}/{} not re-indexed: {}",
                        failure.shared_id, failure.language, failure.message
                    ));
                }
                outcome.propagation = Some(report);
            }
            Err(e) => {
                log::warn!("Propagation aborted: {}", e);
                outcome.warnings.push(e.to_string());
            }
        }
    }
}

/// Reject metadata the template cannot hold before anything is merged
fn validate_input(
    resolver: &InheritanceResolver,
    template_id: &Id,
    input: &EntityInput,
) -> Result<(), EngineError> {
    for (property, values) in &input.metadata {
        if property == TITLE_PROPERTY {
            return Err(EngineError::Invalid(
                "title is not a metadata property".to_string(),
            ));
        }
        let resolved = match resolver.resolve(template_id, property) {
            Ok(resolved) => resolved,
            Err(e @ InheritanceError::UnknownProperty { .. }) => {
                return Err(EngineError::Invalid(e.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let is_relationship = matches!(
            resolved,
            ResolvedProperty::Relationship { .. } | ResolvedProperty::Inheriting(_)
        );
        if is_relationship && values.iter().any(|v| !v.value.is_string()) {
            return Err(EngineError::Invalid(format!(
                "Relationship property '{}' only holds entity ids",
                property
            )));
        }
    }
    Ok(())
}
