use anyhow::Result;
use std::collections::HashMap;

use crate::logic::inheritance::{InheritanceResolver, ResolvedProperty};
use crate::model::{DerivedFields, Entity, Id, MetadataValue, TITLE_PROPERTY};
use crate::store::traits::Store;

/// Result of recomputing one property of one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Refresh {
    pub changed: bool,
    /// Relationship values whose target document does not exist
    pub dangling: usize,
}

impl Refresh {
    fn absorb(&mut self, other: Refresh) {
        self.changed |= other.changed;
        self.dangling += other.dangling;
    }
}

/// Recomputes the derived parts of an entity document (relationship labels
/// and icons, vocabulary labels, inherited values) from current storage.
/// The only holder of the [`DerivedFields`] capability.
pub struct Denormalizer<'a, S: Store + ?Sized> {
    store: &'a S,
    resolver: &'a InheritanceResolver,
    grant: DerivedFields,
}

impl<'a, S: Store + ?Sized> Denormalizer<'a, S> {
    pub fn new(store: &'a S, resolver: &'a InheritanceResolver) -> Self {
        Self {
            store,
            resolver,
            grant: DerivedFields::grant(),
        }
    }

    /// Recompute every derived value of a document about to be saved
    pub async fn denormalize_entity(&self, entity: &mut Entity) -> Result<Refresh> {
        let mut total = Refresh::default();
        let properties: Vec<String> = entity.metadata.keys().cloned().collect();
        for property in properties {
            let resolved = self.resolver.resolve(&entity.template, &property)?;
            let refresh = self
                .refresh_property(entity, &property, &resolved)
                .await?;
            total.absorb(refresh);
        }
        Ok(total)
    }

    /// Recompute every value of `property` on `entity` from current storage
    pub async fn refresh_property(
        &self,
        entity: &mut Entity,
        property: &str,
        resolved: &ResolvedProperty,
    ) -> Result<Refresh> {
        let Some(current) = entity.metadata.get(property) else {
            return Ok(Refresh::default());
        };
        let mut values = current.clone();

        let dangling = match resolved {
            ResolvedProperty::Relationship { .. } | ResolvedProperty::Inheriting(_) => {
                self.refresh_relationship_values(&entity.language, &mut values, resolved)
                    .await?
            }
            ResolvedProperty::Vocabulary { thesaurus, .. } => {
                self.relabel(thesaurus, &mut values).await?;
                0
            }
            ResolvedProperty::Plain { .. } => 0,
        };

        let changed = entity.metadata.get(property) != Some(&values);
        if changed {
            entity.metadata.insert(property.to_string(), values);
        }
        Ok(Refresh { changed, dangling })
    }

    async fn refresh_relationship_values(
        &self,
        language: &str,
        values: &mut [MetadataValue],
        resolved: &ResolvedProperty,
    ) -> Result<usize> {
        let inheritance = resolved.inheritance();
        let mut targets: HashMap<String, Option<Entity>> = HashMap::new();
        let mut dangling = 0;

        for entry in values.iter_mut() {
            let Some(target_id) = entry.target().map(str::to_string) else {
                dangling += 1;
                if let Some(inheritance) = inheritance {
                    entry.set_inherited(&self.grant, Vec::new(), inheritance.effective_type);
                }
                continue;
            };

            let target = match targets.get(&target_id) {
                Some(cached) => cached.clone(),
                None => {
                    let loaded = self.store.get_entity(&target_id, language).await?;
                    targets.insert(target_id.clone(), loaded.clone());
                    loaded
                }
            };

            match (target, inheritance) {
                (None, inheritance) => {
                    // Label stays as last known; the inherited value collapses
                    dangling += 1;
                    log::warn!(
                        "Relationship value points at missing document {}/{}",
                        target_id,
                        language
                    );
                    if let Some(inheritance) = inheritance {
                        entry.set_inherited(&self.grant, Vec::new(), inheritance.effective_type);
                    }
                }
                (Some(source), Some(inheritance)) => {
                    entry.label = Some(source.title.clone());
                    entry.icon = source.icon.clone();
                    let inherited = self
                        .inherited_values(&source, &inheritance.source_property)
                        .await?;
                    entry.set_inherited(&self.grant, inherited, inheritance.effective_type);
                }
                (Some(source), None) => {
                    entry.label = Some(source.title.clone());
                    entry.icon = source.icon.clone();
                    entry.clear_inherited(&self.grant);
                }
            }
        }
        Ok(dangling)
    }

    /// Current values of `source_property` on `source`, with vocabulary
    /// labels read from the thesaurus store rather than the stored copy
    pub async fn inherited_values(
        &self,
        source: &Entity,
        source_property: &str,
    ) -> Result<Vec<MetadataValue>> {
        if source_property == TITLE_PROPERTY {
            return Ok(vec![MetadataValue::plain(source.title.clone())]);
        }

        let mut values = source.values(source_property).to_vec();
        if let Ok(ResolvedProperty::Vocabulary { thesaurus, .. }) =
            self.resolver.resolve(&source.template, source_property)
        {
            self.relabel(&thesaurus, &mut values).await?;
        }
        Ok(values)
    }

    async fn relabel(&self, thesaurus_id: &Id, values: &mut [MetadataValue]) -> Result<()> {
        for value in values.iter_mut() {
            let label = match value.value.as_str() {
                Some(entry_id) => self.store.get_label(thesaurus_id, entry_id).await?,
                None => None,
            };
            if label.is_none() {
                log::warn!(
                    "Vocabulary value {} not found in thesaurus {}",
                    value.value,
                    thesaurus_id
                );
            }
            value.label = label;
        }
        Ok(())
    }
}
