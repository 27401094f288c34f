use anyhow::Result;
use itertools::Itertools;

use crate::logic::inheritance::{Dependent, InheritanceResolver};
use crate::model::{Id, Triple, TITLE_PROPERTY};
use crate::store::traits::EntityStore;

/// Answers "who points at this entity" from the entity documents themselves.
/// Relationship values are the edges, so no separate adjacency store exists
/// and lookups are filtered metadata queries against the entity store.
pub struct RelationshipIndex<'a, S: EntityStore + ?Sized> {
    store: &'a S,
    resolver: &'a InheritanceResolver,
}

impl<'a, S: EntityStore + ?Sized> RelationshipIndex<'a, S> {
    pub fn new(store: &'a S, resolver: &'a InheritanceResolver) -> Self {
        Self { store, resolver }
    }

    /// Referrer triples, in every language, whose relationship values point at
    /// `shared_id` and depend on `source_property` of it. Without a source
    /// property every relationship that can point at the entity is returned.
    pub async fn find_referrers(
        &self,
        shared_id: &str,
        source_template: Option<&Id>,
        source_property: Option<&str>,
    ) -> Result<Vec<Triple>> {
        let property = source_property.unwrap_or(TITLE_PROPERTY);
        let dependents = self.resolver.dependents_of(source_template, property);
        self.lookup(shared_id, &dependents).await
    }

    /// Select/multiselect values, in every language, holding `entry_id` of `thesaurus`
    pub async fn find_vocabulary_holders(&self, thesaurus: &Id, entry_id: &str) -> Result<Vec<Triple>> {
        let dependents = self.resolver.vocabulary_properties(thesaurus);
        self.lookup(entry_id, &dependents).await
    }

    async fn lookup(&self, value: &str, dependents: &[Dependent]) -> Result<Vec<Triple>> {
        if dependents.is_empty() {
            return Ok(Vec::new());
        }

        let names = dependents
            .iter()
            .map(|d| d.property.clone())
            .unique()
            .collect_vec();
        let entities = self.store.find_by_metadata_value(&names, value).await?;

        let referrers = entities
            .iter()
            .flat_map(move |entity| {
                dependents
                    .iter()
                    .filter(move |d| d.template == entity.template)
                    .filter(move |d| {
                        entity
                            .values(&d.property)
                            .iter()
                            .any(|v| v.target() == Some(value))
                    })
                    .map(move |d| Triple::new(&entity.shared_id, &entity.language, &d.property))
            })
            .unique()
            .collect_vec();

        log::debug!(
            "{} referrer triples for '{}' across {} properties",
            referrers.len(),
            value,
            names.len()
        );
        Ok(referrers)
    }
}
