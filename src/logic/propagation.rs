use std::collections::{HashSet, VecDeque};

use crate::error::PropagationError;
use crate::logic::denormalize::{Denormalizer, Refresh};
use crate::logic::indexing::Indexer;
use crate::logic::inheritance::InheritanceResolver;
use crate::logic::relationship_index::RelationshipIndex;
use crate::model::{IndexFailure, PropagationReport, Triple};
use crate::store::traits::{SearchIndex, Store};

/// Runs propagation passes: breadth-first over referrer triples, each triple
/// recomputed at most once per pass from what is currently stored.
pub struct Propagator<'a, S: Store + ?Sized> {
    store: &'a S,
    resolver: &'a InheritanceResolver,
    indexer: Indexer<'a>,
    any_source_template: bool,
}

impl<'a, S: Store + ?Sized> Propagator<'a, S> {
    pub fn new(store: &'a S, resolver: &'a InheritanceResolver, index: &'a dyn SearchIndex) -> Self {
        Self {
            store,
            resolver,
            indexer: Indexer::new(index),
            any_source_template: false,
        }
    }

    /// Look up referrers of the seeds regardless of which template the seed
    /// entity has now. Needed when an entity changed template: relationships
    /// restricted to its previous template still point at it.
    pub fn any_source_template(mut self) -> Self {
        self.any_source_template = true;
        self
    }

    /// Propagate changes of already persisted seed triples to their referrers
    pub async fn run(&self, seeds: Vec<Triple>) -> Result<PropagationReport, PropagationError> {
        self.pass(seeds, false).await
    }

    /// Recompute and persist the seed triples themselves, then propagate
    /// from them. Used when the seeds' own derived values are stale, as with
    /// select values after a thesaurus change.
    pub async fn refresh_and_run(
        &self,
        seeds: Vec<Triple>,
    ) -> Result<PropagationReport, PropagationError> {
        self.pass(seeds, true).await
    }

    async fn pass(
        &self,
        seeds: Vec<Triple>,
        refresh_seeds: bool,
    ) -> Result<PropagationReport, PropagationError> {
        let mut report = PropagationReport::default();
        let mut visited: HashSet<Triple> = HashSet::new();
        let mut queue: VecDeque<Triple> = VecDeque::new();

        for seed in seeds {
            if visited.insert(seed.clone()) {
                queue.push_back(seed);
            }
        }
        let unscoped: HashSet<Triple> = if self.any_source_template {
            queue.iter().cloned().collect()
        } else {
            HashSet::new()
        };
        report.visited = queue.len();
        log::info!("Propagation pass started with {} seeds", queue.len());

        if refresh_seeds {
            for seed in queue.iter() {
                self.recompute(seed, &mut report).await?;
            }
        }

        let relationships = RelationshipIndex::new(self.store, self.resolver);
        while let Some(triple) = queue.pop_front() {
            let source = self
                .store
                .get_entity(&triple.shared_id, &triple.language)
                .await
                .map_err(|source| PropagationError::Read {
                    triple: triple.clone(),
                    source,
                })?;
            let source_template = source
                .as_ref()
                .map(|e| &e.template)
                .filter(|_| !unscoped.contains(&triple));

            let referrers = relationships
                .find_referrers(&triple.shared_id, source_template, Some(&triple.property))
                .await
                .map_err(|source| PropagationError::Read {
                    triple: triple.clone(),
                    source,
                })?;

            // Inherited values are language scoped
            for referrer in referrers {
                if referrer.language != triple.language || !visited.insert(referrer.clone()) {
                    continue;
                }
                report.visited += 1;
                log::debug!("Recomputing {} from {}", referrer, triple);
                self.recompute(&referrer, &mut report).await?;
                queue.push_back(referrer);
            }
        }

        log::info!(
            "Propagation pass finished: {} visited, {} updated, {} dangling",
            report.visited,
            report.updated.len(),
            report.dangling
        );
        Ok(report)
    }

    /// Recompute one triple, persisting and re-indexing the document if the
    /// stored value changed
    async fn recompute(
        &self,
        triple: &Triple,
        report: &mut PropagationReport,
    ) -> Result<Refresh, PropagationError> {
        let read_error = |source| PropagationError::Read {
            triple: triple.clone(),
            source,
        };

        let Some(mut entity) = self
            .store
            .get_entity(&triple.shared_id, &triple.language)
            .await
            .map_err(read_error)?
        else {
            return Ok(Refresh::default());
        };

        let resolved = self.resolver.resolve(&entity.template, &triple.property)?;
        let refresh = Denormalizer::new(self.store, self.resolver)
            .refresh_property(&mut entity, &triple.property, &resolved)
            .await
            .map_err(read_error)?;
        report.dangling += refresh.dangling;

        if !refresh.changed {
            return Ok(refresh);
        }

        let saved = self
            .store
            .upsert_entity(entity)
            .await
            .map_err(|source| PropagationError::Persistence {
                triple: triple.clone(),
                committed: report.updated.len(),
                source,
            })?;
        report.updated.push(triple.clone());

        if let Err(e) = self.indexer.index_entity(&saved).await {
            log::warn!("Failed to re-index {}: {}", triple, e);
            report.index_failures.push(IndexFailure {
                shared_id: saved.shared_id,
                language: saved.language,
                message: e.to_string(),
            });
        }
        Ok(refresh)
    }
}
