use itertools::Itertools;

use crate::error::PropagationError;
use crate::logic::inheritance::InheritanceResolver;
use crate::logic::propagation::Propagator;
use crate::logic::relationship_index::RelationshipIndex;
use crate::model::{PropagationReport, Thesaurus, Triple};
use crate::store::traits::{SearchIndex, Store};

/// Bring select/multiselect labels, and everything inheriting them, in line
/// with a saved thesaurus. Entries are diffed by id against `previous`; only
/// entries whose label changed or that were removed are followed.
pub async fn propagate_thesaurus_change<S: Store + ?Sized>(
    store: &S,
    resolver: &InheritanceResolver,
    index: &dyn SearchIndex,
    thesaurus: &Thesaurus,
    previous: Option<&Thesaurus>,
) -> Result<PropagationReport, PropagationError> {
    let changed = thesaurus.changed_entries(previous);
    if changed.is_empty() {
        log::debug!("Thesaurus {} saved without label changes", thesaurus.id);
        return Ok(PropagationReport::default());
    }
    log::info!(
        "Thesaurus {} changed {} entries: {}",
        thesaurus.id,
        changed.len(),
        changed.iter().join(", ")
    );

    let relationships = RelationshipIndex::new(store, resolver);
    let mut holders: Vec<Triple> = Vec::new();
    for entry in &changed {
        let found = relationships
            .find_vocabulary_holders(&thesaurus.id, entry)
            .await
            .map_err(|source| PropagationError::Read {
                triple: Triple::new(entry, "*", &thesaurus.id),
                source,
            })?;
        holders.extend(found);
    }
    let holders = holders.into_iter().unique().collect_vec();

    Propagator::new(store, resolver, index)
        .refresh_and_run(holders)
        .await
}
