use crate::model::{Id, Language};
use serde::{Deserialize, Serialize};

/// Unit of recomputation: one property of one language document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triple {
    pub shared_id: Id,
    pub language: Language,
    pub property: String,
}

impl Triple {
    pub fn new(shared_id: &str, language: &str, property: &str) -> Self {
        Self {
            shared_id: shared_id.to_string(),
            language: language.to_string(),
            property: property.to_string(),
        }
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}.{}", self.shared_id, self.language, self.property)
    }
}

/// Summary of one propagation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropagationReport {
    /// Seeds plus every referrer triple recomputed in the pass
    pub visited: usize,
    /// Referrer triples whose stored value changed and was persisted
    pub updated: Vec<Triple>,
    /// Relationship values whose target document does not exist
    pub dangling: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index_failures: Vec<IndexFailure>,
}

/// A document that was persisted but could not be re-indexed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFailure {
    pub shared_id: Id,
    pub language: Language,
    pub message: String,
}

impl PropagationReport {
    pub fn merge(&mut self, other: PropagationReport) {
        self.visited += other.visited;
        self.updated.extend(other.updated);
        self.dangling += other.dangling;
        self.index_failures.extend(other.index_failures);
    }
}
