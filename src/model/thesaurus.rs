use crate::model::Id;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Controlled vocabulary backing select/multiselect properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thesaurus {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub values: Vec<ThesaurusEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThesaurusEntry {
    pub id: Id,
    pub label: String,
}

impl Thesaurus {
    pub fn label(&self, entry_id: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|e| e.id == entry_id)
            .map(|e| e.label.as_str())
    }

    /// Entry ids whose label differs from `previous`, including entries that
    /// were removed. Added entries cannot be referenced yet and are skipped.
    pub fn changed_entries(&self, previous: Option<&Thesaurus>) -> Vec<Id> {
        let Some(previous) = previous else {
            return Vec::new();
        };

        let current: HashMap<&str, &str> = self
            .values
            .iter()
            .map(|e| (e.id.as_str(), e.label.as_str()))
            .collect();

        previous
            .values
            .iter()
            .filter(|old| current.get(old.id.as_str()) != Some(&old.label.as_str()))
            .map(|old| old.id.clone())
            .collect()
    }
}
