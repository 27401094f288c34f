use crate::model::{FieldType, Icon, Id, Language, MetadataValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field types understood by the search index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexFieldType {
    Text,
    Keyword,
    Double,
    Date,
    DateRange,
    GeoPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexField {
    #[serde(rename = "type")]
    pub field_type: IndexFieldType,
    pub sortable: bool,
}

impl IndexField {
    /// Index field used for a property of the given (effective) type
    pub fn for_type(field_type: FieldType) -> Self {
        let (index_type, sortable) = match field_type {
            FieldType::Text => (IndexFieldType::Text, true),
            FieldType::Markdown => (IndexFieldType::Text, false),
            FieldType::Numeric => (IndexFieldType::Double, true),
            FieldType::Date | FieldType::MultiDate => (IndexFieldType::Date, true),
            FieldType::DateRange => (IndexFieldType::DateRange, false),
            FieldType::Geolocation => (IndexFieldType::GeoPoint, false),
            FieldType::Link
            | FieldType::Select
            | FieldType::Multiselect
            | FieldType::Relationship => (IndexFieldType::Keyword, true),
        };
        Self {
            field_type: index_type,
            sortable,
        }
    }
}

/// Metadata property name -> index field
pub type IndexFieldMap = BTreeMap<String, IndexField>;

/// Entity document in index/query shape. Inheriting properties hold the
/// flattened content of their `inheritedValue` in `metadata`; the storage
/// shape of those properties travels in `denormalized` so results can be
/// turned back into entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    pub shared_id: Id,
    pub language: Language,
    pub template: Id,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Vec<MetadataValue>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub denormalized: BTreeMap<String, Vec<MetadataValue>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Id>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<Id>,
    #[serde(default)]
    pub filters: BTreeMap<String, Filter>,
    /// Metadata property (or "title") to sort ascending by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    /// Inclusive numeric range, for double and date fields
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<f64>,
    },
    /// Any of the given values
    Any(Vec<Value>),
    Match(Value),
}
