use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

/// Language key of a per-language entity document (e.g. "en", "es")
pub type Language = String;

/// Name of the synthetic property that stands for an entity's title
pub const TITLE_PROPERTY: &str = "title";

/// Declared type of a template property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Markdown,
    Numeric,
    Date,
    DateRange,
    MultiDate,
    Link,
    Geolocation,
    Select,
    Multiselect,
    Relationship,
}

impl FieldType {
    /// Select and multiselect values are vocabulary entry ids
    pub fn is_vocabulary(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Multiselect)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Markdown => "markdown",
            FieldType::Numeric => "numeric",
            FieldType::Date => "date",
            FieldType::DateRange => "daterange",
            FieldType::MultiDate => "multidate",
            FieldType::Link => "link",
            FieldType::Geolocation => "geolocation",
            FieldType::Select => "select",
            FieldType::Multiselect => "multiselect",
            FieldType::Relationship => "relationship",
        };
        write!(f, "{}", name)
    }
}

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}
