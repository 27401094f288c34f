use crate::model::{FieldType, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default user for templates stored before audit fields existed
fn default_user() -> String {
    "legacy-user".to_string()
}

/// Default timestamp for templates stored before audit fields existed
fn default_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap_or_else(Utc::now)
}

/// Schema of one kind of entity: an ordered list of property definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Unique identifier for this template
    pub id: Id,

    /// Display name (e.g., "Judge", "Court order")
    pub name: String,

    /// Metadata properties, in display order
    pub properties: Vec<PropertyDef>,

    #[serde(default = "default_user")]
    pub created_by: String,
    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_user")]
    pub updated_by: String,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Template input model for creation and replacement
/// The ID can be provided by the user or will be generated server-side if not provided
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub id: Id,
    /// Key used in entity metadata (e.g., "judge", "date_of_birth")
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub kind: PropertyKind,
}

/// What a property holds. Relationship properties with `inherit` set are
/// inheriting properties: they denormalize `inherit.property` from whichever
/// entity each of their values points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PropertyKind {
    Text,
    Markdown,
    Numeric,
    Date,
    DateRange,
    MultiDate,
    Link,
    Geolocation,
    Select {
        /// Thesaurus id
        content: Id,
    },
    Multiselect {
        content: Id,
    },
    Relationship {
        /// Target template; `None` accepts entities of any template
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Id>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inherit: Option<InheritDef>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritDef {
    /// Name of the property denormalized from the target entity
    pub property: String,
}

impl PropertyDef {
    pub fn new(name: &str, kind: PropertyKind) -> Self {
        Self {
            id: name.to_string(),
            name: name.to_string(),
            label: name.to_string(),
            kind,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match &self.kind {
            PropertyKind::Text => FieldType::Text,
            PropertyKind::Markdown => FieldType::Markdown,
            PropertyKind::Numeric => FieldType::Numeric,
            PropertyKind::Date => FieldType::Date,
            PropertyKind::DateRange => FieldType::DateRange,
            PropertyKind::MultiDate => FieldType::MultiDate,
            PropertyKind::Link => FieldType::Link,
            PropertyKind::Geolocation => FieldType::Geolocation,
            PropertyKind::Select { .. } => FieldType::Select,
            PropertyKind::Multiselect { .. } => FieldType::Multiselect,
            PropertyKind::Relationship { .. } => FieldType::Relationship,
        }
    }

    pub fn inherit(&self) -> Option<&InheritDef> {
        match &self.kind {
            PropertyKind::Relationship { inherit, .. } => inherit.as_ref(),
            _ => None,
        }
    }

    /// Thesaurus backing a select/multiselect property
    pub fn thesaurus(&self) -> Option<&Id> {
        match &self.kind {
            PropertyKind::Select { content } | PropertyKind::Multiselect { content } => {
                Some(content)
            }
            _ => None,
        }
    }

    /// Whether a relationship property accepts entities of `template_id`.
    /// An unknown template (deleted source) matches every relationship.
    pub fn accepts_template(&self, template_id: Option<&Id>) -> bool {
        match (&self.kind, template_id) {
            (PropertyKind::Relationship { content: None, .. }, _) => true,
            (PropertyKind::Relationship { .. }, None) => true,
            (PropertyKind::Relationship { content: Some(c), .. }, Some(t)) => c == t,
            _ => false,
        }
    }
}

impl Template {
    /// Create a Template from NewTemplate with audit information
    pub fn from_new(new_template: NewTemplate, user_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: new_template.id.unwrap_or_else(crate::model::generate_id),
            name: new_template.name,
            properties: new_template.properties,
            created_by: user_id.clone(),
            created_at: now,
            updated_by: user_id,
            updated_at: now,
        }
    }

    /// Replace definitions from a NewTemplate, preserving created_by/created_at
    pub fn apply_update(&mut self, update: NewTemplate, user_id: String) {
        self.name = update.name;
        self.properties = update.properties;
        self.updated_by = user_id;
        self.updated_at = Utc::now();
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }
}
