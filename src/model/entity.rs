use crate::model::{FieldType, Id, Language, TITLE_PROPERTY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Default timestamp for documents stored before audit fields existed
fn default_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap_or_else(Utc::now)
}

/// One language document of a logical entity. Documents of the same entity
/// share `shared_id` and are stored independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub shared_id: Id,
    pub language: Language,
    pub template: Id,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Vec<MetadataValue>>,

    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    #[serde(rename = "_id")]
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Stored metadata value.
///
/// `value`/`label`/`icon` are what a plain, select or relationship value
/// shows. `inheritedValue` and `inheritedType` are owned by the
/// denormalization engine: they can be read by anyone but only written with a
/// [`DerivedFields`] capability, which is never handed out to user-facing code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataValue {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inherited_value: Option<Vec<MetadataValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inherited_type: Option<FieldType>,
}

/// Write access to the engine-owned fields of [`MetadataValue`]
#[derive(Debug)]
pub struct DerivedFields {
    _sealed: (),
}

impl DerivedFields {
    pub(crate) fn grant() -> Self {
        Self { _sealed: () }
    }
}

impl MetadataValue {
    pub fn plain(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            label: None,
            icon: None,
            inherited_value: None,
            inherited_type: None,
        }
    }

    pub fn labeled(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::plain(value)
        }
    }

    /// Shared id this value points at, when it is a relationship value
    pub fn target(&self) -> Option<&str> {
        self.value.as_str()
    }

    pub fn inherited_value(&self) -> Option<&[MetadataValue]> {
        self.inherited_value.as_deref()
    }

    pub fn inherited_type(&self) -> Option<FieldType> {
        self.inherited_type
    }

    /// True once the engine has denormalized a source value into this entry
    pub fn is_inheriting(&self) -> bool {
        self.inherited_value.is_some()
    }

    pub fn set_inherited(
        &mut self,
        _grant: &DerivedFields,
        values: Vec<MetadataValue>,
        field_type: FieldType,
    ) {
        self.inherited_value = Some(values);
        self.inherited_type = Some(field_type);
    }

    pub fn clear_inherited(&mut self, _grant: &DerivedFields) {
        self.inherited_value = None;
        self.inherited_type = None;
    }
}

/// Metadata value as submitted by users: engine-owned fields cannot be expressed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserValue {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl UserValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            label: None,
        }
    }

    pub fn into_metadata_value(self) -> MetadataValue {
        MetadataValue {
            label: self.label,
            ..MetadataValue::plain(self.value)
        }
    }
}

/// Entity save request. Omitted fields keep their previous value, and only the
/// metadata properties present are replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_id: Option<Id>,
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Vec<UserValue>>,
}

impl EntityInput {
    pub fn new(language: &str) -> Self {
        Self {
            shared_id: None,
            language: language.to_string(),
            template: None,
            title: None,
            icon: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Merge this input over the previous document (if any). Derived fields of
    /// replaced properties are dropped; the engine recomputes them.
    pub fn merge_into(self, shared_id: Id, template: Id, previous: Option<&Entity>) -> Entity {
        let now = Utc::now();
        let mut entity = match previous {
            Some(prev) => prev.clone(),
            None => Entity {
                shared_id: shared_id.clone(),
                language: self.language.clone(),
                template: template.clone(),
                title: String::new(),
                icon: None,
                metadata: BTreeMap::new(),
                created_at: now,
                updated_at: now,
            },
        };

        entity.template = template;
        if let Some(title) = self.title {
            entity.title = title;
        }
        if self.icon.is_some() {
            entity.icon = self.icon;
        }
        for (property, values) in self.metadata {
            entity.metadata.insert(
                property,
                values
                    .into_iter()
                    .map(UserValue::into_metadata_value)
                    .collect(),
            );
        }
        entity.updated_at = now;
        entity
    }
}

impl Entity {
    pub fn values(&self, property: &str) -> &[MetadataValue] {
        self.metadata
            .get(property)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Properties whose stored value differs from `previous`. Title and icon
    /// changes are reported as the synthetic `title` property. Everything
    /// counts as changed for a first save.
    pub fn changed_properties(&self, previous: Option<&Entity>) -> Vec<String> {
        let Some(previous) = previous else {
            let mut all = vec![TITLE_PROPERTY.to_string()];
            all.extend(self.metadata.keys().cloned());
            return all;
        };

        let mut changed = Vec::new();
        if self.title != previous.title || self.icon != previous.icon {
            changed.push(TITLE_PROPERTY.to_string());
        }

        let keys: BTreeSet<&String> = self
            .metadata
            .keys()
            .chain(previous.metadata.keys())
            .collect();
        for key in keys {
            if self.metadata.get(key) != previous.metadata.get(key) {
                changed.push(key.clone());
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(title: &str, metadata: Vec<(&str, Vec<MetadataValue>)>) -> Entity {
        Entity {
            shared_id: "e1".to_string(),
            language: "en".to_string(),
            template: "t".to_string(),
            title: title.to_string(),
            icon: None,
            metadata: metadata
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_relationship_value_storage_shape() {
        let mut value = MetadataValue::labeled("B1", "Judge Dredd");
        value.set_inherited(
            &DerivedFields::grant(),
            vec![MetadataValue::plain("bio")],
            FieldType::Text,
        );

        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            json!({
                "value": "B1",
                "label": "Judge Dredd",
                "inheritedValue": [{"value": "bio"}],
                "inheritedType": "text"
            })
        );

        let parsed: MetadataValue = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_unresolved_inherited_value_is_never_null() {
        let value = MetadataValue::labeled("B1", "B1");
        let json = serde_json::to_string(&value).unwrap();
        assert!(!json.contains("inheritedValue"));
        assert!(!json.contains("null"));

        let parsed: MetadataValue =
            serde_json::from_str(r#"{"value": "B1", "inheritedValue": null}"#).unwrap();
        assert!(parsed.inherited_value().is_none());
    }

    #[test]
    fn test_user_input_cannot_carry_inherited_value() {
        let input: EntityInput = serde_json::from_value(json!({
            "language": "en",
            "title": "A1",
            "metadata": {
                "judge": [{"value": "B1", "inheritedValue": [{"value": "forged"}]}]
            }
        }))
        .unwrap();

        let entity = input.merge_into("A1".to_string(), "t".to_string(), None);
        assert!(!entity.values("judge")[0].is_inheriting());
    }

    #[test]
    fn test_merge_keeps_untouched_properties() {
        let previous = entity(
            "old",
            vec![
                ("a", vec![MetadataValue::plain("1")]),
                ("b", vec![MetadataValue::plain("2")]),
            ],
        );
        let mut input = EntityInput::new("en");
        input.metadata.insert("b".to_string(), vec![UserValue::new("3")]);

        let merged = input.merge_into("e1".to_string(), "t".to_string(), Some(&previous));
        assert_eq!(merged.title, "old");
        assert_eq!(merged.values("a"), &[MetadataValue::plain("1")]);
        assert_eq!(merged.values("b"), &[MetadataValue::plain("3")]);
        assert_eq!(merged.created_at, previous.created_at);
    }

    #[test]
    fn test_changed_properties() {
        let previous = entity("t", vec![("a", vec![MetadataValue::plain("1")])]);
        let same = previous.clone();
        assert!(same.changed_properties(Some(&previous)).is_empty());

        let mut renamed = previous.clone();
        renamed.title = "new".to_string();
        renamed
            .metadata
            .insert("b".to_string(), vec![MetadataValue::plain("x")]);
        assert_eq!(
            renamed.changed_properties(Some(&previous)),
            vec!["title".to_string(), "b".to_string()]
        );

        assert_eq!(
            previous.changed_properties(None),
            vec!["title".to_string(), "a".to_string()]
        );
    }
}
