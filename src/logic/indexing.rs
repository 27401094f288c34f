use std::collections::BTreeMap;

use crate::error::{EngineError, IndexingError, InheritanceError};
use crate::logic::inheritance::InheritanceResolver;
use crate::model::{
    Entity, IndexDocument, IndexFailure, IndexField, IndexFieldMap, MetadataValue,
};
use crate::store::traits::SearchIndex;

/// Index field for every template property. Inheriting properties get the
/// field of their effective type, so they filter and sort like the property
/// they denormalize.
pub fn project_schema(resolver: &InheritanceResolver) -> Result<IndexFieldMap, InheritanceError> {
    let mut mapping = IndexFieldMap::new();
    for template in resolver.templates() {
        for def in &template.properties {
            let resolved = resolver.resolve(&template.id, &def.name)?;
            let field = IndexField::for_type(resolved.effective_type());

            match mapping.get_mut(&def.name) {
                Some(existing) if existing.field_type != field.field_type => {
                    return Err(InheritanceError::ConflictingFieldTypes {
                        property: def.name.clone(),
                        first: existing.field_type,
                        second: field.field_type,
                    });
                }
                Some(existing) => existing.sortable &= field.sortable,
                None => {
                    mapping.insert(def.name.clone(), field);
                }
            }
        }
    }
    Ok(mapping)
}

/// Leaf values of an inheriting property, following chained inherited values
/// down to the first non-inheriting entries
fn flatten_inherited(values: &[MetadataValue], out: &mut Vec<MetadataValue>) {
    for value in values {
        match value.inherited_value() {
            Some(inherited) => flatten_inherited(inherited, out),
            None => out.push(value.clone()),
        }
    }
}

/// Storage shape -> index shape. Properties holding inherited values are
/// indexed by the inherited content; their stored values move to
/// `denormalized`. Depends only on the stored document.
pub fn to_index_shape(entity: &Entity) -> IndexDocument {
    let mut metadata = BTreeMap::new();
    let mut denormalized = BTreeMap::new();

    for (property, values) in &entity.metadata {
        if values.iter().any(MetadataValue::is_inheriting) {
            let mut leaves = Vec::new();
            for value in values.iter().filter_map(MetadataValue::inherited_value) {
                flatten_inherited(value, &mut leaves);
            }
            metadata.insert(property.clone(), leaves);
            denormalized.insert(property.clone(), values.clone());
        } else {
            metadata.insert(property.clone(), values.clone());
        }
    }

    IndexDocument {
        shared_id: entity.shared_id.clone(),
        language: entity.language.clone(),
        template: entity.template.clone(),
        title: entity.title.clone(),
        icon: entity.icon.clone(),
        metadata,
        denormalized,
        created_at: entity.created_at,
        updated_at: entity.updated_at,
    }
}

/// Index shape -> storage shape
pub fn from_index_shape(document: IndexDocument) -> Entity {
    let mut metadata = document.metadata;
    metadata.extend(document.denormalized);

    Entity {
        shared_id: document.shared_id,
        language: document.language,
        template: document.template,
        title: document.title,
        icon: document.icon,
        metadata,
        created_at: document.created_at,
        updated_at: document.updated_at,
    }
}

/// Outcome of re-indexing every stored document
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ReindexReport {
    pub indexed: usize,
    pub failures: Vec<IndexFailure>,
}

/// Writes entities to the search index in index shape
pub struct Indexer<'a> {
    index: &'a dyn SearchIndex,
}

impl<'a> Indexer<'a> {
    pub fn new(index: &'a dyn SearchIndex) -> Self {
        Self { index }
    }

    pub async fn index_entity(&self, entity: &Entity) -> Result<(), IndexingError> {
        self.index.index_document(to_index_shape(entity)).await
    }

    pub async fn remove(&self, shared_id: &str, language: &str) -> Result<(), IndexingError> {
        self.index.delete_document(shared_id, language).await
    }

    /// Project the schema and publish it to the index
    pub async fn refresh_mapping(
        &self,
        resolver: &InheritanceResolver,
    ) -> Result<IndexFieldMap, EngineError> {
        let mapping = project_schema(resolver)?;
        self.index.put_mapping(mapping.clone()).await?;
        log::info!("Published index mapping with {} fields", mapping.len());
        Ok(mapping)
    }

    /// Rebuild the index from stored documents. Values are taken as stored,
    /// nothing is re-derived.
    pub async fn reindex_all(&self, entities: Vec<Entity>) -> Result<ReindexReport, IndexingError> {
        self.index.clear().await?;

        let mut report = ReindexReport::default();
        for entity in entities {
            match self.index_entity(&entity).await {
                Ok(()) => report.indexed += 1,
                Err(e) => {
                    log::warn!(
                        "Failed to index {}/{}: {}",
                        entity.shared_id,
                        entity.language,
                        e
                    );
                    report.failures.push(IndexFailure {
                        shared_id: entity.shared_id,
                        language: entity.language,
                        message: e.to_string(),
                    });
                }
            }
        }
        log::info!(
            "Reindexed {} documents ({} failures)",
            report.indexed,
            report.failures.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DerivedFields, FieldType, IndexFieldType, InheritDef, NewTemplate, PropertyDef,
        PropertyKind, Template,
    };
    use chrono::Utc;
    use serde_json::json;

    fn template(id: &str, properties: Vec<PropertyDef>) -> Template {
        Template::from_new(
            NewTemplate {
                id: Some(id.to_string()),
                name: id.to_string(),
                properties,
            },
            "test".to_string(),
        )
    }

    fn inherit(name: &str, target: &str, property: &str) -> PropertyDef {
        PropertyDef::new(
            name,
            PropertyKind::Relationship {
                content: Some(target.to_string()),
                inherit: Some(InheritDef {
                    property: property.to_string(),
                }),
            },
        )
    }

    #[test]
    fn test_inheriting_property_projects_effective_type() {
        let resolver = InheritanceResolver::new(vec![
            template("a", vec![inherit("judge_born", "b", "born")]),
            template("b", vec![PropertyDef::new("born", PropertyKind::Date)]),
        ]);

        let mapping = project_schema(&resolver).unwrap();
        assert_eq!(mapping["judge_born"], mapping["born"]);
        assert_eq!(mapping["judge_born"].field_type, IndexFieldType::Date);
    }

    #[test]
    fn test_conflicting_field_types_across_templates() {
        let resolver = InheritanceResolver::new(vec![
            template("a", vec![PropertyDef::new("value", PropertyKind::Numeric)]),
            template("b", vec![PropertyDef::new("value", PropertyKind::Text)]),
        ]);

        assert!(matches!(
            project_schema(&resolver),
            Err(InheritanceError::ConflictingFieldTypes { .. })
        ));
    }

    #[test]
    fn test_index_shape_flattens_chained_values() {
        let grant = DerivedFields::grant();
        let mut leaf_holder = MetadataValue::labeled("C1", "C1");
        leaf_holder.set_inherited(&grant, vec![MetadataValue::plain(42)], FieldType::Numeric);
        let mut entry = MetadataValue::labeled("B1", "B1");
        entry.set_inherited(&grant, vec![leaf_holder], FieldType::Numeric);

        let mut metadata = BTreeMap::new();
        metadata.insert("to_b".to_string(), vec![entry.clone()]);
        metadata.insert("plain".to_string(), vec![MetadataValue::plain("x")]);
        let entity = Entity {
            shared_id: "A1".to_string(),
            language: "en".to_string(),
            template: "a".to_string(),
            title: "A1".to_string(),
            icon: None,
            metadata,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let document = to_index_shape(&entity);
        assert_eq!(document.metadata["to_b"], vec![MetadataValue::plain(json!(42))]);
        assert_eq!(document.metadata["plain"], vec![MetadataValue::plain("x")]);
        assert_eq!(document.denormalized["to_b"], vec![entry]);

        assert_eq!(from_index_shape(document), entity);
    }
}
