#![allow(dead_code)]

use anyhow::{bail, Result};
use denorm_db::store::{EntityStore, TemplateStore, ThesaurusStore};
use denorm_db::{
    Engine, Entity, EntityInput, Icon, Id, InheritDef, MemoryIndex, MemoryStore, NewTemplate,
    PropertyDef, PropertyKind, Template, Thesaurus, ThesaurusEntry, UserValue, WriteOutcome,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

pub struct TestContext {
    pub engine: Engine<MemoryStore>,
    pub index: Arc<MemoryIndex>,
}

pub fn context() -> TestContext {
    let index = Arc::new(MemoryIndex::new());
    let engine = Engine::new(Arc::new(MemoryStore::new()), index.clone());
    TestContext { engine, index }
}

pub fn text(name: &str) -> PropertyDef {
    PropertyDef::new(name, PropertyKind::Text)
}

pub fn relationship(name: &str, target: &str) -> PropertyDef {
    PropertyDef::new(
        name,
        PropertyKind::Relationship {
            content: Some(target.to_string()),
            inherit: None,
        },
    )
}

pub fn inherit(name: &str, target: &str, property: &str) -> PropertyDef {
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

pub fn multiselect(name: &str, thesaurus: &str) -> PropertyDef {
    PropertyDef::new(
        name,
        PropertyKind::Multiselect {
            content: thesaurus.to_string(),
        },
    )
}

pub fn thesaurus(id: &str, entries: &[(&str, &str)]) -> Thesaurus {
    Thesaurus {
        id: id.to_string(),
        name: id.to_string(),
        values: entries
            .iter()
            .map(|(id, label)| ThesaurusEntry {
                id: id.to_string(),
                label: label.to_string(),
            })
            .collect(),
    }
}

pub fn icon(id: &str) -> Icon {
    Icon {
        id: id.to_string(),
        label: format!("{} label", id),
        kind: "Icons".to_string(),
    }
}

pub async fn save_templates(ctx: &TestContext, templates: Vec<(&str, Vec<PropertyDef>)>) {
    for (id, properties) in templates {
        ctx.engine
            .save_template(
                NewTemplate {
                    id: Some(id.to_string()),
                    name: id.to_string(),
                    properties,
                },
                "test",
            )
            .await
            .unwrap();
    }
}

fn input(shared_id: &str, language: &str, metadata: Vec<(&str, Vec<Value>)>) -> EntityInput {
    let mut input = EntityInput::new(language);
    input.shared_id = Some(shared_id.to_string());
    for (property, values) in metadata {
        input.metadata.insert(
            property.to_string(),
            values.into_iter().map(UserValue::new).collect(),
        );
    }
    input
}

/// Create a document titled after its shared id
pub async fn create(
    ctx: &TestContext,
    shared_id: &str,
    language: &str,
    template: &str,
    metadata: Vec<(&str, Vec<Value>)>,
) -> WriteOutcome<Entity> {
    let mut input = input(shared_id, language, metadata);
    input.template = Some(template.to_string());
    input.title = Some(shared_id.to_string());
    ctx.engine.save_entity(input).await.unwrap()
}

/// Update an existing document; only the given properties are replaced
pub async fn modify(
    ctx: &TestContext,
    shared_id: &str,
    language: &str,
    title: Option<&str>,
    metadata: Vec<(&str, Vec<Value>)>,
) -> WriteOutcome<Entity> {
    let mut input = input(shared_id, language, metadata);
    input.title = title.map(str::to_string);
    ctx.engine.save_entity(input).await.unwrap()
}

pub async fn get(ctx: &TestContext, shared_id: &str, language: &str) -> Entity {
    ctx.engine.get_entity(shared_id, language).await.unwrap()
}

/// Stored JSON of one metadata property
pub fn metadata_json(entity: &Entity, property: &str) -> Value {
    serde_json::to_value(entity.values(property)).unwrap()
}

/// `inheritedValue` of every entry of a property
pub fn inherited(entity: &Entity, property: &str) -> Vec<Value> {
    entity
        .values(property)
        .iter()
        .map(|v| serde_json::to_value(v.inherited_value().unwrap_or(&[])).unwrap())
        .collect()
}

/// Memory store whose entity writes fail for one shared id once armed. Template
/// reads and writes yield to the scheduler so concurrent saves interleave.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: RwLock<Option<String>>,
}

impl FlakyStore {
    pub fn fail_writes_of(&self, shared_id: Option<&str>) {
        *self.failing.write() = shared_id.map(str::to_string);
    }
}

#[async_trait::async_trait]
impl EntityStore for FlakyStore {
    async fn get_entity(&self, shared_id: &str, language: &str) -> Result<Option<Entity>> {
        self.inner.get_entity(shared_id, language).await
    }

    async fn get_entity_documents(&self, shared_id: &str) -> Result<Vec<Entity>> {
        self.inner.get_entity_documents(shared_id).await
    }

    async fn list_entities(&self) -> Result<Vec<Entity>> {
        self.inner.list_entities().await
    }

    async fn upsert_entity(&self, entity: Entity) -> Result<Entity> {
        if self.failing.read().as_deref() == Some(entity.shared_id.as_str()) {
            bail!("connection reset while writing {}", entity.shared_id);
        }
        self.inner.upsert_entity(entity).await
    }

    async fn delete_entity(&self, shared_id: &str, language: &str) -> Result<bool> {
        self.inner.delete_entity(shared_id, language).await
    }

    async fn find_by_metadata_value(
        &self,
        properties: &[String],
        value: &str,
    ) -> Result<Vec<Entity>> {
        self.inner.find_by_metadata_value(properties, value).await
    }
}

#[async_trait::async_trait]
impl TemplateStore for FlakyStore {
    async fn get_template(&self, id: &Id) -> Result<Option<Template>> {
        tokio::task::yield_now().await;
        self.inner.get_template(id).await
    }

    async fn list_templates(&self) -> Result<Vec<Template>> {
        tokio::task::yield_now().await;
        self.inner.list_templates().await
    }

    async fn upsert_template(&self, template: Template) -> Result<()> {
        tokio::task::yield_now().await;
        self.inner.upsert_template(template).await
    }
}

#[async_trait::async_trait]
impl ThesaurusStore for FlakyStore {
    async fn get_thesaurus(&self, id: &Id) -> Result<Option<Thesaurus>> {
        self.inner.get_thesaurus(id).await
    }

    async fn upsert_thesaurus(&self, thesaurus: Thesaurus) -> Result<()> {
        self.inner.upsert_thesaurus(thesaurus).await
    }
}
