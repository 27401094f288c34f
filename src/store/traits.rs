use crate::error::IndexingError;
use crate::model::{Entity, Id, IndexDocument, IndexFieldMap, SearchQuery, Template, Thesaurus};
use anyhow::Result;

/// Per-language entity documents. Every write is atomic for one document.
#[async_trait::async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_entity(&self, shared_id: &str, language: &str) -> Result<Option<Entity>>;
    /// All language documents of one entity
    async fn get_entity_documents(&self, shared_id: &str) -> Result<Vec<Entity>>;
    async fn list_entities(&self) -> Result<Vec<Entity>>;
    async fn upsert_entity(&self, entity: Entity) -> Result<Entity>;
    async fn delete_entity(&self, shared_id: &str, language: &str) -> Result<bool>;
    /// Documents, in every language, holding a metadata value equal to
    /// `value` under any of `properties`
    async fn find_by_metadata_value(&self, properties: &[String], value: &str)
        -> Result<Vec<Entity>>;
}

#[async_trait::async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, id: &Id) -> Result<Option<Template>>;
    async fn list_templates(&self) -> Result<Vec<Template>>;
    async fn upsert_template(&self, template: Template) -> Result<()>;
}

#[async_trait::async_trait]
pub trait ThesaurusStore: Send + Sync {
    async fn get_thesaurus(&self, id: &Id) -> Result<Option<Thesaurus>>;
    async fn upsert_thesaurus(&self, thesaurus: Thesaurus) -> Result<()>;

    async fn get_label(&self, thesaurus_id: &Id, entry_id: &str) -> Result<Option<String>> {
        Ok(self
            .get_thesaurus(thesaurus_id)
            .await?
            .and_then(|t| t.label(entry_id).map(str::to_string)))
    }
}

pub trait Store: EntityStore + TemplateStore + ThesaurusStore + Send + Sync {}
impl<T: EntityStore + TemplateStore + ThesaurusStore + Send + Sync> Store for T {}

/// Search engine fed with documents in index shape
#[async_trait::async_trait]
pub trait SearchIndex: Send + Sync {
    async fn put_mapping(&self, mapping: IndexFieldMap) -> Result<(), IndexingError>;
    async fn get_mapping(&self) -> Result<IndexFieldMap, IndexingError>;
    async fn index_document(&self, document: IndexDocument) -> Result<(), IndexingError>;
    async fn delete_document(&self, shared_id: &str, language: &str)
        -> Result<(), IndexingError>;
    async fn search(&self, query: &SearchQuery) -> Result<Vec<IndexDocument>, IndexingError>;
    async fn clear(&self) -> Result<(), IndexingError>;
}
