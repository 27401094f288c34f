use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};

use crate::model::{Entity, Id, Template, Thesaurus};
use crate::store::traits::{EntityStore, TemplateStore, ThesaurusStore};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS templates (
        id TEXT PRIMARY KEY,
        doc JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS thesauri (
        id TEXT PRIMARY KEY,
        doc JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entities (
        shared_id TEXT NOT NULL,
        language TEXT NOT NULL,
        template TEXT NOT NULL,
        doc JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (shared_id, language)
    )
    "#,
    // Serves the relationship index containment lookups
    r#"
    CREATE INDEX IF NOT EXISTS entities_metadata_idx
        ON entities USING GIN ((doc -> 'metadata'))
    "#,
];

/// Entities, templates and thesauri stored as JSONB documents
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema")?;
        }
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn entity_from_row(row: &sqlx::postgres::PgRow) -> Result<Entity> {
    let Json(entity): Json<Entity> = row.try_get("doc").context("Failed to decode entity")?;
    Ok(entity)
}

#[async_trait::async_trait]
impl EntityStore for PostgresStore {
    async fn get_entity(&self, shared_id: &str, language: &str) -> Result<Option<Entity>> {
        let row = sqlx::query("SELECT doc FROM entities WHERE shared_id = $1 AND language = $2")
            .bind(shared_id)
            .bind(language)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch entity")?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(entity_from_row(&row)?))
    }

    async fn get_entity_documents(&self, shared_id: &str) -> Result<Vec<Entity>> {
        let rows = sqlx::query("SELECT doc FROM entities WHERE shared_id = $1 ORDER BY language")
            .bind(shared_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch entity documents")?;

        rows.iter().map(entity_from_row).collect()
    }

    async fn list_entities(&self) -> Result<Vec<Entity>> {
        let rows = sqlx::query("SELECT doc FROM entities ORDER BY shared_id, language")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list entities")?;

        rows.iter().map(entity_from_row).collect()
    }

    async fn upsert_entity(&self, entity: Entity) -> Result<Entity> {
        sqlx::query(
            r#"
            INSERT INTO entities (shared_id, language, template, doc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (shared_id, language) DO UPDATE SET
                template = EXCLUDED.template,
                doc = EXCLUDED.doc,
                updated_at = NOW()
            "#,
        )
        .bind(&entity.shared_id)
        .bind(&entity.language)
        .bind(&entity.template)
        .bind(Json(&entity))
        .execute(&self.pool)
        .await
        .context("Failed to upsert entity")?;

        Ok(entity)
    }

    async fn delete_entity(&self, shared_id: &str, language: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entities WHERE shared_id = $1 AND language = $2")
            .bind(shared_id)
            .bind(language)
            .execute(&self.pool)
            .await
            .context("Failed to delete entity")?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_metadata_value(
        &self,
        properties: &[String],
        value: &str,
    ) -> Result<Vec<Entity>> {
        if properties.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT doc FROM entities
            WHERE EXISTS (
                SELECT 1 FROM unnest($1::text[]) AS p(name)
                WHERE doc -> 'metadata' -> p.name
                    @> jsonb_build_array(jsonb_build_object('value', $2::text))
            )
            ORDER BY shared_id, language
            "#,
        )
        .bind(properties.to_vec())
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .context("Failed to find referencing entities")?;

        rows.iter().map(entity_from_row).collect()
    }
}

#[async_trait::async_trait]
impl TemplateStore for PostgresStore {
    async fn get_template(&self, id: &Id) -> Result<Option<Template>> {
        let row = sqlx::query("SELECT doc FROM templates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch template")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(template): Json<Template> =
            row.try_get("doc").context("Failed to decode template")?;
        Ok(Some(template))
    }

    async fn list_templates(&self) -> Result<Vec<Template>> {
        let rows = sqlx::query("SELECT doc FROM templates ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list templates")?;

        rows.iter()
            .map(|row| {
                let Json(template): Json<Template> =
                    row.try_get("doc").context("Failed to decode template")?;
                Ok(template)
            })
            .collect()
    }

    async fn upsert_template(&self, template: Template) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO templates (id, doc) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc, updated_at = NOW()
            "#,
        )
        .bind(&template.id)
        .bind(Json(&template))
        .execute(&self.pool)
        .await
        .context("Failed to upsert template")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ThesaurusStore for PostgresStore {
    async fn get_thesaurus(&self, id: &Id) -> Result<Option<Thesaurus>> {
        let row = sqlx::query("SELECT doc FROM thesauri WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch thesaurus")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(thesaurus): Json<Thesaurus> =
            row.try_get("doc").context("Failed to decode thesaurus")?;
        Ok(Some(thesaurus))
    }

    async fn upsert_thesaurus(&self, thesaurus: Thesaurus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO thesauri (id, doc) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc, updated_at = NOW()
            "#,
        )
        .bind(&thesaurus.id)
        .bind(Json(&thesaurus))
        .execute(&self.pool)
        .await
        .context("Failed to upsert thesaurus")?;

        Ok(())
    }
}
