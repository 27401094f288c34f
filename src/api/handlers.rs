use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{EngineError, IndexingError};
use crate::logic::{Engine, ReindexReport, WriteOutcome};
use crate::model::{
    Entity, EntityInput, Id, IndexFieldMap, Language, NewTemplate, PropagationReport,
    SearchQuery, Template, Thesaurus, UserContext,
};
use crate::store::traits::Store;

pub type AppState<S> = Arc<Engine<S>>;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Deserialize)]
pub struct LanguageQuery {
    pub language: Option<Language>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

fn error_response(error: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Invalid(_) => StatusCode::BAD_REQUEST,
        EngineError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Indexing(IndexingError::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::Indexing(_) => StatusCode::BAD_REQUEST,
        EngineError::Propagation(_) | EngineError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        log::error!("Request failed: {}", error);
    }
    (status, Json(ErrorResponse::new(&error.to_string())))
}

fn required_language(query: LanguageQuery) -> Result<Language, (StatusCode, Json<ErrorResponse>)> {
    query.language.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("language query parameter is required")),
        )
    })
}

// Templates

pub async fn list_templates<S: Store>(
    State(engine): State<AppState<S>>,
) -> ApiResult<ListResponse<Template>> {
    let templates = engine.list_templates().await.map_err(error_response)?;
    Ok(Json(templates.into()))
}

pub async fn get_template<S: Store>(
    State(engine): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<Template> {
    engine.get_template(&id).await.map(Json).map_err(error_response)
}

pub async fn create_template<S: Store>(
    State(engine): State<AppState<S>>,
    user: UserContext,
    Json(input): Json<NewTemplate>,
) -> Result<(StatusCode, Json<Template>), (StatusCode, Json<ErrorResponse>)> {
    let template = engine
        .save_template(input, &user.user_id)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template<S: Store>(
    State(engine): State<AppState<S>>,
    Path(id): Path<Id>,
    user: UserContext,
    Json(mut input): Json<NewTemplate>,
) -> ApiResult<Template> {
    input.id = Some(id);
    engine
        .save_template(input, &user.user_id)
        .await
        .map(Json)
        .map_err(error_response)
}

// Thesauri

pub async fn get_thesaurus<S: Store>(
    State(engine): State<AppState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<Thesaurus> {
    engine.get_thesaurus(&id).await.map(Json).map_err(error_response)
}

pub async fn save_thesaurus<S: Store>(
    State(engine): State<AppState<S>>,
    Path(id): Path<Id>,
    Json(mut thesaurus): Json<Thesaurus>,
) -> ApiResult<WriteOutcome<Thesaurus>> {
    thesaurus.id = id;
    engine
        .save_thesaurus(thesaurus)
        .await
        .map(Json)
        .map_err(error_response)
}

// Entities

pub async fn save_entity<S: Store>(
    State(engine): State<AppState<S>>,
    Json(input): Json<EntityInput>,
) -> ApiResult<WriteOutcome<Entity>> {
    engine.save_entity(input).await.map(Json).map_err(error_response)
}

pub async fn get_entity<S: Store>(
    State(engine): State<AppState<S>>,
    Path(shared_id): Path<Id>,
    Query(query): Query<LanguageQuery>,
) -> ApiResult<Entity> {
    let language = required_language(query)?;
    engine
        .get_entity(&shared_id, &language)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_entity<S: Store>(
    State(engine): State<AppState<S>>,
    Path(shared_id): Path<Id>,
    Query(query): Query<LanguageQuery>,
) -> ApiResult<WriteOutcome<Vec<Language>>> {
    engine
        .delete_entity(&shared_id, query.language.as_deref())
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn propagate_entity<S: Store>(
    State(engine): State<AppState<S>>,
    Path(shared_id): Path<Id>,
    Query(query): Query<LanguageQuery>,
) -> ApiResult<PropagationReport> {
    let language = required_language(query)?;
    engine
        .propagate_from(&shared_id, &language)
        .await
        .map(Json)
        .map_err(error_response)
}

// Search

pub async fn search<S: Store>(
    State(engine): State<AppState<S>>,
    Json(query): Json<SearchQuery>,
) -> ApiResult<ListResponse<Entity>> {
    let results = engine.search(&query).await.map_err(error_response)?;
    Ok(Json(results.into()))
}

pub async fn get_mapping<S: Store>(State(engine): State<AppState<S>>) -> ApiResult<IndexFieldMap> {
    engine.mapping().await.map(Json).map_err(error_response)
}

pub async fn reindex<S: Store>(State(engine): State<AppState<S>>) -> ApiResult<ReindexReport> {
    engine.reindex_all().await.map(Json).map_err(error_response)
}
