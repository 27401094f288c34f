use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::api::handlers::{self, AppState};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Templates
        .route(
            "/templates",
            get(handlers::list_templates::<S>).post(handlers::create_template::<S>),
        )
        .route(
            "/templates/:id",
            get(handlers::get_template::<S>).put(handlers::update_template::<S>),
        )
        // Thesauri
        .route(
            "/thesauri/:id",
            get(handlers::get_thesaurus::<S>).put(handlers::save_thesaurus::<S>),
        )
        // Entities
        .route("/entities", post(handlers::save_entity::<S>))
        .route(
            "/entities/:shared_id",
            get(handlers::get_entity::<S>).delete(handlers::delete_entity::<S>),
        )
        .route(
            "/entities/:shared_id/propagate",
            post(handlers::propagate_entity::<S>),
        )
        // Search index
        .route("/search", post(handlers::search::<S>))
        .route("/mapping", get(handlers::get_mapping::<S>))
        .route("/reindex", post(handlers::reindex::<S>))
        .layer(CorsLayer::permissive())
}
