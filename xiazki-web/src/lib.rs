//! xiazki-web library - HTTP API for the xiazki book tracker

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use xiazki_common::config::ServerConfig;

pub mod api;
pub mod services;

use services::{Autofill, ProviderError};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Settings loaded from the root folder
    pub config: Arc<ServerConfig>,
    /// Metadata providers queried by book autofill
    pub autofill: Arc<Autofill>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, config: ServerConfig) -> Result<Self, ProviderError> {
        let autofill = Autofill::from_config(&config)?;

        Ok(Self {
            db,
            config: Arc::new(config),
            autofill: Arc::new(autofill),
        })
    }
}

/// Build application router
///
/// Everything under `/api` except register/login requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/auth/logout", post(api::auth::logout))
        .route("/api/profile", get(api::auth::get_profile))
        .route("/api/profile/password", post(api::auth::change_password))
        .route(
            "/api/books",
            get(api::books::list_books).post(api::books::create_book),
        )
        .route(
            "/api/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        .route("/api/authors/:id", get(api::books::get_author))
        .route("/api/autofill/:isbn", get(api::books::autofill))
        .route(
            "/api/books/:id/events",
            get(api::events::list_events).post(api::events::create_event),
        )
        .route("/api/events/:id", delete(api::events::delete_event))
        .route("/api/books/:id/review", post(api::reviews::submit_review))
        .route("/api/books/:id/rating", post(api::reviews::submit_rating))
        .route("/api/books/:id/opinions", get(api::reviews::list_opinions))
        .route("/api/books/:id/stats", get(api::reviews::get_stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/auth/register", post(api::auth::register))
        .route("/api/auth/login", post(api::auth::login))
        .merge(api::health_routes());

    // Combine routers
    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
