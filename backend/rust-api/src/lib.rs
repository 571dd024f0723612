use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use services::AppState;

// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    let api = Router::new()
        .nest("/materials", materials_routes(&app_state))
        .nest("/summaries", summaries_routes())
        .nest("/quizzes", quizzes_routes())
        .route("/progress/{material_id}", get(handlers::progress::get_progress))
        .route("/assistant/chat", post(handlers::assistant::chat))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest("/api/v1", api)
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn materials_routes(app_state: &AppState) -> Router<Arc<AppState>> {
    let body_limit = usize::try_from(app_state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route(
            "/upload",
            post(handlers::materials::upload_material).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/", get(handlers::materials::list_materials))
        .route("/{id}", get(handlers::materials::get_material))
}

fn summaries_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/generate/{material_id}",
            post(handlers::summaries::generate_summary),
        )
        .route("/{material_id}", get(handlers::summaries::get_summary))
}

fn quizzes_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/generate/{material_id}",
            post(handlers::quizzes::generate_quiz),
        )
        .route("/submit/{quiz_id}", post(handlers::quizzes::submit_quiz))
        .route("/{material_id}", get(handlers::quizzes::get_quiz))
}
