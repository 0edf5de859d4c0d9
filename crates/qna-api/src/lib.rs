//! QnA API - HTTP service answering questions about uploaded documents
//!
//! `POST /qna/` takes a questions file and a document and returns the answers
//! keyed by question. Health checks live under `/health`, `/ready` and `/metrics`;
//! interactive docs under `/docs/`.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use qna_core::AppConfig;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Document QnA API",
        description = "Answer a list of questions from the content of an uploaded document"
    ),
    paths(
        handlers::qna::qna_handler,
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::health::metrics,
    ),
    components(schemas(
        error::ApiError,
        handlers::qna::QnaUpload,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
        handlers::health::MetricsResponse,
    )),
    tags(
        (name = "qna", description = "Document question answering"),
        (name = "health", description = "Health checks and counters")
    )
)]
pub struct ApiDoc;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_bytes;
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .merge(routes::api_routes())
        .merge(routes::service_routes())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::from_config(config)?);
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("QnA API server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/docs/", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("QnA API server stopped");
    Ok(())
}

/// Resolves on Ctrl-C; readiness drops first so `/ready` reports 503 while draining
async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
    state.set_ready(false);
}

// ============================================================================
// Test support
// ============================================================================

/// State backed by the deterministic embedding double and the given chat model
#[cfg(feature = "test-utils")]
pub fn create_state_for_testing(
    config: AppConfig,
    llm: Arc<dyn qna_core::LlmClient>,
) -> qna_core::Result<Arc<AppState>> {
    use qna_parser::DocumentChunker;
    use qna_rag::testing::KeywordEmbedding;
    use qna_rag::{QnaPipeline, RateLimiter};

    let chunker = DocumentChunker::with_tiktoken(config.rag.chunk_size, config.rag.chunk_overlap)?;
    let pipeline = QnaPipeline::new(
        Arc::new(chunker),
        Arc::new(KeywordEmbedding::default()),
        llm,
        Arc::new(RateLimiter::from_config(&config.rate_limit)),
        config.rag.top_k,
    );

    Ok(Arc::new(AppState::new(config, Arc::new(pipeline))))
}

/// Router with default config and the extractive chat double
#[cfg(feature = "test-utils")]
pub fn create_router_for_testing() -> qna_core::Result<Router> {
    let llm = Arc::new(qna_rag::testing::ExtractiveChatModel::new());
    Ok(create_router(create_state_for_testing(AppConfig::default(), llm)?))
}
