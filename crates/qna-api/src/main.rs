//! QnA API Server
//!
//! REST API server answering questions about uploaded documents.
//!
//! Author: hephaex@gmail.com

use qna_core::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qna_api=debug,qna_rag=debug,tower_http=debug".into()),
        )
        .init();

    // Load configuration (.env, optional QNA_CONFIG file, environment)
    let config = AppConfig::load()?;

    qna_api::serve(config).await
}
