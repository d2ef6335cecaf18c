//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::DbAdapter, gemini_llm::GeminiTextAdapter},
    config::Config,
    error::ApiError,
    web::{paystack_webhook_handler, rest::ApiDoc, state::AppState, study_assistant_handler},
};
use axum::{routing::post, Router};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use tower_http::cors::{Any, CorsLayer};
use axum::http::{
    header::{HeaderName, AUTHORIZATION, CONTENT_TYPE},
    Method,
};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let gemini_api_key = config
        .gemini_api_key
        .as_ref()
        .ok_or_else(|| ApiError::Internal("GEMINI_API_KEY is required".to_string()))?;
    let gemini_adapter = Arc::new(GeminiTextAdapter::new(
        reqwest::Client::new(),
        gemini_api_key.clone(),
        config.gemini_base_url.clone(),
        config.gemini_model.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        llm: gemini_adapter,
    });

    // The study endpoint is called straight from browsers, so CORS stays
    // permissive; x-user-id is the caller-identity header.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/ai-study-assistant", post(study_assistant_handler))
        .route("/paystack-webhook", post(paystack_webhook_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
