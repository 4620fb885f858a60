use axum::{routing::get, Router};
use loan_approval_api::classifier::load_classifier;
use loan_approval_api::config::Config;
use loan_approval_api::handlers::{self, AppState};
use loan_approval_api::openapi::ApiDoc;
use loan_approval_api::services::PredictionService;
use loan_approval_api::store_client::HttpObjectStore;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Object store client.
/// - Classifier (falls back to rule-based decisions when unavailable).
/// - Latest-results cache.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loan_approval_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Object store holding model artifacts and persisted predictions
    let store = Arc::new(HttpObjectStore::new(
        config.store_base_url.clone(),
        config.store_token.clone(),
        config.store_connect_timeout(),
        config.store_read_timeout(),
    )?);
    tracing::info!("✓ Object store client initialized: {}", config.store_base_url);

    // Load classifier once; None means rule-based scoring for the process lifetime
    let classifier = load_classifier(&config.model_source(), store.as_ref()).await;

    let predictions = Arc::new(PredictionService::new(store, config.cache_ttl()));
    tracing::info!(
        "Latest-results cache initialized ({}s TTL)",
        config.cache_ttl_secs
    );

    // Build application state
    let app_state = Arc::new(AppState {
        predictions,
        classifier,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Build protected routes with security layers
    let protected_routes = handlers::api_routes()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload (prevents memory exhaustion)
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
