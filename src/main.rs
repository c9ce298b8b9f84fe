//! Bookrent Server - library rental and fine management
//!
//! REST API server with a background fine maintenance job.

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bookrent_server::{
    api,
    config::AppConfig,
    repository::Repository,
    services::{fine_job::FineJobScheduler, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config);

    tracing::info!("Starting Bookrent Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let repository = Repository::new(pool);
    let services = Services::new(
        repository,
        config.auth.clone(),
        config.policy.clone(),
    );
    services.users.ensure_bootstrap_admin().await?;

    let mut scheduler = FineJobScheduler::new(
        services.fine_job.clone(),
        config.jobs.clone(),
    );
    scheduler.start();

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Console or JSON logs, filtered by RUST_LOG or the configured level
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("bookrent_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/auth/register", post(api::auth::register))
        .route("/auth/login", post(api::auth::login))
        // Books
        .route("/books", get(api::books::list_books).post(api::books::create_book))
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        // Transactions
        .route("/transactions", get(api::transactions::all_transactions))
        .route("/transactions/rent", post(api::transactions::rent_book))
        .route("/transactions/return", post(api::transactions::return_book))
        .route("/transactions/my", get(api::transactions::my_transactions))
        .route("/transactions/:id/pay", post(api::transactions::pay_rental))
        // Users
        .route("/users", get(api::users::list_users))
        .route("/users/profile", get(api::users::get_profile))
        .route("/users/membership", post(api::users::submit_membership))
        .route("/users/membership/status", get(api::users::membership_status))
        // Fines
        .route("/fines", get(api::fines::get_my_fines))
        .route("/fines/config", get(api::fines::get_fine_config))
        .route("/fines/summary", get(api::fines::get_fine_summary))
        .route("/fines/history", get(api::fines::get_fine_history))
        .route("/fines/pay-all", post(api::fines::pay_all_fines))
        .route("/fines/:id/pay", post(api::fines::pay_fine))
        // Administration
        .route("/admin/stats", get(api::admin::get_stats))
        .route("/admin/config", get(api::admin::get_config))
        .route("/admin/fines/report", get(api::admin::fine_report))
        .route("/admin/fines/run", post(api::admin::run_fine_job))
        .route("/admin/transactions/:id/return", put(api::admin::return_transaction))
        .route("/admin/transactions/:id/lost", put(api::admin::mark_lost))
        .route("/admin/transactions/:id/waive", put(api::admin::waive_fine))
        .route("/admin/transactions/:id/pay", put(api::admin::mark_fine_paid))
        .route("/admin/users/:id/block", put(api::admin::block_user))
        .route("/admin/users/:id/unblock", put(api::admin::unblock_user))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
}
