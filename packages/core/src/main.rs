use std::sync::Arc;

use axum::{body::Body, http::header, middleware, response::Response, routing::get, Router};
use clap::Parser;
use dotenvy::dotenv;
use tokio::signal;
use tower_http::cors::CorsLayer;

use workshop_queue::api::auth::OperatorKey;
use workshop_queue::api::queue::{create_queue_router, QueueApiState};
use workshop_queue::api::{health, notifications};
use workshop_queue::cli::Cli;
use workshop_queue::config::Config;
use workshop_queue::db;
use workshop_queue::logging::init_logging;
use workshop_queue::metrics::{self, AppMetrics};
use workshop_queue::notify::NotificationGateway;
use workshop_queue::queue::QueueEngine;
use workshop_queue::repository::QueueRepository;
use workshop_queue::services::messenger::MessengerClient;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let mut config = Config::from_env().unwrap_or_else(|err| {
        tracing::error!("Config error: {}", err);
        std::process::exit(1);
    });
    config.apply_cli(&cli);

    let pool = db::create_pool(&config.database_url).await.unwrap_or_else(|err| {
        tracing::error!("Failed to open database {}: {}", config.database_url, err);
        std::process::exit(1);
    });

    let repository = Arc::new(QueueRepository::new(pool));
    let gateway: Arc<dyn NotificationGateway + Send + Sync> =
        Arc::new(MessengerClient::new(config.messenger_url.clone()));
    let engine = Arc::new(QueueEngine::new(repository.clone(), gateway));

    let app_metrics = Arc::new(AppMetrics::new().unwrap_or_else(|err| {
        tracing::error!("Failed to build metrics registry: {}", err);
        std::process::exit(1);
    }));

    let queue_state = Arc::new(QueueApiState {
        engine,
        metrics: Some(app_metrics.clone()),
    });

    let metrics_for_handler = app_metrics.clone();
    let app = Router::new()
        .route("/health", get(health::health))
        .route(
            "/metrics",
            get(move || {
                let m = metrics_for_handler.clone();
                async move {
                    match m.render() {
                        Ok(body) => Response::builder()
                            .status(200)
                            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                            .body(Body::from(body))
                            .unwrap(),
                        Err(_) => Response::builder()
                            .status(500)
                            .body(Body::from("metrics error"))
                            .unwrap(),
                    }
                }
            }),
        )
        .merge(create_queue_router(
            queue_state,
            OperatorKey(config.operator_api_key.clone()),
        ))
        .merge(
            Router::new()
                .route(
                    "/queue/notifications",
                    get(notifications::get_notification_history),
                )
                .with_state(repository),
        )
        .layer(middleware::from_fn_with_state(
            app_metrics,
            metrics::track_http,
        ))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|err| {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, err);
            std::process::exit(1);
        });

    tracing::info!("Workshop queue listening on {}", config.bind_addr);

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", err);
        std::process::exit(1);
    }

    tracing::info!("Server stopped cleanly");
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("Shutdown signal received. Stopping server.");
}
