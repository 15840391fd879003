use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use db_pool::{create_pool, DbConfig};
use rate_limit::SlidingWindowLimiter;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tellyads_api::middleware::AdminAuth;
use tellyads_api::{handlers, Config};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=warn,tellyads_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tellyads-api");

    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Failed to load configuration")?;

    let mut db_cfg = DbConfig::for_service("tellyads-api");
    if db_cfg.database_url.is_empty() {
        db_cfg.database_url = config.database.url.clone();
    }
    db_cfg.max_connections = config.database.max_connections;
    db_cfg.log_config();

    let db_pool = create_pool(db_cfg)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations completed");

    let limiter = match &config.redis.url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).context("Invalid REDIS_URL")?;
            match redis::aio::ConnectionManager::new(client).await {
                Ok(conn) => {
                    tracing::info!("rate limiter using Redis backend");
                    Arc::new(SlidingWindowLimiter::new(conn))
                }
                Err(err) => {
                    tracing::warn!("Redis unavailable ({}); using in-process rate limiter", err);
                    Arc::new(SlidingWindowLimiter::in_process())
                }
            }
        }
        None => Arc::new(SlidingWindowLimiter::in_process()),
    };

    if !limiter.is_distributed() && config.app.env == "production" {
        tracing::warn!(
            "in-process rate limiting in production: limits are per-instance, \
             configure REDIS_URL for shared enforcement"
        );
    }

    if config.admin.api_keys.is_empty() {
        tracing::warn!("no ADMIN_API_KEYS configured; admin endpoints are disabled");
    }

    let bind_addr = (config.app.host.clone(), config.app.port);
    tracing::info!("listening on {}:{}", bind_addr.0, bind_addr.1);

    let app_config = config.clone();
    HttpServer::new(move || {
        let cors = if app_config.cors.allowed_origins.iter().any(|o| o == "*") {
            Cors::permissive()
        } else {
            let mut cors = Cors::default()
                .allowed_methods(vec!["GET", "POST"])
                .allow_any_header()
                .max_age(3600);
            for origin in &app_config.cors.allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors
        };

        App::new()
            .app_data(web::Data::new(app_config.clone()))
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(limiter.clone()))
            .wrap(cors)
            .route("/health", web::get().to(handlers::health))
            .route("/metrics", web::get().to(handlers::metrics))
            .service(
                web::scope("/api")
                    .service(
                        web::scope("/admin/jobs")
                            .wrap(AdminAuth::new(app_config.admin.api_keys.clone()))
                            .route("", web::post().to(handlers::enqueue))
                            .route("", web::get().to(handlers::list_jobs))
                            .route("/stats", web::get().to(handlers::queue_stats))
                            .route("/dead-letter", web::get().to(handlers::dead_letter))
                            .route("/{id}", web::get().to(handlers::get_job))
                            .route("/{id}/cancel", web::post().to(handlers::cancel_job))
                            .route("/{id}/retry", web::post().to(handlers::retry_job)),
                    )
                    .service(
                        web::scope("/ads/{ad_id}")
                            .route("/view", web::post().to(handlers::record_view))
                            .route("/like", web::post().to(handlers::toggle_like))
                            .route("/save", web::post().to(handlers::toggle_save))
                            .route("/reasons", web::get().to(handlers::get_reasons))
                            .route("/reasons", web::post().to(handlers::submit_reason))
                            .route("/feedback", web::get().to(handlers::get_feedback)),
                    )
                    .service(
                        web::scope("/analytics")
                            .route("/capture", web::post().to(handlers::capture)),
                    ),
            )
    })
    .bind(bind_addr)
    .context("Failed to bind HTTP listener")?
    .run()
    .await
    .context("HTTP server terminated")
}
