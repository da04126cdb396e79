use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    Method,
};
use clinic_support::{
    config::{Backend, Config},
    db::{changefeed::ChangeFeed, db::DBClient, memorydb::MemoryDB, supportdb::SupportExt},
    routes::create_router,
    service::realtime_sync::RealtimeSync,
    AppState,
};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init()?;
    let viewer = config.viewer();

    let (db_client, feed): (Arc<dyn SupportExt>, Arc<dyn ChangeFeed>) = match config.backend {
        Backend::Postgres => {
            let database_url = config.database_url.clone().context("DATABASE_URL must be set")?;
            let pool = match PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(&database_url)
                .await
            {
                Ok(pool) => {
                    tracing::info!("Connection to the database is successful");
                    pool
                }
                Err(err) => {
                    tracing::error!("Failed to connect to the database: {:?}", err);
                    return Err(err.into());
                }
            };
            sqlx::migrate!("./migrations").run(&pool).await?;

            let db_client = Arc::new(DBClient::new(pool));
            let gateway: Arc<dyn SupportExt> = db_client.clone();
            let feed: Arc<dyn ChangeFeed> = db_client;
            (gateway, feed)
        }
        Backend::Memory => {
            tracing::info!("Using the in-memory support store");
            let db_client = Arc::new(MemoryDB::new());
            let gateway: Arc<dyn SupportExt> = db_client.clone();
            let feed: Arc<dyn ChangeFeed> = db_client;
            (gateway, feed)
        }
    };

    let app_state = Arc::new(AppState::new(db_client, config.clone(), viewer));

    let sync = RealtimeSync::mount(app_state.support_service.clone(), feed).await?;

    let support_service = app_state.support_service.clone();
    let interval = Duration::from_secs(config.reconcile_interval_secs.max(1));
    let reconciler = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let attached = support_service.reconcile_orphans().await;
            if attached > 0 {
                tracing::info!("Attached {} queued opening messages", attached);
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PUT]);

    let app = create_router(app_state).layer(cors);

    tracing::info!("Server is running on http://localhost:{}", config.port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    reconciler.abort();
    sync.shutdown().await;

    Ok(())
}
