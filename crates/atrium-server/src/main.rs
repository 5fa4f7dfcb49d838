mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use atrium_api::MessageService;
use atrium_api::cache::MemoryCache;
use atrium_api::notify::Dispatcher;
use atrium_api::object_store::LocalObjectStore;
use atrium_api::routes;
use atrium_api::store::SqliteStore;
use atrium_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atrium=debug,atrium_api=debug,atrium_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    for (id, username) in &config.seed_users {
        db.create_user(*id, username)?;
        info!("Seeded user {} ({})", id, username);
    }

    // Collaborators
    let objects = LocalObjectStore::new(config.upload_dir.clone(), &config.public_url).await?;
    let upload_dir = objects.dir().clone();
    let dispatcher = Dispatcher::new();

    let service = Arc::new(MessageService::new(
        Arc::new(SqliteStore::new(db)),
        Arc::new(objects),
        Arc::new(MemoryCache::new()),
        Arc::new(dispatcher.clone()),
    ));

    let app = routes::router(service, dispatcher, &upload_dir, config.max_upload_bytes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Atrium listening on {}", addr);
    info!(
        "Uploads: {} served from {}/files (max {} MB)",
        upload_dir.display(),
        config.public_url.trim_end_matches('/'),
        config.max_upload_bytes / (1024 * 1024)
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
