use std::sync::Arc;

use atelier::config::Config;
use atelier::engine::ProceduralEngine;
use atelier::http::{self, AppState};
use atelier::job::TaskRegistry;
use atelier::store::{HistoryStore, RetentionPolicy};
use atelier::telemetry::HostTelemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    config.ensure_dirs()?;

    // With ATELIER_LOG_DIR set, logs roll daily into that directory;
    // otherwise they go to stderr. The appender guard must outlive main.
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let _appender_guard = match config.logs_dir {
        Some(ref logs_dir) => {
            let file_appender = tracing_appender::rolling::daily(logs_dir, "atelier.log");
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .init();
            None
        }
    };

    eprintln!("🎨 Atelier v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API:    http://{}/api", config.bind_addr);
    eprintln!("   Data:   {}", config.data_dir.display());
    eprintln!(
        "   History: keep {} images / {} days",
        config.max_history_images, config.max_history_days
    );

    let store = HistoryStore::open(
        config.history_file(),
        config.images_dir.clone(),
        RetentionPolicy::new(config.max_history_images, config.max_history_days),
    )?;

    let registry = TaskRegistry::new(Arc::new(ProceduralEngine::new()), store.clone());
    let telemetry = Arc::new(HostTelemetry::new(config.data_dir.clone()));

    let state = AppState {
        registry,
        store,
        telemetry,
    };
    let app = http::router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Atelier listening");
    axum::serve(listener, app).await?;

    Ok(())
}
