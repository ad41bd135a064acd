use anyhow::Result;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use gigachat_relay::build_router;
use gigachat_relay::config::{ConversationConfig, GigaChatCredentials, LoggingConfig, Settings};
use gigachat_relay::services::conversation::InMemorySessionStore;
use gigachat_relay::services::{ConversationManager, GigaChatClient};
use gigachat_relay::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (also pulls in .env)
    let settings = Settings::load()?;

    // Initialize logging
    let _log_guard = init_logging(&settings.logging);

    info!("🚀 Starting GigaChat relay...");

    let credentials = GigaChatCredentials::from_env()?;
    info!("✅ Configuration loaded");

    // External completion client, constructed once
    let gigachat_client = GigaChatClient::new(settings.gigachat.clone(), credentials)?;

    let session_store = Arc::new(InMemorySessionStore::new());
    let conversation_manager = Arc::new(ConversationManager::new(
        session_store,
        Box::new(gigachat_client),
        &settings.conversation,
    ));

    spawn_session_sweeper(conversation_manager.clone(), &settings.conversation);

    let app = build_router(
        AppState::new(conversation_manager),
        settings.server.body_limit_bytes,
    );

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let (writer, guard) = match &config.directory {
        Some(dir) => tracing_appender::non_blocking(tracing_appender::rolling::daily(
            dir,
            "gigachat-relay.log",
        )),
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gigachat_relay=debug")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(writer);

    if config.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    guard
}

/// Periodically drop idle sessions; disabled when the TTL is 0
fn spawn_session_sweeper(manager: Arc<ConversationManager>, config: &ConversationConfig) {
    if config.session_idle_ttl_secs == 0 {
        return;
    }

    let max_idle = Duration::from_secs(config.session_idle_ttl_secs);
    let every = Duration::from_secs(config.sweep_interval_secs.max(1));

    info!(
        "✅ Session sweeper started: ttl={}s, interval={}s",
        max_idle.as_secs(),
        every.as_secs()
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            manager.sweep_idle_sessions(max_idle);
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
