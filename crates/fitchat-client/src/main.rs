//! # fitchat-daemon
//!
//! Headless chat watcher for one challenge conversation.
//!
//! This binary:
//! - keeps the local SQLite message cache in sync with the chat API
//! - replays messages left in the offline outbox
//! - polls for new messages and reports notifications through the log

use std::sync::Arc;

use anyhow::Context;
use fitchat_client::{
    init_tracing, ClientConfig, DispatcherConfig, HttpChatApi, LogNotificationChannel,
    NotificationDispatcher, Reconciler, StaticAuth,
};
use fitchat_shared::SystemClock;
use fitchat_store::{ChatStore, SqliteStore};
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    init_tracing();
    info!("Starting fitchat daemon v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ClientConfig::from_env()?;
    info!(
        api = %config.api_url,
        platform = ?config.platform,
        signed_in = config.token.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Open the store
    // -----------------------------------------------------------------------
    let kv = match &config.db_path {
        Some(path) => SqliteStore::open_at(path, config.store_quota_bytes),
        None => SqliteStore::new(config.store_quota_bytes),
    }
    .context("failed to open message store")?;
    if let Some(path) = kv.path() {
        info!(path = %path.display(), "Store opened");
    }

    let clock = Arc::new(SystemClock);
    let store = Arc::new(ChatStore::with_clock(Arc::new(kv), config.limits(), clock.clone()));

    // -----------------------------------------------------------------------
    // 4. Wire up the reconciler
    // -----------------------------------------------------------------------
    let api = Arc::new(HttpChatApi::new(config.api_url.clone()));
    let auth = Arc::new(StaticAuth::new(config.session()));
    let dispatcher = NotificationDispatcher::new(
        DispatcherConfig::for_platform(config.platform),
        Arc::new(LogNotificationChannel),
        clock,
    );
    let reconciler = Arc::new(Reconciler::new(api, store, auth, dispatcher));

    match config.conversation.clone() {
        Some(id) => match reconciler.select_conversation(Some(id.clone())).await {
            Ok(messages) => info!(conversation = %id, count = messages.len(), "Conversation loaded"),
            Err(e) => warn!(conversation = %id, error = %e, "Initial load failed, polling anyway"),
        },
        None => warn!("FITCHAT_CONVERSATION not set, nothing to watch"),
    }

    // -----------------------------------------------------------------------
    // 5. Poll until Ctrl+C
    // -----------------------------------------------------------------------
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = tokio::spawn(reconciler.clone().run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down");

    let _ = shutdown_tx.send(true);
    poller.await.context("poll loop panicked")?;

    Ok(())
}
