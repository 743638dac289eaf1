pub mod api;
pub mod auth;
pub mod config;
pub mod dedup;
pub mod detector;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod notify;
pub mod reconciler;

#[cfg(test)]
mod testing;

pub use api::{ChatApi, HttpChatApi};
pub use auth::{AuthContext, StaticAuth};
pub use config::ClientConfig;
pub use detector::{Detection, NewMessageDetector};
pub use dispatcher::{Delivery, DispatchOutcome, DispatcherConfig, NotificationDispatcher};
pub use error::{ApiError, ClientError, Result};
pub use fetcher::{DrainReport, MessageFetcher};
pub use notify::{
    LogNotificationChannel, Navigator, NotificationChannel, NotificationData,
    NotificationRequest, Permission, ServiceWorkerBridge,
};
pub use reconciler::{ReconcileState, Reconciler, TickOutcome};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,fitchat_client=debug,fitchat_store=info")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
