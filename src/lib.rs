//! # bili-dl
//!
//! Queueing, resumable download engine for Bilibili media.
//!
//! ## Design Philosophy
//!
//! bili-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Polite to the origin** - Every API call is paced and rate-limit aware
//! - **Resumable** - Interrupted transfers continue from their temp files
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use bili_dl::{Config, DownloadManager, TaskOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = DownloadManager::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let source = manager.resolver().resolve("BV1xx411c7mD").await?;
//!     let ids = manager
//!         .enqueue_source(source, TaskOptions::new("./downloads"))
//!         .await?;
//!     println!("queued {} task(s)", ids.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Paced HTTP client for the origin API and stream hosts
pub mod client;
/// Configuration types
pub mod config;
/// Task scheduling and transfer orchestration
pub mod downloader;
/// Error types
pub mod error;
/// External media tool integration
pub mod media;
/// Batch renaming of downloaded files
pub mod rename;
/// Reference resolution
pub mod resolver;
/// Retry logic with linear backoff
pub mod retry;
/// Cookie session store
pub mod session;
/// Persisted user settings
pub mod settings;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use client::RateLimitedClient;
pub use config::Config;
pub use downloader::{DownloadManager, TaskContext, TaskObserver, TransferTask, spawn_event_reporter};
pub use error::{DownloadError, Error, Result};
pub use media::{FfmpegProcessor, MediaProcessor, MissingProcessor};
pub use resolver::{MediaSourceResolver, Reference};
pub use session::Session;
pub use settings::Settings;
pub use types::{
    Event, ItemDescriptor, OutputFormat, Quality, QueueSnapshot, ResolvedSource, StreamSet, TaskId,
    TaskOptions, TaskSnapshot, TaskStatus,
};

/// Run the manager until a termination signal arrives, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT; falls back to whichever could be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use bili_dl::{Config, DownloadManager, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = DownloadManager::new(Config::default()).await?;
///     bili_dl::spawn_event_reporter(&manager);
///
///     run_with_shutdown(manager).await;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: DownloadManager) {
    wait_for_signal().await;
    manager.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
    }
}
