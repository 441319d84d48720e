//! Application driver.
//!
//! Runs the WebSocket transport as a separate task and the ingestion loop
//! on the calling task, connected by a bounded payload channel. Ctrl-C (or
//! cancelling the shutdown token) stops both.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vwap_feed::{IngestionLoop, WindowRegistry};
use vwap_telemetry::{StatsReporter, StatsSnapshot};
use vwap_ws::ConnectionManager;

/// Time the transport gets to finish its close handshake.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Main application.
pub struct Application {
    config: AppConfig,
    shutdown: CancellationToken,
}

impl Application {
    /// Validates the configuration; nothing is started yet.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Token that stops the application when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until Ctrl-C, shutdown, or the transport giving up.
    ///
    /// Returns the final ingestion counters. A transport that exhausted its
    /// reconnect attempts is reported as `AppError::WebSocket`.
    pub async fn run(self) -> AppResult<StatsSnapshot> {
        let registry = WindowRegistry::new(self.config.window_size)?;
        let mut ingest = IngestionLoop::new(registry, self.config.dubious_filter())
            .with_stats_reporter(
                StatsReporter::new(self.config.product_ids.clone()),
                Duration::from_secs(self.config.stats_interval_secs),
            );

        let (payload_tx, payload_rx) = mpsc::channel::<String>(self.config.channel_capacity);

        let ws_config = self.config.connection_config();
        info!(
            url = %ws_config.url,
            products = ?ws_config.product_ids,
            window_size = self.config.window_size,
            keep_dubious = self.config.keep_dubious,
            "Starting application"
        );

        let manager = ConnectionManager::new(ws_config, payload_tx, self.shutdown.clone());
        let mut ws_handle = tokio::spawn(async move { manager.connect().await });

        let stats = {
            let ingest_fut = ingest.run(payload_rx, self.shutdown.clone());
            tokio::pin!(ingest_fut);

            tokio::select! {
                stats = &mut ingest_fut => stats,
                () = wait_for_ctrl_c() => {
                    self.shutdown.cancel();
                    ingest_fut.await
                }
            }
        };

        // The loop may also have ended because the transport stopped.
        self.shutdown.cancel();

        let ws_result = match tokio::time::timeout(SHUTDOWN_GRACE, &mut ws_handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(?e, "WebSocket task failed");
                Ok(())
            }
            Err(_) => {
                warn!("WebSocket task did not stop within grace period, aborting");
                ws_handle.abort();
                Ok(())
            }
        };

        info!("Application stopped");
        ws_result.map_err(|e| AppError::WebSocket(Box::new(e)))?;
        Ok(stats)
    }
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(?e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
