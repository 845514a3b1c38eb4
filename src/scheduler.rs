//! Scheduled refresh of external data
//!
//! A [`RefreshScheduler`] wakes at a fixed interval and calls
//! [`Dispatcher::refresh`], handing each [`RefreshReport`] to an optional
//! channel so the gateway can broadcast it.

use crate::dispatcher::{Dispatcher, RefreshReport};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Four hours.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

pub struct RefreshScheduler {
    interval: Duration,
    reports: Option<mpsc::Sender<RefreshReport>>,
}

impl RefreshScheduler {
    pub fn builder() -> RefreshSchedulerBuilder {
        RefreshSchedulerBuilder::default()
    }

    /// Run until `cancel` fires. The first refresh happens after one full
    /// interval; a refresh that overruns delays the next one.
    pub async fn run(self, dispatcher: Dispatcher, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Refresh scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Refresh scheduler cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {
                    let report = dispatcher.refresh().await;

                    if let Some(tx) = &self.reports {
                        if tx.send(report).await.is_err() {
                            warn!("Report receiver dropped, stopping refresh scheduler");
                            return;
                        }
                    }
                }
            }
        }
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RefreshSchedulerBuilder {
    interval: Option<Duration>,
    reports: Option<mpsc::Sender<RefreshReport>>,
}

impl RefreshSchedulerBuilder {
    /// Defaults to [`DEFAULT_REFRESH_INTERVAL`].
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn reports(mut self, tx: mpsc::Sender<RefreshReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    pub fn build(self) -> RefreshScheduler {
        RefreshScheduler {
            interval: self.interval.unwrap_or(DEFAULT_REFRESH_INTERVAL),
            reports: self.reports,
        }
    }
}
