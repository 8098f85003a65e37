//! Daily sales view refresh.
//!
//! A single background task recomputes the view on a schedule. The same
//! [`ViewRefresher`] backs the manual trigger on the admin endpoint.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use croner::Cron;
use orderflow_storage::{DynOrderStore, StorageError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expr}': {message}")]
    InvalidCron { expr: String, message: String },

    #[error("invalid interval '{expr}': expected e.g. 'every 30s', 'every 15m', 'every 2h'")]
    InvalidInterval { expr: String },
}

/// When the view is refreshed.
#[derive(Debug, Clone)]
pub enum RefreshSchedule {
    /// Cron expression or nickname such as `@hourly`
    Cron(Box<Cron>),
    /// Fixed period, written `every <n><unit>`
    Every(Duration),
}

impl RefreshSchedule {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let expr = expr.trim();
        if let Some(period) = expr.strip_prefix("every ") {
            return parse_interval(period.trim())
                .map(RefreshSchedule::Every)
                .ok_or_else(|| ScheduleError::InvalidInterval {
                    expr: expr.to_string(),
                });
        }

        Cron::new(expr)
            .parse()
            .map(|cron| RefreshSchedule::Cron(Box::new(cron)))
            .map_err(|e| ScheduleError::InvalidCron {
                expr: expr.to_string(),
                message: e.to_string(),
            })
    }

    /// The first fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            RefreshSchedule::Cron(cron) => cron.find_next_occurrence(&now, false).ok(),
            RefreshSchedule::Every(period) => {
                chrono::Duration::from_std(*period).ok().map(|p| now + p)
            }
        }
    }
}

fn parse_interval(period: &str) -> Option<Duration> {
    let split = period.find(|c: char| !c.is_ascii_digit())?;
    let (amount, unit) = period.split_at(split);
    let amount: u64 = amount.parse().ok()?;
    if amount == 0 {
        return None;
    }
    match unit {
        "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount * 60)),
        "h" => Some(Duration::from_secs(amount * 60 * 60)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Scheduled,
    Manual,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTrigger::Scheduled => "scheduled",
            RefreshTrigger::Manual => "manual",
        }
    }
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("{0}")]
    Store(#[from] StorageError),

    #[error("refresh timed out after {0:?}")]
    Timeout(Duration),

    #[error("refresh task aborted: {0}")]
    Aborted(String),
}

/// Runs the store's view refresh under its own deadline.
#[derive(Clone)]
pub struct ViewRefresher {
    store: DynOrderStore,
    timeout: Duration,
}

impl ViewRefresher {
    pub fn new(store: DynOrderStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Refreshes inline and returns how long it took.
    pub async fn refresh(&self, trigger: RefreshTrigger) -> Result<Duration, RefreshError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.store.refresh_daily_sales()).await
        {
            Ok(result) => result.map_err(RefreshError::from),
            Err(_) => Err(RefreshError::Timeout(self.timeout)),
        };
        let elapsed = started.elapsed();

        let label = if result.is_ok() { "success" } else { "failure" };
        crate::metrics::record_view_refresh(trigger.as_str(), label, elapsed);
        result.map(|()| elapsed)
    }

    /// Refreshes on a separate task and waits for it.
    ///
    /// Dropping the returned future does not cancel the refresh.
    pub async fn trigger(&self) -> Result<Duration, RefreshError> {
        let this = self.clone();
        tokio::spawn(async move { this.refresh(RefreshTrigger::Manual).await })
            .await
            .map_err(|e| RefreshError::Aborted(e.to_string()))?
    }
}

pub struct RefreshScheduler {
    refresher: ViewRefresher,
    schedule: RefreshSchedule,
}

impl RefreshScheduler {
    pub fn new(refresher: ViewRefresher, schedule: RefreshSchedule) -> Self {
        Self {
            refresher,
            schedule,
        }
    }

    /// Start the scheduler in a background task.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(schedule = ?self.schedule, "View refresh scheduler started");

            loop {
                let now = Utc::now();
                let Some(next) = self.schedule.next_after(now) else {
                    error!("Refresh schedule has no future occurrence, stopping");
                    break;
                };
                let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
                debug!(next_run = %next, "Next view refresh scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        match self.refresher.refresh(RefreshTrigger::Scheduled).await {
                            Ok(elapsed) => info!(
                                duration_ms = elapsed.as_millis() as u64,
                                "Daily sales view refreshed"
                            ),
                            Err(e) => error!(error = %e, "Daily sales view refresh failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("View refresh scheduler shutting down");
                        break;
                    }
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals shutdown and waits for a running refresh to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "View refresh scheduler task failed");
        }
    }
}
