use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::cache::{CollectionSource, Generation, Record, RemoteCollectionCache};
use crate::config::Config;

use super::observer::RefreshListener;

/// Shown once automatic polling has given up.
pub const CONNECTION_FAILED_MESSAGE: &str = "Connection failed. Pull down to retry.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_consecutive_failures: u32,
}

impl PollConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.poll_interval(),
            max_consecutive_failures: config.max_consecutive_failures.max(1),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStatus {
    pub consecutive_failures: u32,
    /// Automatic ticks are skipped while this is set.
    pub breaker_open: bool,
    pub error: Option<String>,
}

/// Silent periodic refresh of a collection cache with a consecutive-failure
/// circuit breaker.
///
/// Once the breaker opens, only `manual_refresh` can close it again. A
/// failed manual refresh counts as another consecutive failure and leaves
/// the breaker open.
pub struct PollingController<T: Record> {
    cache: Arc<RemoteCollectionCache<T>>,
    source: Arc<dyn CollectionSource<T>>,
    config: PollConfig,
    status: watch::Sender<PollStatus>,
}

impl<T: Record> PollingController<T> {
    pub fn new(
        cache: Arc<RemoteCollectionCache<T>>,
        source: Arc<dyn CollectionSource<T>>,
        config: PollConfig,
    ) -> Self {
        let (status, _) = watch::channel(PollStatus::default());
        Self {
            cache,
            source,
            config,
            status,
        }
    }

    pub fn cache(&self) -> &Arc<RemoteCollectionCache<T>> {
        &self.cache
    }

    pub fn status(&self) -> PollStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<PollStatus> {
        self.status.subscribe()
    }

    pub fn is_breaker_open(&self) -> bool {
        self.status.borrow().breaker_open
    }

    /// Start ticking every `interval`, first tick one interval from now.
    ///
    /// Polling runs until the returned handle is cancelled or dropped.
    pub fn start(self: &Arc<Self>) -> PollHandle {
        let gate = Arc::new(Mutex::new(true));
        let task_gate = Arc::clone(&gate);
        let controller = Arc::clone(self);
        let period = self.config.interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if controller.is_breaker_open() {
                    continue;
                }
                let generation = controller.cache.generation();
                let result = controller.source.fetch().await;
                {
                    // Held across the write so cancel() cannot interleave with it.
                    let active = task_gate.lock().unwrap_or_else(PoisonError::into_inner);
                    if !*active {
                        break;
                    }
                    let _ = controller.apply(generation, result);
                }
            }
        });

        debug!(cache = self.cache.name(), interval = ?period, "Polling started");
        PollHandle { gate, task }
    }

    /// User-initiated refresh. Success closes the breaker; the error is
    /// returned so the caller can show it.
    ///
    /// A response that lands after the cache was cleared changes neither the
    /// cache nor the breaker.
    pub async fn manual_refresh(&self) -> Result<(), ApiError> {
        let generation = self.cache.generation();
        let result = self.source.fetch().await;
        self.apply(generation, result)
    }

    /// Close the breaker and forget past failures.
    pub fn reset(&self) {
        self.status.send_if_modified(|status| {
            let changed = *status != PollStatus::default();
            *status = PollStatus::default();
            changed
        });
    }

    fn apply(
        &self,
        generation: Generation,
        result: Result<Vec<T>, ApiError>,
    ) -> Result<(), ApiError> {
        if self.cache.generation() != generation {
            debug!(cache = self.cache.name(), "Discarding poll result from a cleared session");
            return result.map(|_| ());
        }
        match result {
            Ok(records) => {
                if !self.cache.replace_in(generation, records) {
                    return Ok(());
                }
                self.reset();
                Ok(())
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    fn record_failure(&self, error: &ApiError) {
        let max = self.config.max_consecutive_failures;
        let mut tripped = false;
        self.status.send_modify(|status| {
            status.consecutive_failures += 1;
            if status.consecutive_failures >= max && !status.breaker_open {
                status.breaker_open = true;
                status.error = Some(CONNECTION_FAILED_MESSAGE.to_string());
                tripped = true;
            }
        });

        let failures = self.status.borrow().consecutive_failures;
        if tripped {
            warn!(
                cache = self.cache.name(),
                failures = failures,
                error = %error,
                "Polling stopped after repeated failures"
            );
        } else {
            warn!(cache = self.cache.name(), failures = failures, error = %error, "Poll failed");
        }
    }
}

#[async_trait]
impl<T: Record> RefreshListener for PollingController<T> {
    async fn on_refresh_requested(&self) {
        // Failures are already reflected in the status channel.
        let _ = self.manual_refresh().await;
    }
}

/// Running poll loop. Cancelling (or dropping) it stops all further cache
/// writes from this loop, including a tick whose fetch is still in flight.
pub struct PollHandle {
    gate: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn cancel(&self) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
