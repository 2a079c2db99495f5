//! Fetch plumbing shared by every page: the `{data, loading, error}` slot,
//! input-change tracking, debouncing, and the background task runner that
//! reports back to the UI loop over a channel.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::api::models::{
    ActionStatus, BrokerSummary, Forecast, FlowSignal, NewsPage, RunningTrade, TickerSeries,
    VolumeSpike, WatchlistEntry,
};
use crate::error::ApiError;

/// State of one fetched value. A failed fetch keeps the previous data
/// visible next to the error.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

impl<T> Resource<T> {
    pub fn begin(&mut self) {
        self.loading = true;
    }

    pub fn succeed(&mut self, data: T) {
        self.data = Some(data);
        self.loading = false;
        self.error = None;
    }

    pub fn fail(&mut self, error: impl ToString) {
        self.loading = false;
        self.error = Some(error.to_string());
    }

    pub fn settle(&mut self, result: Result<T, ApiError>) {
        match result {
            Ok(data) => self.succeed(data),
            Err(err) => self.fail(err),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Remembers the inputs of the last issued fetch so that a page issues
/// exactly one request per input change.
#[derive(Debug, Clone)]
pub struct InputTracker<K> {
    last: Option<K>,
}

impl<K> Default for InputTracker<K> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<K: PartialEq> InputTracker<K> {
    /// True (and records `key`) when it differs from the last issued inputs.
    pub fn changed(&mut self, key: K) -> bool {
        if self.last.as_ref() == Some(&key) {
            return false;
        }
        self.last = Some(key);
        true
    }

    /// Forget the last inputs so the next check fetches again.
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

/// Fixed-delay debounce: fires once, `delay` after the last `touch`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    pending_since: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending_since: None,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.pending_since = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Returns true exactly once per burst of touches, after the delay.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.pending_since {
            Some(since) if now.duration_since(since) >= self.delay => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.pending_since = None;
    }
}

/// Outcome of a user-triggered write against the backend.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    WatchlistAdded(Result<WatchlistEntry, ApiError>),
    WatchlistRemoved {
        ticker: String,
        result: Result<ActionStatus, ApiError>,
    },
    Scrape(Result<ActionStatus, ApiError>),
    Sync {
        ticker: String,
        result: Result<ActionStatus, ApiError>,
    },
    NewsDeleted {
        id: String,
        result: Result<ActionStatus, ApiError>,
    },
}

/// Message sent from a background fetch task to the UI loop.
#[derive(Debug, Clone)]
pub enum FetchMessage {
    Series(Result<TickerSeries, ApiError>),
    Spikes(Result<Vec<VolumeSpike>, ApiError>),
    News(Result<NewsPage, ApiError>),
    NewsSources(Result<Vec<String>, ApiError>),
    BrokerSummary(Result<BrokerSummary, ApiError>),
    RunningTrade(Result<Vec<RunningTrade>, ApiError>),
    HotList(Result<Vec<FlowSignal>, ApiError>),
    Forecast(Result<Forecast, ApiError>),
    Watchlist(Result<Vec<WatchlistEntry>, ApiError>),
    Action(ActionOutcome),
}

/// Spawns fetch tasks on the runtime; each task sends exactly one message.
/// In-flight tasks are never cancelled, so the last reply to arrive wins.
#[derive(Debug, Clone)]
pub struct Fetcher {
    runtime: Handle,
    sender: UnboundedSender<FetchMessage>,
}

impl Fetcher {
    pub fn new(runtime: Handle) -> (Self, UnboundedReceiver<FetchMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { runtime, sender }, receiver)
    }

    pub fn spawn<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = FetchMessage> + Send + 'static,
    {
        let sender = self.sender.clone();
        debug!("fetch started: {}", label);
        self.runtime.spawn(async move {
            let message = task.await;
            // Receiver gone means the app is shutting down.
            let _ = sender.send(message);
        });
    }
}
