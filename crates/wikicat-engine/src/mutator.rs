//! Rate-limited page mutation
//!
//! One minimal interval is shared by every caller through [`Throttle`]. Each
//! call waits out the interval before touching the page store. A
//! rate-limit-class failure grows the interval and retries; a success decays
//! it. Any other failure is returned at once.

use crate::config::ThrottleSettings;
use crate::progress::{ProgressEvent, ProgressSink};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wikicat_core::errors::{ExError, ExErrorKind, Result, WikicatError};
use wikicat_core::pages::PageStore;
use wikicat_core_types::schema::EVENT_RETRY;

const RATE_LIMIT_MARKERS: [&str; 6] = [
    "429",
    "too many requests",
    "ratelimit",
    "rate limit",
    "maxlag",
    "readonly",
];

/// Whether `err` should be retried after backing off
///
/// Only messages are inspected, never the page title carried as context.
pub fn is_rate_limit_error(err: &ExError) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.kind() == ExErrorKind::RateLimited {
            return true;
        }
        let message = e.message().to_lowercase();
        if RATE_LIMIT_MARKERS.iter().any(|m| message.contains(m)) {
            return true;
        }
        current = e.source_error();
    }
    false
}

#[derive(Debug)]
struct IntervalState {
    min_interval: f64,
    /// Start of the most recently reserved call
    last_start: Option<Instant>,
}

/// Process-wide pacing state
#[derive(Debug, Clone)]
pub struct Throttle {
    settings: Arc<ThrottleSettings>,
    state: Arc<Mutex<IntervalState>>,
}

impl Throttle {
    pub fn new(settings: ThrottleSettings) -> Self {
        let initial = settings
            .base_interval_secs
            .max(settings.floor_secs)
            .min(settings.ceiling_secs);
        Self {
            settings: Arc::new(settings),
            state: Arc::new(Mutex::new(IntervalState {
                min_interval: initial,
                last_start: None,
            })),
        }
    }

    pub fn settings(&self) -> &ThrottleSettings {
        &self.settings
    }

    /// Current minimal interval between calls
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.state.lock().min_interval)
    }

    /// Block until this caller's slot comes up
    ///
    /// The pause runs from the previous start using the current interval.
    /// The slot is reserved under the lock and slept outside it, so
    /// concurrent callers queue up one interval apart.
    pub fn wait_turn(&self) {
        let pause = {
            let mut state = self.state.lock();
            let now = Instant::now();
            let interval = Duration::from_secs_f64(state.min_interval);
            let start = match state.last_start {
                Some(last) if last + interval > now => last + interval,
                _ => now,
            };
            state.last_start = Some(start);
            start.saturating_duration_since(now)
        };
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }

    /// Grow the interval after a rate-limit-class failure; returns the new value
    pub fn record_rate_limited(&self) -> Duration {
        let mut state = self.state.lock();
        let grown = (state.min_interval * self.settings.growth)
            .max(self.settings.floor_secs)
            .min(self.settings.ceiling_secs);
        state.min_interval = grown;
        Duration::from_secs_f64(grown)
    }

    /// Decay the interval after a success; returns the new value
    pub fn record_success(&self) -> Duration {
        let mut state = self.state.lock();
        let decayed = (state.min_interval * self.settings.decay).max(self.settings.floor_secs);
        state.min_interval = decayed;
        Duration::from_secs_f64(decayed)
    }
}

/// Page store wrapper that paces and retries every call
#[derive(Clone)]
pub struct RateLimitedMutator {
    pages: Arc<dyn PageStore>,
    throttle: Throttle,
    progress: Arc<dyn ProgressSink>,
}

impl RateLimitedMutator {
    pub fn new(pages: Arc<dyn PageStore>, throttle: Throttle, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            pages,
            throttle,
            progress,
        }
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    fn with_retry<T, F>(&self, op: &'static str, title: &str, attempts: u32, mut call: F) -> Result<T>
    where
        F: FnMut(&dyn PageStore) -> Result<T>,
    {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            self.throttle.wait_turn();
            match call(self.pages.as_ref()) {
                Ok(value) => {
                    self.throttle.record_success();
                    return Ok(value);
                }
                Err(err) if is_rate_limit_error(&err) => {
                    if attempt >= attempts {
                        warn!(op, title, attempts, error = %err, "Rate limit persisted, giving up");
                        return Err(ExError::from(WikicatError::RateLimitExhausted {
                            title: title.to_string(),
                            attempts,
                        })
                        .with_op(op)
                        .with_source(err));
                    }
                    let pause = self.throttle.record_rate_limited();
                    debug!(
                        op,
                        title,
                        attempt,
                        event = EVENT_RETRY,
                        pause_ms = pause.as_millis() as u64,
                        "Retrying after rate limit"
                    );
                    self.progress.emit(&ProgressEvent::RateLimited {
                        op,
                        title: title.to_string(),
                        attempt,
                        attempts,
                        pause,
                    });
                    attempt += 1;
                }
                Err(err) => {
                    debug!(op, title, error = %err, "Page store call failed");
                    return Err(err);
                }
            }
        }
    }

    pub fn exists(&self, title: &str) -> Result<bool> {
        let attempts = self.throttle.settings().save_attempts;
        self.with_retry("page_exists", title, attempts, |pages| pages.exists(title))
    }

    pub fn read(&self, title: &str) -> Result<String> {
        let attempts = self.throttle.settings().save_attempts;
        self.with_retry("read_page", title, attempts, |pages| pages.read(title))
    }

    /// # Errors
    ///
    /// `ERR_RATE_LIMITED` once every attempt hit a rate limit; any other
    /// store error is returned from the first failing attempt.
    pub fn save(&self, title: &str, text: &str, summary: &str, minor: bool) -> Result<()> {
        let attempts = self.throttle.settings().save_attempts;
        self.with_retry("save_page", title, attempts, |pages| {
            pages.save(title, text, summary, minor)
        })
    }

    /// # Errors
    ///
    /// As [`RateLimitedMutator::save`], with the move attempt count.
    pub fn move_page(
        &self,
        title: &str,
        new_title: &str,
        reason: &str,
        leave_redirect: bool,
    ) -> Result<()> {
        let attempts = self.throttle.settings().move_attempts;
        self.with_retry("move_page", title, attempts, |pages| {
            pages.move_page(title, new_title, reason, leave_redirect)
        })
    }
}
