//! The aggregation loop.
//!
//! Every tick picks the one feed fetched longest ago (never-fetched feeds
//! first), stamps it as fetched, then downloads and ingests it. Stamping
//! before fetching keeps a broken feed from jumping the queue on every tick.
//! Failures are logged and end only the current tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::db::{Database, DbError, Feed};
use crate::fetcher::{FetchError, Fetcher};
use crate::ingest::{ingest_document, IngestReport};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Error)]
pub enum TickError {
    #[error("could not pick the next feed: {0}")]
    Select(#[source] DbError),
    #[error("could not stamp feed '{feed}': {source}")]
    Stamp {
        feed: String,
        #[source]
        source: DbError,
    },
}

#[derive(Debug)]
pub enum TickOutcome {
    /// There were no feeds to fetch
    Idle,
    Ingested { feed: Feed, report: IngestReport },
    FetchFailed { feed: Feed, error: FetchError },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("empty interval")]
    Empty,
    #[error("invalid interval '{0}', expected e.g. 30s, 1m, 1h30m")]
    Invalid(String),
    #[error("unknown interval unit '{0}'")]
    UnknownUnit(String),
    #[error("interval must be greater than zero")]
    Zero,
}

/// Parse intervals such as `30s`, `1m`, `1h30m`, `500ms` or `5hrs`.
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(IntervalError::Empty);
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(IntervalError::Invalid(input.to_string()));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| IntervalError::Invalid(input.to_string()))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let step = match unit {
            "ms" => Duration::from_millis(value),
            "s" | "sec" | "secs" => Duration::from_secs(value),
            "m" | "min" | "mins" => Duration::from_secs(value.saturating_mul(60)),
            "h" | "hr" | "hrs" => Duration::from_secs(value.saturating_mul(3600)),
            "" => return Err(IntervalError::Invalid(input.to_string())),
            other => return Err(IntervalError::UnknownUnit(other.to_string())),
        };
        total = total.saturating_add(step);
    }

    if total.is_zero() {
        return Err(IntervalError::Zero);
    }
    Ok(total)
}

#[derive(Clone)]
pub struct Scheduler {
    db: Database,
    fetcher: Fetcher,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(db: Database, fetcher: Fetcher) -> Self {
        Self {
            db,
            fetcher,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// One fetch cycle for the least recently fetched feed.
    pub async fn tick(&self) -> Result<TickOutcome, TickError> {
        let Some(feed) = self
            .db
            .get_next_feed_to_fetch()
            .await
            .map_err(TickError::Select)?
        else {
            return Ok(TickOutcome::Idle);
        };

        self.db
            .update_feed_fetch_time(feed.id, self.clock.now())
            .await
            .map_err(|source| TickError::Stamp {
                feed: feed.name.clone(),
                source,
            })?;

        info!("Fetching feed: {} ({})", feed.name, feed.url);
        let doc = match self.fetcher.fetch(&feed.url).await {
            Ok(doc) => doc,
            Err(error) => return Ok(TickOutcome::FetchFailed { feed, error }),
        };

        let report = ingest_document(&self.db, &feed, &doc, self.clock.now()).await;
        Ok(TickOutcome::Ingested { feed, report })
    }

    async fn logged_tick(&self) {
        match self.tick().await {
            Ok(TickOutcome::Idle) => info!("No feeds to fetch yet"),
            Ok(TickOutcome::Ingested { .. }) => {}
            Ok(TickOutcome::FetchFailed { feed, error }) => {
                warn!("Failed to fetch feed '{}': {}", feed.name, error)
            }
            Err(e) => error!("Aggregation tick failed: {}", e),
        }
    }

    /// Tick every `interval`, starting immediately, until `shutdown` resolves.
    /// Returns the number of ticks run.
    pub async fn run<F>(&self, interval: Duration, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut ticks = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Stopping aggregation after {} ticks", ticks);
                    return ticks;
                }
                _ = ticker.tick() => {
                    // The tick body runs outside the select, so it always completes.
                }
            }
            self.logged_tick().await;
            ticks += 1;
        }
    }
}
