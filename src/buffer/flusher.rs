use super::EntityPropMap;
use crate::sink::{Sink, UpdateRecord};
use anyhow::{anyhow, Result};
use futures::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Bounded retry for individual sink writes
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each further failure
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Runs `op` until it succeeds or `policy.max_attempts` is exhausted.
pub(crate) async fn with_retry<F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.backoff;
    let mut last_error = None;

    for attempt in 0..max_attempts {
        match op().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(
                    what = %what,
                    attempt = attempt + 1,
                    max_attempts = max_attempts,
                    error = %e,
                    "Sink write failed, will retry"
                );
                last_error = Some(e);

                if attempt + 1 < max_attempts {
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("{}: no attempt made", what)))
}

/// Outcome of one flushed generation
#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    pub generation: u64,
    pub written: usize,
    /// Records whose value could not be serialized
    pub dropped: usize,
}

/// A flush generation that could not be fully written
#[derive(Debug)]
pub enum FlushError {
    /// A record still failed after all retry attempts
    Write {
        generation: u64,
        written: usize,
        source: anyhow::Error,
    },
    /// The flush task panicked
    Aborted { generation: u64 },
}

impl fmt::Display for FlushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushError::Write {
                generation,
                written,
                source,
            } => write!(
                f,
                "flush generation {} failed after {} records: {}",
                generation, written, source
            ),
            FlushError::Aborted { generation } => {
                write!(f, "flush generation {} aborted", generation)
            }
        }
    }
}

impl std::error::Error for FlushError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlushError::Write { source, .. } => Some(&**source),
            FlushError::Aborted { .. } => None,
        }
    }
}

/// Collected results of every flush spawned so far
#[derive(Debug, Default)]
pub struct FlushSummary {
    pub reports: Vec<FlushReport>,
    pub failures: Vec<FlushError>,
}

impl FlushSummary {
    pub fn written(&self) -> usize {
        self.reports.iter().map(|r| r.written).sum()
    }

    pub fn dropped(&self) -> usize {
        self.reports.iter().map(|r| r.dropped).sum()
    }
}

/// Outstanding flush task counter with a wait-for-zero primitive
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            in_flight: Arc::clone(self),
        }
    }

    fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // register before checking so a completion in between is not missed
            notified.as_mut().enable();

            if self.current() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements on drop, so a finished, failed or panicked task all count down.
struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.in_flight.idle.notify_waiters();
        }
    }
}

/// Writes drained cache generations to the sink on background tasks.
///
/// Each snapshot is moved into exactly one task, so tasks never share data
/// with ingestion or with each other. Nothing orders records across
/// generations.
pub struct FlushExecutor {
    sink: Arc<dyn Sink>,
    session_id: String,
    retry: RetryPolicy,
    in_flight: Arc<InFlight>,
    handles: Vec<(u64, JoinHandle<Result<FlushReport, FlushError>>)>,
    next_generation: u64,
}

impl FlushExecutor {
    pub fn new(sink: Arc<dyn Sink>, session_id: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            sink,
            session_id: session_id.into(),
            retry,
            in_flight: Arc::new(InFlight::default()),
            handles: Vec::new(),
            next_generation: 0,
        }
    }

    /// Spawns a task writing `snapshot`; returns its generation number.
    ///
    /// An empty snapshot spawns nothing and returns `None`. Must be called
    /// from within a tokio runtime.
    pub fn flush(&mut self, snapshot: EntityPropMap) -> Option<u64> {
        if snapshot.is_empty() {
            return None;
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let guard = self.in_flight.enter();
        let sink = Arc::clone(&self.sink);
        let session_id = self.session_id.clone();
        let retry = self.retry.clone();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            write_generation(sink.as_ref(), &session_id, generation, snapshot, &retry).await
        });
        self.handles.push((generation, handle));

        Some(generation)
    }

    /// Number of flush tasks still running
    pub fn in_flight(&self) -> usize {
        self.in_flight.current()
    }

    /// Number of flush tasks spawned so far
    pub fn generations(&self) -> u64 {
        self.next_generation
    }

    /// Waits until no flush task is running.
    pub async fn wait_idle(&self) {
        self.in_flight.wait_idle().await;
    }

    /// Waits for every spawned flush and collects their outcomes.
    pub async fn join_all(&mut self) -> FlushSummary {
        let handles = std::mem::take(&mut self.handles);
        let generations: Vec<u64> = handles.iter().map(|(g, _)| *g).collect();
        let results = join_all(handles.into_iter().map(|(_, h)| h)).await;

        let mut summary = FlushSummary::default();
        for (generation, result) in generations.into_iter().zip(results) {
            match result {
                Ok(Ok(report)) => summary.reports.push(report),
                Ok(Err(e)) => summary.failures.push(e),
                Err(e) => {
                    error!(generation = generation, error = %e, "Flush task did not complete");
                    summary.failures.push(FlushError::Aborted { generation });
                }
            }
        }
        summary
    }
}

async fn write_generation(
    sink: &dyn Sink,
    session_id: &str,
    generation: u64,
    snapshot: EntityPropMap,
    retry: &RetryPolicy,
) -> Result<FlushReport, FlushError> {
    let mut written = 0;
    let mut dropped = 0;

    for (index, props) in snapshot {
        for (property, update) in props {
            let value = match update.value.to_column_json() {
                Ok(v) => v,
                Err(e) => {
                    error!(
                        generation = generation,
                        entity = index,
                        property = %property,
                        error = %e,
                        "Failed to serialize buffered value, dropping record"
                    );
                    dropped += 1;
                    continue;
                }
            };

            let record = UpdateRecord {
                session_id: session_id.to_string(),
                index,
                tick: update.tick,
                property,
                value,
            };

            with_retry(retry, "entity prop", || sink.write_update(&record))
                .await
                .map_err(|source| FlushError::Write {
                    generation,
                    written,
                    source,
                })?;
            written += 1;
        }
    }

    debug!(
        generation = generation,
        written = written,
        dropped = dropped,
        "Flush generation written"
    );

    Ok(FlushReport {
        generation,
        written,
        dropped,
    })
}
