use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::errors::StressError;
use crate::work::{RequestOutcome, Work};

/// One load test: call `work` at `requests_per_second` for `duration`.
#[derive(Clone)]
pub struct LoadTestConfig {
    name: String,
    requests_per_second: u32,
    duration: Duration,
    work: Arc<dyn Work>,
    max_in_flight: Option<usize>,
}

impl LoadTestConfig {
    pub fn new(
        name: impl Into<String>,
        requests_per_second: u32,
        duration: Duration,
        work: impl Work + 'static,
    ) -> Result<Self, StressError> {
        Self::with_shared_work(name, requests_per_second, duration, Arc::new(work))
    }

    pub fn with_shared_work(
        name: impl Into<String>,
        requests_per_second: u32,
        duration: Duration,
        work: Arc<dyn Work>,
    ) -> Result<Self, StressError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StressError::Config("load test name must not be empty".into()));
        }
        if requests_per_second == 0 {
            return Err(StressError::Config(format!(
                "{name}: requests_per_second must be greater than 0"
            )));
        }
        if (Duration::from_secs(1) / requests_per_second).is_zero() {
            return Err(StressError::Config(format!(
                "{name}: requests_per_second {requests_per_second} is too high"
            )));
        }
        if duration.is_zero() {
            return Err(StressError::Config(format!(
                "{name}: duration must be greater than 0"
            )));
        }
        Ok(Self {
            name,
            requests_per_second,
            duration,
            work,
            max_in_flight: None,
        })
    }

    /// Caps the number of units calling `work` at the same time.
    ///
    /// Ticks are still dispatched on schedule; units over the cap wait for
    /// a slot before calling `work`.
    pub fn max_in_flight(mut self, limit: usize) -> Result<Self, StressError> {
        if limit == 0 {
            return Err(StressError::Config(format!(
                "{}: max_in_flight must be greater than 0",
                self.name
            )));
        }
        self.max_in_flight = Some(limit);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn max_in_flight_limit(&self) -> Option<usize> {
        self.max_in_flight
    }

    /// Time between two dispatch ticks.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(1) / self.requests_per_second
    }

    /// Number of units dispatched over the whole run: `floor(duration * rate)`.
    pub fn dispatch_budget(&self) -> u64 {
        let units = self.duration.as_nanos() * u128::from(self.requests_per_second) / 1_000_000_000;
        u64::try_from(units).unwrap_or(u64::MAX)
    }
}

impl fmt::Debug for LoadTestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadTestConfig")
            .field("name", &self.name)
            .field("requests_per_second", &self.requests_per_second)
            .field("duration", &self.duration)
            .field("max_in_flight", &self.max_in_flight)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    success: u64,
    error: u64,
}

impl Tally {
    fn record(&mut self, outcome: RequestOutcome) {
        match outcome {
            RequestOutcome::Success => self.success += 1,
            RequestOutcome::Failure => self.error += 1,
        }
    }
}

/// Aggregate outcome of one load test.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LoadTestResult {
    pub name: String,
    pub requests_per_second: u32,
    pub total_requests: u64,
    pub success_count: u64,
    pub error_count: u64,
    /// Percent of requests that succeeded; `0.0` when nothing was dispatched.
    pub success_rate: f64,
    /// Percent of requests that failed; `0.0` when nothing was dispatched.
    pub error_rate: f64,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl LoadTestResult {
    fn from_tally(config: &LoadTestConfig, tally: Tally, elapsed: Duration) -> Self {
        let total = tally.success + tally.error;
        let (success_rate, error_rate) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                tally.success as f64 / total as f64 * 100.0,
                tally.error as f64 / total as f64 * 100.0,
            )
        };
        Self {
            name: config.name.clone(),
            requests_per_second: config.requests_per_second,
            total_requests: total,
            success_count: tally.success,
            error_count: tally.error,
            success_rate,
            error_rate,
            elapsed,
        }
    }
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

impl fmt::Display for LoadTestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stress test: {} completed", self.name)?;
        writeln!(f, "Requests per second: {}", self.requests_per_second)?;
        writeln!(f, "Total requests: {}", self.total_requests)?;
        writeln!(f, "Error count: {}", self.error_count)?;
        writeln!(f, "Success count: {}", self.success_count)?;
        writeln!(f, "Error rate: {:.2}%", self.error_rate)?;
        write!(f, "Success rate: {:.2}%", self.success_rate)
    }
}

/// Runs one load test to completion.
///
/// A unit is dispatched on every tick, the first one immediately, until
/// either the dispatch budget (`floor(duration * rate)`) is spent or the
/// duration elapses. Then no new units start and every dispatched unit is
/// awaited before the result is computed. A unit that panics counts as an
/// error.
pub async fn run_load_test(config: &LoadTestConfig) -> LoadTestResult {
    let interval = config.interval();
    let tally = Arc::new(Mutex::new(Tally::default()));
    let slots = config.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));
    let mut in_flight: JoinSet<()> = JoinSet::new();
    let budget = config.dispatch_budget();
    let mut dispatched: u64 = 0;

    info!(
        test = %config.name,
        rps = config.requests_per_second,
        budget,
        duration_ms = config.duration.as_millis() as u64,
        "load test started"
    );
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    let deadline = tokio::time::sleep(config.duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = &mut deadline => break,
            _ = ticker.tick(), if dispatched < budget => {
                dispatched += 1;
                in_flight.spawn(dispatch(
                    config.work.clone(),
                    tally.clone(),
                    slots.clone(),
                ));
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                reap(joined, &tally).await;
            }
        }
    }

    debug!(
        test = %config.name,
        dispatched,
        in_flight = in_flight.len(),
        "dispatch stopped, waiting for in-flight requests"
    );
    while let Some(joined) = in_flight.join_next().await {
        reap(joined, &tally).await;
    }

    let tally = *tally.lock().await;
    debug_assert_eq!(tally.success + tally.error, dispatched);
    let result = LoadTestResult::from_tally(config, tally, started.elapsed());
    info!(
        test = %result.name,
        total = result.total_requests,
        errors = result.error_count,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "load test finished"
    );
    result
}

async fn dispatch(work: Arc<dyn Work>, tally: Arc<Mutex<Tally>>, slots: Option<Arc<Semaphore>>) {
    let _slot = match slots {
        Some(slots) => slots.acquire_owned().await.ok(),
        None => None,
    };
    let result = work.call().await;
    if let Err(err) = &result {
        debug!(error = %err, "request failed");
    }
    tally.lock().await.record(RequestOutcome::from(&result));
}

async fn reap(joined: Result<(), JoinError>, tally: &Mutex<Tally>) {
    if let Err(err) = joined {
        warn!(error = %err, "request task did not complete");
        tally.lock().await.record(RequestOutcome::Failure);
    }
}

/// Runs several load tests concurrently; results come back in input order.
pub async fn run_load_tests(configs: &[LoadTestConfig]) -> Vec<LoadTestResult> {
    futures::future::join_all(configs.iter().map(run_load_test)).await
}
