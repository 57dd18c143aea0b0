//! 1 Hz driver loop.
//!
//! Every tick re-reads the measurements file, so edits take effect without a
//! restart, and hands the definitions to the [`Scheduler`].

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::client::Controller;
use crate::collector::{Scheduler, TickReport};
use crate::config::{MeasurementDefinition, MeasurementsConfig};
use crate::storage::TimeSeriesSink;

/// Tick period of the driver loop.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Time from `now` to the middle of the next wall-clock second.
///
/// Ticks land half a second away from any boundary, so scheduling jitter
/// cannot make a read jump over a whole second.
pub fn phase_offset(now: DateTime<Utc>) -> Duration {
    let into_second = Duration::from_nanos(u64::from(now.timestamp_subsec_nanos()));
    let half = TICK_PERIOD / 2;
    if into_second < half {
        half - into_second
    } else {
        (TICK_PERIOD + half).saturating_sub(into_second)
    }
}

/// 1 Hz ticker whose first tick falls at the next half second after `now`.
pub fn aligned_ticker(now: DateTime<Utc>) -> Interval {
    let start = Instant::now() + phase_offset(now);
    let mut ticker = tokio::time::interval_at(start, TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Drives a [`Scheduler`] from the wall clock.
pub struct Driver<C, S> {
    scheduler: Scheduler<C, S>,
    measurements_path: PathBuf,
    definitions: Vec<MeasurementDefinition>,
    last_second: Option<i64>,
}

impl<C, S> std::fmt::Debug for Driver<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("measurements_path", &self.measurements_path)
            .field("definitions", &self.definitions.len())
            .field("last_second", &self.last_second)
            .finish_non_exhaustive()
    }
}

impl<C: Controller, S: TimeSeriesSink> Driver<C, S> {
    /// Create a driver starting from an already loaded definition set.
    pub fn new(
        scheduler: Scheduler<C, S>,
        measurements_path: impl Into<PathBuf>,
        definitions: Vec<MeasurementDefinition>,
    ) -> Self {
        Self {
            scheduler,
            measurements_path: measurements_path.into(),
            definitions,
            last_second: None,
        }
    }

    pub fn scheduler(&self) -> &Scheduler<C, S> {
        &self.scheduler
    }

    pub fn definitions(&self) -> &[MeasurementDefinition] {
        &self.definitions
    }

    /// Re-read the measurements file.
    ///
    /// On failure the previous definitions stay in effect and `false` is
    /// returned.
    pub fn reload(&mut self) -> bool {
        match MeasurementsConfig::load(&self.measurements_path) {
            Ok(config) => {
                self.definitions = config.into_definitions();
                true
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.measurements_path.display(),
                    error = %e,
                    "Failed to reload measurements, keeping previous set"
                );
                false
            }
        }
    }

    /// Handle one tick at `now`.
    ///
    /// Returns `None` when `now` falls in the same second as the previous tick,
    /// so a group can never fire twice for one second.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Option<TickReport> {
        let second = now.timestamp();
        if let Some(last) = self.last_second {
            if second <= last {
                tracing::trace!(second, "Repeated second, tick ignored");
                return None;
            }
            if second > last + 1 {
                tracing::warn!(
                    from = last + 1,
                    to = second - 1,
                    skipped = second - last - 1,
                    "Driver fell behind, seconds skipped"
                );
            }
        }
        self.last_second = Some(second);

        self.reload();
        let report = self.scheduler.run(&self.definitions, now).await;
        if report.fired() {
            tracing::debug!(
                tick = %report.tick,
                groups = report.groups.len(),
                points = report.points_written(),
                "Tick complete"
            );
        }
        Some(report)
    }

    /// Tick once per second until `shutdown` resolves.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = aligned_ticker(Utc::now());
        tokio::pin!(shutdown);

        tracing::info!(
            path = %self.measurements_path.display(),
            definitions = self.definitions.len(),
            "Collection loop started"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick(Utc::now()).await;
                }
            }
        }
        tracing::info!("Collection loop stopped");
    }
}
