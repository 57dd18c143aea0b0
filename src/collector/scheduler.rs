//! Interval-group scheduling.
//!
//! Active definitions are grouped by `collect_interval`. On every tick, each
//! group whose interval divides the tick's unix second fires: the controller
//! session and the sink are re-established, every measurement of the group is
//! collected, and the group's points go to the sink in one write.

use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};

use crate::client::Controller;
use crate::collector::{CollectContext, execute};
use crate::config::MeasurementDefinition;
use crate::storage::{Origin, Point, TimeSeriesSink};

/// Active definitions keyed by interval, shortest interval first.
pub fn partition(
    measurements: &[MeasurementDefinition],
) -> BTreeMap<u64, Vec<&MeasurementDefinition>> {
    let mut groups: BTreeMap<u64, Vec<&MeasurementDefinition>> = BTreeMap::new();
    for definition in measurements.iter().filter(|d| d.active) {
        groups
            .entry(definition.collect_interval)
            .or_default()
            .push(definition);
    }
    groups
}

/// Whether a group of `interval` seconds fires at `unix_seconds`.
pub fn is_due(unix_seconds: i64, interval: u64) -> bool {
    match i64::try_from(interval) {
        Ok(interval) if interval > 0 => unix_seconds.rem_euclid(interval) == 0,
        _ => false,
    }
}

/// Outcome of one fired group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupReport {
    pub interval: u64,
    /// Measurements that were collected successfully.
    pub collected: Vec<String>,
    /// Measurements skipped after an error.
    pub failed: Vec<String>,
    pub points_written: usize,
    /// Session or write failure that aborted the group.
    pub error: Option<String>,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: DateTime<Utc>,
    /// Fired groups, in interval order.
    pub groups: Vec<GroupReport>,
}

impl TickReport {
    pub fn fired(&self) -> bool {
        !self.groups.is_empty()
    }

    pub fn points_written(&self) -> usize {
        self.groups.iter().map(|g| g.points_written).sum()
    }
}

/// Owns the controller session and the sink and fires due groups.
pub struct Scheduler<C, S> {
    controller: C,
    sink: S,
    origin: Origin,
}

impl<C, S> std::fmt::Debug for Scheduler<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl<C: Controller, S: TimeSeriesSink> Scheduler<C, S> {
    pub fn new(controller: C, sink: S, origin: Origin) -> Self {
        Self {
            controller,
            sink,
            origin,
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Fire every group due at `tick`.
    ///
    /// Failures never escape: they are logged and recorded in the report.
    pub async fn run(
        &mut self,
        measurements: &[MeasurementDefinition],
        tick: DateTime<Utc>,
    ) -> TickReport {
        let tick = tick.with_nanosecond(0).unwrap_or(tick);
        let mut report = TickReport {
            tick,
            groups: Vec::new(),
        };

        for (interval, definitions) in partition(measurements) {
            if is_due(tick.timestamp(), interval) {
                let group = self.run_group(interval, &definitions, tick).await;
                report.groups.push(group);
            }
        }
        report
    }

    async fn run_group(
        &mut self,
        interval: u64,
        definitions: &[&MeasurementDefinition],
        now: DateTime<Utc>,
    ) -> GroupReport {
        let mut report = GroupReport {
            interval,
            ..GroupReport::default()
        };
        tracing::info!(
            interval,
            tick = %now,
            measurements = definitions.len(),
            "Collecting interval group"
        );

        if let Err(e) = self.controller.connect().await {
            tracing::error!(interval, error = %e, "Controller session failed, skipping group");
            report.error = Some(e.to_string());
            return report;
        }
        if let Err(e) = self.sink.connect().await {
            tracing::error!(interval, error = %e, "Sink connection failed, skipping group");
            report.error = Some(e.to_string());
            return report;
        }

        let ctx = CollectContext {
            client: &self.controller,
            origin: &self.origin,
            now,
        };
        let mut batch: Vec<Point> = Vec::new();
        for definition in definitions {
            match execute(definition, &ctx).await {
                Ok(points) => {
                    tracing::debug!(
                        measurement = %definition.name,
                        query_type = %definition.query_type,
                        points = points.len(),
                        "Measurement collected"
                    );
                    batch.extend(points);
                    report.collected.push(definition.name.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        measurement = %definition.name,
                        endpoint = %definition.url_endpoint,
                        error = %e,
                        "Measurement failed, skipping"
                    );
                    report.failed.push(definition.name.clone());
                }
            }
        }

        match self.sink.write(&batch).await {
            Ok(()) => {
                report.points_written = batch.len();
                tracing::info!(interval, points = batch.len(), "Interval group written");
            }
            Err(e) => {
                tracing::error!(interval, points = batch.len(), error = %e, "Sink write failed");
                report.error = Some(e.to_string());
            }
        }
        report
    }
}
