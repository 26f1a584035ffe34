//! Trend series recorded from live fleet stats updates.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tracing::debug;

use super::query::{SeriesSource, TrendQuery, TrendQueryError, TrendResponse};
use super::types::{Granularity, TrendDataPoint};
use crate::connection::UpdateHandler;
use crate::fleet::{FleetStats, UpdateEnvelope};

pub const DEFAULT_RECORDER_CAPACITY: usize = 10_000;

/// Keeps the most recent fleet stats as trend points, oldest dropped first.
///
/// Each point's `cost` is the fleet's hourly cost at that moment; bucketing
/// scales it to the interval length.
pub struct LiveSeriesRecorder {
    capacity: usize,
    points: Mutex<VecDeque<TrendDataPoint>>,
}

impl Default for LiveSeriesRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_RECORDER_CAPACITY)
    }
}

impl LiveSeriesRecorder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn len(&self) -> usize {
        self.points.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.lock().is_empty()
    }

    pub fn record(&self, date: DateTime<Utc>, stats: &FleetStats) {
        let point = TrendDataPoint {
            date,
            streams: f64::from(stats.total_streams),
            viewers: f64::from(stats.total_viewers),
            bandwidth: stats.total_bandwidth_mbps,
            cost: stats.hourly_cost,
            error_rate: stats.error_rate,
            response_time: stats.avg_latency_ms,
            uptime: stats.uptime,
        };
        let mut points = self.points.lock();
        if points.len() == self.capacity {
            points.pop_front();
        }
        points.push_back(point);
    }

    /// Recorded points in `[start, end)`, averaged per `granularity` interval.
    /// Intervals without samples are omitted.
    pub fn series(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> Vec<TrendDataPoint> {
        let step_secs = granularity.step().num_seconds().max(1);
        let hours = granularity.hours();

        let mut buckets: BTreeMap<i64, Vec<TrendDataPoint>> = BTreeMap::new();
        for point in self.points.lock().iter() {
            if point.date < start || point.date >= end {
                continue;
            }
            let index = (point.date - start).num_seconds() / step_secs;
            buckets.entry(index).or_default().push(point.clone());
        }

        buckets
            .into_iter()
            .filter_map(|(index, samples)| {
                let offset = step_secs.checked_mul(index).and_then(TimeDelta::try_seconds)?;
                let date = start.checked_add_signed(offset)?;
                let n = samples.len() as f64;
                let avg = |f: fn(&TrendDataPoint) -> f64| samples.iter().map(f).sum::<f64>() / n;
                Some(TrendDataPoint {
                    date,
                    streams: avg(|p| p.streams).round(),
                    viewers: avg(|p| p.viewers).round(),
                    bandwidth: avg(|p| p.bandwidth),
                    cost: avg(|p| p.cost) * hours,
                    error_rate: avg(|p| p.error_rate),
                    response_time: avg(|p| p.response_time),
                    uptime: avg(|p| p.uptime),
                })
            })
            .collect()
    }

    /// Answer a trend query from recorded data.
    pub fn run_query(
        &self,
        query: &TrendQuery,
        now: DateTime<Utc>,
    ) -> Result<TrendResponse, TrendQueryError> {
        let window = query.window(now)?;
        let series = self.series(window.0, window.1, query.granularity);
        Ok(query.respond(window, series, SeriesSource::Live, now))
    }
}

#[async_trait::async_trait]
impl UpdateHandler for LiveSeriesRecorder {
    async fn handle_update(&self, envelope: &UpdateEnvelope) {
        let Some(stats) = &envelope.payload.stats else {
            return;
        };
        let Some(date) = DateTime::from_timestamp_millis(envelope.timestamp as i64) else {
            debug!(timestamp = envelope.timestamp, "skipping stats with unrepresentable timestamp");
            return;
        };
        self.record(date, stats);
    }
}
