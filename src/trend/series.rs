//! Synthetic metric series for dashboards without recorded history.
//!
//! Values are a slowly growing baseline with noise, scaled by a
//! [`SeasonalPolicy`]. This is a documented heuristic, not a fitted model.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use rand::Rng;

use super::types::{Granularity, TrendDataPoint};
use crate::fleet::COST_PER_MBPS_HOUR;

const BASE_STREAMS: f64 = 120.0;
const MBPS_PER_VIEWER: f64 = 2.5;
/// Baseline growth per generated point.
const GROWTH_PER_POINT: f64 = 0.002;

/// Scales demand for the interval starting at `at`.
pub trait SeasonalPolicy: Send + Sync {
    fn multiplier(&self, at: DateTime<Utc>, granularity: Granularity) -> f64;
}

/// Weekend uplift, plus an evening peak for hourly series.
#[derive(Clone, Debug, PartialEq)]
pub struct WeekendPeakPolicy {
    pub weekend_uplift: f64,
    pub peak_uplift: f64,
    /// Inclusive hour range, UTC.
    pub peak_hours: (u32, u32),
}

impl Default for WeekendPeakPolicy {
    fn default() -> Self {
        Self {
            weekend_uplift: 1.3,
            peak_uplift: 1.5,
            peak_hours: (19, 22),
        }
    }
}

impl SeasonalPolicy for WeekendPeakPolicy {
    fn multiplier(&self, at: DateTime<Utc>, granularity: Granularity) -> f64 {
        let mut factor = 1.0;
        if matches!(granularity, Granularity::Hourly | Granularity::Daily)
            && matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
        {
            factor *= self.weekend_uplift;
        }
        if granularity == Granularity::Hourly
            && (self.peak_hours.0..=self.peak_hours.1).contains(&at.hour())
        {
            factor *= self.peak_uplift;
        }
        factor
    }
}

/// Number of intervals of `granularity` covering `[start, end)`, at least one.
pub fn point_count(start: DateTime<Utc>, end: DateTime<Utc>, granularity: Granularity) -> usize {
    let span = (end - start).num_seconds().max(0);
    let step = granularity.step().num_seconds().max(1);
    (((span + step - 1) / step) as usize).max(1)
}

/// `days` of history ending now, with the default seasonal policy.
pub fn generate_series(days: u32, granularity: Granularity) -> Vec<TrendDataPoint> {
    let end = Utc::now();
    let start = end - Duration::days(i64::from(days));
    generate_range(
        start,
        end,
        granularity,
        &WeekendPeakPolicy::default(),
        &mut rand::thread_rng(),
    )
}

/// One point per interval from `start`, stopping before `end`.
pub fn generate_range<R: Rng>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    policy: &dyn SeasonalPolicy,
    rng: &mut R,
) -> Vec<TrendDataPoint> {
    let count = point_count(start, end, granularity);
    let step = granularity.step();
    let hours = granularity.hours();

    let mut date = start;
    let mut points = Vec::with_capacity(count);
    for i in 0..count {
        let demand = (1.0 + GROWTH_PER_POINT * i as f64) * policy.multiplier(date, granularity);
        let streams = (BASE_STREAMS * demand * rng.gen_range(0.9..1.1)).round();
        let viewers = (streams * rng.gen_range(25.0..35.0)).round();
        let bandwidth = viewers * MBPS_PER_VIEWER;
        // Busier intervals answer a little slower.
        let response_time = 60.0 * demand.sqrt() * rng.gen_range(0.85..1.15);

        points.push(TrendDataPoint {
            date,
            streams,
            viewers,
            bandwidth: round2(bandwidth),
            cost: round2(bandwidth * COST_PER_MBPS_HOUR * hours),
            error_rate: round2(rng.gen_range(0.2..2.0)),
            response_time: round2(response_time),
            uptime: round2(rng.gen_range(99.0..100.0)),
        });
        date += step;
    }
    points
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
