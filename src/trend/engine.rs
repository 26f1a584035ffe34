//! Pure trend, summary and forecast functions. Degenerate input yields
//! zero-valued defaults, never an error.

use super::types::{
    Direction, Forecast, ForecastValues, Metric, MetricAverages, MetricTrends, Trend,
    TrendDataPoint, TrendSummary,
};

/// Changes smaller than this, in percent, are reported as stable.
pub const STABLE_THRESHOLD_PERCENT: f64 = 2.0;

/// Fixed confidence attached to every forecast. Not derived from the data.
pub const DEFAULT_FORECAST_CONFIDENCE: f64 = 0.75;

pub const FORECAST_METHODOLOGY: &str = "linear trend extrapolation from the most recent point";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Compare the mean of the second half of `values` against the first half.
///
/// The split is by index; with an odd length the extra value lands in the
/// second half. A zero first-half mean reports `up 100%` when the second half
/// is positive and stable otherwise.
pub fn calculate_trend(values: &[f64]) -> Trend {
    if values.len() < 2 {
        return Trend::STABLE;
    }

    let (first, second) = values.split_at(values.len() / 2);
    let first_avg = mean(first);
    let second_avg = mean(second);

    if first_avg == 0.0 {
        return if second_avg > 0.0 {
            Trend {
                direction: Direction::Up,
                percentage: 100.0,
            }
        } else {
            Trend::STABLE
        };
    }

    let change = (second_avg - first_avg) / first_avg * 100.0;
    if !change.is_finite() {
        return Trend::STABLE;
    }

    let direction = if change.abs() < STABLE_THRESHOLD_PERCENT {
        Direction::Stable
    } else if change > 0.0 {
        Direction::Up
    } else {
        Direction::Down
    };

    Trend {
        direction,
        percentage: round2(change.abs()),
    }
}

/// Trend of one metric across a series.
pub fn metric_trend(series: &[TrendDataPoint], metric: Metric) -> Trend {
    calculate_trend(&metric.column(series))
}

/// Arithmetic means of every metric plus the trends of the five headline metrics.
pub fn summarize(series: &[TrendDataPoint]) -> TrendSummary {
    let avg = |metric: Metric| mean(&metric.column(series));

    TrendSummary {
        total_points: series.len(),
        averages: MetricAverages {
            streams: avg(Metric::Streams),
            viewers: avg(Metric::Viewers),
            bandwidth: avg(Metric::Bandwidth),
            cost: avg(Metric::Cost),
            error_rate: avg(Metric::ErrorRate),
            response_time: avg(Metric::ResponseTime),
            uptime: avg(Metric::Uptime),
        },
        trends: MetricTrends {
            streams: metric_trend(series, Metric::Streams),
            viewers: metric_trend(series, Metric::Viewers),
            bandwidth: metric_trend(series, Metric::Bandwidth),
            cost: metric_trend(series, Metric::Cost),
            error_rate: metric_trend(series, Metric::ErrorRate),
        },
    }
}

pub fn forecast(series: &[TrendDataPoint], summary: &TrendSummary) -> Forecast {
    forecast_with_confidence(series, summary, DEFAULT_FORECAST_CONFIDENCE)
}

/// Extend the last point by each metric's signed trend percentage.
///
/// Values are left unrounded so small magnitudes keep the trend's direction.
pub fn forecast_with_confidence(
    series: &[TrendDataPoint],
    summary: &TrendSummary,
    confidence: f64,
) -> Forecast {
    let next_period = match series.last() {
        Some(last) => {
            let project =
                |value: f64, trend: &Trend| value * (1.0 + trend.signed_percentage() / 100.0);
            ForecastValues {
                streams: project(last.streams, &summary.trends.streams),
                viewers: project(last.viewers, &summary.trends.viewers),
                bandwidth: project(last.bandwidth, &summary.trends.bandwidth),
                cost: project(last.cost, &summary.trends.cost),
            }
        }
        None => ForecastValues::default(),
    };

    Forecast {
        next_period,
        confidence,
        methodology: FORECAST_METHODOLOGY.to_string(),
    }
}
