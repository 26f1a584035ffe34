//! Trend engine: directional trends, summaries and short-horizon forecasts over
//! time-ordered fleet metrics, plus the series they run on.

mod engine;
mod live;
mod query;
mod series;
mod types;

pub use engine::{
    calculate_trend, forecast, forecast_with_confidence, metric_trend, summarize,
    DEFAULT_FORECAST_CONFIDENCE, FORECAST_METHODOLOGY, STABLE_THRESHOLD_PERCENT,
};
pub use live::{LiveSeriesRecorder, DEFAULT_RECORDER_CAPACITY};
pub use query::{
    SeriesSource, TimeRange, TrendData, TrendMetadata, TrendParams, TrendQuery, TrendQueryError,
    TrendResponse, MAX_POINTS,
};
pub use series::{generate_range, generate_series, point_count, SeasonalPolicy, WeekendPeakPolicy};
pub use types::{
    Direction, Forecast, ForecastValues, Granularity, Metric, MetricAverages, MetricTrends, Trend,
    TrendDataPoint, TrendSummary,
};
