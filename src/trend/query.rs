//! Trend query parameters, validation and the response envelope served over HTTP.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::engine::{forecast, summarize};
use super::series::{generate_range, point_count, SeasonalPolicy};
use super::types::{Forecast, Granularity, Metric, TrendDataPoint, TrendSummary};

/// Upper bound on points in one response.
pub const MAX_POINTS: usize = 10_000;

/// Errors that can occur while validating a trend query
#[derive(Debug, Clone, PartialEq)]
pub enum TrendQueryError {
    InvalidTimeRange(String),
    InvalidGranularity(String),
    InvalidMetric(String),
    InvalidDate(String),
    InvalidFlag(String),
    InvalidSource(String),
    EmptyWindow,
    TooManyPoints(usize),
}

impl std::fmt::Display for TrendQueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendQueryError::InvalidTimeRange(v) => {
                write!(f, "invalid timeRange '{}': expected 24h, 7d, 30d, 90d or 1y", v)
            }
            TrendQueryError::InvalidGranularity(v) => write!(
                f,
                "invalid granularity '{}': expected hourly, daily, weekly or monthly",
                v
            ),
            TrendQueryError::InvalidMetric(v) => write!(f, "unknown metric '{}'", v),
            TrendQueryError::InvalidDate(v) => {
                write!(f, "invalid date '{}': expected RFC 3339 or YYYY-MM-DD", v)
            }
            TrendQueryError::InvalidFlag(v) => write!(f, "invalid boolean '{}'", v),
            TrendQueryError::InvalidSource(v) => {
                write!(f, "invalid source '{}': expected generated or live", v)
            }
            TrendQueryError::EmptyWindow => write!(f, "startDate must be before endDate"),
            TrendQueryError::TooManyPoints(n) => {
                write!(f, "query covers {} points, limit is {}", n, MAX_POINTS)
            }
        }
    }
}

impl std::error::Error for TrendQueryError {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "1y")]
    Year,
}

impl TimeRange {
    pub fn days(&self) -> u32 {
        match self {
            TimeRange::Day => 1,
            TimeRange::Week => 7,
            TimeRange::Month => 30,
            TimeRange::Quarter => 90,
            TimeRange::Year => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "24h",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
            TimeRange::Quarter => "90d",
            TimeRange::Year => "1y",
        }
    }
}

impl FromStr for TimeRange {
    type Err = TrendQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(TimeRange::Day),
            "7d" => Ok(TimeRange::Week),
            "30d" => Ok(TimeRange::Month),
            "90d" => Ok(TimeRange::Quarter),
            "1y" => Ok(TimeRange::Year),
            other => Err(TrendQueryError::InvalidTimeRange(other.to_string())),
        }
    }
}

/// Where the series behind a response comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesSource {
    #[default]
    Generated,
    Live,
}

impl FromStr for SeriesSource {
    type Err = TrendQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(SeriesSource::Generated),
            "live" => Ok(SeriesSource::Live),
            other => Err(TrendQueryError::InvalidSource(other.to_string())),
        }
    }
}

/// Raw query-string parameters, before validation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendParams {
    pub time_range: Option<String>,
    pub granularity: Option<String>,
    pub metric: Option<String>,
    pub forecast: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub source: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrendQuery {
    pub time_range: TimeRange,
    pub granularity: Granularity,
    /// Echoed into the response metadata. The summary always covers every metric.
    pub metric: Option<Metric>,
    pub forecast: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub source: SeriesSource,
}

impl Default for TrendQuery {
    fn default() -> Self {
        Self {
            time_range: TimeRange::default(),
            granularity: Granularity::Daily,
            metric: None,
            forecast: false,
            start_date: None,
            end_date: None,
            source: SeriesSource::default(),
        }
    }
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, TrendQueryError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| TrendQueryError::InvalidDate(s.to_string()))
}

fn parse_flag(s: &str) -> Result<bool, TrendQueryError> {
    match s {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(TrendQueryError::InvalidFlag(other.to_string())),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl TrendQuery {
    pub fn from_params(params: &TrendParams) -> Result<Self, TrendQueryError> {
        let defaults = Self::default();
        Ok(Self {
            time_range: non_empty(&params.time_range)
                .map(str::parse::<TimeRange>)
                .transpose()?
                .unwrap_or(defaults.time_range),
            granularity: non_empty(&params.granularity)
                .map(str::parse::<Granularity>)
                .transpose()?
                .unwrap_or(defaults.granularity),
            metric: non_empty(&params.metric)
                .map(str::parse::<Metric>)
                .transpose()?,
            forecast: non_empty(&params.forecast)
                .map(parse_flag)
                .transpose()?
                .unwrap_or(false),
            start_date: non_empty(&params.start_date).map(parse_date).transpose()?,
            end_date: non_empty(&params.end_date).map(parse_date).transpose()?,
            source: non_empty(&params.source)
                .map(str::parse::<SeriesSource>)
                .transpose()?
                .unwrap_or_default(),
        })
    }

    /// `[start, end)` of the query. Explicit dates override `time_range`.
    pub fn window(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), TrendQueryError> {
        let end = self.end_date.unwrap_or(now);
        let start = self
            .start_date
            .unwrap_or_else(|| end - Duration::days(i64::from(self.time_range.days())));
        if start >= end {
            return Err(TrendQueryError::EmptyWindow);
        }
        let points = point_count(start, end, self.granularity);
        if points > MAX_POINTS {
            return Err(TrendQueryError::TooManyPoints(points));
        }
        Ok((start, end))
    }

    /// Answer the query from a generated series.
    pub fn run_generated<R: Rng>(
        &self,
        now: DateTime<Utc>,
        policy: &dyn SeasonalPolicy,
        rng: &mut R,
    ) -> Result<TrendResponse, TrendQueryError> {
        let (start, end) = self.window(now)?;
        let series = generate_range(start, end, self.granularity, policy, rng);
        Ok(self.respond((start, end), series, SeriesSource::Generated, now))
    }

    /// Summarize `series` and, if asked, forecast the next period.
    pub fn respond(
        &self,
        (start, end): (DateTime<Utc>, DateTime<Utc>),
        series: Vec<TrendDataPoint>,
        source: SeriesSource,
        now: DateTime<Utc>,
    ) -> TrendResponse {
        let summary = summarize(&series);
        let forecasting = self.forecast.then(|| forecast(&series, &summary));
        let metadata = TrendMetadata {
            time_range: self.time_range,
            granularity: self.granularity,
            metric: self.metric,
            start_date: start,
            end_date: end,
            total_points: series.len(),
            source,
            generated_at: now,
        };
        TrendResponse {
            success: true,
            data: Some(TrendData {
                data: series,
                summary,
                forecasting,
            }),
            metadata: Some(metadata),
            error: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendData {
    pub data: Vec<TrendDataPoint>,
    pub summary: TrendSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecasting: Option<Forecast>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendMetadata {
    pub time_range: TimeRange,
    pub granularity: Granularity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_points: usize,
    pub source: SeriesSource,
    pub generated_at: DateTime<Utc>,
}

/// `{success, data: {data, summary, forecasting?}, metadata}` or `{success: false, error}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TrendData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TrendMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrendResponse {
    pub fn failure(error: &TrendQueryError) -> Self {
        Self {
            success: false,
            data: None,
            metadata: None,
            error: Some(error.to_string()),
        }
    }
}
