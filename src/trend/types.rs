use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::query::TrendQueryError;

/// One interval of fleet metrics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendDataPoint {
    pub date: DateTime<Utc>,
    pub streams: f64,
    pub viewers: f64,
    /// Mbps
    pub bandwidth: f64,
    /// Dollars for the interval.
    pub cost: f64,
    /// Percent
    pub error_rate: f64,
    /// Milliseconds
    pub response_time: f64,
    /// Percent
    pub uptime: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Streams,
    Viewers,
    Bandwidth,
    Cost,
    ErrorRate,
    ResponseTime,
    Uptime,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Streams,
        Metric::Viewers,
        Metric::Bandwidth,
        Metric::Cost,
        Metric::ErrorRate,
        Metric::ResponseTime,
        Metric::Uptime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Streams => "streams",
            Metric::Viewers => "viewers",
            Metric::Bandwidth => "bandwidth",
            Metric::Cost => "cost",
            Metric::ErrorRate => "errorRate",
            Metric::ResponseTime => "responseTime",
            Metric::Uptime => "uptime",
        }
    }

    pub fn value(&self, point: &TrendDataPoint) -> f64 {
        match self {
            Metric::Streams => point.streams,
            Metric::Viewers => point.viewers,
            Metric::Bandwidth => point.bandwidth,
            Metric::Cost => point.cost,
            Metric::ErrorRate => point.error_rate,
            Metric::ResponseTime => point.response_time,
            Metric::Uptime => point.uptime,
        }
    }

    /// The metric's column, in series order.
    pub fn column(&self, series: &[TrendDataPoint]) -> Vec<f64> {
        series.iter().map(|p| self.value(p)).collect()
    }
}

impl FromStr for Metric {
    type Err = TrendQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s) || snake(m.as_str()) == s)
            .ok_or_else(|| TrendQueryError::InvalidMetric(s.to_string()))
    }
}

fn snake(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 2);
    for c in camel.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }

    /// Interval length. Months are 30 days.
    pub fn step(&self) -> Duration {
        match self {
            Granularity::Hourly => Duration::hours(1),
            Granularity::Daily => Duration::days(1),
            Granularity::Weekly => Duration::days(7),
            Granularity::Monthly => Duration::days(30),
        }
    }

    pub fn hours(&self) -> f64 {
        self.step().num_hours() as f64
    }
}

impl FromStr for Granularity {
    type Err = TrendQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Granularity::Hourly),
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            other => Err(TrendQueryError::InvalidGranularity(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    #[default]
    Stable,
}

/// Direction plus the absolute change in percent, rounded to 2 decimals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: Direction,
    pub percentage: f64,
}

impl Trend {
    pub const STABLE: Trend = Trend {
        direction: Direction::Stable,
        percentage: 0.0,
    };

    /// Percentage with the direction's sign; zero when stable.
    pub fn signed_percentage(&self) -> f64 {
        match self.direction {
            Direction::Up => self.percentage,
            Direction::Down => -self.percentage,
            Direction::Stable => 0.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAverages {
    pub streams: f64,
    pub viewers: f64,
    pub bandwidth: f64,
    pub cost: f64,
    pub error_rate: f64,
    pub response_time: f64,
    pub uptime: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTrends {
    pub streams: Trend,
    pub viewers: Trend,
    pub bandwidth: Trend,
    pub cost: Trend,
    pub error_rate: Trend,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub total_points: usize,
    pub averages: MetricAverages,
    pub trends: MetricTrends,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastValues {
    pub streams: f64,
    pub viewers: f64,
    pub bandwidth: f64,
    pub cost: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub next_period: ForecastValues,
    pub confidence: f64,
    pub methodology: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_accept_camel_and_snake_case() {
        assert_eq!("errorRate".parse::<Metric>().unwrap(), Metric::ErrorRate);
        assert_eq!("error_rate".parse::<Metric>().unwrap(), Metric::ErrorRate);
        assert_eq!("STREAMS".parse::<Metric>().unwrap(), Metric::Streams);
        assert!(matches!(
            "latency".parse::<Metric>(),
            Err(TrendQueryError::InvalidMetric(_))
        ));
    }

    #[test]
    fn metric_serde_matches_as_str() {
        for metric in Metric::ALL {
            assert_eq!(serde_json::to_value(metric).unwrap(), metric.as_str());
        }
    }

    #[test]
    fn signed_percentage_follows_direction() {
        let down = Trend {
            direction: Direction::Down,
            percentage: 12.5,
        };
        assert_eq!(down.signed_percentage(), -12.5);
        let stable = Trend {
            direction: Direction::Stable,
            percentage: 1.5,
        };
        assert_eq!(stable.signed_percentage(), 0.0);
    }

    #[test]
    fn data_point_wire_names() {
        let point = TrendDataPoint {
            date: DateTime::from_timestamp(0, 0).unwrap(),
            streams: 1.0,
            viewers: 2.0,
            bandwidth: 3.0,
            cost: 4.0,
            error_rate: 5.0,
            response_time: 6.0,
            uptime: 7.0,
        };
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["errorRate"], 5.0);
        assert_eq!(json["responseTime"], 6.0);
        assert_eq!(json["date"], "1970-01-01T00:00:00Z");
    }
}
