use anyhow::{bail, Context, Result};
use chrono::Utc;

use crate::cli::TrendsArgs;
use crate::trend::{TrendParams, TrendQuery, TrendResponse, WeekendPeakPolicy};

impl From<&TrendsArgs> for TrendParams {
    fn from(args: &TrendsArgs) -> Self {
        TrendParams {
            time_range: Some(args.time_range.clone()),
            granularity: Some(args.granularity.clone()),
            metric: args.metric.clone(),
            forecast: Some(args.forecast.to_string()),
            start_date: args.start_date.clone(),
            end_date: args.end_date.clone(),
            source: None,
        }
    }
}

/// Build the trends endpoint URL for a server base URL.
pub fn trends_endpoint(base: &str) -> String {
    format!("{}/api/analytics/trends", base.trim_end_matches('/'))
}

async fn fetch_remote(base: &str, params: &TrendParams) -> Result<TrendResponse> {
    let endpoint = trends_endpoint(base);
    let response = reqwest::Client::new()
        .get(&endpoint)
        .query(params)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", endpoint))?;
    let body: TrendResponse = response
        .json()
        .await
        .context("Server returned an unexpected body")?;
    Ok(body)
}

pub async fn execute_trends(args: TrendsArgs) -> Result<()> {
    let params = TrendParams::from(&args);

    let response = match &args.url {
        Some(base) => fetch_remote(base, &params).await?,
        None => {
            let query = TrendQuery::from_params(&params)?;
            query.run_generated(Utc::now(), &WeekendPeakPolicy::default(), &mut rand::thread_rng())?
        }
    };

    if !response.success {
        bail!(
            "Trend query failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
