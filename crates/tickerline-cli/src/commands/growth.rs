use serde::Serialize;
use tickerline_core::{
    CascadeRequest, CascadeResult, CascadeRouter, ErrorEnvelope, Growth, GrowthMetric, UtcDateTime,
};
use tracing::debug;

use crate::cli::GrowthArgs;
use crate::error::CliError;
use crate::output;

/// Growth figures with the provider that served the underlying data.
#[derive(Debug, Serialize)]
pub struct GrowthView {
    #[serde(flatten)]
    pub growth: Growth,
    pub source: &'static str,
    #[serde(rename = "lastUpdated")]
    pub last_updated: UtcDateTime,
}

impl GrowthView {
    pub fn from_result(
        result: &CascadeResult,
        metric: GrowthMetric,
        years: u32,
    ) -> Result<Self, CliError> {
        let growth = Growth::measure(&result.data, metric, years).ok_or_else(|| {
            CliError::Command(format!(
                "{} data cannot be measured as {metric}",
                result.data.endpoint()
            ))
        })?;
        Ok(Self {
            growth,
            source: result.source.display_name(),
            last_updated: result.last_updated,
        })
    }
}

/// Fetches the endpoint behind `args.metric` and prints its CAGR.
pub async fn run(args: &GrowthArgs, router: &CascadeRouter, pretty: bool) -> Result<(), CliError> {
    let endpoint = args.metric.endpoint().as_str();
    let request = match CascadeRequest::parse(Some(&args.symbol), Some(endpoint)) {
        Ok(request) => request,
        Err(error) => {
            let envelope =
                ErrorEnvelope::from_error(&error).with_request(Some(&args.symbol), Some(endpoint));
            output::render(&envelope, pretty)?;
            return Err(error.into());
        }
    };

    match router.fetch(&request).await {
        Ok(result) => {
            let view = GrowthView::from_result(&result, args.metric, args.years)?;
            debug!(
                source = view.source,
                metric = args.metric.as_str(),
                defined = view.growth.cagr.is_some(),
                "growth measured"
            );
            output::render(&view, pretty)
        }
        Err(error) => {
            output::render(&ErrorEnvelope::for_request(&error, &request), pretty)?;
            Err(error.into())
        }
    }
}
