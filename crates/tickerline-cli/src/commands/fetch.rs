use tickerline_core::{CascadeRequest, CascadeRouter, ErrorEnvelope};
use tracing::debug;

use crate::cli::FetchArgs;
use crate::error::CliError;
use crate::output;

/// Prints the cascade result, or the failure envelope before returning the
/// error so the exit code reflects it.
pub async fn run(args: &FetchArgs, router: &CascadeRouter, pretty: bool) -> Result<(), CliError> {
    let request = match CascadeRequest::parse(Some(&args.symbol), Some(&args.endpoint)) {
        Ok(request) => request,
        Err(error) => {
            let envelope = ErrorEnvelope::from_error(&error)
                .with_request(Some(&args.symbol), Some(&args.endpoint));
            output::render(&envelope, pretty)?;
            return Err(error.into());
        }
    };

    match router.fetch(&request).await {
        Ok(result) => {
            debug!(
                source = result.source.as_str(),
                failed_before = result.failures.len(),
                cache_hit = result.cache_hit,
                "fetch complete"
            );
            output::render(&result, pretty)
        }
        Err(error) => {
            output::render(&ErrorEnvelope::for_request(&error, &request), pretty)?;
            Err(error.into())
        }
    }
}
