mod batch;
mod fetch;
mod growth;
mod sources;

use std::time::Duration;

use tickerline_core::{CascadeRouter, CascadeRouterBuilder};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let router = build_router(cli);

    match &cli.command {
        Command::Fetch(args) => fetch::run(args, &router, cli.pretty).await,
        Command::Sources(args) => sources::run(args, &router, cli.pretty),
        Command::Growth(args) => growth::run(args, &router, cli.pretty).await,
        Command::Batch(args) => {
            let summary = batch::run(args, &router).await?;
            crate::output::render(&summary, cli.pretty)
        }
    }
}

/// Environment configuration first, then command-line overrides.
fn build_router(cli: &Cli) -> CascadeRouter {
    let mut builder = CascadeRouterBuilder::from_env();
    if let Some(millis) = cli.timeout_ms.filter(|millis| *millis > 0) {
        builder = builder.with_timeout(Duration::from_millis(millis));
    }
    if !cli.providers.is_empty() {
        builder = builder.with_provider_order(cli.providers.iter().copied());
    }
    builder.build()
}
