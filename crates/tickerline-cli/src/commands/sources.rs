use serde::Serialize;
use tickerline_core::{
    CascadeRequest, CascadeRouter, Endpoint, Locale, PlannedProvider, ProviderId,
};

use crate::cli::SourcesArgs;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct SourcesView {
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<String>,
    providers: Vec<ProviderView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    locale_rules: Vec<RuleView>,
}

#[derive(Debug, Serialize)]
struct ProviderView {
    id: ProviderId,
    name: &'static str,
    locale: Locale,
    registered: bool,
    requires_credential: bool,
    credential_configured: bool,
    endpoints: Vec<Endpoint>,
    /// Endpoints this provider would actually be tried for right now.
    ready_for: Vec<Endpoint>,
}

impl From<PlannedProvider> for ProviderView {
    fn from(planned: PlannedProvider) -> Self {
        let spec = planned.provider.spec();
        let ready_for = Endpoint::ALL
            .into_iter()
            .filter(|endpoint| planned.skip_reason(*endpoint).is_none())
            .collect();
        Self {
            id: planned.provider,
            name: planned.provider.display_name(),
            locale: planned.locale,
            registered: planned.registered,
            requires_credential: spec.requires_credential(),
            credential_configured: planned.credential_configured,
            endpoints: planned.endpoints,
            ready_for,
        }
    }
}

#[derive(Debug, Serialize)]
struct RuleView {
    suffix: String,
    locale: Locale,
    provider: ProviderId,
}

pub fn run(args: &SourcesArgs, router: &CascadeRouter, pretty: bool) -> Result<(), CliError> {
    output::render(&view(args, router)?, pretty)
}

fn view(args: &SourcesArgs, router: &CascadeRouter) -> Result<SourcesView, CliError> {
    match args.symbol.as_deref() {
        Some(raw) => {
            let request = CascadeRequest::parse(Some(raw), None)?;
            Ok(SourcesView {
                symbol: Some(request.symbol.to_string()),
                providers: router
                    .route_plan(&request.symbol)
                    .into_iter()
                    .map(ProviderView::from)
                    .collect(),
                locale_rules: Vec::new(),
            })
        }
        None => Ok(SourcesView {
            symbol: None,
            providers: router
                .global_plan()
                .into_iter()
                .map(ProviderView::from)
                .collect(),
            locale_rules: router
                .locale()
                .rules()
                .iter()
                .map(|rule| RuleView {
                    suffix: rule.suffix.clone(),
                    locale: rule.locale,
                    provider: rule.provider,
                })
                .collect(),
        }),
    }
}
