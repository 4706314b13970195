//! Locale classification and provider ordering.
//!
//! Symbols listed on a recognized local exchange (by suffix) are served by a
//! single locale provider with no fallback. Every other symbol goes through
//! the global cascade order.

use serde::Serialize;

use crate::{ProviderId, ProviderSpec, Symbol};

/// Locale tag derived from a symbol's exchange suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    India,
    Global,
}

impl Locale {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::India => "india",
            Self::Global => "global",
        }
    }
}

/// Maps an exchange suffix to the provider that serves it exclusively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleRule {
    pub suffix: String,
    pub locale: Locale,
    pub provider: ProviderId,
}

impl LocaleRule {
    pub fn new(suffix: impl Into<String>, locale: Locale, provider: ProviderId) -> Self {
        Self {
            suffix: suffix.into(),
            locale,
            provider,
        }
    }
}

/// Selects the ordered provider list for a symbol. Pure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleRouter {
    rules: Vec<LocaleRule>,
    global_order: Vec<ProviderId>,
}

impl Default for LocaleRouter {
    fn default() -> Self {
        Self {
            rules: vec![
                LocaleRule::new(".NS", Locale::India, ProviderId::Yahoo),
                LocaleRule::new(".BO", Locale::India, ProviderId::Yahoo),
            ],
            global_order: ProviderId::DEFAULT_ORDER.to_vec(),
        }
    }
}

impl LocaleRouter {
    pub fn new(rules: Vec<LocaleRule>, global_order: Vec<ProviderId>) -> Self {
        Self {
            rules,
            global_order,
        }
    }

    pub fn with_global_order(mut self, order: Vec<ProviderId>) -> Self {
        self.global_order = order;
        self
    }

    pub fn with_rule(mut self, rule: LocaleRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn global_order(&self) -> &[ProviderId] {
        &self.global_order
    }

    pub fn rules(&self) -> &[LocaleRule] {
        &self.rules
    }

    pub fn classify(&self, symbol: &Symbol) -> Locale {
        self.matching_rule(symbol)
            .map_or(Locale::Global, |rule| rule.locale)
    }

    /// Ordered provider plan for `symbol`: a singleton for local-exchange
    /// symbols, the global order otherwise.
    pub fn route(&self, symbol: &Symbol) -> Vec<ProviderSpec> {
        match self.matching_rule(symbol) {
            Some(rule) => vec![rule.provider.spec()],
            None => self
                .global_order
                .iter()
                .map(|provider| provider.spec())
                .collect(),
        }
    }

    fn matching_rule(&self, symbol: &Symbol) -> Option<&LocaleRule> {
        self.rules
            .iter()
            .find(|rule| symbol.has_suffix(&rule.suffix))
    }
}
