//! Provider credential lookup.
//!
//! Credentials are supplied from outside the engine. A provider whose
//! credential is absent is skipped by the cascade, never reported as failed.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use crate::ProviderId;

/// Opaque API key. Its value never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank input.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(REDACTED)")
    }
}

/// Credential lookup keyed by provider.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    keys: HashMap<ProviderId, Credential>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every provider's credential from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves credentials through `lookup`, trying the `TICKERLINE_<PROVIDER>_API_KEY`
    /// override first and then each conventional variable name.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut store = Self::new();
        for provider in ProviderId::ALL {
            if !provider.spec().requires_credential() {
                continue;
            }

            let found = env_names(provider)
                .into_iter()
                .filter_map(|name| lookup(&name))
                .find_map(Credential::new);
            if let Some(credential) = found {
                store.keys.insert(provider, credential);
            }
        }
        store
    }

    /// Sets a credential explicitly. Blank values remove any existing entry.
    pub fn with(mut self, provider: ProviderId, key: impl Into<String>) -> Self {
        match Credential::new(key) {
            Some(credential) => {
                self.keys.insert(provider, credential);
            }
            None => {
                self.keys.remove(&provider);
            }
        }
        self
    }

    pub fn get(&self, provider: ProviderId) -> Option<&Credential> {
        self.keys.get(&provider)
    }

    pub fn has(&self, provider: ProviderId) -> bool {
        self.keys.contains_key(&provider)
    }
}

/// Environment variable names checked for `provider`, in priority order.
pub fn env_names(provider: ProviderId) -> Vec<String> {
    let mut names = vec![format!(
        "TICKERLINE_{}_API_KEY",
        provider.as_str().to_ascii_uppercase()
    )];
    if let Some(conventional) = provider.spec().credential {
        names.push(conventional.to_owned());
    }
    match provider {
        ProviderId::TwelveData => names.push(String::from("TWELVE_API_KEY")),
        ProviderId::AlphaVantage => names.push(String::from("ALPHAVANTAGE_API_KEY")),
        _ => {}
    }
    names
}
