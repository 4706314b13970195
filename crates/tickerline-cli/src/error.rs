use thiserror::Error;

use tickerline_core::CascadeError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Cascade(#[from] CascadeError),

    #[error(transparent)]
    Validation(#[from] tickerline_core::ValidationError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Cascade(error) if error.is_client_error() => 2,
            Self::Cascade(_) => 3,
            Self::Validation(_) => 2,
            Self::Command(_) => 2,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickerline_core::{CascadeFailure, Endpoint, Symbol};

    #[test]
    fn cascade_errors_split_by_status() {
        let missing = CliError::from(CascadeError::MissingParameter { name: "symbol" });
        assert_eq!(missing.exit_code(), 2);

        let exhausted = CliError::from(CascadeError::AllProvidersExhausted(CascadeFailure {
            symbol: Symbol::parse("AAPL").expect("symbol"),
            endpoint: Endpoint::Quote,
            attempted: Vec::new(),
            skipped: Vec::new(),
        }));
        assert_eq!(exhausted.exit_code(), 3);
    }
}
