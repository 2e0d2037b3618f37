//! Error types for the visual-markets system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the visual-markets system.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No session config file registered under this name.
    #[error("Unknown session config: {0}")]
    UnknownConfig(String),

    /// Round number beyond the configured experiment length.
    #[error("Round {round} is beyond the configured {num_rounds} rounds")]
    RoundOutOfRange { round: u32, num_rounds: u32 },

    /// Utility expression could not be parsed or evaluated.
    #[error("Expression error: {0}")]
    Expression(String),

    /// Error reported by the exchange.
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// No trader with this participant code in the market.
    #[error("Unknown trader: {0}")]
    UnknownTrader(String),

    /// Output generation error.
    #[error("Output error: {0}")]
    Output(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an expression error.
    pub fn expression(msg: impl Into<String>) -> Self {
        Error::Expression(msg.into())
    }

    /// Create an exchange error.
    pub fn exchange(msg: impl Into<String>) -> Self {
        Error::Exchange(msg.into())
    }

    /// Create an output error.
    pub fn output(msg: impl Into<String>) -> Self {
        Error::Output(msg.into())
    }
}
