//! Error types for dispatch-console
//!
//! Centralized error handling using snafu for ergonomic error definitions.

use snafu::Snafu;

/// Main error type for the console library
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Invalid input or configuration
    #[snafu(display("Invalid: {message}"))]
    Invalid { message: String },

    /// The backend answered with a non-success status
    #[snafu(display("{message} (HTTP {status})"))]
    Api { status: u16, message: String },

    /// Transport failure talking to the backend (DNS, TLS, timeout, ...)
    #[snafu(display("HTTP error: {source}"))]
    Http { source: reqwest::Error },

    /// No session token is available for an authenticated call
    #[snafu(display("Not logged in"))]
    Unauthenticated,

    /// Push-event connection error
    #[snafu(display("Socket error: {message}"))]
    Socket { message: String },

    /// Malformed packet on the push-event channel
    #[snafu(display("Protocol error: {message}"))]
    Protocol { message: String },

    /// IO error (file operations, network, etc.)
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// JSON serialization/deserialization error
    #[snafu(display("JSON error: {source}"))]
    Json { source: serde_json::Error },

    /// TOML deserialization error
    #[snafu(display("TOML parse error: {source}"))]
    TomlDe { source: toml::de::Error },

    /// TOML serialization error
    #[snafu(display("TOML serialize error: {source}"))]
    TomlSe { source: toml::ser::Error },
}

impl Error {
    /// Whether the backend rejected the session token
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Unauthenticated)
            || matches!(self, Error::Api { status, .. } if *status == 401 || *status == 403)
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::Json { source }
    }
}

impl From<toml::de::Error> for Error {
    fn from(source: toml::de::Error) -> Self {
        Error::TomlDe { source }
    }
}

impl From<toml::ser::Error> for Error {
    fn from(source: toml::ser::Error) -> Self {
        Error::TomlSe { source }
    }
}

impl From<reqwest::Error> for Error {
    fn from(source: reqwest::Error) -> Self {
        Error::Http { source }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(source: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Socket {
            message: source.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T, E = Error> = std::result::Result<T, E>;
