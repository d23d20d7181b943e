use std::path::PathBuf;

/// Errors raised while loading or validating the configuration.
/// All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine the user config directory")]
    NoConfigDir,

    #[error("Could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid theme: {0:?} (must be \"light\" or \"dark\")")]
    InvalidTheme(String),

    #[error("Access token (pat) is required")]
    MissingToken,

    #[error("Host is required")]
    MissingHost,
}

/// Errors from the bulk REST API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {path} failed with status {status}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },
}

/// Errors from the streaming connection.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid authorization header: {0}")]
    InvalidHeader(#[from] tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue),

    #[error("Could not encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A full reconciliation failed. The store is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Failed getting channels for team {team}: {source}")]
    Conversations {
        team: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed getting members for team {team}: {source}")]
    Memberships {
        team: String,
        #[source]
        source: ApiError,
    },
}

/// Fatal errors while looking up who we are, before the supervisor starts.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Could not build HTTP client: {0}")]
    Client(#[source] ApiError),

    #[error("Could not get user info: {0}")]
    Identity(#[source] ApiError),

    #[error("Could not get teams: {0}")]
    Teams(#[source] ApiError),
}
