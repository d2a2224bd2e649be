// Request-path errors and their HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

/// Everything that aborts a stats request. Parse problems never show up here: malformed
/// lines are dropped inside the parsers.
#[derive(Debug, Error)]
pub enum StatsError {
    /// No session, or the session identity is not the allowed one.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A setting required by the selected backend is missing.
    #[error("{0}")]
    Config(String),

    /// An outbound HTTP call failed or returned a non-success status.
    #[error("{context}: {details}")]
    Upstream { context: String, details: String },

    /// The remote command channel could not be opened or a command could not be run.
    #[error("remote exec failed ({command}): {details}")]
    RemoteExec { command: String, details: String },
}

impl StatsError {
    pub fn upstream(context: impl Into<String>, details: impl ToString) -> Self {
        Self::Upstream {
            context: context.into(),
            details: details.to_string(),
        }
    }

    pub fn remote_exec(command: impl Into<String>, details: impl ToString) -> Self {
        Self::RemoteExec {
            command: command.into(),
            details: details.to_string(),
        }
    }

    pub fn missing_setting(key: &str) -> Self {
        Self::Config(format!("{} not configured", key))
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Config(_) | Self::Upstream { .. } | Self::RemoteExec { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Unauthorized(_) => serde_json::json!({ "error": "Unauthorized" }),
            Self::Config(message) => serde_json::json!({ "error": message }),
            Self::Upstream { .. } | Self::RemoteExec { .. } => serde_json::json!({
                "error": "Failed to fetch stats",
                "details": self.to_string(),
            }),
        };
        (status, axum::Json(body)).into_response()
    }
}
