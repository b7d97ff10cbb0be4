use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    RemoteRequestFailed,
    RemoteApiError,

    PipelineFailed,
    PipelineTimeout,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::RemoteRequestFailed => "remote.request_failed",
            ErrorCode::RemoteApiError => "remote.api_error",

            ErrorCode::PipelineFailed => "pipeline.failed",
            ErrorCode::PipelineTimeout => "pipeline.timeout",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequestFailedDetails {
    pub operation: String,
    pub url: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteApiErrorDetails {
    pub operation: String,
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFailedDetails {
    pub resource: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTimeoutDetails {
    pub resource: String,
    pub waited_minutes: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn config_missing_key(key: impl Into<String>) -> Self {
        let key = key.into();
        let details = serde_json::to_value(ConfigMissingKeyDetails { key: key.clone() })
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ConfigMissingKey,
            format!("Missing required environment variable '{}'", key),
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let problem = problem.into();
        let details = serde_json::to_value(ConfigInvalidValueDetails {
            key: key.clone(),
            value,
            problem: problem.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid value for '{}': {}", key, problem),
            details,
        )
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        let details = serde_json::to_value(MissingArgumentDetails { args })
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            details,
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        allowed: Option<Vec<String>>,
    ) -> Self {
        let details = serde_json::to_value(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            allowed,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn remote_request_failed(
        operation: impl Into<String>,
        url: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        let details = serde_json::to_value(RemoteRequestFailedDetails {
            operation: operation.clone(),
            url: url.into(),
            error: error.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::RemoteRequestFailed,
            format!("Request failed: {}", operation),
            details,
        )
        .with_retryable(true)
    }

    pub fn remote_api_error(
        operation: impl Into<String>,
        url: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        let details = serde_json::to_value(RemoteApiErrorDetails {
            operation: operation.clone(),
            url: url.into(),
            status,
            body: body.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::RemoteApiError,
            format!("API returned HTTP {} for {}", status, operation),
            details,
        )
        .with_retryable(status >= 500)
    }

    pub fn pipeline_failed(resource: impl Into<String>, status: impl Into<String>) -> Self {
        let resource = resource.into();
        let status = status.into();
        let details = serde_json::to_value(PipelineFailedDetails {
            resource: resource.clone(),
            status: status.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::PipelineFailed,
            format!("{} finished with status '{}'", resource, status),
            details,
        )
    }

    pub fn pipeline_timeout(resource: impl Into<String>, waited_minutes: i64) -> Self {
        let resource = resource.into();
        let details = serde_json::to_value(PipelineTimeoutDetails {
            resource: resource.clone(),
            waited_minutes,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::PipelineTimeout,
            format!(
                "Gave up waiting for {} after {} minutes",
                resource, waited_minutes
            ),
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::to_value(InternalIoErrorDetails {
            error: error.into(),
            context,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::to_value(InternalJsonErrorDetails {
            error: error.into(),
            context,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    /// HTTP status carried by `remote.api_error`, if any.
    pub fn http_status(&self) -> Option<u16> {
        if self.code != ErrorCode::RemoteApiError {
            return None;
        }
        self.details
            .get("status")
            .and_then(|v| v.as_u64())
            .map(|s| s as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_to_dotted_strings() {
        assert_eq!(ErrorCode::ConfigMissingKey.as_str(), "config.missing_key");
        assert_eq!(ErrorCode::PipelineTimeout.as_str(), "pipeline.timeout");
        assert_eq!(
            ErrorCode::RemoteRequestFailed.as_str(),
            "remote.request_failed"
        );
    }

    #[test]
    fn api_error_exposes_http_status() {
        let err = Error::remote_api_error("create-branch", "https://x/y", 400, "already exists");
        assert_eq!(err.http_status(), Some(400));
        assert_eq!(err.retryable, Some(false));
    }

    #[test]
    fn transport_error_is_retryable() {
        let err = Error::remote_request_failed("get-pipeline", "https://x/y", "timed out");
        assert_eq!(err.retryable, Some(true));
        assert_eq!(err.http_status(), None);
    }

    #[test]
    fn hints_accumulate_in_order() {
        let err = Error::config_missing_key("OMNIBUS_PROJECT_PATH")
            .with_hint("Set OMNIBUS_PROJECT_PATH to the downstream project path")
            .with_hint("See the CI variables settings page");
        assert_eq!(err.hints.len(), 2);
        assert!(err.message.contains("OMNIBUS_PROJECT_PATH"));
    }
}
