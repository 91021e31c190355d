//! Error taxonomy shared by every crate on the request path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::ErrorCode;

/// Boxed foreign error kept as the source of an [`Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Category of an [`Error`], with the structured detail each category carries.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    ConnectionFailed,
    ConnectionTimeout,
    ReconnectionFailed {
        attempts: u32,
    },
    MalformedResponse,
    CommandTimeout {
        method: String,
    },
    /// `code` is either [`ErrorCode::InvalidApiKey`] or [`ErrorCode::UnauthorizedClient`].
    AuthenticationFailed {
        code: ErrorCode,
    },
    RateLimitExceeded {
        limit: u32,
        window_ms: u64,
        remaining: u32,
    },
    ValidationFailed {
        field: Option<String>,
        value: Option<Value>,
    },
    MissingParameter {
        field: String,
    },
    InvalidParameter {
        field: String,
        value: Value,
        expected: String,
    },
    /// The remote application reported a failure. `code` is the remote's own code.
    RemoteCommandFailed {
        code: Option<i64>,
        data: Option<Value>,
    },
    ElementNotFound {
        element_id: Value,
    },
    TransactionFailed {
        name: String,
    },
    ConfigurationError {
        key: String,
    },
    CircuitOpen,
    Internal,
}

impl ErrorKind {
    /// Stable code for this category.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ConnectionFailed => ErrorCode::ConnectionFailed,
            Self::ConnectionTimeout => ErrorCode::ConnectionTimeout,
            Self::ReconnectionFailed { .. } => ErrorCode::ReconnectionFailed,
            Self::MalformedResponse => ErrorCode::MalformedResponse,
            Self::CommandTimeout { .. } => ErrorCode::CommandTimeout,
            Self::AuthenticationFailed { code } => *code,
            Self::RateLimitExceeded { .. } => ErrorCode::RateLimitExceeded,
            Self::ValidationFailed { .. } => ErrorCode::InvalidInput,
            Self::MissingParameter { .. } => ErrorCode::MissingParameter,
            Self::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            Self::RemoteCommandFailed { .. } => ErrorCode::RemoteCommandFailed,
            Self::ElementNotFound { .. } => ErrorCode::ElementNotFound,
            Self::TransactionFailed { .. } => ErrorCode::TransactionFailed,
            Self::ConfigurationError { .. } => ErrorCode::ConfigurationError,
            Self::CircuitOpen => ErrorCode::CircuitOpen,
            Self::Internal => ErrorCode::InternalError,
        }
    }

    /// Short type name used in serialized errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionFailed => "ConnectionError",
            Self::ConnectionTimeout => "TimeoutError",
            Self::ReconnectionFailed { .. } => "ReconnectionError",
            Self::MalformedResponse => "MalformedResponseError",
            Self::CommandTimeout { .. } => "CommandTimeoutError",
            Self::AuthenticationFailed { .. } => "AuthenticationError",
            Self::RateLimitExceeded { .. } => "RateLimitError",
            Self::ValidationFailed { .. } => "ValidationError",
            Self::MissingParameter { .. } => "MissingParameterError",
            Self::InvalidParameter { .. } => "InvalidParameterError",
            Self::RemoteCommandFailed { .. } => "RemoteCommandError",
            Self::ElementNotFound { .. } => "ElementNotFoundError",
            Self::TransactionFailed { .. } => "TransactionError",
            Self::ConfigurationError { .. } => "ConfigurationError",
            Self::CircuitOpen => "CircuitOpenError",
            Self::Internal => "InternalError",
        }
    }
}

/// An error from the bridge: a matchable [`ErrorKind`], a message, optional
/// structured context and the time it was raised.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Option<Map<String, Value>>,
    timestamp: DateTime<Utc>,
    #[source]
    source: Option<BoxError>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
            timestamp: Utc::now(),
            source: None,
        }
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailed, message)
    }

    pub fn connection_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionTimeout, message)
    }

    pub fn reconnection_failed(message: impl Into<String>, attempts: u32) -> Self {
        Self::new(ErrorKind::ReconnectionFailed { attempts }, message)
            .with_context("attempts", attempts)
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    pub fn command_timeout(method: impl Into<String>, after_ms: u128) -> Self {
        let method = method.into();
        Self::new(
            ErrorKind::CommandTimeout {
                method: method.clone(),
            },
            format!("Command timed out after {after_ms}ms: {method}"),
        )
        .with_context("method", method)
    }

    /// `code` should be [`ErrorCode::InvalidApiKey`] or [`ErrorCode::UnauthorizedClient`].
    pub fn authentication(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::new(ErrorKind::AuthenticationFailed { code }, message)
    }

    pub fn rate_limited(limit: u32, window_ms: u64, remaining: u32) -> Self {
        Self::new(
            ErrorKind::RateLimitExceeded {
                limit,
                window_ms,
                remaining,
            },
            format!("Rate limit exceeded: {limit} requests per {window_ms}ms"),
        )
        .with_context("limit", limit)
        .with_context("windowMs", window_ms)
        .with_context("remaining", remaining)
    }

    pub fn validation(
        message: impl Into<String>,
        field: Option<&str>,
        value: Option<Value>,
    ) -> Self {
        Self::new(
            ErrorKind::ValidationFailed {
                field: field.map(str::to_string),
                value: value.clone(),
            },
            message,
        )
        .with_context("field", field)
        .with_context("value", value)
    }

    pub fn missing_parameter(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            ErrorKind::MissingParameter {
                field: field.clone(),
            },
            format!("Missing required parameter: {field}"),
        )
        .with_context("field", field)
    }

    pub fn invalid_parameter(
        field: impl Into<String>,
        value: Value,
        expected: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let expected = expected.into();
        let actual = json_type_name(&value);
        Self::new(
            ErrorKind::InvalidParameter {
                field: field.clone(),
                value: value.clone(),
                expected: expected.clone(),
            },
            format!("Invalid parameter '{field}': expected {expected}, got {actual}"),
        )
        .with_context("field", field)
        .with_context("value", value)
        .with_context("expectedType", expected)
    }

    pub fn remote(message: impl Into<String>, code: Option<i64>, data: Option<Value>) -> Self {
        Self::new(ErrorKind::RemoteCommandFailed { code, data }, message)
    }

    pub fn element_not_found(element_id: impl Into<Value>) -> Self {
        let element_id = element_id.into();
        let shown = match &element_id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self::new(
            ErrorKind::ElementNotFound {
                element_id: element_id.clone(),
            },
            format!("Element with ID {shown} not found"),
        )
        .with_context("elementId", element_id)
    }

    pub fn transaction_failed(message: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::TransactionFailed { name: name.clone() }, message)
            .with_context("transactionName", name)
    }

    pub fn configuration(message: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(ErrorKind::ConfigurationError { key: key.clone() }, message)
            .with_context("configKey", key)
    }

    pub fn circuit_open() -> Self {
        Self::new(ErrorKind::CircuitOpen, "Circuit breaker is open")
    }

    /// Wrap a foreign error. Its message is kept as `originalMessage`.
    pub fn internal(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        let original = source.to_string();
        let mut error = Self::new(ErrorKind::Internal, message).with_context("originalMessage", original);
        error.source = Some(source);
        error
    }

    /// Attach one context entry.
    pub fn with_context(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.context
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    /// Replace the context with the entries of a JSON object.
    pub fn with_context_map(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn code(&self) -> ErrorCode {
        self.kind.code()
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.code() == code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&Map<String, Value>> {
        self.context.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Payload placed in the `data` field of the response envelope.
    pub fn data(&self) -> Option<Value> {
        match &self.kind {
            ErrorKind::RemoteCommandFailed { data: Some(data), .. } => Some(data.clone()),
            _ => self.context.clone().map(Value::Object),
        }
    }

    /// Uniform `{error: {code, message, data}}` envelope.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorBody {
                code: self.code().as_u16(),
                message: self.message.clone(),
                data: self.data(),
            },
        }
    }

    /// Full serialized form, used for logging and debugging output.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.kind.name(),
            "message": self.message,
            "code": self.code(),
            "timestamp": self.timestamp.to_rfc3339(),
            "context": self.context,
        })
    }
}

/// Uniform error envelope surfaced to the end caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorResponse {
    /// Format any error. Bridge errors keep their code, anything else is internal.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        match error.downcast_ref::<Error>() {
            Some(error) => error.to_response(),
            None => Self {
                error: ErrorBody {
                    code: ErrorCode::InternalError.as_u16(),
                    message: error.to_string(),
                    data: None,
                },
            },
        }
    }
}

impl From<&Error> for ErrorResponse {
    fn from(error: &Error) -> Self {
        error.to_response()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
