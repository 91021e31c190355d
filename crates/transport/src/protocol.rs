//! Request/response envelopes exchanged with the remote application.

use std::fmt;

use fault::Error;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Protocol version stamped on every outbound request.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Id used to route a response that carries none.
pub const DEFAULT_RESPONSE_ID: &str = "default";

/// Message used when the remote reports an error without one.
pub const UNKNOWN_REMOTE_ERROR: &str = "Unknown error from remote";

/// Outbound command envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    #[serde(rename = "jsonrpc")]
    pub protocol_version: &'static str,
    pub method: String,
    pub params: Value,
    pub id: String,
}

impl Request {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method: method.into(),
            params,
            id: id.into(),
        }
    }
}

/// Response id as sent by the remote (string or number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseId {
    String(String),
    Number(serde_json::Number),
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Inbound response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<ResponseId>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default, deserialize_with = "remote_error")]
    pub error: Option<RemoteError>,
}

impl Response {
    /// Key used to find the pending call this response belongs to.
    pub fn routing_key(&self) -> String {
        self.id
            .as_ref()
            .map_or_else(|| DEFAULT_RESPONSE_ID.to_string(), ToString::to_string)
    }

    /// The `result`, or the taxonomy error built from `error`.
    ///
    /// A missing `result` without an `error` resolves to `null`.
    pub fn into_result(self) -> Result<Value, Error> {
        match self.error {
            Some(error) => Err(error.into()),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Error reported by the remote.
///
/// Built leniently from whatever the `error` field holds: an object with
/// `message`, `code` and `data`, a bare string, or any other truthy value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteError {
    pub message: Option<String>,
    pub code: Option<i64>,
    /// A `code` that is not an integer, such as `"ELEMENT_MISSING"`.
    pub other_code: Option<Value>,
    pub data: Option<Value>,
}

impl RemoteError {
    /// Interpret an `error` field. Falsy values (`null`, `false`, `0`, `""`)
    /// mean no error was reported.
    pub fn from_value(error: Value) -> Option<Self> {
        match error {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::Number(n) if n.as_f64() == Some(0.0) => None,
            Value::String(message) => Some(Self {
                message: Some(message),
                ..Self::default()
            }),
            Value::Object(mut fields) => {
                let message = match fields.remove("message") {
                    Some(Value::String(s)) => Some(s),
                    None | Some(Value::Null) => None,
                    Some(other) => Some(other.to_string()),
                };
                let (code, other_code) = match fields.remove("code") {
                    None | Some(Value::Null) => (None, None),
                    Some(raw) => match raw.as_i64() {
                        Some(code) => (Some(code), None),
                        None => (None, Some(raw)),
                    },
                };
                Some(Self {
                    message,
                    code,
                    other_code,
                    data: fields.remove("data").filter(|d| !d.is_null()),
                })
            }
            other => Some(Self {
                message: Some(other.to_string()),
                ..Self::default()
            }),
        }
    }
}

fn remote_error<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<RemoteError>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(RemoteError::from_value))
}

impl From<RemoteError> for Error {
    fn from(error: RemoteError) -> Self {
        let message = error
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UNKNOWN_REMOTE_ERROR.to_string());
        let err = Error::remote(message, error.code, error.data);
        match error.other_code {
            Some(code) => err.with_context("remoteCode", code),
            None => err,
        }
    }
}

/// Best-effort routing key of a frame that failed to parse as a [`Response`].
pub(crate) fn raw_routing_key(frame: &Value) -> Option<String> {
    let object = frame.as_object()?;
    match object.get("id") {
        None | Some(Value::Null) => Some(DEFAULT_RESPONSE_ID.to_string()),
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => None,
    }
}
