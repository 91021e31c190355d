//! Stable numeric error codes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Numeric code carried by every error and by the response envelope.
///
/// Codes are grouped by thousands: 1xxx transport, 2xxx auth, 3xxx input,
/// 4xxx remote application, 5xxx server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConnectionFailed,
    ConnectionTimeout,
    ReconnectionFailed,
    MalformedResponse,
    CommandTimeout,
    InvalidApiKey,
    UnauthorizedClient,
    RateLimitExceeded,
    InvalidInput,
    MissingParameter,
    InvalidParameter,
    RemoteCommandFailed,
    ElementNotFound,
    TransactionFailed,
    InternalError,
    ConfigurationError,
    CircuitOpen,
}

impl ErrorCode {
    const ALL: [ErrorCode; 17] = [
        Self::ConnectionFailed,
        Self::ConnectionTimeout,
        Self::ReconnectionFailed,
        Self::MalformedResponse,
        Self::CommandTimeout,
        Self::InvalidApiKey,
        Self::UnauthorizedClient,
        Self::RateLimitExceeded,
        Self::InvalidInput,
        Self::MissingParameter,
        Self::InvalidParameter,
        Self::RemoteCommandFailed,
        Self::ElementNotFound,
        Self::TransactionFailed,
        Self::InternalError,
        Self::ConfigurationError,
        Self::CircuitOpen,
    ];

    pub const fn as_u16(self) -> u16 {
        match self {
            Self::ConnectionFailed => 1001,
            Self::ConnectionTimeout => 1002,
            Self::ReconnectionFailed => 1003,
            Self::MalformedResponse => 1004,
            Self::CommandTimeout => 1005,
            Self::InvalidApiKey => 2001,
            Self::UnauthorizedClient => 2002,
            Self::RateLimitExceeded => 2003,
            Self::InvalidInput => 3001,
            Self::MissingParameter => 3002,
            Self::InvalidParameter => 3003,
            Self::RemoteCommandFailed => 4001,
            Self::ElementNotFound => 4002,
            Self::TransactionFailed => 4003,
            Self::InternalError => 5000,
            Self::ConfigurationError => 5001,
            Self::CircuitOpen => 5003,
        }
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_u16() == code)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.as_u16())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u16::deserialize(deserializer)?;
        Self::from_u16(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown error code {raw}")))
    }
}
