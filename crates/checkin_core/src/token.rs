//! Scannable identity token payloads.
//!
//! # Responsibility
//! - Build the payload handed to an external QR encoder at registration.
//! - Normalize whatever a scanner decoded back into one `ScannedToken`.
//!
//! # Invariants
//! - Only the `id` of a scanned payload is trusted; other fields are ignored.
//! - A `ScannedToken` always carries a positive id.

use crate::model::registration::{Registration, RegistrationId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Payload encoded into a registration's QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub id: RegistrationId,
    pub name: String,
    pub email: String,
    pub roll: String,
}

impl TokenPayload {
    pub fn from_registration(registration: &Registration) -> Self {
        Self {
            id: registration.id,
            name: registration.name.clone(),
            email: registration.email.clone(),
            roll: registration.roll.clone(),
        }
    }

    /// Encodes the payload as compact JSON text for the QR encoder.
    pub fn encode(&self) -> Result<String, TokenError> {
        serde_json::to_string(self).map_err(|err| TokenError::Encode(err.to_string()))
    }
}

/// Scan result normalized to the only field the attendance guard needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScannedToken {
    id: RegistrationId,
}

impl ScannedToken {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Validates an id that arrived already typed (e.g. a JSON body field).
    pub fn from_id(id: RegistrationId) -> Result<Self, TokenError> {
        if id <= 0 {
            return Err(TokenError::InvalidId(id.to_string()));
        }
        Ok(Self { id })
    }

    /// Parses raw scanner output.
    ///
    /// Accepted shapes: a bare integer (`7`), a JSON number, a JSON string
    /// holding an integer (`"7"`), or a JSON object whose `id` is either.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TokenError::Empty);
        }

        if let Ok(id) = trimmed.parse::<RegistrationId>() {
            return Self::from_id(id);
        }

        let value: Value =
            serde_json::from_str(trimmed).map_err(|err| TokenError::Malformed(err.to_string()))?;
        match value {
            Value::Object(fields) => match fields.get("id") {
                Some(id) => id_from_value(id),
                None => Err(TokenError::MissingId),
            },
            other => id_from_value(&other),
        }
    }
}

impl FromStr for ScannedToken {
    type Err = TokenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

fn id_from_value(value: &Value) -> Result<ScannedToken, TokenError> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| TokenError::InvalidId(number.to_string()))
            .and_then(ScannedToken::from_id),
        Value::String(text) => text
            .trim()
            .parse::<RegistrationId>()
            .map_err(|_| TokenError::InvalidId(text.clone()))
            .and_then(ScannedToken::from_id),
        Value::Null => Err(TokenError::MissingId),
        other => Err(TokenError::InvalidId(other.to_string())),
    }
}

/// Failure to encode a payload or to make sense of scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Empty,
    Malformed(String),
    MissingId,
    InvalidId(String),
    Encode(String),
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "scanned token is empty"),
            Self::Malformed(details) => write!(f, "scanned token is not valid JSON: {details}"),
            Self::MissingId => write!(f, "scanned token has no id"),
            Self::InvalidId(value) => write!(f, "scanned token id `{value}` is not a valid id"),
            Self::Encode(details) => write!(f, "failed to encode token payload: {details}"),
        }
    }
}

impl Error for TokenError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_supported_shape() {
        for raw in [
            "7",
            " 7 \n",
            "\"7\"",
            r#"{"id":7}"#,
            r#"{"id":"7","name":"Alice","email":"a@x.com","roll":"R1"}"#,
        ] {
            assert_eq!(ScannedToken::parse(raw), ScannedToken::from_id(7), "{raw}");
        }
    }

    #[test]
    fn rejects_unusable_payloads() {
        assert_eq!(ScannedToken::parse("   "), Err(TokenError::Empty));
        assert_eq!(ScannedToken::parse(r#"{"name":"x"}"#), Err(TokenError::MissingId));
        assert_eq!(ScannedToken::parse(r#"{"id":null}"#), Err(TokenError::MissingId));
        assert!(matches!(ScannedToken::parse("{not json"), Err(TokenError::Malformed(_))));
        assert!(matches!(ScannedToken::parse("0"), Err(TokenError::InvalidId(_))));
        assert!(matches!(ScannedToken::parse("-3"), Err(TokenError::InvalidId(_))));
        assert!(matches!(ScannedToken::parse("1.5"), Err(TokenError::InvalidId(_))));
        assert!(matches!(
            ScannedToken::parse(r#"{"id":"abc"}"#),
            Err(TokenError::InvalidId(_))
        ));
        assert!(matches!(ScannedToken::parse("[1]"), Err(TokenError::InvalidId(_))));
    }

    #[test]
    fn typed_ids_must_be_positive() {
        assert_eq!(ScannedToken::from_id(3).map(|token| token.id()), Ok(3));
        assert_eq!(ScannedToken::from_id(0), Err(TokenError::InvalidId("0".to_string())));
        assert_eq!(ScannedToken::from_id(-1), Err(TokenError::InvalidId("-1".to_string())));
    }

    #[test]
    fn encoded_payload_scans_back_to_same_id() {
        let registration = Registration {
            id: 42,
            name: "Alice".to_string(),
            email: "a@x.com".to_string(),
            roll: "R1".to_string(),
            attended: false,
            registered_at: 0,
            attended_at: None,
        };
        let encoded = TokenPayload::from_registration(&registration)
            .encode()
            .unwrap();
        assert!(encoded.contains("\"roll\":\"R1\""));

        let scanned: ScannedToken = encoded.parse().unwrap();
        assert_eq!(scanned.id(), 42);
    }
}
