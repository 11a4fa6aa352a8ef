//! Push-channel authentication.
//!
//! Clients may send a `yellow_auth` message carrying a clearinghouse JWT
//! and a session key. Token validation is an external concern behind
//! [`TokenValidator`]; the bundled [`StructuralValidator`] only checks the
//! token's shape and never verifies the signature, which is all the
//! upstream protocol does today.

use chrono::{DateTime, Duration, Utc};
use clearbook_types::{Error, Result};
use serde::Deserialize;

/// An authenticated push-channel identity.
#[derive(Debug, Clone)]
pub struct Principal {
    pub address: String,
    pub session_key: String,
    pub expires_at: DateTime<Utc>,
}

/// Decides whether a presented token identifies a principal.
pub trait TokenValidator: Send + Sync {
    /// Validate the token and return the principal it speaks for.
    ///
    /// # Errors
    /// `Unauthorized` with a human-readable reason.
    fn validate(&self, jwt_token: &str, session_key: &str) -> Result<Principal>;
}

/// Shape-only validation: the token must look like a JWT
/// (`header.payload.signature`). No signature verification, no claim
/// decoding; the principal adopts the client-supplied session key and a
/// one-hour expiry.
#[derive(Debug, Default)]
pub struct StructuralValidator;

impl TokenValidator for StructuralValidator {
    fn validate(&self, jwt_token: &str, session_key: &str) -> Result<Principal> {
        if jwt_token.is_empty() {
            return Err(Error::Unauthorized {
                reason: "empty token".into(),
            });
        }
        if jwt_token.split('.').count() != 3 {
            return Err(Error::Unauthorized {
                reason: "invalid JWT format".into(),
            });
        }

        Ok(Principal {
            address: session_key.to_string(),
            session_key: session_key.to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }
}

/// The inbound `yellow_auth` message.
#[derive(Debug, Clone, Deserialize)]
pub struct YellowAuthMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub jwt_token: String,
    #[serde(default)]
    pub session_key: String,
}

impl YellowAuthMessage {
    /// Parse an inbound frame as a `yellow_auth` message. `None` when the
    /// frame is something else entirely.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let msg: Self = serde_json::from_str(raw).ok()?;
        (msg.kind == "yellow_auth").then_some(msg)
    }
}
