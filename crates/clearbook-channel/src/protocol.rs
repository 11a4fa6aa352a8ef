//! JSON-RPC 2.0 messages for the clearinghouse protocol.
//!
//! The clearinghouse speaks JSON-RPC over a WebSocket: request/response
//! pairs correlated by `id`, plus unsolicited notifications. This module is
//! only shapes and builders; the transport lives in [`crate::client`].

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

static REQUEST_ID: AtomicI64 = AtomicI64::new(0);

fn next_request_id() -> i64 {
    REQUEST_ID.fetch_add(1, Ordering::Relaxed) + 1
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: i64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<RawValue>>,
}

impl Request {
    /// Build a request with a fresh id and serialized params.
    pub fn new<P: Serialize>(method: &str, params: &P) -> clearbook_types::Result<Self> {
        let raw = serde_json::value::to_raw_value(params)
            .map_err(|e| clearbook_types::Error::Serialization(e.to_string()))?;
        Ok(Self {
            jsonrpc: "2.0".to_string(),
            id: next_request_id(),
            method: method.to_string(),
            params: Some(raw),
        })
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub result: Option<Box<RawValue>>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl Response {
    /// Deserialize the `result` payload, or surface the RPC error.
    pub fn into_result<T: serde::de::DeserializeOwned>(self) -> clearbook_types::Result<T> {
        if let Some(err) = self.error {
            return Err(clearbook_types::Error::Clearinghouse {
                code: err.code,
                message: err.message,
            });
        }
        let raw = self
            .result
            .ok_or_else(|| clearbook_types::Error::Transport("response missing result".into()))?;
        serde_json::from_str(raw.get())
            .map_err(|e| clearbook_types::Error::Serialization(e.to_string()))
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Method params & results
// ---------------------------------------------------------------------------

/// A participant's fund allocation in wire form. Amounts are decimal
/// strings so arbitrary-precision consumers never lose digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAllocation {
    pub participant: String,
    #[serde(rename = "token")]
    pub asset: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequestParams {
    pub participant_address: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequestResult {
    pub challenge: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthVerifyParams {
    pub participant_address: String,
    pub signature: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthVerifyResult {
    pub session_id: String,
    pub expires_at: i64,
}

/// Declares the app session: who participates, how state updates are
/// weighted, and the challenge window for disputes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDefinition {
    pub protocol: String,
    pub participants: Vec<String>,
    pub weights: Vec<u32>,
    pub quorum: usize,
    pub challenge: i64,
    pub nonce: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionParams {
    pub definition: AppDefinition,
    pub allocations: Vec<WireAllocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionResult {
    pub channel_id: String,
    #[serde(default)]
    pub status: String,
}

/// One versioned state update pushed into the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateUpdate {
    pub version: u64,
    pub allocations: Vec<WireAllocation>,
    pub app_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessageParams {
    pub channel_id: String,
    pub state_data: StateUpdate,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSessionParams {
    pub channel_id: String,
    pub allocations: Vec<WireAllocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseSessionResult {
    pub channel_id: String,
    #[serde(default)]
    pub status: String,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn auth_request(address: &str, timestamp: i64) -> clearbook_types::Result<Request> {
    Request::new(
        "auth_request",
        &AuthRequestParams {
            participant_address: address.to_string(),
            timestamp,
        },
    )
}

pub fn auth_verify(address: &str, signature: &str, timestamp: i64) -> clearbook_types::Result<Request> {
    Request::new(
        "auth_verify",
        &AuthVerifyParams {
            participant_address: address.to_string(),
            signature: signature.to_string(),
            timestamp,
        },
    )
}

pub fn create_app_session(
    definition: AppDefinition,
    allocations: Vec<WireAllocation>,
) -> clearbook_types::Result<Request> {
    Request::new(
        "create_app_session",
        &CreateSessionParams {
            definition,
            allocations,
        },
    )
}

pub fn app_session_message(
    channel_id: &str,
    state: StateUpdate,
    signature: String,
) -> clearbook_types::Result<Request> {
    Request::new(
        "app_session_message",
        &SessionMessageParams {
            channel_id: channel_id.to_string(),
            state_data: state,
            signature,
        },
    )
}

pub fn close_app_session(
    channel_id: &str,
    allocations: Vec<WireAllocation>,
) -> clearbook_types::Result<Request> {
    Request::new(
        "close_app_session",
        &CloseSessionParams {
            channel_id: channel_id.to_string(),
            allocations,
        },
    )
}
