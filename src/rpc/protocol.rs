//! JSON-RPC 2.0 envelope: request/response shapes and payload framing.
//!
//! # Responsibilities
//! - Split a request body into one request or an ordered batch
//! - Turn structurally broken payloads into ready-made error responses
//! - Serialize replies as a single object or an array, mirroring the input
//!
//! # Design Decisions
//! - `params` stays raw until the dispatcher knows the method's shape
//! - Missing `jsonrpc`/`method` fields decode as empty strings so that the
//!   dispatcher reports them as invalid params, not as a broken envelope
//! - A batch element that is not an object, or has a wrongly typed member,
//!   answers with invalid-request in its own slot

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::rpc::error::RpcError;

/// The only protocol version this server speaks.
pub const VERSION: &str = "2.0";

/// A request id, kept as the exact JSON text the client sent.
///
/// Echoed back byte for byte, so large or fractional numbers survive.
/// An absent id and an explicit `null` are both [`Id::Null`].
#[derive(Debug, Clone, Default)]
pub enum Id {
    #[default]
    Null,
    Raw(Box<RawValue>),
}

impl Id {
    /// Parse an id from JSON text.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The id as JSON text; `null` for [`Id::Null`].
    pub fn get(&self) -> &str {
        match self {
            Id::Null => "null",
            Id::Raw(raw) => raw.get(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Id::Null)
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.get())
    }
}

impl Serialize for Id {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Id::Null => serializer.serialize_unit(),
            Id::Raw(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Box<RawValue>>::deserialize(deserializer).map(|raw| raw.map_or(Id::Null, Id::Raw))
    }
}

/// A single JSON-RPC request object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "jsonrpc", default)]
    pub version: String,

    #[serde(default)]
    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<RawValue>>,

    /// Correlation id. [`Id::Null`] marks a notification.
    #[serde(default, skip_serializing_if = "Id::is_null")]
    pub id: Id,
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }
}

/// A single JSON-RPC response object. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "jsonrpc")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,

    #[serde(default)]
    pub id: Id,
}

impl Response {
    pub fn success(id: Id, result: Value) -> Self {
        Self {
            version: VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Id, error: RpcError) -> Self {
        Self {
            version: VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Build a response from a call outcome. An error always wins over a result.
    pub fn from_outcome(id: Id, outcome: Result<Value, RpcError>) -> Self {
        match outcome {
            Ok(result) => Self::success(id, result),
            Err(error) => Self::failure(id, error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One parsed batch slot: a request to dispatch, or the error that answers it.
pub type Parsed = Result<Request, Response>;

/// The shape of an incoming payload.
#[derive(Debug)]
pub enum Incoming {
    Single(Parsed),
    Batch(Vec<Parsed>),
}

/// The shape of an outgoing payload. Serializes as an object or an array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Batch(Vec<Response>),
    Single(Response),
}

/// Parse a request body.
///
/// Returns `Err` with a single non-array response when the top-level payload
/// is unusable: invalid JSON, a scalar, or an empty batch.
pub fn parse(body: &[u8]) -> Result<Incoming, Response> {
    let raw: Box<RawValue> = serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Unparsable request payload");
        invalid_request(Id::Null)
    })?;

    let text = raw.get().trim_start();
    if text.starts_with('[') {
        let elements: Vec<Box<RawValue>> =
            serde_json::from_str(text).map_err(|_| invalid_request(Id::Null))?;
        if elements.is_empty() {
            return Err(invalid_request(Id::Null));
        }
        Ok(Incoming::Batch(elements.iter().map(|e| parse_element(e)).collect()))
    } else if text.starts_with('{') {
        Ok(Incoming::Single(parse_element(&raw)))
    } else {
        Err(invalid_request(Id::Null))
    }
}

fn parse_element(raw: &RawValue) -> Parsed {
    let text = raw.get().trim_start();
    if !text.starts_with('{') {
        return Err(invalid_request(Id::Null));
    }

    serde_json::from_str::<Request>(text).map_err(|e| {
        tracing::debug!(error = %e, "Malformed request object");
        invalid_request(salvage_id(text))
    })
}

/// Best-effort recovery of the id from an object that failed to decode.
fn salvage_id(text: &str) -> Id {
    #[derive(Deserialize)]
    struct IdOnly {
        #[serde(default)]
        id: Id,
    }

    serde_json::from_str::<IdOnly>(text)
        .map(|object| object.id)
        .unwrap_or_default()
}

fn invalid_request(id: Id) -> Response {
    Response::failure(id, RpcError::invalid_request())
}
