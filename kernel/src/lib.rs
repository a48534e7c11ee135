#![warn(clippy::unwrap_in_result)]
#![warn(clippy::unwrap_used)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Version of the Euphony wire format spoken by this crate.
pub const PROTOCOL_VERSION: &str = "1";

/// Response header carrying [`PROTOCOL_VERSION`].
pub const PROTOCOL_HEADER: &str = "euphony-version";

/// Represents a named resource as it travels over the wire.
///
/// The payload is opaque to the protocol so it is transported as standard
/// base64 inside the `content` field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Resource {
    /// Unique identifier assigned by the server on creation
    pub id: i64,
    /// Path-safe unique name, also the mirror file name
    pub name: String,
    /// Base64 encoded payload
    pub content: String,
    /// Declared MIME type of the payload
    pub content_type: String,
    /// Size of the decoded payload in bytes
    pub size: usize,
    /// BLAKE3 hash of the decoded payload
    pub blake3_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the server committed the change but its filesystem mirror lags behind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl Resource {
    /// Decodes the base64 `content` field.
    ///
    /// # Errors
    ///
    /// Returns the decoder error when `content` is not valid base64.
    pub fn decoded_content(&self) -> Result<Vec<u8>, base64::DecodeError> {
        decode_content(&self.content)
    }
}

/// Body of a create request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateResource {
    pub name: String,
    /// Base64 encoded payload
    pub content: String,
    pub content_type: String,
}

/// Body of an update request. The name comes from the request path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateResource {
    /// Base64 encoded payload
    pub content: String,
    pub content_type: String,
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorReply {
    /// Machine readable error kind, e.g. `not_found`
    pub error: String,
    /// Human readable description
    pub message: String,
}

/// Outcome of a mirror repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RepairReport {
    /// Number of resources inspected
    pub checked: usize,
    /// Number of mirror files rewritten because they were missing or stale
    pub rewritten: usize,
    /// Number of mirror files that could not be rewritten
    pub failed: usize,
}

#[must_use]
pub fn encode_content(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// # Errors
///
/// Returns the decoder error when `encoded` is not valid base64.
pub fn decode_content(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded)
}
