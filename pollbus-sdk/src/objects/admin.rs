//! Admin publish endpoint types.

use super::bus::WireChannel;
use serde::{Deserialize, Serialize};

/// Header carrying the admin secret.
pub const ADMIN_SECRET_HEADER: &str = "X-Admin-Secret";

/// One notification to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEntry {
    pub tenant: String,
    pub channel: WireChannel,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Body of `POST /admin/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub notifications: Vec<SendEntry>,
}

/// Response of `POST /admin/send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    /// Number of notifications persisted.
    pub published: u64,
}
