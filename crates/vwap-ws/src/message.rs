//! Outbound WebSocket messages.

use crate::error::WsResult;
use serde::{Deserialize, Serialize};

/// Order book update channel.
pub const LEVEL2_CHANNEL: &str = "level2";

/// Subscription request sent once per connection.
///
/// Wire format:
/// `{"type":"subscribe","product_ids":["BTC-USD"],"channels":["level2"]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Always "subscribe".
    #[serde(rename = "type")]
    pub request_type: String,
    /// Instruments to subscribe to.
    pub product_ids: Vec<String>,
    /// Channel names.
    pub channels: Vec<String>,
}

impl SubscribeRequest {
    pub fn new(product_ids: Vec<String>, channels: Vec<String>) -> Self {
        Self {
            request_type: "subscribe".to_string(),
            product_ids,
            channels,
        }
    }

    /// Subscribe to the level2 channel only.
    pub fn level2(product_ids: Vec<String>) -> Self {
        Self::new(product_ids, vec![LEVEL2_CHANNEL.to_string()])
    }

    /// Serialize to the JSON text frame.
    pub fn to_json(&self) -> WsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
