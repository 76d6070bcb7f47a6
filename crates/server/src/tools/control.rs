//! control tool implementation.
//!
//! Forwards a `{type, payload}` message to the worker's control channel.

use offcache_client::{ControlMessage, ControlReply, Worker};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HostError;

/// Parameters for the control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlParams {
    /// Message type: SKIP_WAITING, GET_CACHE_SIZE or CLEAR_CACHE.
    #[serde(rename = "type")]
    pub kind: String,

    /// Optional message payload.
    #[serde(default)]
    pub payload: Value,
}

/// Output from the control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlOutput {
    /// The reply, or null when the message owes none.
    pub reply: Option<ControlReply>,
}

/// Implementation of the control tool.
pub async fn control_impl(worker: &Worker, params: ControlParams) -> Result<CallToolResult, McpError> {
    let message = ControlMessage { kind: params.kind, payload: params.payload };
    let reply = worker.handle_control_message(&message).await?;

    let output = ControlOutput { reply };
    let json = serde_json::to_string_pretty(&output).map_err(HostError::from)?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
