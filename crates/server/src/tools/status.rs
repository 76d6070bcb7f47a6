//! lifecycle_status tool implementation.

use offcache_client::{LifecycleState, Worker};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Output from the lifecycle_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LifecycleStatusOutput {
    pub state: LifecycleState,
    pub static_namespace: String,
    pub dynamic_namespace: String,
    /// Legacy names activation keeps.
    pub reserved_namespaces: Vec<String>,
}

/// Implementation of the lifecycle_status tool.
pub async fn status_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let namespaces = worker.namespaces();
    let output = LifecycleStatusOutput {
        state: worker.state(),
        static_namespace: namespaces.static_name.clone(),
        dynamic_namespace: namespaces.dynamic_name.clone(),
        reserved_namespaces: namespaces.reserved.clone(),
    };

    let json = serde_json::to_string_pretty(&output).map_err(HostError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
