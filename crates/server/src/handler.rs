//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the worker.
use std::sync::Arc;

use offcache_client::Worker;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::tools::{ControlParams, FetchParams, control_impl, fetch_impl, status_impl};

/// The main MCP server handler for offcache.
#[derive(Clone)]
pub struct OffcacheServer {
    tool_router: ToolRouter<Self>,
    worker: Arc<Worker>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OffcacheServer {
    /// Create a new server handler around a wired worker.
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { tool_router: Self::tool_router(), worker }
    }

    /// Route a request through the caching strategies.
    #[tool(
        description = "Request a URL through the offline cache. Returns the strategy used, status, headers and body, or `declined` when the request is not intercepted."
    )]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    /// Send a control message.
    #[tool(
        description = "Send a control message: SKIP_WAITING activates a waiting install, GET_CACHE_SIZE reports stored body bytes, CLEAR_CACHE deletes every namespace."
    )]
    async fn control(&self, params: Parameters<ControlParams>) -> Result<CallToolResult, McpError> {
        control_impl(&self.worker, params.0).await
    }

    #[tool(description = "Report the cache lifecycle state and the current namespace names.")]
    async fn lifecycle_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker).await
    }
}

impl ServerHandler for OffcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;

    #[tokio::test]
    async fn test_router_lists_every_tool() {
        let h = harness().await;
        let server = OffcacheServer::new(h.worker.clone());

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["control", "fetch", "lifecycle_status"]);
    }

    #[tokio::test]
    async fn test_server_info() {
        let h = harness().await;
        let info = OffcacheServer::new(h.worker).get_info();
        assert_eq!(info.server_info.name, "offcache");
    }
}
