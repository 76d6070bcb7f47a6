//! fetch tool implementation.
//!
//! Routes one request through the worker, bringing the worker up first when
//! an earlier install attempt failed.

use chrono::SecondsFormat;
use offcache_client::fetch::{UrlError, canonicalize};
use offcache_client::{LifecycleState, StrategyTag, Worker};
use offcache_core::{Error, RequestDescriptor};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Input parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// The URL to request.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are served from cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Optional Accept header, e.g. "text/html" for a page navigation.
    #[serde(default)]
    pub accept: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutput {
    /// A strategy produced a response.
    Served {
        url: String,
        strategy: StrategyTag,
        status: u16,
        content_type: Option<String>,
        headers: Vec<(String, String)>,
        /// Body decoded as UTF-8, lossily.
        body: String,
        body_bytes: usize,
        /// When the entry was written, if the response came from the store.
        stored_at: Option<String>,
    },
    /// The request was not intercepted and should go to the network as is.
    Declined { url: String, reason: String },
}

fn declined(url: &str, reason: impl Into<String>) -> FetchOutput {
    FetchOutput::Declined { url: url.to_string(), reason: reason.into() }
}

/// Implementation of the fetch tool.
pub async fn fetch_impl(worker: &Worker, params: FetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(HostError::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.is_empty() || !params.method.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(HostError::InvalidInput(format!("invalid method: {:?}", params.method)).into());
    }

    let output = match canonicalize(&params.url) {
        Ok(url) => {
            let mut request = RequestDescriptor::new(&params.method, url);
            if let Some(accept) = &params.accept {
                request = request.with_header("Accept", accept);
            }
            serve(worker, &request).await?
        }
        Err(UrlError::UnsupportedScheme(scheme)) => declined(&params.url, format!("{scheme} is not intercepted")),
        Err(e) => return Err(Error::InvalidUrl(e.to_string()).into()),
    };

    let json = serde_json::to_string_pretty(&output).map_err(HostError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Retry bring-up when no install has succeeded yet. Returns whether the
/// worker is active afterwards.
async fn ensure_active(worker: &Worker) -> bool {
    if worker.state() == LifecycleState::Uninitialized {
        match worker.bring_up().await {
            Ok(report) if !report.install.is_success() => {
                tracing::warn!("bring-up retry failed, origin still unavailable");
            }
            Ok(_) => tracing::info!("bring-up retry succeeded"),
            Err(e) => tracing::debug!(error = %e, "bring-up already in progress"),
        }
    }
    worker.state() == LifecycleState::Active
}

async fn serve(worker: &Worker, request: &RequestDescriptor) -> Result<FetchOutput, Error> {
    let url = request.url.as_str();
    // Declined before bring-up so a request that is never intercepted cannot start an install.
    if request.method != "GET" {
        return Ok(declined(url, format!("{} requests are not intercepted", request.method)));
    }
    if !ensure_active(worker).await {
        return Ok(declined(url, format!("worker is {:?}", worker.state())));
    }

    let Some(intercepted) = worker.intercept(request).await? else {
        return Ok(declined(url, "request is not intercepted"));
    };

    let response = intercepted.response;
    Ok(FetchOutput::Served {
        url: url.to_string(),
        strategy: intercepted.strategy,
        status: response.status,
        content_type: response.content_type().map(str::to_string),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        body_bytes: response.body.len(),
        stored_at: response
            .stored_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        headers: response.headers,
    })
}
