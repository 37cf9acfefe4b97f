//! Tool outcomes and the classifier that maps them onto the two MCP error
//! surfaces: an error result inside a successful call, or a failed call.

use linode_mcp_core::ErrorCategory;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::client::ApiError;
use crate::protocol::RpcError;

/// What every handler returns. `Ok` carries the formatted text body.
pub type ToolOutcome = Result<String, ToolError>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Parameter(String),

    #[error("{0}")]
    Account(String),

    #[error("{qualifier}: {message}: {source}")]
    Upstream {
        qualifier: String,
        message: String,
        #[source]
        source: ApiError,
    },

    #[error("internal: {message}")]
    Internal {
        message: String,
        cause: Option<String>,
    },
}

impl ToolError {
    pub fn parameter(message: impl Into<String>) -> Self {
        ToolError::Parameter(message.into())
    }

    pub fn account(message: impl Into<String>) -> Self {
        ToolError::Account(message.into())
    }

    pub fn upstream(
        qualifier: impl Into<String>,
        message: impl Into<String>,
        source: ApiError,
    ) -> Self {
        ToolError::Upstream {
            qualifier: qualifier.into(),
            message: message.into(),
            source,
        }
    }

    pub fn internal(message: impl Into<String>, cause: Option<String>) -> Self {
        ToolError::Internal {
            message: message.into(),
            cause,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ToolError::Parameter(_) => ErrorCategory::Parameter,
            ToolError::Account(_) => ErrorCategory::Account,
            ToolError::Upstream { .. } => ErrorCategory::Upstream,
            ToolError::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// MCP `CallToolResult`: always exactly one text item here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

impl CallToolResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// The text of the single content item.
    pub fn text(&self) -> &str {
        match self.content.first() {
            Some(Content::Text { text }) => text,
            None => "",
        }
    }
}

/// `linode_instance_get` -> `linode/instance_get`
pub fn tool_qualifier(tool_name: &str) -> String {
    match tool_name.split_once('_') {
        Some((provider, rest)) if !provider.is_empty() && !rest.is_empty() => {
            format!("{provider}/{rest}")
        }
        _ => tool_name.to_string(),
    }
}

/// The only place that decides between the two error surfaces. The error's
/// category picks the surface.
pub fn classify(qualifier: &str, outcome: ToolOutcome) -> Result<CallToolResult, RpcError> {
    let err = match outcome {
        Ok(text) if text.trim().is_empty() => {
            ToolError::internal("handler produced an empty result", None)
        }
        Ok(text) => return Ok(CallToolResult::success(text)),
        Err(err) => err,
    };
    if err.category().is_recoverable_by_host() {
        return Ok(CallToolResult::error(format!("{qualifier}: {err}")));
    }
    Err(transport_error(qualifier, err))
}

fn transport_error(qualifier: &str, err: ToolError) -> RpcError {
    match err {
        ToolError::Upstream {
            qualifier: upstream_qualifier,
            message,
            source,
        } => {
            let status = source.status();
            RpcError::upstream(format!("{upstream_qualifier}: {message}: {source}")).with_data(
                json!({
                    "category": ErrorCategory::Upstream,
                    "tool": upstream_qualifier,
                    "status": status,
                }),
            )
        }
        ToolError::Internal { message, cause } => {
            tracing::error!(tool = qualifier, %message, cause = cause.as_deref().unwrap_or(""), "internal tool failure");
            RpcError::internal(format!("internal: {qualifier}: {message}")).with_data(json!({
                "category": ErrorCategory::Internal,
                "tool": qualifier,
            }))
        }
        other => RpcError::internal(format!("internal: {qualifier}: {other}")).with_data(json!({
            "category": other.category(),
            "tool": qualifier,
        })),
    }
}
