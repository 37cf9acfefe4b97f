//! The dispatch pipeline: lookup, account resolution, handler, classifier.
//! Every `tools/call` goes through `Dispatcher::dispatch` and nothing else
//! produces a `CallToolResult`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::accounts::{AccountEntry, AccountManager};
use crate::args::{Args, FromArgs};
use crate::client::{ApiError, LinodeClient};
use crate::outcome::{CallToolResult, ToolError, ToolOutcome, classify, tool_qualifier};
use crate::protocol::RpcError;
use crate::registry::ToolRegistry;

/// Everything a handler may look at. The account is resolved once, before
/// the handler starts, and never re-read during the call.
#[derive(Debug, Clone)]
pub struct CallContext {
    tool: &'static str,
    qualifier: String,
    arguments: Map<String, Value>,
    account: Arc<AccountEntry>,
    accounts: Arc<AccountManager>,
}

impl CallContext {
    pub fn new(
        tool: &'static str,
        arguments: Map<String, Value>,
        account: Arc<AccountEntry>,
        accounts: Arc<AccountManager>,
    ) -> Self {
        Self {
            tool,
            qualifier: tool_qualifier(tool),
            arguments,
            account,
            accounts,
        }
    }

    /// Decode the call's arguments into the tool's parameter record.
    pub fn params<P: FromArgs>(&self) -> Result<P, ToolError> {
        P::from_args(&Args::new(&self.arguments))
    }

    pub fn tool(&self) -> &'static str {
        self.tool
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    pub fn account(&self) -> &AccountEntry {
        &self.account
    }

    pub fn client(&self) -> &LinodeClient {
        self.account.client()
    }

    /// Only the account tools need the manager itself.
    pub fn accounts(&self) -> &AccountManager {
        &self.accounts
    }

    /// `map_err` adapter: wraps a provider failure with this tool's qualifier.
    pub fn upstream<M: Into<String>>(
        &self,
        message: M,
    ) -> impl FnOnce(ApiError) -> ToolError + use<M> {
        let qualifier = self.qualifier.clone();
        let message = message.into();
        move |source| ToolError::upstream(qualifier, message, source)
    }
}

#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    accounts: Arc<AccountManager>,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        accounts: Arc<AccountManager>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            accounts,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn accounts(&self) -> &Arc<AccountManager> {
        &self.accounts
    }

    /// Run one tool call to completion, cancellation, or deadline.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, RpcError> {
        let qualifier = tool_qualifier(name);

        let Some(registration) = self.registry.get(name) else {
            let message = match self.registry.suggest(name) {
                Some(candidate) => format!("unknown tool {name} (did you mean {candidate}?)"),
                None => format!("unknown tool {name}"),
            };
            tracing::info!(tool = name, "unknown tool");
            return classify(&qualifier, Err(ToolError::parameter(message)));
        };

        let account = match self.accounts.get_current() {
            Ok(account) => account,
            Err(err) => {
                tracing::info!(tool = name, error = %err, "no account for call");
                return classify(&qualifier, Err(err.into()));
            }
        };

        let span = tracing::info_span!(
            "tool_call",
            tool = registration.name(),
            account = account.name(),
            request_id = %Uuid::now_v7(),
        );
        let ctx = CallContext::new(
            registration.name(),
            arguments,
            account,
            Arc::clone(&self.accounts),
        );
        let handler = registration.handler();
        let call_timeout = self.call_timeout;

        async move {
            let started = Instant::now();
            let outcome: ToolOutcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "call cancelled");
                    return Err(RpcError::cancelled(format!("{qualifier}: request cancelled")));
                }
                result = tokio::time::timeout(call_timeout, handler(ctx)) => match result {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ToolError::upstream(
                        qualifier.clone(),
                        "call exceeded deadline",
                        ApiError::DeadlineExceeded(call_timeout),
                    )),
                },
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &outcome {
                Ok(_) => tracing::info!(elapsed_ms, "call succeeded"),
                Err(err @ (ToolError::Parameter(_) | ToolError::Account(_))) => {
                    tracing::info!(elapsed_ms, category = %err.category(), "call rejected")
                }
                Err(err @ ToolError::Upstream { .. }) => {
                    tracing::warn!(elapsed_ms, error = %err, "provider call failed")
                }
                Err(ToolError::Internal { .. }) => {}
            }
            classify(&qualifier, outcome)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolRegistration;
    use linode_mcp_core::AccountConfig;
    use serde_json::json;

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(
            ToolRegistry::from_registrations(vec![
                ToolRegistration::new(
                    "linode_echo_get",
                    "echo the account name",
                    json!({ "type": "object" }),
                    |ctx: CallContext| async move { Ok(format!("account {}", ctx.account().name())) },
                ),
                ToolRegistration::new(
                    "linode_slow_get",
                    "never finishes in time",
                    json!({ "type": "object" }),
                    |_ctx: CallContext| async move {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Ok("late".to_string())
                    },
                ),
            ])
            .unwrap(),
        )
    }

    fn accounts(names: &[&str]) -> Arc<AccountManager> {
        let manager = AccountManager::new();
        for name in names {
            manager
                .add(
                    AccountEntry::new(
                        *name,
                        &AccountConfig {
                            label: name.to_uppercase(),
                            token: "t".to_string(),
                            api_url: Some("http://127.0.0.1:9".to_string()),
                        },
                        Duration::from_secs(5),
                    )
                    .unwrap(),
                )
                .unwrap();
        }
        if let Some(first) = names.first() {
            manager.switch(first).unwrap();
        }
        Arc::new(manager)
    }

    #[tokio::test]
    async fn unknown_tool_is_a_parameter_error_with_suggestion() {
        let dispatcher = Dispatcher::new(registry(), accounts(&["a"]), Duration::from_secs(5));
        let result = dispatcher
            .dispatch("linode_echo_gte", Map::new(), CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.text(),
            "linode/echo_gte: unknown tool linode_echo_gte (did you mean linode_echo_get?)"
        );
    }

    #[tokio::test]
    async fn missing_account_short_circuits() {
        let dispatcher = Dispatcher::new(registry(), accounts(&[]), Duration::from_secs(5));
        let result = dispatcher
            .dispatch("linode_echo_get", Map::new(), CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.text(), "linode/echo_get: no current account");
    }

    #[tokio::test]
    async fn handler_sees_current_account() {
        let dispatcher = Dispatcher::new(registry(), accounts(&["a", "b"]), Duration::from_secs(5));
        let result = dispatcher
            .dispatch("linode_echo_get", Map::new(), CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), "account a");
    }

    #[tokio::test]
    async fn deadline_becomes_upstream_error() {
        let dispatcher =
            Dispatcher::new(registry(), accounts(&["a"]), Duration::from_millis(50));
        let err = dispatcher
            .dispatch("linode_slow_get", Map::new(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::protocol::UPSTREAM_ERROR);
        assert!(err.message.starts_with("linode/slow_get: call exceeded deadline"));
    }

    #[tokio::test]
    async fn cancellation_emits_no_text() {
        let dispatcher = Dispatcher::new(registry(), accounts(&["a"]), Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let err = dispatcher
            .dispatch("linode_slow_get", Map::new(), cancel)
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::protocol::REQUEST_CANCELLED);
    }
}
