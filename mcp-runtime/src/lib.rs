use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use linode_mcp_core::AccountsConfig;
use serde_json::{Value, json};

pub mod accounts;
pub mod args;
pub mod client;
pub mod dispatch;
pub mod format;
pub mod outcome;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod tools;

pub use accounts::{AccountEntry, AccountError, AccountManager, AccountSummary};
pub use client::{ApiError, LinodeClient};
pub use dispatch::{CallContext, Dispatcher};
pub use outcome::{CallToolResult, ToolError, ToolOutcome};
pub use protocol::RpcError;
pub use registry::{RegistryError, ToolRegistration, ToolRegistry};
pub use server::McpServer;

pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the Linode MCP server over stdio
    Serve(McpServeArgs),
    /// Verify every configured account against the provider and exit
    Check(McpCheckArgs),
}

#[derive(Args, Clone, Debug)]
pub struct McpServeArgs {
    /// Deadline for a single tool call, in seconds
    #[arg(long, env = "LINODE_MCP_CALL_TIMEOUT_SECS", default_value_t = DEFAULT_CALL_TIMEOUT_SECS)]
    pub call_timeout_secs: u64,
}

#[derive(Args, Clone, Debug)]
pub struct McpCheckArgs {
    /// Only check this account
    #[arg(long = "only")]
    pub only: Option<String>,
}

/// Validated startup configuration handed over by the binary.
#[derive(Debug)]
pub struct RuntimeConfig {
    pub accounts: AccountsConfig,
    pub http_timeout: Duration,
}

/// The dispatcher with the full Linode tool table.
pub fn linode_dispatcher(
    accounts: Arc<AccountManager>,
    call_timeout: Duration,
) -> Result<Dispatcher, RegistryError> {
    let registry = ToolRegistry::from_registrations(tools::linode_tools())?;
    Ok(Dispatcher::new(Arc::new(registry), accounts, call_timeout))
}

pub async fn run(config: RuntimeConfig, command: McpCommands) -> i32 {
    let accounts = match AccountManager::from_config(config.accounts, config.http_timeout) {
        Ok(accounts) => Arc::new(accounts),
        Err(err) => {
            print_error("account_setup_failed", &err.to_string());
            return 1;
        }
    };

    match command {
        McpCommands::Serve(args) => {
            let call_timeout = Duration::from_secs(args.call_timeout_secs.max(1));
            let dispatcher = match linode_dispatcher(accounts, call_timeout) {
                Ok(dispatcher) => dispatcher,
                Err(err) => {
                    print_error("tool_registry_invalid", &err.to_string());
                    return 1;
                }
            };
            let server = Arc::new(McpServer::new(dispatcher));
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => {
                    print_error("mcp_server_error", &err);
                    1
                }
            }
        }
        McpCommands::Check(args) => {
            let report = check_accounts(&accounts, args.only.as_deref()).await;
            println!("{}", to_pretty_json(&report));
            if report.get("status").and_then(Value::as_str) == Some("ready") {
                0
            } else {
                2
            }
        }
    }
}

/// One `GET /profile` per account, sequentially.
pub async fn check_accounts(accounts: &AccountManager, only: Option<&str>) -> Value {
    let mut rows = Vec::new();
    let mut all_ok = true;
    for summary in accounts.list() {
        if only.is_some_and(|name| name != summary.name) {
            continue;
        }
        let entry = match accounts.get(&summary.name) {
            Ok(entry) => entry,
            Err(err) => {
                all_ok = false;
                rows.push(json!({ "name": summary.name, "ok": false, "error": err.to_string() }));
                continue;
            }
        };
        let mut row = json!({
            "name": entry.name(),
            "label": entry.label(),
            "api_url": entry.base_url(),
            "token": entry.token_fingerprint(),
            "current": summary.is_current,
        });
        match entry
            .client()
            .get::<linode_mcp_core::models::Profile>("/profile")
            .await
        {
            Ok(profile) => {
                row["ok"] = json!(true);
                row["username"] = json!(profile.username);
            }
            Err(err) => {
                all_ok = false;
                row["ok"] = json!(false);
                row["error"] = json!(err.to_string());
            }
        }
        rows.push(row);
    }
    if rows.is_empty() {
        all_ok = false;
    }

    json!({
        "status": if all_ok { "ready" } else { "degraded" },
        "server": server::MCP_SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "accounts": rows,
    })
}

fn print_error(code: &str, message: &str) {
    tracing::error!(error = code, message, "startup failed");
    eprintln!(
        "{}",
        to_pretty_json(&json!({ "error": code, "message": message }))
    );
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
