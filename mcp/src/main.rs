use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linode_mcp_core::config::default_config_path;
use linode_mcp_core::{ConfigError, ConfigFile};
use linode_mcp_runtime::{DEFAULT_HTTP_TIMEOUT_SECS, McpCommands, RuntimeConfig, run as run_mcp};

#[derive(Parser)]
#[command(
    name = "linode-mcp",
    version,
    about = "Linode MCP server: multi-account Linode API tools over stdio"
)]
struct Cli {
    /// JSON accounts file (default: <config dir>/linode-mcp/config.json)
    #[arg(long, env = "LINODE_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Account to make current at startup (overrides default_account)
    #[arg(long, env = "LINODE_MCP_ACCOUNT")]
    account: Option<String>,

    /// Timeout for each provider HTTP request, in seconds
    #[arg(long, env = "LINODE_MCP_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    http_timeout_secs: u64,

    /// Token for a single account when no accounts file exists
    #[arg(long, env = "LINODE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// API root for the single token account
    #[arg(long, env = "LINODE_API_URL")]
    api_url: Option<String>,

    /// Name of the single token account
    #[arg(long, env = "LINODE_ACCOUNT_NAME", default_value = "default")]
    account_name: String,

    /// Label of the single token account
    #[arg(long, env = "LINODE_ACCOUNT_LABEL", default_value = "Default Account")]
    account_label: String,

    #[command(subcommand)]
    command: McpCommands,
}

impl Cli {
    /// Explicit file, then the default file, then the token fallback.
    fn config_file(&self) -> Result<ConfigFile, ConfigError> {
        if let Some(path) = &self.config {
            return ConfigFile::load(path);
        }
        let default_path = default_config_path();
        if default_path.is_file() {
            return ConfigFile::load(&default_path);
        }
        match &self.token {
            Some(token) => Ok(ConfigFile::single(
                self.account_name.clone(),
                self.account_label.clone(),
                token.clone(),
                self.api_url.clone(),
            )),
            None => Err(ConfigError::NoAccounts),
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // stdout carries the protocol; logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linode_mcp=info,linode_mcp_runtime=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let accounts = match cli
        .config_file()
        .and_then(|file| file.validate(cli.account.as_deref()))
    {
        Ok(accounts) => accounts,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            eprintln!("linode-mcp: {err}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        accounts = accounts.accounts().len(),
        default_account = accounts.default_account(),
        "configuration loaded"
    );

    let config = RuntimeConfig {
        accounts,
        http_timeout: Duration::from_secs(cli.http_timeout_secs.max(1)),
    };
    let code = run_mcp(config, cli.command).await;
    std::process::exit(code);
}
