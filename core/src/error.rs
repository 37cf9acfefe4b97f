use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Stable, user-visible failure categories.
/// Every surfaced failure carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or missing tool arguments; the host can fix the call.
    Parameter,
    /// No usable account, unknown account, duplicate account.
    Account,
    /// The provider rejected the request or could not be reached.
    Upstream,
    /// A defect in this server.
    Internal,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Parameter => codes::PARAMETER,
            ErrorCategory::Account => codes::ACCOUNT,
            ErrorCategory::Upstream => codes::UPSTREAM,
            ErrorCategory::Internal => codes::INTERNAL,
        }
    }

    /// Parameter and account failures are recoverable by the host without
    /// breaking the session, so they travel inside a successful call.
    pub fn is_recoverable_by_host(self) -> bool {
        matches!(self, ErrorCategory::Parameter | ErrorCategory::Account)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category names as they appear in logs and error payloads
pub mod codes {
    pub const PARAMETER: &str = "parameter";
    pub const ACCOUNT: &str = "account";
    pub const UPSTREAM: &str = "upstream";
    pub const INTERNAL: &str = "internal";
}

/// Configuration problems. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no accounts configured (set LINODE_TOKEN or provide a config file)")]
    NoAccounts,

    #[error("account name must not be empty")]
    EmptyAccountName,

    #[error("account {0} has an empty token")]
    EmptyToken(String),

    #[error("account {name} has an invalid api_url {url:?}: {reason}")]
    InvalidUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("default account {0} is not configured")]
    UnknownDefault(String),

    #[error("several accounts configured but no default_account given")]
    MissingDefault,
}
