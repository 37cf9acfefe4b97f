//! Provider accounts and the manager that tracks which one is current.
//!
//! Lock discipline: every critical section is constant time and performs no
//! I/O. Callers clone the `Arc<AccountEntry>` out of the lock and make their
//! provider calls afterwards, so a slow request never blocks a switch.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use linode_mcp_core::auth::token_fingerprint;
use linode_mcp_core::{AccountConfig, AccountsConfig};
use thiserror::Error;

use crate::client::{ApiError, LinodeClient};
use crate::outcome::ToolError;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("no current account")]
    NoCurrent,

    #[error("unknown account {0}")]
    Unknown(String),

    #[error("account {0} already configured")]
    Duplicate(String),

    #[error("account name must not be empty")]
    EmptyName,

    #[error("account {name}: {source}")]
    Client {
        name: String,
        #[source]
        source: ApiError,
    },
}

impl From<AccountError> for ToolError {
    fn from(err: AccountError) -> Self {
        ToolError::account(err.to_string())
    }
}

/// One authenticated account. Immutable once built.
pub struct AccountEntry {
    name: String,
    label: String,
    token_fingerprint: String,
    client: LinodeClient,
}

impl std::fmt::Debug for AccountEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountEntry")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("base_url", &self.client.base_url())
            .field("token", &self.token_fingerprint)
            .finish()
    }
}

impl AccountEntry {
    /// Builds the provider client eagerly; a failure here means the
    /// configuration is wrong.
    pub fn new(
        name: impl Into<String>,
        config: &AccountConfig,
        http_timeout: Duration,
    ) -> Result<Self, AccountError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AccountError::EmptyName);
        }
        let client = LinodeClient::new(&config.token, config.api_url.as_deref(), http_timeout)
            .map_err(|source| AccountError::Client {
                name: name.clone(),
                source,
            })?;
        Ok(Self {
            label: if config.label.trim().is_empty() {
                name.clone()
            } else {
                config.label.clone()
            },
            name,
            token_fingerprint: token_fingerprint(&config.token),
            client,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Effective API root.
    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    pub fn token_fingerprint(&self) -> &str {
        &self.token_fingerprint
    }

    pub fn client(&self) -> &LinodeClient {
        &self.client
    }
}

/// Row of `AccountManager::list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub name: String,
    pub label: String,
    pub base_url: String,
    pub is_current: bool,
}

#[derive(Default)]
struct AccountState {
    entries: HashMap<String, Arc<AccountEntry>>,
    current: Option<String>,
}

#[derive(Default)]
pub struct AccountManager {
    state: RwLock<AccountState>,
}

impl std::fmt::Debug for AccountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountManager")
            .field("accounts", &self.list())
            .finish()
    }
}

impl AccountManager {
    /// An empty manager with no current account.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(
        config: AccountsConfig,
        http_timeout: Duration,
    ) -> Result<Self, AccountError> {
        let (default_account, accounts) = config.into_parts();
        let manager = Self::new();
        for (name, account) in &accounts {
            manager.add(AccountEntry::new(name.clone(), account, http_timeout)?)?;
        }
        manager.switch(&default_account)?;
        Ok(manager)
    }

    /// All accounts ordered by name.
    pub fn list(&self) -> Vec<AccountSummary> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut rows: Vec<AccountSummary> = state
            .entries
            .values()
            .map(|entry| AccountSummary {
                name: entry.name.clone(),
                label: entry.label.clone(),
                base_url: entry.base_url().to_string(),
                is_current: state.current.as_deref() == Some(entry.name.as_str()),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    pub fn get_current(&self) -> Result<Arc<AccountEntry>, AccountError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .current
            .as_ref()
            .and_then(|name| state.entries.get(name))
            .cloned()
            .ok_or(AccountError::NoCurrent)
    }

    pub fn get(&self, name: &str) -> Result<Arc<AccountEntry>, AccountError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| AccountError::Unknown(name.to_string()))
    }

    pub fn current_name(&self) -> Option<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.current.clone()
    }

    /// Make `name` current. Performs no network I/O; callers verify the
    /// account against the provider themselves.
    pub fn switch(&self, name: &str) -> Result<Arc<AccountEntry>, AccountError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let entry = state
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| AccountError::Unknown(name.to_string()))?;
        state.current = Some(name.to_string());
        Ok(entry)
    }

    pub fn add(&self, entry: AccountEntry) -> Result<(), AccountError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.entries.contains_key(&entry.name) {
            return Err(AccountError::Duplicate(entry.name));
        }
        state.entries.insert(entry.name.clone(), Arc::new(entry));
        Ok(())
    }

    pub fn len(&self) -> usize {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
