use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::auth::token_fingerprint;
use crate::error::ConfigError;

/// Provider API root used when an account has no override.
pub const DEFAULT_API_URL: &str = "https://api.linode.com/v4";

/// Credentials and endpoint for one provider account.
#[derive(Clone, Deserialize)]
pub struct AccountConfig {
    /// Human-readable label shown in account listings
    #[serde(default)]
    pub label: String,
    /// Personal access token. Never logged.
    pub token: String,
    /// Optional API root override (e.g. a mock server or a proxy)
    #[serde(default, alias = "api_base_url")]
    pub api_url: Option<String>,
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("label", &self.label)
            .field("token", &token_fingerprint(&self.token))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// On-disk configuration, as written by the user.
///
/// ```json
/// {
///   "default_account": "prod",
///   "accounts": {
///     "prod": { "label": "Production", "token": "..." },
///     "dev":  { "label": "Dev", "token": "...", "api_url": "http://localhost:8080/v4" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub default_account: Option<String>,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

/// Validated account configuration. Construction guarantees a non-empty
/// account set whose default refers to one of its keys.
#[derive(Debug, Clone)]
pub struct AccountsConfig {
    default_account: String,
    accounts: BTreeMap<String, AccountConfig>,
}

impl AccountsConfig {
    pub fn default_account(&self) -> &str {
        &self.default_account
    }

    pub fn accounts(&self) -> &BTreeMap<String, AccountConfig> {
        &self.accounts
    }

    pub fn into_parts(self) -> (String, BTreeMap<String, AccountConfig>) {
        (self.default_account, self.accounts)
    }
}

pub fn default_config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("linode-mcp");
    config_dir.join("config.json")
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// A one-account configuration, typically built from environment variables.
    pub fn single(
        name: impl Into<String>,
        label: impl Into<String>,
        token: impl Into<String>,
        api_url: Option<String>,
    ) -> Self {
        let name = name.into();
        let mut accounts = BTreeMap::new();
        accounts.insert(
            name.clone(),
            AccountConfig {
                label: label.into(),
                token: token.into(),
                api_url,
            },
        );
        Self {
            default_account: Some(name),
            accounts,
        }
    }

    /// Check the configuration and pick the default account.
    /// `default_override` wins over the file's `default_account`.
    pub fn validate(self, default_override: Option<&str>) -> Result<AccountsConfig, ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }

        for (name, account) in &self.accounts {
            validate_account(name, account)?;
        }

        let default_account = match default_override
            .map(str::to_string)
            .or(self.default_account)
            .filter(|name| !name.trim().is_empty())
        {
            Some(name) => name,
            None if self.accounts.len() == 1 => self
                .accounts
                .keys()
                .next()
                .cloned()
                .ok_or(ConfigError::NoAccounts)?,
            None => return Err(ConfigError::MissingDefault),
        };

        if !self.accounts.contains_key(&default_account) {
            return Err(ConfigError::UnknownDefault(default_account));
        }

        Ok(AccountsConfig {
            default_account,
            accounts: self.accounts,
        })
    }
}

fn validate_account(name: &str, account: &AccountConfig) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyAccountName);
    }
    if account.token.trim().is_empty() {
        return Err(ConfigError::EmptyToken(name.to_string()));
    }
    if let Some(raw) = &account.api_url {
        validate_api_url(name, raw)?;
    }
    Ok(())
}

pub fn validate_api_url(name: &str, raw: &str) -> Result<url::Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        name: name.to_string(),
        url: raw.to_string(),
        reason,
    };
    let parsed = url::Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn account(token: &str, api_url: Option<&str>) -> AccountConfig {
        AccountConfig {
            label: "Label".to_string(),
            token: token.to_string(),
            api_url: api_url.map(str::to_string),
        }
    }

    #[test]
    fn empty_account_set_is_rejected() {
        let err = ConfigFile::default().validate(None).unwrap_err();
        assert!(matches!(err, ConfigError::NoAccounts));
    }

    #[test]
    fn single_account_becomes_default() {
        let mut file = ConfigFile::default();
        file.accounts.insert("only".to_string(), account("t", None));
        let config = file.validate(None).unwrap();
        assert_eq!(config.default_account(), "only");
    }

    #[test]
    fn multiple_accounts_require_default() {
        let mut file = ConfigFile::default();
        file.accounts.insert("a".to_string(), account("t1", None));
        file.accounts.insert("b".to_string(), account("t2", None));
        let err = file.clone().validate(None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDefault));

        let config = file.validate(Some("b")).unwrap();
        assert_eq!(config.default_account(), "b");
    }

    #[test]
    fn unknown_default_is_rejected() {
        let file = ConfigFile::single("a", "A", "tok", None);
        let err = file.validate(Some("missing")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDefault(name) if name == "missing"));
    }

    #[test]
    fn malformed_url_is_rejected() {
        let file = ConfigFile::single("a", "A", "tok", Some("not a url".to_string()));
        assert!(matches!(
            file.validate(None).unwrap_err(),
            ConfigError::InvalidUrl { .. }
        ));

        let file = ConfigFile::single("a", "A", "tok", Some("ftp://example.com".to_string()));
        assert!(matches!(
            file.validate(None).unwrap_err(),
            ConfigError::InvalidUrl { .. }
        ));
    }

    #[test]
    fn empty_token_is_rejected() {
        let file = ConfigFile::single("a", "A", "  ", None);
        assert!(matches!(
            file.validate(None).unwrap_err(),
            ConfigError::EmptyToken(name) if name == "a"
        ));
    }

    #[test]
    fn debug_output_never_contains_token() {
        let cfg = account("super-secret-token", None);
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("sha256:"));
    }

    #[test]
    fn load_reads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "default_account": "dev",
                "accounts": {{
                    "dev": {{ "label": "Dev", "token": "t1", "api_base_url": "http://127.0.0.1:8080/v4" }},
                    "prod": {{ "label": "Prod", "token": "t2" }}
                }}
            }}"#
        )
        .unwrap();

        let config = ConfigFile::load(file.path()).unwrap().validate(None).unwrap();
        assert_eq!(config.default_account(), "dev");
        assert_eq!(config.accounts().len(), 2);
        assert_eq!(
            config.accounts()["dev"].api_url.as_deref(),
            Some("http://127.0.0.1:8080/v4")
        );
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = ConfigFile::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("failed to parse config file"));
    }
}
