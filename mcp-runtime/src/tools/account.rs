//! Account tools: who am I, which accounts exist, switch between them.

use linode_mcp_core::models::{Profile, SshKey};
use serde_json::json;

use crate::args::{Args, FromArgs, NoParams};
use crate::dispatch::CallContext;
use crate::format::{self, Details, Record};
use crate::outcome::{ToolError, ToolOutcome};
use crate::registry::ToolRegistration;

use super::{no_params_schema, object_schema};

pub fn registrations() -> Vec<ToolRegistration> {
    vec![
        ToolRegistration::new(
            "linode_account_get",
            "Show the current account and the provider profile behind its token.",
            no_params_schema(),
            account_get,
        ),
        ToolRegistration::new(
            "linode_account_list",
            "List configured accounts and mark the current one.",
            no_params_schema(),
            account_list,
        ),
        ToolRegistration::new(
            "linode_account_switch",
            "Switch the current account after verifying its credentials.",
            object_schema(
                json!({
                    "account_name": { "type": "string", "description": "Configured account name" }
                }),
                &["account_name"],
            ),
            account_switch,
        ),
        ToolRegistration::new(
            "linode_sshkeys_list",
            "List SSH keys stored on the current account's profile.",
            no_params_schema(),
            sshkeys_list,
        ),
    ]
}

#[derive(Debug)]
struct SwitchParams {
    account_name: String,
}

impl FromArgs for SwitchParams {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(Self {
            account_name: args.required_string("account_name")?,
        })
    }
}

async fn account_get(ctx: CallContext) -> ToolOutcome {
    ctx.params::<NoParams>()?;
    let profile: Profile = ctx
        .client()
        .get("/profile")
        .await
        .map_err(ctx.upstream("failed to get account profile"))?;
    let account = ctx.account();

    Ok(Details::with_header(format!(
        "Account: {} ({})",
        account.name(),
        account.label()
    ))
    .field("Username", &profile.username)
    .field("Email", &profile.email)
    .field("UID", profile.uid)
    .field("Restricted", profile.restricted)
    .field("Two-Factor Auth", format::enabled(profile.two_factor_auth))
    .field_opt("Timezone", profile.timezone.as_deref())
    .field("API URL", account.base_url())
    .render())
}

async fn account_list(ctx: CallContext) -> ToolOutcome {
    ctx.params::<NoParams>()?;
    let records: Vec<Record> = ctx
        .accounts()
        .list()
        .into_iter()
        .map(|row| {
            Record::new(&row.name, &row.label).line(&[
                ("Current", row.is_current.to_string()),
                ("API URL", row.base_url),
            ])
        })
        .collect();
    Ok(format::listing("account", "accounts", &records))
}

async fn account_switch(ctx: CallContext) -> ToolOutcome {
    let params: SwitchParams = ctx.params()?;
    let target = ctx.accounts().get(&params.account_name)?;

    // Prove the target credentials work before anyone is routed to them.
    let profile: Profile = target.client().get("/profile").await.map_err(ctx.upstream(
        format!("failed to verify account {}", params.account_name),
    ))?;
    let target = ctx.accounts().switch(&params.account_name)?;
    tracing::info!(
        from = ctx.account().name(),
        to = target.name(),
        token = target.token_fingerprint(),
        "switched account"
    );

    Ok(Details::with_header(format!(
        "Switched to account: {} ({})",
        target.name(),
        target.label()
    ))
    .field("Username", &profile.username)
    .field("Email", &profile.email)
    .field("API URL", target.base_url())
    .render())
}

async fn sshkeys_list(ctx: CallContext) -> ToolOutcome {
    ctx.params::<NoParams>()?;
    let keys: Vec<SshKey> = ctx
        .client()
        .list_all("/profile/sshkeys")
        .await
        .map_err(ctx.upstream("failed to list SSH keys"))?;
    let records: Vec<Record> = keys
        .iter()
        .map(|key| {
            Record::new(key.id, &key.label)
                .field("Key", abbreviate_key(&key.ssh_key))
                .field("Created", format::timestamp(key.created.as_deref()))
        })
        .collect();
    Ok(format::listing("SSH key", "SSH keys", &records))
}

/// `ssh-ed25519 AAAAC3Nz...` keeps the algorithm and a short prefix.
fn abbreviate_key(key: &str) -> String {
    let mut parts = key.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(kind), Some(body)) if body.chars().count() > 16 => {
            let prefix: String = body.chars().take(16).collect();
            format!("{kind} {prefix}...")
        }
        (Some(kind), Some(body)) => format!("{kind} {body}"),
        (Some(kind), None) => kind.to_string(),
        _ => "None".to_string(),
    }
}
