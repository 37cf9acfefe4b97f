//! Networking tools: firewalls, NodeBalancers, DNS domains.

use linode_mcp_core::models::{Domain, Firewall, FirewallRule, NodeBalancer};
use serde_json::json;

use crate::args::{Args, FromArgs, NoParams};
use crate::dispatch::CallContext;
use crate::format::{self, Details, Record};
use crate::outcome::{ToolError, ToolOutcome};
use crate::registry::ToolRegistration;

use super::{id_property, no_params_schema, object_schema};

pub fn registrations() -> Vec<ToolRegistration> {
    vec![
        ToolRegistration::new(
            "linode_firewalls_list",
            "List Cloud Firewalls.",
            no_params_schema(),
            firewalls_list,
        ),
        ToolRegistration::new(
            "linode_firewall_get",
            "Get a Cloud Firewall and its rules.",
            object_schema(
                json!({ "firewall_id": id_property("ID of the firewall") }),
                &["firewall_id"],
            ),
            firewall_get,
        ),
        ToolRegistration::new(
            "linode_nodebalancers_list",
            "List NodeBalancers.",
            no_params_schema(),
            nodebalancers_list,
        ),
        ToolRegistration::new(
            "linode_nodebalancer_get",
            "Get details for one NodeBalancer.",
            object_schema(
                json!({ "nodebalancer_id": id_property("ID of the NodeBalancer") }),
                &["nodebalancer_id"],
            ),
            nodebalancer_get,
        ),
        ToolRegistration::new(
            "linode_domains_list",
            "List DNS domains.",
            no_params_schema(),
            domains_list,
        ),
        ToolRegistration::new(
            "linode_domain_get",
            "Get details for one DNS domain.",
            object_schema(
                json!({ "domain_id": id_property("ID of the domain") }),
                &["domain_id"],
            ),
            domain_get,
        ),
    ]
}

#[derive(Debug)]
struct FirewallRef {
    id: u64,
}

impl FromArgs for FirewallRef {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(Self {
            id: args.required_id("firewall_id")?,
        })
    }
}

#[derive(Debug)]
struct NodeBalancerRef {
    id: u64,
}

impl FromArgs for NodeBalancerRef {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(Self {
            id: args.required_id("nodebalancer_id")?,
        })
    }
}

#[derive(Debug)]
struct DomainRef {
    id: u64,
}

impl FromArgs for DomainRef {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(Self {
            id: args.required_id("domain_id")?,
        })
    }
}

async fn firewalls_list(ctx: CallContext) -> ToolOutcome {
    ctx.params::<NoParams>()?;
    let firewalls: Vec<Firewall> = ctx
        .client()
        .list_all("/networking/firewalls")
        .await
        .map_err(ctx.upstream("failed to list firewalls"))?;

    let records: Vec<Record> = firewalls
        .iter()
        .map(|firewall| {
            Record::new(firewall.id, &firewall.label)
                .line(&[
                    ("Status", firewall.status.as_str()),
                    ("Inbound Policy", firewall.rules.inbound_policy.as_str()),
                    ("Outbound Policy", firewall.rules.outbound_policy.as_str()),
                ])
                .line(&[
                    ("Inbound Rules", firewall.rules.inbound.len()),
                    ("Outbound Rules", firewall.rules.outbound.len()),
                ])
        })
        .collect();
    Ok(format::listing("firewall", "firewalls", &records))
}

async fn firewall_get(ctx: CallContext) -> ToolOutcome {
    let params: FirewallRef = ctx.params()?;
    let firewall: Firewall = ctx
        .client()
        .get(&format!("/networking/firewalls/{}", params.id))
        .await
        .map_err(ctx.upstream(format!("failed to get firewall {}", params.id)))?;

    let mut details = Details::new("Firewall")
        .field("ID", firewall.id)
        .field("Label", &firewall.label)
        .field("Status", &firewall.status)
        .field("Inbound Policy", &firewall.rules.inbound_policy)
        .field("Outbound Policy", &firewall.rules.outbound_policy)
        .field("Tags", format::joined(&firewall.tags))
        .field("Created", format::timestamp(firewall.created.as_deref()))
        .field("Updated", format::timestamp(firewall.updated.as_deref()));

    for (title, rules) in [
        ("Inbound Rules", &firewall.rules.inbound),
        ("Outbound Rules", &firewall.rules.outbound),
    ] {
        details = details.section(title);
        if rules.is_empty() {
            details = details.item("None");
        }
        for rule in rules {
            details = details.item(rule_line(rule));
        }
    }
    Ok(details.render())
}

fn rule_line(rule: &FirewallRule) -> String {
    let mut addresses: Vec<&str> = Vec::new();
    for list in [&rule.addresses.ipv4, &rule.addresses.ipv6].into_iter().flatten() {
        addresses.extend(list.iter().map(String::as_str));
    }
    format!(
        "{}: {} {} | Ports: {} | Addresses: {}",
        format::or_none(rule.label.as_deref()),
        rule.action,
        rule.protocol,
        rule.ports.as_deref().unwrap_or("All"),
        format::joined(&addresses)
    )
}

async fn nodebalancers_list(ctx: CallContext) -> ToolOutcome {
    ctx.params::<NoParams>()?;
    let balancers: Vec<NodeBalancer> = ctx
        .client()
        .list_all("/nodebalancers")
        .await
        .map_err(ctx.upstream("failed to list NodeBalancers"))?;

    let records: Vec<Record> = balancers
        .iter()
        .map(|nb| {
            Record::new(nb.id, &nb.label)
                .line(&[("Region", nb.region.as_str()), ("Hostname", nb.hostname.as_str())])
                .line(&[
                    ("IPv4", nb.ipv4.clone()),
                    ("Throttle", format::conn_per_sec(nb.client_conn_throttle)),
                ])
        })
        .collect();
    Ok(format::listing("NodeBalancer", "NodeBalancers", &records))
}

async fn nodebalancer_get(ctx: CallContext) -> ToolOutcome {
    let params: NodeBalancerRef = ctx.params()?;
    let nb: NodeBalancer = ctx
        .client()
        .get(&format!("/nodebalancers/{}", params.id))
        .await
        .map_err(ctx.upstream(format!("failed to get NodeBalancer {}", params.id)))?;

    let transfer = |value: Option<f64>| match value {
        Some(v) => format::mb(format!("{v:.2}")),
        None => "Unknown".to_string(),
    };
    Ok(Details::new("NodeBalancer")
        .field("ID", nb.id)
        .field("Label", &nb.label)
        .field("Region", &nb.region)
        .field("Hostname", &nb.hostname)
        .field("IPv4", &nb.ipv4)
        .field("IPv6", format::or_none(nb.ipv6.as_deref()))
        .field("Client Connection Throttle", format::conn_per_sec(nb.client_conn_throttle))
        .field("Transfer In", transfer(nb.transfer.inbound))
        .field("Transfer Out", transfer(nb.transfer.outbound))
        .field("Transfer Total", transfer(nb.transfer.total))
        .field("Tags", format::joined(&nb.tags))
        .field("Created", format::timestamp(nb.created.as_deref()))
        .field("Updated", format::timestamp(nb.updated.as_deref()))
        .render())
}

async fn domains_list(ctx: CallContext) -> ToolOutcome {
    ctx.params::<NoParams>()?;
    let domains: Vec<Domain> = ctx
        .client()
        .list_all("/domains")
        .await
        .map_err(ctx.upstream("failed to list domains"))?;

    let records: Vec<Record> = domains
        .iter()
        .map(|domain| {
            Record::new(domain.id, &domain.domain)
                .line(&[
                    ("Type", domain.domain_type.as_str()),
                    ("Status", domain.status.as_str()),
                ])
                .field("SOA Email", format::or_none(domain.soa_email.as_deref()))
        })
        .collect();
    Ok(format::listing("domain", "domains", &records))
}

async fn domain_get(ctx: CallContext) -> ToolOutcome {
    let params: DomainRef = ctx.params()?;
    let domain: Domain = ctx
        .client()
        .get(&format!("/domains/{}", params.id))
        .await
        .map_err(ctx.upstream(format!("failed to get domain {}", params.id)))?;

    Ok(Details::new("Domain")
        .field("ID", domain.id)
        .field("Domain", &domain.domain)
        .field("Type", &domain.domain_type)
        .field("Status", &domain.status)
        .field("SOA Email", format::or_none(domain.soa_email.as_deref()))
        .field("Description", format::or_none(domain.description.as_deref()))
        .field("TTL", format!("{} seconds", domain.ttl_sec))
        .field("Tags", format::joined(&domain.tags))
        .field("Created", format::timestamp(domain.created.as_deref()))
        .field("Updated", format::timestamp(domain.updated.as_deref()))
        .render())
}
