//! Linode instance tools.

use linode_mcp_core::models::{BootRequest, CreateInstanceRequest, Instance, UpdateInstanceRequest};
use serde_json::json;

use crate::args::{Args, FromArgs, check_length};
use crate::dispatch::CallContext;
use crate::format::{self, Details, Record};
use crate::outcome::{ToolError, ToolOutcome};
use crate::registry::ToolRegistration;

use super::{id_property, object_schema};

pub fn registrations() -> Vec<ToolRegistration> {
    let instance_id = || json!({ "instance_id": id_property("ID of the Linode instance") });
    let with_config = || {
        json!({
            "instance_id": id_property("ID of the Linode instance"),
            "config_id": id_property("Configuration profile to boot (optional)")
        })
    };
    vec![
        ToolRegistration::new(
            "linode_instances_list",
            "List Linode instances, optionally filtered by status.",
            object_schema(
                json!({
                    "status": {
                        "type": "string",
                        "description": "Only instances in this status (e.g. running, offline)"
                    }
                }),
                &[],
            ),
            instances_list,
        ),
        ToolRegistration::new(
            "linode_instance_get",
            "Get details for one Linode instance.",
            object_schema(instance_id(), &["instance_id"]),
            instance_get,
        ),
        ToolRegistration::new(
            "linode_instance_create",
            "Create a Linode instance.",
            object_schema(
                json!({
                    "region": { "type": "string", "description": "Region ID, e.g. us-east" },
                    "type": { "type": "string", "description": "Plan ID, e.g. g6-nanode-1" },
                    "label": { "type": "string", "minLength": 3, "maxLength": 64 },
                    "image": { "type": "string", "description": "Image ID, e.g. linode/debian12" },
                    "root_pass": { "type": "string", "description": "Required when image is set" },
                    "authorized_keys": { "type": "array", "items": { "type": "string" } },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "private_ip": { "type": "boolean" },
                    "backups_enabled": { "type": "boolean" }
                }),
                &["region", "type"],
            ),
            instance_create,
        ),
        ToolRegistration::new(
            "linode_instance_update",
            "Rename, retag, or toggle the watchdog of a Linode instance.",
            object_schema(
                json!({
                    "instance_id": id_property("ID of the Linode instance"),
                    "label": { "type": "string", "minLength": 3, "maxLength": 64 },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Replaces the existing tags"
                    },
                    "watchdog_enabled": { "type": "boolean" }
                }),
                &["instance_id"],
            ),
            instance_update,
        ),
        ToolRegistration::new(
            "linode_instance_delete",
            "Delete a Linode instance. This cannot be undone.",
            object_schema(instance_id(), &["instance_id"]),
            instance_delete,
        ),
        ToolRegistration::new(
            "linode_instance_boot",
            "Boot a Linode instance.",
            object_schema(with_config(), &["instance_id"]),
            instance_boot,
        ),
        ToolRegistration::new(
            "linode_instance_shutdown",
            "Shut down a Linode instance.",
            object_schema(instance_id(), &["instance_id"]),
            instance_shutdown,
        ),
        ToolRegistration::new(
            "linode_instance_reboot",
            "Reboot a Linode instance.",
            object_schema(with_config(), &["instance_id"]),
            instance_reboot,
        ),
    ]
}

#[derive(Debug)]
struct ListParams {
    status: Option<String>,
}

impl FromArgs for ListParams {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(Self {
            status: args.optional_string("status")?,
        })
    }
}

#[derive(Debug)]
struct InstanceRef {
    instance_id: u64,
}

impl FromArgs for InstanceRef {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(Self {
            instance_id: args.required_id("instance_id")?,
        })
    }
}

#[derive(Debug)]
struct PowerParams {
    instance_id: u64,
    config_id: Option<u64>,
}

impl FromArgs for PowerParams {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(Self {
            instance_id: args.required_id("instance_id")?,
            config_id: args.optional_id("config_id")?,
        })
    }
}

impl FromArgs for CreateInstanceRequest {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        let region = args.required_string("region")?;
        let instance_type = args.required_string("type")?;
        let label = args.optional_string("label")?;
        if let Some(label) = &label {
            check_length("label", label, 3, 64)?;
        }
        let image = args.optional_string("image")?;
        let root_pass = args.optional_string("root_pass")?;
        if image.is_some() && root_pass.is_none() {
            return Err(ToolError::parameter(
                "root_pass is required and must be a non-empty string when image is set",
            ));
        }
        Ok(Self {
            region,
            instance_type,
            label,
            image,
            root_pass,
            authorized_keys: args.string_list("authorized_keys")?,
            tags: args.string_list("tags")?,
            private_ip: args.optional_bool("private_ip")?,
            backups_enabled: args.optional_bool("backups_enabled")?,
        })
    }
}

async fn instances_list(ctx: CallContext) -> ToolOutcome {
    let params: ListParams = ctx.params()?;
    let instances: Vec<Instance> = ctx
        .client()
        .list_all("/linode/instances")
        .await
        .map_err(ctx.upstream("failed to list instances"))?;

    let records: Vec<Record> = instances
        .iter()
        .filter(|instance| match &params.status {
            Some(status) => instance.status.eq_ignore_ascii_case(status),
            None => true,
        })
        .map(instance_record)
        .collect();
    Ok(format::listing("Linode instance", "Linode instances", &records))
}

fn instance_record(instance: &Instance) -> Record {
    Record::new(instance.id, &instance.label)
        .line(&[
            ("Status", instance.status.as_str()),
            ("Region", instance.region.as_str()),
            ("Type", instance.instance_type.as_str()),
        ])
        .field("IPv4", format::bracketed(&instance.ipv4))
}

async fn instance_get(ctx: CallContext) -> ToolOutcome {
    let params: InstanceRef = ctx.params()?;
    let instance: Instance = ctx
        .client()
        .get(&format!("/linode/instances/{}", params.instance_id))
        .await
        .map_err(ctx.upstream(format!(
            "failed to get instance {}",
            params.instance_id
        )))?;

    Ok(Details::new("Instance")
        .field("ID", instance.id)
        .field("Label", &instance.label)
        .field("Status", &instance.status)
        .field("Region", &instance.region)
        .field("Type", &instance.instance_type)
        .field("Image", format::or_none(instance.image.as_deref()))
        .field("CPUs", instance.specs.vcpus)
        .field("Memory", format::mb(instance.specs.memory))
        .field("Disk", format::mb(instance.specs.disk))
        .field("Transfer", format::gb(instance.specs.transfer))
        .field("IPv4", format::joined(&instance.ipv4))
        .field("IPv6", format::or_none(instance.ipv6.as_deref()))
        .field_opt("Hypervisor", instance.hypervisor.as_deref())
        .field("Watchdog", format::enabled(instance.watchdog_enabled))
        .field("Backups", format::enabled(instance.backups.enabled))
        .field("Tags", format::joined(&instance.tags))
        .field("Created", format::timestamp(instance.created.as_deref()))
        .field("Updated", format::timestamp(instance.updated.as_deref()))
        .render())
}

#[derive(Debug)]
struct UpdateParams {
    instance_id: u64,
    request: UpdateInstanceRequest,
}

impl FromArgs for UpdateParams {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        let instance_id = args.required_id("instance_id")?;
        let label = args.optional_string("label")?;
        if let Some(label) = &label {
            check_length("label", label, 3, 64)?;
        }
        let tags = args.string_list("tags")?;
        let request = UpdateInstanceRequest {
            label,
            tags: (!tags.is_empty()).then_some(tags),
            watchdog_enabled: args.optional_bool("watchdog_enabled")?,
        };
        if request.label.is_none() && request.tags.is_none() && request.watchdog_enabled.is_none() {
            return Err(ToolError::parameter(
                "at least one of label, tags or watchdog_enabled is required",
            ));
        }
        Ok(Self {
            instance_id,
            request,
        })
    }
}

async fn instance_create(ctx: CallContext) -> ToolOutcome {
    let request: CreateInstanceRequest = ctx.params()?;
    let instance: Instance = ctx
        .client()
        .post("/linode/instances", &request)
        .await
        .map_err(ctx.upstream(format!(
            "failed to create instance in {}",
            request.region
        )))?;

    Ok(Details::with_header("Instance created successfully!")
        .field("ID", instance.id)
        .field("Label", &instance.label)
        .field("Status", &instance.status)
        .field("Region", &instance.region)
        .field("Type", &instance.instance_type)
        .field("IPv4", format::joined(&instance.ipv4))
        .render())
}

async fn instance_update(ctx: CallContext) -> ToolOutcome {
    let params: UpdateParams = ctx.params()?;
    let instance: Instance = ctx
        .client()
        .put(
            &format!("/linode/instances/{}", params.instance_id),
            &params.request,
        )
        .await
        .map_err(ctx.upstream(format!(
            "failed to update instance {}",
            params.instance_id
        )))?;

    Ok(Details::with_header("Instance updated successfully!")
        .field("ID", instance.id)
        .field("Label", &instance.label)
        .field("Status", &instance.status)
        .field("Watchdog", format::enabled(instance.watchdog_enabled))
        .field("Tags", format::joined(&instance.tags))
        .render())
}

async fn instance_delete(ctx: CallContext) -> ToolOutcome {
    let params: InstanceRef = ctx.params()?;
    ctx.client()
        .delete(&format!("/linode/instances/{}", params.instance_id))
        .await
        .map_err(ctx.upstream(format!(
            "failed to delete instance {}",
            params.instance_id
        )))?;
    Ok(format!("Instance {} deleted successfully.", params.instance_id))
}

async fn instance_boot(ctx: CallContext) -> ToolOutcome {
    let params: PowerParams = ctx.params()?;
    power_action(&ctx, params.instance_id, "boot", params.config_id).await
}

async fn instance_shutdown(ctx: CallContext) -> ToolOutcome {
    let params: InstanceRef = ctx.params()?;
    power_action(&ctx, params.instance_id, "shutdown", None).await
}

async fn instance_reboot(ctx: CallContext) -> ToolOutcome {
    let params: PowerParams = ctx.params()?;
    power_action(&ctx, params.instance_id, "reboot", params.config_id).await
}

async fn power_action(
    ctx: &CallContext,
    instance_id: u64,
    action: &str,
    config_id: Option<u64>,
) -> ToolOutcome {
    ctx.client()
        .post_action(
            &format!("/linode/instances/{instance_id}/{action}"),
            &BootRequest { config_id },
        )
        .await
        .map_err(ctx.upstream(format!("failed to {action} instance {instance_id}")))?;
    Ok(format!(
        "Instance {instance_id} {action} initiated successfully."
    ))
}
