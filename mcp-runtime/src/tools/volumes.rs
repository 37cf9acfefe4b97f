//! Block storage volume tools.

use linode_mcp_core::models::{AttachVolumeRequest, CreateVolumeRequest, Volume};
use serde_json::json;

use crate::args::{Args, FromArgs, NoParams, check_length};
use crate::dispatch::CallContext;
use crate::format::{self, Details, Record};
use crate::outcome::{ToolError, ToolOutcome};
use crate::registry::ToolRegistration;

use super::{id_property, no_params_schema, object_schema};

pub const MIN_VOLUME_SIZE_GB: u64 = 10;
pub const MAX_VOLUME_SIZE_GB: u64 = 8192;

pub fn registrations() -> Vec<ToolRegistration> {
    let volume_id = || json!({ "volume_id": id_property("ID of the volume") });
    vec![
        ToolRegistration::new(
            "linode_volumes_list",
            "List block storage volumes.",
            no_params_schema(),
            volumes_list,
        ),
        ToolRegistration::new(
            "linode_volume_get",
            "Get details for one block storage volume.",
            object_schema(volume_id(), &["volume_id"]),
            volume_get,
        ),
        ToolRegistration::new(
            "linode_volume_create",
            "Create a block storage volume in a region or attached to an instance.",
            object_schema(
                json!({
                    "label": { "type": "string", "minLength": 1, "maxLength": 32 },
                    "size": {
                        "type": "number",
                        "minimum": MIN_VOLUME_SIZE_GB,
                        "maximum": MAX_VOLUME_SIZE_GB,
                        "description": "Size in GB"
                    },
                    "region": { "type": "string", "description": "Required unless linode_id is set" },
                    "linode_id": id_property("Instance to attach the new volume to"),
                    "tags": { "type": "array", "items": { "type": "string" } }
                }),
                &["label", "size"],
            ),
            volume_create,
        ),
        ToolRegistration::new(
            "linode_volume_delete",
            "Delete a detached block storage volume. This cannot be undone.",
            object_schema(volume_id(), &["volume_id"]),
            volume_delete,
        ),
        ToolRegistration::new(
            "linode_volume_attach",
            "Attach a volume to a Linode instance.",
            object_schema(
                json!({
                    "volume_id": id_property("ID of the volume"),
                    "linode_id": id_property("Instance to attach to"),
                    "config_id": id_property("Configuration profile (optional)")
                }),
                &["volume_id", "linode_id"],
            ),
            volume_attach,
        ),
        ToolRegistration::new(
            "linode_volume_detach",
            "Detach a volume from its instance.",
            object_schema(volume_id(), &["volume_id"]),
            volume_detach,
        ),
    ]
}

#[derive(Debug)]
struct VolumeRef {
    volume_id: u64,
}

impl FromArgs for VolumeRef {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(Self {
            volume_id: args.required_id("volume_id")?,
        })
    }
}

#[derive(Debug)]
struct AttachParams {
    volume_id: u64,
    request: AttachVolumeRequest,
}

impl FromArgs for AttachParams {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(Self {
            volume_id: args.required_id("volume_id")?,
            request: AttachVolumeRequest {
                linode_id: args.required_id("linode_id")?,
                config_id: args.optional_id("config_id")?,
            },
        })
    }
}

impl FromArgs for CreateVolumeRequest {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        let label = args.required_string("label")?;
        check_length("label", &label, 1, 32)?;
        let size = args.required_in_range("size", MIN_VOLUME_SIZE_GB, MAX_VOLUME_SIZE_GB)?;
        let region = args.optional_string("region")?;
        let linode_id = args.optional_id("linode_id")?;
        if region.is_none() && linode_id.is_none() {
            return Err(ToolError::parameter(
                "region is required and must be a non-empty string when linode_id is not set",
            ));
        }
        Ok(Self {
            label,
            size,
            region,
            linode_id,
            tags: args.string_list("tags")?,
        })
    }
}

async fn volumes_list(ctx: CallContext) -> ToolOutcome {
    ctx.params::<NoParams>()?;
    let volumes: Vec<Volume> = ctx
        .client()
        .list_all("/volumes")
        .await
        .map_err(ctx.upstream("failed to list volumes"))?;

    let records: Vec<Record> = volumes
        .iter()
        .map(|volume| {
            Record::new(volume.id, &volume.label)
                .line(&[
                    ("Status", volume.status.clone()),
                    ("Size", format::gb(volume.size)),
                    ("Region", volume.region.clone()),
                ])
                .field("Attached To", attached_to(volume))
        })
        .collect();
    Ok(format::listing("volume", "volumes", &records))
}

fn attached_to(volume: &Volume) -> String {
    match (volume.linode_id, volume.linode_label.as_deref()) {
        (Some(id), Some(label)) if !label.is_empty() => format!("{label} ({id})"),
        (Some(id), _) => id.to_string(),
        (None, _) => "Not attached".to_string(),
    }
}

async fn volume_get(ctx: CallContext) -> ToolOutcome {
    let params: VolumeRef = ctx.params()?;
    let volume: Volume = ctx
        .client()
        .get(&format!("/volumes/{}", params.volume_id))
        .await
        .map_err(ctx.upstream(format!("failed to get volume {}", params.volume_id)))?;

    Ok(Details::new("Volume")
        .field("ID", volume.id)
        .field("Label", &volume.label)
        .field("Status", &volume.status)
        .field("Size", format::gb(volume.size))
        .field("Region", &volume.region)
        .field("Attached To", attached_to(&volume))
        .field("Filesystem Path", format::or_none(Some(volume.filesystem_path.as_str())))
        .field("Tags", format::joined(&volume.tags))
        .field("Created", format::timestamp(volume.created.as_deref()))
        .field("Updated", format::timestamp(volume.updated.as_deref()))
        .render())
}

async fn volume_create(ctx: CallContext) -> ToolOutcome {
    let request: CreateVolumeRequest = ctx.params()?;
    let volume: Volume = ctx
        .client()
        .post("/volumes", &request)
        .await
        .map_err(ctx.upstream(format!("failed to create volume {}", request.label)))?;

    Ok(Details::with_header("Volume created successfully!")
        .field("ID", volume.id)
        .field("Label", &volume.label)
        .field("Status", &volume.status)
        .field("Size", format::gb(volume.size))
        .field("Region", &volume.region)
        .field("Attached To", attached_to(&volume))
        .render())
}

async fn volume_delete(ctx: CallContext) -> ToolOutcome {
    let params: VolumeRef = ctx.params()?;
    ctx.client()
        .delete(&format!("/volumes/{}", params.volume_id))
        .await
        .map_err(ctx.upstream(format!("failed to delete volume {}", params.volume_id)))?;
    Ok(format!("Volume {} deleted successfully.", params.volume_id))
}

async fn volume_attach(ctx: CallContext) -> ToolOutcome {
    let params: AttachParams = ctx.params()?;
    let volume: Volume = ctx
        .client()
        .post(&format!("/volumes/{}/attach", params.volume_id), &params.request)
        .await
        .map_err(ctx.upstream(format!(
            "failed to attach volume {} to instance {}",
            params.volume_id, params.request.linode_id
        )))?;
    Ok(format!(
        "Volume {} attached to instance {} successfully.\nFilesystem Path: {}",
        params.volume_id,
        params.request.linode_id,
        format::or_none(Some(volume.filesystem_path.as_str()))
    ))
}

async fn volume_detach(ctx: CallContext) -> ToolOutcome {
    let params: VolumeRef = ctx.params()?;
    ctx.client()
        .post_action(&format!("/volumes/{}/detach", params.volume_id), &json!({}))
        .await
        .map_err(ctx.upstream(format!("failed to detach volume {}", params.volume_id)))?;
    Ok(format!("Volume {} detached successfully.", params.volume_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn decode(value: Value) -> Result<CreateVolumeRequest, ToolError> {
        let map: Map<String, Value> = value.as_object().cloned().unwrap();
        CreateVolumeRequest::from_args(&Args::new(&map))
    }

    #[test]
    fn size_is_required_and_bounded() {
        let err = decode(json!({ "label": "x" })).unwrap_err();
        assert_eq!(
            err.to_string(),
            "size is required and must be a number between 10 and 8192"
        );
        let err = decode(json!({ "label": "x", "size": 9000, "region": "us-east" })).unwrap_err();
        assert_eq!(
            err.to_string(),
            "size must be a number between 10 and 8192 (got 9000)"
        );
    }

    #[test]
    fn region_or_instance_is_required() {
        let err = decode(json!({ "label": "x", "size": 20 })).unwrap_err();
        assert!(err.to_string().starts_with("region is required"));

        let request = decode(json!({ "label": "x", "size": 20.0, "linode_id": 123456 })).unwrap();
        assert_eq!(request.size, 20);
        assert_eq!(request.linode_id, Some(123456));
        assert_eq!(request.region, None);
    }

    #[test]
    fn attachment_rendering() {
        let mut volume = Volume::default();
        assert_eq!(attached_to(&volume), "Not attached");
        volume.linode_id = Some(7);
        assert_eq!(attached_to(&volume), "7");
        volume.linode_label = Some("web-1".to_string());
        assert_eq!(attached_to(&volume), "web-1 (7)");
    }
}
