//! Read-only catalog tools: regions, plans, images.

use linode_mcp_core::models::{Image, LinodeType, Region};
use serde_json::json;

use crate::args::{Args, FromArgs, NoParams};
use crate::dispatch::CallContext;
use crate::format::{self, Record};
use crate::outcome::{ToolError, ToolOutcome};
use crate::registry::ToolRegistration;

use super::{no_params_schema, object_schema};

pub fn registrations() -> Vec<ToolRegistration> {
    vec![
        ToolRegistration::new(
            "linode_regions_list",
            "List regions where resources can be deployed.",
            no_params_schema(),
            regions_list,
        ),
        ToolRegistration::new(
            "linode_types_list",
            "List instance plans with their sizes and prices.",
            no_params_schema(),
            types_list,
        ),
        ToolRegistration::new(
            "linode_images_list",
            "List disk images available to the account.",
            object_schema(
                json!({
                    "public_only": {
                        "type": "boolean",
                        "default": false,
                        "description": "Hide private images"
                    }
                }),
                &[],
            ),
            images_list,
        ),
    ]
}

#[derive(Debug)]
struct ImagesParams {
    public_only: bool,
}

impl FromArgs for ImagesParams {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(Self {
            public_only: args.optional_bool("public_only")?.unwrap_or(false),
        })
    }
}

async fn regions_list(ctx: CallContext) -> ToolOutcome {
    ctx.params::<NoParams>()?;
    let regions: Vec<Region> = ctx
        .client()
        .list_all("/regions")
        .await
        .map_err(ctx.upstream("failed to list regions"))?;

    let records: Vec<Record> = regions
        .iter()
        .map(|region| {
            Record::new(&region.id, &region.label)
                .line(&[
                    ("Country", region.country.to_uppercase()),
                    ("Status", region.status.clone()),
                ])
                .field("Capabilities", format::joined(&region.capabilities))
        })
        .collect();
    Ok(format::listing("region", "regions", &records))
}

async fn types_list(ctx: CallContext) -> ToolOutcome {
    ctx.params::<NoParams>()?;
    let types: Vec<LinodeType> = ctx
        .client()
        .list_all("/linode/types")
        .await
        .map_err(ctx.upstream("failed to list instance types"))?;

    let records: Vec<Record> = types.iter().map(type_record).collect();
    Ok(format::listing("instance type", "instance types", &records))
}

fn type_record(plan: &LinodeType) -> Record {
    Record::new(&plan.id, &plan.label)
        .line(&[
            ("Class", plan.class.clone()),
            ("CPUs", plan.vcpus.to_string()),
            ("Memory", format::mb(plan.memory)),
            ("Disk", format::mb(plan.disk)),
        ])
        .line(&[
            ("Transfer", format::gb(plan.transfer)),
            ("Network Out", format!("{} Mbps", plan.network_out)),
        ])
        .field(
            "Price",
            format!("${:.4}/hr | ${:.2}/mo", plan.price.hourly, plan.price.monthly),
        )
}

async fn images_list(ctx: CallContext) -> ToolOutcome {
    let params: ImagesParams = ctx.params()?;
    let images: Vec<Image> = ctx
        .client()
        .list_all("/images")
        .await
        .map_err(ctx.upstream("failed to list images"))?;

    let records: Vec<Record> = images
        .iter()
        .filter(|image| image.is_public || !params.public_only)
        .map(|image| {
            Record::new(&image.id, &image.label)
                .line(&[
                    ("Vendor", format::or_none(image.vendor.as_deref()).to_string()),
                    ("Size", format::mb(image.size)),
                    ("Status", image.status.clone()),
                ])
                .line(&[("Public", image.is_public), ("Deprecated", image.deprecated)])
        })
        .collect();
    Ok(format::listing("image", "images", &records))
}
