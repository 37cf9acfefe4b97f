//! Kubernetes (LKE) cluster tools.

use linode_mcp_core::models::{LkeCluster, LkeNodePool};
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
            "linode_lke_clusters_list",
            "List Kubernetes (LKE) clusters.",
            no_params_schema(),
            clusters_list,
        ),
        ToolRegistration::new(
            "linode_lke_cluster_get",
            "Get an LKE cluster with its node pools.",
            object_schema(
                json!({ "cluster_id": id_property("ID of the LKE cluster") }),
                &["cluster_id"],
            ),
            cluster_get,
        ),
    ]
}

#[derive(Debug)]
struct ClusterRef {
    cluster_id: u64,
}

impl FromArgs for ClusterRef {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(Self {
            cluster_id: args.required_id("cluster_id")?,
        })
    }
}

async fn clusters_list(ctx: CallContext) -> ToolOutcome {
    ctx.params::<NoParams>()?;
    let clusters: Vec<LkeCluster> = ctx
        .client()
        .list_all("/lke/clusters")
        .await
        .map_err(ctx.upstream("failed to list LKE clusters"))?;

    let records: Vec<Record> = clusters
        .iter()
        .map(|cluster| {
            Record::new(cluster.id, &cluster.label)
                .line(&[
                    ("Region", cluster.region.as_str()),
                    ("Kubernetes", cluster.k8s_version.as_str()),
                    ("Status", cluster.status.as_str()),
                ])
                .field(
                    "High Availability",
                    format::enabled(cluster.control_plane.high_availability),
                )
        })
        .collect();
    Ok(format::listing("LKE cluster", "LKE clusters", &records))
}

async fn cluster_get(ctx: CallContext) -> ToolOutcome {
    let params: ClusterRef = ctx.params()?;
    let id = params.cluster_id;
    let cluster_path = format!("/lke/clusters/{id}");
    let pools_path = format!("/lke/clusters/{id}/pools");

    let (cluster, pools): (LkeCluster, Vec<LkeNodePool>) = tokio::try_join!(
        ctx.client().get(&cluster_path),
        ctx.client().list_all(&pools_path),
    )
    .map_err(ctx.upstream(format!("failed to get LKE cluster {id}")))?;

    let mut details = Details::new("LKE Cluster")
        .field("ID", cluster.id)
        .field("Label", &cluster.label)
        .field("Region", &cluster.region)
        .field("Kubernetes Version", &cluster.k8s_version)
        .field("Status", &cluster.status)
        .field(
            "High Availability",
            format::enabled(cluster.control_plane.high_availability),
        )
        .field("Tags", format::joined(&cluster.tags))
        .field("Created", format::timestamp(cluster.created.as_deref()))
        .field("Updated", format::timestamp(cluster.updated.as_deref()))
        .section("Node Pools");
    if pools.is_empty() {
        details = details.item("None");
    }
    for pool in &pools {
        details = details.item(pool_line(pool));
    }
    Ok(details.render())
}

fn pool_line(pool: &LkeNodePool) -> String {
    let ready = pool.nodes.iter().filter(|n| n.status == "ready").count();
    let autoscaler = if pool.autoscaler.enabled {
        format!(
            "{} ({}-{})",
            format::enabled(true),
            pool.autoscaler.min,
            pool.autoscaler.max
        )
    } else {
        format::enabled(false).to_string()
    };
    format!(
        "Pool {}: {} x {} | Ready: {}/{} | Autoscaler: {}",
        pool.id,
        pool.count,
        pool.pool_type,
        ready,
        pool.nodes.len(),
        autoscaler
    )
}
