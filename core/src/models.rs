//! Provider resource models.
//!
//! Every struct is `#[serde(default)]`: the provider adds fields freely and
//! omits optional ones, and formatting must never fail on a sparse payload.
//! Timestamps stay as the provider's strings; rendering normalizes them.

use serde::{Deserialize, Serialize};

/// One page of a paginated collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub pages: u32,
    pub results: u32,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            page: 1,
            pages: 1,
            results: 0,
        }
    }
}

/// Error body returned by the provider on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub errors: Vec<ErrorReason>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorReason {
    pub reason: String,
    pub field: Option<String>,
}

/// The authenticated user behind a token (`/profile`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub username: String,
    pub email: String,
    pub uid: u64,
    pub restricted: bool,
    pub two_factor_auth: bool,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub id: u64,
    pub label: String,
    pub status: String,
    pub region: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    pub image: Option<String>,
    pub ipv4: Vec<String>,
    pub ipv6: Option<String>,
    pub specs: InstanceSpecs,
    pub hypervisor: Option<String>,
    pub watchdog_enabled: bool,
    pub backups: Backups,
    pub tags: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

/// Sizes in MB except `transfer` (GB per month).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InstanceSpecs {
    pub vcpus: u32,
    pub memory: u64,
    pub disk: u64,
    pub transfer: u64,
    pub gpus: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Backups {
    pub enabled: bool,
}

/// Block storage volume. `size` is in GB.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Volume {
    pub id: u64,
    pub label: String,
    pub status: String,
    pub size: u64,
    pub region: String,
    pub linode_id: Option<u64>,
    pub linode_label: Option<String>,
    pub filesystem_path: String,
    pub tags: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Region {
    pub id: String,
    pub label: String,
    pub country: String,
    pub status: String,
    pub capabilities: Vec<String>,
}

/// A plan. `disk` and `memory` in MB, `transfer` in GB, `network_out` in Mbps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinodeType {
    pub id: String,
    pub label: String,
    pub class: String,
    pub vcpus: u32,
    pub memory: u64,
    pub disk: u64,
    pub transfer: u64,
    pub network_out: u64,
    pub price: Price,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Price {
    pub hourly: f64,
    pub monthly: f64,
}

/// Disk image. `size` in MB.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Image {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub is_public: bool,
    pub deprecated: bool,
    pub size: u64,
    pub status: String,
    pub created: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Firewall {
    pub id: u64,
    pub label: String,
    pub status: String,
    pub rules: FirewallRules,
    pub tags: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FirewallRules {
    pub inbound_policy: String,
    pub outbound_policy: String,
    pub inbound: Vec<FirewallRule>,
    pub outbound: Vec<FirewallRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FirewallRule {
    pub label: Option<String>,
    pub action: String,
    pub protocol: String,
    pub ports: Option<String>,
    pub addresses: FirewallAddresses,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FirewallAddresses {
    pub ipv4: Option<Vec<String>>,
    pub ipv6: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeBalancer {
    pub id: u64,
    pub label: String,
    pub region: String,
    pub hostname: String,
    pub ipv4: String,
    pub ipv6: Option<String>,
    pub client_conn_throttle: u32,
    pub transfer: NodeBalancerTransfer,
    pub tags: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

/// Transfer this month, in MB.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeBalancerTransfer {
    #[serde(rename = "in")]
    pub inbound: Option<f64>,
    #[serde(rename = "out")]
    pub outbound: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Domain {
    pub id: u64,
    pub domain: String,
    #[serde(rename = "type")]
    pub domain_type: String,
    pub status: String,
    pub soa_email: Option<String>,
    pub description: Option<String>,
    pub ttl_sec: u32,
    pub tags: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LkeCluster {
    pub id: u64,
    pub label: String,
    pub region: String,
    pub k8s_version: String,
    pub status: String,
    pub control_plane: ControlPlane,
    pub tags: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControlPlane {
    pub high_availability: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LkeNodePool {
    pub id: u64,
    #[serde(rename = "type")]
    pub pool_type: String,
    pub count: u32,
    pub nodes: Vec<LkeNode>,
    pub autoscaler: Autoscaler,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LkeNode {
    pub id: String,
    pub instance_id: Option<u64>,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Autoscaler {
    pub enabled: bool,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SshKey {
    pub id: u64,
    pub label: String,
    pub ssh_key: String,
    pub created: Option<String>,
}

/// Body for `POST /linode/instances`
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateInstanceRequest {
    pub region: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_pass: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authorized_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backups_enabled: Option<bool>,
}

/// Body for `PUT /linode/instances/{id}`; only present fields change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watchdog_enabled: Option<bool>,
}

/// Body for `POST /volumes`
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateVolumeRequest {
    pub label: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linode_id: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Body for `POST /volumes/{id}/attach`
#[derive(Debug, Clone, Default, Serialize)]
pub struct AttachVolumeRequest {
    pub linode_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_id: Option<u64>,
}

/// Body for `POST /linode/instances/{id}/boot` and `/reboot`
#[derive(Debug, Clone, Default, Serialize)]
pub struct BootRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sparse_instance_payload_deserializes() {
        let instance: Instance = serde_json::from_value(json!({
            "id": 123456,
            "label": "test-instance-1",
            "status": "running",
            "region": "us-east",
            "type": "g6-nanode-1",
            "ipv4": ["192.168.1.1"]
        }))
        .unwrap();
        assert_eq!(instance.id, 123456);
        assert_eq!(instance.instance_type, "g6-nanode-1");
        assert_eq!(instance.specs.vcpus, 0);
        assert!(instance.ipv6.is_none());
    }

    #[test]
    fn page_defaults_to_single_page() {
        let page: Page<Region> = serde_json::from_value(json!({ "data": [] })).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.pages, 1);
    }

    #[test]
    fn create_volume_request_omits_empty_fields() {
        let body = serde_json::to_value(CreateVolumeRequest {
            label: "data".to_string(),
            size: 20,
            region: Some("us-east".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            body,
            json!({ "label": "data", "size": 20, "region": "us-east" })
        );
    }

    #[test]
    fn nodebalancer_transfer_uses_provider_field_names() {
        let nb: NodeBalancer = serde_json::from_value(json!({
            "id": 1,
            "transfer": { "in": 12.5, "out": 3.0, "total": 15.5 }
        }))
        .unwrap();
        assert_eq!(nb.transfer.inbound, Some(12.5));
        assert_eq!(nb.transfer.outbound, Some(3.0));
    }
}
