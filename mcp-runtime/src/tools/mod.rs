//! The Linode tool surface. Each submodule contributes its registrations;
//! `linode_tools` is the full table handed to the registry at startup.

use serde_json::{Value, json};

use crate::registry::ToolRegistration;

pub mod account;
pub mod catalog;
pub mod instances;
pub mod lke;
pub mod networking;
pub mod volumes;

pub fn linode_tools() -> Vec<ToolRegistration> {
    let mut tools = Vec::new();
    tools.extend(account::registrations());
    tools.extend(instances::registrations());
    tools.extend(volumes::registrations());
    tools.extend(catalog::registrations());
    tools.extend(networking::registrations());
    tools.extend(lke::registrations());
    tools
}

/// JSON schema for a flat argument object.
pub(crate) fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

pub(crate) fn no_params_schema() -> Value {
    object_schema(json!({}), &[])
}

pub(crate) fn id_property(description: &str) -> Value {
    json!({ "type": "number", "minimum": 1, "description": description })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ToolRegistry, validate_tool_name};

    #[test]
    fn every_tool_has_a_valid_unique_name_and_object_schema() {
        let tools = linode_tools();
        for tool in &tools {
            validate_tool_name(tool.name()).unwrap();
            assert_eq!(tool.input_schema()["type"], "object", "{}", tool.name());
            assert!(!tool.description().is_empty());
        }
        let registry = ToolRegistry::from_registrations(tools).unwrap();
        assert!(registry.get("linode_account_get").is_some());
        assert!(registry.get("linode_volume_create").is_some());
        assert!(registry.get("linode_lke_cluster_get").is_some());
    }

    #[test]
    fn required_fields_are_declared_properties() {
        for tool in linode_tools() {
            let schema = tool.input_schema();
            for field in schema["required"].as_array().unwrap() {
                let field = field.as_str().unwrap();
                assert!(
                    schema["properties"].get(field).is_some(),
                    "{} requires undeclared {field}",
                    tool.name()
                );
            }
        }
    }
}
