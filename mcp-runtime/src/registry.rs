//! The tool registry: built once at startup, read-only afterwards.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;

use crate::dispatch::CallContext;
use crate::outcome::ToolOutcome;

pub type HandlerFuture = Pin<Box<dyn Future<Output = ToolOutcome> + Send>>;
pub type ToolHandler = Arc<dyn Fn(CallContext) -> HandlerFuture + Send + Sync>;

/// Verbs a tool name may end in.
pub const TOOL_VERBS: [&str; 11] = [
    "list", "get", "create", "update", "delete", "attach", "detach", "boot", "shutdown",
    "reboot", "switch",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool {0} registered twice")]
    Duplicate(String),

    #[error("invalid tool name {name}: {reason}")]
    InvalidName { name: String, reason: String },
}

#[derive(Clone)]
pub struct ToolRegistration {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
    handler: ToolHandler,
}

impl std::fmt::Debug for ToolRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistration")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ToolRegistration {
    pub fn new<F, Fut>(
        name: &'static str,
        description: &'static str,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolOutcome> + Send + 'static,
    {
        Self {
            name,
            description,
            input_schema,
            handler: Arc::new(move |ctx| Box::pin(handler(ctx))),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    pub fn handler(&self) -> ToolHandler {
        Arc::clone(&self.handler)
    }

    /// Entry for `tools/list`.
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolRegistration>,
}

impl ToolRegistry {
    pub fn from_registrations(
        registrations: impl IntoIterator<Item = ToolRegistration>,
    ) -> Result<Self, RegistryError> {
        let mut tools = BTreeMap::new();
        for registration in registrations {
            validate_tool_name(registration.name)?;
            if tools.contains_key(registration.name) {
                return Err(RegistryError::Duplicate(registration.name.to_string()));
            }
            tools.insert(registration.name, registration);
        }
        Ok(Self { tools })
    }

    pub fn get(&self, name: &str) -> Option<&ToolRegistration> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registrations ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &ToolRegistration> {
        self.tools.values()
    }

    pub fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = self.iter().map(ToolRegistration::to_value).collect();
        json!({ "tools": tools })
    }

    /// Closest registered name to a mistyped one, if any is close enough.
    pub fn suggest(&self, name: &str) -> Option<&'static str> {
        self.tools
            .keys()
            .map(|candidate| (strsim::levenshtein(name, candidate), *candidate))
            .filter(|(distance, _)| *distance <= 3)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, candidate)| candidate)
    }
}

/// `<provider>_<resource>[_<sub>]_<verb>`, lowercase ascii.
pub fn validate_tool_name(name: &str) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let segments: Vec<&str> = name.split('_').collect();
    if segments.len() < 3 {
        return Err(invalid("expected <provider>_<resource>_<verb>"));
    }
    if segments.iter().any(|segment| {
        segment.is_empty()
            || !segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    }) {
        return Err(invalid("segments must be non-empty lowercase ascii"));
    }
    let verb = segments[segments.len() - 1];
    if !TOOL_VERBS.contains(&verb) {
        return Err(invalid(&format!("unknown verb '{verb}'")));
    }
    Ok(())
}
