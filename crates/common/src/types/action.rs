use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a parameter is carried on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

/// One input parameter of an Action, derived from an OpenAPI operation's
/// `parameters` list or its request body schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    /// JSON Schema fragment describing the parameter's shape.
    pub schema: Value,
}

/// A single callable operation derived from an OpenAPI document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    /// Stable, unique-within-tool name.
    pub name: String,
    pub method: String,
    /// Path template exactly as declared in the OpenAPI document,
    /// e.g. `/repos/{owner}/{repo}/issues`.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub parameters: Vec<ParameterDescriptor>,
    /// First 2xx response schema if present, else the default response.
    /// Used for validation hinting only — never enforced on return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    /// Security requirement names (OpenAPI `securitySchemes` keys) this
    /// operation references. Empty means the tool-level default applies.
    #[serde(default)]
    pub security_refs: Vec<String>,
}

/// An ordered, deterministic set of Actions plus the Security Schemes the
/// document advertises.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActionCatalogue {
    pub actions: Vec<Action>,
    pub security_schemes: std::collections::BTreeMap<String, super::SecurityScheme>,
}

impl ActionCatalogue {
    pub fn find(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Action names within a tool are unique.
    pub fn has_unique_names(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.actions.iter().all(|a| seen.insert(a.name.as_str()))
    }
}
