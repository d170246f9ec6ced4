use serde_json::Value;

use toolgate_common::types::{Action, ParameterLocation};

use super::ExecutionError;

/// An Action plus caller-supplied parameters, resolved into everything
/// needed to issue the upstream HTTP call.
pub struct BuiltRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Substitute path/query/header/body parameters from `parameters` into
/// `action`'s template. Missing required parameters and unresolved path
/// placeholders are rejected before any network call is made.
pub fn build_request(
    base_url: &str,
    action: &Action,
    parameters: &Value,
) -> Result<BuiltRequest, ExecutionError> {
    let obj = parameters.as_object();
    let mut path = action.path.clone();
    let mut query = Vec::new();
    let mut headers = Vec::new();
    let mut body = None;

    for param in &action.parameters {
        let value = obj.and_then(|o| o.get(&param.name));
        let Some(value) = value else {
            if param.required {
                return Err(ExecutionError::InvalidParameters(format!(
                    "missing required parameter `{}`",
                    param.name
                )));
            }
            continue;
        };

        if let Some(expected) = param.schema.get("type").and_then(Value::as_str) {
            if !matches_schema_type(value, expected) {
                return Err(ExecutionError::InvalidParameters(format!(
                    "parameter `{}` expected type `{expected}`, got `{}`",
                    param.name,
                    json_type_name(value)
                )));
            }
        }

        match param.location {
            ParameterLocation::Path => {
                path = path.replace(&format!("{{{}}}", param.name), &value_to_string(value));
            }
            ParameterLocation::Query => query.push((param.name.clone(), value_to_string(value))),
            ParameterLocation::Header => {
                headers.push((param.name.clone(), value_to_string(value)))
            }
            ParameterLocation::Cookie => headers.push((
                "Cookie".to_string(),
                format!("{}={}", param.name, value_to_string(value)),
            )),
            ParameterLocation::Body => body = Some(value.clone()),
        }
    }

    if path.contains('{') {
        return Err(ExecutionError::InvalidParameters(format!(
            "unresolved path placeholder in `{path}`"
        )));
    }

    let method = reqwest::Method::from_bytes(action.method.to_uppercase().as_bytes())
        .map_err(|_| ExecutionError::InvalidParameters(format!("unsupported method `{}`", action.method)))?;

    Ok(BuiltRequest {
        method,
        url: format!("{}{}", base_url.trim_end_matches('/'), path),
        query,
        headers,
        body,
    })
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Primitive-type shape check against a JSON Schema `type` keyword.
/// Doesn't attempt full schema validation (formats, enums, nested object
/// shapes) — just enough to catch a caller sending the wrong kind of
/// value before it reaches the upstream tool.
fn matches_schema_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolgate_common::types::ParameterDescriptor;

    fn action() -> Action {
        Action {
            name: "get_widget".to_string(),
            method: "get".to_string(),
            path: "/widgets/{id}".to_string(),
            summary: None,
            parameters: vec![
                ParameterDescriptor {
                    name: "id".to_string(),
                    location: ParameterLocation::Path,
                    required: true,
                    schema: json!({"type": "string"}),
                },
                ParameterDescriptor {
                    name: "verbose".to_string(),
                    location: ParameterLocation::Query,
                    required: false,
                    schema: json!({"type": "boolean"}),
                },
            ],
            response_schema: None,
            security_refs: vec![],
        }
    }

    #[test]
    fn substitutes_path_parameter() {
        let req = build_request("https://api.example.com", &action(), &json!({"id": "42"})).unwrap();
        assert_eq!(req.url, "https://api.example.com/widgets/42");
    }

    #[test]
    fn missing_required_parameter_is_rejected() {
        let result = build_request("https://api.example.com", &action(), &json!({}));
        assert!(matches!(result, Err(ExecutionError::InvalidParameters(_))));
    }

    #[test]
    fn optional_query_parameter_is_included_when_present() {
        let req = build_request(
            "https://api.example.com",
            &action(),
            &json!({"id": "42", "verbose": true}),
        )
        .unwrap();
        assert_eq!(req.query, vec![("verbose".to_string(), "true".to_string())]);
    }

    #[test]
    fn optional_parameter_with_wrong_type_is_rejected() {
        let result = build_request(
            "https://api.example.com",
            &action(),
            &json!({"id": "42", "verbose": "not-a-bool"}),
        );
        assert!(matches!(result, Err(ExecutionError::InvalidParameters(_))));
    }
}
