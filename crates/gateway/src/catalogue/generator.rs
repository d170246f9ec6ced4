use std::collections::{BTreeMap, HashMap};

use openapiv3::{
    MediaType, OpenAPI, Operation, Parameter, ParameterSchemaOrContent, ReferenceOr, RequestBody,
    Response, Responses, Schema, StatusCode,
};
use serde_json::{json, Value};

use toolgate_common::types::{
    Action, ActionCatalogue, ApiKeyLocation, ParameterDescriptor, ParameterLocation,
    SecurityScheme,
};

use super::{CatalogueError, SchemaArena, MAX_SCHEMA_BYTES};

const METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Content-sniffs `raw` as JSON first, then YAML, and parses it as an
/// OpenAPI 3.x document.
pub fn parse_openapi_document(raw: &str) -> Result<OpenAPI, CatalogueError> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') {
        serde_json::from_str(raw).map_err(|e| CatalogueError::ParseFailed(e.to_string()))
    } else {
        serde_json::from_str(raw)
            .or_else(|_| serde_yaml::from_str(raw))
            .map_err(|e| CatalogueError::ParseFailed(e.to_string()))
    }
}

/// Action Generator entry point: raw spec text in, a
/// deterministic Action Catalogue + Security Scheme set out.
pub fn generate_catalogue(raw: &str) -> Result<ActionCatalogue, CatalogueError> {
    let doc = parse_openapi_document(raw)?;
    let arena = SchemaArena::build(&doc)?;
    if arena.total_bytes() > MAX_SCHEMA_BYTES {
        return Err(CatalogueError::SchemaTooLarge);
    }

    let mut paths: Vec<(&String, &ReferenceOr<openapiv3::PathItem>)> =
        doc.paths.paths.iter().collect();
    paths.sort_by(|a, b| a.0.cmp(b.0));

    let mut used_names: HashMap<String, u32> = HashMap::new();
    let mut actions = Vec::new();

    for (path, item_ref) in paths {
        let item = match item_ref {
            ReferenceOr::Item(item) => item,
            ReferenceOr::Reference { reference } => {
                return Err(CatalogueError::ExternalRef(reference.clone()))
            }
        };

        let operations: [(&str, &Option<Operation>); 8] = [
            ("get", &item.get),
            ("put", &item.put),
            ("post", &item.post),
            ("delete", &item.delete),
            ("options", &item.options),
            ("head", &item.head),
            ("patch", &item.patch),
            ("trace", &item.trace),
        ];

        for (method, operation) in operations {
            let Some(operation) = operation else { continue };

            let base_name = derive_base_name(path, method, operation);
            let name = dedupe_name(&mut used_names, base_name);

            let mut parameters = Vec::new();
            for p in item.parameters.iter().chain(operation.parameters.iter()) {
                let param = resolve_parameter(&doc, p)?;
                parameters.push(parameter_descriptor(&arena, param)?);
            }

            if let Some(body_ref) = &operation.request_body {
                let body = resolve_request_body(&doc, body_ref)?;
                if let Some(schema) = first_media_schema(&body.content)? {
                    parameters.push(ParameterDescriptor {
                        name: "body".to_string(),
                        location: ParameterLocation::Body,
                        required: body.required,
                        schema: arena.resolve(&schema)?,
                    });
                }
            }

            let response_schema = select_response_schema(&doc, &arena, &operation.responses)?;
            let security_refs = action_security_refs(&doc, operation);

            actions.push(Action {
                name,
                method: method.to_string(),
                path: path.clone(),
                summary: operation.summary.clone(),
                parameters,
                response_schema,
                security_refs,
            });
        }
    }

    let security_schemes = build_security_schemes(&doc)?;

    Ok(ActionCatalogue {
        actions,
        security_schemes,
    })
}

fn dedupe_name(used: &mut HashMap<String, u32>, base: String) -> String {
    let counter = used.entry(base.clone()).or_insert(0);
    *counter += 1;
    if *counter == 1 {
        base
    } else {
        format!("{base}_{}", *counter)
    }
}

fn derive_base_name(path: &str, method: &str, operation: &Operation) -> String {
    if let Some(operation_id) = &operation.operation_id {
        if is_valid_action_name(operation_id) {
            return operation_id.clone();
        }
    }
    method_path_slug(method, path)
}

fn is_valid_action_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn method_path_slug(method: &str, path: &str) -> String {
    let slug = path
        .trim_matches('/')
        .replace(['{', '}'], "")
        .replace('/', "_");
    if slug.is_empty() {
        method.to_string()
    } else {
        format!("{method}_{slug}")
    }
}

fn resolve_parameter<'a>(
    doc: &'a OpenAPI,
    p: &'a ReferenceOr<Parameter>,
) -> Result<&'a Parameter, CatalogueError> {
    match p {
        ReferenceOr::Item(param) => Ok(param),
        ReferenceOr::Reference { reference } => {
            let name = reference
                .strip_prefix("#/components/parameters/")
                .ok_or_else(|| CatalogueError::ExternalRef(reference.clone()))?;
            doc.components
                .as_ref()
                .and_then(|c| c.parameters.get(name))
                .and_then(|r| match r {
                    ReferenceOr::Item(p) => Some(p),
                    ReferenceOr::Reference { .. } => None,
                })
                .ok_or_else(|| CatalogueError::ExternalRef(reference.clone()))
        }
    }
}

fn resolve_request_body<'a>(
    doc: &'a OpenAPI,
    rb: &'a ReferenceOr<RequestBody>,
) -> Result<&'a RequestBody, CatalogueError> {
    match rb {
        ReferenceOr::Item(body) => Ok(body),
        ReferenceOr::Reference { reference } => {
            let name = reference
                .strip_prefix("#/components/requestBodies/")
                .ok_or_else(|| CatalogueError::ExternalRef(reference.clone()))?;
            doc.components
                .as_ref()
                .and_then(|c| c.request_bodies.get(name))
                .and_then(|r| match r {
                    ReferenceOr::Item(b) => Some(b),
                    ReferenceOr::Reference { .. } => None,
                })
                .ok_or_else(|| CatalogueError::ExternalRef(reference.clone()))
        }
    }
}

fn resolve_response<'a>(
    doc: &'a OpenAPI,
    resp_ref: &'a ReferenceOr<Response>,
) -> Result<&'a Response, CatalogueError> {
    match resp_ref {
        ReferenceOr::Item(response) => Ok(response),
        ReferenceOr::Reference { reference } => {
            let name = reference
                .strip_prefix("#/components/responses/")
                .ok_or_else(|| CatalogueError::ExternalRef(reference.clone()))?;
            doc.components
                .as_ref()
                .and_then(|c| c.responses.get(name))
                .and_then(|r| match r {
                    ReferenceOr::Item(r) => Some(r),
                    ReferenceOr::Reference { .. } => None,
                })
                .ok_or_else(|| CatalogueError::ExternalRef(reference.clone()))
        }
    }
}

fn parameter_descriptor(
    arena: &SchemaArena,
    p: &Parameter,
) -> Result<ParameterDescriptor, CatalogueError> {
    let (location, data) = match p {
        Parameter::Query { parameter_data, .. } => (ParameterLocation::Query, parameter_data),
        Parameter::Header { parameter_data, .. } => (ParameterLocation::Header, parameter_data),
        Parameter::Path { parameter_data, .. } => (ParameterLocation::Path, parameter_data),
        Parameter::Cookie { parameter_data, .. } => (ParameterLocation::Cookie, parameter_data),
    };

    let schema_value = match &data.format {
        ParameterSchemaOrContent::Schema(schema_ref) => schema_ref_to_value(schema_ref)?,
        ParameterSchemaOrContent::Content(content) => {
            first_media_schema(content)?.unwrap_or_else(|| json!({}))
        }
    };

    Ok(ParameterDescriptor {
        name: data.name.clone(),
        location,
        required: data.required,
        schema: arena.resolve(&schema_value)?,
    })
}

fn schema_ref_to_value(schema_ref: &ReferenceOr<Schema>) -> Result<Value, CatalogueError> {
    match schema_ref {
        ReferenceOr::Item(schema) => {
            serde_json::to_value(schema).map_err(|_| CatalogueError::SchemaTooLarge)
        }
        // Left as a `$ref` marker — `SchemaArena::resolve` looks it up by
        // name and rejects it if it's not document-local.
        ReferenceOr::Reference { reference } => Ok(json!({ "$ref": reference })),
    }
}

fn first_media_schema(content: &indexmap::IndexMap<String, MediaType>) -> Result<Option<Value>, CatalogueError> {
    let preferred = content
        .get("application/json")
        .or_else(|| content.values().next());

    match preferred.and_then(|mt| mt.schema.as_ref()) {
        Some(schema_ref) => Ok(Some(schema_ref_to_value(schema_ref)?)),
        None => Ok(None),
    }
}

fn select_response_schema(
    doc: &OpenAPI,
    arena: &SchemaArena,
    responses: &Responses,
) -> Result<Option<Value>, CatalogueError> {
    let mut entries: Vec<(&StatusCode, &ReferenceOr<Response>)> =
        responses.responses.iter().collect();
    entries.sort_by_key(|(code, _)| status_sort_key(code));

    for (code, resp_ref) in entries {
        if is_2xx(code) {
            let response = resolve_response(doc, resp_ref)?;
            if let Some(value) = first_media_schema(&response.content)? {
                return Ok(Some(arena.resolve(&value)?));
            }
        }
    }

    if let Some(default_ref) = &responses.default {
        let response = resolve_response(doc, default_ref)?;
        if let Some(value) = first_media_schema(&response.content)? {
            return Ok(Some(arena.resolve(&value)?));
        }
    }

    Ok(None)
}

fn is_2xx(code: &StatusCode) -> bool {
    match code {
        StatusCode::Code(c) => (200..300).contains(c),
        StatusCode::Range(r) => *r == 2,
    }
}

fn status_sort_key(code: &StatusCode) -> u16 {
    match code {
        StatusCode::Code(c) => *c,
        StatusCode::Range(r) => *r as u16 * 100,
    }
}

fn action_security_refs(doc: &OpenAPI, operation: &Operation) -> Vec<String> {
    let empty_requirements = Vec::new();
    let requirements = operation
        .security
        .as_ref()
        .unwrap_or_else(|| doc.security.as_ref().unwrap_or(&empty_requirements));
    let mut names: Vec<String> = requirements.iter().flat_map(|r| r.keys().cloned()).collect();
    names.sort();
    names.dedup();
    names
}

fn build_security_schemes(
    doc: &OpenAPI,
) -> Result<BTreeMap<String, SecurityScheme>, CatalogueError> {
    let mut map = BTreeMap::new();
    let Some(components) = &doc.components else {
        return Ok(map);
    };

    for (name, scheme_ref) in &components.security_schemes {
        let scheme = match scheme_ref {
            ReferenceOr::Item(scheme) => scheme,
            ReferenceOr::Reference { reference } => {
                return Err(CatalogueError::ExternalRef(reference.clone()))
            }
        };
        map.insert(name.clone(), map_security_scheme(scheme));
    }

    Ok(map)
}

fn map_security_scheme(scheme: &openapiv3::SecurityScheme) -> SecurityScheme {
    match scheme {
        openapiv3::SecurityScheme::APIKey { location, name, .. } => {
            let location = match location {
                openapiv3::APIKeyLocation::Query => ApiKeyLocation::Query,
                openapiv3::APIKeyLocation::Header | openapiv3::APIKeyLocation::Cookie => {
                    ApiKeyLocation::Header
                }
            };
            SecurityScheme::ApiKey {
                location,
                name: name.clone(),
                prefix: None,
            }
        }
        openapiv3::SecurityScheme::HTTP { scheme, .. } => match scheme.as_str() {
            "bearer" => SecurityScheme::Bearer,
            "basic" => SecurityScheme::Basic,
            _ => SecurityScheme::None,
        },
        // OAuth2/OIDC flows aren't a supported execution-time Security
        // Scheme — the operator supplies a long-lived
        // bearer token for these tools instead.
        openapiv3::SecurityScheme::OAuth2 { .. } | openapiv3::SecurityScheme::OpenIDConnect { .. } => {
            SecurityScheme::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_SPEC: &str = r##"{
        "openapi": "3.0.0",
        "info": {"title": "Widgets", "version": "1.0"},
        "paths": {
            "/widgets": {
                "get": {
                    "operationId": "list_widgets",
                    "parameters": [
                        {"name": "limit", "in": "query", "required": false, "schema": {"type": "integer"}}
                    ],
                    "responses": {
                        "200": {
                            "description": "ok",
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Widget"}}}
                        }
                    }
                },
                "post": {
                    "parameters": [],
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Widget"}}}
                    },
                    "responses": {"201": {"description": "created", "content": {}}}
                }
            }
        },
        "components": {
            "schemas": {
                "Widget": {"type": "object", "properties": {"name": {"type": "string"}}}
            },
            "securitySchemes": {
                "bearerAuth": {"type": "http", "scheme": "bearer"}
            }
        },
        "security": [{"bearerAuth": []}]
    }"##;

    #[test]
    fn derives_operation_id_as_action_name() {
        let catalogue = generate_catalogue(SAMPLE_SPEC).unwrap();
        assert!(catalogue.find("list_widgets").is_some());
    }

    #[test]
    fn falls_back_to_method_path_slug_when_no_operation_id() {
        let catalogue = generate_catalogue(SAMPLE_SPEC).unwrap();
        assert!(catalogue.find("post_widgets").is_some());
    }

    #[test]
    fn resolves_body_schema_ref() {
        let catalogue = generate_catalogue(SAMPLE_SPEC).unwrap();
        let action = catalogue.find("post_widgets").unwrap();
        let body = action
            .parameters
            .iter()
            .find(|p| p.location == ParameterLocation::Body)
            .unwrap();
        assert_eq!(body.schema["type"], "object");
    }

    #[test]
    fn maps_bearer_security_scheme() {
        let catalogue = generate_catalogue(SAMPLE_SPEC).unwrap();
        assert_eq!(
            catalogue.security_schemes.get("bearerAuth"),
            Some(&SecurityScheme::Bearer)
        );
    }

    #[test]
    fn action_names_are_unique() {
        let catalogue = generate_catalogue(SAMPLE_SPEC).unwrap();
        assert!(catalogue.has_unique_names());
    }

    #[test]
    fn rejects_spec_with_external_schema_ref() {
        let spec = r#"{
            "openapi": "3.0.0",
            "info": {"title": "Bad", "version": "1.0"},
            "paths": {},
            "components": {
                "schemas": {"Evil": {"$ref": "https://evil.example.com/schema.json"}}
            }
        }"#;
        let result = generate_catalogue(spec);
        assert!(matches!(result, Err(CatalogueError::ExternalRef(_))));
    }
}
