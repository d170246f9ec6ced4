use std::collections::HashMap;

use serde_json::Value;

use super::CatalogueError;

const MAX_REF_DEPTH: u32 = 16;

/// Flat arena of component schemas, keyed by `#/components/schemas/<name>`
/// name, used to flatten intra-document `$ref`s into self-contained
/// parameter/response schemas. External refs (any
/// `$ref` not rooted at `#/components/schemas/`) are rejected outright.
pub struct SchemaArena {
    schemas: HashMap<String, Value>,
}

impl SchemaArena {
    pub fn build(doc: &openapiv3::OpenAPI) -> Result<Self, CatalogueError> {
        let mut schemas = HashMap::new();

        if let Some(components) = &doc.components {
            for (name, schema_ref) in &components.schemas {
                match schema_ref {
                    openapiv3::ReferenceOr::Item(schema) => {
                        let value = serde_json::to_value(schema)
                            .map_err(|_| CatalogueError::SchemaTooLarge)?;
                        schemas.insert(name.clone(), value);
                    }
                    openapiv3::ReferenceOr::Reference { reference } => {
                        return Err(CatalogueError::ExternalRef(reference.clone()));
                    }
                }
            }
        }

        Ok(Self { schemas })
    }

    /// Replace every `$ref` in `value` with the arena entry it points
    /// at, recursively, so the result is self-contained.
    pub fn resolve(&self, value: &Value) -> Result<Value, CatalogueError> {
        self.resolve_depth(value, 0)
    }

    fn resolve_depth(&self, value: &Value, depth: u32) -> Result<Value, CatalogueError> {
        if depth > MAX_REF_DEPTH {
            return Err(CatalogueError::RefCycle);
        }

        match value {
            Value::Object(map) => {
                if let Some(Value::String(r)) = map.get("$ref") {
                    let name = local_ref_name(r)
                        .ok_or_else(|| CatalogueError::ExternalRef(r.clone()))?;
                    let target = self
                        .schemas
                        .get(&name)
                        .ok_or_else(|| CatalogueError::ExternalRef(r.clone()))?;
                    return self.resolve_depth(target, depth + 1);
                }

                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, v) in map {
                    // Vendor extensions are never part of a resolved schema.
                    if key.starts_with("x-") {
                        continue;
                    }
                    out.insert(key.clone(), self.resolve_depth(v, depth + 1)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_depth(item, depth + 1)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Combined serialized size of every component schema — the 10 MiB
    /// cap is enforced against this, before any resolution happens, so a
    /// document can't hide its size behind unreferenced schemas either.
    pub fn total_bytes(&self) -> usize {
        self.schemas
            .values()
            .map(|v| serde_json::to_vec(v).map(|b| b.len()).unwrap_or(0))
            .sum()
    }
}

fn local_ref_name(reference: &str) -> Option<String> {
    reference
        .strip_prefix("#/components/schemas/")
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn local_ref_name_strips_prefix() {
        assert_eq!(
            local_ref_name("#/components/schemas/Widget"),
            Some("Widget".to_string())
        );
        assert_eq!(local_ref_name("https://example.com/schema.json"), None);
    }

    #[test]
    fn resolve_inlines_nested_refs() {
        let mut schemas = HashMap::new();
        schemas.insert("Widget".to_string(), json!({"type": "string"}));
        let arena = SchemaArena { schemas };

        let input = json!({
            "type": "object",
            "properties": {
                "widget": {"$ref": "#/components/schemas/Widget"}
            }
        });

        let resolved = arena.resolve(&input).unwrap();
        assert_eq!(
            resolved["properties"]["widget"],
            json!({"type": "string"})
        );
    }

    #[test]
    fn resolve_rejects_external_ref() {
        let arena = SchemaArena {
            schemas: HashMap::new(),
        };
        let input = json!({"$ref": "https://evil.example.com/schema.json"});
        assert!(matches!(
            arena.resolve(&input),
            Err(CatalogueError::ExternalRef(_))
        ));
    }

    #[test]
    fn resolve_strips_vendor_extensions() {
        let arena = SchemaArena {
            schemas: HashMap::new(),
        };
        let input = json!({"type": "string", "x-internal-hook": "rm -rf /"});
        let resolved = arena.resolve(&input).unwrap();
        assert!(resolved.get("x-internal-hook").is_none());
    }
}
