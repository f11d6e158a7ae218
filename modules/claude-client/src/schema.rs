use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types that can be used as forced tool input (structured output).
///
/// Automatically implemented for any type that implements `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate a tool input schema for this type: all object schemas carry
    /// `additionalProperties: false`, every property is required, and
    /// `$ref`s are fully inlined.
    fn tool_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        fix_object_schemas(&mut value);
        inline_refs(&mut value);

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn fix_object_schemas(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
            map.insert(
                "additionalProperties".to_string(),
                serde_json::Value::Bool(false),
            );

            if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                let all_keys: Vec<serde_json::Value> = props
                    .keys()
                    .map(|k| serde_json::Value::String(k.clone()))
                    .collect();
                map.insert("required".to_string(), serde_json::Value::Array(all_keys));
            }
        }

        for (_, v) in map.iter_mut() {
            fix_object_schemas(v);
        }
    } else if let serde_json::Value::Array(arr) = value {
        for item in arr.iter_mut() {
            fix_object_schemas(item);
        }
    }
}

fn inline_refs(value: &mut serde_json::Value) {
    let definitions = if let serde_json::Value::Object(map) = value {
        map.get("definitions").cloned()
    } else {
        None
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut serde_json::Value, definitions: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if ref_path.starts_with("#/definitions/") {
                    let type_name = ref_path.trim_start_matches("#/definitions/");
                    if let Some(def) = definitions.get(type_name) {
                        *value = def.clone();
                        inline_refs_recursive(value, definitions);
                        return;
                    }
                }
            }

            if let Some(serde_json::Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    *value = all_of.into_iter().next().unwrap();
                    inline_refs_recursive(value, definitions);
                    return;
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct Inner {
        label: String,
        score: Option<f32>,
    }

    #[derive(Deserialize, JsonSchema)]
    struct Outer {
        items: Vec<Inner>,
        note: String,
    }

    #[test]
    fn all_properties_required() {
        let schema = Inner::tool_schema();
        let required = schema["required"].as_array().unwrap();
        let names: Vec<&str> = required.iter().filter_map(|v| v.as_str()).collect();
        assert!(names.contains(&"label"));
        assert!(names.contains(&"score"));
    }

    #[test]
    fn nested_struct_inlined() {
        let schema = Outer::tool_schema();
        let obj = schema.as_object().unwrap();
        assert!(!obj.contains_key("definitions"));
        assert!(!obj.contains_key("$schema"));

        let inner = &schema["properties"]["items"]["items"];
        assert!(inner.get("$ref").is_none());
        assert_eq!(inner["additionalProperties"], serde_json::json!(false));
    }
}
