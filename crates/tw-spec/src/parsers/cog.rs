// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cog v1 (OpenAPI-shaped, `requestBody.schema.properties.input`) and Cog v2
//! (bare `components.schemas.Input`/`Output`, no `paths`) parsers.

use serde_json::{json, Value};
use tw_model::{
    EndpointDefinition, EndpointParameter, HttpMethod, ParameterDefinition, ParameterLocation,
    ParameterType,
};

use super::common::{coerce_to_file_format, parse_all_operations};
use crate::schema::{resolve_ref, schema_to_definitions};

/// Cog's default seed when the schema omits one entirely.
const DEFAULT_SEED: i64 = 42;

/// Parses a Cog v1 document: identical to plain OpenAPI, except the
/// `/predictions` body's nested `input` object is unwrapped into top-level
/// parameters, file-shaped fields are coerced to the `file` format, and a
/// missing `seed` field is patched in with Cog's documented default.
#[must_use]
pub fn parse_cog_v1(spec: &Value) -> Vec<EndpointDefinition> {
    let mut endpoints = parse_all_operations(spec);
    for endpoint in &mut endpoints {
        let Some(input_idx) = endpoint.parameters.iter().position(|p| p.name == "input") else {
            continue;
        };
        let input_param = endpoint.parameters.remove(input_idx);
        let Some(raw) = &input_param.raw_schema else { continue };
        let resolved = resolve_ref(spec, raw);
        let mut unwrapped = unwrap_input_object(spec, resolved);
        patch_missing_seed(&mut unwrapped);
        endpoint.parameters.extend(unwrapped);
    }
    endpoints
}

/// Parses a Cog v2 document, which has no `paths` at all: the predict
/// contract lives entirely in `components.schemas.Input`/`Output`. Synthesizes
/// a single `POST /predictions` endpoint from `Input`'s properties.
#[must_use]
pub fn parse_cog_v2(spec: &Value) -> Vec<EndpointDefinition> {
    let Some(input_schema) = spec.pointer("/components/schemas/Input") else {
        return Vec::new();
    };
    let resolved = resolve_ref(spec, input_schema);
    let mut parameters = unwrap_input_object(spec, resolved);
    patch_missing_seed(&mut parameters);

    let responses = spec
        .pointer("/components/schemas/Output")
        .map(|output| {
            let mut m = std::collections::BTreeMap::new();
            m.insert("200".to_string(), json!({"content": {"application/json": {"schema": output}}}));
            m
        })
        .unwrap_or_default();

    vec![EndpointDefinition {
        id: "post_predictions".to_string(),
        path: "/predictions".to_string(),
        display_name: String::new(),
        description: String::new(),
        short_desc: String::new(),
        method: HttpMethod::Post,
        parameters,
        responses,
        timeout_seconds: None,
    }]
}

fn unwrap_input_object(spec: &Value, input_schema: &Value) -> Vec<EndpointParameter> {
    let Some(properties) = input_schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required_names: Vec<String> = input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, field_schema)| {
            let definition = coerce_to_file_format(schema_to_definitions(spec, field_schema));
            EndpointParameter {
                name: name.clone(),
                definition,
                required: required_names.contains(name),
                default: field_schema.get("default").cloned(),
                location: ParameterLocation::Body,
                raw_schema: Some(field_schema.clone()),
                description: field_schema.get("description").and_then(Value::as_str).map(str::to_string),
            }
        })
        .collect()
}

/// Cog models routinely omit `seed` from their declared schema yet accept
/// and honor it at call time; supplies it with the documented default so
/// callers can rely on its presence.
fn patch_missing_seed(parameters: &mut Vec<EndpointParameter>) {
    if parameters.iter().any(|p| p.name == "seed") {
        return;
    }
    parameters.push(EndpointParameter {
        name: "seed".to_string(),
        definition: vec![ParameterDefinition::simple(ParameterType::Integer)],
        required: false,
        default: Some(json!(DEFAULT_SEED)),
        location: ParameterLocation::Body,
        raw_schema: None,
        description: Some("Random seed, fixed by default for reproducibility".to_string()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_model::ParameterFormat;

    #[test]
    fn v1_unwraps_input_and_patches_seed() {
        let spec = json!({
            "paths": {
                "/predictions": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "input": {
                                                "type": "object",
                                                "required": ["image"],
                                                "properties": {
                                                    "image": {"type": "string", "format": "uri"}
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        let endpoints = parse_cog_v1(&spec);
        let params = &endpoints[0].parameters;
        assert!(params.iter().any(|p| p.name == "seed" && p.default == Some(json!(42))));
        let image = params.iter().find(|p| p.name == "image").unwrap();
        assert_eq!(image.definition[0].format, Some(ParameterFormat::File));
        assert!(image.required);
    }

    #[test]
    fn v2_synthesizes_predictions_endpoint_from_components() {
        let spec = json!({
            "components": {
                "schemas": {
                    "Input": {
                        "type": "object",
                        "properties": {"prompt": {"type": "string"}}
                    },
                    "Output": {"type": "string"}
                }
            }
        });
        let endpoints = parse_cog_v2(&spec);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "/predictions");
        assert!(endpoints[0].parameters.iter().any(|p| p.name == "prompt"));
        assert!(endpoints[0].parameters.iter().any(|p| p.name == "seed"));
    }

    #[test]
    fn v1_without_input_wrapper_is_untouched() {
        let spec = json!({
            "paths": {
                "/predict": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {"type": "object", "properties": {"prompt": {"type": "string"}}}
                                }
                            }
                        }
                    }
                }
            }
        });
        let endpoints = parse_cog_v1(&spec);
        assert!(endpoints[0].parameters.iter().any(|p| p.name == "prompt"));
    }
}
