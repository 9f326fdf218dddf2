// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generic OpenAPI 3.0/3.1 parsing, shared by every dialect parser.

use serde_json::Value;
use tw_model::{
    EndpointDefinition, EndpointParameter, HttpMethod, ParameterDefinition, ParameterFormat,
    ParameterLocation, ParameterType,
};

use crate::schema::{resolve_ref, schema_to_definitions};

fn method_from_str(s: &str) -> Option<HttpMethod> {
    match s.to_uppercase().as_str() {
        "GET" => Some(HttpMethod::Get),
        "POST" => Some(HttpMethod::Post),
        "PUT" => Some(HttpMethod::Put),
        "PATCH" => Some(HttpMethod::Patch),
        "DELETE" => Some(HttpMethod::Delete),
        _ => None,
    }
}

fn location_from_str(s: &str) -> ParameterLocation {
    match s {
        "path" => ParameterLocation::Path,
        "header" => ParameterLocation::Header,
        "cookie" => ParameterLocation::Cookie,
        _ => ParameterLocation::Query,
    }
}

/// Parses the standalone (non-body) parameters of an operation: the
/// path-level array merged with the operation-level array.
fn parse_declared_parameters(
    spec: &Value,
    path_level: Option<&Value>,
    op_level: Option<&Value>,
) -> Vec<EndpointParameter> {
    let mut out = Vec::new();
    let mut seen: std::collections::HashSet<(String, &'static str)> = std::collections::HashSet::new();

    for source in [path_level, op_level].into_iter().flatten() {
        let Some(items) = source.as_array() else { continue };
        for item in items {
            let item = resolve_ref(spec, item);
            let Some(name) = item.get("name").and_then(Value::as_str) else { continue };
            let location = location_from_str(item.get("in").and_then(Value::as_str).unwrap_or("query"));
            let key = (name.to_string(), location_key(location));
            if !seen.insert(key) {
                continue;
            }
            let schema = item.get("schema").unwrap_or(&Value::Null);
            let definition = schema_to_definitions(spec, schema);
            out.push(EndpointParameter {
                name: name.to_string(),
                definition,
                required: item.get("required").and_then(Value::as_bool).unwrap_or(false),
                default: schema.get("default").cloned(),
                location,
                raw_schema: Some(schema.clone()),
                description: item.get("description").and_then(Value::as_str).map(str::to_string),
            });
        }
    }
    out
}

fn location_key(location: ParameterLocation) -> &'static str {
    match location {
        ParameterLocation::Query => "query",
        ParameterLocation::Path => "path",
        ParameterLocation::Header => "header",
        ParameterLocation::Cookie => "cookie",
        ParameterLocation::Body => "body",
    }
}

/// Unwraps a request-body content schema's object properties into
/// body-located parameters. Handles both `application/json` and
/// `multipart/form-data`, which receive the same treatment.
fn parse_request_body_parameters(spec: &Value, request_body: &Value) -> Vec<EndpointParameter> {
    let mut out = Vec::new();
    let Some(content) = request_body.get("content").and_then(Value::as_object) else {
        return out;
    };

    let body_required = request_body.get("required").and_then(Value::as_bool).unwrap_or(false);

    for media_type in ["application/json", "multipart/form-data"] {
        let Some(media) = content.get(media_type) else { continue };
        let Some(schema) = media.get("schema") else { continue };
        let schema = resolve_ref(spec, schema);
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else { continue };
        let required_names: Vec<String> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        for (name, prop_schema) in properties {
            let definition = schema_to_definitions(spec, prop_schema);
            out.push(EndpointParameter {
                name: name.clone(),
                definition,
                required: body_required && required_names.contains(name),
                default: prop_schema.get("default").cloned(),
                location: ParameterLocation::Body,
                raw_schema: Some(prop_schema.clone()),
                description: prop_schema.get("description").and_then(Value::as_str).map(str::to_string),
            });
        }
    }
    out
}

/// Parses one OpenAPI operation (`paths.{path}.{method}`) into an
/// [`EndpointDefinition`], aggregating path-level parameters, operation
/// parameters, and request-body parameters. Deduplicates by `(name,
/// location)`, treating `body` as a single bucket.
#[must_use]
pub fn parse_operation(
    spec: &Value,
    path: &str,
    method_str: &str,
    path_item: &Value,
    operation: &Value,
) -> Option<EndpointDefinition> {
    let method = method_from_str(method_str)?;

    let mut parameters =
        parse_declared_parameters(spec, path_item.get("parameters"), operation.get("parameters"));

    if let Some(request_body) = operation.get("requestBody") {
        let mut body_params = parse_request_body_parameters(spec, request_body);
        let mut seen_body_names: std::collections::HashSet<String> =
            parameters.iter().filter(|p| p.location == ParameterLocation::Body).map(|p| p.name.clone()).collect();
        body_params.retain(|p| seen_body_names.insert(p.name.clone()));
        parameters.extend(body_params);
    }

    let id = operation
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| EndpointDefinition::derive_id(method, path));

    let responses = operation
        .get("responses")
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    Some(EndpointDefinition {
        id,
        path: path.to_string(),
        display_name: operation
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        description: operation
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        short_desc: operation
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        method,
        parameters,
        responses,
        timeout_seconds: None,
    })
}

/// Parses every operation under `paths` into a list of endpoints.
#[must_use]
pub fn parse_all_operations(spec: &Value) -> Vec<EndpointDefinition> {
    let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut endpoints = Vec::new();
    for (path, path_item) in paths {
        let Some(path_obj) = path_item.as_object() else { continue };
        for method_str in ["get", "post", "put", "patch", "delete"] {
            if let Some(operation) = path_obj.get(method_str) {
                if let Some(endpoint) = parse_operation(spec, path, method_str, path_item, operation) {
                    endpoints.push(endpoint);
                }
            }
        }
    }
    endpoints
}

/// Re-tags a string-or-file parameter definition's alternatives so that any
/// `uri`/`binary` alternative collapses to a plain file format, used by the
/// Cog parsers' file-field convention.
#[must_use]
pub fn coerce_to_file_format(defs: Vec<ParameterDefinition>) -> Vec<ParameterDefinition> {
    defs.into_iter()
        .map(|mut d| {
            if d.r#type == ParameterType::String
                && matches!(d.format, Some(ParameterFormat::Uri) | Some(ParameterFormat::Binary))
            {
                d.format = Some(ParameterFormat::File);
            }
            d
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn simple_operation_with_query_param() {
        let spec = json!({
            "paths": {
                "/tts": {
                    "post": {
                        "operationId": "tts",
                        "parameters": [{"name": "voice", "in": "query", "required": true, "schema": {"type": "string"}}]
                    }
                }
            }
        });
        let endpoints = parse_all_operations(&spec);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].id, "tts");
        assert_eq!(endpoints[0].parameters[0].name, "voice");
        assert!(endpoints[0].parameters[0].required);
    }

    #[test]
    fn request_body_json_unwraps_object_properties() {
        let spec = json!({
            "paths": {
                "/predict": {
                    "post": {
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "required": ["prompt"],
                                        "properties": {
                                            "prompt": {"type": "string"},
                                            "seed": {"type": "integer"}
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        let endpoints = parse_all_operations(&spec);
        let names: Vec<&str> = endpoints[0].parameters.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"prompt"));
        assert!(names.contains(&"seed"));
        let prompt = endpoints[0].parameters.iter().find(|p| p.name == "prompt").unwrap();
        assert!(prompt.required);
    }

    #[test]
    fn operation_id_defaults_to_method_path() {
        let spec = json!({"paths": {"/a/b": {"get": {}}}});
        let endpoints = parse_all_operations(&spec);
        assert_eq!(endpoints[0].id, "get_a_b");
    }
}
