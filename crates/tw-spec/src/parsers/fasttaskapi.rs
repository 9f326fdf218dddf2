// SPDX-License-Identifier: MIT OR Apache-2.0
//! FastTaskAPI parser: common OpenAPI parsing plus file-model type
//! resolution for the job-queue convention's media schemas.

use serde_json::Value;
use tw_model::{EndpointDefinition, ParameterFormat, ParameterType};

use super::common::parse_all_operations;

/// Returns the media format a schema's title implies, if any.
fn format_from_title(title: &str) -> Option<ParameterFormat> {
    let lower = title.to_lowercase();
    if lower.contains("imagefilemodel") {
        Some(ParameterFormat::Image)
    } else if lower.contains("videofilemodel") {
        Some(ParameterFormat::Video)
    } else if lower.contains("audiofilemodel") {
        Some(ParameterFormat::Audio)
    } else {
        None
    }
}

/// A schema shaped `{file_name, content_type, content}` is the generic
/// FastTaskAPI file-model convention; its format comes from the schema
/// title when present, else a plain file.
fn is_file_model_shape(schema: &Value) -> bool {
    let Some(props) = schema.get("properties").and_then(Value::as_object) else { return false };
    ["file_name", "content_type", "content"].iter().all(|k| props.contains_key(*k))
}

/// Specializes the common OpenAPI parser's output: any body parameter
/// whose raw schema is a file-model shape is retagged with the media
/// format implied by its title (defaulting to a plain file).
#[must_use]
pub fn parse_fasttaskapi(spec: &Value) -> Vec<EndpointDefinition> {
    let mut endpoints = parse_all_operations(spec);
    for endpoint in &mut endpoints {
        for parameter in &mut endpoint.parameters {
            let Some(raw) = &parameter.raw_schema else { continue };
            if !is_file_model_shape(raw) {
                continue;
            }
            let title = raw.get("title").and_then(Value::as_str).unwrap_or_default();
            let format = format_from_title(title).unwrap_or(ParameterFormat::File);
            for def in &mut parameter.definition {
                def.r#type = ParameterType::String;
                def.format = Some(format);
            }
        }
    }
    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_model_shape_is_retagged_by_title() {
        let spec = json!({
            "paths": {
                "/generate": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "avatar": {
                                                "title": "ImageFileModel",
                                                "type": "object",
                                                "properties": {
                                                    "file_name": {"type": "string"},
                                                    "content_type": {"type": "string"},
                                                    "content": {"type": "string"}
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
        let endpoints = parse_fasttaskapi(&spec);
        let avatar = endpoints[0].parameters.iter().find(|p| p.name == "avatar").unwrap();
        assert_eq!(avatar.definition[0].format, Some(ParameterFormat::Image));
    }
}
