// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request assembly: partitions a caller's input map into the query/body/
//! file/header buckets an [`EndpointDefinition`] demands, and the value
//! that flows through the Load/Upload/Attach pipeline in between.

use std::collections::BTreeMap;

use serde_json::Value;
use tw_files::{FileEntry, FileFragment};
use tw_model::{EndpointDefinition, Error, ParameterLocation, Result};

/// A file-typed parameter's value at whatever stage the pipeline has
/// reached when this `RequestData` is inspected.
#[derive(Debug, Clone)]
pub enum FileSlot {
    /// As supplied by the caller, not yet materialized.
    Raw(Value),
    /// Materialized (and possibly uploaded) by the File Handler.
    Loaded(FileEntry),
    /// Framed for the wire by the File Handler's Attach stage.
    Attached(FileFragment),
}

/// The assembled, not-yet-sent shape of one request, mutated stage by
/// stage as the pipeline advances.
#[derive(Debug, Clone, Default)]
pub struct RequestData {
    pub query: BTreeMap<String, Value>,
    pub body: BTreeMap<String, Value>,
    pub file: BTreeMap<String, FileSlot>,
    pub headers: BTreeMap<String, String>,
}

/// Stage — Preparing: partitions `input` per each parameter's location,
/// applies defaults, fails `MissingParameter` for absent required values,
/// and reroutes media-typed parameters into the file bucket regardless of
/// their declared location.
pub fn format_request(
    endpoint: &EndpointDefinition,
    input: &BTreeMap<String, Value>,
    api_key: Option<&str>,
) -> Result<RequestData> {
    let mut data = RequestData::default();

    for parameter in &endpoint.parameters {
        let value = input.get(&parameter.name).cloned().or_else(|| parameter.default.clone());
        let Some(value) = value else {
            if parameter.required {
                return Err(Error::MissingParameter(parameter.name.clone()));
            }
            continue;
        };

        if parameter.is_media() {
            data.file.insert(parameter.name.clone(), FileSlot::Raw(value));
            continue;
        }

        match parameter.location {
            ParameterLocation::Query => {
                data.query.insert(parameter.name.clone(), value);
            }
            ParameterLocation::Path => {
                data.query.insert(parameter.name.clone(), value);
            }
            ParameterLocation::Header => {
                data.headers.insert(parameter.name.clone(), value_to_header(&value));
            }
            ParameterLocation::Cookie => {
                data.headers.insert("Cookie".to_string(), format!("{}={}", parameter.name, value_to_header(&value)));
            }
            ParameterLocation::Body => {
                data.body.insert(parameter.name.clone(), value);
            }
        }
    }

    if let Some(key) = api_key {
        data.headers.insert("Authorization".to_string(), format!("Bearer {key}"));
    }

    Ok(data)
}

fn value_to_header(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tw_model::{EndpointParameter, HttpMethod, ParameterDefinition, ParameterFormat, ParameterType};

    fn endpoint_with(params: Vec<EndpointParameter>) -> EndpointDefinition {
        EndpointDefinition {
            id: "ep".into(),
            path: "/ep".into(),
            display_name: String::new(),
            description: String::new(),
            short_desc: String::new(),
            method: HttpMethod::Post,
            parameters: params,
            responses: Default::default(),
            timeout_seconds: None,
        }
    }

    #[test]
    fn missing_required_parameter_fails() {
        let endpoint = endpoint_with(vec![EndpointParameter {
            name: "image".into(),
            definition: vec![ParameterDefinition::simple(ParameterType::String)],
            required: true,
            default: None,
            location: ParameterLocation::Body,
            raw_schema: None,
            description: None,
        }]);
        let err = format_request(&endpoint, &BTreeMap::new(), None).unwrap_err();
        assert_eq!(err.kind(), "missing_parameter");
    }

    #[test]
    fn media_parameter_routes_to_file_bucket_regardless_of_location() {
        let endpoint = endpoint_with(vec![EndpointParameter {
            name: "avatar".into(),
            definition: vec![ParameterDefinition::simple(ParameterType::String).with_format(ParameterFormat::Image)],
            required: true,
            default: None,
            location: ParameterLocation::Query,
            raw_schema: None,
            description: None,
        }]);
        let mut input = BTreeMap::new();
        input.insert("avatar".to_string(), json!("https://x/a.png"));
        let data = format_request(&endpoint, &input, None).unwrap();
        assert!(data.query.is_empty());
        assert!(matches!(data.file["avatar"], FileSlot::Raw(_)));
    }

    #[test]
    fn api_key_sets_authorization_header() {
        let endpoint = endpoint_with(vec![]);
        let data = format_request(&endpoint, &BTreeMap::new(), Some("secret")).unwrap();
        assert_eq!(data.headers["Authorization"], "Bearer secret");
    }
}
