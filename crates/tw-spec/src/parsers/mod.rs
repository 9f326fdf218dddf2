// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dialect-specific parsers and the top-level dispatcher that reduces a
//! loaded spec document to a [`ServiceDefinition`].

pub mod cog;
pub mod common;
pub mod fasttaskapi;

use chrono::Utc;
use serde_json::Value;
use tw_model::{
    canonical_json_sha1, EndpointDefinition, Error, Result, ServiceAddress, ServiceDefinition,
    Specification,
};

use crate::detect::detect_specification;
use common::parse_all_operations;

/// Parses `spec` into a [`ServiceDefinition`], selecting the dialect-specific
/// parser by running [`detect_specification`] first.
///
/// `source_url` feeds both detection (provider URL hints) and the generic
/// OpenAPI fallback. Fails with [`Error::SpecMalformed`] if the detected
/// dialect yields zero endpoints.
pub fn parse_service(
    spec: &Value,
    source_url: Option<&str>,
    service_address: ServiceAddress,
    id: String,
) -> Result<ServiceDefinition> {
    let specification = detect_specification(spec, source_url);
    let endpoints = parse_endpoints(spec, specification);

    if endpoints.is_empty() {
        return Err(Error::SpecMalformed(format!(
            "no endpoints recovered for specification {specification:?}"
        )));
    }

    let info = spec.get("info");
    let display_name = info
        .and_then(|i| i.get("title"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let description = info
        .and_then(|i| i.get("description"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(ServiceDefinition {
        id,
        display_name,
        description,
        short_desc: String::new(),
        specification,
        endpoints,
        service_address,
        category: None,
        family_id: None,
        used_models: None,
        created_at: Utc::now(),
        version: canonical_json_sha1(spec),
        raw_schema: Some(spec.clone()),
    })
}

fn parse_endpoints(spec: &Value, specification: Specification) -> Vec<EndpointDefinition> {
    match specification {
        Specification::Fasttaskapi => fasttaskapi::parse_fasttaskapi(spec),
        Specification::Cog => cog::parse_cog_v1(spec),
        Specification::Cog2 => cog::parse_cog_v2(spec),
        Specification::Socaity
        | Specification::Runpod
        | Specification::Replicate
        | Specification::Openai
        | Specification::Openapi
        | Specification::Other => parse_all_operations(spec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tw_model::resolve_address;

    #[test]
    fn dispatches_cog_v2_and_fills_metadata() {
        let spec = json!({
            "info": {"title": "cog"},
            "components": {
                "schemas": {
                    "Input": {"type": "object", "properties": {"prompt": {"type": "string"}}},
                    "Output": {"type": "string"}
                }
            }
        });
        let address = resolve_address("https://example.com", None);
        let service = parse_service(&spec, None, address, "svc-1".to_string()).unwrap();
        assert_eq!(service.specification, Specification::Cog2);
        assert_eq!(service.endpoints.len(), 1);
        assert!(!service.version.is_empty());
    }

    #[test]
    fn empty_endpoints_is_spec_malformed() {
        let spec = json!({});
        let address = resolve_address("https://example.com", None);
        let err = parse_service(&spec, None, address, "svc-1".to_string()).unwrap_err();
        assert_eq!(err.kind(), "spec_malformed");
    }
}
