// SPDX-License-Identifier: MIT OR Apache-2.0
//! Specification detection: classifies a loaded spec document into one of
//! the supported dialects, per the fixed priority order.

use serde_json::Value;
use tw_model::Specification;

/// Classifies `spec` (and, where the URL disambiguates a hosted provider,
/// `source_url`) into a [`Specification`], per the fixed priority order:
/// FastTaskAPI markers, Cog title conventions, source-URL provider hints,
/// falling back to generic OpenAPI.
#[must_use]
pub fn detect_specification(spec: &Value, source_url: Option<&str>) -> Specification {
    let info = spec.get("info");

    if info.and_then(|i| i.get("fast-task-api")).is_some() {
        return Specification::Fasttaskapi;
    }
    if has_fasttaskapi_schema(spec) {
        return Specification::Fasttaskapi;
    }

    let title_lower = info
        .and_then(|i| i.get("title"))
        .and_then(Value::as_str)
        .map(str::to_lowercase)
        .unwrap_or_default();

    if title_lower == "cog" {
        let paths_empty = spec.get("paths").map(is_empty_object).unwrap_or(true);
        let has_io_schemas = schema_exists(spec, "Input") && schema_exists(spec, "Output");
        if paths_empty && has_io_schemas {
            return Specification::Cog2;
        }
        return Specification::Cog;
    }

    if let Some(url) = source_url {
        let lower = url.to_lowercase();
        if lower.contains("replicate") {
            return Specification::Replicate;
        }
        if lower.contains("runpod") {
            return Specification::Runpod;
        }
        if lower.contains("api.socaity.ai") {
            return Specification::Socaity;
        }
    }
    if title_lower.contains("openai") {
        return Specification::Openai;
    }

    Specification::Openapi
}

fn is_empty_object(v: &Value) -> bool {
    v.as_object().is_none_or(serde_json::Map::is_empty)
}

fn schema_exists(spec: &Value, name: &str) -> bool {
    spec.pointer(&format!("/components/schemas/{name}")).is_some()
}

fn has_fasttaskapi_schema(spec: &Value) -> bool {
    let Some(schemas) = spec.pointer("/components/schemas").and_then(Value::as_object) else {
        return false;
    };
    schemas.keys().any(|name| {
        let lower = name.to_lowercase();
        lower == "jobresult" || lower.ends_with("filemodel")
    })
}
