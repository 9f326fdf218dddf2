// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parameter, endpoint, and service definitions — the normalized shape
//! every spec dialect parser reduces its input to.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::ServiceAddress;

/// The primitive JSON type a parameter carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

/// A semantic refinement of [`ParameterType::String`] (and, for `array`,
/// the element type) identifying media and URI-shaped values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterFormat {
    File,
    Image,
    Video,
    Audio,
    Uri,
    Binary,
    OtherString,
}

impl ParameterFormat {
    /// Whether this format denotes a media payload subject to the File
    /// Handler's Load/Upload/Attach pipeline.
    #[must_use]
    pub fn is_media(self) -> bool {
        matches!(self, Self::File | Self::Image | Self::Video | Self::Audio)
    }
}

/// One concrete `(type, format)` shape a parameter may take.
///
/// A parameter's effective definition may be a *set* of these (expressing
/// `anyOf`/`oneOf`/`allOf`), deduplicated by `(type, format)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub r#type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ParameterFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#enum: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
}

impl ParameterDefinition {
    /// A minimal definition with only a type, used for synthesized
    /// parameters (e.g. Cog v2's `seed` default patch).
    #[must_use]
    pub fn simple(r#type: ParameterType) -> Self {
        Self {
            r#type,
            format: None,
            r#enum: None,
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            additional_properties: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: ParameterFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn dedup_key(&self) -> (ParameterType, Option<ParameterFormat>) {
        (self.r#type, self.format)
    }
}

/// Deduplicates a set of alternative parameter definitions by `(type,
/// format)`, preserving first-seen order.
#[must_use]
pub fn dedup_definitions(defs: Vec<ParameterDefinition>) -> Vec<ParameterDefinition> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(defs.len());
    for def in defs {
        if seen.insert(def.dedup_key()) {
            out.push(def);
        }
    }
    out
}

/// Where a parameter's value is placed on the wire by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
    Cookie,
    Body,
}

/// A named parameter on an endpoint, with one or many alternative type
/// shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointParameter {
    pub name: String,
    pub definition: Vec<ParameterDefinition>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub location: ParameterLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EndpointParameter {
    /// `required=false ∧ default=none ⇒ parameter is omittable`.
    #[must_use]
    pub fn is_omittable(&self) -> bool {
        !self.required && self.default.is_none()
    }

    /// Whether any alternative definition carries a media format.
    #[must_use]
    pub fn is_media(&self) -> bool {
        self.definition.iter().any(|d| d.format.is_some_and(ParameterFormat::is_media))
    }
}

/// HTTP verb used for an endpoint, defaulting to `POST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Default for HttpMethod {
    fn default() -> Self {
        Self::Post
    }
}

/// One callable operation on a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDefinition {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_desc: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub parameters: Vec<EndpointParameter>,
    #[serde(default)]
    pub responses: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl EndpointDefinition {
    /// Derives an id as `method_path` when `operationId` was absent from
    /// the source spec.
    #[must_use]
    pub fn derive_id(method: HttpMethod, path: &str) -> String {
        let verb = match method {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
        };
        let slug = path.trim_matches('/').replace(['/', '{', '}'], "_");
        format!("{verb}_{slug}")
    }

    /// Whether the task plan for a job on this endpoint must include
    /// `LoadFiles` (at least one parameter carries a media format).
    #[must_use]
    pub fn has_media_parameter(&self) -> bool {
        self.parameters.iter().any(EndpointParameter::is_media)
    }
}

/// The dialect a service definition was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Specification {
    Socaity,
    Fasttaskapi,
    Runpod,
    Cog,
    Cog2,
    Replicate,
    Openai,
    Openapi,
    Other,
}

impl Specification {
    /// Whether a service of this specification runs an asynchronous job
    /// protocol and therefore needs the `Polling` pipeline stage.
    #[must_use]
    pub fn is_polled(self) -> bool {
        matches!(self, Self::Fasttaskapi | Self::Socaity | Self::Runpod | Self::Replicate)
    }
}

/// Normalizes a display name for the name index: lowercase, non-alphanumeric
/// collapsed to a single `_`, leading-digit-prefixed.
///
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// The unit of registration: a catalog entry mapping one remote service's
/// endpoints and parameter schema to the normalized model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_desc: String,
    pub specification: Specification,
    pub endpoints: Vec<EndpointDefinition>,
    pub service_address: ServiceAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_models: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    /// SHA-1 of the canonical JSON of the source spec document.
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_schema: Option<Value>,
}

impl ServiceDefinition {
    /// The normalized form of `display_name`, used for the registry's name
    /// index.
    #[must_use]
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.display_name)
    }

    /// Looks up an endpoint by id.
    #[must_use]
    pub fn endpoint(&self, id: &str) -> Option<&EndpointDefinition> {
        self.endpoints.iter().find(|e| e.id == id)
    }
}

/// Computes the SHA-1 hex digest of the canonical (key-sorted) JSON encoding
/// of `value`, used for `ServiceDefinition::version`.
#[must_use]
pub fn canonical_json_sha1(value: &Value) -> String {
    let canonical = canonicalize(value);
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let mut hasher = sha1::Sha1::new();
    use sha1::Digest;
    hasher.update(&bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: BTreeMap<String, Value> = BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k.clone(), canonicalize(v));
            }
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn omittable_requires_no_default_and_not_required() {
        let p = EndpointParameter {
            name: "voice".into(),
            definition: vec![ParameterDefinition::simple(ParameterType::String)],
            required: false,
            default: None,
            location: ParameterLocation::Body,
            raw_schema: None,
            description: None,
        };
        assert!(p.is_omittable());
    }

    #[test]
    fn normalize_name_is_idempotent() {
        let raw = "My Cool Service!! 2";
        let once = normalize_name(raw);
        let twice = normalize_name(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "my_cool_service_2");
    }

    #[test]
    fn normalize_name_prefixes_leading_digit() {
        assert_eq!(normalize_name("123abc"), "_123abc");
    }

    #[test]
    fn dedup_definitions_keeps_first_seen_order() {
        let defs = vec![
            ParameterDefinition::simple(ParameterType::String),
            ParameterDefinition::simple(ParameterType::Integer),
            ParameterDefinition::simple(ParameterType::String),
        ];
        let out = dedup_definitions(defs);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn canonical_hash_is_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json_sha1(&a), canonical_json_sha1(&b));
    }

    #[test]
    fn derive_id_combines_verb_and_path() {
        assert_eq!(EndpointDefinition::derive_id(HttpMethod::Post, "/predictions"), "post_predictions");
    }
}
