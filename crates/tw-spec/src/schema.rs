// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared OpenAPI schema-node → [`ParameterDefinition`] reduction, used by
//! every dialect parser.

use serde_json::Value;
use tw_model::{dedup_definitions, ParameterDefinition, ParameterFormat, ParameterType};

/// Resolves a `$ref` pointer (`#/components/schemas/Foo`) against the root
/// spec document. Non-`$ref` nodes pass through unchanged.
#[must_use]
pub fn resolve_ref<'a>(spec: &'a Value, node: &'a Value) -> &'a Value {
    let mut current = node;
    while let Some(reference) = current.get("$ref").and_then(Value::as_str) {
        let pointer = reference.trim_start_matches('#');
        match spec.pointer(pointer) {
            Some(resolved) => current = resolved,
            None => break,
        }
    }
    current
}

fn format_from_type_and_hint(type_str: &str, format_hint: Option<&str>) -> Option<ParameterFormat> {
    match (type_str, format_hint) {
        ("string", Some("binary")) => Some(ParameterFormat::Binary),
        ("string", Some("uri")) => Some(ParameterFormat::Uri),
        ("string", Some(other)) if !other.is_empty() => Some(ParameterFormat::OtherString),
        _ => None,
    }
}

fn parameter_type_from_str(s: &str) -> ParameterType {
    match s {
        "number" => ParameterType::Number,
        "integer" => ParameterType::Integer,
        "boolean" => ParameterType::Boolean,
        "array" => ParameterType::Array,
        "object" => ParameterType::Object,
        "null" => ParameterType::Null,
        _ => ParameterType::String,
    }
}

/// Reduces a (already `$ref`-resolved) schema node to one or many
/// [`ParameterDefinition`]s.
///
/// Direct `{type, format}` schemas produce a single definition. Arrays
/// become `{type: array, format: <item-type-or-format>}`. Composition
/// keywords (`anyOf`/`oneOf`/`allOf`) produce a deduplicated list of
/// alternatives.
#[must_use]
pub fn schema_to_definitions(spec: &Value, schema: &Value) -> Vec<ParameterDefinition> {
    let schema = resolve_ref(spec, schema);

    for keyword in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(alternatives)) = schema.get(keyword) {
            let defs: Vec<ParameterDefinition> = alternatives
                .iter()
                .flat_map(|alt| schema_to_definitions(spec, alt))
                .collect();
            return dedup_definitions(defs);
        }
    }

    let type_str = schema.get("type").and_then(Value::as_str).unwrap_or("string");
    let format_hint = schema.get("format").and_then(Value::as_str);

    if type_str == "array" {
        let item_schema = schema.get("items").map_or(&Value::Null, |v| v);
        let item_defs = schema_to_definitions(spec, item_schema);
        let format = item_defs.first().and_then(|d| d.format);
        return vec![apply_constraints(ParameterDefinition::simple(ParameterType::Array).with_opt_format(format), schema)];
    }

    let format = format_from_type_and_hint(type_str, format_hint);
    vec![apply_constraints(
        ParameterDefinition::simple(parameter_type_from_str(type_str)).with_opt_format(format),
        schema,
    )]
}

fn apply_constraints(mut def: ParameterDefinition, schema: &Value) -> ParameterDefinition {
    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        def.r#enum = Some(values.clone());
    }
    def.min_length = schema.get("minLength").and_then(Value::as_u64);
    def.max_length = schema.get("maxLength").and_then(Value::as_u64);
    def.minimum = schema.get("minimum").and_then(Value::as_f64);
    def.maximum = schema.get("maximum").and_then(Value::as_f64);
    def.additional_properties = schema.get("additionalProperties").and_then(Value::as_bool);
    def
}

trait WithOptFormat {
    fn with_opt_format(self, format: Option<ParameterFormat>) -> Self;
}

impl WithOptFormat for ParameterDefinition {
    fn with_opt_format(mut self, format: Option<ParameterFormat>) -> Self {
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_string_schema() {
        let spec = json!({});
        let defs = schema_to_definitions(&spec, &json!({"type": "string"}));
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].r#type, ParameterType::String);
    }

    #[test]
    fn ref_is_resolved_against_components() {
        let spec = json!({
            "components": {"schemas": {"Prompt": {"type": "string", "maxLength": 500}}}
        });
        let defs = schema_to_definitions(&spec, &json!({"$ref": "/components/schemas/Prompt"}));
        assert_eq!(defs[0].max_length, Some(500));
    }

    #[test]
    fn any_of_deduplicates_alternatives() {
        let spec = json!({});
        let schema = json!({"anyOf": [{"type": "string"}, {"type": "string"}, {"type": "integer"}]});
        let defs = schema_to_definitions(&spec, &schema);
        assert_eq!(defs.len(), 2);
    }

    #[test]
    fn array_of_strings_carries_item_type() {
        let spec = json!({});
        let schema = json!({"type": "array", "items": {"type": "string"}});
        let defs = schema_to_definitions(&spec, &schema);
        assert_eq!(defs[0].r#type, ParameterType::Array);
    }
}
