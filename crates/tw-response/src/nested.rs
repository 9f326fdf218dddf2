// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nested-response recovery: some providers (Runpod most commonly) wrap
//! another provider's full job body as a JSON-encoded string in `result`.
//! Recursively re-decoding and merging surfaces the inner job's real
//! status and payload instead of leaving it opaque.

use serde_json::Value;
use tw_model::BaseJobResponse;

use crate::strategies::decode_response;

/// Maximum recursion depth, guarding against a pathological
/// result-references-itself loop.
const MAX_DEPTH: usize = 4;

/// Decodes `body`, then recursively decodes and merges any nested response
/// found in the `result` field, up to [`MAX_DEPTH`] levels deep.
pub fn decode_with_nested_recovery(body: &Value, http_status: u16) -> tw_model::Result<BaseJobResponse> {
    decode_recursive(body, http_status, MAX_DEPTH)
}

fn decode_recursive(body: &Value, http_status: u16, depth_remaining: usize) -> tw_model::Result<BaseJobResponse> {
    let mut outer = decode_response(body, http_status)?;
    if depth_remaining == 0 {
        return Ok(outer);
    }
    let Some(nested_value) = nested_candidate(&outer) else { return Ok(outer) };
    match decode_recursive(&nested_value, http_status, depth_remaining - 1) {
        // The outer `result` was only ever the encoded nested body, not a
        // value in its own right — clear it so the inner's real result
        // fills it in rather than "winning" as an already-present field.
        Ok(inner) => {
            outer.result = None;
            Ok(outer.merge_nested(inner))
        }
        Err(_) => Ok(outer),
    }
}

/// Returns a `Value` to attempt re-decoding if `result` looks like a
/// JSON-encoded nested response: either a string that parses to an object,
/// or an object that already looks like one.
fn nested_candidate(outer: &BaseJobResponse) -> Option<Value> {
    match outer.result.as_ref()? {
        Value::String(s) => serde_json::from_str::<Value>(s).ok().filter(Value::is_object),
        Value::Object(_) => outer.result.clone().filter(looks_like_job_body),
        _ => None,
    }
}

fn looks_like_job_body(value: &Value) -> bool {
    value.get("id").is_some() && value.get("status").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn runpod_result_carrying_json_encoded_socaity_body_is_unwrapped() {
        let inner = json!({
            "endpoint_protocol": "socaity",
            "id": "s1",
            "status": "finished",
            "result": "https://cdn/x.png",
        });
        let outer = json!({
            "id": "r1",
            "status": "COMPLETED",
            "output": inner.to_string(),
        });
        let decoded = decode_with_nested_recovery(&outer, 200).unwrap();
        assert_eq!(decoded.result, Some(Value::String("https://cdn/x.png".to_string())));
        assert_eq!(decoded.status, tw_model::UnifiedStatus::Finished);
    }

    #[test]
    fn plain_result_with_no_nested_job_shape_passes_through() {
        let body = json!({"id": "r1", "status": "COMPLETED", "output": {"image": "https://x/y.png"}});
        let decoded = decode_with_nested_recovery(&body, 200).unwrap();
        assert_eq!(decoded.result, Some(json!({"image": "https://x/y.png"})));
    }
}
