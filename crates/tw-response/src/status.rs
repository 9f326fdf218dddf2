// SPDX-License-Identifier: MIT OR Apache-2.0
//! Status unification tables and tolerant progress extraction.

use serde_json::Value;
use tw_model::UnifiedStatus;

/// Maps a Runpod status string to the unified enum.
#[must_use]
pub fn runpod_status(raw: &str) -> UnifiedStatus {
    match raw {
        "IN_QUEUE" => UnifiedStatus::Queued,
        "IN_PROGRESS" => UnifiedStatus::Processing,
        "COMPLETED" => UnifiedStatus::Finished,
        "FAILED" => UnifiedStatus::Failed,
        "CANCELLED" => UnifiedStatus::Cancelled,
        "TIMED_OUT" => UnifiedStatus::Timeout,
        _ => UnifiedStatus::Unknown,
    }
}

/// Maps a Replicate status string to the unified enum.
///
/// A status of `unknown` on a `200`, non-error response is coerced to
/// `finished` — Replicate's own terminal-success shorthand.
#[must_use]
pub fn replicate_status(raw: &str, http_status: Option<u16>, is_error: Option<bool>) -> UnifiedStatus {
    let mapped = match raw {
        "STARTING" => UnifiedStatus::Queued,
        "BOOTING" | "PROCESSING" => UnifiedStatus::Processing,
        "SUCCEEDED" => UnifiedStatus::Finished,
        "FAILED" => UnifiedStatus::Failed,
        "CANCELED" => UnifiedStatus::Cancelled,
        _ => UnifiedStatus::Unknown,
    };
    if mapped == UnifiedStatus::Unknown && http_status == Some(200) && is_error == Some(false) {
        return UnifiedStatus::Finished;
    }
    mapped
}

/// Extracts `(fraction, message)` from a `progress` field that may be a
/// bare number, a `{progress, message}` object, or absent.
#[must_use]
pub fn extract_progress(body: &Value) -> (Option<f64>, Option<String>) {
    match body.get("progress") {
        Some(Value::Number(n)) => (n.as_f64(), None),
        Some(Value::Object(obj)) => {
            let fraction = obj.get("progress").and_then(Value::as_f64);
            let message = obj.get("message").and_then(Value::as_str).map(str::to_string);
            (fraction, message)
        }
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runpod_table_is_surjective_minus_unknown_and_timeout_source() {
        assert_eq!(runpod_status("IN_QUEUE"), UnifiedStatus::Queued);
        assert_eq!(runpod_status("IN_PROGRESS"), UnifiedStatus::Processing);
        assert_eq!(runpod_status("COMPLETED"), UnifiedStatus::Finished);
        assert_eq!(runpod_status("FAILED"), UnifiedStatus::Failed);
        assert_eq!(runpod_status("CANCELLED"), UnifiedStatus::Cancelled);
        assert_eq!(runpod_status("TIMED_OUT"), UnifiedStatus::Timeout);
    }

    #[test]
    fn replicate_unknown_on_200_non_error_coerces_to_finished() {
        assert_eq!(replicate_status("weird", Some(200), Some(false)), UnifiedStatus::Finished);
        assert_eq!(replicate_status("weird", Some(500), Some(false)), UnifiedStatus::Unknown);
        assert_eq!(replicate_status("weird", Some(200), Some(true)), UnifiedStatus::Unknown);
    }

    #[test]
    fn progress_tolerates_bare_number_object_or_absent() {
        assert_eq!(extract_progress(&serde_json::json!({"progress": 0.5})).0, Some(0.5));
        assert_eq!(
            extract_progress(&serde_json::json!({"progress": {"progress": 0.2, "message": "loading"}})),
            (Some(0.2), Some("loading".to_string()))
        );
        assert_eq!(extract_progress(&serde_json::json!({})), (None, None));
    }
}
