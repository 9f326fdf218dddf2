// SPDX-License-Identifier: MIT OR Apache-2.0
//! Strategy-based status decoding: each provider's wire shape is tried in a
//! fixed priority order, first match wins, same discipline as a routing
//! table tried rule by rule until one claims the message.

use serde_json::Value;
use tw_model::{BaseJobResponse, Error, ProtocolExtension, Result, ReplicateExtension, RunpodExtension, SocaityExtension};

use crate::status::{extract_progress, replicate_status, runpod_status};

/// One provider's `can_parse`/`parse` pair, tried in the order the
/// containing slice lists them.
pub trait Strategy {
    fn can_parse(&self, body: &Value) -> bool;
    fn parse(&self, body: &Value, http_status: u16) -> Result<BaseJobResponse>;
}

struct SocaityStrategy;
struct RunpodStrategy;
struct ReplicateStrategy;

impl Strategy for SocaityStrategy {
    fn can_parse(&self, body: &Value) -> bool {
        body.get("endpoint_protocol").and_then(Value::as_str) == Some("socaity")
            && body.get("id").is_some()
            && body.get("status").is_some()
    }

    fn parse(&self, body: &Value, _http_status: u16) -> Result<BaseJobResponse> {
        let id = require_str(body, "id")?;
        let status_raw = require_str(body, "status")?;
        let status = match status_raw.as_str() {
            "queued" => tw_model::UnifiedStatus::Queued,
            "processing" => tw_model::UnifiedStatus::Processing,
            "finished" => tw_model::UnifiedStatus::Finished,
            "failed" => tw_model::UnifiedStatus::Failed,
            "timeout" => tw_model::UnifiedStatus::Timeout,
            "cancelled" | "canceled" => tw_model::UnifiedStatus::Cancelled,
            _ => tw_model::UnifiedStatus::Unknown,
        };
        let (progress, progress_message) = extract_progress(body);
        Ok(BaseJobResponse {
            id,
            status,
            progress,
            progress_message,
            error: body.get("error").and_then(Value::as_str).map(str::to_string),
            result: body.get("result").cloned(),
            refresh_url: body.get("refresh_url").and_then(Value::as_str).map(str::to_string),
            cancel_url: body.get("cancel_url").and_then(Value::as_str).map(str::to_string),
            protocol: ProtocolExtension::Socaity(SocaityExtension {
                created_at: body.get("created_at").and_then(Value::as_str).map(str::to_string),
                finished_at: body.get("finished_at").and_then(Value::as_str).map(str::to_string),
            }),
        })
    }
}

impl Strategy for RunpodStrategy {
    fn can_parse(&self, body: &Value) -> bool {
        let Some(status_raw) = body.get("status").and_then(Value::as_str) else { return false };
        body.get("id").is_some() && runpod_status(status_raw) != tw_model::UnifiedStatus::Unknown
    }

    fn parse(&self, body: &Value, _http_status: u16) -> Result<BaseJobResponse> {
        let id = require_str(body, "id")?;
        let status_raw = require_str(body, "status")?;
        let status = runpod_status(&status_raw);
        let (progress, progress_message) = extract_progress(body);
        Ok(BaseJobResponse {
            id,
            status,
            progress,
            progress_message,
            error: body.get("error").and_then(Value::as_str).map(str::to_string),
            result: body.get("output").cloned(),
            refresh_url: body.get("refresh_url").and_then(Value::as_str).map(str::to_string),
            cancel_url: None,
            protocol: ProtocolExtension::Runpod(RunpodExtension {
                delay_time: body.get("delayTime").and_then(Value::as_u64),
                execution_time: body.get("executionTime").and_then(Value::as_u64),
                retries: body.get("retries").and_then(Value::as_u64).map(|n| n as u32),
                worker_id: body.get("workerId").and_then(Value::as_str).map(str::to_string),
            }),
        })
    }
}

impl Strategy for ReplicateStrategy {
    fn can_parse(&self, body: &Value) -> bool {
        body.get("urls")
            .and_then(|u| u.get("get"))
            .and_then(Value::as_str)
            .is_some_and(|url| url.contains("api.replicate.com"))
    }

    fn parse(&self, body: &Value, http_status: u16) -> Result<BaseJobResponse> {
        let id = require_str(body, "id")?;
        let status_raw = body.get("status").and_then(Value::as_str).unwrap_or("unknown");
        let is_error = body.get("error").map(|e| !e.is_null());
        let status = replicate_status(status_raw, Some(http_status), is_error);
        let refresh_url = body.get("urls").and_then(|u| u.get("get")).and_then(Value::as_str).map(str::to_string);
        let cancel_url = body.get("urls").and_then(|u| u.get("cancel")).and_then(Value::as_str).map(str::to_string);
        Ok(BaseJobResponse {
            id,
            status,
            progress: None,
            progress_message: None,
            error: body.get("error").and_then(Value::as_str).map(str::to_string),
            result: body.get("output").cloned(),
            refresh_url,
            cancel_url,
            protocol: ProtocolExtension::Replicate(ReplicateExtension {
                metrics: body.get("metrics").cloned(),
                stream: body.get("urls").and_then(|u| u.get("stream")).and_then(Value::as_str).map(str::to_string),
                version: body.get("version").and_then(Value::as_str).map(str::to_string),
                logs: body.get("logs").and_then(Value::as_str).map(str::to_string),
                data_removed: body.get("data_removed").and_then(Value::as_bool),
            }),
        })
    }
}

fn require_str(body: &Value, field: &str) -> Result<String> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::SpecMalformed(format!("response missing `{field}`")))
}

/// The strategies tried, in order, by [`decode_response`].
fn strategies() -> [Box<dyn Strategy>; 3] {
    [Box::new(SocaityStrategy), Box::new(RunpodStrategy), Box::new(ReplicateStrategy)]
}

/// Runs each strategy's `can_parse` check in priority order and parses with
/// the first match. No match is a malformed response, since every provider
/// this runtime targets produces one of these three shapes.
pub fn decode_response(body: &Value, http_status: u16) -> Result<BaseJobResponse> {
    for strategy in strategies() {
        if strategy.can_parse(body) {
            return strategy.parse(body, http_status);
        }
    }
    Err(Error::SpecMalformed("response body matched no known provider shape".to_string()))
}
