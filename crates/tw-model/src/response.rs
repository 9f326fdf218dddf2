// SPDX-License-Identifier: MIT OR Apache-2.0

//! The unified server response shape: a status enum every provider's
//! wire format is reduced to, plus protocol-specific extensions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The unified job-status enum every provider's status vocabulary maps
/// into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnifiedStatus {
    Queued,
    Processing,
    Finished,
    Failed,
    Timeout,
    Cancelled,
    Unknown,
}

impl UnifiedStatus {
    /// Terminal statuses stop the Polling stage.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Timeout | Self::Cancelled)
    }
}

/// Which strategy decoded a response, carried for diagnostics and for the
/// provider-specific extension fields below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Socaity,
    Runpod,
    Replicate,
    Generic,
}

/// Socaity-specific extension fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocaityExtension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

/// Runpod-specific extension fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunpodExtension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
}

/// Replicate-specific extension fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicateExtension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_removed: Option<bool>,
}

/// Provider-specific extension, attached to a [`BaseJobResponse`] based on
/// which strategy decoded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum ProtocolExtension {
    Socaity(SocaityExtension),
    Runpod(RunpodExtension),
    Replicate(ReplicateExtension),
    Generic,
}

/// The fully decoded, provider-agnostic view of a remote job's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseJobResponse {
    pub id: String,
    pub status: UnifiedStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<String>,
    pub protocol: ProtocolExtension,
}

impl BaseJobResponse {
    /// On `finished`, progress is always reported as complete regardless of
    /// what the wire payload carried.
    pub fn normalize_progress(&mut self) {
        if self.status == UnifiedStatus::Finished {
            self.progress = Some(1.0);
        }
    }

    /// Merges `inner` (a recursively-decoded nested response, e.g. Runpod's
    /// `result` being a JSON-encoded Socaity body) over `self`: outer fields
    /// win only where they were absent.
    #[must_use]
    pub fn merge_nested(mut self, inner: BaseJobResponse) -> Self {
        if self.result.is_none() {
            self.result = inner.result;
        }
        if self.error.is_none() {
            self.error = inner.error;
        }
        if self.progress.is_none() {
            self.progress = inner.progress;
        }
        if self.progress_message.is_none() {
            self.progress_message = inner.progress_message;
        }
        self.status = inner.status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_status_forces_full_progress() {
        let mut r = BaseJobResponse {
            id: "j1".into(),
            status: UnifiedStatus::Finished,
            progress: Some(0.4),
            progress_message: None,
            error: None,
            result: Some(Value::String("hello".into())),
            refresh_url: None,
            cancel_url: None,
            protocol: ProtocolExtension::Generic,
        };
        r.normalize_progress();
        assert_eq!(r.progress, Some(1.0));
    }

    #[test]
    fn merge_nested_prefers_outer_but_fills_gaps() {
        let outer = BaseJobResponse {
            id: "r1".into(),
            status: UnifiedStatus::Processing,
            progress: None,
            progress_message: None,
            error: None,
            result: None,
            refresh_url: Some("/status/r1".into()),
            cancel_url: None,
            protocol: ProtocolExtension::Runpod(RunpodExtension::default()),
        };
        let inner = BaseJobResponse {
            id: "s1".into(),
            status: UnifiedStatus::Finished,
            progress: Some(1.0),
            progress_message: None,
            error: None,
            result: Some(Value::String("ok".into())),
            refresh_url: None,
            cancel_url: None,
            protocol: ProtocolExtension::Socaity(SocaityExtension::default()),
        };
        let merged = outer.merge_nested(inner);
        assert_eq!(merged.result, Some(Value::String("ok".into())));
        assert_eq!(merged.refresh_url.as_deref(), Some("/status/r1"));
        assert_eq!(merged.status, UnifiedStatus::Finished);
    }

    #[test]
    fn terminal_statuses() {
        assert!(UnifiedStatus::Finished.is_terminal());
        assert!(UnifiedStatus::Failed.is_terminal());
        assert!(UnifiedStatus::Cancelled.is_terminal());
        assert!(UnifiedStatus::Timeout.is_terminal());
        assert!(!UnifiedStatus::Queued.is_terminal());
        assert!(!UnifiedStatus::Processing.is_terminal());
    }
}
