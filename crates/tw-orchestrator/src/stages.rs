// SPDX-License-Identifier: MIT OR Apache-2.0
//! The six concrete pipeline stages: Preparing, LoadFiles, Uploading,
//! Sending, Polling, Processing.
//!
//! Each stage mutates a shared [`JobExecution`] in place, the same
//! insertion-order, short-circuit-on-error discipline applied to one
//! long-lived value instead of a one-shot work order.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use tw_config::UploadProfile;
use tw_files::{attach, decide_upload, load_files, FileEntry, FileInput, MediaFile, Uploader};
use tw_model::{EndpointDefinition, Error, Job, Result, Stage, StageProgress};
use tw_response::decode_with_nested_recovery;
use tw_transport::{format_request, Client, FileSlot, RequestData};

use crate::cancel::CancellationToken;
use crate::retry::TransientFailureTracker;

/// Mutable state threaded through a job's stages: the assembled request
/// and the most recently decoded server response.
#[derive(Default)]
pub struct JobExecution {
    pub request: Option<RequestData>,
    pub last_response: Option<tw_model::BaseJobResponse>,
}

/// Everything a stage needs that does not change across a job's lifetime.
pub struct ExecutionContext {
    pub client: Arc<Client>,
    pub endpoint: EndpointDefinition,
    pub api_key: Option<String>,
    pub uploader: Option<Arc<dyn Uploader>>,
    pub upload_profile: UploadProfile,
}

/// Forwards progress observed mid-stage to whatever is watching a job.
pub type ProgressSink = tokio::sync::mpsc::UnboundedSender<(Stage, StageProgress)>;

/// One stage in the job pipeline.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Runs this stage against `exec`, recording its output on `job`.
    async fn run(
        &self,
        ctx: &ExecutionContext,
        exec: &mut JobExecution,
        job: &mut Job,
        cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> Result<()>;

    /// The [`Stage`] this implementation performs.
    fn stage(&self) -> Stage;
}

/// Preparing: partitions caller input into query/body/file/header buckets.
pub struct PreparingStage;

#[async_trait]
impl PipelineStage for PreparingStage {
    async fn run(
        &self,
        ctx: &ExecutionContext,
        exec: &mut JobExecution,
        job: &mut Job,
        _cancel: &CancellationToken,
        _progress: &ProgressSink,
    ) -> Result<()> {
        let data = format_request(&ctx.endpoint, &job.input, ctx.api_key.as_deref())?;
        job.record_output(
            Stage::Preparing,
            serde_json::json!({
                "query_keys": data.query.keys().collect::<Vec<_>>(),
                "body_keys": data.body.keys().collect::<Vec<_>>(),
                "file_keys": data.file.keys().collect::<Vec<_>>(),
            }),
        );
        exec.request = Some(data);
        Ok(())
    }

    fn stage(&self) -> Stage {
        Stage::Preparing
    }
}

/// Converts a raw media-parameter value into something the Load stage can
/// materialize: a URL string, a local path string, or an inline
/// `{file_name, content_type, content}` object carrying base64 bytes.
fn value_to_file_input(name: &str, value: &Value) -> Result<FileInput> {
    match value {
        Value::String(s) if s.starts_with("http://") || s.starts_with("https://") => {
            Ok(FileInput::Url(s.clone()))
        }
        Value::String(s) => Ok(FileInput::Path(PathBuf::from(s))),
        Value::Object(obj) => {
            let file_name = obj
                .get("file_name")
                .or_else(|| obj.get("name"))
                .and_then(Value::as_str)
                .unwrap_or(name)
                .to_string();
            let content_type = obj.get("content_type").and_then(Value::as_str).map(str::to_string);
            let encoded = obj
                .get("content")
                .or_else(|| obj.get("bytes"))
                .and_then(Value::as_str)
                .ok_or_else(|| Error::InvalidParameterValue {
                    name: name.to_string(),
                    reason: "expected a `content` or `bytes` field with base64 data".to_string(),
                })?;
            let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).map_err(|e| {
                Error::InvalidParameterValue { name: name.to_string(), reason: format!("invalid base64: {e}") }
            })?;
            Ok(FileInput::Bytes { name: file_name, content_type, bytes })
        }
        other => Err(Error::InvalidParameterValue {
            name: name.to_string(),
            reason: format!("cannot interpret {other} as a file"),
        }),
    }
}

/// LoadFiles: materializes any path- or byte-bearing inputs; URL inputs
/// pass through untouched.
pub struct LoadFilesStage;

#[async_trait]
impl PipelineStage for LoadFilesStage {
    async fn run(
        &self,
        _ctx: &ExecutionContext,
        exec: &mut JobExecution,
        job: &mut Job,
        _cancel: &CancellationToken,
        _progress: &ProgressSink,
    ) -> Result<()> {
        let data = exec.request.as_mut().expect("Preparing runs before LoadFiles");
        let raw: Vec<(String, FileInput)> = data
            .file
            .iter()
            .map(|(name, slot)| match slot {
                FileSlot::Raw(value) => value_to_file_input(name, value).map(|input| (name.clone(), input)),
                _ => unreachable!("file slots start as Raw"),
            })
            .collect::<Result<_>>()?;

        let loaded = load_files(raw).await?;
        let count = loaded.len();
        for (name, entry) in loaded {
            data.file.insert(name, FileSlot::Loaded(entry));
        }
        job.record_output(Stage::LoadFiles, serde_json::json!({"loaded": count}));
        Ok(())
    }

    fn stage(&self) -> Stage {
        Stage::LoadFiles
    }
}

/// Uploading: replaces in-flight file bytes with cloud URLs where the
/// batch crosses the configured threshold.
pub struct UploadingStage;

#[async_trait]
impl PipelineStage for UploadingStage {
    async fn run(
        &self,
        ctx: &ExecutionContext,
        exec: &mut JobExecution,
        job: &mut Job,
        _cancel: &CancellationToken,
        _progress: &ProgressSink,
    ) -> Result<()> {
        let data = exec.request.as_mut().expect("LoadFiles runs before Uploading");
        let entries: BTreeMap<String, FileEntry> = data
            .file
            .iter()
            .map(|(name, slot)| match slot {
                FileSlot::Loaded(entry) => (name.clone(), entry.clone()),
                _ => unreachable!("files are Loaded by the time Uploading runs"),
            })
            .collect();

        let uploaded = decide_upload(entries, &ctx.upload_profile, ctx.uploader.as_deref()).await?;
        let uploaded_count = uploaded.values().filter(|e| matches!(e, FileEntry::Url(_))).count();
        for (name, entry) in uploaded {
            data.file.insert(name, FileSlot::Loaded(entry));
        }
        job.record_output(Stage::Uploading, serde_json::json!({"uploaded": uploaded_count}));
        Ok(())
    }

    fn stage(&self) -> Stage {
        Stage::Uploading
    }
}

fn attach_remaining_files(data: &mut RequestData, format: tw_config::AttachFormat) {
    let loaded: BTreeMap<String, FileEntry> = data
        .file
        .iter()
        .filter_map(|(name, slot)| match slot {
            FileSlot::Loaded(entry) => Some((name.clone(), entry.clone())),
            _ => None,
        })
        .collect();
    for (name, fragment) in attach(loaded, format) {
        data.file.insert(name, FileSlot::Attached(fragment));
    }
}

/// Sending: performs the first HTTP call and decodes the response.
pub struct SendingStage;

#[async_trait]
impl PipelineStage for SendingStage {
    async fn run(
        &self,
        ctx: &ExecutionContext,
        exec: &mut JobExecution,
        job: &mut Job,
        _cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> Result<()> {
        let mut data = exec.request.take().expect("Preparing runs before Sending");
        attach_remaining_files(&mut data, ctx.client.effective_attach_format());

        let timeout = ctx.endpoint.timeout_seconds;
        let response = ctx.client.send(&ctx.endpoint.path, data, timeout).await?;
        let decoded = decode_with_nested_recovery(&response.body, response.status)?;

        job.record_output(
            Stage::Sending,
            serde_json::json!({"status": format!("{:?}", decoded.status), "id": decoded.id}),
        );
        let _ = progress.send((
            Stage::Sending,
            StageProgress { fraction: decoded.progress, message: decoded.progress_message.clone() },
        ));
        exec.last_response = Some(decoded);
        Ok(())
    }

    fn stage(&self) -> Stage {
        Stage::Sending
    }
}

/// Polling: repeats the provider's poll call until a terminal status is
/// reached, tolerating up to three consecutive transient failures.
pub struct PollingStage {
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

#[async_trait]
impl PipelineStage for PollingStage {
    async fn run(
        &self,
        ctx: &ExecutionContext,
        exec: &mut JobExecution,
        job: &mut Job,
        cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> Result<()> {
        let mut tracker = TransientFailureTracker::new();
        let deadline = tokio::time::Instant::now() + self.poll_timeout;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::ServerJobCancelled);
            }
            {
                let last = exec.last_response.as_ref().expect("Sending runs before Polling");
                if last.status.is_terminal() {
                    break;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::PollTimeout { elapsed_secs: self.poll_timeout.as_secs() });
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(Error::ServerJobCancelled),
                () = tokio::time::sleep(self.poll_interval) => {}
            }

            let last = exec.last_response.clone().expect("Sending runs before Polling");
            match ctx.client.poll_status(&last, ctx.endpoint.timeout_seconds).await {
                Ok(response) => {
                    let decoded = decode_with_nested_recovery(&response.body, response.status)?;
                    let _ = progress.send((
                        Stage::Polling,
                        StageProgress { fraction: decoded.progress, message: decoded.progress_message.clone() },
                    ));
                    tracker.record_success();
                    exec.last_response = Some(decoded);
                }
                Err(err) if err.is_transient() => {
                    if tracker.record_failure() {
                        return Err(err);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        let last = exec.last_response.as_ref().expect("polling loop always sets a response");
        job.record_output(Stage::Polling, serde_json::json!({"final_status": format!("{:?}", last.status)}));

        match last.status {
            tw_model::UnifiedStatus::Cancelled => Err(Error::ServerJobCancelled),
            tw_model::UnifiedStatus::Failed => Err(Error::ServerJobFailed(last.error.clone().unwrap_or_default())),
            tw_model::UnifiedStatus::Timeout => Err(Error::PollTimeout { elapsed_secs: self.poll_timeout.as_secs() }),
            _ => Ok(()),
        }
    }

    fn stage(&self) -> Stage {
        Stage::Polling
    }
}

/// Reduces a decoded media file into the JSON shape a job's final result
/// carries: inline content stays base64-encoded, URLs (including
/// lazily-fetchable Replicate delivery links) pass through untouched.
fn media_file_to_value(file: &MediaFile) -> Value {
    let content = match &file.content {
        tw_files::MediaContent::Bytes(bytes) => {
            serde_json::json!({"type": "bytes", "base64": base64::engine::general_purpose::STANDARD.encode(bytes)})
        }
        tw_files::MediaContent::Url(url) => serde_json::json!({"type": "url", "url": url}),
    };
    serde_json::json!({"name": file.name, "content_type": file.content_type, "content": content})
}

/// Processing: decodes a media result if the payload carries one, else
/// returns the raw `result` field unchanged.
pub struct ProcessingStage;

#[async_trait]
impl PipelineStage for ProcessingStage {
    async fn run(
        &self,
        _ctx: &ExecutionContext,
        exec: &mut JobExecution,
        job: &mut Job,
        _cancel: &CancellationToken,
        _progress: &ProgressSink,
    ) -> Result<()> {
        let response = exec.last_response.take().expect("Sending runs before Processing");
        let raw = response.result.unwrap_or(Value::Null);
        let files = tw_response::decode_result_media(&raw);
        let decoded = match files.as_slice() {
            [] => raw,
            [single] => media_file_to_value(single),
            many => Value::Array(many.iter().map(media_file_to_value).collect()),
        };
        job.record_output(Stage::Processing, decoded.clone());
        job.finish(decoded);
        Ok(())
    }

    fn stage(&self) -> Stage {
        Stage::Processing
    }
}
