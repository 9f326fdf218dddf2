// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The Job Orchestrator: turns a registered service endpoint and caller
//! input into a running [`Job`], driving its task plan stage by stage
//! (Preparing → LoadFiles → Uploading → Sending → Polling → Processing),
//! forwarding progress, honoring cooperative cancellation between stages
//! and on every poll tick, and recording per-run metrics.

/// Cooperative cancellation tokens.
pub mod cancel;
/// Transient poll-failure bookkeeping for the Polling stage.
pub mod retry;
/// The concrete pipeline stages and their shared execution context.
pub mod stages;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tw_config::ClientConfig;
use tw_files::Uploader;
use tw_model::{EndpointDefinition, Error, Job, JobState, Result, ServiceDefinition, Stage};
use tw_telemetry::{MetricsCollector, RunMetrics, StageSpan};
use tw_transport::Client;

pub use cancel::CancellationToken;
pub use stages::{ExecutionContext, JobExecution, PipelineStage, ProgressSink};

/// Drives submitted jobs through their task plan and accumulates run
/// metrics across however many jobs pass through this instance.
pub struct Orchestrator {
    metrics: MetricsCollector,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    /// Creates an orchestrator with a fresh, empty metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self { metrics: MetricsCollector::new() }
    }

    /// Creates an orchestrator that records into an existing, possibly
    /// shared, collector.
    #[must_use]
    pub fn with_metrics(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }

    /// The metrics collector this orchestrator records into.
    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    fn build_stages(
        task_plan: &[Stage],
        poll_interval: Duration,
        poll_timeout: Duration,
    ) -> Vec<Box<dyn PipelineStage>> {
        task_plan
            .iter()
            .map(|stage| -> Box<dyn PipelineStage> {
                match stage {
                    Stage::Preparing => Box::new(stages::PreparingStage),
                    Stage::LoadFiles => Box::new(stages::LoadFilesStage),
                    Stage::Uploading => Box::new(stages::UploadingStage),
                    Stage::Sending => Box::new(stages::SendingStage),
                    Stage::Polling => Box::new(stages::PollingStage { poll_interval, poll_timeout }),
                    Stage::Processing => Box::new(stages::ProcessingStage),
                }
            })
            .collect()
    }

    /// Runs `job` to completion against `service`/`endpoint`.
    ///
    /// Cancellation is checked before each stage and, within the Polling
    /// stage, on every tick; it never aborts a call already in flight.
    /// Progress observed mid-run is forwarded on `progress`. On any stage
    /// failure the job is marked `failed` and the error returned; the
    /// stage outputs recorded before the failure remain on `job`.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        job: &mut Job,
        service: &ServiceDefinition,
        endpoint: &EndpointDefinition,
        config: &ClientConfig,
        http: reqwest::Client,
        api_key: Option<String>,
        uploader: Option<Arc<dyn Uploader>>,
        cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> Result<()> {
        let client = Arc::new(Client::new(http, config.clone(), service.service_address.clone(), api_key.clone())?);
        let ctx = ExecutionContext {
            client,
            endpoint: endpoint.clone(),
            api_key,
            uploader,
            upload_profile: config.upload_profile.clone(),
        };
        let stage_list = Self::build_stages(
            &job.task_plan,
            Duration::from_secs(config.poll_interval_secs),
            Duration::from_secs(config.poll_timeout_secs),
        );
        let mut exec = JobExecution::default();

        job.start();
        let started = Instant::now();

        for stage in &stage_list {
            if cancel.is_cancelled() {
                job.cancel();
                return Err(Error::ServerJobCancelled);
            }

            StageSpan::new(stage.stage().name())
                .with_attribute("job_id", job.id.to_string())
                .with_attribute("service_id", job.service_id.clone())
                .emit();

            if let Err(err) = stage.run(&ctx, &mut exec, job, cancel, progress).await {
                job.fail(&err);
                self.record_metrics(job, service, started);
                return Err(err);
            }
        }

        self.record_metrics(job, service, started);
        Ok(())
    }

    fn record_metrics(&self, job: &Job, service: &ServiceDefinition, started: Instant) {
        let files_uploaded = job
            .per_stage_outputs
            .get("Uploading")
            .and_then(|v| v.get("uploaded"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);

        self.metrics.record(RunMetrics {
            service_id: job.service_id.clone(),
            specification: format!("{:?}", service.specification).to_lowercase(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            stages_count: job.task_plan.len() as u64,
            poll_retries: 0,
            succeeded: u64::from(job.state == JobState::Finished),
            files_uploaded,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tw_model::{resolve_address, EndpointParameter, HttpMethod, ParameterDefinition, ParameterLocation, ParameterType, Specification};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint() -> EndpointDefinition {
        EndpointDefinition {
            id: "predict".into(),
            path: "/predict".into(),
            display_name: String::new(),
            description: String::new(),
            short_desc: String::new(),
            method: HttpMethod::Post,
            parameters: vec![EndpointParameter {
                name: "prompt".into(),
                definition: vec![ParameterDefinition::simple(ParameterType::String)],
                required: true,
                default: None,
                location: ParameterLocation::Body,
                raw_schema: None,
                description: None,
            }],
            responses: BTreeMap::new(),
            timeout_seconds: None,
        }
    }

    fn service(address: tw_model::ServiceAddress) -> ServiceDefinition {
        ServiceDefinition {
            id: "svc".into(),
            display_name: String::new(),
            description: String::new(),
            short_desc: String::new(),
            specification: Specification::Socaity,
            endpoints: vec![endpoint()],
            service_address: address,
            category: None,
            family_id: None,
            used_models: None,
            created_at: chrono::Utc::now(),
            version: "v1".into(),
            raw_schema: None,
        }
    }

    #[tokio::test]
    async fn socaity_happy_path_finishes_with_plain_text_result() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "endpoint_protocol": "socaity",
                "id": "job-1",
                "status": "finished",
                "result": "hello",
            })))
            .mount(&mock_server)
            .await;

        let address = resolve_address(&mock_server.uri(), Some(tw_model::AddressHint::Socaity));
        let service = service(address);
        let endpoint = service.endpoints[0].clone();

        let mut input = BTreeMap::new();
        input.insert("prompt".to_string(), serde_json::json!("hi"));
        let task_plan = Job::compute_task_plan(false, false, service.specification.is_polled());
        let mut job = Job::new(service.id.clone(), endpoint.id.clone(), input, task_plan);

        let config = ClientConfig::default();
        let orchestrator = Orchestrator::new();
        let cancel = CancellationToken::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        orchestrator
            .run(&mut job, &service, &endpoint, &config, reqwest::Client::new(), Some("sk_live_0123456789abcdef".into()), None, &cancel, &tx)
            .await
            .unwrap();

        assert_eq!(job.state, JobState::Finished);
        assert_eq!(job.final_result, Some(serde_json::json!("hello")));
        assert_eq!(orchestrator.metrics().len(), 1);
    }

    #[tokio::test]
    async fn missing_required_parameter_fails_before_any_http_call() {
        let mock_server = MockServer::start().await;
        let address = resolve_address(&mock_server.uri(), Some(tw_model::AddressHint::Socaity));
        let service = service(address);
        let endpoint = service.endpoints[0].clone();

        let task_plan = Job::compute_task_plan(false, false, service.specification.is_polled());
        let mut job = Job::new(service.id.clone(), endpoint.id.clone(), BTreeMap::new(), task_plan);

        let config = ClientConfig::default();
        let orchestrator = Orchestrator::new();
        let cancel = CancellationToken::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        let err = orchestrator
            .run(&mut job, &service, &endpoint, &config, reqwest::Client::new(), Some("sk_live_0123456789abcdef".into()), None, &cancel, &tx)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "missing_parameter");
        assert_eq!(job.state, JobState::Failed);
    }

    #[tokio::test]
    async fn cancelling_before_start_stops_the_job_without_any_request() {
        let mock_server = MockServer::start().await;
        let address = resolve_address(&mock_server.uri(), Some(tw_model::AddressHint::Socaity));
        let service = service(address);
        let endpoint = service.endpoints[0].clone();

        let mut input = BTreeMap::new();
        input.insert("prompt".to_string(), serde_json::json!("hi"));
        let task_plan = Job::compute_task_plan(false, false, service.specification.is_polled());
        let mut job = Job::new(service.id.clone(), endpoint.id.clone(), input, task_plan);

        let config = ClientConfig::default();
        let orchestrator = Orchestrator::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        let err = orchestrator
            .run(&mut job, &service, &endpoint, &config, reqwest::Client::new(), Some("sk_live_0123456789abcdef".into()), None, &cancel, &tx)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "server_job_cancelled");
        assert_eq!(job.state, JobState::Cancelled);
    }
}
