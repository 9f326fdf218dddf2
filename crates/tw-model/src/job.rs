// SPDX-License-Identifier: MIT OR Apache-2.0

//! The job model: a per-submission task plan, its stage-by-stage outputs
//! and progress, and its terminal state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ErrorSnapshot;

/// The named stages a job's task plan may contain, computed once at submit
/// time from the endpoint and service shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Stage {
    Preparing,
    LoadFiles,
    Uploading,
    Sending,
    Polling,
    Processing,
}

impl Stage {
    /// Canonical display name, also used as the map key in
    /// `per_stage_outputs`/`per_stage_progress`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Preparing => "Preparing",
            Self::LoadFiles => "LoadFiles",
            Self::Uploading => "Uploading",
            Self::Sending => "Sending",
            Self::Polling => "Polling",
            Self::Processing => "Processing",
        }
    }
}

/// Progress reported by a single stage: a fraction in `[0, 1]` and/or a
/// free-form message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Terminal and non-terminal job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Finished,
    Failed,
    Cancelled,
}

impl JobState {
    /// Terminal states are final: `finished`, `failed`, `cancelled`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }
}

/// A single submitted unit of work against a registered service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub service_id: String,
    pub endpoint_id: String,
    pub input: BTreeMap<String, Value>,
    pub task_plan: Vec<Stage>,
    #[serde(default)]
    pub per_stage_outputs: BTreeMap<String, Value>,
    #[serde(default)]
    pub per_stage_progress: BTreeMap<String, StageProgress>,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ErrorSnapshot>,
}

impl Job {
    /// Creates a new job in the `pending` state with the given task plan.
    #[must_use]
    pub fn new(
        service_id: impl Into<String>,
        endpoint_id: impl Into<String>,
        input: BTreeMap<String, Value>,
        task_plan: Vec<Stage>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id: service_id.into(),
            endpoint_id: endpoint_id.into(),
            input,
            task_plan,
            per_stage_outputs: BTreeMap::new(),
            per_stage_progress: BTreeMap::new(),
            state: JobState::Pending,
            final_result: None,
            failure: None,
        }
    }

    /// Records the output of a completed stage.
    pub fn record_output(&mut self, stage: Stage, output: Value) {
        self.per_stage_outputs.insert(stage.name().to_string(), output);
    }

    /// Records progress for an in-flight stage.
    pub fn record_progress(&mut self, stage: Stage, progress: StageProgress) {
        self.per_stage_progress.insert(stage.name().to_string(), progress);
    }

    /// Transitions to `running` if still `pending`.
    pub fn start(&mut self) {
        if self.state == JobState::Pending {
            self.state = JobState::Running;
        }
    }

    /// Marks the job `finished` with the given decoded result.
    pub fn finish(&mut self, result: Value) {
        self.final_result = Some(result);
        self.state = JobState::Finished;
    }

    /// Marks the job `failed`, retaining every stage output observed before
    /// failure.
    pub fn fail(&mut self, error: &crate::error::Error) {
        self.failure = Some(ErrorSnapshot::from(error));
        self.state = JobState::Failed;
    }

    /// Marks the job `cancelled`.
    pub fn cancel(&mut self) {
        self.state = JobState::Cancelled;
    }

    /// Computes the task plan for an endpoint per the orchestrator's rules:
    /// always Preparing and Sending and Processing; LoadFiles iff the
    /// endpoint has a media parameter; Uploading iff an uploader is
    /// configured; Polling iff the specification is asynchronous.
    #[must_use]
    pub fn compute_task_plan(has_media_parameter: bool, has_uploader: bool, is_polled: bool) -> Vec<Stage> {
        let mut plan = vec![Stage::Preparing];
        if has_media_parameter {
            plan.push(Stage::LoadFiles);
        }
        if has_uploader {
            plan.push(Stage::Uploading);
        }
        plan.push(Stage::Sending);
        if is_polled {
            plan.push(Stage::Polling);
        }
        plan.push(Stage::Processing);
        plan
    }
}
