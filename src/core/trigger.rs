use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::{ApiClient, Job, Pipeline};
use crate::context::CiContext;
use crate::error::Result;
use crate::target::TargetSettings;
use crate::variables;

/// What the poller watches: the whole pipeline, or one job inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Pipeline,
    Job,
}

/// Pointer to the remote resource a wait tracks. Produced by a successful
/// trigger submission, consumed by the poller and the output layer.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    pub project_path: String,
    pub id: u64,
    pub kind: ResourceKind,
    pub web_url: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl PipelineHandle {
    pub fn describe(&self) -> String {
        match self.kind {
            ResourceKind::Pipeline => format!("pipeline #{}", self.id),
            ResourceKind::Job => format!("job #{}", self.id),
        }
    }
}

/// One trigger submission. Immutable once built.
#[derive(Debug, Clone)]
pub struct TriggerRequest {
    pub project_path: String,
    pub ref_name: String,
    pub trigger_token: String,
    pub variables: BTreeMap<String, String>,
}

impl TriggerRequest {
    pub fn build(settings: &TargetSettings, ctx: &CiContext) -> Self {
        Self {
            project_path: settings.project_path.clone(),
            ref_name: settings.ref_name.clone(),
            trigger_token: settings.trigger_token.clone(),
            variables: variables::build(settings.target, ctx),
        }
    }
}

/// Outcome of a best-effort side call. Failures that must not kill the run
/// are downgraded to `Skipped` with the reason; callers log it and keep
/// going, and the outcome lands in the command output.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum BestEffort {
    Applied,
    Skipped { reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Post a cross-reference comment on the upstream source commit.
    pub post_comment: bool,
    /// Watch this job instead of the whole pipeline when it exists.
    pub watch_job: Option<String>,
}

#[derive(Debug)]
pub struct TriggerOutcome {
    pub pipeline: Pipeline,
    pub handle: PipelineHandle,
    pub commit_comment: Option<BestEffort>,
}

/// Submits the trigger and prepares the handle to wait on.
pub fn invoke(
    api: &ApiClient,
    ctx: &CiContext,
    request: &TriggerRequest,
    options: &InvokeOptions,
) -> Result<TriggerOutcome> {
    log_status!(
        "trigger",
        "Triggering downstream pipeline on {} (ref '{}')",
        request.project_path,
        request.ref_name
    );
    for (key, value) in &request.variables {
        log_status!("trigger", "  {}={}", key, value);
    }

    let pipeline = api.trigger_pipeline(
        &request.project_path,
        &request.trigger_token,
        &request.ref_name,
        &request.variables,
    )?;

    match pipeline.web_url.as_deref() {
        Some(url) => log_status!("trigger", "Triggered {}", url),
        None => log_status!("trigger", "Triggered pipeline #{}", pipeline.id),
    }

    let commit_comment = if options.post_comment {
        let outcome = post_commit_comment(api, ctx, &pipeline);
        if let BestEffort::Skipped { reason } = &outcome {
            log_status!("trigger", "Skipping commit comment: {}", reason);
        }
        Some(outcome)
    } else {
        None
    };

    let handle = match options.watch_job.as_deref() {
        Some(job_name) => resolve_job_handle(api, request, &pipeline, job_name)?,
        None => pipeline_handle(&request.project_path, &pipeline),
    };

    Ok(TriggerOutcome {
        pipeline,
        handle,
        commit_comment,
    })
}

/// Cross-references the downstream pipeline from the upstream commit. A
/// missing comment never fails the build.
fn post_commit_comment(api: &ApiClient, ctx: &CiContext, pipeline: &Pipeline) -> BestEffort {
    let (Some(project), Some(sha)) = (ctx.project_path.as_deref(), ctx.source_sha()) else {
        return BestEffort::Skipped {
            reason: "upstream project or commit unknown".to_string(),
        };
    };

    let note = comment_note(ctx, pipeline);
    match api.create_commit_comment(project, sha, &note) {
        Ok(()) => BestEffort::Applied,
        Err(e) => BestEffort::Skipped {
            reason: e.to_string(),
        },
    }
}

fn comment_note(ctx: &CiContext, pipeline: &Pipeline) -> String {
    let downstream = pipeline
        .web_url
        .clone()
        .unwrap_or_else(|| format!("pipeline #{}", pipeline.id));

    match (
        ctx.job_name.as_deref(),
        ctx.job_url.as_deref(),
        ctx.pipeline_url.as_deref(),
    ) {
        (Some(name), Some(job_url), Some(pipeline_url)) => format!(
            "The [`{}`]({}) job from pipeline {} triggered {} downstream.",
            name, job_url, pipeline_url, downstream
        ),
        (Some(name), Some(job_url), None) => format!(
            "The [`{}`]({}) job triggered {} downstream.",
            name, job_url, downstream
        ),
        _ => format!("Triggered {} downstream.", downstream),
    }
}

fn resolve_job_handle(
    api: &ApiClient,
    request: &TriggerRequest,
    pipeline: &Pipeline,
    job_name: &str,
) -> Result<PipelineHandle> {
    let jobs = api.pipeline_jobs(&request.project_path, pipeline.id)?;

    match find_job(&jobs, job_name) {
        Some(job) => {
            log_status!("trigger", "Watching job '{}' (#{})", job.name, job.id);
            Ok(job_handle(&request.project_path, job))
        }
        None => {
            log_status!(
                "trigger",
                "Job '{}' not found in pipeline #{}; watching the pipeline",
                job_name,
                pipeline.id
            );
            Ok(pipeline_handle(&request.project_path, pipeline))
        }
    }
}

/// First job with an exact name match.
pub fn find_job<'a>(jobs: &'a [Job], name: &str) -> Option<&'a Job> {
    jobs.iter().find(|job| job.name == name)
}

pub(crate) fn pipeline_handle(project_path: &str, pipeline: &Pipeline) -> PipelineHandle {
    PipelineHandle {
        project_path: project_path.to_string(),
        id: pipeline.id,
        kind: ResourceKind::Pipeline,
        web_url: pipeline.web_url.clone(),
        started_at: Utc::now(),
    }
}

pub(crate) fn job_handle(project_path: &str, job: &Job) -> PipelineHandle {
    PipelineHandle {
        project_path: project_path.to_string(),
        id: job.id,
        kind: ResourceKind::Job,
        web_url: job.web_url.clone(),
        started_at: Utc::now(),
    }
}
