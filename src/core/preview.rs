use serde::Serialize;

use crate::api::ApiClient;
use crate::context::{slug, CiContext};
use crate::error::{Error, Result};
use crate::poller::Status;
use crate::target::{TargetSettings, DEFAULT_DOCS_BASE_BRANCH};
use crate::trigger::BestEffort;

/// Creates the preview branch in the docs project. A branch that is already
/// there is fine; the deploy just reuses it.
pub fn ensure_branch(api: &ApiClient, settings: &TargetSettings) -> Result<BestEffort> {
    let base = settings
        .docs_base_branch
        .as_deref()
        .unwrap_or(DEFAULT_DOCS_BASE_BRANCH);

    match api.create_branch(&settings.project_path, &settings.ref_name, base) {
        Ok(branch) => {
            log_status!("docs", "Created branch '{}' from '{}'", branch.name, base);
            Ok(BestEffort::Applied)
        }
        Err(e) if branch_conflict(&e) => {
            log_status!("docs", "Branch '{}' already exists", settings.ref_name);
            Ok(BestEffort::Skipped {
                reason: "already exists".to_string(),
            })
        }
        Err(e) => Err(e),
    }
}

/// Review-app address for the deployed preview, when a domain is configured.
pub fn preview_url(settings: &TargetSettings, ctx: &CiContext) -> Option<String> {
    let domain = settings.review_apps_domain.as_deref()?;
    let host = format!("{}.{}", slug(&settings.ref_name), domain);

    match ctx.project_slug() {
        Some(project) => Some(format!("https://{}/{}", host, project)),
        None => Some(format!("https://{}", host)),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    pub branch: String,
    pub canceled_pipelines: Vec<u64>,
    pub branch_deletion: BestEffort,
}

/// Tears the preview down: cancel whatever is still moving on the branch,
/// then delete the branch itself. Safe to run when nothing was deployed.
pub fn cleanup(api: &ApiClient, settings: &TargetSettings) -> Result<CleanupSummary> {
    let branch = settings.ref_name.clone();
    let pipelines = api.pipelines_for_ref(&settings.project_path, &branch)?;
    log_status!(
        "docs",
        "Found {} pipeline(s) for branch '{}'",
        pipelines.len(),
        branch
    );

    let mut canceled_pipelines = Vec::new();
    for pipeline in &pipelines {
        if !Status::parse(&pipeline.status).is_in_flight() {
            continue;
        }
        log_status!(
            "docs",
            "Canceling pipeline #{} ({})",
            pipeline.id,
            pipeline.status
        );
        api.cancel_pipeline(&settings.project_path, pipeline.id)?;
        canceled_pipelines.push(pipeline.id);
    }

    let branch_deletion = match api.delete_branch(&settings.project_path, &branch) {
        Ok(()) => {
            log_status!("docs", "Deleted branch '{}'", branch);
            BestEffort::Applied
        }
        Err(e) if branch_missing(&e) => {
            log_status!("docs", "Branch '{}' is already gone", branch);
            BestEffort::Skipped {
                reason: "not found".to_string(),
            }
        }
        Err(e) => return Err(e),
    };

    Ok(CleanupSummary {
        branch,
        canceled_pipelines,
        branch_deletion,
    })
}

fn branch_conflict(error: &Error) -> bool {
    matches!(error.http_status(), Some(400) | Some(409))
}

fn branch_missing(error: &Error) -> bool {
    error.http_status() == Some(404)
}
