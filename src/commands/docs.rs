use clap::Args;
use serde::Serialize;

use roadie::api::ApiClient;
use roadie::context::CiContext;
use roadie::log_status;
use roadie::poller::{Poller, WaitSummary};
use roadie::preview::{self, CleanupSummary};
use roadie::target::{Target, TargetSettings};
use roadie::trigger::{self, BestEffort, InvokeOptions, TriggerRequest};
use roadie::Error;

use super::CmdResult;

const USAGE: &str = "Usage: roadie docs <deploy|cleanup>";

#[derive(Args)]
pub struct DocsArgs {
    /// What to do with the docs preview: deploy or cleanup
    #[arg(value_name = "ACTION")]
    pub action: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DocsCommandOutput {
    Deploy(DeployOutput),
    Cleanup(CleanupOutput),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutput {
    pub command: String,
    pub project: String,
    pub branch: String,
    pub branch_creation: BestEffort,
    pub pipeline_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
    pub wait: WaitSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupOutput {
    pub command: String,
    pub project: String,
    #[serde(flatten)]
    pub summary: CleanupSummary,
}

pub fn run(args: DocsArgs) -> CmdResult<DocsCommandOutput> {
    // Validate before touching the environment or the network.
    match args.action.as_deref() {
        Some("deploy") => {
            let (output, code) = deploy()?;
            Ok((DocsCommandOutput::Deploy(output), code))
        }
        Some("cleanup") => {
            let (output, code) = cleanup()?;
            Ok((DocsCommandOutput::Cleanup(output), code))
        }
        Some(other) => Err(Error::validation_invalid_argument(
            "action",
            format!("Unknown action '{}'", other),
            Some(vec!["deploy".to_string(), "cleanup".to_string()]),
        )
        .with_hint(USAGE)),
        None => {
            Err(Error::validation_missing_argument(vec!["action".to_string()]).with_hint(USAGE))
        }
    }
}

fn deploy() -> CmdResult<DeployOutput> {
    let ctx = CiContext::from_env()?;
    let settings = TargetSettings::from_env(Target::Docs, &ctx)?;
    let api = ApiClient::new(&ctx.api_base_url, &settings.api_token)?;

    let branch_creation = preview::ensure_branch(&api, &settings)?;

    let request = TriggerRequest::build(&settings, &ctx);
    let outcome = trigger::invoke(&api, &ctx, &request, &InvokeOptions::default())?;
    let wait = Poller::new().wait(&api, &outcome.handle)?;

    let app_url = preview::preview_url(&settings, &ctx);
    if let Some(url) = &app_url {
        log_status!("docs", "Preview ready at {}", url);
    }

    Ok((
        DeployOutput {
            command: "docs.deploy".to_string(),
            project: request.project_path,
            branch: request.ref_name,
            branch_creation,
            pipeline_id: outcome.pipeline.id,
            pipeline_url: outcome.pipeline.web_url,
            app_url,
            wait,
        },
        0,
    ))
}

fn cleanup() -> CmdResult<CleanupOutput> {
    let ctx = CiContext::from_env()?;
    let settings = TargetSettings::from_env(Target::Docs, &ctx)?;
    let api = ApiClient::new(&ctx.api_base_url, &settings.api_token)?;

    let summary = preview::cleanup(&api, &settings)?;

    Ok((
        CleanupOutput {
            command: "docs.cleanup".to_string(),
            project: settings.project_path,
            summary,
        },
        0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadie::ErrorCode;

    #[test]
    fn missing_action_is_a_usage_error() {
        let err = run(DocsArgs { action: None }).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
        assert!(err.hints.iter().any(|h| h.message.contains("deploy|cleanup")));
    }

    #[test]
    fn unknown_action_lists_the_allowed_set() {
        let err = run(DocsArgs {
            action: Some("destroy".to_string()),
        })
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
        assert_eq!(err.details["allowed"][0], "deploy");
        assert!(err.hints.iter().any(|h| h.message.contains(USAGE)));
    }
}
