use serde::Serialize;

use roadie::api::ApiClient;
use roadie::context::CiContext;
use roadie::poller::{Poller, WaitSummary};
use roadie::target::{Target, TargetSettings};
use roadie::trigger::{self, BestEffort, InvokeOptions, TriggerRequest};

pub type CmdResult<T> = roadie::Result<(T, i32)>;

pub mod cng;
pub mod docs;
pub mod omnibus;

/// Shared output shape for the trigger-and-wait commands.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerOutput {
    pub command: String,
    pub project: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub pipeline_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_url: Option<String>,
    pub watching: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_comment: Option<BestEffort>,
    pub variables: std::collections::BTreeMap<String, String>,
    pub wait: WaitSummary,
}

/// Builds the context once, triggers the downstream pipeline, and blocks
/// until it finishes. Shared by the omnibus and cng commands.
pub(crate) fn run_trigger(
    target: Target,
    options: InvokeOptions,
    command: &str,
) -> CmdResult<TriggerOutput> {
    let ctx = CiContext::from_env()?;
    let settings = TargetSettings::from_env(target, &ctx)?;
    let api = ApiClient::new(&ctx.api_base_url, &settings.api_token)?;

    let request = TriggerRequest::build(&settings, &ctx);
    let outcome = trigger::invoke(&api, &ctx, &request, &options)?;
    let wait = Poller::new().wait(&api, &outcome.handle)?;

    Ok((
        TriggerOutput {
            command: command.to_string(),
            project: request.project_path,
            ref_name: request.ref_name,
            pipeline_id: outcome.pipeline.id,
            pipeline_url: outcome.pipeline.web_url,
            watching: outcome.handle.describe(),
            commit_comment: outcome.commit_comment,
            variables: request.variables,
            wait,
        },
        0,
    ))
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
}

pub(crate) fn run_json(command: crate::Commands) -> (roadie::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Omnibus(args) => dispatch!(args, omnibus),
        crate::Commands::Cng(args) => dispatch!(args, cng),
        crate::Commands::Docs(args) => dispatch!(args, docs),
    }
}
