use clap::Args;

use roadie::target::Target;
use roadie::trigger::InvokeOptions;

use super::{CmdResult, TriggerOutput};

#[derive(Args)]
pub struct OmnibusArgs {
    /// Watch a single job instead of the whole downstream pipeline
    #[arg(long, value_name = "NAME")]
    pub job: Option<String>,

    /// Skip the cross-reference comment on the source commit
    #[arg(long)]
    pub no_comment: bool,
}

pub fn run(args: OmnibusArgs) -> CmdResult<TriggerOutput> {
    let options = InvokeOptions {
        post_comment: !args.no_comment,
        watch_job: args.job,
    };

    super::run_trigger(Target::Omnibus, options, "omnibus.trigger")
}
