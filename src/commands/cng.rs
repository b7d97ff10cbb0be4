use clap::Args;

use roadie::target::Target;
use roadie::trigger::InvokeOptions;

use super::{CmdResult, TriggerOutput};

#[derive(Args)]
pub struct CngArgs {}

pub fn run(_args: CngArgs) -> CmdResult<TriggerOutput> {
    super::run_trigger(Target::Cng, InvokeOptions::default(), "cng.trigger")
}
