use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{cng, docs, omnibus};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "roadie")]
#[command(version = VERSION)]
#[command(about = "Trigger downstream CI pipelines and watch them to completion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger an omnibus package build for the current commit and wait for it
    Omnibus(omnibus::OmnibusArgs),
    /// Trigger a cloud-native image build for the current commit and wait for it
    Cng(cng::CngArgs),
    /// Deploy or clean up a docs preview for the current branch
    Docs(docs::DocsArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command);
    let _ = output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
