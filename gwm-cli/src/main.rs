//! GWM CLI - Command line tool for groundwater monitoring point data.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "gwm-cli",
    version,
    about = "Groundwater monitoring data toolkit"
)]
struct Cli {
    #[command(flatten)]
    global: gwm_cmd::GlobalArgs,

    #[command(subcommand)]
    command: gwm_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    log::debug!("{:?}", cli.command);
    gwm_cmd::run(cli.global, cli.command).await
}
