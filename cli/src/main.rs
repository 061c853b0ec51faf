mod commands;
mod terminal;

use badcapt_common::config::Config;
use commands::{CommandLine, Commands, listen, selftest};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose)?;

    match commands.command {
        Commands::Listen {
            iface,
            include_outbound,
            output,
        } => {
            print::header("starting capture");
            let cfg: Config = output.to_config(&iface, !include_outbound);
            listen::listen(cfg).await
        }
        Commands::Selftest { output } => {
            print::header("running self test");
            let cfg: Config = output.to_config(selftest::ORIGIN, true);
            tokio::task::spawn_blocking(move || selftest::selftest(cfg)).await?
        }
    }
}
