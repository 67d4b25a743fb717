use anyhow::Result;
use clap::Parser;
use lib_odp::relay::PollingTrigger;

mod odp_logic;
use odp_logic::{cli::PollArgs, startup};

#[tokio::main]
async fn main() -> Result<()> {
    let args = PollArgs::parse();

    let Some(relay) = startup::prepare("odp", &args.common).await? else {
        return Ok(());
    };

    let mut trigger = PollingTrigger::new(args.interval());
    startup::run_until_shutdown(&mut trigger, &relay.service).await
}
