use anyhow::{Context, Result};
use clap::Parser;
use lib_odp::pushbullet::stream;
use lib_odp::relay::{starting_cursor, StreamTrigger};

mod odp_logic;
use odp_logic::{cli::StreamArgs, startup};

#[tokio::main]
async fn main() -> Result<()> {
    let args = StreamArgs::parse();

    let Some(relay) = startup::prepare("odp_stream", &args.common).await? else {
        return Ok(());
    };

    // Taken before subscribing: a push landing in between is newer than the
    // cursor and is picked up by the next tickle.
    let cursor = starting_cursor(&relay.service).await;
    let events = stream::subscribe(&relay.config.api_key)
        .await
        .context("Failed to connect to the Pushbullet stream")?;

    // Any return other than a requested shutdown exits non-zero so the
    // supervisor restarts us with a fresh connection.
    let mut trigger = StreamTrigger::new(events, cursor).with_silence_timeout(args.silence());
    startup::run_until_shutdown(&mut trigger, &relay.service).await
}
