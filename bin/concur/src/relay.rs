use std::time::Duration;

use concur_channels::relay::{self, RelayOptions};
use concur_config::Settings;
use tokio::sync::broadcast;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("relay")
            .about("forwards stdin to stdout through a channel until input ends or the deadline passes")
            .arg(
                clap::Arg::new("deadline_secs")
                    .long("deadline-secs")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(u64)),
            )
            .arg(
                clap::Arg::new("chunk_size")
                    .long("chunk-size")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            ),
    )
}

pub async fn run(
    args: &clap::ArgMatches,
    settings: &Settings,
    cancel: &broadcast::Sender<()>,
) -> std::result::Result<(), BoxedError> {
    let options = RelayOptions {
        chunk_size: args
            .get_one::<usize>("chunk_size")
            .copied()
            .unwrap_or(settings.relay.chunk_size),
        deadline: args
            .get_one::<u64>("deadline_secs")
            .map(|secs| Duration::from_secs(*secs))
            .or(settings.relay.deadline),
    };

    let mut stdout = tokio::io::stdout();
    let outcome = relay::relay(tokio::io::stdin(), &mut stdout, options, cancel.subscribe()).await?;

    concur_logs::info!(
        "Relayed {} bytes in {} chunks, stopped by {:?}",
        outcome.bytes,
        outcome.chunks,
        outcome.end
    );

    Ok(())
}
