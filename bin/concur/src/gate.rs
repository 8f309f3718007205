use std::time::Duration;

use concur_channels::gate::{self, GateRunOptions};
use concur_config::Settings;
use tokio::sync::broadcast;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("gate")
            .about("runs workers that take turns through a capacity-one channel gate")
            .arg(
                clap::Arg::new("workers")
                    .long("workers")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("hold_ms")
                    .long("hold-ms")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(u64)),
            ),
    )
}

pub async fn run(
    args: &clap::ArgMatches,
    settings: &Settings,
    cancel: &broadcast::Sender<()>,
) -> std::result::Result<(), BoxedError> {
    let options = GateRunOptions {
        workers: args
            .get_one::<usize>("workers")
            .copied()
            .unwrap_or(settings.gate.workers),
        hold: args
            .get_one::<u64>("hold_ms")
            .map_or(settings.gate.hold, |ms| Duration::from_millis(*ms)),
    };

    concur_logs::info!(
        "Launching {} workers, each holding the gate for {:?}",
        options.workers,
        options.hold
    );

    let summary = gate::run_workers(options, cancel).await?;

    concur_logs::info!(
        "{} of {} workers passed the gate, order {:?}, at most {} holder(s) at once",
        summary.completed,
        options.workers,
        summary.order,
        summary.max_holders
    );

    Ok(())
}
