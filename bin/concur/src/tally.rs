use std::{io::Write, path::PathBuf, time::Duration};

use concur_config::{Settings, TallyMode};
use concur_tally::TallyOrchestrator;
use tokio::sync::broadcast;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("tally")
            .about("counts words across files concurrently and lists the ones seen more than once")
            .arg(
                clap::Arg::new("files")
                    .action(clap::ArgAction::Append)
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                clap::Arg::new("mode")
                    .long("mode")
                    .action(clap::ArgAction::Set)
                    .value_parser(["strict", "lenient"]),
            )
            .arg(
                clap::Arg::new("min_count")
                    .long("min-count")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(u64)),
            )
            .arg(
                clap::Arg::new("deadline_secs")
                    .long("deadline-secs")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(u64)),
            )
            .arg(
                clap::Arg::new("batched")
                    .long("batched")
                    .action(clap::ArgAction::SetTrue),
            ),
    )
}

pub async fn run(
    args: &clap::ArgMatches,
    settings: &Settings,
    cancel: &broadcast::Sender<()>,
) -> std::result::Result<(), BoxedError> {
    let mut stdout = std::io::stdout();
    tally_into(args, settings, cancel, &mut stdout).await
}

// The report only reaches `out` once the whole tally succeeded.
async fn tally_into<W: Write>(
    args: &clap::ArgMatches,
    settings: &Settings,
    cancel: &broadcast::Sender<()>,
    out: &mut W,
) -> std::result::Result<(), BoxedError> {
    let mut tally_settings = settings.tally.clone();

    if let Some(files) = args.get_many::<PathBuf>("files") {
        tally_settings.files = files.cloned().collect();
    }
    if let Some(mode) = args.get_one::<String>("mode") {
        tally_settings.mode = mode.parse::<TallyMode>()?;
    }
    if let Some(min_count) = args.get_one::<u64>("min_count") {
        tally_settings.min_count = *min_count;
    }
    if let Some(deadline) = args.get_one::<u64>("deadline_secs") {
        tally_settings.deadline = Some(Duration::from_secs(*deadline));
    }

    let orchestrator = TallyOrchestrator::from(&tally_settings).batched(args.get_flag("batched"));

    concur_logs::info!(
        "Tallying {} files in {:?} mode",
        orchestrator.paths().len(),
        tally_settings.mode
    );

    let report = orchestrator.run(cancel.subscribe()).await?;
    for failure in &report.failures {
        concur_logs::warn!("Skipped in lenient mode: {}", failure);
    }

    concur_logs::info!("Words that appear at least {} times:", tally_settings.min_count);
    write!(out, "{report}")?;
    out.flush()?;

    Ok(())
}
