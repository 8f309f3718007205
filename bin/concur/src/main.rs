mod echo;
mod gate;
mod relay;
mod spawn;
mod tally;

use std::{path::PathBuf, time::Duration};

use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// How long blocked stdin readers get once the command is done.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> std::result::Result<(), BoxedError> {
    let commander = spawn::register(echo::register(relay::register(gate::register(
        tally::register(
            clap::Command::new("concur")
                .about("Concurrency tools: word tally, admission gate and stream relays")
                .arg_required_else_help(true)
                .arg(
                    clap::Arg::new("config")
                        .short('c')
                        .long("config")
                        .global(true)
                        .action(clap::ArgAction::Set)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    clap::Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .global(true)
                        .action(clap::ArgAction::SetTrue),
                ),
        ),
    ))));

    let matches = commander.get_matches();

    let max_level = if matches.get_flag("verbose") {
        Level::TRACE
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = concur_config::load_settings(
        matches
            .get_one::<PathBuf>("config")
            .map(PathBuf::as_path),
    )?;

    let (cancel_sender, _) = broadcast::channel::<()>(4);
    let interrupt = cancel_sender.clone();
    ctrlc::set_handler(move || {
        concur_logs::warn!("Interrupt received, cancelling");
        let _ = interrupt.send(());
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let outcome = runtime.block_on(async {
        match matches.subcommand() {
            Some(("tally", arguments)) => tally::run(arguments, &settings, &cancel_sender).await,
            Some(("gate", arguments)) => gate::run(arguments, &settings, &cancel_sender).await,
            Some(("relay", arguments)) => relay::run(arguments, &settings, &cancel_sender).await,
            Some(("echo", arguments)) => echo::run(arguments, &settings, &cancel_sender).await,
            Some(("spawn", _)) => spawn::run().await,
            _ => Ok(()),
        }
    });

    // stdin reads park a blocking thread that never returns on its own
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    if let Err(err) = &outcome {
        concur_logs::error!("{}", err);
    }
    outcome
}
