use std::time::Duration;

use concur_channels::relay;
use concur_config::Settings;
use tokio::sync::broadcast;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("echo")
            .about("copies stdin straight to stdout, optionally for a bounded time")
            .arg(
                clap::Arg::new("deadline_secs")
                    .long("deadline-secs")
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
    let deadline = args
        .get_one::<u64>("deadline_secs")
        .map(|secs| Duration::from_secs(*secs))
        .or(settings.relay.deadline);

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let copy = relay::echo(&mut stdin, &mut stdout, cancel.subscribe());

    let copied = match deadline {
        Some(duration) => match tokio::time::timeout(duration, copy).await {
            Ok(copied) => copied?,
            Err(_) => {
                concur_logs::info!("Echo timed out after {:?}", duration);
                return Ok(());
            }
        },
        None => copy.await?,
    };

    concur_logs::info!("Echoed {} bytes", copied);
    Ok(())
}
