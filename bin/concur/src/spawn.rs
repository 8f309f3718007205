use tracing::Instrument;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("spawn")
            .about("spawns a task that logs from inside the caller and waits for it"),
    )
}

pub async fn run() -> std::result::Result<(), BoxedError> {
    concur_logs::info!("outside task");

    let inside = tokio::spawn(
        async {
            concur_logs::info!("inside task");
        }
        .instrument(tracing::Span::current()),
    );

    concur_logs::info!("outside task again");

    // the inside message is guaranteed to be out once this returns
    inside.await?;
    Ok(())
}
