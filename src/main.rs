use clap::Parser;
use pfa_schedule::cli::{self, Cli, Command};
use pfa_schedule::settings::Settings;
use tracing::error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    let settings = Settings::from_env()?;
    pfa_schedule::init_tracing(settings.debug);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => pfa_schedule::serve(settings).await?,
        Command::CheckModified { days } => {
            if let Err(err) = cli::check_modified(&settings, days).await {
                error!(error = ?err, "AUDIT ERROR: modified-class check failed");
                std::process::exit(1);
            }
        }
        Command::DetectChanges { snapshot } => {
            if let Err(err) = cli::detect_changes(&settings, snapshot).await {
                error!(error = ?err, "AUDIT ERROR: schedule change detection failed");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
