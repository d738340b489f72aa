use qpush_cli::{run_cli, CliError};
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);
        eprintln!("qpush: {}", e);

        let exit_code = match e {
            CliError::Configuration(_) => 1,
            CliError::UnknownQueue { .. } => 2,
            CliError::InvalidArgument { .. } => 3,
            CliError::Queue(_) => 4,
            CliError::Logging { .. } => 5,
            CliError::Io(_) => 6,
        };

        std::process::exit(exit_code);
    }
}
