use findword_pipeline::{cli, reporting::console::Console};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let cli_args = cli::parse_args();
    let console = Console::new(cli_args.color);

    // Run the requested stage
    match cli::process_command(cli_args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            console.error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
