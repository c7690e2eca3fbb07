use std::process::ExitCode;
use clap::Parser;
use log::error;
use group_settings_cli::CLIArgs;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Strong-typed command-line arguments
    let cli_args = CLIArgs::parse();
    let _logger = group_settings_cli::init_logging(cli_args.log_level);

    match group_settings_cli::run(cli_args).await { //separate method for easier testing
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
