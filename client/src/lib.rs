pub mod backend_client;
pub mod cli_args;
pub mod credentials;
pub mod errors;
pub mod request;
pub mod router_client;
pub mod session;
pub mod wamp;

use log::*;
use flexi_logger::{opt_format, LogSpecification, Logger, LoggerHandle, WriteMode};

pub use backend_client::{BackendAuth, BackendClient, SessionToken};
pub use cli_args::{CLIArgs, Command, Endpoints};
pub use credentials::CredentialBundle;
pub use errors::{ConfigurationError, Error};
pub use request::{Procedure, Reply, Request};
pub use router_client::{CallResult, RouterConnector, RouterSession, WampConnector};
pub use session::SessionContext;

/// Starts the logger. Our own records follow `level`; dependencies only
/// report errors unless `level` is quieter still.
pub fn init_logging(level: LevelFilter) -> Option<LoggerHandle> {
    let spec = LogSpecification::builder()
        .default(level.min(LevelFilter::Error))
        .module("group_settings_cli", level)
        .build();

    // logger must only be started once
    match Logger::with(spec)
        .format(opt_format) // includes timestamp, level, logger name
        .write_mode(WriteMode::Direct)
        .start()
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Error initializing logger: {}", e);
            None
        }
    }
}

/// Main entry point, reading credentials from the process environment.
pub async fn run(cli_args: CLIArgs) -> Result<CallResult, Error> {
    run_with(cli_args, credentials::load).await
}

/// Builds the request, obtains credentials from `load_credentials` and
/// performs the single call. Split out of `run` for testing.
pub async fn run_with<L>(cli_args: CLIArgs, load_credentials: L) -> Result<CallResult, Error>
where
    L: FnOnce() -> Result<CredentialBundle, ConfigurationError>,
{
    let request = request::build(cli_args.command.procedure(), cli_args.command.args());
    info!("Request: {:?}", request);

    // all configuration is validated before any connection is attempted
    let credentials = load_credentials()?;
    let endpoints = Endpoints::from_args(&cli_args)?;
    let tls = credentials.tls_config();
    let backend = BackendClient::new(&endpoints.backend_uri, &tls)?;
    let router = WampConnector::new(&endpoints.router_uri, tls)?;

    let result = SessionContext::new(&backend, &router).execute(request).await?;
    info!("Result: {:?}", result);
    log_reply(&result);
    Ok(result)
}

/// First positional result read as a status/results record, if present.
fn decode_reply(result: &CallResult) -> Option<Result<Reply, serde_json::Error>> {
    result.args.first().cloned().map(serde_json::from_value::<Reply>)
}

fn log_reply(result: &CallResult) {
    match decode_reply(result) {
        Some(Ok(reply)) => {
            info!("Status: {}", reply.status);
            info!("Results: {:?}", reply.results);
        }
        Some(Err(e)) => debug!("Reply is not a status/results record: {}", e),
        None => debug!("Reply carried no positional result"),
    }
}
