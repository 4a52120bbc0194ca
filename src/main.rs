use clap::Parser;
use sheet_rollover::args::{Args, Command};
use sheet_rollover::{commands, Config, ErrorType, IntoResult, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().rollover_home().path();

    // When ROLLOVER_IN_TEST_MODE is set and non-empty, the mode will be Mode::Test and in-memory
    // sheets are used instead of Google Sheets.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args).await?.print(),

        Command::Auth(auth_args) => {
            let config = Config::load(home).await.pub_result(ErrorType::Config)?;
            if auth_args.verify() {
                commands::auth_verify(&config).await?.print()
            } else {
                commands::auth(&config).await?.print()
            }
        }

        Command::Run(run_args) => {
            let config = Config::load(home).await.pub_result(ErrorType::Config)?;
            commands::run(&config, mode, run_args.date()).await?.print()
        }

        Command::Sheets => {
            let config = Config::load(home).await.pub_result(ErrorType::Config)?;
            commands::sheets(&config, mode).await?.print()
        }

        Command::Formulas(formulas_args) => commands::formulas(formulas_args)?.print(),

        Command::Serve(serve_args) => {
            let config = Config::load(home).await.pub_result(ErrorType::Config)?;
            commands::serve(config, mode, serve_args).await?.print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
