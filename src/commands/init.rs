use crate::args::InitArgs;
use crate::commands::Out;
use crate::config::{SecretKind, Settings};
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory and its `.secrets` subdirectory, writes an initial `config.json`
/// from `args`, and moves the client secret (or service-account key) into `.secrets`.
///
/// # Errors
/// - Returns an error if the sheet URL is not a Google Sheets URL or if any file operation fails.
pub async fn init(rollover_home: &Path, args: &InitArgs) -> Result<Out<()>> {
    let (secret_file, secret_kind) = args
        .secret()
        .context("Either a client secret or a service account key is required")
        .pub_result(ErrorType::Config)?;
    let settings = Settings {
        preset: args.preset(),
        policy: args.policy(),
        locale: args.locale().map(str::to_string),
        secret_kind,
    };
    let config = Config::create(rollover_home, secret_file, args.sheet_url(), settings)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    let next = match secret_kind {
        SecretKind::OAuthClient => "run 'rollover auth' next",
        SecretKind::ServiceAccount => "share the spreadsheet with the service account",
    };
    Ok(format!(
        "Successfully created the rollover directory and config at {}, {next}",
        config.root().display()
    )
    .into())
}
