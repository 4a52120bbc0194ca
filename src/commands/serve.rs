use crate::api::{CredentialSource, Credentials, Mode};
use crate::args::ServeArgs;
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{server, Config, Result};
use anyhow::Context;
use tracing::info;

/// Serves the HTTP trigger until ctrl-c. The configuration has already been loaded and, in Google
/// mode, the credentials are read before binding, so neither problem reaches the listener.
pub async fn serve(config: Config, mode: Mode, args: &ServeArgs) -> Result<Out<()>> {
    if mode == Mode::Google {
        check_credentials(&CredentialSource::from_env(&config)).await?;
    }
    server::serve(config, mode, args.bind(), args.port())
        .await
        .pub_result(ErrorType::Config)?;
    Ok("Shut down".into())
}

/// Loads the credentials from `source` once. A missing token or a malformed key is a
/// configuration error.
async fn check_credentials(source: &CredentialSource) -> Result<()> {
    let credentials = Credentials::load(source)
        .await
        .context("The server cannot start without usable Google credentials")
        .pub_result(ErrorType::Config)?;
    info!("Using {credentials:?}");
    Ok(())
}
