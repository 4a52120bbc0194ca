//! Authentication command handlers for the OAuth flow.
//!
//! - `rollover auth` - Initial OAuth consent flow
//! - `rollover auth --verify` - Verify and refresh authentication

use crate::api::{CredentialSource, Credentials, TokenProvider};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;

/// Handles the `rollover auth` command. This is the only command that needs a browser.
///
/// 1. Loads `client_secret.json`
/// 2. Prints the Google consent URL and waits for the redirect on a local port
/// 3. Saves tokens to `token.json` with owner-only permissions
pub async fn auth(config: &Config) -> Result<Out<()>> {
    let token_provider = TokenProvider::initialize(config.client_secret_path(), config.token_path())
        .await
        .pub_result(ErrorType::Auth)?;
    Ok(format!(
        "Authorization complete, the access token is valid until {}",
        token_provider.expires_at()
    )
    .into())
}

/// Handles the `rollover auth --verify` command. It never opens a browser: it refreshes the saved
/// token and fails with instructions to run `rollover auth` if that is not possible. With a
/// service-account key it mints a fresh access token instead.
pub async fn auth_verify(config: &Config) -> Result<Out<()>> {
    let source = CredentialSource::from_env(config);
    if !matches!(source, CredentialSource::InstalledApp { .. }) {
        return verify_service_account(&source).await;
    }
    let mut token_provider = TokenProvider::load(config.client_secret_path(), config.token_path())
        .await
        .context(
            "Unable to use the existing tokens found in the token JSON file. \n\n\
            You should run 'rollover auth' (without the --verify flag).",
        )
        .pub_result(ErrorType::Auth)?;
    token_provider
        .refresh()
        .await
        .context("Unable to refresh the token")
        .pub_result(ErrorType::Auth)?;
    Ok(format!(
        "Your OAuth token is valid until {}",
        token_provider.expires_at()
    )
    .into())
}

async fn verify_service_account(source: &CredentialSource) -> Result<Out<()>> {
    let mut credentials = Credentials::load(source).await.pub_result(ErrorType::Auth)?;
    credentials
        .token()
        .await
        .context("Unable to get an access token for the service account")
        .pub_result(ErrorType::Auth)?;
    Ok(format!("{credentials:?} can access Google Sheets").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_auth_verify_without_token() {
        let env = TestEnv::new().await;
        let err = auth_verify(&env.config()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Auth);
        assert!(err.to_string().contains("rollover auth"));
    }

    #[tokio::test]
    async fn test_verify_bad_service_account_key() {
        let source = CredentialSource::ServiceAccountJson("not json".to_string());
        let err = verify_service_account(&source).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Auth);
    }
}
