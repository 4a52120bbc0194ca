//! Chooses between the two ways of getting access tokens: the OAuth installed-app flow (`rollover
//! auth` plus a saved `token.json`) or a service-account key.

use crate::api::service_account::ServiceAccount;
use crate::api::TokenProvider;
use crate::error::Res;
use crate::Config;
use anyhow::Context;
use std::path::PathBuf;

/// Environment variable holding a service-account key as JSON. It wins over `config.json`.
pub const GOOGLE_CREDENTIALS_ENV: &str = "GOOGLE_CREDENTIALS";

/// Where the credentials come from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum CredentialSource {
    /// A service-account key passed in `GOOGLE_CREDENTIALS`.
    ServiceAccountJson(String),
    /// A service-account key file named by `service_account_key_path` in `config.json`.
    ServiceAccountFile(PathBuf),
    /// An OAuth client secret and the token saved by `rollover auth`.
    InstalledApp {
        secret_path: PathBuf,
        token_path: PathBuf,
    },
}

impl CredentialSource {
    /// Selects the source for `config`, looking at `GOOGLE_CREDENTIALS` first.
    pub(crate) fn from_env(config: &Config) -> Self {
        Self::select(config, std::env::var(GOOGLE_CREDENTIALS_ENV).ok())
    }

    /// A non-empty `google_credentials` takes precedence, then a configured key file, then the
    /// installed-app files.
    pub(crate) fn select(config: &Config, google_credentials: Option<String>) -> Self {
        match google_credentials {
            Some(json) if !json.trim().is_empty() => CredentialSource::ServiceAccountJson(json),
            _ => match config.service_account_key_path() {
                Some(path) => CredentialSource::ServiceAccountFile(path),
                None => CredentialSource::InstalledApp {
                    secret_path: config.client_secret_path(),
                    token_path: config.token_path(),
                },
            },
        }
    }
}

/// Loaded credentials that can hand out access tokens.
#[derive(Debug)]
pub(crate) enum Credentials {
    InstalledApp(TokenProvider),
    ServiceAccount(ServiceAccount),
}

impl Credentials {
    /// Reads and validates the credentials from `source`. This touches only local files and the
    /// environment, never the network.
    pub(crate) async fn load(source: &CredentialSource) -> Res<Self> {
        match source {
            CredentialSource::ServiceAccountJson(json) => Ok(Credentials::ServiceAccount(
                ServiceAccount::from_json(json)
                    .with_context(|| format!("Invalid key in {GOOGLE_CREDENTIALS_ENV}"))?,
            )),
            CredentialSource::ServiceAccountFile(path) => Ok(Credentials::ServiceAccount(
                ServiceAccount::from_file(path).await?,
            )),
            CredentialSource::InstalledApp {
                secret_path,
                token_path,
            } => Ok(Credentials::InstalledApp(
                TokenProvider::load(secret_path, token_path).await?,
            )),
        }
    }

    /// Returns an access token that is valid for at least a few more minutes.
    pub(crate) async fn token(&mut self) -> Res<String> {
        match self {
            Credentials::InstalledApp(token_provider) => token_provider.token().await,
            Credentials::ServiceAccount(account) => account.token().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::SERVICE_ACCOUNT_KEY as KEY_JSON;
    use crate::test::TestEnv;
    use crate::utils;

    #[tokio::test]
    async fn test_select_installed_app_by_default() {
        let env = TestEnv::new().await;
        let config = env.config();
        assert_eq!(
            CredentialSource::select(&config, None),
            CredentialSource::InstalledApp {
                secret_path: config.client_secret_path(),
                token_path: config.token_path(),
            }
        );
        // Blank values are ignored.
        assert!(matches!(
            CredentialSource::select(&config, Some("  ".to_string())),
            CredentialSource::InstalledApp { .. }
        ));
    }

    #[tokio::test]
    async fn test_select_environment_key() {
        let env = TestEnv::new().await;
        let source = CredentialSource::select(&env.config(), Some(KEY_JSON.to_string()));
        assert_eq!(source, CredentialSource::ServiceAccountJson(KEY_JSON.to_string()));

        let credentials = Credentials::load(&source).await.unwrap();
        assert!(matches!(credentials, Credentials::ServiceAccount(_)));
    }

    #[tokio::test]
    async fn test_select_configured_key_file() {
        let env = TestEnv::with_service_account(KEY_JSON).await;
        let config = env.config();
        let path = config.service_account_key_path().unwrap();
        assert_eq!(
            CredentialSource::select(&config, None),
            CredentialSource::ServiceAccountFile(path.clone())
        );
        assert_eq!(utils::read(&path).await.unwrap(), KEY_JSON);

        let credentials = Credentials::load(&CredentialSource::select(&config, None))
            .await
            .unwrap();
        match credentials {
            Credentials::ServiceAccount(account) => {
                assert!(account.client_email().starts_with("rollover@"))
            }
            other => panic!("unexpected credentials {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_installed_app_without_token() {
        let env = TestEnv::new().await;
        let err = Credentials::load(&CredentialSource::select(&env.config(), None))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("rollover auth"));
    }

    #[tokio::test]
    async fn test_load_bad_environment_key() {
        let err = Credentials::load(&CredentialSource::ServiceAccountJson("{}".to_string()))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains(GOOGLE_CREDENTIALS_ENV));
    }
}
