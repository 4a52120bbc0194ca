//! Service-account credentials: a JSON key that mints access tokens without a browser, for running
//! the HTTP trigger on a server.

use crate::api::files::EXPIRY_BUFFER_MINUTES;
use crate::api::OAUTH_SCOPES;
use crate::error::Res;
use crate::utils;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::fmt::{Debug, Formatter};
use std::path::Path;
use tracing::debug;
use yup_oauth2::{ServiceAccountAuthenticator, ServiceAccountKey};

/// Used when Google does not say how long a token lives.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// A parsed service-account key and the last access token it produced.
pub(crate) struct ServiceAccount {
    key: ServiceAccountKey,
    cached: Option<(String, DateTime<Utc>)>,
}

// The key holds a private key, so only the account name is printed.
impl Debug for ServiceAccount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.key.client_email)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Parses the JSON key downloaded from the Google Cloud console.
    pub(crate) fn from_json(json: &str) -> Res<Self> {
        let key = yup_oauth2::parse_service_account_key(json)
            .context("Unable to parse the service account key")?;
        anyhow::ensure!(
            !key.client_email.is_empty(),
            "The service account key has no client_email"
        );
        Ok(Self { key, cached: None })
    }

    pub(crate) async fn from_file(path: &Path) -> Res<Self> {
        let json = utils::read(path).await?;
        Self::from_json(&json)
            .with_context(|| format!("Invalid service account key file {}", path.display()))
    }

    /// The account the spreadsheet must be shared with.
    pub(crate) fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Returns an access token that is valid for at least a few more minutes.
    pub(crate) async fn token(&mut self) -> Res<String> {
        let now = Utc::now();
        if let Some((token, expires_at)) = &self.cached {
            if *expires_at > now + Duration::minutes(EXPIRY_BUFFER_MINUTES) {
                return Ok(token.clone());
            }
        }
        debug!("Minting an access token for {}", self.key.client_email);
        let authenticator = ServiceAccountAuthenticator::builder(self.key.clone())
            .build()
            .await
            .context("Unable to create the service account authenticator")?;
        let access = authenticator
            .token(OAUTH_SCOPES)
            .await
            .context("Unable to get an access token for the service account")?;
        let token = access
            .token()
            .context("Google returned an empty access token")?
            .to_string();
        let expires_at = access
            .expiration_time()
            .and_then(|t| DateTime::from_timestamp(t.unix_timestamp(), 0))
            .unwrap_or_else(|| now + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
        self.cached = Some((token.clone(), expires_at));
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::SERVICE_ACCOUNT_KEY as KEY_JSON;
    use tempfile::TempDir;

    #[test]
    fn test_parse_key() {
        let account = ServiceAccount::from_json(KEY_JSON).unwrap();
        assert_eq!(
            account.client_email(),
            "rollover@rollover-test.iam.gserviceaccount.com"
        );
        let printed = format!("{account:?}");
        assert!(printed.contains("rollover@rollover-test"));
        assert!(!printed.contains("PRIVATE KEY"));
    }

    #[test]
    fn test_parse_key_missing_fields() {
        assert!(ServiceAccount::from_json(r#"{"type": "service_account"}"#).is_err());
        assert!(ServiceAccount::from_json("not json").is_err());
    }

    #[tokio::test]
    async fn test_key_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service_account.json");
        utils::write(&path, KEY_JSON).await.unwrap();
        let account = ServiceAccount::from_file(&path).await.unwrap();
        assert!(account.client_email().starts_with("rollover@"));

        let missing = ServiceAccount::from_file(&dir.path().join("nope.json")).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let mut account = ServiceAccount::from_json(KEY_JSON).unwrap();
        account.cached = Some(("cached".to_string(), Utc::now() + Duration::minutes(30)));
        assert_eq!(account.token().await.unwrap(), "cached");
    }
}
