//! Serialization and deserialization structures for Google OAuth credential files.
//! - `client_secret.json`: OAuth 2.0 client credentials from Google Cloud Console
//! - `token.json`: the access and refresh tokens obtained by `rollover auth`

use crate::api::OAUTH_SCOPES;
use crate::error::Res;
use crate::utils;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// This redirect needs to be present in the OAuth credential file, or else OAuth will not work.
pub(super) const REDIRECT: &str = "http://localhost";

/// A token this close to its expiry is treated as expired.
pub(super) const EXPIRY_BUFFER_MINUTES: i64 = 5;

/// Holds the `path` of a JSON file and its deserialized `data` between load and save.
#[derive(Default, Debug, Clone)]
pub(super) struct File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    path: PathBuf,
    data: F,
}

impl<F> File<F>
where
    F: Serialize + DeserializeOwned + Clone + Debug,
{
    pub(super) async fn load(path: impl Into<PathBuf>) -> Res<Self> {
        let path = path.into();
        let data: F = utils::deserialize(&path).await?;
        Ok(Self { path, data })
    }

    pub(super) fn new(path: impl Into<PathBuf>, data: F) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Writes the data back to `path`, readable only by the owner.
    pub(super) async fn save(&self) -> Res<()> {
        let json =
            serde_json::to_string_pretty(&self.data).context("Failed to serialize data to JSON")?;
        utils::write(&self.path, json).await?;
        utils::restrict_permissions(&self.path)
    }

    pub(super) fn data(&self) -> &F {
        &self.data
    }

    pub(super) fn data_mut(&mut self) -> &mut F {
        &mut self.data
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }
}

/// Represents the structure of the `client_secret.json` file downloaded from Google Cloud Console.
///
/// This file contains OAuth 2.0 Desktop Application credentials. The standard format from Google
/// has an "installed" wrapper around the actual credentials.
///
/// Example:
/// ```json
/// {
///   "installed": {
///     "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
///     "client_secret": "YOUR_CLIENT_SECRET",
///     "redirect_uris": ["http://localhost"],
///     "auth_uri": "https://accounts.google.com/o/oauth2/auth",
///     "token_uri": "https://oauth2.googleapis.com/token"
///   }
/// }
/// ```
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct SecretFile {
    installed: InstalledCredentials,
}

impl SecretFile {
    pub(crate) async fn load(path: &Path) -> Res<SecretFile> {
        utils::deserialize(path).await.with_context(|| {
            format!(
                "Unable to read the OAuth client secret file at {}",
                path.display()
            )
        })
    }

    pub(super) fn client_id(&self) -> &str {
        &self.installed.client_id
    }

    pub(super) fn client_secret(&self) -> &str {
        &self.installed.client_secret
    }

    pub(super) fn auth_uri(&self) -> &str {
        &self.installed.auth_uri
    }

    pub(super) fn token_uri(&self) -> &str {
        &self.installed.token_uri
    }
}

/// The actual OAuth credentials nested within the `client_secret.json` file.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct InstalledCredentials {
    client_id: String,
    client_secret: String,

    /// Must contain "http://localhost" (without a port number). Google accepts any loopback port
    /// at consent time when this is registered.
    redirect_uris: RedirectUris,

    auth_uri: String,
    token_uri: String,
}

#[derive(Default, Debug, Clone)]
struct RedirectUris(Vec<String>);

impl Serialize for RedirectUris {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RedirectUris {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<String>::deserialize(deserializer)?;
        if !vec.iter().any(|s| is_valid_redirect(s)) {
            return Err(D::Error::custom(format!(
                "At least one of the redirects needs to be {REDIRECT}, but this was not found. \
                When creating the redirect URI for your Google API Key, you must include \
                '{REDIRECT}'"
            )));
        }
        Ok(RedirectUris(vec))
    }
}

fn is_valid_redirect(s: &str) -> bool {
    s == REDIRECT || s == "http://127.0.0.1"
}

/// How we save the token information received from Google OAuth.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct TokenFile {
    scopes: Vec<String>,
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl TokenFile {
    pub(super) fn new(
        scopes: Vec<String>,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            scopes,
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// Fails when a scope the rollover needs was not granted.
    pub(super) fn validate_scopes(&self) -> Res<()> {
        let found_scopes: HashSet<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        for &required_scope in OAUTH_SCOPES {
            if !found_scopes.contains(required_scope) {
                bail!("OAuth scope '{required_scope}' is missing, run 'rollover auth' again");
            }
        }
        Ok(())
    }

    pub(super) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(super) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub(super) fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token is expired or will expire within five minutes of `now`.
    pub(super) fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + chrono::Duration::minutes(EXPIRY_BUFFER_MINUTES)
    }

    pub(super) fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Google only sometimes rotates the refresh token, so `refresh_token` is optional.
    pub(super) fn update(
        &mut self,
        access_token: String,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expires_at = expires_at;
        if let Some(rt) = refresh_token {
            self.refresh_token = rt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_secret(redirects: &str) -> (TempDir, PathBuf) {
        let json_data = format!(
            r#"
{{
    "installed": {{
        "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
        "client_secret": "YOUR_CLIENT_SECRET",
        "redirect_uris": {redirects},
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token"
    }}
}}
"#
        );
        let temp_dir = TempDir::new().unwrap();
        let p = temp_dir.path().join("client_secret.json");
        utils::write(&p, json_data).await.unwrap();
        (temp_dir, p)
    }

    #[tokio::test]
    async fn test_client_secret_good_redirect() {
        let (_dir, p) =
            write_secret(r#"["http://localhost", "https://example.com:4040/whatever"]"#).await;
        let secret_file = SecretFile::load(&p).await.unwrap();
        assert_eq!(
            secret_file.client_id(),
            "YOUR_CLIENT_ID.apps.googleusercontent.com"
        );
        assert_eq!(secret_file.token_uri(), "https://oauth2.googleapis.com/token");
    }

    #[tokio::test]
    async fn test_client_secret_loopback_ip_redirect() {
        let (_dir, p) = write_secret(r#"["http://127.0.0.1"]"#).await;
        assert!(SecretFile::load(&p).await.is_ok());
    }

    #[tokio::test]
    async fn test_client_secret_bad_redirect() {
        let (_dir, p) = write_secret(r#"["http://localhost:9900"]"#).await;
        let parse_error = SecretFile::load(&p).await.err().unwrap();
        let parse_error_message = format!("{parse_error:?}");
        assert!(
            parse_error_message.contains("At least one of the redirects needs to be http://localhost")
        );
    }

    fn token(scopes: &[&str], expires_at: DateTime<Utc>) -> TokenFile {
        TokenFile::new(
            scopes.iter().map(|s| s.to_string()).collect(),
            "abc12".to_string(),
            "xyz89".to_string(),
            expires_at,
        )
    }

    #[test]
    fn test_validate_scopes() {
        let now = Utc::now();
        assert!(token(OAUTH_SCOPES, now).validate_scopes().is_ok());
        let message = token(&["https://www.googleapis.com/auth/drive.readonly"], now)
            .validate_scopes()
            .unwrap_err()
            .to_string();
        assert!(message.contains("https://www.googleapis.com/auth/spreadsheets"));
    }

    #[test]
    fn test_expiry_buffer() {
        let now = Utc::now();
        assert!(token(OAUTH_SCOPES, now + chrono::Duration::minutes(4)).is_expired_at(now));
        assert!(token(OAUTH_SCOPES, now - chrono::Duration::minutes(1)).is_expired_at(now));
        assert!(!token(OAUTH_SCOPES, now + chrono::Duration::minutes(6)).is_expired_at(now));
    }

    #[test]
    fn test_update_keeps_refresh_token() {
        let now = Utc::now();
        let mut t = token(OAUTH_SCOPES, now);
        t.update("new".to_string(), now + chrono::Duration::hours(1), None);
        assert_eq!(t.access_token(), "new");
        assert_eq!(t.refresh_token(), "xyz89");
        t.update("newer".to_string(), now, Some("rotated".to_string()));
        assert_eq!(t.refresh_token(), "rotated");
    }

    #[tokio::test]
    async fn test_token_file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("token.json");
        let expires_at = Utc::now();
        let file = File::new(&p, token(OAUTH_SCOPES, expires_at));
        file.save().await.unwrap();
        let loaded: File<TokenFile> = File::load(&p).await.unwrap();
        assert_eq!(loaded.data().access_token(), "abc12");
        assert_eq!(loaded.data().expires_at(), expires_at);
        assert_eq!(loaded.path(), p.as_path());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&p).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
