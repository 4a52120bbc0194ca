//! Configuration file handling.
//!
//! The configuration file is stored at `$ROLLOVER_HOME/config.json` and holds the Google Sheet URL,
//! the rollover settings (preset, predecessor policy, formula options) and the authentication file
//! paths.

use crate::error::Res;
use crate::rollover::{Preset, ResolutionPolicy};
use crate::utils;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "rollover";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const SERVICE_ACCOUNT_JSON: &str = "service_account.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$ROLLOVER_HOME` and from there it loads `$ROLLOVER_HOME/config.json`. It provides
/// paths to other items that are either configurable or are expected in a certain location within
/// the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
}

/// The settings `Config::create` writes into a new `config.json`.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub preset: Preset,
    pub policy: ResolutionPolicy,
    pub locale: Option<String>,
    pub secret_kind: SecretKind,
}

/// What kind of Google credentials file `Config::create` is given.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum SecretKind {
    /// An OAuth client secret. `rollover auth` must be run once in a browser.
    #[default]
    OAuthClient,
    /// A service-account key. No browser is ever needed.
    ServiceAccount,
}

impl Config {
    /// Creates the home directory and its `.secrets` subdirectory, writes an initial `config.json`
    /// for `sheet_url`, and moves `secret_file` into `.secrets/client_secret.json`.
    pub async fn create(
        dir: impl Into<PathBuf>,
        secret_file: &Path,
        sheet_url: &str,
        settings: Settings,
    ) -> Res<Self> {
        let spreadsheet_id = extract_spreadsheet_id(sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the rollover home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;

        let (file_name, service_account_key_path) = match settings.secret_kind {
            SecretKind::OAuthClient => (CLIENT_SECRET_JSON, None),
            SecretKind::ServiceAccount => (
                SERVICE_ACCOUNT_JSON,
                Some(PathBuf::from(SECRETS).join(SERVICE_ACCOUNT_JSON)),
            ),
        };
        let secret_destination = secrets_dir.join(file_name);
        utils::rename(secret_file, &secret_destination).await?;
        utils::restrict_permissions(&secret_destination)?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            sheet_url: sheet_url.to_string(),
            preset: settings.preset,
            policy: settings.policy,
            locale: settings.locale,
            service_account_key_path,
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets: secrets_dir,
            config_path,
            config_file,
            spreadsheet_id,
        })
    }

    /// This will
    /// - validate that `rollover_home` exists and that the config file exists
    /// - load the config file
    /// - validate that the secrets directory exists
    /// - return the loaded configuration object
    pub async fn load(rollover_home: impl Into<PathBuf>) -> Res<Self> {
        let maybe_relative = rollover_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The rollover home directory is missing, run 'rollover init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();
        if spreadsheet_id.is_empty() {
            bail!("The config file at '{}' has no sheet_url", config_path.display())
        }

        let secrets = root.join(SECRETS);
        if !secrets.is_dir() {
            bail!("The secrets directory is missing '{}'", secrets.display())
        }
        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            spreadsheet_id,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn preset(&self) -> Preset {
        self.config_file.preset
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.config_file.policy
    }

    pub fn guard_formulas(&self) -> bool {
        self.config_file.guard_formulas
    }

    pub fn aggregate_row(&self) -> bool {
        self.config_file.aggregate_row
    }

    /// A locale tag that overrides the one reported by the spreadsheet, e.g. `es_CO`.
    pub fn locale(&self) -> Option<&str> {
        self.config_file.locale.as_deref()
    }

    /// Returns the stored `client_secret_path` if it is absolute, otherwise resolves the relative
    /// path.
    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.client_secret_path())
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path.
    pub fn token_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.token_path())
    }

    /// The service-account key file, if the spreadsheet is accessed as a service account.
    pub fn service_account_key_path(&self) -> Option<PathBuf> {
        self.config_file
            .service_account_key_path
            .clone()
            .map(|p| self.resolve_secrets_file_path(p))
    }

    fn resolve_secrets_file_path(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "rollover",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "preset": "inventory",
///   "policy": "latest_date",
///   "guard_formulas": true,
///   "aggregate_row": false,
///   "locale": "es_CO",
///   "client_secret_path": ".secrets/client_secret.json",
///   "token_path": ".secrets/token.json",
///   "service_account_key_path": ".secrets/service_account.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "rollover"
    app_name: String,

    config_version: u8,

    /// URL of the Google Sheet that holds the dated sheets
    sheet_url: String,

    #[serde(default)]
    preset: Preset,

    #[serde(default)]
    policy: ResolutionPolicy,

    /// Wrap derived formulas in `IF` so that rows with missing inputs show blank
    #[serde(default = "default_true")]
    guard_formulas: bool,

    /// Append a `TOTAL` row with `SUM` formulas below the data
    #[serde(default)]
    aggregate_row: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    locale: Option<String>,

    /// Path to the OAuth 2.0 client credentials file (relative to config.json or absolute).
    /// Defaults to $ROLLOVER_HOME/.secrets/client_secret.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Path to the OAuth token file (relative to config.json or absolute).
    /// Defaults to $ROLLOVER_HOME/.secrets/token.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,

    /// Path to a service-account key (relative to config.json or absolute). When present it is
    /// used instead of the OAuth client and token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_account_key_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: String::new(),
            preset: Preset::default(),
            policy: ResolutionPolicy::default(),
            guard_formulas: true,
            aggregate_row: false,
            locale: None,
            client_secret_path: None,
            token_path: None,
            service_account_key_path: None,
        }
    }
}

impl ConfigFile {
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .with_context(|| format!("Unable to load the config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version == CONFIG_VERSION,
            "Unsupported config_version {}, expected {}",
            config.config_version,
            CONFIG_VERSION
        );

        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL, e.g.
/// `https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/edit`. Returns an empty string if the URL
/// is empty.
fn extract_spreadsheet_id(url: &str) -> Res<&str> {
    if url.is_empty() {
        return Ok(url);
    }

    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split(['?', '#'])
                .next()
                .unwrap_or(id_part);
            return Ok(id);
        }
    }
    Err(anyhow::anyhow!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const URL: &str =
        "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";

    #[tokio::test]
    async fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("rollover_home");
        let secret_source_file = dir.path().join("x.json");
        utils::write(&secret_source_file, "12345").await.unwrap();

        let settings = Settings {
            preset: Preset::Ledger,
            policy: ResolutionPolicy::LastTab,
            locale: Some("es_CO".to_string()),
            secret_kind: SecretKind::OAuthClient,
        };
        let config = Config::create(&home_dir, &secret_source_file, URL, settings)
            .await
            .unwrap();
        assert_eq!(URL, config.sheet_url());
        assert_eq!(
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
            config.spreadsheet_id()
        );
        assert!(config.secrets().is_dir());
        let found_secret_content = utils::read(&config.client_secret_path()).await.unwrap();
        assert_eq!("12345", found_secret_content);
        assert!(!secret_source_file.exists());

        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(loaded.preset(), Preset::Ledger);
        assert_eq!(loaded.policy(), ResolutionPolicy::LastTab);
        assert_eq!(loaded.locale(), Some("es_CO"));
        assert!(loaded.guard_formulas());
        assert!(!loaded.aggregate_row());
        assert_eq!(loaded.token_path(), loaded.root().join(SECRETS).join(TOKEN_JSON));
        assert_eq!(loaded.config_path(), loaded.root().join(CONFIG_JSON));
        assert_eq!(loaded.service_account_key_path(), None);
    }

    #[tokio::test]
    async fn test_config_create_with_service_account() {
        let dir = TempDir::new().unwrap();
        let key = dir.path().join("key.json");
        utils::write(&key, "{}").await.unwrap();
        let settings = Settings {
            secret_kind: SecretKind::ServiceAccount,
            ..Settings::default()
        };
        let config = Config::create(dir.path().join("home"), &key, URL, settings)
            .await
            .unwrap();
        let expected = config.root().join(SECRETS).join(SERVICE_ACCOUNT_JSON);
        assert_eq!(config.service_account_key_path(), Some(expected.clone()));
        assert!(expected.is_file());
        assert!(!config.client_secret_path().exists());

        let loaded = Config::load(config.root()).await.unwrap();
        assert_eq!(loaded.service_account_key_path(), Some(expected));
    }

    #[tokio::test]
    async fn test_config_create_bad_url_leaves_secret() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("x.json");
        utils::write(&secret, "{}").await.unwrap();
        let result = Config::create(
            dir.path().join("home"),
            &secret,
            "https://example.com/invalid",
            Settings::default(),
        )
        .await;
        assert!(result.is_err());
        assert!(secret.exists());
    }

    #[tokio::test]
    async fn test_config_load_missing() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(dir.path().join("nope")).await.is_err());
        let message = format!("{:#}", Config::load(dir.path()).await.unwrap_err());
        assert!(message.contains("The config file is missing"));
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "rollover",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/minimal"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(
            config,
            ConfigFile {
                sheet_url: "https://docs.google.com/spreadsheets/d/minimal".to_string(),
                ..ConfigFile::default()
            }
        );
        assert_eq!(
            config.client_secret_path(),
            PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON)
        );
        assert_eq!(config.token_path(), PathBuf::from(SECRETS).join(TOKEN_JSON));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/test"
        }"#;
        utils::write(&config_path, json).await.unwrap();
        let message = ConfigFile::load(&config_path).await.unwrap_err().to_string();
        assert!(message.contains("Invalid app_name"));

        let json = r#"{
            "app_name": "rollover",
            "config_version": 1,
            "sheet_url": "https://docs.google.com/spreadsheets/d/test",
            "policy": "newest"
        }"#;
        utils::write(&config_path, json).await.unwrap();
        assert!(ConfigFile::load(&config_path).await.is_err());
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let original = ConfigFile {
            sheet_url: "https://docs.google.com/spreadsheets/d/test123".to_string(),
            preset: Preset::Ledger,
            guard_formulas: false,
            aggregate_row: true,
            client_secret_path: Some(PathBuf::from("/abs/client_secret.json")),
            ..ConfigFile::default()
        };
        original.save(&config_path).await.unwrap();
        let json = utils::read(&config_path).await.unwrap();
        assert!(json.contains(r#""preset": "ledger""#));
        assert!(!json.contains("token_path"));
        assert!(!json.contains("locale"));
        assert_eq!(original, ConfigFile::load(&config_path).await.unwrap());
    }

    #[test]
    fn test_extract_spreadsheet_id() {
        let id = extract_spreadsheet_id(URL).unwrap();
        assert_eq!(id, "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL");
        let with_query = "https://docs.google.com/spreadsheets/d/ABC123?foo=bar";
        assert_eq!(extract_spreadsheet_id(with_query).unwrap(), "ABC123");
        let with_fragment = "https://docs.google.com/spreadsheets/d/ABC123#gid=0";
        assert_eq!(extract_spreadsheet_id(with_fragment).unwrap(), "ABC123");
        assert!(extract_spreadsheet_id("https://example.com/invalid").is_err());
        assert_eq!(extract_spreadsheet_id("").unwrap(), "");
    }
}
