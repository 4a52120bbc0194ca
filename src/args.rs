//! These structs provide the CLI interface for the rollover CLI.

use crate::config::SecretKind;
use crate::rollover::{Preset, ResolutionPolicy};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// rollover: creates today's sheet in a spreadsheet of dated inventory or loan sheets.
///
/// Every day the ledger gets a new sheet named for the date (e.g. 2025-06-02). Its rows are carried
/// forward from the most recent dated sheet: yesterday's closing stock or balance becomes today's
/// opening value, daily counters are reset to zero, and the derived columns get formulas written
/// in the spreadsheet's own locale.
///
/// You will need a Google Cloud OAuth client (a "Desktop app" client_secret.json) with the Sheets
/// API enabled. Run `rollover init`, then `rollover auth`, then `rollover run` or
/// `rollover serve`. On a server, use a service-account key instead: pass it to
/// `rollover init --service-account-key` or put its JSON in GOOGLE_CREDENTIALS, and share the
/// spreadsheet with the service account's email.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file.
    ///
    /// This is the first command you should run. You need the URL of your spreadsheet and the
    /// downloaded OAuth client credentials file. The credentials are moved into
    /// $ROLLOVER_HOME/.secrets.
    Init(InitArgs),
    /// Authenticate with Google Sheets via OAuth.
    Auth(AuthArgs),
    /// Create today's sheet (or the sheet for --date) once and exit.
    Run(RunArgs),
    /// List the sheets of the spreadsheet and show which one would be rolled forward.
    Sheets,
    /// Print the formulas a rollover would write, without touching any spreadsheet.
    Formulas(FormulasArgs),
    /// Serve the web page and the POST endpoint that trigger a rollover.
    Serve(ServeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration and credentials are held. Defaults to ~/rollover
    #[arg(long, env = "ROLLOVER_HOME", default_value_t = default_rollover_home())]
    rollover_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, rollover_home: PathBuf) -> Self {
        Self {
            log_level,
            rollover_home: rollover_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn rollover_home(&self) -> &DisplayPath {
        &self.rollover_home
    }
}

/// (Not shown): Args for the `rollover init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL of your Google sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,

    /// The path to your downloaded OAuth client credentials. This file will be moved to the
    /// secrets location in the main data directory.
    #[arg(long, required_unless_present = "service_account_key")]
    client_secret: Option<PathBuf>,

    /// The path to a downloaded service-account key. Use this instead of --client-secret when no
    /// browser is available. The file is moved like the client secret and `rollover auth` is not
    /// needed.
    #[arg(long, conflicts_with = "client_secret")]
    service_account_key: Option<PathBuf>,

    /// The kind of ledger kept in the spreadsheet.
    #[arg(long, value_enum, default_value_t = Preset::Inventory)]
    preset: Preset,

    /// How to choose the sheet that today's sheet is rolled forward from.
    #[arg(long, value_enum, default_value_t = ResolutionPolicy::LatestDate)]
    policy: ResolutionPolicy,

    /// Use this locale for formulas instead of the one the spreadsheet reports, e.g. es_CO.
    #[arg(long)]
    locale: Option<String>,
}

impl InitArgs {
    pub fn new(sheet_url: impl Into<String>, client_secret: impl Into<PathBuf>) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            client_secret: Some(client_secret.into()),
            service_account_key: None,
            preset: Preset::default(),
            policy: ResolutionPolicy::default(),
            locale: None,
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    /// Uses a service-account key in place of the OAuth client secret.
    pub fn with_service_account_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_secret = None;
        self.service_account_key = Some(path.into());
        self
    }

    /// The credentials file to move into the data directory and what kind of file it is.
    pub fn secret(&self) -> Option<(&Path, SecretKind)> {
        match (&self.service_account_key, &self.client_secret) {
            (Some(key), _) => Some((key, SecretKind::ServiceAccount)),
            (None, Some(secret)) => Some((secret, SecretKind::OAuthClient)),
            (None, None) => None,
        }
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }
}

/// (Not shown): Args for the `rollover auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh authentication without opening a browser.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// (Not shown): Args for the `rollover run` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct RunArgs {
    /// The date of the sheet to create, YYYY-MM-DD. Defaults to today's local date.
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl RunArgs {
    pub fn new(date: Option<NaiveDate>) -> Self {
        Self { date }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// (Not shown): Args for the `rollover formulas` command.
#[derive(Debug, Parser, Clone)]
pub struct FormulasArgs {
    /// How many data rows to generate formulas for.
    #[arg(long, default_value_t = 3)]
    rows: usize,

    /// The spreadsheet locale, e.g. en_US or es_CO.
    #[arg(long, default_value = "en_US")]
    locale: String,

    #[arg(long, value_enum, default_value_t = Preset::Inventory)]
    preset: Preset,

    /// Write the bare expressions instead of wrapping them in IF guards.
    #[arg(long)]
    unguarded: bool,

    /// Include the TOTAL row.
    #[arg(long)]
    aggregate: bool,

    /// The predecessor sheet referenced by ledger formulas. Defaults to the day before --date.
    #[arg(long)]
    predecessor: Option<String>,

    /// The date of the new sheet. Defaults to today's local date.
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl FormulasArgs {
    pub fn new(rows: usize, locale: impl Into<String>, preset: Preset) -> Self {
        Self {
            rows,
            locale: locale.into(),
            preset,
            unguarded: false,
            aggregate: false,
            predecessor: None,
            date: None,
        }
    }

    pub fn with_unguarded(mut self, unguarded: bool) -> Self {
        self.unguarded = unguarded;
        self
    }

    pub fn with_aggregate(mut self, aggregate: bool) -> Self {
        self.aggregate = aggregate;
        self
    }

    pub fn with_predecessor(mut self, predecessor: impl Into<String>, date: NaiveDate) -> Self {
        self.predecessor = Some(predecessor.into());
        self.date = Some(date);
        self
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn unguarded(&self) -> bool {
        self.unguarded
    }

    pub fn aggregate(&self) -> bool {
        self.aggregate
    }

    pub fn predecessor(&self) -> Option<&str> {
        self.predecessor.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// (Not shown): Args for the `rollover serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The port to listen on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// The address to bind to.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,
}

impl ServeArgs {
    pub fn new(bind: impl Into<String>, port: u16) -> Self {
        Self {
            port,
            bind: bind.into(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn bind(&self) -> &str {
        &self.bind
    }
}

fn default_rollover_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("rollover"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --rollover-home or ROLLOVER_HOME instead of relying on the \
                default home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("rollover")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from([
            "rollover",
            "--rollover-home",
            "/tmp/r",
            "run",
            "--date",
            "2025-06-02",
        ])
        .unwrap();
        assert_eq!(args.common().rollover_home().path(), Path::new("/tmp/r"));
        match args.command() {
            Command::Run(run) => {
                assert_eq!(run.date(), NaiveDate::from_ymd_opt(2025, 6, 2));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_init_enums() {
        let args = Args::try_parse_from([
            "rollover",
            "init",
            "--sheet-url",
            "https://docs.google.com/spreadsheets/d/abc",
            "--client-secret",
            "secret.json",
            "--preset",
            "ledger",
            "--policy",
            "last-tab",
        ])
        .unwrap();
        match args.command() {
            Command::Init(init) => {
                assert_eq!(init.preset(), Preset::Ledger);
                assert_eq!(init.policy(), ResolutionPolicy::LastTab);
                assert_eq!(init.locale(), None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_init_service_account() {
        let args = Args::try_parse_from([
            "rollover",
            "init",
            "--sheet-url",
            "https://docs.google.com/spreadsheets/d/abc",
            "--service-account-key",
            "key.json",
        ])
        .unwrap();
        match args.command() {
            Command::Init(init) => assert_eq!(
                init.secret(),
                Some((Path::new("key.json"), SecretKind::ServiceAccount))
            ),
            other => panic!("unexpected command {other:?}"),
        }

        let both = Args::try_parse_from([
            "rollover",
            "init",
            "--sheet-url",
            "https://docs.google.com/spreadsheets/d/abc",
            "--client-secret",
            "secret.json",
            "--service-account-key",
            "key.json",
        ]);
        assert!(both.is_err());

        let neither = Args::try_parse_from([
            "rollover",
            "init",
            "--sheet-url",
            "https://docs.google.com/spreadsheets/d/abc",
        ]);
        assert!(neither.is_err());
    }

    #[test]
    fn test_parse_formulas_defaults() {
        let args = Args::try_parse_from(["rollover", "--log-level", "debug", "formulas"]).unwrap();
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        match args.command() {
            Command::Formulas(f) => {
                assert_eq!(f.rows(), 3);
                assert_eq!(f.locale(), "en_US");
                assert!(!f.unguarded());
                assert!(f.predecessor().is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_bad_date_is_rejected() {
        assert!(Args::try_parse_from(["rollover", "run", "--date", "June 2"]).is_err());
    }
}
