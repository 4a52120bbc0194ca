//! OAuth 2.0 for the Google Sheets API.
//!
//! `TokenProvider::initialize` runs the installed-app consent flow once, with a short-lived local
//! callback server, and saves the tokens to `token.json`. Afterwards `TokenProvider::load` reads
//! the tokens back and refreshes the access token whenever it is about to expire.

use crate::api::files::{File, SecretFile, TokenFile, REDIRECT};
use crate::api::OAUTH_SCOPES;
use crate::error::Res;
use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Utc};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::convert::Infallible;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long `rollover auth` waits for the browser to come back with a code.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Used when Google does not say how long a token lives.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Hands out valid access tokens, refreshing and persisting them as needed.
#[derive(Debug)]
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: File<TokenFile>,
}

impl TokenProvider {
    /// Loads the client secret and a token previously saved by `initialize`.
    pub(crate) async fn load(
        secret_path: impl AsRef<Path>,
        token_path: impl AsRef<Path>,
    ) -> Res<Self> {
        let secret = SecretFile::load(secret_path.as_ref()).await?;
        let token: File<TokenFile> = File::load(token_path.as_ref())
            .await
            .context("No usable OAuth token found, run 'rollover auth' first")?;
        token.data().validate_scopes()?;
        Ok(Self { secret, token })
    }

    /// Runs the consent flow in the user's browser and saves the resulting token to `token_path`.
    pub(crate) async fn initialize(
        secret_path: impl AsRef<Path>,
        token_path: impl AsRef<Path>,
    ) -> Res<Self> {
        let secret = SecretFile::load(secret_path.as_ref()).await?;

        // Google accepts any port on a registered loopback redirect.
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .context("Unable to start the local OAuth callback server")?;
        let port = listener.local_addr()?.port();
        let redirect = format!("{REDIRECT}:{port}");
        let client = oauth_client(&secret, Some(&redirect))?;
        let (auth_url, csrf, verifier) = authorization_url(&client);

        info!("Open this URL in your browser to grant access to your spreadsheets:");
        eprintln!("\n{auth_url}\n");
        info!("Waiting for the authorization callback on {redirect}");

        let code = wait_for_code(listener, csrf.secret()).await?;
        let http_client = http_client()?;
        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(verifier)
            .request_async(&http_client)
            .await
            .map_err(|e| anyhow!("Unable to exchange the authorization code: {e}"))?;

        let refresh_token = response
            .refresh_token()
            .map(|t| t.secret().clone())
            .context("Google did not return a refresh token")?;
        let scopes = match response.scopes() {
            Some(scopes) => scopes.iter().map(|s| s.as_str().to_string()).collect(),
            None => OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
        };
        let token = File::new(
            token_path.as_ref(),
            TokenFile::new(
                scopes,
                response.access_token().secret().clone(),
                refresh_token,
                expires_at(response.expires_in()),
            ),
        );
        token.data().validate_scopes()?;
        token.save().await?;
        info!("Tokens saved to {}", token.path().display());
        Ok(Self { secret, token })
    }

    /// Returns an access token that is valid for at least a few more minutes.
    pub(crate) async fn token(&mut self) -> Res<String> {
        if self.token.data().is_expired() {
            self.refresh().await?;
        }
        Ok(self.token.data().access_token().to_string())
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub(crate) async fn refresh(&mut self) -> Res<()> {
        debug!("Refreshing the OAuth access token");
        let client = oauth_client(&self.secret, None)?;
        let http_client = http_client()?;
        let response = client
            .exchange_refresh_token(&RefreshToken::new(
                self.token.data().refresh_token().to_string(),
            ))
            .request_async(&http_client)
            .await
            .map_err(|e| {
                anyhow!("Unable to refresh the OAuth token, run 'rollover auth' again: {e}")
            })?;
        self.token.data_mut().update(
            response.access_token().secret().clone(),
            expires_at(response.expires_in()),
            response.refresh_token().map(|t| t.secret().clone()),
        );
        self.token.save().await
    }

    pub(crate) fn expires_at(&self) -> DateTime<Utc> {
        self.token.data().expires_at()
    }
}

fn oauth_client(secret: &SecretFile, redirect: Option<&str>) -> Res<OAuthClient> {
    let client = BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string()).context("Invalid auth_uri")?)
        .set_token_uri(TokenUrl::new(secret.token_uri().to_string()).context("Invalid token_uri")?);
    Ok(match redirect {
        Some(redirect) => client
            .set_redirect_uri(RedirectUrl::new(redirect.to_string()).context("Invalid redirect")?),
        None => client,
    })
}

/// `offline` access with a forced consent prompt so that Google always returns a refresh token.
fn authorization_url(client: &OAuthClient) -> (url::Url, CsrfToken, PkceCodeVerifier) {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (url, csrf) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(OAUTH_SCOPES.iter().map(|s| Scope::new(s.to_string())))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(challenge)
        .url();
    (url, csrf, verifier)
}

fn http_client() -> Res<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Unable to build the HTTP client")
}

fn expires_at(expires_in: Option<Duration>) -> DateTime<Utc> {
    let secs = expires_in
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    Utc::now() + chrono::Duration::seconds(secs)
}

/// Serves the OAuth callback until a request carrying a code or an error arrives.
async fn wait_for_code(listener: TcpListener, expected_state: &str) -> Res<String> {
    let (tx, mut rx) = mpsc::channel::<Callback>(1);
    let server = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let service = service_fn(move |request: Request<Incoming>| {
                    let tx = tx.clone();
                    async move { Ok::<_, Infallible>(callback_response(request, &tx).await) }
                });
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!("OAuth callback connection error: {e}");
                }
            });
        }
    });

    let received = tokio::time::timeout(CONSENT_TIMEOUT, rx.recv()).await;
    server.abort();
    let callback = received
        .context("Timed out waiting for the OAuth callback")?
        .context("The OAuth callback server stopped unexpectedly")?;
    match callback {
        Callback::Code { code, state } if state == expected_state => Ok(code),
        Callback::Code { .. } => bail!("The OAuth callback carried an unexpected state"),
        Callback::Denied(reason) => bail!("Authorization was denied: {reason}"),
    }
}

async fn callback_response(
    request: Request<Incoming>,
    tx: &mpsc::Sender<Callback>,
) -> Response<String> {
    let Some(callback) = parse_callback(request.uri().query().unwrap_or_default()) else {
        let mut response = Response::new(String::from("Not found"));
        *response.status_mut() = StatusCode::NOT_FOUND;
        return response;
    };
    let body = match &callback {
        Callback::Code { .. } => "Authorization complete. You can close this window.",
        Callback::Denied(_) => "Authorization failed. Check the terminal for details.",
    };
    if tx.send(callback).await.is_err() {
        warn!("Received an OAuth callback after the flow had finished");
    }
    Response::new(body.to_string())
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Callback {
    Code { code: String, state: String },
    Denied(String),
}

/// Reads `code` and `state`, or `error`, from the callback query string. Other requests (the
/// browser asking for a favicon, say) yield `None`.
fn parse_callback(query: &str) -> Option<Callback> {
    let mut code = None;
    let mut state = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Some(Callback::Denied(value.into_owned())),
            _ => {}
        }
    }
    Some(Callback::Code {
        code: code?,
        state: state.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretFile {
        serde_json::from_str(
            r#"{"installed": {
                "client_id": "id.apps.googleusercontent.com",
                "client_secret": "shh",
                "redirect_uris": ["http://localhost"],
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_authorization_url() {
        let client = oauth_client(&secret(), Some("http://localhost:4321")).unwrap();
        let (url, csrf, _) = authorization_url(&client);
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(get("client_id"), Some("id.apps.googleusercontent.com"));
        assert_eq!(get("redirect_uri"), Some("http://localhost:4321"));
        assert_eq!(get("scope"), Some(OAUTH_SCOPES[0]));
        assert_eq!(get("access_type"), Some("offline"));
        assert_eq!(get("code_challenge_method"), Some("S256"));
        assert_eq!(get("state"), Some(csrf.secret().as_str()));
    }

    #[test]
    fn test_parse_callback() {
        assert_eq!(
            parse_callback("state=abc&code=4%2F0Ab&scope=x"),
            Some(Callback::Code {
                code: "4/0Ab".to_string(),
                state: "abc".to_string()
            })
        );
        assert_eq!(
            parse_callback("error=access_denied&state=abc"),
            Some(Callback::Denied("access_denied".to_string()))
        );
        assert_eq!(parse_callback(""), None);
    }

    #[test]
    fn test_expires_at() {
        let before = Utc::now();
        let at = expires_at(Some(Duration::from_secs(60)));
        assert!(at >= before + chrono::Duration::seconds(60));
        let default = expires_at(None);
        assert!(default >= before + chrono::Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
    }
}
