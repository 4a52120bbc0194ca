//! The HTTP trigger: an index page and a `POST /create_today` endpoint that runs one rollover per
//! request.

use crate::api::Mode;
use crate::commands;
use crate::error::Res;
use crate::Config;
use anyhow::Context;
use chrono::{Local, NaiveDate};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

const CREATE_TODAY: &str = "/create_today";

/// What every request handler needs. Nothing here changes between requests.
#[derive(Debug, Clone)]
pub(crate) struct AppState {
    config: Config,
    mode: Mode,
}

impl AppState {
    pub(crate) fn new(config: Config, mode: Mode) -> Self {
        Self { config, mode }
    }
}

/// Binds `bind:port` and serves until ctrl-c.
pub(crate) async fn serve(config: Config, mode: Mode, bind: &str, port: u16) -> Res<()> {
    let listener = TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("Unable to listen on {bind}:{port}"))?;
    info!("Listening on http://{}", listener.local_addr()?);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for ctrl-c: {e}");
        }
    };
    serve_listener(listener, Arc::new(AppState::new(config, mode)), shutdown).await;
    info!("Server stopped");
    Ok(())
}

/// Accepts connections on `listener` until `shutdown` completes. Each connection is served on its
/// own task.
pub(crate) async fn serve_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);
    loop {
        let stream = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!("Unable to accept a connection: {e}");
                    continue;
                }
            },
        };
        let state = state.clone();
        tokio::spawn(async move {
            let service = service_fn(move |request: Request<Incoming>| {
                let state = state.clone();
                async move {
                    let today = Local::now().date_naive();
                    Ok::<_, Infallible>(
                        route(&state, request.method(), request.uri().path(), today).await,
                    )
                }
            });
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("Connection error: {e}");
            }
        });
    }
}

/// Produces the response for one request. `today` is the date of the sheet a POST creates.
pub(crate) async fn route(
    state: &AppState,
    method: &Method,
    path: &str,
    today: NaiveDate,
) -> Response<String> {
    debug!("{method} {path}");
    match (method, path) {
        (&Method::GET, "/") => html(index_page(today)),
        (&Method::POST, CREATE_TODAY) => create_today(state, today).await,
        (_, "/") | (_, CREATE_TODAY) => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": format!("Method {method} is not allowed on {path}") }),
        ),
        _ => json_response(
            StatusCode::NOT_FOUND,
            json!({ "error": format!("No route for {path}") }),
        ),
    }
}

async fn create_today(state: &AppState, today: NaiveDate) -> Response<String> {
    match commands::rollover(&state.config, state.mode, today).await {
        Ok(result) if result.is_success() => {
            json_response(StatusCode::OK, json!({ "message": result.message() }))
        }
        Ok(result) => json_response(
            status(result.http_status()),
            json!({ "error": result.message() }),
        ),
        Err(e) => {
            error!("Unable to run the rollover: {e}");
            json_response(
                status(e.error_type().http_status()),
                json!({ "error": e.to_string() }),
            )
        }
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<String> {
    let mut response = Response::new(body.to_string());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn html(body: String) -> Response<String> {
    let mut response = Response::new(body);
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn index_page(today: NaiveDate) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Daily sheet</title></head>
<body>
<h1>Daily sheet</h1>
<p>Today is {date}.</p>
<button id="create">Create today's sheet</button>
<p id="result"></p>
<script>
document.getElementById("create").addEventListener("click", async () => {{
  const result = document.getElementById("result");
  result.textContent = "Working...";
  try {{
    const response = await fetch("{path}", {{ method: "POST" }});
    const body = await response.json();
    result.textContent = body.message || body.error;
  }} catch (e) {{
    result.textContent = "Request failed: " + e;
  }}
}});
</script>
</body>
</html>
"#,
        date = today.format("%Y-%m-%d"),
        path = CREATE_TODAY,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestSheetState;
    use crate::test::TestEnv;

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn body(response: &Response<String>) -> serde_json::Value {
        serde_json::from_str(response.body()).unwrap()
    }

    #[tokio::test]
    async fn test_index_page() {
        let env = TestEnv::new().await;
        let state = AppState::new(env.config(), Mode::Test);
        let response = route(&state, &Method::GET, "/", june(2)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().contains("2025-06-02"));
        assert!(response.body().contains("/create_today"));
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_create_today() {
        let env = TestEnv::new().await;
        let state = AppState::new(env.config(), Mode::Test);
        let response = route(&state, &Method::POST, "/create_today", june(2)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body(&response),
            json!({ "message": "Sheet '2025-06-02' created successfully" })
        );
        assert!(env.get_state().tab("2025-06-02").is_some());
    }

    #[tokio::test]
    async fn test_create_today_without_predecessor() {
        let env = TestEnv::new().await;
        env.set_state(TestSheetState::new("en_US"));
        let state = AppState::new(env.config(), Mode::Test);
        let response = route(&state, &Method::POST, "/create_today", june(2)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(&response),
            json!({ "error": "No prior sheet to roll forward from" })
        );
    }

    #[tokio::test]
    async fn test_wrong_method_and_unknown_path() {
        let env = TestEnv::new().await;
        let state = AppState::new(env.config(), Mode::Test);
        let response = route(&state, &Method::GET, "/create_today", june(2)).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(body(&response)["error"].is_string());

        let response = route(&state, &Method::GET, "/nope", june(2)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_serve_listener_over_http() {
        let env = TestEnv::new().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(AppState::new(env.config(), Mode::Test));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve_listener(listener, state, async move {
            let _ = rx.await;
        }));

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{addr}/create_today"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let json: serde_json::Value = response.json().await.unwrap();
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(
            json["message"],
            format!("Sheet '{today}' created successfully")
        );

        let _ = tx.send(());
        server.await.unwrap();
    }
}
