//! Loopback redirect receiver for installed applications.
//!
//! Serves the redirect path on `127.0.0.1` with a one-route axum app,
//! extracts `code` and `state`, and answers with a short page telling the
//! user to return to the terminal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// How long to wait for the user to finish in the browser.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(300);

/// Time the server gets to finish answering once the outcome is known.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const DONE_PAGE: &str =
    "<html><body><p>Sign-in complete. You can close this window and return to the terminal.</p></body></html>";
const FAILED_PAGE: &str = "<html><body><p>Sign-in failed.</p></body></html>";
const NOT_FOUND_PAGE: &str = "<html><body><p>Not found.</p></body></html>";

/// One-shot HTTP listener bound to the redirect URI.
#[derive(Debug)]
pub struct LoopbackReceiver {
    listener: TcpListener,
    redirect_uri: String,
    path: String,
    wait: Duration,
}

impl LoopbackReceiver {
    /// Binds the host and port of `redirect_uri`. Port 0 picks a free port.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI is not an `http` loopback address or the
    /// port cannot be bound.
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let uri = Url::parse(redirect_uri)?;
        let host = uri.host_str().unwrap_or_default();
        if uri.scheme() != "http" || !matches!(host, "127.0.0.1" | "localhost" | "[::1]") {
            return Err(Error::InvalidConfig(format!(
                "redirect URI must be an http loopback address: {redirect_uri}"
            )));
        }

        let port = uri.port().unwrap_or(80);
        let listener = TcpListener::bind((host.trim_matches(['[', ']']), port)).await?;
        let bound = listener.local_addr()?.port();

        let mut redirect = uri;
        redirect
            .set_port(Some(bound))
            .map_err(|()| Error::InvalidConfig("cannot set redirect port".into()))?;

        Ok(Self {
            listener,
            path: redirect.path().to_string(),
            redirect_uri: redirect.as_str().trim_end_matches('/').to_string(),
            wait: DEFAULT_WAIT,
        })
    }

    /// Overrides how long [`wait_for_code`](Self::wait_for_code) waits.
    #[must_use]
    pub const fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// The redirect URI to register with the authorization request.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Waits for the redirect and returns the authorization code.
    ///
    /// Requests for other paths, such as the browser's `/favicon.ico`, get a
    /// 404 and the wait goes on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when nothing arrives in time,
    /// [`Error::AccessDenied`] when the user declined,
    /// [`Error::StateMismatch`] when `state` differs.
    pub async fn wait_for_code(self, expected_state: &str) -> Result<String> {
        let Self {
            listener,
            path,
            wait,
            ..
        } = self;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let app = Router::new()
            .route(&path, get(callback))
            .fallback(not_found)
            .with_state(Callback {
                expected_state: expected_state.into(),
                outcome: Arc::new(Mutex::new(Some(outcome_tx))),
            });

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        let outcome = tokio::time::timeout(wait, outcome_rx).await;
        let _ = stop_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => debug!(error = %e, "redirect server failed"),
            Ok(Err(e)) => debug!(error = %e, "redirect server panicked"),
            Err(_) => debug!("redirect server did not stop in time"),
        }

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Io(std::io::Error::other(
                "redirect server stopped before the browser returned",
            ))),
            Err(_) => Err(Error::Timeout(wait.as_secs())),
        }
    }
}

/// Shared with the redirect handler. The sender is taken by the first
/// request that settles the sign-in.
#[derive(Clone)]
struct Callback {
    expected_state: Arc<str>,
    outcome: Arc<Mutex<Option<oneshot::Sender<Result<String>>>>>,
}

async fn callback(
    State(callback): State<Callback>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<&'static str>) {
    let outcome = match parse_redirect(&params, &callback.expected_state) {
        Ok(None) => return (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)),
        Ok(Some(code)) => Ok(code),
        Err(e) => Err(e),
    };
    let reply = if outcome.is_ok() {
        (StatusCode::OK, Html(DONE_PAGE))
    } else {
        (StatusCode::BAD_REQUEST, Html(FAILED_PAGE))
    };

    let sender = callback
        .outcome
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    match sender {
        Some(sender) => {
            let _ = sender.send(outcome);
        }
        None => debug!("redirect arrived after sign-in settled"),
    }
    reply
}

async fn not_found() -> (StatusCode, Html<&'static str>) {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE))
}

/// Reads the redirect's query parameters.
///
/// `Ok(None)` means the request carries neither a code nor an error.
fn parse_redirect(
    params: &HashMap<String, String>,
    expected_state: &str,
) -> Result<Option<String>> {
    let code = params.get("code").cloned();
    let state = params.get("state").map(String::as_str);
    let error = params.get("error").cloned();

    if let Some(error) = error {
        return Err(if error == "access_denied" {
            Error::AccessDenied
        } else {
            Error::rejected(error, params.get("error_description").cloned())
        });
    }

    let Some(code) = code else {
        return Ok(None);
    };
    if state != Some(expected_state) {
        return Err(Error::StateMismatch);
    }
    Ok(Some(code))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    async fn fetch(port: u16, target: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream
            .write_all(
                format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                    .as_bytes(),
            )
            .await
            .unwrap();
        let mut page = Vec::new();
        stream.read_to_end(&mut page).await.unwrap();
        String::from_utf8(page).unwrap()
    }

    #[test]
    fn test_parse_redirect() {
        assert_eq!(
            parse_redirect(&query(&[("state", "abc"), ("code", "4/0Ad"), ("scope", "email")]), "abc")
                .unwrap(),
            Some("4/0Ad".to_string())
        );
        assert_eq!(parse_redirect(&query(&[]), "abc").unwrap(), None);
        assert!(matches!(
            parse_redirect(&query(&[("code", "x"), ("state", "other")]), "abc"),
            Err(Error::StateMismatch)
        ));
        assert!(matches!(
            parse_redirect(&query(&[("code", "x")]), "abc"),
            Err(Error::StateMismatch)
        ));
        assert!(matches!(
            parse_redirect(&query(&[("error", "access_denied"), ("state", "abc")]), "abc"),
            Err(Error::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn test_rejects_non_loopback() {
        assert!(matches!(
            LoopbackReceiver::bind("https://example.com/callback").await,
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_receives_code() {
        let receiver = LoopbackReceiver::bind("http://127.0.0.1:0").await.unwrap();
        let redirect = Url::parse(receiver.redirect_uri()).unwrap();
        let port = redirect.port().unwrap();
        assert_ne!(port, 0);

        let browser = tokio::spawn(async move {
            let favicon = fetch(port, "/favicon.ico").await;
            assert!(favicon.starts_with("HTTP/1.1 404"), "{favicon}");

            let page = fetch(port, "/?state=s1&code=4%2F0Ad-the-code").await;
            assert!(page.starts_with("HTTP/1.1 200 OK"), "{page}");
            assert!(page.contains("Sign-in complete"));
        });

        let code = receiver.wait_for_code("s1").await.unwrap();
        assert_eq!(code, "4/0Ad-the-code");
        browser.await.unwrap();
    }

    #[tokio::test]
    async fn test_serves_only_the_redirect_path() {
        let receiver = LoopbackReceiver::bind("http://127.0.0.1:0/callback").await.unwrap();
        assert!(receiver.redirect_uri().ends_with("/callback"));
        let port = Url::parse(receiver.redirect_uri()).unwrap().port().unwrap();

        let browser = tokio::spawn(async move {
            let root = fetch(port, "/?state=s1&code=wrong-path").await;
            assert!(root.starts_with("HTTP/1.1 404"), "{root}");

            let page = fetch(port, "/callback?state=forged&code=c").await;
            assert!(page.starts_with("HTTP/1.1 400"), "{page}");
            assert!(page.contains("Sign-in failed"));
        });

        assert!(matches!(
            receiver.wait_for_code("s1").await,
            Err(Error::StateMismatch)
        ));
        browser.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let receiver = LoopbackReceiver::bind("http://127.0.0.1:0")
            .await
            .unwrap()
            .with_wait(Duration::from_secs(5));
        assert!(matches!(
            receiver.wait_for_code("s").await,
            Err(Error::Timeout(5))
        ));
    }
}
