//! Google sign-in against a local stand-in for Google and a scripted
//! browser that follows the consent redirect.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use purse_core::{Error, GoogleSignIn, IdentityProvider, MemoryStore, SessionStore};
use purse_oauth::{OAuthClient, Provider};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url::Url;

const FULL_GRANT: &str = r#"{"access_token":"ya29.a","token_type":"Bearer","expires_in":3599,"refresh_token":"1//r","scope":"openid https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/userinfo.profile https://www.googleapis.com/auth/gmail.readonly","id_token":"eyJ.x.y"}"#;
const NO_GMAIL_GRANT: &str = r#"{"access_token":"ya29.b","token_type":"Bearer","expires_in":3599,"refresh_token":"1//s","scope":"openid email profile","id_token":"eyJ.x.y"}"#;
const USER: &str = r#"{"sub":"10769150350006150715113082367","email":"ana@gmail.com","name":"Ana Pérez"}"#;

struct FakeGoogle {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl Drop for FakeGoogle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Answers `/token`, `/userinfo` and `/revoke` until dropped.
async fn fake_google(token_body: &'static str) -> FakeGoogle {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&requests);
    let task = tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let line = request.lines().next().unwrap_or_default().to_string();

            let body = if line.contains("/token") {
                token_body
            } else if line.contains("/userinfo") {
                USER
            } else {
                "{}"
            };
            seen.lock().unwrap().push(line);

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    FakeGoogle {
        base,
        requests,
        task,
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        request.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&request);
        let complete = text.split_once("\r\n\r\n").is_some_and(|(head, body)| {
            let length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            body.len() >= length
        });
        if n == 0 || complete {
            return text.into_owned();
        }
    }
}

/// Plays the browser: approves consent and follows the redirect.
async fn approve(consent: Url) -> String {
    let query = |name: &str| {
        consent
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .unwrap()
    };
    let redirect = Url::parse(&query("redirect_uri")).unwrap();
    let state = query("state");

    let mut target = redirect.clone();
    target
        .query_pairs_mut()
        .append_pair("code", "4/0AbCd")
        .append_pair("state", &state);

    let mut stream = TcpStream::connect((
        redirect.host_str().unwrap(),
        redirect.port().unwrap(),
    ))
    .await
    .unwrap();
    let path = format!("{}?{}", target.path(), target.query().unwrap());
    stream
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").as_bytes())
        .await
        .unwrap();

    let mut page = String::new();
    stream.read_to_string(&mut page).await.unwrap();
    page
}

fn sign_in_service(base: &str) -> GoogleSignIn {
    let provider = Provider::under("Local", base).unwrap();
    let client = OAuthClient::new("cid", provider).with_redirect_uri("http://127.0.0.1:0");
    GoogleSignIn::new(client).with_wait(Duration::from_secs(10))
}

#[tokio::test]
async fn sign_in_round_trip_and_session_restore() {
    let google = fake_google(FULL_GRANT).await;
    let service = sign_in_service(&google.base);

    let mut browser = None;
    let account = service
        .sign_in(|url| browser = Some(tokio::spawn(approve(url.clone()))))
        .await
        .unwrap();

    let page = browser.unwrap().await.unwrap();
    assert!(page.starts_with("HTTP/1.1 200"));

    assert_eq!(account.info.email, "ana@gmail.com");
    assert_eq!(account.info.name.as_deref(), Some("Ana Pérez"));
    assert!(account.gmail_access);
    assert_eq!(account.token.refresh_token.as_deref(), Some("1//r"));

    let requests = google.requests.lock().unwrap().clone();
    assert!(requests[0].starts_with("POST /token"));
    assert!(requests[1].starts_with("GET /userinfo"));

    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"), Arc::new(MemoryStore::new()));
    let mut session = purse_core::Session::default();
    session.sign_in_google(&account.info, account.gmail_access);
    store.save_token(&account.token).unwrap();
    store.save(&session).await.unwrap();

    let restored = store.restore().await.unwrap();
    assert_eq!(restored, session);
    assert_eq!(
        restored.identity().map(|id| id.provider),
        Some(IdentityProvider::Google)
    );
}

#[tokio::test]
async fn missing_gmail_scope_is_rejected_and_revoked() {
    let google = fake_google(NO_GMAIL_GRANT).await;
    let service = sign_in_service(&google.base);

    let mut browser = None;
    let err = service
        .sign_in(|url| browser = Some(tokio::spawn(approve(url.clone()))))
        .await
        .unwrap_err();
    browser.unwrap().await.unwrap();

    let Error::OAuth(purse_oauth::Error::MissingScopes(missing)) = err else {
        panic!("expected missing scopes, got {err:?}");
    };
    assert_eq!(missing, vec![purse_oauth::scope::GMAIL_READONLY.to_string()]);

    let requests = google.requests.lock().unwrap().clone();
    assert!(requests.iter().any(|line| line.starts_with("POST /revoke")));
    assert!(!requests.iter().any(|line| line.contains("/userinfo")));
}

const MAIL_GRANT: &str = r#"{"access_token":"ya29.c","token_type":"Bearer","expires_in":3599,"refresh_token":"1//t","scope":"openid https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/userinfo.profile https://www.googleapis.com/auth/gmail.readonly https://mail.google.com/","id_token":"eyJ.x.y"}"#;

#[tokio::test]
async fn imap_sign_in_asks_for_and_requires_mail_scope() {
    let google = fake_google(MAIL_GRANT).await;
    let service = sign_in_service(&google.base).with_imap_access();

    let mut consent = None;
    let mut browser = None;
    let account = service
        .sign_in(|url| {
            consent = Some(url.clone());
            browser = Some(tokio::spawn(approve(url.clone())));
        })
        .await
        .unwrap();
    browser.unwrap().await.unwrap();

    let scope = consent
        .unwrap()
        .query_pairs()
        .find(|(key, _)| key == "scope")
        .map(|(_, value)| value.into_owned())
        .unwrap();
    assert!(scope.split(' ').any(|s| s == purse_oauth::scope::MAIL));
    assert!(account.imap_access);
    assert!(purse_core::has_imap_access(&account.token));
}

#[tokio::test]
async fn imap_sign_in_without_mail_grant_is_revoked() {
    let google = fake_google(FULL_GRANT).await;
    let service = sign_in_service(&google.base).with_imap_access();

    let mut browser = None;
    let err = service
        .sign_in(|url| browser = Some(tokio::spawn(approve(url.clone()))))
        .await
        .unwrap_err();
    browser.unwrap().await.unwrap();

    let Error::OAuth(purse_oauth::Error::MissingScopes(missing)) = err else {
        panic!("expected missing scopes, got {err:?}");
    };
    assert_eq!(missing, vec![purse_oauth::scope::MAIL.to_string()]);
    let requests = google.requests.lock().unwrap().clone();
    assert!(requests.iter().any(|line| line.starts_with("POST /revoke")));
}
