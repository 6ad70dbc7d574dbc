//! Token, userinfo and revoke calls against a local stand-in for Google.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use purse_oauth::{AuthorizationCodeFlow, Error, OAuthClient, Provider, Token};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serves one canned response and returns the raw request it received.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            request.extend_from_slice(&chunk[..n]);
            if n == 0 || request_complete(&request) {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8(request).unwrap()
    });

    (base, handle)
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    body.len() >= length
}

fn provider(base: &str) -> Provider {
    Provider::under("Local", base).unwrap()
}

#[tokio::test]
async fn exchange_code_sends_pkce_verifier() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"access_token":"ya29.a","token_type":"Bearer","expires_in":3599,"refresh_token":"1//r","scope":"openid email profile","id_token":"eyJ.x.y"}"#,
    )
    .await;

    let client = OAuthClient::new("cid", provider(&base))
        .with_client_secret("csecret")
        .with_redirect_uri("http://127.0.0.1:8765");
    let flow = AuthorizationCodeFlow::new(client);
    let verifier = flow.pkce_verifier().to_string();

    let token = flow.exchange_code("4/code").await.unwrap();
    assert_eq!(token.access_token, "ya29.a");
    assert_eq!(token.refresh_token.as_deref(), Some("1//r"));
    assert_eq!(token.id_token.as_deref(), Some("eyJ.x.y"));
    assert!(token.is_valid());

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /token "));
    assert!(request.contains("grant_type=authorization_code"));
    assert!(request.contains("code=4%2Fcode"));
    assert!(request.contains(&format!("code_verifier={verifier}")));
    assert!(request.contains("client_secret=csecret"));
}

#[tokio::test]
async fn exchange_code_error_response() {
    let (base, server) = serve_once(
        "400 Bad Request",
        r#"{"error":"invalid_grant","error_description":"Bad Request"}"#,
    )
    .await;

    let flow = AuthorizationCodeFlow::new(OAuthClient::new("cid", provider(&base)));
    let err = flow.exchange_code("stale").await.unwrap_err();
    assert!(matches!(err, Error::Rejected { ref code, .. } if code == "invalid_grant"));
    assert!(err.needs_new_sign_in());
    server.await.unwrap();
}

#[tokio::test]
async fn refresh_keeps_refresh_token() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"access_token":"ya29.b","token_type":"Bearer","expires_in":3599}"#,
    )
    .await;

    let client = OAuthClient::new("cid", provider(&base));
    let old = Token::new("ya29.a", "Bearer")
        .with_refresh_token("1//r")
        .with_scope("openid email");
    let fresh = client.refresh_token(&old).await.unwrap();

    assert_eq!(fresh.access_token, "ya29.b");
    assert_eq!(fresh.refresh_token.as_deref(), Some("1//r"));
    assert_eq!(fresh.scope.as_deref(), Some("openid email"));

    let request = server.await.unwrap();
    assert!(request.contains("grant_type=refresh_token"));
}

#[tokio::test]
async fn fetch_user_info_uses_bearer() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"sub":"1090","email":"ana@gmail.com","name":"Ana","email_verified":true}"#,
    )
    .await;

    let client = OAuthClient::new("cid", provider(&base));
    let info = client
        .fetch_user_info(&Token::new("ya29.a", "Bearer"))
        .await
        .unwrap();
    assert_eq!(info.id, "1090");
    assert_eq!(info.email, "ana@gmail.com");
    assert_eq!(info.name.as_deref(), Some("Ana"));

    let request = server.await.unwrap().to_ascii_lowercase();
    assert!(request.starts_with("get /userinfo "));
    assert!(request.contains("authorization: bearer ya29.a"));
}

#[tokio::test]
async fn revoke_prefers_refresh_token() {
    let (base, server) = serve_once("200 OK", "{}").await;

    let client = OAuthClient::new("cid", provider(&base));
    let token = Token::new("ya29.a", "Bearer").with_refresh_token("1//r");
    client.revoke(&token).await.unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /revoke "));
    assert!(request.contains("token=1%2F%2Fr"));
}
