//! End-to-end probes against scripted IMAP and POP3 servers on localhost.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use purse_core::{Credentials, Failure, FailureKind, ProbeError, probe};
use purse_mail::{Config, Protocol, Security};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Sends `greeting`, then for each step checks the next command line and
/// answers with the reply. Returns every line received, including those
/// after the script ran out.
async fn scripted(
    greeting: &'static str,
    steps: Vec<(&'static str, &'static str)>,
) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut received = Vec::new();

        write.write_all(format!("{greeting}\r\n").as_bytes()).await.unwrap();
        for (expect, reply) in steps {
            let line = lines.next_line().await.unwrap().expect("client hung up early");
            assert_eq!(line, expect);
            received.push(line);
            write.write_all(format!("{reply}\r\n").as_bytes()).await.unwrap();
        }
        while let Ok(Some(line)) = lines.next_line().await {
            received.push(line);
        }
        received
    });

    (port, handle)
}

fn config(protocol: Protocol, security: Security, port: u16) -> Config {
    Config::builder("127.0.0.1", protocol)
        .security(security)
        .port(port)
        .io_timeout(Duration::from_secs(5))
        .build()
}

fn password(password: &str) -> Credentials {
    Credentials::Password {
        username: "ana".into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn imap_counts_unseen_and_logs_out() {
    let (port, server) = scripted(
        "* OK IMAP4rev1 ready",
        vec![
            ("A0001 LOGIN ana s3cret", "A0001 OK LOGIN completed"),
            (
                "A0002 LIST \"\" INBOX",
                "* LIST (\\HasNoChildren) \"/\" INBOX\r\nA0002 OK LIST completed",
            ),
            (
                "A0003 EXAMINE INBOX",
                "* 5 EXISTS\r\n* 0 RECENT\r\n* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n* OK [PERMANENTFLAGS ()] No permanent flags permitted\r\nA0003 OK [READ-ONLY] EXAMINE completed",
            ),
            ("A0004 SEARCH UNSEEN", "* SEARCH 2 4 5\r\nA0004 OK SEARCH completed"),
            ("A0005 CLOSE", "A0005 OK CLOSE completed"),
            ("A0006 LOGOUT", "* BYE logging out\r\nA0006 OK LOGOUT completed"),
        ],
    )
    .await;

    let report = probe(&config(Protocol::Imap, Security::None, port), &password("s3cret"))
        .await
        .unwrap();
    assert_eq!(report.total_messages, 5);
    assert_eq!(report.unread_messages, 3);
    assert_eq!(report.port, port);

    let received = server.await.unwrap();
    assert_eq!(received.last().map(String::as_str), Some("A0006 LOGOUT"));
}

#[tokio::test]
async fn imap_wrong_password_is_authentication_failure() {
    let (port, server) = scripted(
        "* OK ready",
        vec![(
            "A0001 LOGIN ana wrong",
            "A0001 NO [AUTHENTICATIONFAILED] Invalid credentials",
        )],
    )
    .await;

    let err = probe(&config(Protocol::Imap, Security::None, port), &password("wrong"))
        .await
        .unwrap_err();
    let failure = Failure::from(&err);
    assert_eq!(failure.kind, FailureKind::Authentication);
    assert!(failure.message.contains("Invalid credentials"));

    // The connection is closed after the rejection.
    assert_eq!(server.await.unwrap().len(), 1);
}

#[tokio::test]
async fn imap_missing_inbox_still_logs_out() {
    let (port, server) = scripted(
        "* OK ready",
        vec![
            ("A0001 LOGIN ana s3cret", "A0001 OK done"),
            ("A0002 LIST \"\" INBOX", "A0002 OK LIST completed"),
            ("A0003 LOGOUT", "* BYE\r\nA0003 OK done"),
        ],
    )
    .await;

    let err = probe(&config(Protocol::Imap, Security::None, port), &password("s3cret"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::MailboxNotFound(_)));
    assert_eq!(purse_core::classify(&err), FailureKind::Mailbox);
    server.await.unwrap();
}

#[tokio::test]
async fn imap_without_seen_flag_is_mailbox_failure() {
    let (port, server) = scripted(
        "* OK ready",
        vec![
            ("A0001 LOGIN ana s3cret", "A0001 OK done"),
            ("A0002 LIST \"\" INBOX", "* LIST () \"/\" INBOX\r\nA0002 OK done"),
            (
                "A0003 EXAMINE INBOX",
                "* 1 EXISTS\r\n* FLAGS (\\Answered)\r\nA0003 OK [READ-ONLY] done",
            ),
            ("A0004 LOGOUT", "* BYE\r\nA0004 OK done"),
        ],
    )
    .await;

    let err = probe(&config(Protocol::Imap, Security::None, port), &password("s3cret"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::SeenFlagUnsupported(_)));
    server.await.unwrap();
}

#[tokio::test]
async fn imap_starttls_not_offered() {
    let (port, server) = scripted("* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready", vec![]).await;

    let err = probe(&config(Protocol::Imap, Security::StartTls, port), &password("s3cret"))
        .await
        .unwrap_err();
    assert_eq!(purse_core::classify(&err), FailureKind::UnsupportedProtocol);

    // Nothing was sent in the clear.
    assert!(server.await.unwrap().is_empty());
}

#[tokio::test]
async fn pop3_counts_maildrop() {
    let (port, server) = scripted(
        "+OK POP3 server ready",
        vec![
            ("USER ana", "+OK"),
            ("PASS s3cret", "+OK maildrop locked and ready"),
            ("STAT", "+OK 3 10240"),
            ("QUIT", "+OK bye"),
        ],
    )
    .await;

    let report = probe(&config(Protocol::Pop3, Security::None, port), &password("s3cret"))
        .await
        .unwrap();
    assert_eq!(report.total_messages, 3);
    assert_eq!(report.unread_messages, 3);
    server.await.unwrap();
}

#[tokio::test]
async fn pop3_wrong_password() {
    let (port, server) = scripted(
        "+OK ready",
        vec![("USER ana", "+OK"), ("PASS nope", "-ERR [AUTH] invalid password")],
    )
    .await;

    let err = probe(&config(Protocol::Pop3, Security::None, port), &password("nope"))
        .await
        .unwrap_err();
    assert_eq!(purse_core::classify(&err), FailureKind::Authentication);
    server.await.unwrap();
}

#[tokio::test]
async fn connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = probe(&config(Protocol::Imap, Security::None, port), &password("s3cret"))
        .await
        .unwrap_err();
    assert_eq!(purse_core::classify(&err), FailureKind::Connection);
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(socket);
    });

    let config = Config::builder("127.0.0.1", Protocol::Imap)
        .security(Security::None)
        .port(port)
        .io_timeout(Duration::from_millis(200))
        .build();
    let err = probe(&config, &password("s3cret")).await.unwrap_err();
    assert!(matches!(err, ProbeError::Mail(purse_mail::Error::Timeout(_))));
    assert_eq!(purse_core::classify(&err), FailureKind::Connection);
    server.abort();
}
