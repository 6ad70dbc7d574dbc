//! Sign-in commands.

use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use purse_core::{GoogleSignIn, IdentityProvider, Session};
use tracing::{info, warn};

use super::Context;

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with Google in the browser
    Google {
        /// Print the consent URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
        /// Seconds to wait for the browser to come back
        #[arg(long, default_value_t = 300)]
        wait: u64,
        /// Also ask for full mail access, needed by `mail probe --google`
        #[arg(long)]
        imap: bool,
    },
    /// Show who is signed in and the last unread count
    Status,
    /// Sign out and revoke the Google token
    Logout,
}

pub async fn run(ctx: &Context, command: AuthCommands) -> Result<()> {
    let sessions = ctx.sessions();

    match command {
        AuthCommands::Google {
            no_browser,
            wait,
            imap,
        } => {
            let mut google = GoogleSignIn::from_config(&ctx.config.google)?
                .with_wait(Duration::from_secs(wait));
            if imap {
                google = google.with_imap_access();
            }

            let account = google
                .sign_in(|url| {
                    println!("Sign in at:\n\n  {url}\n");
                    if !no_browser && let Err(e) = opener::open(url.as_str()) {
                        warn!("could not open a browser: {e}");
                    }
                })
                .await
                .context("Google sign-in failed")?;

            let mut session = Session::default();
            session.sign_in_google(&account.info, account.gmail_access);
            sessions.save_token(&account.token)?;
            sessions.save(&session).await?;

            match &account.info.name {
                Some(name) => println!("Signed in as {name} <{}>", account.info.email),
                None => println!("Signed in as {}", account.info.email),
            }
        }
        AuthCommands::Status => {
            let session = sessions.restore().await?;
            let imap_access = sessions
                .token()?
                .is_some_and(|token| purse_core::has_imap_access(&token));
            for line in status_lines(&session, imap_access) {
                println!("{line}");
            }
        }
        AuthCommands::Logout => {
            if let Some(token) = sessions.token()? {
                match GoogleSignIn::from_config(&ctx.config.google) {
                    Ok(google) => google.revoke(&token).await,
                    Err(e) => warn!("not revoking Google token: {e}"),
                }
            }
            sessions.clear().await?;
            info!("signed out");
            println!("Signed out");
        }
    }

    Ok(())
}

/// What `auth status` prints for `session`.
fn status_lines(session: &Session, imap_access: bool) -> Vec<String> {
    let mut lines = Vec::new();
    match session.identity() {
        None => lines.push("Not signed in".to_string()),
        Some(identity) => {
            let via = match identity.provider {
                IdentityProvider::Google => "Google",
                IdentityProvider::Mail => "mail server",
            };
            lines.push(match &identity.display_name {
                Some(name) => format!("Signed in as {name} <{}> via {via}", identity.email),
                None => format!("Signed in as {} via {via}", identity.email),
            });
            if identity.provider == IdentityProvider::Google {
                let granted = |yes: bool| if yes { "granted" } else { "not granted" };
                lines.push(format!("Gmail read access: {}", granted(session.gmail_access())));
                lines.push(format!("IMAP access: {}", granted(imap_access)));
            }
            if let Some(count) = session.unread_count() {
                lines.push(format!("Unread messages: {count}"));
            }
        }
    }
    if let Some(error) = session.last_error() {
        lines.push(format!("Last error: {error}"));
    }
    lines
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

    #[test]
    fn test_status_shows_last_error() {
        let mut session = Session::default();
        session.sign_in_mail("ana@example.com", 2);
        session.record_error("Could not connect to the mail server: I/O error");

        let lines = status_lines(&session, false);
        assert_eq!(lines[0], "Signed in as ana@example.com via mail server");
        assert!(lines.contains(&"Unread messages: 2".to_string()));
        assert_eq!(
            lines.last().unwrap(),
            "Last error: Could not connect to the mail server: I/O error"
        );
    }

    #[test]
    fn test_status_signed_out_with_error() {
        let mut session = Session::default();
        session.record_error("Invalid mail settings: server address is empty");
        assert_eq!(
            status_lines(&session, false),
            vec![
                "Not signed in".to_string(),
                "Last error: Invalid mail settings: server address is empty".to_string(),
            ]
        );
    }

    #[test]
    fn test_status_without_error() {
        let mut session = Session::default();
        session.sign_in_mail("ana@example.com", 0);
        assert!(status_lines(&session, false).iter().all(|l| !l.starts_with("Last error")));
    }
}
