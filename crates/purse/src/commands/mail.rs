//! Mailbox commands: check for unread mail, manage saved settings.

use anyhow::{Context as _, Result, anyhow, bail};
use clap::{Args, Subcommand};
use purse_core::providers::{self, PRESETS};
use purse_core::{
    Credentials, EmailConnectionDetails, Failure, GoogleSignIn, IdentityProvider, ProbeError,
    Session, SessionStore,
};
use purse_mail::{Protocol, Security};
use tracing::{debug, warn};

use super::Context;

#[derive(Subcommand)]
pub enum MailCommands {
    /// Log in, count unread mail in INBOX and log out
    Probe(ProbeArgs),
    /// List known mail providers and their servers
    Providers,
    /// Show the saved connection settings
    Show,
    /// Delete the saved settings and remembered password
    Forget,
}

#[derive(Args)]
pub struct ProbeArgs {
    /// Email address, also used as the login name
    #[arg(long, short)]
    email: Option<String>,
    /// Server host name
    #[arg(long, short)]
    server: Option<String>,
    /// Server port, defaults to the standard port for type and encryption
    #[arg(long, short)]
    port: Option<u16>,
    /// Server type: IMAP or POP3
    #[arg(long = "type", short = 't')]
    server_type: Option<String>,
    /// Encryption: SSL/TLS, STARTTLS or None
    #[arg(long)]
    encryption: Option<String>,
    /// Take server settings from a known provider (see `mail providers`)
    #[arg(long, conflicts_with = "server")]
    provider: Option<String>,
    /// Password; falls back to the remembered one
    #[arg(long, env = "PURSE_MAIL_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Keep the password in the system keyring
    #[arg(long)]
    remember: bool,
    /// Log in with the Google account from `auth google --imap` (IMAP only)
    #[arg(long, conflicts_with = "password")]
    google: bool,
}

pub async fn run(ctx: &Context, command: MailCommands) -> Result<()> {
    match command {
        MailCommands::Probe(args) => probe(ctx, args).await,
        MailCommands::Providers => {
            for preset in PRESETS {
                println!("{}", preset.name);
                println!("  domains: {}", preset.domains.join(", "));
                for protocol in [Protocol::Imap, Protocol::Pop3] {
                    let server = preset.server(protocol);
                    println!(
                        "  {:<5} {}:{} ({})",
                        protocol.name(),
                        server.host,
                        server.port,
                        server.security
                    );
                }
                if let Some(note) = preset.note {
                    println!("  note: {note}");
                }
            }
            Ok(())
        }
        MailCommands::Show => {
            match ctx.preferences().load().await? {
                Some(details) => {
                    println!("Email:      {}", details.email);
                    println!(
                        "Server:     {}:{} ({}, {})",
                        details.server_address,
                        details.server_port,
                        details.server_type,
                        details.encryption_type
                    );
                    let password = if details.password.is_some() {
                        "remembered"
                    } else {
                        "not saved"
                    };
                    println!("Password:   {password}");
                }
                None => println!("No saved mail settings"),
            }
            Ok(())
        }
        MailCommands::Forget => {
            ctx.preferences().clear().await?;
            println!("Saved mail settings removed");
            Ok(())
        }
    }
}

async fn probe(ctx: &Context, args: ProbeArgs) -> Result<()> {
    let preferences = ctx.preferences();
    let saved = preferences.load().await?;
    let details = merge(&args, saved)?;
    debug!(?details, "probe settings");

    let sessions = ctx.sessions();
    let mut session = sessions.restore().await?;

    // Bad settings are reported before anything touches the network.
    let mut config = match details.resolve() {
        Ok(config) => config,
        Err(e) => return Err(failed(&sessions, &mut session, &ProbeError::Config(e)).await),
    };
    config.connect_timeout = ctx.config.connect_timeout();
    config.io_timeout = ctx.config.io_timeout();

    let credentials = if args.google {
        google_credentials(ctx, &details.email).await?
    } else {
        let password = args
            .password
            .clone()
            .or_else(|| details.password.clone())
            .context("no password: pass --password or set PURSE_MAIL_PASSWORD")?;
        Credentials::Password {
            username: details.email.clone(),
            password,
        }
    };

    let report = match purse_core::probe(&config, &credentials).await {
        Ok(report) => report,
        Err(e) => return Err(failed(&sessions, &mut session, &e).await),
    };

    let google_session = session
        .identity()
        .is_some_and(|id| id.provider == IdentityProvider::Google);
    if google_session {
        session.record_unread(report.unread_messages);
    } else {
        session.sign_in_mail(&details.email, report.unread_messages);
    }
    sessions.save(&session).await?;

    if let Credentials::Password { password, .. } = credentials {
        let remember = args.remember || details.password.is_some();
        let mut to_save = details;
        to_save.password = Some(password);
        preferences.save(&to_save, remember).await?;
    }

    println!(
        "{} unread of {} in INBOX ({} {}:{}, {})",
        report.unread_messages,
        report.total_messages,
        report.protocol,
        report.host,
        report.port,
        report.security
    );
    Ok(())
}

/// Records a probe failure on the session and turns it into the
/// user-facing message.
async fn failed(
    sessions: &SessionStore,
    session: &mut Session,
    error: &ProbeError,
) -> anyhow::Error {
    let failure = Failure::from(error);
    debug!(kind = ?failure.kind, "probe failed: {error}");
    session.record_error(failure.message.clone());
    if let Err(e) = sessions.save(session).await {
        warn!("failed to record the error in the session: {e}");
    }
    anyhow!(failure.message)
}

/// Command-line values win over the saved settings, field by field.
fn merge(
    args: &ProbeArgs,
    saved: Option<EmailConnectionDetails>,
) -> Result<EmailConnectionDetails> {
    let saved = saved.unwrap_or_else(|| EmailConnectionDetails {
        email: String::new(),
        server_address: String::new(),
        server_port: 0,
        server_type: Protocol::Imap.name().to_string(),
        encryption_type: Security::Implicit.display_name().to_string(),
        password: None,
    });

    let email = args.email.clone().unwrap_or(saved.email);
    if email.trim().is_empty() {
        bail!("no email address: pass --email");
    }
    let server_type = args.server_type.clone().unwrap_or(saved.server_type);

    let mut details = EmailConnectionDetails {
        server_address: args.server.clone().unwrap_or(saved.server_address),
        server_port: args.port.unwrap_or(saved.server_port),
        encryption_type: args.encryption.clone().unwrap_or(saved.encryption_type),
        email,
        server_type,
        password: saved.password,
    };

    let preset = match &args.provider {
        Some(name) => {
            Some(providers::find(name).ok_or_else(|| anyhow!("unknown provider {name}"))?)
        }
        None if details.server_address.is_empty() => providers::for_email(&details.email),
        None => None,
    };
    if let Some(preset) = preset {
        let protocol: Protocol = details.server_type.parse()?;
        let server = preset.server(protocol);
        if let Some(note) = preset.note {
            warn!("{}: {note}", preset.name);
        }
        details.server_address = server.host.to_string();
        match &args.encryption {
            // The preset's port belongs to the preset's encryption.
            Some(encryption) => {
                details.encryption_type.clone_from(encryption);
                details.server_port = args.port.unwrap_or(0);
            }
            None => {
                details.encryption_type = server.security.display_name().to_string();
                details.server_port = args.port.unwrap_or(server.port);
            }
        }
    }

    // A saved port belongs to the saved type and encryption.
    let reshaped = args.server_type.is_some() || args.encryption.is_some();
    if args.port.is_none() && reshaped && preset.is_none() {
        details.server_port = 0;
    }

    if details.server_address.trim().is_empty() {
        bail!("no server: pass --server or --provider");
    }
    Ok(details)
}

async fn google_credentials(ctx: &Context, email: &str) -> Result<Credentials> {
    let sessions = ctx.sessions();
    let token = sessions
        .token()?
        .context("not signed in with Google: run `purse auth google` first")?;
    if !purse_core::has_imap_access(&token) {
        bail!("the Google sign-in has no IMAP access: run `purse auth google --imap`");
    }
    let google = GoogleSignIn::from_config(&ctx.config.google)?;
    let token = match google.fresh_token(&token).await {
        Err(purse_core::Error::OAuth(e)) if e.needs_new_sign_in() => {
            bail!("the Google sign-in has expired ({e}): run `purse auth google --imap` again")
        }
        other => other?,
    };
    if let Err(e) = sessions.save_token(&token) {
        warn!("failed to store refreshed token: {e}");
    }
    Ok(Credentials::XOAuth2 {
        username: email.to_string(),
        access_token: token.access_token,
    })
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
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ProbeArgs,
    }

    fn args(argv: &[&str]) -> ProbeArgs {
        let mut full = vec!["probe"];
        full.extend_from_slice(argv);
        Harness::try_parse_from(full).unwrap().args
    }

    fn saved() -> EmailConnectionDetails {
        EmailConnectionDetails {
            email: "ana@example.org".into(),
            server_address: "mail.example.org".into(),
            server_port: 993,
            server_type: "IMAP".into(),
            encryption_type: "SSL/TLS".into(),
            password: Some("kept".into()),
        }
    }

    #[test]
    fn test_merge_uses_saved_settings() {
        let details = merge(&args(&[]), Some(saved())).unwrap();
        assert_eq!(details, saved());
    }

    #[test]
    fn test_merge_flags_override() {
        let details = merge(&args(&["--server", "imap.other.net", "--port", "1993"]), Some(saved()))
            .unwrap();
        assert_eq!(details.server_address, "imap.other.net");
        assert_eq!(details.server_port, 1993);
        assert_eq!(details.email, "ana@example.org");
    }

    #[test]
    fn test_merge_changed_encryption_drops_saved_port() {
        let details = merge(&args(&["--encryption", "STARTTLS"]), Some(saved())).unwrap();
        assert_eq!(details.server_port, 0);
        assert_eq!(details.resolve().unwrap().port, 143);
    }

    #[test]
    fn test_merge_fills_server_from_email_domain() {
        let details = merge(&args(&["--email", "bob@gmx.de", "--type", "POP3"]), None).unwrap();
        assert_eq!(details.server_address, "pop.gmx.com");
        assert_eq!(details.server_port, 995);
    }

    #[test]
    fn test_merge_named_provider() {
        let details = merge(&args(&["--email", "me@custom.org", "--provider", "posteo"]), None)
            .unwrap();
        assert_eq!(details.server_address, "posteo.de");
        assert_eq!(details.encryption_type, "SSL/TLS");
    }

    #[test]
    fn test_merge_preset_keeps_explicit_encryption() {
        let details = merge(
            &args(&["--email", "me@custom.org", "--provider", "posteo", "--encryption", "STARTTLS"]),
            None,
        )
        .unwrap();
        assert_eq!(details.server_address, "posteo.de");
        assert_eq!(details.encryption_type, "STARTTLS");
        assert_eq!(details.server_port, 0);
        assert_eq!(details.resolve().unwrap().port, 143);

        let details = merge(
            &args(&["--email", "me@custom.org", "--provider", "posteo", "--encryption", "STARTTLS", "--port", "1143"]),
            None,
        )
        .unwrap();
        assert_eq!(details.server_port, 1143);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_on_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionStore::new(
            dir.path().join("session.json"),
            std::sync::Arc::new(purse_core::MemoryStore::new()),
        );
        let mut session = Session::default();
        session.sign_in_mail("ana@example.org", 4);

        let error = ProbeError::Config(purse_mail::Error::InvalidConfig(
            "server address is empty".into(),
        ));
        let err = failed(&sessions, &mut session, &error).await;
        assert_eq!(err.to_string(), "Invalid mail settings: server address is empty");

        let restored = sessions.restore().await.unwrap();
        assert_eq!(
            restored.last_error(),
            Some("Invalid mail settings: server address is empty")
        );
        assert_eq!(restored.unread_count(), Some(4));
    }

    #[test]
    fn test_merge_needs_email_and_server() {
        assert!(merge(&args(&[]), None).is_err());
        assert!(merge(&args(&["--email", "me@unknown.example"]), None).is_err());
    }

    #[test]
    fn test_google_conflicts_with_password() {
        assert!(Harness::try_parse_from(["probe", "--google", "--password", "x"]).is_err());
    }
}
