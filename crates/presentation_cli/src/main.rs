//! Mailsync CLI
//!
//! Command-line front end for account onboarding, synchronization and
//! mailbox maintenance. Results are printed as JSON.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use application::{
    AllFoldersOptions, EmailQuery, EmailService, NewAccountRequest, SendEmailRequest, SyncOptions,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use domain::{AccountId, EmailAddress, EmailId, EmailProvider, UserId};
use infrastructure::{AppConfig, build_email_service, init_telemetry, open_database};
use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

/// Mailsync CLI
#[derive(Parser)]
#[command(name = "mailsync-cli")]
#[command(author, version, about = "Mailbox sync and account management", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to ./config.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a mailbox after verifying its credentials
    ///
    /// Example: mailsync-cli add-account --user <UUID> --email ceo@startup.io --provider gmail
    AddAccount {
        #[arg(long)]
        user: UserId,

        #[arg(long, value_parser = parse_address)]
        email: EmailAddress,

        /// Mailbox password (prefer the environment variable)
        #[arg(long, env = "MAILSYNC_PASSWORD", hide_env_values = true)]
        password: String,

        /// gmail, whois or custom
        #[arg(long, default_value = "custom")]
        provider: EmailProvider,

        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        imap_host: Option<String>,

        #[arg(long)]
        imap_port: Option<u16>,

        #[arg(long)]
        smtp_host: Option<String>,

        #[arg(long)]
        smtp_port: Option<u16>,
    },

    /// List a user's active accounts
    Accounts {
        #[arg(long)]
        user: UserId,
    },

    /// Delete an account and all of its messages
    RemoveAccount { account: AccountId },

    /// Hide an account while keeping its messages
    DeactivateAccount { account: AccountId },

    /// Sync a single folder
    Sync {
        account: AccountId,

        /// Folder to sync (IMAP only)
        #[arg(long)]
        folder: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        /// Only messages on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
    },

    /// Sync every important folder
    SyncAll {
        account: AccountId,

        /// Per-folder limit
        #[arg(long)]
        limit: Option<u32>,

        #[arg(long)]
        since: Option<NaiveDate>,
    },

    /// List stored messages, newest first
    List {
        account: AccountId,

        #[arg(long)]
        folder: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long)]
        offset: Option<u32>,

        #[arg(long)]
        unread: bool,

        #[arg(long)]
        search: Option<String>,

        /// Only trashed messages
        #[arg(long, conflicts_with = "hide_trash")]
        trash: bool,

        /// Leave trashed messages out
        #[arg(long)]
        hide_trash: bool,
    },

    /// Show one message
    Show { email: EmailId },

    /// Send a message and keep a copy in Sent
    Send {
        account: AccountId,

        #[arg(long, required = true)]
        to: Vec<String>,

        #[arg(long)]
        cc: Vec<String>,

        #[arg(long)]
        bcc: Vec<String>,

        #[arg(long, default_value = "")]
        subject: String,

        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        html: Option<String>,
    },

    /// Mark a message read, or unread with --unread
    MarkRead {
        email: EmailId,

        #[arg(long)]
        unread: bool,
    },

    /// Star a message, or unstar with --off
    Star {
        email: EmailId,

        #[arg(long)]
        off: bool,
    },

    /// Move a message to the trash
    Trash { email: EmailId },

    /// Restore a message from the trash
    Restore { email: EmailId },

    /// Delete a message permanently
    Delete { email: EmailId },

    /// Mailbox counters for an account
    Stats { account: AccountId },
}

fn parse_address(value: &str) -> Result<EmailAddress, String> {
    EmailAddress::new(value).map_err(|e| e.to_string())
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

fn list_query(
    folder: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
    unread: bool,
    search: Option<String>,
    trash: bool,
    hide_trash: bool,
) -> EmailQuery {
    EmailQuery {
        folder,
        limit,
        offset,
        unread_only: unread,
        search,
        in_trash: match (trash, hide_trash) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        },
    }
}

#[derive(Serialize)]
struct Updated {
    updated: bool,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_updated(updated: bool) -> anyhow::Result<()> {
    print_json(&Updated { updated })
}

#[allow(clippy::too_many_lines)]
async fn run(service: &EmailService, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::AddAccount {
            user,
            email,
            password,
            provider,
            display_name,
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
        } => {
            let mut request =
                NewAccountRequest::new(user, email, SecretString::from(password), provider);
            request.display_name = display_name;
            request.imap_host = imap_host;
            request.imap_port = imap_port;
            request.smtp_host = smtp_host;
            request.smtp_port = smtp_port;
            print_json(&service.add_account(request).await?)
        },

        Commands::Accounts { user } => print_json(&service.get_accounts(&user).await?),

        Commands::RemoveAccount { account } => print_updated(service.delete_account(&account).await),

        Commands::DeactivateAccount { account } => {
            print_updated(service.deactivate_account(&account).await)
        },

        Commands::Sync {
            account,
            folder,
            limit,
            since,
        } => {
            let options = SyncOptions {
                folder,
                limit,
                since,
            };
            print_json(&service.sync_emails(&account, options).await?)
        },

        Commands::SyncAll {
            account,
            limit,
            since,
        } => {
            let options = AllFoldersOptions { limit, since };
            print_json(&service.sync_all_folders(&account, options).await?)
        },

        Commands::List {
            account,
            folder,
            limit,
            offset,
            unread,
            search,
            trash,
            hide_trash,
        } => {
            let query = list_query(folder, limit, offset, unread, search, trash, hide_trash);
            print_json(&service.get_emails(&account, &query).await?)
        },

        Commands::Show { email } => match service.get_email(&email).await? {
            Some(message) => print_json(&message),
            None => anyhow::bail!("Email not found: {email}"),
        },

        Commands::Send {
            account,
            to,
            cc,
            bcc,
            subject,
            text,
            html,
        } => {
            let mut request = SendEmailRequest::new(account, to, subject);
            request.cc = cc;
            request.bcc = bcc;
            request.body_text = text;
            request.body_html = html;
            print_json(&service.send_email(request).await?)
        },

        Commands::MarkRead { email, unread } => {
            print_updated(service.mark_as_read(&email, !unread).await)
        },

        Commands::Star { email, off } => print_updated(service.star_email(&email, !off).await),

        Commands::Trash { email } => print_updated(service.move_to_trash(&email).await),

        Commands::Restore { email } => print_updated(service.restore_from_trash(&email).await),

        Commands::Delete { email } => print_updated(service.delete_email(&email).await),

        Commands::Stats { account } => print_json(&service.get_stats(&account).await?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(cli.config.as_deref())?;
    if let Some(filter) = log_filter_from_verbosity(cli.verbose) {
        config.telemetry.log_filter = filter.to_string();
    }
    let _telemetry = init_telemetry(&config.telemetry)?;
    debug!(environment = %config.environment, "Configuration loaded");

    let db = open_database(&config).await?;
    let service = build_email_service(&config, &db)?;

    let result = run(&service, cli.command).await;
    db.close().await;
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn log_filter_verbosity() {
        assert_eq!(log_filter_from_verbosity(0), None);
        assert_eq!(log_filter_from_verbosity(1), Some("info"));
        assert_eq!(log_filter_from_verbosity(2), Some("debug"));
        assert_eq!(log_filter_from_verbosity(10), Some("trace"));
    }

    #[test]
    fn parses_add_account_with_overrides() {
        let user = UserId::new();
        let cli = Cli::try_parse_from([
            "mailsync-cli",
            "add-account",
            "--user",
            user.to_string().as_str(),
            "--email",
            "ceo@startup.io",
            "--password",
            "app-password",
            "--provider",
            "whois",
            "--imap-port",
            "1995",
        ])
        .unwrap();

        match cli.command {
            Commands::AddAccount {
                user: parsed,
                provider,
                imap_port,
                smtp_host,
                ..
            } => {
                assert_eq!(parsed, user);
                assert_eq!(provider, EmailProvider::Whois);
                assert_eq!(imap_port, Some(1995));
                assert!(smtp_host.is_none());
            },
            _ => panic!("expected add-account"),
        }
    }

    #[test]
    fn rejects_invalid_email_address() {
        let result = Cli::try_parse_from([
            "mailsync-cli",
            "add-account",
            "--user",
            UserId::new().to_string().as_str(),
            "--email",
            "not-an-address",
            "--password",
            "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_sync_since_date() {
        let account = AccountId::new();
        let cli = Cli::try_parse_from([
            "mailsync-cli",
            "sync",
            account.to_string().as_str(),
            "--folder",
            "Archive",
            "--since",
            "2026-10-01",
        ])
        .unwrap();

        match cli.command {
            Commands::Sync { folder, since, .. } => {
                assert_eq!(folder.as_deref(), Some("Archive"));
                assert_eq!(since, NaiveDate::from_ymd_opt(2026, 10, 1));
            },
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn send_requires_recipient() {
        let account = AccountId::new().to_string();
        assert!(Cli::try_parse_from(["mailsync-cli", "send", account.as_str()]).is_err());
        assert!(
            Cli::try_parse_from(["mailsync-cli", "send", account.as_str(), "--to", "a@b.io", "--to", "c@d.io"])
                .is_ok()
        );
    }

    #[test]
    fn trash_flags_conflict() {
        let account = AccountId::new().to_string();
        assert!(
            Cli::try_parse_from(["mailsync-cli", "list", account.as_str(), "--trash", "--hide-trash"])
                .is_err()
        );
    }

    #[test]
    fn list_query_maps_trash_flags() {
        let query = |trash, hide| list_query(None, None, None, false, None, trash, hide).in_trash;
        assert_eq!(query(false, false), None);
        assert_eq!(query(true, false), Some(true));
        assert_eq!(query(false, true), Some(false));
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(Cli::try_parse_from(["mailsync-cli", "show", "not-a-uuid"]).is_err());
    }
}
