//! krb: command-line client and credential database admin
//!
//! Commands:
//!   download <resource>   - authenticate through AS and TGS, fetch from FS
//!   admin init            - create the database and shared keys
//!   admin add-user        - register a user (password prompted)
//!   admin find            - search by username, first, last or full name
//!   admin update <id>     - replace a user's names and password
//!   admin delete <id>     - remove a user
//!   admin list            - list all users

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use krb_cli::{Client, ClientError};
use krb_core::KrbConfig;
use krb_store::{AuthDb, CredentialStore, UserCredential};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "krb",
    version,
    about = "krb ticket client",
    long_about = "krb: download files through the AS/TGS/FS ticket exchange and manage the credential database"
)]
struct Cli {
    /// Path to config.toml
    #[arg(long, short = 'c', env = "KRB_CONFIG", default_value = "/etc/krb/config.toml")]
    config: PathBuf,

    /// Narrate each protocol step
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "KRB_LOG", default_value = "warn", global = true)]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download a resource from the file service
    Download {
        /// Resource path on the file service (e.g. report.pdf)
        resource: String,
        /// Username (prompted when omitted)
        #[arg(long, short = 'u', env = "KRB_USER")]
        username: Option<String>,
        /// Directory to save into (overrides client.download_dir)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Credential database administration
    Admin {
        /// Database file or directory (overrides db.path)
        #[arg(long, env = "KRB_DB")]
        db: Option<PathBuf>,

        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    /// Create the database and shared service keys if missing
    Init,

    /// Register a new user; the password is prompted
    #[command(name = "add-user")]
    AddUser(UserFields),

    /// Search for users
    Find {
        #[arg(long, group = "query")]
        username: Option<String>,
        #[arg(long, group = "query")]
        first: Option<String>,
        #[arg(long, group = "query")]
        last: Option<String>,
        /// "First Last"
        #[arg(long, group = "query")]
        name: Option<String>,
    },

    /// Replace every field of a user; the new password is prompted
    Update {
        id: u64,
        #[command(flatten)]
        fields: UserFields,
    },

    /// Delete a user by id
    Delete { id: u64 },

    /// List all users
    List,
}

#[derive(Args, Debug)]
struct UserFields {
    #[arg(long)]
    first: String,
    #[arg(long)]
    last: String,
    #[arg(long)]
    username: String,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { cli.log.as_str() };
    init_logging(level);

    let config = KrbConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Download {
            resource,
            username,
            output,
        } => cmd_download(&config, &resource, username, output).await,
        Commands::Admin { db, action } => {
            let db_file = match db {
                Some(path) => krb_core::config::DbConfig { path }.database_file(),
                None => config.db.database_file(),
            };
            cmd_admin(&db_file, action)
        }
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ── download ─────────────────────────────────────────────────────────────────

async fn cmd_download(
    config: &KrbConfig,
    resource: &str,
    username: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut client_config = config.client.clone();
    if let Some(dir) = output {
        client_config.download_dir = dir;
    }
    let client = Client::new(&client_config)?;

    let username = match username {
        Some(u) => u,
        None => prompt_line("Username: ")?,
    };
    let password = prompt_password("Password: ")?;

    match client.download(&username, &password, resource).await {
        Ok(download) => {
            println!("Downloaded:");
            println!("  resource: {resource}");
            println!("  local:    {}", download.path.display());
            println!("  bytes:    {}", download.size);
            Ok(())
        }
        Err(ClientError::InvalidPassword) => anyhow::bail!("Invalid Password"),
        Err(e) => Err(e).with_context(|| format!("downloading {resource}")),
    }
}

// ── admin ────────────────────────────────────────────────────────────────────

fn cmd_admin(db_file: &std::path::Path, action: AdminAction) -> Result<()> {
    if let AdminAction::Init = action {
        let db = AuthDb::initialize(db_file)
            .with_context(|| format!("initializing {}", db_file.display()))?;
        println!("Database ready: {}", db.path().display());
        println!("  users: {}", db.list_users()?.len());
        return Ok(());
    }

    let db = AuthDb::connect(db_file)
        .with_context(|| format!("opening {} (run `krb admin init` first)", db_file.display()))?;

    match action {
        AdminAction::Init => Ok(()),
        AdminAction::AddUser(fields) => {
            let password = prompt_new_password()?;
            let user = db.add_user(
                &fields.first,
                &fields.last,
                &fields.username,
                password.expose_secret(),
            )?;
            println!("Added user {} ({})", user.id, user.username);
            Ok(())
        }
        AdminAction::Find {
            username,
            first,
            last,
            name,
        } => {
            let users = if let Some(u) = username {
                db.find_user_by_username(&u)?.into_iter().collect()
            } else if let Some(f) = first {
                db.find_users_by_first_name(&f)?
            } else if let Some(l) = last {
                db.find_users_by_last_name(&l)?
            } else if let Some(n) = name {
                db.find_users_by_full_name(&n)?
            } else {
                anyhow::bail!("find: pass one of --username, --first, --last or --name")
            };
            print_users(&users);
            Ok(())
        }
        AdminAction::Update { id, fields } => {
            let password = prompt_new_password()?;
            let user = db.update_user(
                id,
                &fields.first,
                &fields.last,
                &fields.username,
                password.expose_secret(),
            )?;
            println!("Updated user {} ({})", user.id, user.username);
            Ok(())
        }
        AdminAction::Delete { id } => {
            let user = db.delete_user(id)?;
            println!("Deleted user {} ({})", user.id, user.username);
            Ok(())
        }
        AdminAction::List => {
            print_users(&db.list_users()?);
            Ok(())
        }
    }
}

fn print_users(users: &[UserCredential]) {
    if users.is_empty() {
        println!("No matching users");
        return;
    }
    println!("{:<6} {:<16} {:<16} USERNAME", "ID", "FIRST", "LAST");
    for user in users {
        println!(
            "{:<6} {:<16} {:<16} {}",
            user.id, user.first_name, user.last_name, user.username
        );
    }
}

// ── prompts ──────────────────────────────────────────────────────────────────

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading from stdin")?;
    let line = line.trim().to_string();
    if line.is_empty() {
        anyhow::bail!("no input given");
    }
    Ok(line)
}

fn prompt_password(prompt: &str) -> Result<SecretString> {
    let password = rpassword::prompt_password(prompt).context("reading password")?;
    Ok(SecretString::from(password))
}

fn prompt_new_password() -> Result<SecretString> {
    let password = prompt_password("New password: ")?;
    let confirm = prompt_password("Confirm password: ")?;
    if password.expose_secret() != confirm.expose_secret() {
        anyhow::bail!("passwords do not match");
    }
    Ok(password)
}
