//! krbd: krb service daemon
//!
//! Usage:
//!   krbd [--config /etc/krb/config.toml] --service as|tgs|fs
//!
//! Services:
//!   as   - Authentication service; creates the database on first start
//!   tgs  - Ticket-granting service
//!   fs   - File service, serving files below `fs.serve_root`

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use krb_core::KrbConfig;
use krb_server::{auth, fs, tgs, AsState, DirResourceStore, FsState, TgsState};
use krb_store::{AuthDb, ServicePair};

#[derive(Parser, Debug)]
#[command(name = "krbd", version, about = "krb ticket and file service daemon")]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "KRB_CONFIG",
        default_value = "/etc/krb/config.toml"
    )]
    config: PathBuf,

    /// Which service this process runs
    #[arg(long, short = 's', env = "KRB_SERVICE")]
    service: Service,

    /// Override the configured listen address
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "KRB_LOG", default_value = "info")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "KRB_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum Service {
    /// Authentication service
    As,
    /// Ticket-granting service
    Tgs,
    /// File service
    Fs,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log, &cli.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        service = ?cli.service,
        config = %cli.config.display(),
        "krbd starting"
    );

    let config = KrbConfig::load_or_default(&cli.config)?;
    let db_file = config.db.database_file();

    let (listen, app) = match cli.service {
        Service::As => {
            let db = Arc::new(
                AuthDb::initialize(&db_file)
                    .with_context(|| format!("initializing {}", db_file.display()))?,
            );
            let keys = db.key_registry(&[ServicePair::AsTgs])?;
            let app = auth::router(AsState::new(db, Arc::new(keys)));
            (config.auth.listen, app)
        }
        Service::Tgs => {
            let db = AuthDb::connect(&db_file)
                .with_context(|| format!("opening {} (start the AS first)", db_file.display()))?;
            let keys = db.key_registry(&[ServicePair::AsTgs, ServicePair::TgsFs])?;
            (config.tgs.listen, tgs::router(TgsState::new(Arc::new(keys))))
        }
        Service::Fs => {
            let db = AuthDb::connect(&db_file)
                .with_context(|| format!("opening {} (start the AS first)", db_file.display()))?;
            let keys = db.key_registry(&[ServicePair::TgsFs])?;
            let resources = DirResourceStore::new(&config.fs.serve_root);
            info!(root = %config.fs.serve_root.display(), "serving files");
            (
                config.fs.listen,
                fs::router(FsState::new(Arc::new(keys), Arc::new(resources))),
            )
        }
    };

    let listen = cli.listen.unwrap_or(listen);
    krb_server::serve(&listen, app).await
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
