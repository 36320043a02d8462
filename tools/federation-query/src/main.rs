//! Adds or replaces a federation query.
//!
//! Reads the `[database]` section of the server's config file, with
//! `DB_PASSWORD` taking precedence, and stores the query with a delete and
//! insert in one transaction. Arguments are validated before the database is
//! touched.

use std::{path::PathBuf, process::ExitCode, sync::LazyLock};

use chrono::{DateTime, Utc};
use clap::Parser;
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use keyserver_domain::{FederationQuery, parse_region_list};
use keyserver_repository::{RepositoryManager, RepositoryManagerConfigRaw};
use regex::Regex;
use thiserror::Error;

static QUERY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9\-_]*[a-z0-9]$").expect("query id pattern is valid")
});
static SERVER_ADDR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9.\-]+(:\d+)?$").expect("server address pattern is valid")
});

#[derive(Parser, Debug)]
#[command(name = "federation-query")]
#[command(about = "Adds or replaces a query pulling exposures from a federation peer")]
#[command(version)]
struct Args {
    /// Query identifier, e.g. "peer-us"
    #[arg(long, value_parser = parse_query_id)]
    query_id: String,

    /// Peer address as host or host:port
    #[arg(long, value_parser = parse_server_addr)]
    server_addr: String,

    /// Resume from this RFC 3339 timestamp instead of the epoch
    #[arg(long, value_parser = parse_timestamp)]
    last_timestamp: Option<DateTime<Utc>>,

    /// Comma-separated regions to include; empty includes every region
    #[arg(long, default_value = "")]
    regions: String,

    /// Comma-separated regions to exclude
    #[arg(long, default_value = "")]
    exclude_regions: String,

    /// Server config file holding the database settings
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("Failed to load database config: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error(transparent)]
    Config(#[from] keyserver_repository::ConfigError),

    #[error(transparent)]
    Repository(#[from] keyserver_repository::RepositoryError),
}

fn matches(regex: &Regex, value: &str, what: &str) -> Result<String, String> {
    if regex.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(format!("{} {:?} must match {}", what, value, regex.as_str()))
    }
}

fn parse_query_id(value: &str) -> Result<String, String> {
    matches(&QUERY_ID, value, "query id")
}

fn parse_server_addr(value: &str) -> Result<String, String> {
    matches(&SERVER_ADDR, value, "server address")
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|e| format!("{:?} is not an RFC 3339 timestamp: {}", value, e))
}

impl Args {
    fn query(&self) -> FederationQuery {
        FederationQuery {
            query_id: self.query_id.clone(),
            server_addr: self.server_addr.clone(),
            include_regions: parse_region_list(&self.regions),
            exclude_regions: parse_region_list(&self.exclude_regions),
            last_timestamp: self.last_timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

fn default_database() -> RepositoryManagerConfigRaw {
    RepositoryManagerConfigRaw {
        user: "keyserver".to_string(),
        password: None,
        database: "keyserver".to_string(),
        host: "localhost".to_string(),
        port: 5432,
        max_connections: 1,
        min_connections: 1,
    }
}

fn load_database_config(
    args: &Args,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<RepositoryManagerConfigRaw, CliError> {
    let mut figment = Figment::from(Serialized::defaults(default_database()));
    if args.config.exists() {
        figment = figment.merge(Figment::from(Toml::file(&args.config)).focus("database"));
    }

    let mut database: RepositoryManagerConfigRaw = figment.extract().map_err(Box::new)?;
    if let Some(password) = lookup("DB_PASSWORD") {
        database.password = Some(password);
    }
    Ok(database)
}

async fn run(args: Args) -> Result<(), CliError> {
    let query = args.query();
    let database = load_database_config(&args, |name| std::env::var(name).ok())?.resolve()?;

    let repositories = RepositoryManager::connect(&database).await?;
    repositories.federation_repository().add_query(&query).await?;

    tracing::info!(
        query_id = %query.query_id,
        server_addr = %query.server_addr,
        include_regions = ?query.include_regions,
        exclude_regions = ?query.exclude_regions,
        last_timestamp = %query.last_timestamp,
        "Federation query stored"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "Failed to store federation query");
            ExitCode::FAILURE
        }
    }
}
