use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;

use atomclient::atom::{AtomEntry, AtomEntryExtractor};
use atomclient::client::ReqwestTransport;
use atomclient::{Config, FeedClient};

/// Get the config directory path (~/.config/atomclient/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("atomclient"))
}

#[derive(Parser, Debug)]
#[command(name = "atomclient", about = "Fetch and post entries on Atom-based APIs")]
struct Args {
    /// Config file (default: ~/.config/atomclient/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// OAuth access token (overrides config file and ATOMCLIENT_ACCESS_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a single entry document
    Entry { url: String },
    /// Fetch a feed and list its entries
    Feed { url: String },
    /// Post a new entry to a collection
    Post {
        url: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let client = match args.token {
        Some(token) => {
            let transport = ReqwestTransport::from_config(&config)
                .context("Failed to initialize HTTP client")?
                .with_access_token(SecretString::from(token));
            FeedClient::new(Arc::new(transport), true)
        }
        None => FeedClient::from_config(&config).context("Failed to initialize HTTP client")?,
    };
    if !client.is_authorized() {
        tracing::warn!("No access token configured; requests will be refused");
    }

    let output = match args.command {
        Command::Entry { url } => {
            let entry: AtomEntry = client
                .fetch_entry(&url, &AtomEntryExtractor)
                .await
                .with_context(|| format!("Failed to fetch entry {}", url))?;
            serde_json::to_string_pretty(&entry)?
        }
        Command::Feed { url } => {
            let entries: Vec<AtomEntry> = client
                .fetch_feed_entries(&url, &AtomEntryExtractor)
                .await
                .with_context(|| format!("Failed to fetch feed {}", url))?;
            tracing::info!(count = entries.len(), "Fetched feed");
            serde_json::to_string_pretty(&entries)?
        }
        Command::Post {
            url,
            title,
            content,
            id,
        } => {
            let entry = AtomEntry {
                id: id.unwrap_or_default(),
                content,
                ..AtomEntry::new(title)
            };
            let created: AtomEntry = client
                .post_entry(&url, &entry.to_element(), &AtomEntryExtractor)
                .await
                .with_context(|| format!("Failed to post entry to {}", url))?;
            serde_json::to_string_pretty(&created)?
        }
    };

    println!("{}", output);
    Ok(())
}
