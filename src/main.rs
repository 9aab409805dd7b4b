use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use rivulet::aggregator;
use rivulet::config::Config;
use rivulet::http::{self, AppState};
use rivulet::sanitize::Sanitizer;
use rivulet::store::{StoreError, SubscriptionStore};
use rivulet::util::strip_control_chars;

#[derive(Parser, Debug)]
#[command(
    name = "rivulet",
    about = "Aggregates RSS/Atom subscriptions into a single article stream"
)]
struct Args {
    /// Use an alternate config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the feed endpoint HTTP server
    Serve,
    /// List subscriptions
    List,
    /// Subscribe to a feed URL (or a page URL, resolved at refresh time)
    Add {
        url: String,
        /// Display name used when the feed reports no title of its own
        #[arg(long)]
        name: Option<String>,
    },
    /// Unsubscribe from a feed URL (no-op when not subscribed)
    Remove { url: String },
    /// Fetch every subscription and print the merged newest-first stream
    Refresh {
        /// Emit articles as JSON, with HTML fields sanitized
        #[arg(long)]
        json: bool,
    },
}

/// Get the config directory path (~/.config/rivulet/)
fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("rivulet"))
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("rivulet/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let default_dir = config_dir()?;
    let config_path = args
        .config
        .unwrap_or_else(|| default_dir.join("config.toml"));
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    let data_dir = config.data_dir.clone().unwrap_or(default_dir);
    let store_path = data_dir.join("subscriptions.json");

    match args.command {
        Command::Serve => serve(&config).await,
        Command::List => {
            let store = SubscriptionStore::open(store_path)?;
            for sub in store.list() {
                match &sub.name {
                    Some(name) => println!("{}  ({})", sub.url, name),
                    None => println!("{}", sub.url),
                }
            }
            Ok(())
        }
        Command::Add { url, name } => {
            let mut store = SubscriptionStore::open(store_path)?;
            match store.add(&url, name.as_deref()) {
                Ok(sub) => {
                    println!("Subscribed to {}", sub.url);
                    Ok(())
                }
                // User-correctable: show the specific reason, not a backtrace
                Err(e @ (StoreError::Duplicate(_) | StoreError::InvalidUrl(_))) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::Remove { url } => {
            let mut store = SubscriptionStore::open(store_path)?;
            store.remove(&url)?;
            println!("Unsubscribed from {url}");
            Ok(())
        }
        Command::Refresh { json } => run_refresh(&config, store_path, json).await,
    }
}

async fn serve(config: &Config) -> Result<()> {
    let client = build_client()?;
    let app = http::router(Arc::new(AppState { client }));

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    tracing::info!(listen = %config.listen, "Feed endpoint listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_refresh(config: &Config, store_path: PathBuf, json: bool) -> Result<()> {
    let store = SubscriptionStore::open(store_path)?;
    let client = build_client()?;

    let articles = aggregator::refresh(&client, store.list()).await;

    if json {
        // Sanitize at the render boundary, not during aggregation
        let sanitizer = Sanitizer::new(config.sanitize);
        let rendered: Vec<_> = articles
            .into_iter()
            .map(|mut article| {
                article.content = article.content.map(|c| sanitizer.clean(&c));
                article.content_snippet =
                    article.content_snippet.map(|s| sanitizer.clean(&s));
                article
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
        return Ok(());
    }

    if articles.is_empty() {
        println!("No articles.");
        return Ok(());
    }

    for article in &articles {
        println!(
            "{}  [{}]  {}",
            article.pub_date.format("%Y-%m-%d %H:%M"),
            strip_control_chars(&article.source_title),
            strip_control_chars(&article.title)
        );
        println!("    {}", article.link);
    }

    Ok(())
}
