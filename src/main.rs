//! AgriVoice - offline store and voice services for farm assistants
//!
//! Command-line front end over the library services.

use agrivoice::asr::WyomingClient;
use agrivoice::config::Config;
use agrivoice::store::{OfflineStore, SqliteBackend};
use agrivoice::sync::{Connectivity, ConnectivityMonitor, HttpSink, LogSink, SyncCoordinator, SyncSink};
use agrivoice::{Language, VoiceServices};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Store a JSON payload in the offline cache
    Put { key: String, json: String },
    /// Print a cached payload
    Get { key: String },
    /// Remove a cached payload
    Rm { key: String },
    /// List cached keys
    Keys,
    /// Queue a JSON payload for the next sync
    Queue { key: String, json: String },
    /// List pending operations
    Pending,
    /// Drop a pending operation without syncing it
    Discard { key: String },
    /// Mark the network reachable and drain pending operations
    Sync,
    /// List synthesis voices and recognizer languages
    Voices,
    /// Speak text aloud
    Speak {
        text: String,
        #[arg(short, long)]
        lang: Option<Language>,
    },
    /// Capture one utterance and print its transcript
    Listen {
        #[arg(short, long)]
        lang: Option<Language>,
    },
}

fn init_logging(verbose: bool, config: &Config) {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.log_level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn open_store(config: &Config) -> Result<OfflineStore> {
    let backend = SqliteBackend::open(&config.store_path)
        .with_context(|| format!("Failed to open store at {}", config.store_path))?;
    let store = OfflineStore::new(Arc::new(backend));
    store.migrate_legacy_pending(&config.legacy_pending_prefix).await;
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    init_logging(args.verbose, &config);

    info!("🌾 AgriVoice v{} starting...", env!("CARGO_PKG_VERSION"));

    match args.command {
        Cmd::Put { key, json } => {
            let payload: serde_json::Value = serde_json::from_str(&json)?;
            open_store(&config).await?.write(&key, &payload).await;
        }
        Cmd::Get { key } => {
            let store = open_store(&config).await?;
            match store.read::<serde_json::Value>(&key).await {
                Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
                None => println!("(absent)"),
            }
        }
        Cmd::Rm { key } => open_store(&config).await?.remove(&key).await,
        Cmd::Keys => {
            for key in open_store(&config).await?.list_keys().await {
                println!("{}", key);
            }
        }
        Cmd::Queue { key, json } => {
            let payload: serde_json::Value = serde_json::from_str(&json)?;
            open_store(&config).await?.queue_pending(&key, &payload).await;
        }
        Cmd::Pending => {
            for key in open_store(&config).await?.pending_keys().await {
                println!("{}", key);
            }
        }
        Cmd::Discard { key } => open_store(&config).await?.discard_pending(&key).await,
        Cmd::Sync => {
            let store = open_store(&config).await?;
            let sink: Arc<dyn SyncSink> = match &config.sync_endpoint {
                Some(endpoint) => Arc::new(HttpSink::new(
                    endpoint,
                    Duration::from_secs(config.sync_timeout_secs),
                )),
                None => {
                    warn!("No sync endpoint configured, logging pending operations only");
                    Arc::new(LogSink)
                }
            };
            let monitor = ConnectivityMonitor::new(Connectivity::Offline);
            let coordinator = SyncCoordinator::new(store, sink, monitor.clone());
            monitor.set(Connectivity::Online);

            let report = coordinator.drain().await;
            println!(
                "delivered {}, still pending {}",
                report.delivered.len(),
                report.failed.len()
            );
        }
        Cmd::Voices => {
            let voice = VoiceServices::from_config(&config).await;
            match voice.output().resolver() {
                Some(resolver) => {
                    for v in resolver.voices() {
                        println!("{:<24} {}", v.name, v.locale);
                    }
                    for lang in Language::ALL {
                        if let Some(v) = resolver.resolve(lang) {
                            println!("{} -> {}", lang, v.name);
                        }
                    }
                }
                None => println!("speech synthesis unavailable"),
            }

            let client = WyomingClient::new(&config.wyoming_host, config.wyoming_port);
            match client.describe().await {
                Ok(info) => println!("recognizer languages: {}", info.languages().join(", ")),
                Err(e) => println!("recognizer unavailable: {}", e),
            }
        }
        Cmd::Speak { text, lang } => {
            let voice = VoiceServices::from_config(&config).await;
            voice.speak(&text, lang.unwrap_or(config.language)).await?;
        }
        Cmd::Listen { lang } => {
            let voice = VoiceServices::from_config(&config).await;
            let lang = lang.unwrap_or(config.language);
            let transcript = tokio::select! {
                result = voice.listen(lang) => result?,
                _ = tokio::signal::ctrl_c() => {
                    voice.stop();
                    return Ok(());
                }
            };
            println!("{}", transcript);
        }
    }

    Ok(())
}
