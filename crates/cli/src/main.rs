use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streamvault_session::{SessionStore, SqliteSessionStore};
use streamvault_uploader::{
    DEFAULT_CHUNK_SIZE, HttpPartTransport, HttpStorageGateway, MIN_PART_SIZE, RetryPolicy,
    SessionResolution, SourceFile, UploadConfig, UploadCoordinator, UploadError,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "StreamVault CLI - resumable uploads and session management", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the StreamVault gateway.
    #[arg(long, default_value = "http://localhost:3000")]
    server: String,

    /// SQLite database holding resumable upload sessions.
    #[arg(long, default_value = "sqlite:./streamvault-sessions.db")]
    session_db: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a file, resuming a stored session when one matches.
    Upload {
        file: PathBuf,

        /// Part size in bytes.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: u64,

        /// Parts transferred at once.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Retries per part after the first attempt.
        #[arg(long, default_value_t = 3)]
        max_retries: usize,

        #[arg(long, default_value_t = 500)]
        backoff_base_ms: u64,

        #[arg(long, default_value_t = 8000)]
        backoff_max_ms: u64,
    },
    /// Inspect or discard stored upload sessions.
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    List,
    Show {
        file_key: String,
    },
    /// Abort the remote upload and delete the stored session.
    Abandon {
        file_key: String,
    },
    /// Abandon every session older than the given age.
    Prune {
        #[arg(long, default_value_t = 7)]
        older_than_days: i64,
    },
}

fn setup_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    setup_tracing();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Upload {
            file,
            chunk_size,
            concurrency,
            max_retries,
            backoff_base_ms,
            backoff_max_ms,
        } => {
            let config = UploadConfig {
                chunk_size: *chunk_size,
                concurrency: *concurrency,
                retry: RetryPolicy {
                    max_retries: *max_retries,
                    backoff_base_ms: *backoff_base_ms,
                    backoff_max_ms: *backoff_max_ms,
                },
            };
            handle_upload(&cli, file, config).await?;
        }
        Commands::Sessions { command } => {
            handle_sessions_command(command, &cli).await?;
        }
    }

    Ok(())
}

async fn open_session_store(database_url: &str) -> Result<SqliteSessionStore> {
    streamvault_session::migrations::ensure_database_exists(database_url).await?;
    let store = SqliteSessionStore::connect(database_url).await?;
    streamvault_session::migrations::run_migrations(store.pool()).await?;
    Ok(store)
}

fn protocol_coordinator(
    cli: &Cli,
    store: SqliteSessionStore,
    config: UploadConfig,
) -> UploadCoordinator<HttpStorageGateway, SqliteSessionStore, HttpPartTransport> {
    let client = reqwest::Client::new();
    UploadCoordinator::new(
        HttpStorageGateway::new(client.clone(), cli.server.clone()),
        store,
        HttpPartTransport::new(client),
        config,
    )
}

async fn handle_upload(cli: &Cli, file: &Path, config: UploadConfig) -> Result<()> {
    let store = open_session_store(&cli.session_db).await?;

    let source = SourceFile::inspect(file).await?;
    println!(
        "Uploading '{}' ({} bytes, {})",
        source.file_name, source.size, source.content_type
    );
    if source.size > config.chunk_size && config.chunk_size < MIN_PART_SIZE {
        eprintln!(
            "Warning: parts below {} bytes may be rejected when the upload completes",
            MIN_PART_SIZE
        );
    }

    let coordinator = protocol_coordinator(cli, store, config).with_progress(|progress| {
        println!(
            "Upload progress: {}% ({}/{} parts)",
            progress.percent(),
            progress.recorded_parts,
            progress.total_parts
        );
    });

    match coordinator.upload(&source).await {
        Ok(outcome) => {
            match outcome.resolution {
                SessionResolution::Fresh => {
                    println!("Started a new upload session");
                }
                SessionResolution::Resumed { recorded_parts } => {
                    println!("Resumed a session with {} part(s) already uploaded", recorded_parts);
                }
                SessionResolution::Replaced => {
                    println!("Stored session no longer matched the file, started over");
                }
            }
            println!(
                "Transferred {} part(s), reused {}, {} total",
                outcome.parts_transferred, outcome.parts_reused, outcome.total_parts
            );
            println!("Upload complete: {}", outcome.location);
        }
        Err(err) => {
            eprintln!("Upload failed: {err}");
            if matches!(
                err,
                UploadError::PartTransferFailed { .. } | UploadError::CompletionFailed(_)
            ) {
                eprintln!("Progress was kept; run the same command again to resume.");
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn handle_sessions_command(command: &SessionCommands, cli: &Cli) -> Result<()> {
    let store = open_session_store(&cli.session_db).await?;

    match command {
        SessionCommands::List => {
            let keys = store.list_keys().await?;
            if keys.is_empty() {
                println!("No upload sessions found");
            } else {
                println!("Upload sessions:");
                for key in keys {
                    if let Some(session) = store.get(&key).await? {
                        println!(
                            "  {} - {} bytes, {} part(s) recorded, started {}",
                            key,
                            session.file_size,
                            session.part_count(),
                            session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                        );
                    }
                }
            }
        }
        SessionCommands::Show { file_key } => match store.get(file_key).await? {
            Some(session) => {
                println!("Session '{}':", session.file_key);
                println!("  Upload ID: {}", session.upload_id);
                println!(
                    "  File: {} ({} bytes, {})",
                    session.file_name, session.file_size, session.file_type
                );
                println!(
                    "  Started: {}",
                    session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                let numbers: Vec<u32> = session
                    .uploaded_parts
                    .iter()
                    .map(|part| part.part_number)
                    .collect();
                println!("  Uploaded parts: {:?}", numbers);
            }
            None => {
                eprintln!("No session stored for '{}'", file_key);
                std::process::exit(1);
            }
        },
        SessionCommands::Abandon { file_key } => {
            let coordinator = protocol_coordinator(cli, store, UploadConfig::default());
            match coordinator.abandon(file_key).await {
                Ok(()) => {
                    println!("Abandoned upload session '{}'", file_key);
                }
                Err(UploadError::SessionNotFound(_)) => {
                    eprintln!("No session stored for '{}'", file_key);
                    std::process::exit(1);
                }
                Err(err) => {
                    eprintln!("Failed to abandon session: {err}");
                    std::process::exit(1);
                }
            }
        }
        SessionCommands::Prune { older_than_days } => {
            let cutoff = chrono::Utc::now() - chrono::Duration::days(*older_than_days);
            let coordinator = protocol_coordinator(cli, store.clone(), UploadConfig::default());

            let mut pruned = 0;
            for key in store.list_keys().await? {
                let Some(session) = store.get(&key).await? else {
                    continue;
                };
                if session.created_at < cutoff {
                    match coordinator.abandon(&key).await {
                        Ok(()) => {
                            println!(
                                "Pruned '{}' (started {})",
                                key,
                                session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                            );
                            pruned += 1;
                        }
                        Err(err) => {
                            eprintln!("Failed to prune '{}': {err}", key);
                        }
                    }
                }
            }
            println!("Pruned {} session(s)", pruned);
        }
    }

    Ok(())
}
