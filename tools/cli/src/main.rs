//! cryptsync CLI - encrypting middleware between a local directory and a
//! cloud-sync folder.
//!
//! Runs the sync daemon, or performs one-shot encrypt/decrypt operations
//! using the same pipelines the daemon uses.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::FmtSubscriber;

use cryptsync_common::Config;
use cryptsync_crypto::GpgEngine;
use cryptsync_storage::{LocalFolderClient, SyncFolderClient};
use cryptsync_sync::{
    DecryptOutcome, DecryptPipeline, DirWatcher, EncryptOutcome, EncryptPipeline,
    SyncOrchestrator, DEBOUNCE_WINDOW,
};

#[derive(Parser)]
#[command(name = "cryptsync")]
#[command(about = "PGP-encrypting sync middleware for cloud folders")]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch both directions and sync until interrupted.
    Run,

    /// Encrypt one local file and upload it to the sync folder.
    Encrypt {
        /// File inside the monitored directory.
        file: PathBuf,
    },

    /// Decrypt one ciphertext file from the sync folder.
    Decrypt {
        /// File inside the encrypted mirror folder.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("cannot load config from {}", cli.config.display()))?;
    init_logging(cli.verbose, config.log_file.as_deref())?;

    match cli.command {
        Commands::Run => cmd_run(&config).await,
        Commands::Encrypt { file } => cmd_encrypt(&config, &file).await,
        Commands::Decrypt { file } => cmd_decrypt(&config, &file).await,
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact();

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(std::io::stderr.and(std::sync::Mutex::new(file)))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            tracing::subscriber::set_global_default(builder.finish())?;
        }
    }
    Ok(())
}

/// Build the engine and client shared by all commands. Key verification
/// failures are startup-fatal.
async fn connect(config: &Config) -> Result<(Arc<GpgEngine>, Arc<LocalFolderClient>)> {
    let engine = GpgEngine::new(config.pgp.gnupg_home.clone(), config.pgp.key_name.clone())
        .await
        .context("GPG verification failed")?;
    let client = LocalFolderClient::from_config(config).context("cannot open sync folder")?;
    Ok((Arc::new(engine), Arc::new(client)))
}

async fn cmd_run(config: &Config) -> Result<()> {
    let (engine, client) = connect(config).await?;

    let mut orchestrator = SyncOrchestrator::new(config, engine, client)?;
    orchestrator.start()?;

    let monitored = config.local.monitored_path.canonicalize()?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut watcher = DirWatcher::spawn(&monitored, DEBOUNCE_WINDOW, move |event| {
        let _ = tx.send(event);
    })?;

    info!("cryptsync running; press Ctrl-C to stop");
    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(event) => orchestrator.handle_local_change(&event.path).await,
                None => break,
            },
            _ = shutdown_signal() => {
                info!("Shutting down");
                break;
            }
        }
    }

    watcher.stop();
    orchestrator.stop().await;
    Ok(())
}

async fn cmd_encrypt(config: &Config, file: &Path) -> Result<()> {
    let (engine, client) = connect(config).await?;

    let monitored = config.local.monitored_path.canonicalize()?;
    let file = file.canonicalize()?;
    let pipeline = EncryptPipeline::new(monitored, engine, client);

    let mut records = HashMap::new();
    match pipeline.encrypt_and_upload(&file, &mut records).await? {
        EncryptOutcome::Uploaded => info!("Synced {}", file.display()),
        EncryptOutcome::Conflicted => warn!("Newer remote version exists; not uploaded"),
        EncryptOutcome::SkippedArtifact | EncryptOutcome::SkippedUnsafe => {
            warn!("Skipped {}", file.display())
        }
    }
    Ok(())
}

async fn cmd_decrypt(config: &Config, file: &Path) -> Result<()> {
    let (engine, client) = connect(config).await?;

    std::fs::create_dir_all(&config.local.monitored_path)?;
    std::fs::create_dir_all(&config.local.decrypted_path)?;
    let pipeline = DecryptPipeline::new(
        config.local.monitored_path.canonicalize()?,
        config.local.decrypted_path.canonicalize()?,
        client.encrypted_root().canonicalize()?,
        engine,
        config.pgp.passphrase.clone(),
    );

    match pipeline.decrypt_to_local(&file.canonicalize()?).await? {
        DecryptOutcome::Decrypted(target) => info!("Decrypted to {}", target.display()),
        DecryptOutcome::SkippedArtifact | DecryptOutcome::SkippedUnsafe => {
            warn!("Skipped {}", file.display())
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("Cannot install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
