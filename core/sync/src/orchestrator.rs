//! Sync orchestrator: lock ownership, processed-file cache, lifecycle.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use cryptsync_common::{Config, Result};
use cryptsync_crypto::CryptoEngine;
use cryptsync_storage::SyncFolderClient;

use crate::decrypt::DecryptPipeline;
use crate::encrypt::{EncryptOutcome, EncryptPipeline};
use crate::watch::{DirWatcher, DEBOUNCE_WINDOW};

/// State shared between the two sync directions, guarded by one lock.
#[derive(Debug, Default)]
pub struct SyncShared {
    /// Relative path -> last local modification time processed.
    ///
    /// Grows for the process lifetime; never persisted or evicted.
    pub records: HashMap<String, DateTime<Utc>>,
}

/// Serializes all sync handling behind a single lock.
///
/// Exactly one sync operation (either direction) executes at any instant;
/// an event arriving while another is in progress waits for the lock.
/// The local change source is owned and supplied by the caller; the remote
/// one is owned here and controlled through `start`/`stop`.
pub struct SyncOrchestrator {
    shared: Arc<Mutex<SyncShared>>,
    encrypt: EncryptPipeline,
    decrypt: DecryptPipeline,
    encrypted_root: PathBuf,
    remote_watcher: Option<DirWatcher>,
    remote_task: Option<JoinHandle<()>>,
}

impl SyncOrchestrator {
    /// Create the orchestrator and its pipelines.
    ///
    /// # Postconditions
    /// - Monitored and decrypted directories exist
    ///
    /// # Errors
    /// - Directories cannot be created or resolved
    pub fn new(
        config: &Config,
        engine: Arc<dyn CryptoEngine>,
        client: Arc<dyn SyncFolderClient>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.local.monitored_path)?;
        std::fs::create_dir_all(&config.local.decrypted_path)?;

        let monitored_root = config.local.monitored_path.canonicalize()?;
        let decrypted_root = config.local.decrypted_path.canonicalize()?;
        let encrypted_root = client.encrypted_root().canonicalize()?;

        let encrypt = EncryptPipeline::new(monitored_root.clone(), engine.clone(), client);
        let decrypt = DecryptPipeline::new(
            monitored_root,
            decrypted_root,
            encrypted_root.clone(),
            engine,
            config.pgp.passphrase.clone(),
        );

        Ok(Self {
            shared: Arc::new(Mutex::new(SyncShared::default())),
            encrypt,
            decrypt,
            encrypted_root,
            remote_watcher: None,
            remote_task: None,
        })
    }

    /// Handle a local plaintext change. Serialized behind the shared lock,
    /// which is released on every exit path by guard scope. Failures are
    /// logged; they never propagate.
    pub async fn handle_local_change(&self, path: &Path) {
        let mut shared = self.shared.lock().await;
        match self
            .encrypt
            .encrypt_and_upload(path, &mut shared.records)
            .await
        {
            Ok(EncryptOutcome::Uploaded) => info!("Synced {}", path.display()),
            Ok(_) => {}
            Err(e) => error!("Error handling local change for {}: {}", path.display(), e),
        }
    }

    /// Handle a remote ciphertext change. Serialized behind the shared lock.
    pub async fn handle_remote_change(&self, path: &Path) {
        let _guard = self.shared.lock().await;
        handle_remote_locked(&self.decrypt, path).await;
    }

    /// Subscribe to the remote change source. No-op when already started.
    pub fn start(&mut self) -> Result<()> {
        if self.remote_task.is_some() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = DirWatcher::spawn(&self.encrypted_root, DEBOUNCE_WINDOW, move |event| {
            let _ = tx.send(event);
        })?;

        let shared = self.shared.clone();
        let decrypt = self.decrypt.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let _guard = shared.lock().await;
                handle_remote_locked(&decrypt, &event.path).await;
            }
        });

        self.remote_watcher = Some(watcher);
        self.remote_task = Some(task);
        info!("Sync orchestrator started");
        Ok(())
    }

    /// Unsubscribe from the remote change source and join its consumer.
    /// Idempotent; never interrupts a pipeline call already holding the
    /// lock.
    pub async fn stop(&mut self) {
        let was_running = self.remote_task.is_some();

        if let Some(mut watcher) = self.remote_watcher.take() {
            watcher.stop();
        }
        if let Some(task) = self.remote_task.take() {
            // Stopping the watcher dropped the event sender; the consumer
            // drains the channel and exits on its own.
            let _ = task.await;
        }

        if was_running {
            info!("Sync orchestrator stopped");
        }
    }

    /// Snapshot of the processed-file cache. Mainly for tests and status
    /// reporting.
    pub async fn records(&self) -> HashMap<String, DateTime<Utc>> {
        self.shared.lock().await.records.clone()
    }
}

async fn handle_remote_locked(pipeline: &DecryptPipeline, path: &Path) {
    if let Err(e) = pipeline.decrypt_to_local(path).await {
        error!("Error handling remote change for {}: {}", path.display(), e);
    }
}
