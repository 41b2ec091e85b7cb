//! cryptsync orchestration engine.
//!
//! Sits between a plaintext directory and a cloud-sync mirror folder:
//! - Path safety validation (containment, no symlinked ancestry)
//! - Conflict detection via modification times
//! - Encrypt/upload and decrypt/write pipelines
//! - Debounced change sources for both directions
//! - A single-lock orchestrator serializing all handling

pub mod conflict;
pub mod decrypt;
pub mod encrypt;
pub mod orchestrator;
pub mod pathsafe;
pub mod watch;

pub use conflict::{ciphertext_path, has_newer_remote};
pub use decrypt::{DecryptOutcome, DecryptPipeline, MAX_PASSPHRASE_ATTEMPTS};
pub use encrypt::{conflict_marker_path, EncryptOutcome, EncryptPipeline};
pub use orchestrator::{SyncOrchestrator, SyncShared};
pub use pathsafe::is_safe;
pub use watch::{ChangeEvent, ChangeKind, DirWatcher, DEBOUNCE_WINDOW};
