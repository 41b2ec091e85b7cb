//! Common utilities and types shared across cryptsync modules.
//!
//! This module provides foundational types that are used throughout the codebase,
//! ensuring consistency and type safety.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, LocalConfig, PgpConfig, SyncFolderConfig};
pub use error::{Error, Result};
pub use types::{Passphrase, SyncPath};
