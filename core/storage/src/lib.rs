//! Sync folder client boundary for cryptsync.
//!
//! The cloud provider is never talked to directly; its agent mirrors state
//! into a local folder, and this crate abstracts operations against that
//! mirror.

pub mod client;
pub mod local;

pub use client::{RemoteFile, SyncFolderClient};
pub use local::LocalFolderClient;
