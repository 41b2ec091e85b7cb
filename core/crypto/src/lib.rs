//! Crypto engine boundary for cryptsync.
//!
//! PGP operations are delegated to an external engine; this crate defines
//! the boundary trait, the GnuPG-backed production engine, and content
//! digests used for decrypt verification.

pub mod digest;
pub mod engine;
pub mod gpg;

pub use digest::file_digest;
pub use engine::CryptoEngine;
pub use gpg::GpgEngine;
