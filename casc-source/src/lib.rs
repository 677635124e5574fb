//! Storage sources: the orchestration layer of the CASC client.
//!
//! A [`StorageSource`] drives the full resolution chain (FileDataID →
//! content key → encoding key → container bytes) against either a local
//! game installation (journal-indexed `data.NNN` files with CDN fallback)
//! or a remote CDN (archive indexes with ranged fetches). The
//! [`CoreView`] holds at most one active source and stages the next one
//! behind a two-phase pending → active swap.

pub mod build;
pub mod error;
pub mod local;
pub mod remote;
pub mod source;
pub mod tact;
pub mod view;

pub use build::Build;
pub use error::{Error, Result};
pub use local::LocalSource;
pub use remote::RemoteSource;
pub use source::{resolve_encoding_key, StorageSource};
pub use view::{CoreView, SharedSource};
