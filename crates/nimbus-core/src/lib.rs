//! Nimbus Core - provider-agnostic machinery shared by every storage backend
//!
//! This crate contains:
//! - **Directory cache** - [`DirectoryCache`], path <-> directory ID resolution with lazy creation
//! - **Retry pacer** - [`RetryPacer`], serialized calls with adaptive exponential backoff
//! - **Chunked uploads** - [`ChunkedUpload`], resumable fragment-based upload sessions
//! - **Token renewal** - [`TokenRenewer`], background renewal scoped to long operations
//! - **Port definitions** - Traits backends implement: `DirectoryLookup`, `ChunkedUploader`, `RemoteFs`
//!
//! # Architecture
//!
//! The core follows the ports & adapters pattern. It knows nothing about any
//! provider's wire format: backends implement the port traits and compose the
//! components above into filesystem operations.

pub mod config;
pub mod dircache;
pub mod error;
pub mod logging;
pub mod pacer;
pub mod path;
pub mod ports;
pub mod renew;
pub mod upload;

pub use dircache::{DirectoryCache, RootState};
pub use error::{Error, Result};
pub use pacer::{Failure, RetryPacer};
pub use renew::{RenewGuard, TokenRenewer};
pub use upload::{ChunkedUpload, ChunkedUploader, Fragment};
