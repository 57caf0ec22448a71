//! Port definitions
//!
//! Ports are the trait boundaries between the provider-agnostic core and
//! the backend adapters.
//!
//! ## Ports Overview
//!
//! - [`DirectoryLookup`] - find/create a directory by name (consumed by the directory cache)
//! - [`RemoteFs`] / [`RemoteObject`] - the filesystem surface every backend exposes

pub mod directory;
pub mod filesystem;

pub use directory::DirectoryLookup;
pub use filesystem::{
    DirEntry, Directory, HashType, PutInfo, PutStream, ReadRange, ReadStream, RemoteFs,
    RemoteObject, RootScope, Usage,
};
