//! Filesystem port exposed to the sync layer
//!
//! Every backend composes the core components into this uniform surface.
//! Paths are canonical and relative to the backend's root (see
//! [`crate::path`]).
//!
//! ## Design Notes
//!
//! - Uses `#[async_trait]` like the other ports.
//! - Objects are owned handles that keep a reference to their backend, so
//!   object-level calls (`open`, `hash`, `set_mod_time`, `remove`) need no
//!   extra arguments.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use crate::error::{Error, Result};

/// Upload source handed to [`RemoteFs::put`]
pub type PutStream = Box<dyn AsyncRead + Send + Unpin>;

/// Download stream returned by [`RemoteObject::open`]
pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;

/// Byte range requested from [`RemoteObject::open`]; offsets are inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadRange {
    /// The whole object
    #[default]
    All,
    /// From the offset to the end
    From(u64),
    /// From the first offset through the second
    Between(u64, u64),
    /// The final `n` bytes
    Last(u64),
}

impl ReadRange {
    /// Clamps the range to an object of `size` bytes
    ///
    /// Ranges that cover the whole object collapse to [`ReadRange::All`];
    /// ends past the last byte are pulled back to it. A start past the end
    /// is left alone for the provider to reject.
    pub fn fix(self, size: u64) -> ReadRange {
        if size == 0 {
            return ReadRange::All;
        }
        let last = size - 1;
        match self {
            ReadRange::From(0) => ReadRange::All,
            ReadRange::Between(0, end) if end >= last => ReadRange::All,
            ReadRange::Between(start, end) if end >= last => ReadRange::From(start),
            ReadRange::Last(n) if n >= size => ReadRange::All,
            other => other,
        }
    }

    /// Value of the HTTP `Range` header, `None` for the whole object
    pub fn header(&self) -> Option<String> {
        match self {
            ReadRange::All => None,
            ReadRange::From(start) => Some(format!("bytes={start}-")),
            ReadRange::Between(start, end) => Some(format!("bytes={start}-{end}")),
            ReadRange::Last(n) => Some(format!("bytes=-{n}")),
        }
    }
}

/// Content hash algorithms a backend may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashType {
    /// SHA-1, lowercase hex
    Sha1,
    /// Microsoft QuickXorHash, lowercase hex
    QuickXor,
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashType::Sha1 => write!(f, "sha1"),
            HashType::QuickXor => write!(f, "quickxor"),
        }
    }
}

impl FromStr for HashType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(HashType::Sha1),
            "quickxor" | "quickxorhash" => Ok(HashType::QuickXor),
            other => Err(Error::Unsupported(format!("hash algorithm {other:?}"))),
        }
    }
}

/// Size and timestamp of the data being uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutInfo {
    /// Destination path relative to the backend root
    pub remote: String,
    /// Declared total size in bytes
    pub size: u64,
    /// Modification time to record on the remote object
    pub mod_time: DateTime<Utc>,
}

impl PutInfo {
    pub fn new(remote: impl Into<String>, size: u64, mod_time: DateTime<Utc>) -> Self {
        Self {
            remote: remote.into(),
            size,
            mod_time,
        }
    }
}

/// A directory as seen in a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    /// Path relative to the backend root
    pub remote: String,
    /// Provider directory ID
    pub id: String,
    /// Last modification time, if the provider reports one
    pub mod_time: Option<DateTime<Utc>>,
    /// Number of children, if the provider reports it
    pub items: Option<u64>,
}

/// One entry of a directory listing
#[derive(Debug, Clone)]
pub enum DirEntry<O> {
    Dir(Directory),
    Object(O),
}

impl<O: RemoteObject> DirEntry<O> {
    /// Path of the entry relative to the backend root
    pub fn remote(&self) -> &str {
        match self {
            DirEntry::Dir(d) => &d.remote,
            DirEntry::Object(o) => o.remote(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, DirEntry::Dir(_))
    }
}

/// Storage quota figures; `None` when the provider does not report one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub total: Option<u64>,
    pub used: Option<u64>,
    pub trashed: Option<u64>,
    pub free: Option<u64>,
}

/// How the configured root was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootScope {
    /// The root names a directory; the view covers its subtree
    Directory,
    /// The root names a file; the view covers just that file, named `leaf`
    /// inside the parent directory
    File { leaf: String },
}

/// A file stored on a backend
#[async_trait]
pub trait RemoteObject: Send + Sync {
    /// Path relative to the backend root
    fn remote(&self) -> &str;

    /// Size in bytes
    fn size(&self) -> u64;

    /// Provider object ID
    fn id(&self) -> &str;

    /// Returns the hash of the given type, or `Unsupported`
    fn hash(&self, hash_type: HashType) -> Result<String>;

    /// Modification time
    fn mod_time(&self) -> DateTime<Utc>;

    /// Opens the object's content, or the given part of it, for reading
    ///
    /// A full read may correct [`size`](RemoteObject::size) when the provider
    /// reports a different length than the listing did.
    async fn open(&mut self, range: ReadRange) -> Result<ReadStream>;

    /// Sets the modification time on the remote object
    async fn set_mod_time(&mut self, mod_time: DateTime<Utc>) -> Result<()>;

    /// Deletes the object
    async fn remove(&self) -> Result<()>;
}

/// Uniform filesystem surface of one backend instance
#[async_trait]
pub trait RemoteFs: Send + Sync {
    type Object: RemoteObject;

    /// The configured root, canonical
    fn root(&self) -> &str;

    /// Whether the root resolved to a directory or a single file
    fn scope(&self) -> &RootScope;

    /// Hash types this backend can report
    fn hashes(&self) -> Vec<HashType>;

    /// Lists the entries of `dir`; fails with `DirNotFound` if it is absent
    async fn list(&self, dir: &str) -> Result<Vec<DirEntry<Self::Object>>>;

    /// Finds the object at `remote`; fails with `NotFound` if it is absent
    async fn new_object(&self, remote: &str) -> Result<Self::Object>;

    /// Uploads `input` to `info.remote`, creating parent directories
    async fn put(&self, input: PutStream, info: &PutInfo) -> Result<Self::Object>;

    /// Creates `dir` and any missing parents
    async fn mkdir(&self, dir: &str) -> Result<()>;

    /// Removes `dir`, which must be empty
    async fn rmdir(&self, dir: &str) -> Result<()>;

    /// Removes the root directory and everything in it
    async fn purge(&self) -> Result<()>;

    /// Server-side copy of `src` to `remote`
    async fn copy(&self, src: &Self::Object, remote: &str) -> Result<Self::Object>;

    /// Server-side move of `src` to `remote`
    async fn move_object(&self, src: &Self::Object, remote: &str) -> Result<Self::Object>;

    /// Server-side move of directory `src_remote` on `src` to `dst_remote` here
    async fn dir_move(&self, src: &Self, src_remote: &str, dst_remote: &str) -> Result<()>;

    /// Quota information
    async fn about(&self) -> Result<Usage>;

    /// Drops every cached directory ID and forgets the root resolution
    fn dir_cache_flush(&self);
}
