//! Directory cache: path -> provider directory ID resolution
//!
//! Providers address directories by opaque IDs, while callers speak in
//! paths. [`DirectoryCache`] translates between the two, asking the
//! provider (through a [`DirectoryLookup`]) only for segments it has not
//! seen yet, and creating missing directories on demand.
//!
//! ## Root resolution
//!
//! Until [`DirectoryCache::find_root`] succeeds, cached paths are relative to
//! the provider's true root (the ID handed to [`DirectoryCache::new`]). Once
//! the configured root is resolved the cache is re-based: it is cleared and
//! `""` maps to the configured root's ID, so every later path is relative to
//! the configured root.
//!
//! A configured root may turn out to name a file. Backends handle that by
//! building a second cache rooted at the parent directory and resolving it
//! with [`DirectoryCache::find_root_as_parent_of_file`].
//!
//! ## Locking
//!
//! - The path/ID map sits behind a reader/writer lock: lookups run
//!   concurrently, every mutation is exclusive. It is never held across an
//!   `.await`.
//! - Resolution that talks to the provider is serialized by an async mutex,
//!   so two tasks resolving the same missing directory do not both create it.
//! - [`DirectoryCache::flush_dir`] and [`DirectoryCache::reset_root`] bump a
//!   generation counter under the map's write lock. A walk that finds the
//!   generation moved while it awaited the provider stops reading and
//!   writing the map, so an eviction is never undone by a stale insert.

pub mod bimap;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::path;
use crate::ports::DirectoryLookup;

pub use bimap::PathIdMap;

/// How far the configured root has been resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootState {
    /// Nothing resolved yet; paths are relative to the true root
    Unresolved,
    /// The configured root is a directory
    ResolvedAsDirectory,
    /// The configured root is the parent directory of a file-scoped view
    ResolvedAsParentOfFile,
}

#[derive(Debug)]
struct Resolution {
    state: RootState,
    root_id: String,
    root_parent_id: Option<String>,
}

/// Bidirectional path <-> directory ID cache for one backend instance
#[derive(Debug)]
pub struct DirectoryCache {
    /// Configured root, canonical and relative to the true root
    root: String,
    /// ID of the provider's top-level directory
    true_root_id: String,
    /// Path <-> ID pairs
    entries: RwLock<PathIdMap>,
    /// Root resolution state
    resolution: RwLock<Resolution>,
    /// Serializes resolution that issues provider calls
    resolving: tokio::sync::Mutex<()>,
    /// Bumped by every eviction, always with `entries` write-locked
    generation: AtomicU64,
}

impl DirectoryCache {
    /// Creates a cache for `root`, resolved later against `true_root_id`
    pub fn new(root: &str, true_root_id: impl Into<String>) -> Self {
        let true_root_id = true_root_id.into();
        let mut entries = PathIdMap::new();
        entries.insert("", true_root_id.clone());

        Self {
            root: path::canonical(root),
            resolution: RwLock::new(Resolution {
                state: RootState::Unresolved,
                root_id: true_root_id.clone(),
                root_parent_id: None,
            }),
            true_root_id,
            entries: RwLock::new(entries),
            resolving: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// The configured root
    pub fn root(&self) -> &str {
        &self.root
    }

    /// ID of the provider's top-level directory
    pub fn true_root_id(&self) -> &str {
        &self.true_root_id
    }

    /// Current root resolution state
    pub fn root_state(&self) -> RootState {
        self.resolution.read().state
    }

    /// True only if the root resolved as a directory
    pub fn found_root(&self) -> bool {
        self.root_state() == RootState::ResolvedAsDirectory
    }

    /// True if the root resolved either way, i.e. cached paths are relative
    /// to the configured root
    pub fn is_root_resolved(&self) -> bool {
        self.root_state() != RootState::Unresolved
    }

    /// ID of the configured root, once resolved
    pub fn root_id(&self) -> Option<String> {
        let resolution = self.resolution.read();
        (resolution.state != RootState::Unresolved).then(|| resolution.root_id.clone())
    }

    /// ID of the configured root's parent, if it was seen while resolving
    pub fn root_parent_id(&self) -> Option<String> {
        self.resolution.read().root_parent_id.clone()
    }

    // ========================================================================
    // Pure cache access
    // ========================================================================

    /// Looks up the cached ID for `path`
    pub fn get(&self, path: &str) -> Option<String> {
        self.entries.read().id(path).map(str::to_string)
    }

    /// Looks up the cached path for `id`
    pub fn get_inv(&self, id: &str) -> Option<String> {
        self.entries.read().path(id).map(str::to_string)
    }

    /// Records a known `path` -> `id` pair (e.g. from a listing)
    pub fn put(&self, path: &str, id: &str) {
        self.entries.write().insert(path::canonical(path), id);
    }

    /// Evicts `dir` and everything cached below it
    ///
    /// Flushing the root is the same as [`DirectoryCache::reset_root`].
    pub fn flush_dir(&self, dir: &str) {
        let dir = path::canonical(dir);
        if dir.is_empty() {
            self.reset_root();
            return;
        }
        let removed = {
            let mut entries = self.entries.write();
            self.generation.fetch_add(1, Ordering::SeqCst);
            entries.remove_subtree(&dir)
        };
        debug!(dir = %dir, removed, "Flushed directory cache subtree");
    }

    /// Clears the cache and forgets the root resolution
    pub fn reset_root(&self) {
        let mut entries = self.entries.write();
        let mut resolution = self.resolution.write();
        self.generation.fetch_add(1, Ordering::SeqCst);
        entries.clear();
        entries.insert("", self.true_root_id.clone());
        *resolution = Resolution {
            state: RootState::Unresolved,
            root_id: self.true_root_id.clone(),
            root_parent_id: None,
        };
        debug!(root = %self.root, "Directory cache reset");
    }

    /// Number of cached pairs, the root included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Always false: the root pair is never evicted
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolves the configured root to a directory ID
    ///
    /// Does nothing once the root is resolved. Fails with `DirNotFound` if
    /// the root is missing and `create` is false.
    pub async fn find_root<L>(&self, lookup: &L, create: bool) -> Result<()>
    where
        L: DirectoryLookup + ?Sized,
    {
        self.resolve_root(lookup, create, RootState::ResolvedAsDirectory)
            .await
    }

    /// Resolves the configured root as the parent directory of a file
    ///
    /// Used on a cache built for the parent of a root that turned out to
    /// name a file. Never creates directories.
    pub async fn find_root_as_parent_of_file<L>(&self, lookup: &L) -> Result<()>
    where
        L: DirectoryLookup + ?Sized,
    {
        self.resolve_root(lookup, false, RootState::ResolvedAsParentOfFile)
            .await
    }

    async fn resolve_root<L>(&self, lookup: &L, create: bool, target: RootState) -> Result<()>
    where
        L: DirectoryLookup + ?Sized,
    {
        if self.is_root_resolved() {
            return Ok(());
        }
        let _resolving = self.resolving.lock().await;
        if self.is_root_resolved() {
            return Ok(());
        }

        let root_id = self.resolve_locked(lookup, &self.root, create).await?;
        let (parent, _) = path::split(&self.root);
        let root_parent_id = if self.root.is_empty() {
            None
        } else {
            self.get(parent)
        };

        let mut entries = self.entries.write();
        let mut resolution = self.resolution.write();
        entries.clear();
        entries.insert("", root_id.clone());
        *resolution = Resolution {
            state: target,
            root_id: root_id.clone(),
            root_parent_id,
        };

        info!(root = %self.root, root_id = %root_id, state = ?target, "Resolved root");
        Ok(())
    }

    /// Resolves `dir` to a directory ID, creating missing segments if `create`
    ///
    /// Every segment resolved along the way is cached. Fails with
    /// `DirNotFound` if a segment is missing and `create` is false.
    pub async fn find_dir<L>(&self, lookup: &L, dir: &str, create: bool) -> Result<String>
    where
        L: DirectoryLookup + ?Sized,
    {
        let dir = path::canonical(dir);
        if let Some(id) = self.get(&dir) {
            return Ok(id);
        }
        let _resolving = self.resolving.lock().await;
        self.resolve_locked(lookup, &dir, create).await
    }

    /// Splits `remote` into `(leaf, directory ID)`, resolving only the parent
    pub async fn find_path<L>(&self, lookup: &L, remote: &str, create: bool) -> Result<(String, String)>
    where
        L: DirectoryLookup + ?Sized,
    {
        let remote = path::canonical(remote);
        let (dir, leaf) = path::split(&remote);
        let dir_id = self.find_dir(lookup, dir, create).await?;
        Ok((leaf.to_string(), dir_id))
    }

    /// [`find_root`](Self::find_root) followed by [`find_path`](Self::find_path)
    pub async fn find_root_and_path<L>(
        &self,
        lookup: &L,
        remote: &str,
        create: bool,
    ) -> Result<(String, String)>
    where
        L: DirectoryLookup + ?Sized,
    {
        self.find_root(lookup, create).await?;
        self.find_path(lookup, remote, create).await
    }

    /// Walks `dir` segment by segment; the caller holds `resolving`
    ///
    /// Once an eviction lands mid-walk the map no longer describes the tree
    /// the walk started from: the rest of the walk neither consults nor
    /// fills it, and only the resolved ID is returned.
    async fn resolve_locked<L>(&self, lookup: &L, dir: &str, create: bool) -> Result<String>
    where
        L: DirectoryLookup + ?Sized,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        // Another task may have filled it in while we waited for the lock
        if let Some(id) = self.get(dir) {
            return Ok(id);
        }

        let mut parent_id = self
            .get("")
            .unwrap_or_else(|| self.resolution.read().root_id.clone());
        let mut current = String::new();
        let mut detached = false;

        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            let next = path::join(&current, segment);
            let cached = if detached { None } else { self.get(&next) };
            parent_id = match cached {
                Some(id) => id,
                None => {
                    let id = match lookup.find_leaf(&parent_id, segment).await? {
                        Some(id) => id,
                        None if create => {
                            debug!(dir = %next, "Creating missing directory");
                            lookup.create_dir(&parent_id, segment).await?
                        }
                        None => return Err(Error::DirNotFound(next)),
                    };
                    if !detached && !self.put_if_generation(&next, &id, generation) {
                        debug!(dir = %next, "Cache flushed during resolution, not caching");
                        detached = true;
                    }
                    id
                }
            };
            current = next;
        }

        Ok(parent_id)
    }

    /// Inserts `path -> id` unless an eviction happened since `generation`
    fn put_if_generation(&self, path: &str, id: &str, generation: u64) -> bool {
        let mut entries = self.entries.write();
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        entries.insert(path::canonical(path), id);
        true
    }
}
