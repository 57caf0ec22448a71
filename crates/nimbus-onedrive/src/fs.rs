//! OneDrive filesystem
//!
//! [`OneDriveFs`] composes the core components over Microsoft Graph:
//!
//! - a [`DirectoryCache`] per instance, fed by this type's
//!   [`DirectoryLookup`] implementation (path lookups under the root);
//! - one [`RetryPacer`] shared by every call of the connection;
//! - [`ChunkedUpload`] with a [`GraphUploader`] for uploads;
//! - a [`TokenRenewer`] held for the duration of uploads and copies, which
//!   pulls fresh tokens from the client's [`TokenSource`](crate::TokenSource).
//!
//! ## Root resolution
//!
//! [`OneDriveFs::new`] resolves the configured root. If it does not name a
//! directory, the parent is resolved instead and the leaf is looked up as a
//! file: when it exists the instance is scoped to that single file
//! ([`RootScope::File`]), otherwise the directory-scoped instance is returned
//! unresolved so a later `mkdir` or `put` can create it.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use nimbus_core::config::{Config, TimeoutsConfig, UploadConfig, ONEDRIVE_CHUNK_ALIGNMENT};
use nimbus_core::ports::{
    DirEntry, Directory, DirectoryLookup, HashType, PutInfo, PutStream, ReadRange, ReadStream,
    RemoteFs, RemoteObject, RootScope, Usage,
};
use nimbus_core::{path, ChunkedUpload, DirectoryCache, Error, Result, RetryPacer, TokenRenewer};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{CONTENT_RANGE, LOCATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use crate::api::{
    CopyItemRequest, CreateItemRequest, Drive, DriveItem, FileSystemInfo, ItemReference,
    ListChildrenResponse, MoveItemRequest, SetFileSystemInfo,
};
use crate::client::{ApiCall, GraphClient};
use crate::upload::GraphUploader;
use crate::{jobs, retry, GraphError};

/// Characters escaped in a drive path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'^')
    .add(b'|')
    .add(b'[')
    .add(b']');

/// Percent-encodes one path segment
pub(crate) fn escape_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Percent-encodes each segment of a canonical path
pub(crate) fn escape_path(path: &str) -> String {
    path.split('/')
        .map(escape_segment)
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// DriveType
// ============================================================================

/// Kind of drive, which decides the hash OneDrive reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveType {
    Personal,
    Business,
    /// A SharePoint document library
    DocumentLibrary,
}

impl DriveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveType::Personal => "personal",
            DriveType::Business => "business",
            DriveType::DocumentLibrary => "documentLibrary",
        }
    }

    /// The one hash type drives of this kind report
    pub fn hash_type(&self) -> HashType {
        match self {
            DriveType::Personal => HashType::Sha1,
            DriveType::Business | DriveType::DocumentLibrary => HashType::QuickXor,
        }
    }
}

impl FromStr for DriveType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "personal" => Ok(DriveType::Personal),
            "business" => Ok(DriveType::Business),
            "documentLibrary" => Ok(DriveType::DocumentLibrary),
            other => Err(Error::Fatal(format!("unknown drive type {other:?}"))),
        }
    }
}

// ============================================================================
// OneDriveFs
// ============================================================================

/// State shared by every view of one connection
#[derive(Debug)]
struct Shared {
    client: Arc<GraphClient>,
    pacer: Arc<RetryPacer>,
    /// Drive the items live on, used in copy requests
    drive_id: Option<String>,
    drive_type: DriveType,
    upload: UploadConfig,
    timeouts: TimeoutsConfig,
    renewer: TokenRenewer,
}

/// A OneDrive drive, scoped to a root path
#[derive(Debug, Clone)]
pub struct OneDriveFs {
    shared: Arc<Shared>,
    pub(crate) cache: Arc<DirectoryCache>,
    root: String,
    scope: RootScope,
}

impl OneDriveFs {
    /// Connects to the drive and resolves `config.onedrive.root`
    ///
    /// # Errors
    /// - `Fatal` if the chunk size is not a positive multiple of 320 KiB or
    ///   the drive type is unknown; both are checked before any request
    /// - any error reading the drive root
    pub async fn new(client: GraphClient, config: &Config) -> Result<Self> {
        let upload = onedrive_upload_config(&config.upload)?;
        let drive_type: DriveType = config.onedrive.drive_type.parse()?;

        let client = Arc::new(client);
        let pacer = Arc::new(RetryPacer::new(config.pacer.clone()));

        let root_info = read_root(&client, &pacer).await?;
        if root_info.id.is_empty() {
            return Err(Error::Fatal("failed to get root: empty ID".into()));
        }
        let drive_id = config.onedrive.drive_id.clone().or_else(|| {
            root_info
                .parent_reference
                .as_ref()
                .and_then(|p| p.drive_id.clone())
        });

        let renewer = {
            let client = Arc::clone(&client);
            TokenRenewer::new(
                "onedrive",
                config.timeouts.token_renew_interval(),
                move || {
                    let client = Arc::clone(&client);
                    async move {
                        if !client.refresh_access_token().await? {
                            debug!("No token source attached, nothing to renew");
                        }
                        Ok(())
                    }
                },
            )
        };

        let shared = Arc::new(Shared {
            client,
            pacer,
            drive_id,
            drive_type,
            upload,
            timeouts: config.timeouts.clone(),
            renewer,
        });

        let root = path::canonical(&config.onedrive.root);
        let fs = OneDriveFs::with_root(Arc::clone(&shared), &root, &root_info.id);

        match fs.cache.find_root(&fs, false).await {
            Ok(()) => return Ok(fs),
            Err(Error::DirNotFound(_)) | Err(Error::IsFile(_)) => {}
            Err(e) => return Err(e),
        }

        // The root may name a file: resolve its parent and look for it there
        let (parent, leaf) = path::split(&root);
        let parent_fs = OneDriveFs::with_root(shared, parent, &root_info.id);
        match parent_fs.cache.find_root_as_parent_of_file(&parent_fs).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() || matches!(e, Error::IsFile(_)) => {
                debug!(root = %root, "Root not found, leaving it to be created");
                return Ok(fs);
            }
            Err(e) => return Err(e),
        }

        match parent_fs.new_object(leaf).await {
            Ok(_) => {
                info!(root = %root, "Root names a file, scoping to it");
                Ok(parent_fs.with_scope(RootScope::File {
                    leaf: leaf.to_string(),
                }))
            }
            Err(Error::NotFound(_)) => Ok(fs),
            Err(e) => Err(e),
        }
    }

    fn with_root(shared: Arc<Shared>, root: &str, true_root_id: &str) -> Self {
        Self {
            shared,
            cache: Arc::new(DirectoryCache::new(root, true_root_id)),
            root: path::canonical(root),
            scope: RootScope::Directory,
        }
    }

    fn with_scope(mut self, scope: RootScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn drive_type(&self) -> DriveType {
        self.shared.drive_type
    }

    pub fn drive_id(&self) -> Option<&str> {
        self.shared.drive_id.as_deref()
    }

    pub fn directory_cache(&self) -> &DirectoryCache {
        &self.cache
    }

    pub fn pacer(&self) -> &RetryPacer {
        &self.shared.pacer
    }

    pub(crate) fn client(&self) -> &GraphClient {
        &self.shared.client
    }

    /// Drive path of `remote`
    fn srv_path(&self, remote: &str) -> String {
        path::join(&self.root, &path::canonical(remote))
    }

    /// A path-addressed call to `action` on `leaf` inside `dir_id`
    ///
    /// Parents on another drive are addressed by ID, everything else by the
    /// drive path of `remote`.
    pub(crate) fn item_path_call(
        &self,
        method: Method,
        dir_id: &str,
        leaf: &str,
        remote: &str,
        action: &str,
    ) -> ApiCall {
        match dir_id.split_once('#') {
            Some((drive, id)) => ApiCall::absolute(
                method,
                format!(
                    "{}/drives/{drive}/items/{id}:/{}:{action}",
                    self.client().graph_url(),
                    escape_segment(leaf)
                ),
            ),
            None => ApiCall::new(
                method,
                format!("/root:/{}:{action}", escape_path(&self.srv_path(remote))),
            ),
        }
    }

    // ========================================================================
    // Paced calls
    // ========================================================================

    async fn graph_json<T>(&self, call: &ApiCall) -> std::result::Result<T, GraphError>
    where
        T: DeserializeOwned + Send,
    {
        let client = self.client();
        self.pacer()
            .call(|| async move { client.call_json(call).await.map_err(retry::classify) })
            .await
    }

    async fn call_json<T>(&self, call: &ApiCall) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        Ok(self.graph_json(call).await?)
    }

    async fn call_no_content(&self, call: &ApiCall) -> Result<()> {
        let client = self.client();
        self.pacer()
            .call(|| async move { client.call_no_content(call).await.map_err(retry::classify) })
            .await
            .map_err(Error::from)
    }

    /// Reads the item at drive path `path` (`""` is the drive root)
    async fn read_metadata(&self, path: &str) -> std::result::Result<DriveItem, GraphError> {
        self.graph_json(&metadata_call(path)).await
    }

    async fn delete_object(&self, id: &str) -> Result<()> {
        self.call_no_content(&self.client().item_call(Method::DELETE, id, ""))
            .await
    }

    /// Every live child of `dir_id`, following `@odata.nextLink`
    async fn list_all(&self, dir_id: &str) -> Result<Vec<DriveItem>> {
        let mut call = self
            .client()
            .item_call(Method::GET, dir_id, "/children?$top=1000");
        let mut items = Vec::new();

        loop {
            let page: ListChildrenResponse = self.call_json(&call).await?;
            items.extend(page.value.into_iter().filter(|item| !item.is_deleted()));
            match page.next_link {
                Some(next) => call = ApiCall::absolute(Method::GET, next),
                None => break,
            }
        }
        Ok(items)
    }

    async fn purge_check(&self, dir: &str, check: bool) -> Result<()> {
        let dir = path::canonical(dir);
        let root = self.srv_path(&dir);
        if root.is_empty() {
            return Err(Error::Fatal("can't purge root directory".into()));
        }

        self.cache.find_root(self, false).await?;
        let dir_id = match self.cache.find_dir(self, &dir, false).await {
            Err(Error::IsFile(_)) => return Err(Error::Fatal(format!("{root} is not a folder"))),
            other => other?,
        };
        let item = self.read_metadata(&root).await?;
        let Some(folder) = item.get_folder() else {
            return Err(Error::Fatal(format!("{root} is not a folder")));
        };
        if check && folder.child_count != 0 {
            return Err(Error::DirNotEmpty(root));
        }

        self.delete_object(&dir_id).await?;
        self.cache.flush_dir(&dir);
        info!(dir = %root, "Removed directory");
        Ok(())
    }

    async fn put_empty(&self, remote: &str, leaf: &str, dir_id: &str) -> Result<DriveItem> {
        let call = self
            .item_path_call(Method::PUT, dir_id, leaf, remote, "/content")
            .header("Content-Type", "application/octet-stream")
            .bytes(Bytes::new());
        self.call_json(&call).await
    }
}

fn metadata_call(path: &str) -> ApiCall {
    if path.is_empty() {
        ApiCall::new(Method::GET, "/root")
    } else {
        ApiCall::new(Method::GET, format!("/root:/{}", escape_path(path)))
    }
}

async fn read_root(
    client: &GraphClient,
    pacer: &RetryPacer,
) -> std::result::Result<DriveItem, GraphError> {
    let call = &metadata_call("");
    pacer
        .call(|| async move { client.call_json(call).await.map_err(retry::classify) })
        .await
}

/// Upload settings with OneDrive's fragment alignment
fn onedrive_upload_config(config: &UploadConfig) -> Result<UploadConfig> {
    if config.chunk_size == 0 || config.chunk_size % ONEDRIVE_CHUNK_ALIGNMENT != 0 {
        return Err(Error::Fatal(format!(
            "chunk size {} is not a multiple of 320k",
            config.chunk_size
        )));
    }
    Ok(UploadConfig {
        chunk_size: config.chunk_size,
        alignment: ONEDRIVE_CHUNK_ALIGNMENT,
    })
}

/// The ID a parent reference takes, without any drive qualifier
fn bare_id(id: &str) -> &str {
    id.split_once('#').map_or(id, |(_, item)| item)
}

#[async_trait]
impl DirectoryLookup for OneDriveFs {
    async fn find_leaf(&self, parent_id: &str, leaf: &str) -> Result<Option<String>> {
        let parent = self
            .cache
            .get_inv(parent_id)
            .ok_or_else(|| Error::Fatal(format!("couldn't find parent ID {parent_id}")))?;
        let mut path = path::join(&parent, leaf);
        if self.cache.is_root_resolved() {
            path = path::join(self.cache.root(), &path);
        }

        match self.read_metadata(&path).await {
            Ok(info) if info.is_folder() => Ok(Some(info.get_id())),
            Ok(_) => Err(Error::IsFile(path)),
            Err(GraphError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_dir(&self, parent_id: &str, leaf: &str) -> Result<String> {
        let call = self
            .client()
            .item_call(Method::POST, parent_id, "/children")
            .json(&CreateItemRequest::folder(leaf))?;
        let info: DriveItem = self.call_json(&call).await?;
        debug!(leaf, id = %info.id, "Created directory");
        Ok(info.get_id())
    }
}

#[async_trait]
impl RemoteFs for OneDriveFs {
    type Object = Object;

    fn root(&self) -> &str {
        &self.root
    }

    fn scope(&self) -> &RootScope {
        &self.scope
    }

    fn hashes(&self) -> Vec<HashType> {
        vec![self.shared.drive_type.hash_type()]
    }

    async fn list(&self, dir: &str) -> Result<Vec<DirEntry<Object>>> {
        let dir = path::canonical(dir);
        if let RootScope::File { leaf } = &self.scope {
            if dir.is_empty() {
                return Ok(vec![DirEntry::Object(self.new_object(leaf).await?)]);
            }
            return Err(Error::DirNotFound(dir));
        }

        self.cache.find_root(self, false).await?;
        let dir_id = self.cache.find_dir(self, &dir, false).await?;

        let mut entries = Vec::new();
        for item in self.list_all(&dir_id).await? {
            let remote = path::join(&dir, &item.name);
            match item.get_folder() {
                Some(folder) => {
                    let id = item.get_id();
                    self.cache.put(&remote, &id);
                    entries.push(DirEntry::Dir(Directory {
                        remote,
                        id,
                        mod_time: item.mod_time(),
                        items: Some(folder.child_count),
                    }));
                }
                None => entries.push(DirEntry::Object(Object::from_item(
                    self.clone(),
                    &remote,
                    &item,
                )?)),
            }
        }
        debug!(dir = %dir, entries = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn new_object(&self, remote: &str) -> Result<Object> {
        let remote = path::canonical(remote);
        match self.read_metadata(&self.srv_path(&remote)).await {
            Ok(info) => Object::from_item(self.clone(), &remote, &info),
            Err(GraphError::NotFound(_)) => Err(Error::NotFound(remote)),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, input: PutStream, info: &PutInfo) -> Result<Object> {
        let remote = path::canonical(&info.remote);
        let (leaf, dir_id) = self.cache.find_root_and_path(self, &remote, true).await?;

        if info.size == 0 {
            debug!(remote = %remote, "Zero-length upload, using a single request");
            let item = self.put_empty(&remote, &leaf, &dir_id).await?;
            let mut object = Object::from_item(self.clone(), &remote, &item)?;
            object.set_mod_time(info.mod_time).await?;
            return Ok(object);
        }

        let _renew = self.shared.renewer.start();
        let uploader = GraphUploader::new(self, leaf, dir_id);
        let upload = ChunkedUpload::new(
            &uploader,
            self.pacer(),
            &self.shared.upload,
            self.shared.timeouts.operation_timeout(),
        )?;
        let item = upload
            .upload(&remote, info.mod_time, info.size, input)
            .await?;
        Object::from_item(self.clone(), &remote, &item)
    }

    async fn mkdir(&self, dir: &str) -> Result<()> {
        self.cache.find_root(self, true).await?;
        let dir = path::canonical(dir);
        if !dir.is_empty() {
            self.cache.find_dir(self, &dir, true).await?;
        }
        Ok(())
    }

    async fn rmdir(&self, dir: &str) -> Result<()> {
        self.purge_check(dir, true).await
    }

    async fn purge(&self) -> Result<()> {
        self.purge_check("", false).await
    }

    async fn copy(&self, src: &Object, remote: &str) -> Result<Object> {
        let remote = path::canonical(remote);
        let src_path = src.fs.srv_path(&src.remote);
        let dst_path = self.srv_path(&remote);
        if src_path.to_lowercase() == dst_path.to_lowercase() {
            return Err(Error::Fatal(format!(
                "can't copy {src_path:?} -> {dst_path:?} as are same name when lowercase"
            )));
        }

        let (leaf, dir_id) = self.cache.find_root_and_path(self, &remote, true).await?;
        let request = CopyItemRequest {
            parent_reference: ItemReference {
                drive_id: self.shared.drive_id.clone(),
                id: Some(bare_id(&dir_id).to_string()),
                path: None,
            },
            name: leaf,
        };
        let call = &self
            .client()
            .item_call(Method::POST, &src.id, "/copy")
            .header("Prefer", "respond-async")
            .json(&request)?;

        let _renew = self.shared.renewer.start();
        let client = self.client();
        let response = self
            .pacer()
            .call(|| async move { client.execute(call).await.map_err(retry::classify) })
            .await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::backend(GraphError::InvalidResponse(
                    "didn't receive location header in copy response".into(),
                ))
            })?;
        debug!(src = %src_path, dst = %dst_path, location = %location, "Copy accepted");

        jobs::wait_for_job(
            client,
            self.pacer(),
            &location,
            self.shared.timeouts.operation_timeout(),
            self.shared.timeouts.job_poll_interval(),
        )
        .await?;

        // The copy carries the server's timestamp, not the source's
        let mut object = self.new_object(&remote).await?;
        object.set_mod_time(src.mod_time).await?;
        Ok(object)
    }

    async fn move_object(&self, src: &Object, remote: &str) -> Result<Object> {
        let remote = path::canonical(remote);
        let (leaf, dir_id) = self.cache.find_root_and_path(self, &remote, true).await?;

        let request = MoveItemRequest {
            name: leaf,
            parent_reference: ItemReference {
                id: Some(bare_id(&dir_id).to_string()),
                ..Default::default()
            },
            file_system_info: Some(FileSystemInfo::at(src.mod_time)),
        };
        let call = self
            .client()
            .item_call(Method::PATCH, &src.id, "")
            .json(&request)?;
        let item: DriveItem = self.call_json(&call).await?;
        Object::from_item(self.clone(), &remote, &item)
    }

    async fn dir_move(&self, src: &Self, src_remote: &str, dst_remote: &str) -> Result<()> {
        let src_remote = path::canonical(src_remote);
        let dst_remote = path::canonical(dst_remote);
        let src_path = src.srv_path(&src_remote);
        let dst_path = self.srv_path(&dst_remote);
        if src_path.is_empty() || dst_path.is_empty() {
            return Err(Error::Fatal("can't move root directory".into()));
        }

        src.cache.find_root(src, false).await?;
        if !dst_remote.is_empty() {
            self.cache.find_root(self, true).await?;
        } else if self.cache.found_root() {
            return Err(Error::DirExists(dst_path));
        }

        // With an unresolved root the cache is relative to the drive root
        let find_path = if dst_remote.is_empty() {
            self.root.as_str()
        } else {
            dst_remote.as_str()
        };
        let (leaf, dst_dir_id) = self.cache.find_path(self, find_path, true).await?;

        if !dst_remote.is_empty() {
            match self.cache.find_dir(self, &dst_remote, false).await {
                Err(Error::DirNotFound(_)) => {}
                Err(e) => return Err(e),
                Ok(_) => return Err(Error::DirExists(dst_path)),
            }
        }

        let src_id = src.cache.find_dir(src, &src_remote, false).await?;
        let src_info = src.read_metadata(&src_path).await?;
        let created = src_info
            .file_system_info
            .and_then(|info| info.created_date_time)
            .or(src_info.created_date_time);

        let request = MoveItemRequest {
            name: leaf,
            parent_reference: ItemReference {
                id: Some(bare_id(&dst_dir_id).to_string()),
                ..Default::default()
            },
            file_system_info: Some(FileSystemInfo {
                created_date_time: created,
                last_modified_date_time: src_info.mod_time(),
            }),
        };
        let call = self
            .client()
            .item_call(Method::PATCH, &src_id, "")
            .json(&request)?;
        let _: DriveItem = self.call_json(&call).await?;

        src.cache.flush_dir(&src_remote);
        info!(src = %src_path, dst = %dst_path, "Moved directory");
        Ok(())
    }

    async fn about(&self) -> Result<Usage> {
        let drive: Drive = self.call_json(&ApiCall::new(Method::GET, "")).await?;
        let quota = drive.quota.unwrap_or_default();
        Ok(Usage {
            total: quota.total,
            used: quota.used,
            trashed: quota.deleted,
            free: quota.remaining,
        })
    }

    fn dir_cache_flush(&self) {
        self.cache.reset_root();
    }
}

// ============================================================================
// Object
// ============================================================================

/// A file on OneDrive
#[derive(Debug, Clone)]
pub struct Object {
    fs: OneDriveFs,
    remote: String,
    id: String,
    size: u64,
    mod_time: DateTime<Utc>,
    /// Lowercase hex
    sha1: Option<String>,
    /// Lowercase hex, decoded from Graph's base64
    quick_xor_hash: Option<String>,
    mime_type: Option<String>,
}

impl Object {
    fn from_item(fs: OneDriveFs, remote: &str, item: &DriveItem) -> Result<Self> {
        let mut object = Object {
            fs,
            remote: remote.to_string(),
            id: String::new(),
            size: 0,
            mod_time: Utc::now(),
            sha1: None,
            quick_xor_hash: None,
            mime_type: None,
        };
        object.set_metadata(item)?;
        Ok(object)
    }

    fn set_metadata(&mut self, item: &DriveItem) -> Result<()> {
        if item.is_folder() {
            return Err(Error::NotFound(format!("{} is a directory", self.remote)));
        }
        self.id = item.get_id();
        self.size = item.get_size();
        if let Some(mod_time) = item.mod_time() {
            self.mod_time = mod_time;
        }

        if let Some(file) = item.get_file() {
            self.mime_type = file.mime_type.clone();
            if let Some(hashes) = &file.hashes {
                self.sha1 = hashes
                    .sha1_hash
                    .as_deref()
                    .filter(|h| !h.is_empty())
                    .map(str::to_lowercase);
                self.quick_xor_hash = hashes
                    .quick_xor_hash
                    .as_deref()
                    .filter(|h| !h.is_empty())
                    .and_then(|h| match base64::engine::general_purpose::STANDARD.decode(h) {
                        Ok(raw) => Some(hex::encode(raw)),
                        Err(err) => {
                            warn!(remote = %self.remote, hash = h, error = %err, "Failed to decode QuickXorHash");
                            None
                        }
                    });
            }
        }
        Ok(())
    }

    pub fn fs(&self) -> &OneDriveFs {
        &self.fs
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }
}

#[async_trait]
impl RemoteObject for Object {
    fn remote(&self) -> &str {
        &self.remote
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn hash(&self, hash_type: HashType) -> Result<String> {
        if hash_type != self.fs.drive_type().hash_type() {
            return Err(Error::Unsupported(format!(
                "{hash_type} on a {} drive",
                self.fs.drive_type().as_str()
            )));
        }
        let hash = match hash_type {
            HashType::Sha1 => &self.sha1,
            HashType::QuickXor => &self.quick_xor_hash,
        };
        Ok(hash.clone().unwrap_or_default())
    }

    fn mod_time(&self) -> DateTime<Utc> {
        self.mod_time
    }

    async fn open(&mut self, range: ReadRange) -> Result<ReadStream> {
        if self.id.is_empty() {
            return Err(Error::Fatal(format!("{}: can't download, no id", self.remote)));
        }
        let range = range.fix(self.size);
        let mut call = self.fs.client().item_call(Method::GET, &self.id, "/content");
        if let Some(value) = range.header() {
            call = call.header("Range", value);
        }

        let client = self.fs.client();
        let call = &call;
        let response = self
            .fs
            .pacer()
            .call(|| async move { client.execute(call).await.map_err(retry::classify) })
            .await
            .map_err(Error::from)?;

        if response.status() == StatusCode::OK && !response.headers().contains_key(CONTENT_RANGE) {
            if let Some(len) = response.content_length().filter(|&len| len > 0) {
                if len != self.size {
                    debug!(remote = %self.remote, listed = self.size, actual = len, "Correcting object size");
                    self.size = len;
                }
            }
        }
        debug!(remote = %self.remote, ?range, "Opened object");

        let body = response
            .bytes_stream()
            .map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(body))))
    }

    async fn set_mod_time(&mut self, mod_time: DateTime<Utc>) -> Result<()> {
        let call = self
            .fs
            .client()
            .item_call(Method::PATCH, &self.id, "")
            .json(&SetFileSystemInfo {
                file_system_info: FileSystemInfo::at(mod_time),
            })?;
        let item: DriveItem = self.fs.call_json(&call).await?;
        self.set_metadata(&item)
    }

    async fn remove(&self) -> Result<()> {
        self.fs.delete_object(&self.id).await
    }
}
