//! Microsoft Graph wire types
//!
//! Request and response bodies for the drive-item endpoints the backend
//! uses. Fields are `Option` wherever Graph omits them for some item kinds
//! (folders carry no hashes, deleted items carry almost nothing).
//!
//! ## Microsoft Graph API References
//!
//! - [driveItem](https://learn.microsoft.com/en-us/graph/api/resources/driveitem)
//! - [drive](https://learn.microsoft.com/en-us/graph/api/resources/drive)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Items
// ============================================================================

/// A DriveItem as returned by Graph
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    /// Item ID, unique within its drive
    #[serde(default)]
    pub id: String,
    /// Item name (file or folder name)
    #[serde(default)]
    pub name: String,
    /// Size in bytes
    pub size: Option<u64>,
    pub created_date_time: Option<DateTime<Utc>>,
    pub last_modified_date_time: Option<DateTime<Utc>>,
    /// Client-side timestamps, which win over the server ones
    pub file_system_info: Option<FileSystemInfo>,
    pub parent_reference: Option<ItemReference>,
    /// Present if the item is a file
    pub file: Option<FileFacet>,
    /// Present if the item is a folder
    pub folder: Option<FolderFacet>,
    /// Present if the item has been deleted
    pub deleted: Option<serde_json::Value>,
    /// Present if the item lives on another drive (shared with me)
    pub remote_item: Option<Box<DriveItem>>,
}

impl DriveItem {
    /// The item's effective view: the remote item for shared entries
    fn effective(&self) -> &DriveItem {
        self.remote_item.as_deref().unwrap_or(self)
    }

    /// ID to address the item with
    ///
    /// Items on another drive are addressed as `driveId#itemId`.
    pub fn get_id(&self) -> String {
        match &self.remote_item {
            Some(remote) => match remote
                .parent_reference
                .as_ref()
                .and_then(|p| p.drive_id.as_deref())
            {
                Some(drive_id) => format!("{drive_id}#{}", remote.id),
                None => remote.id.clone(),
            },
            None => self.id.clone(),
        }
    }

    pub fn get_folder(&self) -> Option<&FolderFacet> {
        self.effective().folder.as_ref()
    }

    pub fn get_file(&self) -> Option<&FileFacet> {
        self.effective().file.as_ref()
    }

    pub fn is_folder(&self) -> bool {
        self.get_folder().is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    pub fn get_size(&self) -> u64 {
        self.effective().size.unwrap_or(0)
    }

    /// Modification time, preferring the client-side timestamp
    pub fn mod_time(&self) -> Option<DateTime<Utc>> {
        let item = self.effective();
        item.file_system_info
            .as_ref()
            .and_then(|info| info.last_modified_date_time)
            .or(item.last_modified_date_time)
    }
}

/// Reference to a parent item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Parent path, e.g. `/drive/root:/Documents`; never sent
    #[serde(skip_serializing)]
    pub path: Option<String>,
}

/// Client-side timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_date_time: Option<DateTime<Utc>>,
}

impl FileSystemInfo {
    /// Both timestamps set to `mod_time`
    pub fn at(mod_time: DateTime<Utc>) -> Self {
        Self {
            created_date_time: Some(mod_time),
            last_modified_date_time: Some(mod_time),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    pub mime_type: Option<String>,
    pub hashes: Option<Hashes>,
}

/// Content hashes for a file
///
/// Personal drives report `sha1Hash` (hex), business drives
/// `quickXorHash` (base64).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hashes {
    pub sha1_hash: Option<String>,
    pub quick_xor_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    #[serde(default)]
    pub child_count: u64,
}

/// One page of `children`
#[derive(Debug, Deserialize)]
pub struct ListChildrenResponse {
    #[serde(default)]
    pub value: Vec<DriveItem>,
    /// Absolute URL of the next page, if any
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

// ============================================================================
// Requests
// ============================================================================

/// Empty object marking a folder in a create request
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmptyFacet {}

/// `POST items/{id}/children`
#[derive(Debug, Serialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub folder: EmptyFacet,
    #[serde(rename = "@microsoft.graph.conflictBehavior")]
    pub conflict_behavior: String,
}

impl CreateItemRequest {
    /// A folder named `name`; the call fails if the name is taken
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folder: EmptyFacet {},
            conflict_behavior: "fail".to_string(),
        }
    }
}

/// `POST items/{id}/copy`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyItemRequest {
    pub parent_reference: ItemReference,
    pub name: String,
}

/// `PATCH items/{id}` to rename and/or re-parent
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveItemRequest {
    pub name: String,
    pub parent_reference: ItemReference,
    /// Sent so the move does not reset the timestamps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_system_info: Option<FileSystemInfo>,
}

/// `PATCH` body that only updates timestamps
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFileSystemInfo {
    pub file_system_info: FileSystemInfo,
}

/// `POST ...:/createUploadSession`
#[derive(Debug, Serialize)]
pub struct CreateUploadRequest {
    pub item: SetFileSystemInfo,
}

impl CreateUploadRequest {
    pub fn at(mod_time: DateTime<Utc>) -> Self {
        Self {
            item: SetFileSystemInfo {
                file_system_info: FileSystemInfo::at(mod_time),
            },
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Response from creating an upload session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUploadResponse {
    /// Absolute, pre-authenticated URL fragments are sent to
    pub upload_url: String,
    pub expiration_date_time: Option<DateTime<Utc>>,
}

/// Body of an async job monitor URL
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncOperationStatus {
    /// `notStarted`, `inProgress`, `completed`, `failed`, `deleteFailed`, ...
    #[serde(default)]
    pub status: String,
    pub percentage_complete: Option<f64>,
    pub resource_id: Option<String>,
}

/// A drive resource
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drive {
    pub id: Option<String>,
    pub drive_type: Option<String>,
    pub quota: Option<Quota>,
}

/// Quota figures in bytes
#[derive(Debug, Default, Deserialize)]
pub struct Quota {
    pub total: Option<u64>,
    pub used: Option<u64>,
    pub remaining: Option<u64>,
    /// Bytes in the recycle bin
    pub deleted: Option<u64>,
}

/// Error body Graph sends with non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
