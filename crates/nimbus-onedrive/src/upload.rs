//! Upload sessions for Microsoft Graph (OneDrive)
//!
//! [`GraphUploader`] is the OneDrive side of the core's
//! [`ChunkedUpload`](nimbus_core::ChunkedUpload): it opens a session with
//! `createUploadSession`, sends each fragment with a `Content-Range` to the
//! session's pre-authenticated URL, and deletes the session on cancel.
//!
//! ## Microsoft Graph API References
//!
//! - [Upload large files](https://learn.microsoft.com/en-us/graph/api/driveitem-createuploadsession)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_core::pacer::Failure;
use nimbus_core::upload::AttemptResult;
use nimbus_core::{ChunkedUploader, Error, Fragment};
use reqwest::{Method, StatusCode};
use tracing::debug;

use crate::api::{CreateUploadRequest, CreateUploadResponse, DriveItem};
use crate::client::{decode_json, ApiCall};
use crate::fs::OneDriveFs;
use crate::{retry, GraphError};

/// Classifies a Graph failure for the pacer, in the core's error vocabulary
fn classify(err: GraphError) -> Failure<Error> {
    retry::classify(err).map_err(Error::from)
}

/// Upload-session protocol for one destination file
///
/// Holds the already-resolved parent directory, so no attempt has to
/// consult the directory cache.
#[derive(Debug)]
pub struct GraphUploader<'a> {
    fs: &'a OneDriveFs,
    leaf: String,
    dir_id: String,
}

impl<'a> GraphUploader<'a> {
    /// An uploader for the file `leaf` inside the directory `dir_id`
    pub fn new(fs: &'a OneDriveFs, leaf: impl Into<String>, dir_id: impl Into<String>) -> Self {
        Self {
            fs,
            leaf: leaf.into(),
            dir_id: dir_id.into(),
        }
    }
}

#[async_trait]
impl ChunkedUploader for GraphUploader<'_> {
    /// The session's upload URL
    type Session = String;
    type Item = DriveItem;

    async fn create_session(
        &self,
        remote: &str,
        mod_time: DateTime<Utc>,
    ) -> AttemptResult<String> {
        let call = self
            .fs
            .item_path_call(
                Method::POST,
                &self.dir_id,
                &self.leaf,
                remote,
                "/createUploadSession",
            )
            .json(&CreateUploadRequest::at(mod_time))
            .map_err(|e| Failure::abort(Error::from(e)))?;

        let session: CreateUploadResponse =
            self.fs.client().call_json(&call).await.map_err(classify)?;
        debug!(remote, expires = ?session.expiration_date_time, "Created upload session");
        Ok(session.upload_url)
    }

    async fn upload_fragment(
        &self,
        session: &String,
        fragment: Fragment,
    ) -> AttemptResult<Option<DriveItem>> {
        let call = ApiCall::absolute(Method::PUT, session.as_str())
            .header("Content-Range", fragment.content_range())
            .bytes(fragment.data)
            .unauthenticated();

        let response = self.fs.client().execute(&call).await.map_err(classify)?;
        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let item: DriveItem = decode_json(response).await.map_err(classify)?;
                Ok(Some(item))
            }
            // 202 Accepted: more fragments expected
            _ => Ok(None),
        }
    }

    async fn cancel_session(&self, session: &String) -> AttemptResult<()> {
        let call = ApiCall::absolute(Method::DELETE, session.as_str()).unauthenticated();
        self.fs
            .client()
            .call_no_content(&call)
            .await
            .map_err(classify)
    }
}
