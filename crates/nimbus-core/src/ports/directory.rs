//! Directory lookup port (driven/secondary port)
//!
//! The only provider knowledge the [`DirectoryCache`](crate::dircache::DirectoryCache)
//! needs: how to find a child directory by name and how to create one.
//! Implementations issue their calls through the backend's
//! [`RetryPacer`](crate::pacer::RetryPacer).

use async_trait::async_trait;

use crate::error::Result;

/// Provider capability for resolving and creating directories by name
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    /// Looks for a directory called `leaf` inside the directory `parent_id`
    ///
    /// # Returns
    /// - `Ok(Some(id))` if the directory exists
    /// - `Ok(None)` if nothing with that name exists
    /// - `Err(_)` for any other failure; `Error::IsFile` if the name
    ///   belongs to a file
    async fn find_leaf(&self, parent_id: &str, leaf: &str) -> Result<Option<String>>;

    /// Creates a directory called `leaf` inside `parent_id`, returning its ID
    async fn create_dir(&self, parent_id: &str, leaf: &str) -> Result<String>;
}
