//! Root resolution: directory roots, file roots, missing roots, and the
//! configuration checks that run before any request.

use nimbus_core::ports::{RemoteFs, RemoteObject, RootScope};
use nimbus_core::{Error, RootState};
use nimbus_onedrive::OneDriveFs;
use wiremock::MockServer;

use crate::common::{self, file_json, folder_json, ROOT_ID};

#[tokio::test]
async fn test_empty_root_resolves_to_drive_root() {
    let server = common::setup_drive_mock().await;

    let fs = common::connect(&server, "").await;

    assert_eq!(fs.scope(), &RootScope::Directory);
    assert!(fs.directory_cache().found_root());
    assert_eq!(fs.directory_cache().root_id().as_deref(), Some(ROOT_ID));
    assert_eq!(fs.drive_id(), Some("drive-test-001"));
    assert_eq!(common::requests(&server).await.len(), 1);
}

#[tokio::test]
async fn test_directory_root_is_resolved() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "Documents", folder_json("DOCS", "Documents", 4)).await;

    let fs = common::connect(&server, "/Documents/").await;

    assert_eq!(fs.root(), "Documents");
    assert_eq!(fs.scope(), &RootScope::Directory);
    assert_eq!(fs.directory_cache().root_state(), RootState::ResolvedAsDirectory);
    assert_eq!(fs.directory_cache().get("").as_deref(), Some("DOCS"));
}

#[tokio::test]
async fn test_file_root_scopes_to_single_file() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "Documents", folder_json("DOCS", "Documents", 1)).await;
    common::mount_item(
        &server,
        "Documents/report.pdf",
        file_json("REPORT", "report.pdf", 2048),
    )
    .await;

    let fs = common::connect(&server, "Documents/report.pdf").await;

    assert_eq!(fs.root(), "Documents");
    assert_eq!(
        fs.scope(),
        &RootScope::File {
            leaf: "report.pdf".to_string()
        }
    );
    assert_eq!(
        fs.directory_cache().root_state(),
        RootState::ResolvedAsParentOfFile
    );

    let entries = fs.list("").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].remote(), "report.pdf");
    assert!(!entries[0].is_dir());

    let err = fs.list("elsewhere").await.unwrap_err();
    assert!(matches!(err, Error::DirNotFound(_)));
}

#[tokio::test]
async fn test_missing_root_stays_unresolved_for_creation() {
    let server = common::setup_drive_mock().await;

    let fs = common::connect(&server, "backup").await;

    assert_eq!(fs.scope(), &RootScope::Directory);
    assert_eq!(fs.directory_cache().root_state(), RootState::Unresolved);
    assert!(!fs.directory_cache().found_root());

    let err = fs.list("").await.unwrap_err();
    assert!(matches!(err, Error::DirNotFound(_)));
}

#[tokio::test]
async fn test_object_under_file_root_reports_its_metadata() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "notes.txt", file_json("NOTES", "notes.txt", 11)).await;

    let fs = common::connect(&server, "notes.txt").await;
    assert_eq!(fs.root(), "");

    let object = fs.new_object("notes.txt").await.unwrap();
    assert_eq!(object.id(), "NOTES");
    assert_eq!(object.size(), 11);
}

#[tokio::test]
async fn test_misaligned_chunk_size_fails_before_any_request() {
    let server = MockServer::start().await;
    let config = common::test_config(&server, "")
        .upload_chunk_size(1_000_000)
        .build();

    let err = OneDriveFs::new(common::client_for(&config), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Fatal(_)));
    assert!(common::requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_unknown_drive_type_fails_before_any_request() {
    let server = MockServer::start().await;
    let config = common::test_config(&server, "")
        .onedrive_drive_type("dropbox")
        .build();

    let err = OneDriveFs::new(common::client_for(&config), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Fatal(_)));
    assert!(common::requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_dir_cache_flush_forgets_root() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "Documents", folder_json("DOCS", "Documents", 0)).await;

    let fs = common::connect(&server, "Documents").await;
    assert!(fs.directory_cache().found_root());

    fs.dir_cache_flush();
    assert_eq!(fs.directory_cache().root_state(), RootState::Unresolved);

    let before = common::requests_to(&server, "GET", "/me/drive/root:/Documents")
        .await
        .len();
    fs.mkdir("").await.unwrap();
    assert!(fs.directory_cache().found_root());
    let after = common::requests_to(&server, "GET", "/me/drive/root:/Documents")
        .await
        .len();
    assert_eq!(after, before + 1);
}
