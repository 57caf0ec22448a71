//! Filesystem operations against a mock drive: listing, directory
//! creation and removal, server-side copy and move, quota, and hashes.

use chrono::{TimeZone, Utc};
use nimbus_core::ports::{DirEntry, HashType, ReadRange, RemoteFs, RemoteObject};
use nimbus_core::Error;
use nimbus_onedrive::OneDriveFs;
use tokio::io::AsyncReadExt;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, file_json, folder_json, ROOT_ID};

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_follows_next_link_and_caches_folders() {
    let server = common::setup_drive_mock().await;
    let fs = common::connect(&server, "").await;

    Mock::given(method("GET"))
        .and(path(format!("/me/drive/items/{ROOT_ID}/children")))
        .and(query_param("$top", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                folder_json("PHOTOS", "Photos", 3),
                {"id": "GONE", "name": "gone.txt", "deleted": {"state": "deleted"}}
            ],
            "@odata.nextLink": format!("{}/next-page?$skiptoken=2", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next-page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [file_json("A1", "a.txt", 5)]
        })))
        .mount(&server)
        .await;

    let entries = fs.list("").await.unwrap();

    assert_eq!(entries.len(), 2);
    match &entries[0] {
        DirEntry::Dir(dir) => {
            assert_eq!(dir.remote, "Photos");
            assert_eq!(dir.id, "PHOTOS");
            assert_eq!(dir.items, Some(3));
        }
        other => panic!("expected a directory, got {:?}", other.remote()),
    }
    match &entries[1] {
        DirEntry::Object(object) => {
            assert_eq!(object.remote(), "a.txt");
            assert_eq!(object.size(), 5);
        }
        other => panic!("expected an object, got {:?}", other.remote()),
    }
    assert_eq!(fs.directory_cache().get("Photos").as_deref(), Some("PHOTOS"));
}

#[tokio::test]
async fn test_list_missing_directory() {
    let server = common::setup_drive_mock().await;
    let fs = common::connect(&server, "").await;

    let err = fs.list("nope/deeper").await.unwrap_err();
    assert!(matches!(err, Error::DirNotFound(_)));
}

#[tokio::test]
async fn test_new_object_not_found() {
    let server = common::setup_drive_mock().await;
    let fs = common::connect(&server, "").await;

    let err = fs.new_object("missing.txt").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// ============================================================================
// Mkdir / Rmdir / Purge
// ============================================================================

async fn mount_create(server: &MockServer, parent: &str, name: &str, id: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/me/drive/items/{parent}/children")))
        .and(body_partial_json(serde_json::json!({
            "name": name,
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(folder_json(id, name, 0)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_mkdir_creates_missing_segments_once() {
    let server = common::setup_drive_mock().await;
    let fs = common::connect(&server, "").await;
    mount_create(&server, ROOT_ID, "a", "A").await;
    mount_create(&server, "A", "b", "B").await;

    fs.mkdir("a/b").await.unwrap();
    assert_eq!(fs.directory_cache().get("a").as_deref(), Some("A"));
    assert_eq!(fs.directory_cache().get("a/b").as_deref(), Some("B"));

    let before = common::requests(&server).await.len();
    fs.mkdir("a/b").await.unwrap();
    assert_eq!(common::requests(&server).await.len(), before);
}

#[tokio::test]
async fn test_rmdir_refuses_non_empty_directory() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "full", folder_json("FULL", "full", 2)).await;
    let fs = common::connect(&server, "").await;

    let err = fs.rmdir("full").await.unwrap_err();

    assert!(matches!(err, Error::DirNotEmpty(_)));
    assert!(common::requests_to(&server, "DELETE", "/me/drive/items/FULL")
        .await
        .is_empty());
}

#[tokio::test]
async fn test_rmdir_deletes_and_flushes() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "empty", folder_json("EMPTY", "empty", 0)).await;
    Mock::given(method("DELETE"))
        .and(path("/me/drive/items/EMPTY"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let fs = common::connect(&server, "").await;

    fs.rmdir("empty").await.unwrap();

    assert_eq!(fs.directory_cache().get("empty"), None);
}

#[tokio::test]
async fn test_rmdir_on_file_is_refused() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "dir", file_json("DIR", "dir", 1)).await;
    let fs = common::connect(&server, "").await;
    // A stale cache entry still claims the path is a directory
    fs.directory_cache().put("dir", "DIR");

    let err = fs.rmdir("dir").await.unwrap_err();
    assert!(matches!(err, Error::Fatal(_)));
}

#[tokio::test]
async fn test_rmdir_on_uncached_file_is_fatal() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "f.txt", file_json("F", "f.txt", 4)).await;
    let fs = common::connect(&server, "").await;

    let err = fs.rmdir("f.txt").await.unwrap_err();

    assert!(matches!(err, Error::Fatal(_)));
    assert!(common::requests_to(&server, "DELETE", "/me/drive/items/F")
        .await
        .is_empty());
}

#[tokio::test]
async fn test_purge_refuses_drive_root() {
    let server = common::setup_drive_mock().await;
    let fs = common::connect(&server, "").await;

    let err = fs.purge().await.unwrap_err();
    assert!(matches!(err, Error::Fatal(_)));
}

#[tokio::test]
async fn test_purge_removes_configured_root() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "scratch", folder_json("SCRATCH", "scratch", 12)).await;
    Mock::given(method("DELETE"))
        .and(path("/me/drive/items/SCRATCH"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let fs = common::connect(&server, "scratch").await;

    fs.purge().await.unwrap();

    assert!(!fs.directory_cache().found_root());
}

// ============================================================================
// Copy / Move / DirMove
// ============================================================================

async fn mount_copy(server: &MockServer, src_id: &str, monitor: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/me/drive/items/{src_id}/copy")))
        .and(header("Prefer", "respond-async"))
        .and(body_partial_json(serde_json::json!({
            "parentReference": {"driveId": "drive-test-001", "id": "DST"},
            "name": "copy.txt"
        })))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", format!("{}{monitor}", server.uri()).as_str()),
        )
        .mount(server)
        .await;
}

async fn setup_copy(server: &MockServer) -> OneDriveFs {
    common::mount_item(server, "src.txt", file_json("SRC", "src.txt", 42)).await;
    common::mount_item(server, "dst", folder_json("DST", "dst", 0)).await;
    common::connect(server, "").await
}

#[tokio::test]
async fn test_copy_waits_for_job_and_restores_mod_time() {
    let server = common::setup_drive_mock().await;
    let fs = setup_copy(&server).await;
    mount_copy(&server, "SRC", "/monitor/job-1").await;

    Mock::given(method("GET"))
        .and(path("/monitor/job-1"))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "status": "inProgress",
            "percentageComplete": 40.0
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/monitor/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "completed",
            "resourceId": "COPY"
        })))
        .mount(&server)
        .await;
    common::mount_item(&server, "dst/copy.txt", file_json("COPY", "copy.txt", 42)).await;
    Mock::given(method("PATCH"))
        .and(path("/me/drive/items/COPY"))
        .and(body_partial_json(serde_json::json!({
            "fileSystemInfo": {"lastModifiedDateTime": "2026-01-14T09:30:00Z"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("COPY", "copy.txt", 42)))
        .expect(1)
        .mount(&server)
        .await;

    let src = fs.new_object("src.txt").await.unwrap();
    let copy = fs.copy(&src, "dst/copy.txt").await.unwrap();

    assert_eq!(copy.id(), "COPY");
    assert_eq!(copy.remote(), "dst/copy.txt");
    assert_eq!(copy.mod_time(), src.mod_time());

    let polls = common::requests_to(&server, "GET", "/monitor/job-1").await;
    assert_eq!(polls.len(), 2);
    assert!(polls.iter().all(|r| r.headers.get("authorization").is_none()));
}

#[tokio::test]
async fn test_copy_job_failure_is_reported() {
    let server = common::setup_drive_mock().await;
    let fs = setup_copy(&server).await;
    mount_copy(&server, "SRC", "/monitor/job-2").await;
    Mock::given(method("GET"))
        .and(path("/monitor/job-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "failed"
        })))
        .mount(&server)
        .await;

    let src = fs.new_object("src.txt").await.unwrap();
    let err = fs.copy(&src, "dst/copy.txt").await.unwrap_err();

    assert!(matches!(err, Error::Backend(_)));
    assert!(err.to_string().contains("failed"));
}

#[tokio::test]
async fn test_copy_onto_same_name_is_refused() {
    let server = common::setup_drive_mock().await;
    let fs = setup_copy(&server).await;
    let src = fs.new_object("src.txt").await.unwrap();

    let err = fs.copy(&src, "SRC.TXT").await.unwrap_err();

    assert!(matches!(err, Error::Fatal(_)));
    assert!(common::requests_to(&server, "POST", "/me/drive/items/SRC/copy")
        .await
        .is_empty());
}

#[tokio::test]
async fn test_move_object_reparents_and_keeps_mod_time() {
    let server = common::setup_drive_mock().await;
    let fs = setup_copy(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/me/drive/items/SRC"))
        .and(body_partial_json(serde_json::json!({
            "name": "moved.txt",
            "parentReference": {"id": "DST"},
            "fileSystemInfo": {"lastModifiedDateTime": "2026-01-14T09:30:00Z"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("SRC", "moved.txt", 42)))
        .expect(1)
        .mount(&server)
        .await;

    let src = fs.new_object("src.txt").await.unwrap();
    let moved = fs.move_object(&src, "dst/moved.txt").await.unwrap();

    assert_eq!(moved.id(), "SRC");
    assert_eq!(moved.remote(), "dst/moved.txt");
    assert_eq!(
        moved.mod_time(),
        Utc.with_ymd_and_hms(2026, 1, 14, 9, 30, 0).unwrap()
    );
}

#[tokio::test]
async fn test_dir_move_renames_and_flushes_source() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "old", folder_json("OLD", "old", 2)).await;
    Mock::given(method("PATCH"))
        .and(path("/me/drive/items/OLD"))
        .and(body_partial_json(serde_json::json!({
            "name": "new",
            "parentReference": {"id": ROOT_ID}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(folder_json("OLD", "new", 2)))
        .expect(1)
        .mount(&server)
        .await;
    let fs = common::connect(&server, "").await;

    fs.dir_move(&fs, "old", "new").await.unwrap();

    assert_eq!(fs.directory_cache().get("old"), None);
}

#[tokio::test]
async fn test_dir_move_onto_existing_directory() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "old", folder_json("OLD", "old", 2)).await;
    common::mount_item(&server, "taken", folder_json("TAKEN", "taken", 0)).await;
    let fs = common::connect(&server, "").await;

    let err = fs.dir_move(&fs, "old", "taken").await.unwrap_err();

    assert!(matches!(err, Error::DirExists(_)));
    assert!(common::requests_to(&server, "PATCH", "/me/drive/items/OLD")
        .await
        .is_empty());
}

#[tokio::test]
async fn test_dir_move_refuses_root() {
    let server = common::setup_drive_mock().await;
    let fs = common::connect(&server, "").await;

    let err = fs.dir_move(&fs, "", "elsewhere").await.unwrap_err();
    assert!(matches!(err, Error::Fatal(_)));
}

// ============================================================================
// About / Hashes
// ============================================================================

#[tokio::test]
async fn test_about_reports_quota() {
    let server = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path("/me/drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "drive-test-001",
            "driveType": "personal",
            "quota": {
                "total": 5368709120_u64,
                "used": 1073741824_u64,
                "remaining": 4294967296_u64,
                "deleted": 1024
            }
        })))
        .mount(&server)
        .await;
    let fs = common::connect(&server, "").await;

    let usage = fs.about().await.unwrap();

    assert_eq!(usage.total, Some(5368709120));
    assert_eq!(usage.used, Some(1073741824));
    assert_eq!(usage.free, Some(4294967296));
    assert_eq!(usage.trashed, Some(1024));
}

#[tokio::test]
async fn test_personal_drive_reports_lowercase_sha1() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "f.txt", file_json("F", "f.txt", 4)).await;
    let fs = common::connect(&server, "").await;

    assert_eq!(fs.hashes(), vec![HashType::Sha1]);
    let object = fs.new_object("f.txt").await.unwrap();
    assert_eq!(
        object.hash(HashType::Sha1).unwrap(),
        "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3"
    );
    assert!(matches!(
        object.hash(HashType::QuickXor),
        Err(Error::Unsupported(_))
    ));
}

#[tokio::test]
async fn test_business_drive_reports_quick_xor_as_hex() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "f.txt", file_json("F", "f.txt", 4)).await;
    let config = common::test_config(&server, "")
        .onedrive_drive_type("business")
        .build();
    let fs = OneDriveFs::new(common::client_for(&config), &config)
        .await
        .unwrap();

    assert_eq!(fs.hashes(), vec![HashType::QuickXor]);
    let object = fs.new_object("f.txt").await.unwrap();
    assert_eq!(
        object.hash(HashType::QuickXor).unwrap(),
        "000102030405060708090a0b0c0d0e0f10111213"
    );
    assert!(matches!(object.hash(HashType::Sha1), Err(Error::Unsupported(_))));
}

#[tokio::test]
async fn test_remove_object() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "f.txt", file_json("F", "f.txt", 4)).await;
    Mock::given(method("DELETE"))
        .and(path("/me/drive/items/F"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let fs = common::connect(&server, "").await;

    let object = fs.new_object("f.txt").await.unwrap();
    object.remove().await.unwrap();
}

// ============================================================================
// Open
// ============================================================================

const CONTENT_PATH: &str = "/me/drive/items/F/content";

async fn read_all(object: &mut impl RemoteObject, range: ReadRange) -> Vec<u8> {
    let mut reader = object.open(range).await.unwrap();
    let mut data = Vec::new();
    reader.read_to_end(&mut data).await.unwrap();
    data
}

#[tokio::test]
async fn test_open_reads_requested_range() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "f.txt", file_json("F", "f.txt", 10)).await;
    Mock::given(method("GET"))
        .and(path(CONTENT_PATH))
        .and(header("Range", "bytes=2-5"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 2-5/10")
                .set_body_bytes(&b"2345"[..]),
        )
        .expect(1)
        .mount(&server)
        .await;
    let fs = common::connect(&server, "").await;
    let mut object = fs.new_object("f.txt").await.unwrap();

    let data = read_all(&mut object, ReadRange::Between(2, 5)).await;

    assert_eq!(data, b"2345");
    assert_eq!(object.size(), 10);
}

#[tokio::test]
async fn test_open_clamps_range_past_end() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "f.txt", file_json("F", "f.txt", 10)).await;
    Mock::given(method("GET"))
        .and(path(CONTENT_PATH))
        .and(header("Range", "bytes=6-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 6-9/10")
                .set_body_bytes(&b"6789"[..]),
        )
        .expect(1)
        .mount(&server)
        .await;
    let fs = common::connect(&server, "").await;
    let mut object = fs.new_object("f.txt").await.unwrap();

    let data = read_all(&mut object, ReadRange::Between(6, 1000)).await;

    assert_eq!(data, b"6789");
}

#[tokio::test]
async fn test_open_full_read_corrects_size() {
    let server = common::setup_drive_mock().await;
    // The listing under-reports the size
    common::mount_item(&server, "f.txt", file_json("F", "f.txt", 4)).await;
    Mock::given(method("GET"))
        .and(path(CONTENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"0123456789"[..]))
        .mount(&server)
        .await;
    let fs = common::connect(&server, "").await;
    let mut object = fs.new_object("f.txt").await.unwrap();

    let data = read_all(&mut object, ReadRange::All).await;

    assert_eq!(data, b"0123456789");
    assert_eq!(object.size(), 10);
    let calls = common::requests_to(&server, "GET", CONTENT_PATH).await;
    assert_eq!(calls.len(), 1);
    assert!(calls[0].headers.get("range").is_none());
}

#[tokio::test]
async fn test_open_retries_throttled_download() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "f.txt", file_json("F", "f.txt", 3)).await;
    Mock::given(method("GET"))
        .and(path(CONTENT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CONTENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"abc"[..]))
        .mount(&server)
        .await;
    let fs = common::connect(&server, "").await;
    let mut object = fs.new_object("f.txt").await.unwrap();

    let data = read_all(&mut object, ReadRange::All).await;

    assert_eq!(data, b"abc");
    assert_eq!(common::requests_to(&server, "GET", CONTENT_PATH).await.len(), 2);
}
