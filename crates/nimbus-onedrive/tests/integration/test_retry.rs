//! Retry behavior of paced Graph calls.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use nimbus_core::ports::{RemoteFs, RemoteObject};
use nimbus_core::Error;
use nimbus_onedrive::OneDriveFs;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, file_json};

const ITEM_PATH: &str = "/me/drive/root:/f.txt";

/// Answers the first request for `f.txt` with `first`, later ones with the file
async fn mount_flaky_item(server: &MockServer, first: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(first)
        .up_to_n_times(1)
        .mount(server)
        .await;
    common::mount_item(server, "f.txt", file_json("F", "f.txt", 4)).await;
}

#[tokio::test]
async fn test_throttled_call_waits_for_retry_after() {
    let server = common::setup_drive_mock().await;
    mount_flaky_item(
        &server,
        ResponseTemplate::new(429).insert_header("Retry-After", "1"),
    )
    .await;
    let fs = common::connect(&server, "").await;

    let started = Instant::now();
    let object = fs.new_object("f.txt").await.unwrap();

    assert_eq!(object.id(), "F");
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(common::requests_to(&server, "GET", ITEM_PATH).await.len(), 2);
}

#[tokio::test]
async fn test_server_errors_exhaust_attempts() {
    let server = common::setup_drive_mock().await;
    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let fs = common::connect(&server, "").await;

    let err = fs.new_object("f.txt").await.unwrap_err();

    assert!(err.is_transient());
    assert_eq!(common::requests_to(&server, "GET", ITEM_PATH).await.len(), 4);
}

fn expired_token() -> ResponseTemplate {
    ResponseTemplate::new(401).insert_header(
        "WWW-Authenticate",
        r#"Bearer realm="", error="invalid_token", error_description="expired_token""#,
    )
}

#[tokio::test]
async fn test_expired_token_is_refreshed_before_retry() {
    let server = common::setup_drive_mock().await;
    mount_flaky_item(&server, expired_token()).await;
    let (source, issued) = common::counting_token_source();
    let config = common::test_config(&server, "").build();
    let fs = common::connect_with_source(&config, source).await;

    let object = fs.new_object("f.txt").await.unwrap();

    assert_eq!(object.id(), "F");
    assert_eq!(issued.load(Ordering::SeqCst), 1);
    let calls = common::requests_to(&server, "GET", ITEM_PATH).await;
    assert_eq!(calls.len(), 2);
    assert_eq!(
        common::bearer(&calls[0]).as_deref(),
        Some("Bearer test-access-token")
    );
    assert_eq!(
        common::bearer(&calls[1]).as_deref(),
        Some("Bearer refreshed-token-1")
    );
}

#[tokio::test]
async fn test_expired_token_without_source_is_not_resent() {
    let server = common::setup_drive_mock().await;
    mount_flaky_item(&server, expired_token()).await;
    let fs = common::connect(&server, "").await;

    let err = fs.new_object("f.txt").await.unwrap_err();

    assert!(matches!(err, Error::Backend(_)));
    assert!(!err.is_transient());
    assert_eq!(common::requests_to(&server, "GET", ITEM_PATH).await.len(), 1);
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = common::setup_drive_mock().await;
    mount_flaky_item(&server, ResponseTemplate::new(401)).await;
    let fs = common::connect(&server, "").await;

    let err = fs.new_object("f.txt").await.unwrap_err();

    assert!(matches!(err, Error::Backend(_)));
    assert!(!err.is_transient());
    assert_eq!(common::requests_to(&server, "GET", ITEM_PATH).await.len(), 1);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = common::setup_drive_mock().await;
    let fs = common::connect(&server, "").await;

    let err = fs.new_object("f.txt").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(common::requests_to(&server, "GET", ITEM_PATH).await.len(), 1);
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = common::setup_drive_mock().await;
    common::mount_item(&server, "f.txt", file_json("F", "f.txt", 4)).await;
    let fs = common::connect(&server, "").await;

    fs.new_object("f.txt").await.unwrap();

    let calls = common::requests_to(&server, "GET", ITEM_PATH).await;
    assert_eq!(
        calls[0].headers.get("authorization").map(|v| v.as_bytes()),
        Some(&b"Bearer test-access-token"[..])
    );
}

#[tokio::test]
async fn test_huge_retry_after_waits_instead_of_failing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "18446744073709551615"),
        )
        .mount(&server)
        .await;
    let config = common::test_config(&server, "").build();

    // Capped to an hour: still backing off when the timeout fires
    let connect = OneDriveFs::new(common::client_for(&config), &config);
    let outcome = tokio::time::timeout(Duration::from_millis(300), connect).await;

    assert!(outcome.is_err());
    assert_eq!(common::requests(&server).await.len(), 1);
}
