//! Error status mapping
//!
//! Each failure must surface as a tagged `RemoteError` wrapping the right
//! `S3Error` variant, with the operation in the rendered chain.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use capysync_core::ports::object_store::{IObjectStore, RemoteError, RemoteFault};
use capysync_s3::S3Error;

use crate::common;

fn remote(err: &anyhow::Error) -> &RemoteError {
    RemoteError::find(err).expect("RemoteError in chain")
}

fn s3_error(err: &anyhow::Error) -> &S3Error {
    remote(err)
        .inner()
        .downcast_ref::<S3Error>()
        .expect("S3Error inside RemoteError")
}

#[tokio::test]
async fn test_forbidden_maps_to_forbidden() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("GET"))
        .and(path("/backups"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string(common::error_xml("SignatureDoesNotMatch", "bad signature")),
        )
        .mount(&server)
        .await;

    let err = store
        .list_objects_page(&common::bucket(), None)
        .await
        .unwrap_err();
    match s3_error(&err) {
        S3Error::Forbidden(message) => {
            assert_eq!(message, "SignatureDoesNotMatch: bad signature")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(format!("{err:#}").contains("Failed to list bucket backups"));
    assert_eq!(remote(&err).fault(), RemoteFault::Permanent);
}

#[tokio::test]
async fn test_forbidden_upload_stays_permanent_whatever_the_key() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string(common::error_xml("AccessDenied", "Access Denied")),
        )
        .mount(&server)
        .await;

    for name in ["reports/q500.csv", "docs/connection-guide.md", "notes/timeout.txt"] {
        let err = store
            .put_object(&common::bucket(), &common::key(name), b"x", &common::digest('a'))
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains(name));
        assert!(!remote(&err).is_transient(), "{name} classified as transient");
    }
}

#[tokio::test]
async fn test_missing_bucket_maps_to_not_found() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("GET"))
        .and(path("/backups"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(common::error_xml(
                "NoSuchBucket",
                "The specified bucket does not exist",
            )),
        )
        .mount(&server)
        .await;

    let err = store
        .list_objects_page(&common::bucket(), None)
        .await
        .unwrap_err();
    assert!(matches!(s3_error(&err), S3Error::NotFound(_)));
}

#[tokio::test]
async fn test_throttling_carries_retry_after() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("GET"))
        .and(path("/backups/a.txt"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "4"))
        .mount(&server)
        .await;

    let err = store
        .get_object(&common::bucket(), &common::key("a.txt"))
        .await
        .unwrap_err();
    match s3_error(&err) {
        S3Error::TooManyRequests { retry_after } => {
            assert_eq!(*retry_after, Duration::from_secs(4))
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(format!("{err:#}").to_lowercase().contains("too many requests"));
    assert_eq!(remote(&err).retry_after(), Some(Duration::from_secs(4)));
}

#[tokio::test]
async fn test_slow_down_is_throttling() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("PUT"))
        .and(path("/backups/a.txt"))
        .respond_with(
            ResponseTemplate::new(503).set_body_string(common::error_xml("SlowDown", "Reduce your request rate")),
        )
        .mount(&server)
        .await;

    let err = store
        .put_object(&common::bucket(), &common::key("a.txt"), b"x", &common::digest('c'))
        .await
        .unwrap_err();
    assert!(matches!(s3_error(&err), S3Error::TooManyRequests { .. }));
    assert!(remote(&err).is_transient());
}

#[tokio::test]
async fn test_internal_error_is_server_error() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/backups/a.txt"))
        .respond_with(ResponseTemplate::new(500).set_body_string(common::error_xml("InternalError", "oops")))
        .mount(&server)
        .await;

    let err = store
        .delete_object(&common::bucket(), &common::key("a.txt"))
        .await
        .unwrap_err();
    match s3_error(&err) {
        S3Error::ServerError { status, message } => {
            assert_eq!(*status, 500);
            assert_eq!(message, "InternalError: oops");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(format!("{err:#}").contains("Server error 500"));
    assert!(remote(&err).is_transient());
}

#[tokio::test]
async fn test_bad_request_is_rejected() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path("/backups/a.txt"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let err = store
        .head_object_hash(&common::bucket(), &common::key("a.txt"))
        .await
        .unwrap_err();
    match s3_error(&err) {
        S3Error::Rejected { status, message } => {
            assert_eq!(*status, 400);
            assert_eq!(message, "Bad Request");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!remote(&err).is_transient());
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    let client = capysync_s3::S3Client::new("http://127.0.0.1:1", "us-east-1", None).unwrap();
    let store = capysync_s3::S3ObjectStore::new(client);

    let err = store
        .delete_object(&common::bucket(), &common::key("a.txt"))
        .await
        .unwrap_err();
    assert!(matches!(s3_error(&err), S3Error::NetworkError(_)));
    assert!(format!("{err:#}").contains("Network error"));
    assert!(remote(&err).is_transient());
}
