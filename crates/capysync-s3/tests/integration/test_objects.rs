//! Object upload, metadata, download and deletion

use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use capysync_core::ports::object_store::IObjectStore;
use capysync_s3::client::CONTENT_HASH_HEADER;

use crate::common;

#[tokio::test]
async fn test_put_object_sends_digest_metadata() {
    let (server, store) = common::setup_s3_mock().await;
    let hash = common::digest('a');

    Mock::given(method("PUT"))
        .and(path("/backups/docs/report%202024.txt"))
        .and(header(CONTENT_HASH_HEADER, hash.as_str()))
        .and(header(
            "x-amz-content-sha256",
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
        ))
        .and(body_bytes(b"hello".to_vec()))
        .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"5d41402abc4b2a76b9719d911017c592\""))
        .expect(1)
        .mount(&server)
        .await;

    store
        .put_object(
            &common::bucket(),
            &common::key("docs/report 2024.txt"),
            b"hello",
            &hash,
        )
        .await
        .expect("upload failed");
}

#[tokio::test]
async fn test_head_object_reads_digest() {
    let (server, store) = common::setup_s3_mock().await;
    let hash = common::digest('b');

    Mock::given(method("HEAD"))
        .and(path("/backups/a.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(CONTENT_HASH_HEADER, hash.as_str())
                .insert_header("etag", "\"x\""),
        )
        .mount(&server)
        .await;

    let found = store
        .head_object_hash(&common::bucket(), &common::key("a.txt"))
        .await
        .unwrap();
    assert_eq!(found, Some(hash));
}

#[tokio::test]
async fn test_head_object_without_metadata_is_none() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path("/backups/plain.txt"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let found = store
        .head_object_hash(&common::bucket(), &common::key("plain.txt"))
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_head_object_malformed_metadata_is_none() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path("/backups/odd.txt"))
        .respond_with(ResponseTemplate::new(200).insert_header(CONTENT_HASH_HEADER, "not-a-digest"))
        .mount(&server)
        .await;

    let found = store
        .head_object_hash(&common::bucket(), &common::key("odd.txt"))
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_head_missing_object_is_none() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path("/backups/gone.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let found = store
        .head_object_hash(&common::bucket(), &common::key("gone.txt"))
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_get_object_returns_body() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("GET"))
        .and(path("/backups/nested/deep/file.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 1, 2, 255]))
        .mount(&server)
        .await;

    let data = store
        .get_object(&common::bucket(), &common::key("nested/deep/file.bin"))
        .await
        .unwrap();
    assert_eq!(data, vec![0u8, 1, 2, 255]);
}

#[tokio::test]
async fn test_delete_object_accepts_204_and_404() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/backups/old.txt"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/backups/missing.txt"))
        .respond_with(ResponseTemplate::new(404).set_body_string(common::error_xml("NoSuchKey", "gone")))
        .expect(1)
        .mount(&server)
        .await;

    store
        .delete_object(&common::bucket(), &common::key("old.txt"))
        .await
        .unwrap();
    store
        .delete_object(&common::bucket(), &common::key("missing.txt"))
        .await
        .unwrap();
}
