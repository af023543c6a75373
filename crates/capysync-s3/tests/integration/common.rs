//! Shared helpers for S3 adapter integration tests

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use capysync_core::domain::newtypes::{BucketName, ContentHash, ObjectKey};
use capysync_s3::client::S3Client;
use capysync_s3::signing::Credentials;
use capysync_s3::S3ObjectStore;

pub const BUCKET: &str = "backups";
pub const ACCESS_KEY: &str = "AKIDTESTKEY";
pub const SECRET_KEY: &str = "test-secret";

/// Starts a mock server and returns a signed store pointing at it
pub async fn setup_s3_mock() -> (MockServer, S3ObjectStore) {
    let server = MockServer::start().await;
    let client = S3Client::new(
        &server.uri(),
        "us-east-1",
        Some(Credentials::new(ACCESS_KEY, SECRET_KEY)),
    )
    .expect("mock endpoint is valid");
    (server, S3ObjectStore::new(client))
}

pub fn bucket() -> BucketName {
    BucketName::new(BUCKET.to_string()).unwrap()
}

pub fn key(s: &str) -> ObjectKey {
    ObjectKey::new(s.to_string()).unwrap()
}

pub fn digest(c: char) -> ContentHash {
    ContentHash::new(std::iter::repeat(c).take(64).collect()).unwrap()
}

/// Renders a `ListBucketResult` document
pub fn listing_xml(keys: &[&str], next_token: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|k| {
            format!(
                "<Contents><Key>{k}</Key><ETag>&quot;etag-{k}&quot;</ETag><Size>3</Size></Contents>"
            )
        })
        .collect();
    let (truncated, token) = match next_token {
        Some(t) => ("true", format!("<NextContinuationToken>{t}</NextContinuationToken>")),
        None => ("false", String::new()),
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>{BUCKET}</Name><KeyCount>{}</KeyCount><IsTruncated>{truncated}</IsTruncated>{contents}{token}</ListBucketResult>"#,
        keys.len()
    )
}

/// Mounts the first page of a listing (no continuation token)
pub async fn mount_first_page(server: &MockServer, keys: &[&str], next_token: Option<&str>) {
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("list-type", "2"))
        .and(NoContinuation)
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_xml(keys, next_token))
                .insert_header("content-type", "application/xml"),
        )
        .mount(server)
        .await;
}

/// Mounts the page answering `token`
pub async fn mount_page(server: &MockServer, token: &str, keys: &[&str], next_token: Option<&str>) {
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("continuation-token", token))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_xml(keys, next_token))
                .insert_header("content-type", "application/xml"),
        )
        .mount(server)
        .await;
}

/// S3 error document
pub fn error_xml(code: &str, message: &str) -> String {
    format!("<Error><Code>{code}</Code><Message>{message}</Message></Error>")
}

/// Matches requests without a `continuation-token` query parameter
pub struct NoContinuation;

impl wiremock::Match for NoContinuation {
    fn matches(&self, request: &wiremock::Request) -> bool {
        !request
            .url
            .query_pairs()
            .any(|(k, _)| k == "continuation-token")
    }
}
