//! S3 REST client
//!
//! Provides a thin async client over `reqwest` for the handful of S3
//! operations CapySync needs. Every request is addressed path-style and,
//! when credentials are configured, signed with SigV4.
//!
//! The client never retries; callers wrap operations in their own policy.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use capysync_core::config::StorageConfig;

use crate::listing::{ErrorBody, ListBucketResult};
use crate::signing::{
    amz_date, canonical_query, payload_hash, uri_encode, CanonicalRequest, Credentials, Signer,
};
use crate::S3Error;

/// Metadata header carrying the SHA-256 of the object content
pub const CONTENT_HASH_HEADER: &str = "x-amz-meta-content-sha256";

/// Wait time used when a throttling response has no usable `Retry-After`
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Longest `Retry-After` honored from an HTTP date
const MAX_RETRY_AFTER_SECS: u64 = 3600;

/// A downloaded object
#[derive(Debug, Clone)]
pub struct ObjectBody {
    pub data: Vec<u8>,
    pub etag: Option<String>,
}

/// Response headers of a `HeadObject` call
#[derive(Debug, Clone, Default)]
pub struct ObjectHead {
    pub etag: Option<String>,
    pub content_length: Option<u64>,
    /// Raw value of [`CONTENT_HASH_HEADER`], if present
    pub content_hash: Option<String>,
}

/// HTTP client for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Client {
    client: Client,
    endpoint: Url,
    region: String,
    signer: Option<Signer>,
}

impl S3Client {
    /// Creates a client for `endpoint`
    ///
    /// # Arguments
    /// * `endpoint` - Base URL, e.g. `http://localhost:9000`
    /// * `region` - Signing region
    /// * `credentials` - Access key pair; `None` sends unsigned requests
    pub fn new(
        endpoint: &str,
        region: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Result<Self, S3Error> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| S3Error::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.host_str().is_none() {
            return Err(S3Error::InvalidEndpoint(endpoint.to_string()));
        }

        let region = region.into();
        let signer = credentials.map(|c| Signer::new(c, region.clone()));
        Ok(Self {
            client: Client::new(),
            endpoint,
            region,
            signer,
        })
    }

    /// Creates a client from the `storage` config section
    ///
    /// Without an explicit endpoint the regional AWS endpoint is used.
    /// Credentials are used only when both halves of the pair are set.
    pub fn from_config(config: &StorageConfig) -> Result<Self, S3Error> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", config.region));

        let credentials = match (&config.access_key_id, &config.secret_access_key) {
            (Some(id), Some(secret)) => Some(Credentials::new(id.clone(), secret.clone())),
            _ => None,
        };

        Self::new(&endpoint, config.region.clone(), credentials)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn is_signed(&self) -> bool {
        self.signer.is_some()
    }

    /// Encoded request path for `bucket` and optional `key`
    fn object_path(&self, bucket: &str, key: Option<&str>) -> String {
        let base = self.endpoint.path().trim_end_matches('/');
        match key {
            Some(key) => format!("{base}/{}/{}", uri_encode(bucket, true), uri_encode(key, false)),
            None => format!("{base}/{}", uri_encode(bucket, true)),
        }
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Builds, signs and sends one request
    async fn send(
        &self,
        method: Method,
        bucket: &str,
        key: Option<&str>,
        query: &[(String, String)],
        extra_headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<Response, S3Error> {
        let path = self.object_path(bucket, key);
        let mut url = self.endpoint.clone();
        url.set_path(&path);
        if query.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&canonical_query(query)));
        }

        let now = Utc::now();
        let content_sha256 = payload_hash(&body);

        let mut headers: Vec<(String, String)> = vec![
            ("host".to_string(), self.host_header()),
            ("x-amz-content-sha256".to_string(), content_sha256.clone()),
            ("x-amz-date".to_string(), amz_date(&now)),
        ];
        headers.extend(extra_headers.iter().cloned());

        let authorization = self.signer.as_ref().map(|signer| {
            let canonical = CanonicalRequest {
                method: method.as_str(),
                path: &path,
                query,
                headers: &headers,
                payload_sha256: &content_sha256,
            };
            signer.authorization(&canonical, &now)
        });

        debug!(method = %method, url = %url, signed = authorization.is_some(), "S3 request");

        let mut request = self.client.request(method, url);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = authorization {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        Ok(request.send().await?)
    }

    /// Fetches one page of `ListObjectsV2`
    pub async fn list_objects_v2(
        &self,
        bucket: &str,
        continuation: Option<&str>,
        max_keys: Option<u32>,
    ) -> Result<ListBucketResult, S3Error> {
        let mut query = vec![("list-type".to_string(), "2".to_string())];
        if let Some(token) = continuation {
            query.push(("continuation-token".to_string(), token.to_string()));
        }
        if let Some(max) = max_keys {
            query.push(("max-keys".to_string(), max.to_string()));
        }

        let response = self.send(Method::GET, bucket, None, &query, &[], Vec::new()).await?;
        let response = check_status(response, bucket).await?;
        let text = response.text().await?;
        ListBucketResult::parse(&text)
    }

    /// `HeadObject`; returns `None` when the object does not exist
    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectHead>, S3Error> {
        let response = self
            .send(Method::HEAD, bucket, Some(key), &[], &[], Vec::new())
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response, key).await?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Ok(Some(ObjectHead {
            etag: header("etag"),
            content_length: header("content-length").and_then(|v| v.parse().ok()),
            content_hash: header(CONTENT_HASH_HEADER),
        }))
    }

    /// `PutObject` with the content digest stored as user metadata
    ///
    /// # Returns
    /// The ETag reported by the service, if any
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_hash: &str,
    ) -> Result<Option<String>, S3Error> {
        let extra = vec![
            (
                "content-type".to_string(),
                "application/octet-stream".to_string(),
            ),
            (CONTENT_HASH_HEADER.to_string(), content_hash.to_string()),
        ];
        let response = self
            .send(Method::PUT, bucket, Some(key), &[], &extra, data)
            .await?;
        let response = check_status(response, key).await?;

        Ok(response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }

    /// `GetObject`
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, S3Error> {
        let response = self
            .send(Method::GET, bucket, Some(key), &[], &[], Vec::new())
            .await?;
        let response = check_status(response, key).await?;

        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response.bytes().await?.to_vec();

        Ok(ObjectBody { data, etag })
    }

    /// `DeleteObject`; a missing object is not an error
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), S3Error> {
        let response = self
            .send(Method::DELETE, bucket, Some(key), &[], &[], Vec::new())
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(key, "delete of missing object");
            return Ok(());
        }
        check_status(response, key).await?;
        Ok(())
    }
}

// ============================================================================
// Status mapping
// ============================================================================

/// Maps a non-2xx response to an [`S3Error`]
async fn check_status(response: Response, resource: &str) -> Result<Response, S3Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
        .unwrap_or(DEFAULT_RETRY_AFTER);

    let body = response.text().await.unwrap_or_default();
    let error = ErrorBody::parse(&body);
    let code = error.code.clone().unwrap_or_default();
    let message = error
        .summary()
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("no details").to_string());

    warn!(status = status.as_u16(), resource, %message, "S3 request failed");

    Err(match status {
        StatusCode::UNAUTHORIZED => S3Error::Unauthorized(message),
        StatusCode::FORBIDDEN => S3Error::Forbidden(message),
        StatusCode::NOT_FOUND => S3Error::NotFound(format!("{resource}: {message}")),
        StatusCode::TOO_MANY_REQUESTS => S3Error::TooManyRequests { retry_after },
        StatusCode::SERVICE_UNAVAILABLE if code == "SlowDown" => {
            S3Error::TooManyRequests { retry_after }
        }
        s if s.is_server_error() => S3Error::ServerError {
            status: s.as_u16(),
            message,
        },
        s => S3Error::Rejected {
            status: s.as_u16(),
            message,
        },
    })
}

/// Parses a `Retry-After` value given as seconds or as an HTTP date
///
/// Dates in the past, unparseable values and dates more than an hour away
/// fall back to `default`.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let target = date.with_timezone(&Utc);
        let now = Utc::now();
        if target > now {
            if let Some(secs) = (target - now)
                .num_seconds()
                .try_into()
                .ok()
                .filter(|&s: &u64| s <= MAX_RETRY_AFTER_SECS)
            {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
