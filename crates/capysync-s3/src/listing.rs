//! S3 XML response bodies
//!
//! Deserialized with `quick-xml`'s serde support. Only the elements the
//! adapter uses are modelled; anything else in the document is ignored.

use serde::Deserialize;

use capysync_core::ports::object_store::{ListedObject, ObjectListPage};

use crate::S3Error;

/// `ListObjectsV2` response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListBucketResult {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub key_count: Option<u64>,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub contents: Vec<ListedContent>,
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}

/// One `<Contents>` element
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListedContent {
    pub key: String,
    #[serde(rename = "ETag", default)]
    pub etag: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub last_modified: Option<String>,
}

/// Error document returned with non-2xx responses
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Parse an error document; an unparseable body yields an empty one
    pub fn parse(xml: &str) -> Self {
        quick_xml::de::from_str(xml).unwrap_or_default()
    }

    /// `Code: Message`, or whichever part is present
    pub fn summary(&self) -> Option<String> {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => Some(format!("{code}: {message}")),
            (Some(code), None) => Some(code.clone()),
            (None, Some(message)) => Some(message.clone()),
            (None, None) => None,
        }
    }
}

impl ListBucketResult {
    pub fn parse(xml: &str) -> Result<Self, S3Error> {
        quick_xml::de::from_str(xml)
            .map_err(|e| S3Error::InvalidResponse(format!("ListObjectsV2 body: {e}")))
    }

    /// Convert to the port's page type
    ///
    /// # Errors
    /// `S3Error::InvalidResponse` when the result is truncated but carries no
    /// continuation token
    pub fn into_page(self) -> Result<ObjectListPage, S3Error> {
        let next_continuation = if self.is_truncated {
            match self.next_continuation_token {
                Some(token) if !token.is_empty() => Some(token),
                _ => {
                    return Err(S3Error::InvalidResponse(
                        "truncated listing without NextContinuationToken".to_string(),
                    ))
                }
            }
        } else {
            None
        };

        let objects = self
            .contents
            .into_iter()
            .map(|c| ListedObject {
                key: c.key,
                etag: c.etag,
                size: c.size,
            })
            .collect();

        Ok(ObjectListPage {
            objects,
            next_continuation,
        })
    }
}
