//! Wire types for the Git LFS batch API.
//!
//! See <https://github.com/git-lfs/git-lfs/blob/main/docs/api/batch.md>.
//! Requests are decoded leniently: missing fields fall back to their
//! defaults, as does an explicit `null`, so that only malformed JSON
//! is rejected outright.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::HashMap, time::Duration};

/// Media type used for both batch requests and responses.
pub const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// Batch operation requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Download,
    Upload,
    /// Anything the basic transfer adapter does not define.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Download => "download",
            Operation::Upload => "upload",
            Operation::Unknown => "unknown",
        }
    }
}

/// `POST /objects/batch` request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(default, deserialize_with = "null_default")]
    pub operation: Operation,

    /// Transfer adapters the client supports. Only `basic` is served.
    #[serde(default, deserialize_with = "null_default")]
    pub transfers: Vec<String>,

    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<RefInfo>,

    #[serde(default, deserialize_with = "null_default")]
    pub objects: Vec<ObjectSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefInfo {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
}

/// One `{oid, size}` pair from the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSpec {
    #[serde(default, deserialize_with = "null_default")]
    pub oid: String,
    #[serde(default, deserialize_with = "null_default")]
    pub size: i64,
}

/// Reads an explicit `null` as the field's default value.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Successful batch response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer: Option<String>,
    pub objects: Vec<BatchResponseObject>,
}

impl BatchResponse {
    /// Response for the basic transfer adapter.
    pub fn basic(objects: Vec<BatchResponseObject>) -> Self {
        Self {
            transfer: Some("basic".into()),
            objects,
        }
    }
}

/// Per-object entry of a batch response.
///
/// `actions` and `error` are independent: a download whose stored size
/// disagrees with the request carries both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponseObject {
    pub oid: String,
    pub size: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Actions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ObjectError>,
}

impl BatchResponseObject {
    /// Echo of a requested object with nothing resolved yet.
    pub fn echo(oid: impl Into<String>, size: i64) -> Self {
        Self {
            oid: oid.into(),
            size,
            authenticated: false,
            actions: None,
            error: None,
        }
    }

    pub fn with_error(mut self, code: u16, message: impl Into<String>) -> Self {
        self.error = Some(ObjectError::new(code, message));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<Box<Actions>>,
}

impl Actions {
    pub fn download(action: Action) -> Self {
        Self {
            download: Some(action),
            ..Self::default()
        }
    }

    pub fn upload(action: Action) -> Self {
        Self {
            upload: Some(action),
            ..Self::default()
        }
    }
}

/// A transfer the client performs directly against storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub href: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub header: HashMap<String, String>,
    /// Seconds from issuance. Mutually exclusive with `expires_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<ExpiresAt>,
}

impl Action {
    /// Action whose URL stays valid for `ttl` from now.
    pub fn expiring_in(href: impl Into<String>, ttl: Duration) -> Self {
        Self {
            href: href.into(),
            header: HashMap::new(),
            expires_in: Some(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
            expires_at: None,
        }
    }

    /// Action whose URL stays valid until an absolute instant.
    pub fn expiring_at(href: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            href: href.into(),
            header: HashMap::new(),
            expires_in: None,
            expires_at: Some(ExpiresAt(at)),
        }
    }
}

/// Absolute expiry, encoded as RFC 3339 with whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiresAt(pub DateTime<Utc>);

impl Serialize for ExpiresAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl<'de> Deserialize<'de> for ExpiresAt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| ExpiresAt(t.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

/// Per-object failure, using HTTP status semantics for `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectError {
    pub code: u16,
    pub message: String,
}

impl ObjectError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Top-level body used when the whole request is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}
