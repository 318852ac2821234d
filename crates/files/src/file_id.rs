//! File identifiers and signed file tokens.
//!
//! Uploaded files are served from URLs carrying a signed `token=` query
//! parameter. The token is JWT-shaped (`header.payload.signature`); its
//! payload is base64 JSON with a `fileId` (24 hex chars) and an optional
//! `exp` (Unix seconds). Signature checks belong to the file server; here the
//! payload is only read to recover the id and the expiry.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use regex::Regex;
use rustedflow_core::chat::{ChatFile, ChatFileType};
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

/// Length of a file identifier in hex chars.
pub const FILE_ID_LEN: usize = 24;

/// Display name used when an attachment has none.
pub const UNNAMED_FILE: &str = "Unnamed";

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]token=([^&#]+)").expect("token regex is valid"));

/// Whether `id` looks like a file identifier (24 hex chars, any case).
pub fn is_valid_file_id(id: &str) -> bool {
    id.len() == FILE_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Claims carried in a file token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileTokenClaims {
    #[serde(rename = "fileId", default)]
    pub file_id: Option<String>,

    /// Expiry in Unix seconds
    #[serde(default)]
    pub exp: Option<i64>,
}

impl FileTokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

/// The raw `token` query parameter of a URL.
pub fn file_token(url: &str) -> Option<&str> {
    TOKEN_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Decode the payload of a file token.
///
/// Accepts a three-segment JWT (the middle segment is decoded) or a bare
/// payload segment, in base64url or standard base64, padded or not.
pub fn decode_token_claims(token: &str) -> Option<FileTokenClaims> {
    let mut segments = token.split('.');
    let first = segments.next()?;
    let payload = segments.next().unwrap_or(first);
    let payload = payload.trim_end_matches("%3D").trim_end_matches('=');

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;

    serde_json::from_slice(&bytes).ok()
}

/// Token claims of a file URL, if it carries a readable token.
pub fn token_claims(url: &str) -> Option<FileTokenClaims> {
    let Some(token) = file_token(url) else {
        debug!(url = %preview(url), "No token found in file URL");
        return None;
    };
    let claims = decode_token_claims(token);
    if claims.is_none() {
        debug!(url = %preview(url), "File token payload is not readable");
    }
    claims
}

/// The file id embedded in a URL's token, or an empty string.
pub fn extract_file_id(url: &str) -> String {
    token_claims(url)
        .and_then(|c| c.file_id)
        .unwrap_or_default()
}

/// Whether the URL's token has expired at `now`.
///
/// URLs without a token, with an unreadable token, or without `exp` never
/// expire.
pub fn is_file_token_expired(url: &str, now: DateTime<Utc>) -> bool {
    token_claims(url)
        .and_then(|c| c.exp)
        .is_some_and(|exp| expired(exp, now))
}

/// Expiry is checked at whole-second resolution; the `exp` second itself is
/// still valid.
fn expired(exp: i64, now: DateTime<Utc>) -> bool {
    now.timestamp() > exp
}

fn preview(url: &str) -> String {
    url.chars().take(100).collect()
}

/// A file attachment with its token claims resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    /// Present only when the token carries a well-formed id
    pub file_id: Option<String>,
    pub url: String,
    pub name: String,
    pub kind: ChatFileType,
    pub expires_at: Option<DateTime<Utc>>,
}

impl FileReference {
    pub fn from_chat_file(file: &ChatFile) -> Self {
        let claims = token_claims(&file.url).unwrap_or_default();
        let name = if file.name.is_empty() {
            UNNAMED_FILE.to_string()
        } else {
            file.name.clone()
        };

        Self {
            file_id: claims.file_id.clone().filter(|id| is_valid_file_id(id)),
            url: file.url.clone(),
            name,
            kind: file.kind,
            expires_at: claims.expires_at(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|exp| expired(exp.timestamp(), now))
    }
}
