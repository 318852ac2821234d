//! Classify a URL as a document or an image by its file extension.

use regex::Regex;
use rustedflow_core::chat::{ChatFile, ChatFileType};
use std::sync::LazyLock;

/// Extensions treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tiff"];

static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]filename=([^&#]+)").expect("filename regex is valid"));

/// Turn a URL into a file attachment, or `None` when it has no extension.
///
/// The name comes from a `filename=` query parameter when present, otherwise
/// from the last path segment. `data:image/...` URLs are always images.
pub fn parse_url_to_file(url: &str) -> Option<ChatFile> {
    if url.starts_with("data:image/") {
        return Some(ChatFile::image("image", url));
    }

    let filename = FILENAME_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| {
            let path = url.split(['?', '#']).next().unwrap_or_default();
            path.rsplit('/').next().unwrap_or_default().to_string()
        });

    let extension = file_extension(&filename)?;
    let kind = if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        ChatFileType::Image
    } else {
        ChatFileType::File
    };

    Some(ChatFile {
        kind,
        name: filename,
        url: url.to_string(),
    })
}

/// Lowercased extension of a file name, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether the URL points at a document (not an image, not extension-less).
pub fn is_document_url(url: &str) -> bool {
    parse_url_to_file(url).is_some_and(|f| f.kind == ChatFileType::File)
}
