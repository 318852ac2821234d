//! Read the text content of document URLs.
//!
//! Fetching and parsing raw bytes is delegated to a [`FileContentLoader`];
//! the reader normalises the URL list, fans out one load per URL through the
//! [`ContentCache`], and frames each file's text for the model.

use crate::address::is_internal_address;
use crate::cache::{CachedContent, ContentCache};
use crate::file_type::is_document_url;
use async_trait::async_trait;
use futures::future::join_all;
use rustedflow_core::error::FileError;
use rustedflow_core::text::truncate_with_ellipsis;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Separator between file blocks in the combined text.
pub const FILE_BLOCK_SEPARATOR: &str = "\n******\n";

/// Chars of file content kept in the node response preview.
pub const PREVIEW_CONTENT_CHARS: usize = 100;

const VALID_URL_PREFIXES: &[&str] = &["/", "http", "ws"];

/// One fetch-and-parse job handed to the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub url: String,
    pub team_id: String,
    pub tmb_id: String,
    pub custom_pdf_parse: bool,
    pub usage_id: Option<String>,
}

/// Parsed file as returned by a loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    /// Name reported by the source, e.g. from `Content-Disposition`
    pub filename: Option<String>,
    pub text: String,
}

/// Fetches a file and turns its bytes into text.
#[async_trait]
pub trait FileContentLoader: Send + Sync {
    async fn load(&self, request: &LoadRequest) -> Result<LoadedFile, FileError>;
}

/// Input to [`FileReader::read`].
#[derive(Debug, Clone, Default)]
pub struct ReadFilesRequest {
    pub urls: Vec<String>,

    /// Origin of the incoming request; same-origin URLs are made relative
    pub request_origin: Option<String>,

    pub max_files: usize,
    pub custom_pdf_parse: bool,
    pub team_id: String,
    pub tmb_id: String,
    pub usage_id: Option<String>,
}

/// The outcome for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileResult {
    /// Empty when the load failed
    pub filename: String,
    pub url: String,

    /// Full framed block sent to the model
    pub text: String,

    /// Framed block with content cut to 100 chars
    pub preview_text: String,

    #[serde(skip)]
    pub error: Option<FileError>,
}

impl ReadFileResult {
    fn framed(filename: String, url: String, content: &str, error: Option<FileError>) -> Self {
        Self {
            text: frame_content(&filename, content),
            preview_text: frame_content(
                &filename,
                &truncate_with_ellipsis(content, PREVIEW_CONTENT_CHARS),
            ),
            filename,
            url,
            error,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Combined read output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileContents {
    /// Every file block joined with [`FILE_BLOCK_SEPARATOR`]
    pub text: String,
    pub results: Vec<ReadFileResult>,
}

impl FileContents {
    /// Preview blocks joined the same way as the full text.
    pub fn preview(&self) -> String {
        self.results
            .iter()
            .map(|r| r.preview_text.as_str())
            .collect::<Vec<_>>()
            .join(FILE_BLOCK_SEPARATOR)
    }

    pub fn errors(&self) -> impl Iterator<Item = &FileError> {
        self.results.iter().filter_map(|r| r.error.as_ref())
    }
}

/// Frame one file's content for the model.
pub fn frame_content(filename: &str, content: &str) -> String {
    format!("File: {filename}\n<Content>\n{content}\n</Content>")
}

/// Filter and rewrite raw URLs before reading.
///
/// Keeps only strings starting with `/`, `http` or `ws` that point at a
/// document, strips `request_origin` from same-origin URLs, and keeps at most
/// `max_files`.
pub fn normalize_urls(urls: &[String], request_origin: Option<&str>, max_files: usize) -> Vec<String> {
    let origin = request_origin.filter(|o| !o.is_empty());

    urls.iter()
        .filter(|url| VALID_URL_PREFIXES.iter().any(|p| url.starts_with(p)))
        .filter(|url| is_document_url(url))
        .map(|url| match origin {
            Some(origin) => url.strip_prefix(origin).unwrap_or(url).to_string(),
            None => url.clone(),
        })
        .filter(|url| !url.is_empty())
        .take(max_files)
        .collect()
}

/// Reads document URLs through the content cache.
#[derive(Clone)]
pub struct FileReader {
    loader: Arc<dyn FileContentLoader>,
    cache: Arc<ContentCache>,
}

impl FileReader {
    /// A reader backed by the process-wide cache.
    pub fn new(loader: Arc<dyn FileContentLoader>) -> Self {
        Self::with_cache(loader, ContentCache::global())
    }

    pub fn with_cache(loader: Arc<dyn FileContentLoader>, cache: Arc<ContentCache>) -> Self {
        Self { loader, cache }
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Read every URL concurrently. A failed URL yields a result carrying its
    /// error text; the others are unaffected.
    pub async fn read(&self, request: &ReadFilesRequest) -> FileContents {
        let urls = normalize_urls(
            &request.urls,
            request.request_origin.as_deref(),
            request.max_files,
        );
        debug!(requested = request.urls.len(), reading = urls.len(), "Reading files");

        let results = join_all(urls.into_iter().map(|url| self.read_one(request, url))).await;

        let text = results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(FILE_BLOCK_SEPARATOR);

        FileContents { text, results }
    }

    async fn read_one(&self, request: &ReadFilesRequest, url: String) -> ReadFileResult {
        let load_request = LoadRequest {
            url: url.clone(),
            team_id: request.team_id.clone(),
            tmb_id: request.tmb_id.clone(),
            custom_pdf_parse: request.custom_pdf_parse,
            usage_id: request.usage_id.clone(),
        };

        let loaded = self
            .cache
            .get_or_load(&url, || async {
                if is_internal_address(&url) {
                    return Err(FileError::InvalidUrl(url.clone()));
                }
                let file = self.loader.load(&load_request).await?;
                Ok(CachedContent {
                    source_name: file.filename.filter(|n| !n.is_empty()).unwrap_or_else(|| url.clone()),
                    text: file.text,
                })
            })
            .await;

        match loaded {
            Ok(content) => ReadFileResult::framed(content.source_name, url, &content.text, None),
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to read file");
                let message = e.to_string();
                ReadFileResult::framed(String::new(), url, &message, Some(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `content of {url}` and fails any URL containing `broken`.
    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl FileContentLoader for CountingLoader {
        async fn load(&self, request: &LoadRequest) -> Result<LoadedFile, FileError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if request.url.contains("broken") {
                return Err(FileError::LoadFailed {
                    url: request.url.clone(),
                    reason: "status 404".into(),
                });
            }
            let name = request.url.rsplit('/').next().map(str::to_string);
            Ok(LoadedFile {
                filename: name,
                text: format!("content of {}", request.url),
            })
        }
    }

    fn reader() -> (Arc<CountingLoader>, FileReader) {
        let loader = Arc::new(CountingLoader::default());
        let reader = FileReader::with_cache(loader.clone(), Arc::new(ContentCache::new()));
        (loader, reader)
    }

    fn request(urls: &[&str]) -> ReadFilesRequest {
        ReadFilesRequest {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            max_files: 20,
            ..Default::default()
        }
    }

    #[test]
    fn normalize_filters_prefix_type_and_origin() {
        let urls: Vec<String> = [
            "https://app.example.com/api/a.pdf",
            "ftp://x/b.pdf",
            "https://cdn/c.png",
            "/api/d.txt",
            "wss://x/e.md",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let out = normalize_urls(&urls, Some("https://app.example.com"), 20);
        assert_eq!(out, vec!["/api/a.pdf", "/api/d.txt", "wss://x/e.md"]);
    }

    #[test]
    fn normalize_caps_at_max_files() {
        let urls: Vec<String> = (0..5).map(|i| format!("/f{i}.txt")).collect();
        assert_eq!(normalize_urls(&urls, None, 2).len(), 2);
    }

    #[tokio::test]
    async fn reads_and_frames_files() {
        let (_, reader) = reader();
        let contents = reader.read(&request(&["/a.txt", "/b.txt"])).await;

        assert_eq!(
            contents.text,
            "File: a.txt\n<Content>\ncontent of /a.txt\n</Content>\n******\nFile: b.txt\n<Content>\ncontent of /b.txt\n</Content>"
        );
        assert_eq!(contents.results.len(), 2);
        assert!(contents.results.iter().all(ReadFileResult::is_ok));
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let (loader, reader) = reader();
        let first = reader.read(&request(&["/a.txt"])).await;
        let second = reader.read(&request(&["/a.txt"])).await;

        assert_eq!(first.text, second.text);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_others() {
        let (_, reader) = reader();
        let contents = reader.read(&request(&["/broken.txt", "/ok.txt"])).await;

        assert_eq!(contents.results.len(), 2);
        assert_eq!(contents.results[0].filename, "");
        assert!(contents.results[0].text.contains("Load file error: status 404"));
        assert!(contents.results[1].is_ok());
        assert_eq!(contents.errors().count(), 1);
    }

    #[tokio::test]
    async fn internal_hosts_are_refused_before_loading() {
        let (loader, reader) = reader();
        let contents = reader
            .read(&request(&["http://169.254.169.254/secrets.txt", "/ok.txt"]))
            .await;

        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(
            contents.results[0].error,
            Some(FileError::InvalidUrl("http://169.254.169.254/secrets.txt".into()))
        );
        assert!(contents.results[0].text.contains("Url is invalid"));
        assert!(contents.results[1].is_ok());
    }

    #[tokio::test]
    async fn preview_cuts_long_content() {
        struct LongLoader;

        #[async_trait]
        impl FileContentLoader for LongLoader {
            async fn load(&self, _: &LoadRequest) -> Result<LoadedFile, FileError> {
                Ok(LoadedFile {
                    filename: None,
                    text: "x".repeat(150),
                })
            }
        }

        let reader = FileReader::with_cache(Arc::new(LongLoader), Arc::new(ContentCache::new()));
        let contents = reader.read(&request(&["/long.txt"])).await;

        let result = &contents.results[0];
        assert_eq!(result.filename, "/long.txt");
        assert!(result.preview_text.contains(&format!("{}......", "x".repeat(100))));
        assert_eq!(contents.preview(), result.preview_text);
    }
}
