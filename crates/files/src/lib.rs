//! # RustedFlow Files
//!
//! Everything between a file token in a conversation and the text handed to
//! the model:
//!
//! - [`address`]: internal address guard for server-side fetches
//! - [`file_id`]: file ids and signed-token claims (id, expiry)
//! - [`file_type`]: document vs. image classification of URLs
//! - [`resolver`]: file id → URL resolution with per-file errors
//! - [`cache`]: process-wide TTL content cache with single-flight loading
//! - [`reader`]: concurrent content reads through a pluggable loader

pub mod address;
pub mod cache;
pub mod file_id;
pub mod file_type;
pub mod reader;
pub mod resolver;

pub use address::is_internal_address;
pub use cache::{CachedContent, ContentCache};
pub use file_id::{FileReference, extract_file_id, is_file_token_expired, is_valid_file_id};
pub use file_type::parse_url_to_file;
pub use reader::{
    FileContentLoader, FileContents, FileReader, LoadRequest, LoadedFile, ReadFileResult,
    ReadFilesRequest,
};
pub use resolver::{FileIdIndex, Resolution, render_file_errors};
