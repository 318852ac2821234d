//! The read-files node: turn a list of URLs or file ids into file text.

use crate::dispatch::RunningUser;
use chrono::{DateTime, Utc};
use rustedflow_config::{DispatchConfig, FileSelectConfig};
use rustedflow_core::chat::{ChatItem, ChatValue, RuntimePrompt, history_file_links};
use rustedflow_files::{FileIdIndex, FileReader, ReadFilesRequest, render_file_errors};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Node version from which history attachments are read as well.
pub const HISTORY_FILES_VERSION: &str = "489";

/// Input of the read-files node.
#[derive(Debug, Clone, Default)]
pub struct ReadFilesNodeRequest {
    /// URLs or file ids to read
    pub file_url_list: Vec<String>,

    /// Value items of the current turn
    pub query: Vec<ChatValue>,

    pub histories: Vec<ChatItem>,
    pub version: Option<String>,
    pub chat_config: Option<FileSelectConfig>,
    pub request_origin: Option<String>,
    pub running_user: RunningUser,
    pub usage_id: Option<String>,
}

/// A file the node read, for the run detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFileItem {
    pub name: String,
    pub url: String,
}

/// Output of the read-files node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadFilesOutput {
    /// Framed file contents followed by the file error block
    pub text: String,

    pub read_files: Vec<ReadFileItem>,

    /// Short previews joined by the file block separator
    pub read_files_result: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_errors: Vec<String>,
}

/// Run the read-files node at the current time.
pub async fn dispatch_read_files(
    reader: &FileReader,
    config: &DispatchConfig,
    request: &ReadFilesNodeRequest,
) -> ReadFilesOutput {
    dispatch_read_files_at(reader, config, request, Utc::now()).await
}

/// Run the read-files node with an explicit clock.
///
/// File ids are resolved against the current turn's files and the human
/// turns of the history. Unresolvable ids are reported in the output text;
/// they never fail the node.
pub async fn dispatch_read_files_at(
    reader: &FileReader,
    config: &DispatchConfig,
    request: &ReadFilesNodeRequest,
    now: DateTime<Utc>,
) -> ReadFilesOutput {
    let settings = config.file_settings(request.chat_config.as_ref());
    let current_files = RuntimePrompt::from_values(&request.query).files;

    let index = FileIdIndex::build(&current_files, &request.histories);
    let resolution = index.resolve(&request.file_url_list, now);
    debug!(
        indexed = index.len(),
        resolved = resolution.urls.len(),
        errors = resolution.errors.len(),
        "Resolved read-files list"
    );

    let mut urls = resolution.urls;
    if request.version.as_deref() == Some(HISTORY_FILES_VERSION) {
        urls.extend(history_file_links(&request.histories));
    }

    let contents = reader
        .read(&ReadFilesRequest {
            urls,
            request_origin: request.request_origin.clone(),
            max_files: settings.max_files,
            custom_pdf_parse: settings.custom_pdf_parse,
            team_id: request.running_user.team_id.clone(),
            tmb_id: request.running_user.tmb_id.clone(),
            usage_id: request.usage_id.clone(),
        })
        .await;

    let mut file_errors: Vec<String> = resolution.errors.iter().map(ToString::to_string).collect();
    file_errors.extend(contents.errors().map(ToString::to_string));
    if !file_errors.is_empty() {
        warn!(errors = file_errors.len(), "Read-files node could not read every file");
    }

    ReadFilesOutput {
        text: format!("{}{}", contents.text, render_file_errors(&resolution.errors)),
        read_files: contents
            .results
            .iter()
            .map(|r| ReadFileItem {
                name: r.filename.clone(),
                url: r.url.clone(),
            })
            .collect(),
        read_files_result: contents.preview(),
        file_errors,
    }
}
