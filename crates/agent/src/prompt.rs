//! Prompt templates and file metadata blocks.

use rustedflow_core::chat::ChatFile;
use rustedflow_core::text::replace_variable;
use rustedflow_files::file_id::{UNNAMED_FILE, extract_file_id};

/// Separator between the parts of the concatenated system prompt.
pub const SYSTEM_PROMPT_SEPARATOR: &str = "\n\n===---===---===\n\n";

/// Question prefix used when a turn carries files (traditional mode).
pub const MULTIPLE_FILE_PROMPT: &str =
    "Number of session file inputs：\nDocument：{{fileCount}}\nImage：{{imgCount}}\n------\n{{question}}";

/// Wraps read file content in the system prompt.
pub const DOCUMENT_QUOTE_PROMPT: &str = "Use the content within <FilesContent></FilesContent> as reference for this conversation:\n<FilesContent>\n{{quote}}\n</FilesContent>";

/// Count prompt followed by the question.
pub fn multiple_prompt(file_count: usize, img_count: usize, question: &str) -> String {
    let file_count = file_count.to_string();
    let img_count = img_count.to_string();
    replace_variable(MULTIPLE_FILE_PROMPT, &[
        ("fileCount", file_count.as_str()),
        ("imgCount", img_count.as_str()),
        ("question", question),
    ])
}

pub fn document_quote_prompt(quote: &str) -> String {
    replace_variable(DOCUMENT_QUOTE_PROMPT, &[("quote", quote)])
}

/// Compact metadata block placed before the text in inline mode.
///
/// One document renders on a single line; several documents render as a
/// numbered list. Images are only counted.
pub fn inline_file_metadata(documents: &[&ChatFile], images: &[&ChatFile]) -> String {
    let mut parts = Vec::new();

    match documents {
        [] => {}
        [file] => parts.push(format!(
            "[📎 File: {} (fileId: \"{}\")]",
            file.name,
            extract_file_id(&file.url)
        )),
        files => {
            parts.push(format!("[📎 {} Files attached:", files.len()));
            for (i, file) in files.iter().enumerate() {
                parts.push(format!(
                    "  {}. {} (fileId: \"{}\")",
                    i + 1,
                    file.name,
                    extract_file_id(&file.url)
                ));
            }
            parts.push("]".to_string());
        }
    }

    if !images.is_empty() {
        let plural = if images.len() > 1 { "s" } else { "" };
        parts.push(format!("[🖼️ {} image{plural} attached]", images.len()));
    }

    parts.join("\n")
}

/// File list appended after the question in traditional mode. Empty when
/// there are no documents.
pub fn traditional_file_list(documents: &[&ChatFile]) -> String {
    if documents.is_empty() {
        return String::new();
    }

    let lines: Vec<String> = documents
        .iter()
        .map(|file| {
            let name = if file.name.is_empty() {
                UNNAMED_FILE
            } else {
                file.name.as_str()
            };
            format!("- fileId: \"{}\", name: \"{name}\"", extract_file_id(&file.url))
        })
        .collect();

    format!(
        "\n\nAvailable files (use fileId to reference):\n{}",
        lines.join("\n")
    )
}
