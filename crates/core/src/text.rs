//! Small string helpers shared by prompt templating and response filtering.
//!
//! All lengths are counted in `char`s, never bytes, so slicing never splits
//! a multi-byte character.

/// Keep the first `start` and last `end` chars of `text`, replacing the middle
/// with a `...[hide N chars]...` marker. Text that fits is returned unchanged.
pub fn slice_str_start_end(text: &str, start: usize, end: usize) -> String {
    let total = text.chars().count();
    if total <= start + end {
        return text.to_string();
    }

    let head: String = text.chars().take(start).collect();
    let tail: String = text.chars().skip(total - end).collect();
    let hidden = total - start - end;

    format!("{head}\n\n...[hide {hidden} chars]...\n\n{tail}")
}

/// Replace every `{{key}}` placeholder in `template` with its value.
/// Unknown placeholders are left as they are.
pub fn replace_variable(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

/// First `limit` chars, with `......` appended when something was cut.
pub fn truncate_with_ellipsis(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    format!("{head}......")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(slice_str_start_end("hello", 3, 3), "hello");
        assert_eq!(slice_str_start_end("", 0, 0), "");
    }

    #[test]
    fn long_text_keeps_head_and_tail() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let sliced = slice_str_start_end(text, 3, 2);
        assert!(sliced.starts_with("abc"));
        assert!(sliced.ends_with("yz"));
        assert!(sliced.contains("[hide 21 chars]"));
    }

    #[test]
    fn slicing_counts_chars_not_bytes() {
        let text = "日本語のテキストです";
        let sliced = slice_str_start_end(text, 2, 2);
        assert!(sliced.starts_with("日本"));
        assert!(sliced.ends_with("です"));
        assert!(sliced.contains("[hide 6 chars]"));
    }

    #[test]
    fn replace_variable_fills_placeholders() {
        let out = replace_variable("Docs: {{fileCount}}, images: {{imgCount}}", &[
            ("fileCount", "2"),
            ("imgCount", "0"),
        ]);
        assert_eq!(out, "Docs: 2, images: 0");
    }

    #[test]
    fn replace_variable_leaves_unknown_keys() {
        assert_eq!(replace_variable("{{missing}}", &[("other", "x")]), "{{missing}}");
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate_with_ellipsis("abc", 5), "abc");
        assert_eq!(truncate_with_ellipsis("abcdef", 3), "abc......");
    }
}
