//! Markdown image extraction for text fragments.

use std::sync::LazyLock;

use regex::Regex;

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]]*\]\(\s*([^)\s]+)(?:\s+"[^"]*")?\s*\)"#)
        .expect("markdown image pattern is valid")
});

/// Result of [`extract_markdown_images`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownImages {
    /// Text with image markup removed.
    pub stripped: String,
    /// Image URLs in order of appearance.
    pub urls: Vec<String>,
}

/// Find `![alt](url)` images in `text`.
pub fn extract_markdown_images(text: &str) -> MarkdownImages {
    let urls = MARKDOWN_IMAGE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect();
    let stripped = MARKDOWN_IMAGE.replace_all(text, "").into_owned();
    MarkdownImages { stripped, urls }
}
