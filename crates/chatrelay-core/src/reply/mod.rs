//! Turning bot output into outbound fragments.

pub mod images;
pub mod splitter;

pub use images::{MarkdownImages, extract_markdown_images};
pub use splitter::{Fragment, ResponseSplitter, SplitOptions, split_stream, split_text};
