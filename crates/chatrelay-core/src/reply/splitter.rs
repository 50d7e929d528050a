//! Response splitter: cuts bot output into bounded fragments.
//!
//! The splitter buffers text and emits a fragment whenever the buffer grows
//! past the configured threshold, preferring to cut after the last sentence
//! terminator inside the threshold window. Rules:
//!
//! - thresholds and cut positions are measured in characters
//! - in boundary mode the threshold only applies once the buffer holds CJK
//!   text; other text is emitted as one fragment on completion
//! - with the `"none"` sentinel, cuts are purely length based for all text
//! - a negative threshold disables incremental emission entirely
//! - at most `max_count` fragments are produced; the last one carries every
//!   remaining character
//!
//! Fragments are never trimmed, so concatenating them reproduces the input.

use std::pin::Pin;

use chatrelay_types::config::{AgentConfig, SPLIT_NONE};
use chatrelay_types::message::ReplyStatus;
use futures_util::{Stream, StreamExt};

/// One outbound piece of an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Zero-based position within its answer.
    pub index: usize,
    pub text: String,
    pub status: ReplyStatus,
}

/// Splitting parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    /// Characters to buffer before cutting; negative disables cutting.
    pub min_chars: i64,
    /// Maximum fragments per answer.
    pub max_count: usize,
    /// Sentence terminators, or `None` for length-only splitting.
    pub terminators: Option<Vec<String>>,
}

impl SplitOptions {
    /// Build options from raw settings; `["none"]` selects length-only mode.
    pub fn new(min_chars: i64, max_count: usize, split_characters: &[String]) -> Self {
        let length_only = split_characters.len() == 1 && split_characters[0] == SPLIT_NONE;
        let terminators = if length_only {
            None
        } else {
            Some(
                split_characters
                    .iter()
                    .filter(|s| !s.is_empty())
                    .cloned()
                    .collect(),
            )
        };
        Self {
            min_chars,
            max_count,
            terminators,
        }
    }

    /// Options for the answer content of an agent.
    pub fn for_content(config: &AgentConfig) -> Self {
        Self::new(
            config.buffer_words_min_count,
            config.max_split_count,
            &config.split_characters,
        )
    }

    /// Options for the reasoning trace of an agent.
    pub fn for_reasoning(config: &AgentConfig) -> Self {
        Self::new(
            config.buffer_words_min_count,
            config.max_reasoning_split_count,
            &config.split_characters,
        )
    }
}

/// Incremental splitter for one logical answer.
///
/// Feed chunks with [`push`](Self::push), then call [`finish`](Self::finish)
/// exactly once to flush the trailing fragment.
#[derive(Debug)]
pub struct ResponseSplitter {
    options: SplitOptions,
    status: ReplyStatus,
    buffer: String,
    emitted: usize,
}

impl ResponseSplitter {
    pub fn new(options: SplitOptions, status: ReplyStatus) -> Self {
        Self {
            options,
            status,
            buffer: String::new(),
            emitted: 0,
        }
    }

    /// Append a chunk and return the fragments that became ready.
    pub fn push(&mut self, chunk: &str) -> Vec<Fragment> {
        self.buffer.push_str(chunk);

        let mut ready = Vec::new();
        if self.options.min_chars < 0 {
            return ready;
        }
        let threshold = self.options.min_chars.max(1) as usize;
        let max_count = self.options.max_count.max(1);

        while self.emitted + 1 < max_count {
            if self.options.terminators.is_some() && !contains_cjk(&self.buffer) {
                break;
            }
            let Some(limit) = byte_offset_of_char(&self.buffer, threshold) else {
                break;
            };
            if limit == self.buffer.len() {
                // exactly `threshold` characters: not over the threshold yet
                break;
            }
            let cut = self.cut_point(limit);
            let text: String = self.buffer.drain(..cut).collect();
            ready.push(self.fragment(text));
        }
        ready
    }

    /// Flush the remaining buffer as the trailing fragment.
    pub fn finish(&mut self) -> Option<Fragment> {
        if self.buffer.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.buffer);
        Some(self.fragment(text))
    }

    /// Fragments emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn cut_point(&self, limit: usize) -> usize {
        let window = &self.buffer[..limit];
        let boundary = self.options.terminators.as_ref().and_then(|terms| {
            terms
                .iter()
                .filter_map(|term| window.rfind(term.as_str()).map(|i| i + term.len()))
                .max()
        });
        match boundary {
            Some(end) if end > 0 => end,
            _ => limit,
        }
    }

    fn fragment(&mut self, text: String) -> Fragment {
        let fragment = Fragment {
            index: self.emitted,
            text,
            status: self.status,
        };
        self.emitted += 1;
        fragment
    }
}

/// Byte offset of the `n`-th character, `Some(len)` when the string has
/// exactly `n` characters and `None` when it is shorter.
fn byte_offset_of_char(s: &str, n: usize) -> Option<usize> {
    match s.char_indices().nth(n) {
        Some((i, _)) => Some(i),
        None if s.chars().count() == n => Some(s.len()),
        None => None,
    }
}

/// Whether `text` contains Chinese, Japanese or Korean characters.
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{3040}'..='\u{30ff}'
            | '\u{3400}'..='\u{4dbf}'
            | '\u{4e00}'..='\u{9fff}'
            | '\u{ac00}'..='\u{d7af}'
            | '\u{f900}'..='\u{faff}')
    })
}

/// Split a complete text in one go.
pub fn split_text(text: &str, options: SplitOptions, status: ReplyStatus) -> Vec<Fragment> {
    let mut splitter = ResponseSplitter::new(options, status);
    let mut fragments = splitter.push(text);
    fragments.extend(splitter.finish());
    fragments
}

/// Lazily split a stream of chunks.
///
/// The returned stream is finite and ends after the trailing fragment.
pub fn split_stream<S>(
    chunks: S,
    options: SplitOptions,
    status: ReplyStatus,
) -> Pin<Box<dyn Stream<Item = Fragment> + Send + 'static>>
where
    S: Stream<Item = String> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut splitter = ResponseSplitter::new(options, status);
        let mut chunks = Box::pin(chunks);
        while let Some(chunk) = chunks.next().await {
            for fragment in splitter.push(&chunk) {
                yield fragment;
            }
        }
        if let Some(fragment) = splitter.finish() {
            yield fragment;
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
