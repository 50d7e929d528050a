//! `relay split`: preview how an answer is cut into messages.
//!
//! With `--text` the answer is split in one go. Without it, stdin is read
//! line by line and split as it streams in, the way a streaming bot's
//! chunks are.

use anyhow::Result;
use chatrelay_core::reply::splitter::{Fragment, SplitOptions, split_stream, split_text};
use chatrelay_types::config::AgentConfig;
use chatrelay_types::message::ReplyStatus;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use futures_util::{Stream, StreamExt, stream};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Split options from the agent defaults, overridden by the given flags.
pub fn options(min: Option<i64>, max: Option<usize>, chars: Option<Vec<String>>) -> SplitOptions {
    let defaults = AgentConfig::new("preview");
    SplitOptions::new(
        min.unwrap_or(defaults.buffer_words_min_count),
        max.unwrap_or(defaults.max_split_count),
        &chars.unwrap_or(defaults.split_characters),
    )
}

/// Split a stream of answer chunks.
pub async fn split_chunks<S>(chunks: S, options: SplitOptions) -> Vec<Fragment>
where
    S: Stream<Item = String> + Send + 'static,
{
    split_stream(chunks, options, ReplyStatus::Content)
        .collect::<Vec<_>>()
        .await
}

/// Lines of stdin, newline included, until EOF.
fn stdin_chunks() -> impl Stream<Item = String> + Send + 'static {
    let lines = BufReader::new(tokio::io::stdin()).lines();
    stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((format!("{line}\n"), lines)),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("stdin read failed: {err}");
                None
            }
        }
    })
}

pub async fn split(
    text: Option<String>,
    min: Option<i64>,
    max: Option<usize>,
    chars: Option<Vec<String>>,
    json: bool,
) -> Result<()> {
    let options = options(min, max, chars);
    let fragments = match text {
        Some(text) => split_text(&text, options, ReplyStatus::Content),
        None => split_chunks(stdin_chunks(), options).await,
    };

    if json {
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        println!("{}", serde_json::to_string_pretty(&texts)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Chars").fg(Color::White),
        Cell::new("Text").fg(Color::White),
    ]);
    for fragment in &fragments {
        table.add_row(vec![
            Cell::new(fragment.index).fg(Color::DarkGrey),
            Cell::new(fragment.text.chars().count()),
            Cell::new(&fragment.text),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} message{}",
        style(fragments.len()).bold(),
        if fragments.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_agent_defaults() {
        let defaults = options(None, None, None);
        assert_eq!(defaults.min_chars, 70);
        assert_eq!(defaults.max_count, 3);

        let custom = options(Some(-1), Some(5), Some(vec!["none".to_string()]));
        assert_eq!(custom.min_chars, -1);
        assert_eq!(custom.max_count, 5);
        assert!(custom.terminators.is_none());
    }

    #[tokio::test]
    async fn streamed_chunks_split_like_whole_text() {
        let text = "这是第一句。这是第二句。这是第三句。";
        let chunks = ["这是第", "一句。这是第二", "句。这是第三句。"].map(String::from);
        let preview = || options(Some(10), Some(2), Some(vec!["。".to_string()]));

        let streamed = split_chunks(stream::iter(chunks), preview()).await;
        let whole = split_text(text, preview(), ReplyStatus::Content);
        assert_eq!(streamed, whole);
        assert_eq!(streamed.len(), 2);
        assert_eq!(streamed.iter().map(|f| f.text.as_str()).collect::<String>(), text);
    }

    #[test]
    fn short_text_stays_whole() {
        let fragments = split_text("你好。", options(None, None, None), ReplyStatus::Content);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "你好。");
    }
}
