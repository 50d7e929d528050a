//! CLI command definitions for the `relay` binary.

pub mod check;
pub mod match_rule;
pub mod run;
pub mod split;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Relay chat platforms to conversational backends.
#[derive(Parser)]
#[command(name = "relay", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Config file (default: $CHATRELAY_HOME/config.toml).
    #[arg(long, global = true, env = "CHATRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every configured agent until Ctrl+C.
    Run,

    /// Validate the config and summarize its agents.
    Check,

    /// Show which rule would answer a message.
    Match {
        /// JSON file holding an array of message rules.
        #[arg(long)]
        rules: PathBuf,

        /// JSON file holding one chat message.
        #[arg(long)]
        message: PathBuf,

        /// The relay's own user id on the source, for mention checks.
        #[arg(long)]
        me: Option<String>,
    },

    /// Preview how an answer is split into messages.
    Split {
        /// Answer text to split. Read from stdin as a stream when omitted.
        #[arg(long)]
        text: Option<String>,

        /// Characters to buffer before cutting (negative disables cutting).
        #[arg(long, allow_hyphen_values = true)]
        min: Option<i64>,

        /// Maximum number of fragments.
        #[arg(long)]
        max: Option<usize>,

        /// Sentence terminators, or "none" for length-only splitting.
        #[arg(long, num_args = 1..)]
        chars: Option<Vec<String>>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
