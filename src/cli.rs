//! CLI definitions for callscope
//!
//! This module contains the clap CLI structure definitions, separated from
//! main.rs so the command handlers and tests can share them.

use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;

use callscope::config::BackendKind;

/// Build clap styles using our theme colors.
///
/// - Green: headers, usage, command names (accent color)
/// - White: descriptions, placeholders (renders as light gray on dark terminals)
pub fn build_cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::White.on_default()) // Light gray for descriptions
        .valid(AnsiColor::White.on_default()) // Light gray for valid values
        .invalid(AnsiColor::Red.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
}

#[derive(Parser)]
#[command(name = "callscope")]
#[command(about = "[ callscope ] - LLM analysis of sales call transcripts")]
#[command(
    long_about = "callscope - Analyze the call transcripts of a customer engagement with an LLM.

Each transcript is classified, split into overlapping chunks that fit the
model's context window, and summarized with action items and sentiment.
The calls are then combined into one engagement report with a win
probability, risks and next steps.

QUICK START:
    callscope config init                  Write the default config
    callscope analyze calls/*.txt          Analyze an engagement
    callscope chunk calls/discovery.txt    Preview chunk boundaries

The API key is read from $ANTHROPIC_API_KEY unless configured otherwise."
)]
#[command(version)]
#[command(styles = build_cli_styles())]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, help = "Config file (default: ~/.config/callscope/config.toml)")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(long, short, global = true, help = "Only log warnings and errors")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Backend selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// Anthropic Messages API
    Api,
    /// Local claude CLI
    Cli,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Api => BackendKind::Api,
            BackendArg::Cli => BackendKind::Cli,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze the transcripts of one engagement
    #[command(long_about = "Analyze the call transcripts of one engagement.

Every FILE is one call; the file stem is used as the call id. Only .txt
and .md files are accepted. The result (per-call analyses, failed calls,
the engagement report and token usage) is written as JSON to stdout or
to --output.

Transcripts are analyzed in parallel. Press Ctrl-C to stop retrying; work
already done is still reported.

EXAMPLES:
    callscope analyze discovery.txt demo.txt pov.txt
    callscope analyze calls/*.txt --output report.json
    callscope analyze calls/*.txt --backend cli --workers 2
    callscope analyze calls/*.txt --deadline-secs 600")]
    Analyze {
        /// Transcript files
        #[arg(required = true, help = "Transcript files (.txt or .md)")]
        files: Vec<PathBuf>,
        /// Write JSON to this file instead of stdout
        #[arg(long, short, help = "Write the JSON result to this file")]
        output: Option<PathBuf>,
        /// Number of transcripts analyzed in parallel
        #[arg(long, short, help = "Parallel workers (default: auto)")]
        workers: Option<usize>,
        /// Stop retrying after this many seconds
        #[arg(long, help = "Stop retrying after N seconds")]
        deadline_secs: Option<u64>,
        /// Override the configured backend
        #[arg(long, value_enum, help = "Model backend (overrides config)")]
        backend: Option<BackendArg>,
    },

    /// Show how a transcript would be chunked
    #[command(long_about = "Split a transcript the way 'analyze' would and print each chunk's
byte offsets, overlap and token estimate. No model is called.

EXAMPLES:
    callscope chunk discovery.txt
    callscope chunk discovery.txt --max-tokens 2000 --overlap 200")]
    Chunk {
        /// Transcript file
        #[arg(help = "Transcript file")]
        file: PathBuf,
        /// Token budget per chunk
        #[arg(long, help = "Token budget per chunk (overrides config)")]
        max_tokens: Option<usize>,
        /// Overlap between chunks in characters
        #[arg(long, help = "Overlap in characters (overrides config)")]
        overlap: Option<usize>,
    },

    /// Configuration management
    #[command(
        subcommand,
        long_about = "View and create the callscope configuration file.

Configuration is stored in ~/.config/callscope/config.toml and holds
the analysis tuning ([analysis]) and the model endpoint ([backend]).

EXAMPLES:
    callscope config show          Display the effective configuration
    callscope config init          Write the defaults to the config file"
    )]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration as TOML
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, help = "Overwrite an existing config file")]
        force: bool,
    },
}
