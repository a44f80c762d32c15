//! callscope - CLI entry point

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigCommands};

/// Install the stderr subscriber; stdout is reserved for JSON output.
fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "callscope=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Analyze {
            files,
            output,
            workers,
            deadline_secs,
            backend,
        } => commands::analyze::handle(commands::analyze::AnalyzeArgs {
            config: config_path,
            files: &files,
            output: output.as_deref(),
            workers,
            deadline_secs,
            backend: backend.map(Into::into),
            quiet: cli.quiet,
        }),
        Commands::Chunk {
            file,
            max_tokens,
            overlap,
        } => commands::chunk::handle(config_path, &file, max_tokens, overlap),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::handle_show(config_path),
            ConfigCommands::Init { force } => commands::config::handle_init(config_path, force),
        },
        Commands::Completions { shell } => commands::completions::handle::<Cli>(shell),
    }
}
