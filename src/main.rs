//! stale-reaper CLI entry point.

use clap::Parser;

use stale_reaper::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    // Commands install the tracing subscriber once configuration is loaded.
    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, config_path, cli.json).await,
        Commands::Check(args) => commands::check::execute(args, config_path, cli.json),
    };

    if let Err(err) = result {
        stale_reaper::cli::handle_error(err, cli.json);
    }
}
