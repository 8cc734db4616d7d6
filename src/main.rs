//! rsc-cache CLI entry point.

use clap::Parser;

use rsc_cache::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (config, _logger) = match rsc_cache::cli::bootstrap(&cli) {
        Ok(loaded) => loaded,
        Err(err) => rsc_cache::cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Observe(args) => commands::observe::execute(args, cli.json).await,
        Commands::Demo(args) => commands::demo::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        rsc_cache::cli::handle_error(err, cli.json);
    }
}
