use clap::Parser;
use gridplan_cli::{Cli, Commands};
use std::io;
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

fn init_logging(level: tracing::Level) {
    // Logs go to stderr so stdout stays parseable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let result = match &cli.command {
        Commands::Plan {
            case,
            config,
            out,
            threads,
            max_iterations,
            sequential,
        } => commands::plan::handle(
            case,
            config.as_deref(),
            out.as_deref(),
            threads,
            *max_iterations,
            *sequential,
        ),
        Commands::Validate { case } => commands::validate::handle(case),
        Commands::Bnb {
            program,
            max_nodes,
            trace,
        } => commands::bnb::handle(program, *max_nodes, *trace),
    };

    if let Err(e) = result {
        error!("command failed: {:?}", e);
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
