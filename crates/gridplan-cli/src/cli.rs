use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gridplan",
    author,
    version,
    about = "Multistage distribution network planning with logic-based Benders decomposition"
)]
pub struct Cli {
    /// Set the logging level (RUST_LOG takes precedence when set)
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan line, substation and generator investments for a case
    Plan {
        /// Planning case (JSON)
        #[arg(long)]
        case: String,
        /// Decomposition settings (TOML); defaults apply to missing keys
        #[arg(long)]
        config: Option<String>,
        /// Write the full solution as JSON to this path
        #[arg(short, long)]
        out: Option<String>,
        /// Threads for scenario evaluation ("auto" = all cores)
        #[arg(long, default_value = "auto")]
        threads: String,
        /// Override the iteration limit from the config file
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Evaluate (stage, scenario) pairs one at a time
        #[arg(long)]
        sequential: bool,
    },
    /// Check a planning case for dangling references and missing data
    Validate {
        /// Planning case (JSON)
        #[arg(long)]
        case: String,
    },
    /// Solve a 0/1 program with the branch-and-bound engine
    Bnb {
        /// Program in canonical form (JSON)
        #[arg(long)]
        program: String,
        /// Stop after this many nodes
        #[arg(long)]
        max_nodes: Option<usize>,
        /// Print one line per explored node
        #[arg(long)]
        trace: bool,
    },
}
