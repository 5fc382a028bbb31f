//! `gridplan plan`: run the decomposition on a case file

use anyhow::{Context, Result};
use gridplan_algo::Decomposition;
use std::fs::File;
use std::io::BufWriter;
use tracing::info;

use crate::commands::util::{configure_threads, load_case, load_config};

pub fn handle(
    case_path: &str,
    config_path: Option<&str>,
    out_path: Option<&str>,
    threads: &str,
    max_iterations: Option<usize>,
    sequential: bool,
) -> Result<()> {
    configure_threads(threads);

    let case = load_case(case_path)?;
    let mut config = load_config(config_path)?;
    if let Some(limit) = max_iterations {
        config.max_iterations = limit;
    }
    if sequential {
        config.parallel = false;
    }

    info!(
        case = %case.name,
        buses = case.buses.len(),
        lines = case.lines.len(),
        stages = case.num_stages(),
        scenarios = case.num_scenarios(),
        "case loaded"
    );

    let driver = Decomposition::with_clarabel(config);
    let solution = driver
        .run(&case)
        .with_context(|| format!("planning case {case_path}"))?;

    print!("{}", solution.summary());

    if let Some(path) = out_path {
        let file = File::create(path).with_context(|| format!("creating output file: {path}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &solution)
            .context("writing solution JSON")?;
        println!("\nSolution written to {path}");
    }

    Ok(())
}
