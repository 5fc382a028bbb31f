//! `gridplan bnb`: run the 0/1 branch-and-bound on a program file

use anyhow::{Context, Result};
use gridplan_algo::{branch_and_bound, BranchBoundConfig, ClarabelOracle, LinearProgram};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;

/// Program input format (JSON): `min c·x + d, A·x ≥ b, lb ≤ x ≤ ub`
#[derive(Debug, Deserialize)]
struct ProgramFile {
    cost: Vec<f64>,
    #[serde(default)]
    offset: f64,
    #[serde(default)]
    matrix: Vec<Vec<f64>>,
    #[serde(default)]
    rhs: Vec<f64>,
    lower: Option<Vec<f64>>,
    upper: Option<Vec<f64>>,
}

pub fn handle(program_path: &str, max_nodes: Option<usize>, show_trace: bool) -> Result<()> {
    let input: ProgramFile = {
        let file = File::open(program_path)
            .with_context(|| format!("opening program file: {program_path}"))?;
        serde_json::from_reader(BufReader::new(file)).context("parsing program JSON")?
    };

    let n = input.cost.len();
    let program = LinearProgram::from_dense(
        input.cost,
        input.offset,
        &input.matrix,
        input.rhs,
        input.lower.unwrap_or_else(|| vec![0.0; n]),
        input.upper.unwrap_or_else(|| vec![1.0; n]),
    )
    .context("building program")?;

    let config = BranchBoundConfig {
        max_nodes,
        ..Default::default()
    };
    let result = branch_and_bound(&ClarabelOracle::new(), &program, config)
        .context("running branch-and-bound")?;

    println!("Status: {}", result.status);
    println!("Nodes: {}", result.nodes_explored);
    match &result.incumbent {
        Some(incumbent) => {
            println!("Objective: {}", incumbent.objective);
            println!("Solution: {:?}", incumbent.solution);
        }
        None => println!("Objective: n/a"),
    }

    if show_trace {
        println!("\nnode\tdepth\tfeasible\trelaxed\tincumbent\toutcome");
        for (i, node) in result.trace.iter().enumerate() {
            println!(
                "{}\t{}\t{}\t{:.6}\t{:.6}\t{:?}",
                i,
                node.depth,
                node.feasible,
                node.relaxed_objective,
                node.incumbent_objective,
                node.outcome
            );
        }
    }

    Ok(())
}
