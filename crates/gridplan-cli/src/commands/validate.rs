use anyhow::{Context, Result};
use gridplan_core::Topology;

use crate::commands::util::load_case;

pub fn handle(case_path: &str) -> Result<()> {
    let case = load_case(case_path)?;
    case.validate()
        .with_context(|| format!("validating case {case_path}"))?;

    let topology = Topology::new(&case);
    let substation_buses = (0..topology.num_buses())
        .filter(|&b| !topology.substations[b].is_empty())
        .count();

    println!("Case '{}' is valid", case.name);
    println!(
        "  {} buses ({} with substations), {} lines ({} candidates)",
        case.buses.len(),
        substation_buses,
        case.lines.len(),
        case.candidate_lines().count()
    );
    println!(
        "  {} substations ({} candidates), {} generators",
        case.substations.len(),
        case.candidate_substations().count(),
        case.generators.len()
    );
    println!(
        "  {} stages x {} years, {} scenarios",
        case.num_stages(),
        case.params.years_per_stage,
        case.num_scenarios()
    );
    Ok(())
}
