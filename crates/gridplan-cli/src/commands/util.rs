use anyhow::{Context, Result};
use gridplan_algo::DecompositionConfig;
use gridplan_core::PlanningCase;
use rayon::ThreadPoolBuilder;
use std::fs;

/// Size the global rayon pool from "auto" or a thread count
pub fn configure_threads(threads: &str) {
    let count = if threads.eq_ignore_ascii_case("auto") {
        num_cpus::get()
    } else {
        threads.parse().unwrap_or_else(|_| num_cpus::get())
    };
    let _ = ThreadPoolBuilder::new().num_threads(count).build_global();
}

pub fn load_case(path: &str) -> Result<PlanningCase> {
    let text = fs::read_to_string(path).with_context(|| format!("reading case file: {path}"))?;
    PlanningCase::from_json_str(&text).with_context(|| format!("parsing case file: {path}"))
}

/// Read a TOML decomposition config; keys left out keep their defaults
pub fn load_config(path: Option<&str>) -> Result<DecompositionConfig> {
    let Some(path) = path else {
        return Ok(DecompositionConfig::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("reading config file: {path}"))?;
    toml::from_str(&text).with_context(|| format!("parsing config file: {path}"))
}
