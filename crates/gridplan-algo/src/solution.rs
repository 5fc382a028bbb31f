//! Decomposition output
//!
//! Defines what a planning run reports: the investment plan, per-iteration
//! bounds, per (stage, scenario) outcomes and collected failures.

use crate::branch_bound::SearchStatus;
use crate::formulate::{AssetKind, AssetRef, InvestmentPlan};
use crate::relax::BendersCut;
use gridplan_core::PlanningCase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why the outer loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecompositionStatus {
    /// An iteration added no violated cut
    Converged,
    /// `max_iterations` passes ran and the last one still added cuts
    IterationLimit,
    /// A pass added no cut but some (stage, scenario) failed, so the plan
    /// was never checked against every operating point
    Incomplete,
}

impl fmt::Display for DecompositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecompositionStatus::Converged => write!(f, "converged"),
            DecompositionStatus::IterationLimit => write!(f, "iteration limit"),
            DecompositionStatus::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// A candidate first put in service at some stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildDecision {
    pub asset: AssetRef,
    pub name: String,
    pub stage: usize,
    /// Undiscounted investment cost
    pub investment_cost: f64,
}

/// Result of the pipeline for one (stage, scenario)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubproblemOutcome {
    pub stage: usize,
    pub scenario: usize,
    /// Optimal operating cost of the scenario under the plan
    pub operational_objective: f64,
    /// Binary assignment of the operational incumbent
    pub assignment: Vec<f64>,
    pub operational_nodes: usize,
    pub relaxation_objective: Option<f64>,
    pub relaxation_status: SearchStatus,
    pub relaxation_nodes: usize,
    pub cut: Option<BendersCut>,
}

/// A (stage, scenario) whose pipeline failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFailure {
    pub iteration: usize,
    pub stage: usize,
    pub scenario: usize,
    pub error: String,
}

/// Bounds reported after each pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub iteration: usize,
    /// Master objective; absent when the master search stopped at a limit
    pub lower_bound: Option<f64>,
    /// Investment plus discounted operating cost of the evaluated plan;
    /// absent when a (stage, scenario) failed
    pub upper_bound: Option<f64>,
    pub cuts_added: usize,
    pub failures: usize,
}

impl IterationSummary {
    /// Relative gap between the bounds
    pub fn gap(&self) -> Option<f64> {
        let (lb, ub) = (self.lower_bound?, self.upper_bound?);
        Some((ub - lb) / ub.abs().max(1.0))
    }
}

/// Complete result of a planning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningSolution {
    pub case_name: String,
    pub status: DecompositionStatus,
    pub plan: InvestmentPlan,
    pub builds: Vec<BuildDecision>,
    /// Discounted investment cost of the plan
    pub investment_cost: f64,
    /// Discounted operating cost over all (stage, scenario) pairs, if all
    /// were evaluated
    pub operating_cost: Option<f64>,
    pub iterations: Vec<IterationSummary>,
    /// Outcomes of the final pass, stage-major
    pub outcomes: Vec<SubproblemOutcome>,
    pub failures: Vec<ScenarioFailure>,
    /// Cuts accumulated in the master
    pub cuts: Vec<BendersCut>,
    pub solve_time: Duration,
}

impl PlanningSolution {
    /// List candidates by the stage they are first built in
    pub fn build_decisions(case: &PlanningCase, plan: &InvestmentPlan) -> Vec<BuildDecision> {
        let mut builds = Vec::new();
        for stage in 0..plan.num_stages() {
            for asset in plan.new_assets(stage) {
                let (name, investment_cost) = match asset.kind {
                    AssetKind::Line => case
                        .lines
                        .get(asset.index)
                        .map(|l| (l.name.clone(), l.investment_cost)),
                    AssetKind::Substation => case
                        .substations
                        .get(asset.index)
                        .map(|s| (s.name.clone(), s.investment_cost)),
                    AssetKind::Generator => case
                        .generators
                        .get(asset.index)
                        .map(|g| (g.name.clone(), g.investment_cost)),
                }
                .unwrap_or_else(|| (asset.to_string(), 0.0));
                builds.push(BuildDecision {
                    asset,
                    name,
                    stage,
                    investment_cost,
                });
            }
        }
        builds
    }

    pub fn total_cost(&self) -> Option<f64> {
        self.operating_cost.map(|op| op + self.investment_cost)
    }

    pub fn lower_bound(&self) -> Option<f64> {
        self.iterations.last().and_then(|it| it.lower_bound)
    }

    pub fn is_converged(&self) -> bool {
        self.status == DecompositionStatus::Converged
    }

    /// Format a human-readable summary
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Planning Summary: {}\n{}\n", self.case_name, "=".repeat(40)));
        s.push_str(&format!(
            "Status: {} after {} iteration(s)\n",
            self.status,
            self.iterations.len()
        ));
        s.push_str(&format!("Investment: ${:.2}\n", self.investment_cost));
        match self.operating_cost {
            Some(op) => s.push_str(&format!("Operating: ${:.2}\n", op)),
            None => s.push_str("Operating: n/a\n"),
        }
        if let Some(lb) = self.lower_bound() {
            s.push_str(&format!("Lower Bound: ${:.2}\n", lb));
        }
        if let Some(gap) = self.iterations.last().and_then(|it| it.gap()) {
            s.push_str(&format!("Gap: {:.4}%\n", gap * 100.0));
        }
        s.push_str(&format!("Cuts: {}\n", self.cuts.len()));
        s.push_str(&format!("Solve Time: {:.2?}\n", self.solve_time));

        if self.builds.is_empty() {
            s.push_str("\nNo investments\n");
        } else {
            s.push_str("\nBuild Decisions:\n");
            for build in &self.builds {
                s.push_str(&format!(
                    "  [stage {}] {} ({}) - ${:.2}\n",
                    build.stage, build.name, build.asset, build.investment_cost
                ));
            }
        }

        if !self.failures.is_empty() {
            s.push_str("\nFailures:\n");
            for failure in &self.failures {
                s.push_str(&format!(
                    "  iteration {} stage {} scenario {}: {}\n",
                    failure.iteration, failure.stage, failure.scenario, failure.error
                ));
            }
        }

        s
    }
}
