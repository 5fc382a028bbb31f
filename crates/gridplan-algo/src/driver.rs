//! Decomposition driver
//!
//! Each pass solves the master, then runs the five-step pipeline for every
//! (stage, scenario) in stage-major order:
//!
//! 1. formulate and solve the operational MILP under the master's plan
//! 2. fix its binaries and re-solve for the dual bundle
//! 3. build the 0/1 relaxation
//! 4. solve the relaxation with branch-and-bound
//! 5. derive a Benders cut
//!
//! Cuts violated by the current master point are added and the master is
//! re-solved. The loop stops when a pass adds no cut or after
//! `max_iterations` passes; one pass evaluates the first plan without any
//! feedback. A failing (stage, scenario) is recorded and skipped, and a pass
//! with failures never counts as converged. A relaxation search stopped at
//! its limit fails its point, since its objective does not bound the
//! operating cost from below.

use crate::branch_bound::{BranchAndBound, BranchBoundConfig, SearchStatus};
use crate::error::{PlanError, PlanResult};
use crate::formulate::{InvestmentPlan, MasterModel, OperationalModel};
use crate::oracle::{ClarabelOracle, LpOracle, OracleSettings};
use crate::relax::{build_relaxation, synthesize_cut, DualBundle};
use crate::solution::{
    DecompositionStatus, IterationSummary, PlanningSolution, ScenarioFailure, SubproblemOutcome,
};
use gridplan_core::{PlanningCase, Topology};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use web_time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Outer-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    /// Master/subproblem passes; 1 evaluates the first plan only
    pub max_iterations: usize,
    /// A cut is added when the master point violates it by more than
    /// `cut_tolerance · max(1, |rhs|)`
    pub cut_tolerance: f64,
    /// Evaluate (stage, scenario) pairs on the rayon pool
    pub parallel: bool,
    pub branch_bound: BranchBoundConfig,
    pub oracle: OracleSettings,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            cut_tolerance: 1e-4,
            parallel: true,
            branch_bound: BranchBoundConfig::default(),
            oracle: OracleSettings::default(),
        }
    }
}

impl DecompositionConfig {
    pub fn validate(&self) -> PlanResult<()> {
        if self.max_iterations == 0 {
            return Err(PlanError::Config("max_iterations must be at least 1".into()));
        }
        if !self.cut_tolerance.is_finite() || self.cut_tolerance < 0.0 {
            return Err(PlanError::Config(format!(
                "cut_tolerance must be a non-negative number, got {}",
                self.cut_tolerance
            )));
        }
        let snap = self.oracle.snap_tolerance;
        if !(0.0..0.5).contains(&snap) {
            return Err(PlanError::Config(format!(
                "snap_tolerance must lie in [0, 0.5), got {snap}"
            )));
        }
        if let Some(secs) = self.branch_bound.time_limit_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(PlanError::Config(format!(
                    "time_limit_secs must be positive, got {secs}"
                )));
            }
        }
        Ok(())
    }
}

/// Logic-based Benders decomposition over an LP oracle.
pub struct Decomposition<O: LpOracle> {
    oracle: O,
    config: DecompositionConfig,
}

impl Decomposition<ClarabelOracle> {
    /// Driver backed by Clarabel with the oracle settings of `config`
    pub fn with_clarabel(config: DecompositionConfig) -> Self {
        let oracle = ClarabelOracle::with_settings(config.oracle.clone());
        Self::new(oracle, config)
    }
}

impl<O: LpOracle> Decomposition<O> {
    pub fn new(oracle: O, config: DecompositionConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &DecompositionConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Plan `case`.
    ///
    /// Errors only when the case or configuration is invalid or the master
    /// cannot be solved; per (stage, scenario) errors land in
    /// [`PlanningSolution::failures`].
    pub fn run(&self, case: &PlanningCase) -> PlanResult<PlanningSolution> {
        self.config.validate()?;
        case.validate()?;

        let started = Instant::now();
        let topology = Topology::new(case);
        let mut master = MasterModel::formulate(case, &topology)?;
        let search = BranchAndBound::new(&self.oracle, self.config.branch_bound.clone());

        let points: Vec<(usize, usize)> = (0..case.num_stages())
            .flat_map(|t| (0..case.num_scenarios()).map(move |s| (t, s)))
            .collect();

        info!(
            case = %case.name,
            oracle = self.oracle.name(),
            stages = case.num_stages(),
            scenarios = case.num_scenarios(),
            max_iterations = self.config.max_iterations,
            "starting decomposition"
        );

        let mut status = DecompositionStatus::IterationLimit;
        let mut iterations = Vec::new();
        let mut failures = Vec::new();
        let mut final_pass = None;

        for iteration in 0..self.config.max_iterations {
            let master_solution = master.solve(&search)?;
            let results = self.evaluate_all(case, &topology, &master_solution.plan, &points);

            let mut outcomes = Vec::with_capacity(points.len());
            let mut failed = 0;
            for (&(stage, scenario), result) in points.iter().zip(results) {
                match result {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(error) => {
                        warn!(iteration, stage, scenario, %error, "subproblem failed");
                        failures.push(ScenarioFailure {
                            iteration,
                            stage,
                            scenario,
                            error: error.to_string(),
                        });
                        failed += 1;
                    }
                }
            }

            let mut cuts_added = 0;
            for outcome in &outcomes {
                let Some(cut) = &outcome.cut else {
                    continue;
                };
                let theta = master_solution.theta[cut.stage][cut.scenario];
                let violation = cut.violation(theta, &master_solution.plan);
                if violation > self.config.cut_tolerance * cut.rhs.abs().max(1.0) {
                    debug!(stage = cut.stage, scenario = cut.scenario, violation, "adding cut");
                    master.add_cut(cut.clone())?;
                    cuts_added += 1;
                }
            }

            let operating = (failed == 0).then(|| {
                outcomes
                    .iter()
                    .map(|o| master.present_worth(o.stage) * o.operational_objective)
                    .sum::<f64>()
            });
            let summary = IterationSummary {
                iteration,
                lower_bound: master_solution.lower_bound(),
                upper_bound: operating.map(|op| op + master_solution.investment_cost),
                cuts_added,
                failures: failed,
            };
            info!(
                iteration,
                lower_bound = ?summary.lower_bound,
                upper_bound = ?summary.upper_bound,
                cuts_added,
                failures = failed,
                "decomposition pass finished"
            );
            iterations.push(summary);
            final_pass = Some((master_solution, outcomes, operating));

            if cuts_added == 0 {
                status = if failed == 0 {
                    DecompositionStatus::Converged
                } else {
                    DecompositionStatus::Incomplete
                };
                break;
            }
        }

        let Some((master_solution, outcomes, operating_cost)) = final_pass else {
            return Err(PlanError::Config("no decomposition pass ran".into()));
        };
        let builds = PlanningSolution::build_decisions(case, &master_solution.plan);
        let solution = PlanningSolution {
            case_name: case.name.clone(),
            status,
            investment_cost: master_solution.plan.investment_cost(case),
            plan: master_solution.plan,
            builds,
            operating_cost,
            iterations,
            outcomes,
            failures,
            cuts: master.cuts().to_vec(),
            solve_time: started.elapsed(),
        };
        info!(
            %status,
            iterations = solution.iterations.len(),
            builds = solution.builds.len(),
            elapsed = ?solution.solve_time,
            "decomposition finished"
        );
        Ok(solution)
    }

    #[cfg(feature = "parallel")]
    fn evaluate_all(
        &self,
        case: &PlanningCase,
        topology: &Topology,
        plan: &InvestmentPlan,
        points: &[(usize, usize)],
    ) -> Vec<PlanResult<SubproblemOutcome>> {
        if !self.config.parallel {
            return self.evaluate_serial(case, topology, plan, points);
        }
        points
            .par_iter()
            .map(|&(stage, scenario)| self.evaluate(case, topology, plan, stage, scenario))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate_all(
        &self,
        case: &PlanningCase,
        topology: &Topology,
        plan: &InvestmentPlan,
        points: &[(usize, usize)],
    ) -> Vec<PlanResult<SubproblemOutcome>> {
        self.evaluate_serial(case, topology, plan, points)
    }

    fn evaluate_serial(
        &self,
        case: &PlanningCase,
        topology: &Topology,
        plan: &InvestmentPlan,
        points: &[(usize, usize)],
    ) -> Vec<PlanResult<SubproblemOutcome>> {
        points
            .iter()
            .map(|&(stage, scenario)| self.evaluate(case, topology, plan, stage, scenario))
            .collect()
    }

    /// Run the pipeline for one (stage, scenario) under `plan`
    pub fn evaluate(
        &self,
        case: &PlanningCase,
        topology: &Topology,
        plan: &InvestmentPlan,
        stage: usize,
        scenario: usize,
    ) -> PlanResult<SubproblemOutcome> {
        let search = BranchAndBound::new(&self.oracle, self.config.branch_bound.clone());

        let model = OperationalModel::formulate(case, topology, stage, scenario, plan)?;
        let operational = model.solve(&search)?;
        let bundle = DualBundle::price(&self.oracle, &model, &operational.assignment)?;
        let relaxation = build_relaxation(&model, &bundle)?;
        let result = search.solve(&relaxation.program)?;
        if result.status == SearchStatus::LimitReached {
            return Err(PlanError::SearchLimit(format!(
                "relaxation of stage {stage} scenario {scenario} stopped after {} nodes",
                result.nodes_explored
            )));
        }
        let cut = synthesize_cut(&relaxation, &result);

        debug!(
            stage,
            scenario,
            operational = operational.objective,
            relaxation = ?result.objective(),
            "subproblem evaluated"
        );

        Ok(SubproblemOutcome {
            stage,
            scenario,
            operational_objective: operational.objective,
            assignment: operational.assignment,
            operational_nodes: operational.nodes_explored,
            relaxation_objective: result.objective(),
            relaxation_status: result.status,
            relaxation_nodes: result.nodes_explored,
            cut,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{feeder_case, two_bus_case};

    #[test]
    fn test_config_defaults_and_validation() {
        let config = DecompositionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_iterations, 20);
        assert!(config.branch_bound.restore_feasibility);

        let bad = DecompositionConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(PlanError::Config(_))));

        let mut bad = DecompositionConfig::default();
        bad.oracle.snap_tolerance = 0.5;
        assert!(matches!(bad.validate(), Err(PlanError::Config(_))));
    }

    #[test]
    fn test_invalid_case_is_rejected() {
        let mut case = two_bus_case();
        case.scenarios.clear();
        let driver = Decomposition::with_clarabel(DecompositionConfig::default());
        assert!(matches!(driver.run(&case), Err(PlanError::InvalidCase(_))));
    }

    #[test]
    fn test_two_bus_converges_without_investment() {
        let case = two_bus_case();
        let driver = Decomposition::with_clarabel(DecompositionConfig {
            parallel: false,
            ..Default::default()
        });
        let solution = driver.run(&case).unwrap();

        assert!(solution.failures.is_empty());
        assert!(solution.builds.is_empty());
        assert_eq!(solution.outcomes.len(), 1);
        // First pass adds the operating-cost cut, second pass confirms it
        assert_eq!(solution.status, DecompositionStatus::Converged);
        assert_eq!(solution.iterations.len(), 2);
        assert_eq!(solution.iterations[0].cuts_added, 1);
        assert_eq!(solution.cuts.len(), 1);
    }

    #[test]
    fn test_single_pass_evaluates_every_point() {
        let case = feeder_case();
        let driver = Decomposition::with_clarabel(DecompositionConfig {
            max_iterations: 1,
            ..Default::default()
        });
        let solution = driver.run(&case).unwrap();

        assert_eq!(solution.iterations.len(), 1);
        let order: Vec<(usize, usize)> = solution
            .outcomes
            .iter()
            .map(|o| (o.stage, o.scenario))
            .collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        // θ starts at zero, so every positive-cost point yields a violated cut
        assert_eq!(solution.status, DecompositionStatus::IterationLimit);
        assert_eq!(solution.iterations[0].cuts_added, 4);
    }
}
