//! Depth-first 0/1 branch-and-bound with per-node dual harvesting
//!
//! The search solves the continuous relaxation at every node through an
//! [`LpOracle`] and records each visit in a [`NodeRecord`] trace. Besides the
//! incumbent, callers read the duals of the node that produced it; the Benders
//! cut synthesis depends on them.
//!
//! Branching rule: the first integer column with a fractional value. The child
//! with the column forced up is explored before the child forced down, and
//! each child sees the bounds of its ancestors only.

use crate::error::{PlanError, PlanResult};
use crate::oracle::{solve_with_restoration, LpOracle, LpStatus, NodeRelaxation};
use crate::program::LinearProgram;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};
use web_time::Instant;

/// Search limits and options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchBoundConfig {
    /// Stop after this many nodes (unlimited if `None`)
    pub max_nodes: Option<usize>,
    /// Stop after this many seconds (unlimited if `None`)
    pub time_limit_secs: Option<f64>,
    /// Run the restoration program at infeasible nodes so the trace carries
    /// a primal point and duals for them
    pub restore_feasibility: bool,
}

impl Default for BranchBoundConfig {
    fn default() -> Self {
        Self {
            max_nodes: None,
            time_limit_secs: None,
            restore_feasibility: true,
        }
    }
}

/// Final state of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStatus {
    /// The tree was exhausted and an incumbent exists
    IntegerOptimal,
    /// The tree was exhausted without an integer-feasible point
    Infeasible,
    /// A node or time limit stopped the search early
    LimitReached,
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchStatus::IntegerOptimal => write!(f, "integer optimal"),
            SearchStatus::Infeasible => write!(f, "infeasible"),
            SearchStatus::LimitReached => write!(f, "limit reached"),
        }
    }
}

/// What happened at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeOutcome {
    /// Relaxation infeasible
    Infeasible,
    /// Relaxed objective not better than the incumbent
    BoundPruned,
    /// Integral relaxation that became the incumbent
    Integral,
    /// Branched on this column
    Branched(usize),
}

/// One visited node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub depth: usize,
    /// Duals of the node relaxation (restoration duals at restored nodes,
    /// empty if nothing could be solved)
    pub duals: Vec<f64>,
    pub feasible: bool,
    /// Integer columns fixed to 0 at this node
    pub fixed_to_zero: Vec<usize>,
    /// Integer columns fixed to 1 at this node
    pub fixed_to_one: Vec<usize>,
    /// Relaxed objective at feasible nodes. At restored nodes this is the
    /// phase-one infeasibility measure, not a bound (`+∞` if infeasible
    /// without restoration)
    pub relaxed_objective: f64,
    /// Incumbent objective when the node was visited (`+∞` if none)
    pub incumbent_objective: f64,
    pub outcome: NodeOutcome,
}

/// Best integer-feasible point found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incumbent {
    pub solution: Vec<f64>,
    pub objective: f64,
    /// Index into the trace of the node that produced it
    pub node: usize,
}

/// Result of a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchBoundResult {
    pub status: SearchStatus,
    pub incumbent: Option<Incumbent>,
    /// Every visited node, in visit order
    pub trace: Vec<NodeRecord>,
    pub nodes_explored: usize,
    pub elapsed: Duration,
}

impl BranchBoundResult {
    pub fn objective(&self) -> Option<f64> {
        self.incumbent.as_ref().map(|inc| inc.objective)
    }

    pub fn solution(&self) -> Option<&[f64]> {
        self.incumbent.as_ref().map(|inc| inc.solution.as_slice())
    }

    /// Duals of the node that produced the incumbent
    pub fn incumbent_duals(&self) -> Option<&[f64]> {
        self.incumbent
            .as_ref()
            .and_then(|inc| self.trace.get(inc.node))
            .map(|record| record.duals.as_slice())
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SearchStatus::IntegerOptimal
    }
}

/// Mutable state threaded through the recursion.
struct SearchContext {
    incumbent: Option<Incumbent>,
    trace: Vec<NodeRecord>,
    started: Instant,
    limit_hit: bool,
}

impl SearchContext {
    fn incumbent_objective(&self) -> f64 {
        self.incumbent
            .as_ref()
            .map(|inc| inc.objective)
            .unwrap_or(f64::INFINITY)
    }
}

/// Branch-and-bound search over an LP oracle.
pub struct BranchAndBound<'a, O: LpOracle + ?Sized> {
    oracle: &'a O,
    config: BranchBoundConfig,
}

impl<'a, O: LpOracle + ?Sized> BranchAndBound<'a, O> {
    pub fn new(oracle: &'a O, config: BranchBoundConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &BranchBoundConfig {
        &self.config
    }

    pub fn oracle(&self) -> &'a O {
        self.oracle
    }

    /// Minimize `program` over its integer columns.
    ///
    /// Fails fast with [`PlanError::DimensionMismatch`] on malformed input,
    /// before any oracle call.
    pub fn solve(&self, program: &LinearProgram) -> PlanResult<BranchBoundResult> {
        program.validate()?;

        let mut ctx = SearchContext {
            incumbent: None,
            trace: Vec::new(),
            started: Instant::now(),
            limit_hit: false,
        };
        let mut lower = program.lower.clone();
        let mut upper = program.upper.clone();
        self.explore(program, &mut lower, &mut upper, 0, &mut ctx)?;

        let status = if ctx.limit_hit {
            SearchStatus::LimitReached
        } else if ctx.incumbent.is_some() {
            SearchStatus::IntegerOptimal
        } else {
            SearchStatus::Infeasible
        };
        let elapsed = ctx.started.elapsed();

        debug!(
            oracle = self.oracle.name(),
            columns = program.num_columns(),
            rows = program.num_rows(),
            nodes = ctx.trace.len(),
            %status,
            objective = ctx.incumbent_objective(),
            "branch-and-bound finished"
        );

        Ok(BranchBoundResult {
            status,
            incumbent: ctx.incumbent,
            nodes_explored: ctx.trace.len(),
            trace: ctx.trace,
            elapsed,
        })
    }

    fn limit_reached(&self, ctx: &SearchContext) -> bool {
        if let Some(max) = self.config.max_nodes {
            if ctx.trace.len() >= max {
                return true;
            }
        }
        if let Some(secs) = self.config.time_limit_secs {
            if ctx.started.elapsed().as_secs_f64() >= secs {
                return true;
            }
        }
        false
    }

    fn relax(
        &self,
        program: &LinearProgram,
        lower: &[f64],
        upper: &[f64],
    ) -> PlanResult<NodeRelaxation> {
        if self.config.restore_feasibility {
            return match solve_with_restoration(self.oracle, program, lower, upper) {
                Err(PlanError::OracleInfeasible(_)) => Ok(NodeRelaxation::infeasible()),
                other => other,
            };
        }

        let outcome = self.oracle.solve_with_bounds(program, lower, upper)?;
        match outcome.status {
            LpStatus::Optimal => Ok(NodeRelaxation {
                feasible: true,
                primal: outcome.primal,
                objective: outcome.objective,
                duals: outcome.duals,
                restored: false,
            }),
            LpStatus::Infeasible => Ok(NodeRelaxation::infeasible()),
            LpStatus::Unbounded => Err(PlanError::OracleUnbounded(format!(
                "node relaxation over {} columns is unbounded",
                program.num_columns()
            ))),
        }
    }

    fn explore(
        &self,
        program: &LinearProgram,
        lower: &mut [f64],
        upper: &mut [f64],
        depth: usize,
        ctx: &mut SearchContext,
    ) -> PlanResult<()> {
        if self.limit_reached(ctx) {
            ctx.limit_hit = true;
            return Ok(());
        }

        let mut relaxation = self.relax(program, lower, upper)?;
        if relaxation.feasible {
            clamp_integer_columns(program, &mut relaxation.primal, lower, upper);
        }
        let node = ctx.trace.len();
        let incumbent_objective = ctx.incumbent_objective();
        let (fixed_to_zero, fixed_to_one) = fixed_columns(program, lower, upper);
        ctx.trace.push(NodeRecord {
            depth,
            duals: relaxation.duals.clone(),
            feasible: relaxation.feasible,
            fixed_to_zero,
            fixed_to_one,
            relaxed_objective: relaxation.objective,
            incumbent_objective,
            outcome: NodeOutcome::Infeasible,
        });

        if !relaxation.feasible {
            trace!(node, depth, "infeasible node");
            return Ok(());
        }
        if relaxation.objective >= incumbent_objective {
            ctx.trace[node].outcome = NodeOutcome::BoundPruned;
            return Ok(());
        }

        let Some(column) = first_fractional(program, &relaxation.primal) else {
            trace!(node, depth, objective = relaxation.objective, "new incumbent");
            ctx.trace[node].outcome = NodeOutcome::Integral;
            ctx.incumbent = Some(Incumbent {
                solution: relaxation.primal,
                objective: relaxation.objective,
                node,
            });
            return Ok(());
        };

        ctx.trace[node].outcome = NodeOutcome::Branched(column);
        let floor = relaxation.primal[column].floor();

        // Each child must shrink the column's range, or the recursion would
        // re-solve its parent's relaxation
        if upper[column] >= floor + 1.0 && lower[column] < floor + 1.0 {
            let saved = lower[column];
            lower[column] = floor + 1.0;
            let result = self.explore(program, lower, upper, depth + 1, ctx);
            lower[column] = saved;
            result?;
        }
        if lower[column] <= floor && upper[column] > floor {
            let saved = upper[column];
            upper[column] = floor;
            let result = self.explore(program, lower, upper, depth + 1, ctx);
            upper[column] = saved;
            result?;
        }
        Ok(())
    }
}

/// Convenience wrapper for a one-off search
pub fn branch_and_bound<O: LpOracle + ?Sized>(
    oracle: &O,
    program: &LinearProgram,
    config: BranchBoundConfig,
) -> PlanResult<BranchBoundResult> {
    BranchAndBound::new(oracle, config).solve(program)
}

/// Pull integer columns back inside the node bounds. An interior-point kernel
/// may overshoot a bound by more than the snap tolerance.
fn clamp_integer_columns(program: &LinearProgram, x: &mut [f64], lower: &[f64], upper: &[f64]) {
    for j in 0..program.num_columns().min(x.len()) {
        if program.integer[j] {
            x[j] = x[j].max(lower[j]).min(upper[j]);
        }
    }
}

/// First integer column whose value is not exactly integral
fn first_fractional(program: &LinearProgram, x: &[f64]) -> Option<usize> {
    (0..program.num_columns()).find(|&j| program.integer[j] && x[j] != x[j].round())
}

fn fixed_columns(
    program: &LinearProgram,
    lower: &[f64],
    upper: &[f64],
) -> (Vec<usize>, Vec<usize>) {
    let mut zero = Vec::new();
    let mut one = Vec::new();
    for j in 0..program.num_columns() {
        if !program.integer[j] || lower[j] != upper[j] {
            continue;
        }
        if lower[j] == 0.0 {
            zero.push(j);
        } else if lower[j] == 1.0 {
            one.push(j);
        }
    }
    (zero, one)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::LpOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Oracle that records how often it was called and always fails.
    struct Unreachable(AtomicUsize);

    impl LpOracle for Unreachable {
        fn solve_with_bounds(
            &self,
            _: &LinearProgram,
            _: &[f64],
            _: &[f64],
        ) -> PlanResult<LpOutcome> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(PlanError::Numerical("not expected".into()))
        }

        fn name(&self) -> &str {
            "unreachable"
        }
    }

    /// Oracle for one-column programs: returns 0.5 unless bounds fix the column.
    struct HalfOracle;

    impl LpOracle for HalfOracle {
        fn solve_with_bounds(
            &self,
            program: &LinearProgram,
            lower: &[f64],
            upper: &[f64],
        ) -> PlanResult<LpOutcome> {
            if lower[0] > upper[0] {
                return Ok(LpOutcome::infeasible());
            }
            let x = if lower[0] == upper[0] { lower[0] } else { 0.5 };
            Ok(LpOutcome {
                status: LpStatus::Optimal,
                primal: vec![x],
                objective: program.objective_value(&[x]),
                duals: vec![0.0; program.num_rows()],
            })
        }

        fn name(&self) -> &str {
            "half"
        }
    }

    /// Oracle that lands just outside the node bounds of column 0.
    struct Overshoot(f64);

    impl LpOracle for Overshoot {
        fn solve_with_bounds(
            &self,
            program: &LinearProgram,
            lower: &[f64],
            upper: &[f64],
        ) -> PlanResult<LpOutcome> {
            let x = if self.0 > 0.0 {
                upper[0] + self.0
            } else {
                lower[0] + self.0
            };
            Ok(LpOutcome {
                status: LpStatus::Optimal,
                primal: vec![x],
                objective: program.objective_value(&[x]),
                duals: vec![0.0; program.num_rows()],
            })
        }

        fn name(&self) -> &str {
            "overshoot"
        }
    }

    #[test]
    fn test_out_of_bounds_relaxation_terminates() {
        let lp =
            LinearProgram::from_dense(vec![-1.0], 0.0, &[], vec![], vec![0.0], vec![1.0]).unwrap();
        let config = BranchBoundConfig {
            max_nodes: Some(50),
            ..Default::default()
        };
        for (delta, expected) in [(1e-5, 1.0), (-1e-5, 0.0)] {
            let result = branch_and_bound(&Overshoot(delta), &lp, config.clone()).unwrap();
            assert_eq!(result.status, SearchStatus::IntegerOptimal);
            assert_eq!(result.nodes_explored, 1);
            assert_eq!(result.trace[0].outcome, NodeOutcome::Integral);
            assert_eq!(result.solution(), Some(&[expected][..]));
        }
    }

    #[test]
    fn test_clamp_leaves_continuous_columns() {
        let mut lp = LinearProgram::from_dense(
            vec![0.0, 0.0],
            0.0,
            &[],
            vec![],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
        )
        .unwrap();
        lp.integer[1] = false;
        let mut x = vec![1.0 + 1e-4, -1e-4];
        clamp_integer_columns(&lp, &mut x, &lp.lower, &lp.upper);
        assert_eq!(x, vec![1.0, -1e-4]);
    }

    #[test]
    fn test_malformed_program_fails_before_oracle() {
        let oracle = Unreachable(AtomicUsize::new(0));
        let mut lp =
            LinearProgram::from_dense(vec![1.0], 0.0, &[], vec![], vec![0.0], vec![1.0]).unwrap();
        lp.upper.push(1.0);
        let err = branch_and_bound(&oracle, &lp, BranchBoundConfig::default()).unwrap_err();
        assert!(matches!(err, PlanError::DimensionMismatch(_)));
        assert_eq!(oracle.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_branching_order_ceiling_first() {
        // min -x with relaxation 0.5: ceiling child wins, floor child pruned
        let lp =
            LinearProgram::from_dense(vec![-1.0], 0.0, &[], vec![], vec![0.0], vec![1.0]).unwrap();
        let result = branch_and_bound(&HalfOracle, &lp, BranchBoundConfig::default()).unwrap();

        assert_eq!(result.status, SearchStatus::IntegerOptimal);
        assert_eq!(result.solution(), Some(&[1.0][..]));
        assert_eq!(result.nodes_explored, 3);
        assert_eq!(result.trace[0].outcome, NodeOutcome::Branched(0));
        assert_eq!(result.trace[1].outcome, NodeOutcome::Integral);
        assert_eq!(result.trace[1].fixed_to_one, vec![0]);
        assert_eq!(result.trace[2].outcome, NodeOutcome::BoundPruned);
        assert_eq!(result.trace[2].fixed_to_zero, vec![0]);
        assert_eq!(result.trace[2].incumbent_objective, -1.0);
        assert_eq!(result.incumbent.as_ref().map(|inc| inc.node), Some(1));
    }

    #[test]
    fn test_node_limit() {
        let lp =
            LinearProgram::from_dense(vec![-1.0], 0.0, &[], vec![], vec![0.0], vec![1.0]).unwrap();
        let config = BranchBoundConfig {
            max_nodes: Some(1),
            ..Default::default()
        };
        let result = branch_and_bound(&HalfOracle, &lp, config).unwrap();
        assert_eq!(result.status, SearchStatus::LimitReached);
        assert_eq!(result.nodes_explored, 1);
        assert!(result.incumbent.is_none());
    }

    #[test]
    fn test_crossed_bounds_without_restoration() {
        let lp =
            LinearProgram::from_dense(vec![1.0], 0.0, &[], vec![], vec![1.0], vec![0.0]).unwrap();
        let config = BranchBoundConfig {
            restore_feasibility: false,
            ..Default::default()
        };
        let result = branch_and_bound(&HalfOracle, &lp, config).unwrap();
        assert_eq!(result.status, SearchStatus::Infeasible);
        assert_eq!(result.nodes_explored, 1);
        assert!(result.trace[0].duals.is_empty());
        assert!(result.trace[0].fixed_to_zero.is_empty());
        assert!(result.trace[0].fixed_to_one.is_empty());
    }

    #[test]
    fn test_fixed_columns_ignores_continuous() {
        let mut lp = LinearProgram::from_dense(
            vec![1.0, 1.0],
            0.0,
            &[],
            vec![],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
        )
        .unwrap();
        lp.integer[1] = false;
        let (zero, one) = fixed_columns(&lp, &lp.lower, &lp.upper);
        assert_eq!(zero, vec![0]);
        assert!(one.is_empty());
    }
}
