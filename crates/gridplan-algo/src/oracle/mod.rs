//! LP oracle contract
//!
//! The branch-and-bound search, the fixed-binary dual solve and feasibility
//! restoration all talk to the LP kernel through [`LpOracle`]. The oracle
//! solves the continuous relaxation of a [`LinearProgram`] under caller
//! supplied column bounds, so branching narrows bounds without copying the
//! constraint matrix.
//!
//! ## Dual sign convention
//!
//! `duals[i]` is the shadow price of row `i`: raising `b_i` by ε changes the
//! objective by `duals[i]·ε` at the margin. Duals of `≥` rows are therefore
//! non-negative in a minimization; duals of equality rows are free.

mod clarabel;
mod restore;

pub use self::clarabel::ClarabelOracle;
pub use restore::{restoration_program, solve_with_restoration, NodeRelaxation};

use crate::error::PlanResult;
use crate::program::LinearProgram;
use serde::{Deserialize, Serialize};

/// Outcome class of an LP solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
}

/// Result of one LP solve.
#[derive(Debug, Clone, PartialEq)]
pub struct LpOutcome {
    pub status: LpStatus,
    /// Primal point; empty unless optimal
    pub primal: Vec<f64>,
    /// `c·x + d` at the primal point; `+∞` unless optimal
    pub objective: f64,
    /// One dual per row, in row order; empty unless optimal
    pub duals: Vec<f64>,
}

impl LpOutcome {
    pub fn infeasible() -> Self {
        Self {
            status: LpStatus::Infeasible,
            primal: Vec::new(),
            objective: f64::INFINITY,
            duals: Vec::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            status: LpStatus::Unbounded,
            primal: Vec::new(),
            objective: f64::NEG_INFINITY,
            duals: Vec::new(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == LpStatus::Optimal
    }
}

/// Any LP solving capability.
pub trait LpOracle: Send + Sync {
    /// Solve the continuous relaxation of `program` with bounds `lower`/`upper`
    /// in place of the program's own bounds.
    fn solve_with_bounds(
        &self,
        program: &LinearProgram,
        lower: &[f64],
        upper: &[f64],
    ) -> PlanResult<LpOutcome>;

    /// Solve the continuous relaxation with the program's own bounds
    fn solve(&self, program: &LinearProgram) -> PlanResult<LpOutcome> {
        self.solve_with_bounds(program, &program.lower, &program.upper)
    }

    /// Name of the backend
    fn name(&self) -> &str;
}

/// Oracle tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Integer-marked primal values within this distance of an integer are
    /// snapped to it before integrality is tested
    pub snap_tolerance: f64,
    /// Iteration cap of the interior-point kernel
    pub max_iter: u32,
    /// Print kernel progress
    pub verbose: bool,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            snap_tolerance: 1e-6,
            max_iter: 200,
            verbose: false,
        }
    }
}
