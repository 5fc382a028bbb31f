//! Clarabel LP oracle
//!
//! Clarabel solves conic programs of the form
//!
//! ```text
//! minimize    (1/2)x'Px + q'x
//! subject to  Ax + s = b
//!             s ∈ K
//! ```
//!
//! A canonical program maps onto it with `P = 0`, `q = c` and one cone row
//! per constraint:
//!
//! | source               | clarabel row            | cone        |
//! |----------------------|-------------------------|-------------|
//! | `a·x ≥ b`            | `-a·x + s = -b`         | nonnegative |
//! | `a·x = b`            | `-a·x + s = -b`         | zero        |
//! | `x_j ≤ ub_j`         | `x_j + s = ub_j`        | nonnegative |
//! | `x_j ≥ lb_j`         | `-x_j + s = -lb_j`      | nonnegative |
//! | `lb_j = ub_j`        | `x_j + s = lb_j`        | zero        |
//!
//! With this orientation the cone multiplier `z_i` of a program row equals
//! `∂objective/∂b_i`, the oracle's documented dual convention.

use super::{LpOracle, LpOutcome, LpStatus, OracleSettings};
use crate::error::{PlanError, PlanResult};
use crate::program::{LinearProgram, RowSense};
use ::clarabel::algebra::CscMatrix;
use ::clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use tracing::trace;

/// LP oracle backed by the Clarabel interior-point solver.
///
/// Interior-point iterates approach vertices only up to the solver
/// tolerance, so integer-marked primal values are snapped to the nearest
/// integer when they are within [`OracleSettings::snap_tolerance`] and the
/// objective is recomputed from the snapped point.
#[derive(Debug, Clone, Default)]
pub struct ClarabelOracle {
    settings: OracleSettings,
}

/// One row of the conic form, before numbering.
struct ConeRow {
    terms: Vec<(usize, f64)>,
    rhs: f64,
    /// Index of the program row this came from, if any
    source: Option<usize>,
}

impl ClarabelOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: OracleSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &OracleSettings {
        &self.settings
    }

    /// Split program rows and bounds into nonnegative-cone and zero-cone rows
    fn cone_rows(
        program: &LinearProgram,
        lower: &[f64],
        upper: &[f64],
    ) -> (Vec<ConeRow>, Vec<ConeRow>) {
        let mut nonneg = Vec::new();
        let mut zero = Vec::new();

        for (i, row) in program.rows.outer_iterator().enumerate() {
            let cone_row = ConeRow {
                terms: row.iter().map(|(j, &a)| (j, -a)).collect(),
                rhs: -program.rhs[i],
                source: Some(i),
            };
            match program.senses[i] {
                RowSense::GreaterEqual => nonneg.push(cone_row),
                RowSense::Equal => zero.push(cone_row),
            }
        }

        for (j, (&lo, &hi)) in lower.iter().zip(upper).enumerate() {
            if lo == hi && lo.is_finite() {
                zero.push(ConeRow {
                    terms: vec![(j, 1.0)],
                    rhs: lo,
                    source: None,
                });
                continue;
            }
            if hi.is_finite() {
                nonneg.push(ConeRow {
                    terms: vec![(j, 1.0)],
                    rhs: hi,
                    source: None,
                });
            }
            if lo.is_finite() {
                nonneg.push(ConeRow {
                    terms: vec![(j, -1.0)],
                    rhs: -lo,
                    source: None,
                });
            }
        }

        (nonneg, zero)
    }

    /// Snap integer-marked values onto integers and into their bounds
    fn polish(&self, program: &LinearProgram, lower: &[f64], upper: &[f64], x: &mut [f64]) {
        let tol = self.settings.snap_tolerance;
        for j in 0..x.len() {
            if !program.integer[j] {
                continue;
            }
            let rounded = x[j].round();
            if (x[j] - rounded).abs() <= tol {
                x[j] = rounded;
            }
            if x[j] < lower[j] && lower[j] - x[j] <= tol {
                x[j] = lower[j];
            }
            if x[j] > upper[j] && x[j] - upper[j] <= tol {
                x[j] = upper[j];
            }
        }
    }
}

impl LpOracle for ClarabelOracle {
    fn solve_with_bounds(
        &self,
        program: &LinearProgram,
        lower: &[f64],
        upper: &[f64],
    ) -> PlanResult<LpOutcome> {
        let n = program.num_columns();
        let m = program.num_rows();
        if lower.len() != n || upper.len() != n {
            return Err(PlanError::DimensionMismatch(format!(
                "bounds have lengths {}/{}, program has {} columns",
                lower.len(),
                upper.len(),
                n
            )));
        }

        // Crossed bounds need no kernel call
        if lower.iter().zip(upper).any(|(lo, hi)| lo > hi) {
            trace!("crossed bounds, relaxation infeasible");
            return Ok(LpOutcome::infeasible());
        }

        if n == 0 {
            let feasible = program.is_feasible(&[], 0.0);
            return Ok(if feasible {
                LpOutcome {
                    status: LpStatus::Optimal,
                    primal: Vec::new(),
                    objective: program.offset,
                    duals: vec![0.0; m],
                }
            } else {
                LpOutcome::infeasible()
            });
        }

        let (nonneg, zero) = Self::cone_rows(program, lower, upper);
        let n_nonneg = nonneg.len();
        let n_rows = n_nonneg + zero.len();

        if n_rows == 0 {
            // Free columns and no rows: bounded only if the cost is zero
            return Ok(if program.cost.iter().all(|&c| c == 0.0) {
                LpOutcome {
                    status: LpStatus::Optimal,
                    primal: vec![0.0; n],
                    objective: program.offset,
                    duals: Vec::new(),
                }
            } else {
                LpOutcome::unbounded()
            });
        }

        // Assemble A column by column (CSC requires sorted row indices)
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut rhs = Vec::with_capacity(n_rows);
        let mut dual_slot = vec![0usize; m];
        for (r, row) in nonneg.iter().chain(zero.iter()).enumerate() {
            for &(j, a) in &row.terms {
                columns[j].push((r, a));
            }
            rhs.push(row.rhs);
            if let Some(i) = row.source {
                dual_slot[i] = r;
            }
        }

        let mut col_ptr = Vec::with_capacity(n + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        for column in &mut columns {
            col_ptr.push(row_idx.len());
            column.sort_by_key(|(r, _)| *r);
            for &(r, a) in column.iter() {
                row_idx.push(r);
                values.push(a);
            }
        }
        col_ptr.push(row_idx.len());

        let a_mat = CscMatrix::new(n_rows, n, col_ptr, row_idx, values);
        let p_mat = CscMatrix::new(n, n, vec![0; n + 1], Vec::new(), Vec::new());

        let mut cones: Vec<SupportedConeT<f64>> = Vec::new();
        if n_nonneg > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(n_nonneg));
        }
        if !zero.is_empty() {
            cones.push(SupportedConeT::ZeroConeT(zero.len()));
        }

        let settings = DefaultSettingsBuilder::default()
            .verbose(self.settings.verbose)
            .max_iter(self.settings.max_iter)
            .build()
            .map_err(|e| PlanError::Numerical(format!("Clarabel settings error: {:?}", e)))?;

        let mut solver = DefaultSolver::new(&p_mat, &program.cost, &a_mat, &rhs, &cones, settings)
            .map_err(|e| PlanError::Numerical(format!("Clarabel initialization failed: {:?}", e)))?;
        solver.solve();

        let sol = &solver.solution;
        trace!(status = ?sol.status, iterations = sol.iterations, "clarabel solve");

        match sol.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                let mut primal = sol.x.clone();
                self.polish(program, lower, upper, &mut primal);
                let objective = program.objective_value(&primal);
                let duals = dual_slot.iter().map(|&r| sol.z[r]).collect();
                Ok(LpOutcome {
                    status: LpStatus::Optimal,
                    primal,
                    objective,
                    duals,
                })
            }
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                Ok(LpOutcome::infeasible())
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                Ok(LpOutcome::unbounded())
            }
            status => Err(PlanError::Numerical(format!(
                "Clarabel returned status {:?}",
                status
            ))),
        }
    }

    fn name(&self) -> &str {
        "clarabel"
    }
}
