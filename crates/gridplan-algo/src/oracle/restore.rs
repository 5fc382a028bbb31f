//! Feasibility restoration
//!
//! When a node relaxation is infeasible the search still wants a primal point
//! and duals for its trace. The restoration program drops the objective,
//! adds a non-negative artificial per `≥` row (two per equality row) and
//! minimizes their sum. Its optimum says how far the node is from
//! feasibility; the node itself stays infeasible.

use super::{LpOracle, LpStatus};
use crate::error::{PlanError, PlanResult};
use crate::program::{LinearProgram, ProgramBuilder, RowSense};
use tracing::trace;

/// Relaxation of one branch-and-bound node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRelaxation {
    /// Whether the node relaxation itself is feasible
    pub feasible: bool,
    /// Primal point over the program's columns (restoration point if infeasible)
    pub primal: Vec<f64>,
    /// Relaxed objective, or the total infeasibility when restored
    pub objective: f64,
    /// One dual per program row; empty if nothing was solved
    pub duals: Vec<f64>,
    /// Whether the values come from the restoration program
    pub restored: bool,
}

impl NodeRelaxation {
    /// An infeasible node with no restoration data
    pub fn infeasible() -> Self {
        Self {
            feasible: false,
            primal: Vec::new(),
            objective: f64::INFINITY,
            duals: Vec::new(),
            restored: false,
        }
    }
}

/// Build the phase-one program for `program`.
///
/// Columns keep their positions; artificials are appended after them with
/// cost 1 and bounds `[0, ∞)`.
pub fn restoration_program(program: &LinearProgram) -> LinearProgram {
    let mut builder = ProgramBuilder::from_program(program);
    for j in 0..program.num_columns() {
        builder.set_cost(j, 0.0);
    }
    builder.set_offset(0.0);

    for (row, sense) in program.senses.iter().enumerate() {
        let up = builder.add_column(1.0, 0.0, f64::INFINITY, false);
        builder.add_entry(row, up, 1.0);
        if *sense == RowSense::Equal {
            let down = builder.add_column(1.0, 0.0, f64::INFINITY, false);
            builder.add_entry(row, down, -1.0);
        }
    }
    builder.build()
}

/// Solve a node relaxation, falling back to the restoration program when it
/// is infeasible.
///
/// Returns [`PlanError::OracleInfeasible`] when even the restoration program
/// has no feasible point (crossed bounds) and [`PlanError::OracleUnbounded`]
/// when the node relaxation is unbounded.
pub fn solve_with_restoration<O: LpOracle + ?Sized>(
    oracle: &O,
    program: &LinearProgram,
    lower: &[f64],
    upper: &[f64],
) -> PlanResult<NodeRelaxation> {
    let outcome = oracle.solve_with_bounds(program, lower, upper)?;
    match outcome.status {
        LpStatus::Optimal => {
            return Ok(NodeRelaxation {
                feasible: true,
                primal: outcome.primal,
                objective: outcome.objective,
                duals: outcome.duals,
                restored: false,
            })
        }
        LpStatus::Unbounded => {
            return Err(PlanError::OracleUnbounded(format!(
                "node relaxation over {} columns is unbounded",
                program.num_columns()
            )))
        }
        LpStatus::Infeasible => {}
    }

    let n = program.num_columns();
    let phase_one = restoration_program(program);
    let extra = phase_one.num_columns() - n;
    let mut lo = lower.to_vec();
    let mut hi = upper.to_vec();
    lo.extend(std::iter::repeat(0.0).take(extra));
    hi.extend(std::iter::repeat(f64::INFINITY).take(extra));

    let restored = oracle.solve_with_bounds(&phase_one, &lo, &hi)?;
    match restored.status {
        LpStatus::Optimal => {
            trace!(infeasibility = restored.objective, "node restored");
            let mut primal = restored.primal;
            primal.truncate(n);
            Ok(NodeRelaxation {
                feasible: false,
                primal,
                objective: restored.objective,
                duals: restored.duals,
                restored: true,
            })
        }
        LpStatus::Infeasible => Err(PlanError::OracleInfeasible(
            "restoration program has no feasible point".into(),
        )),
        LpStatus::Unbounded => Err(PlanError::OracleUnbounded(
            "restoration program is unbounded".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ClarabelOracle;

    #[test]
    fn test_restoration_program_shape() {
        let mut builder = ProgramBuilder::new();
        let x = builder.add_binary(5.0);
        let y = builder.add_binary(7.0);
        builder.add_ge(&[(x, 1.0), (y, 1.0)], 3.0);
        builder.add_eq(&[(x, 1.0)], 1.0);
        builder.set_offset(2.0);
        let lp = builder.build();

        let phase_one = restoration_program(&lp);
        // One artificial for the ≥ row, two for the equality row
        assert_eq!(phase_one.num_columns(), 5);
        assert_eq!(phase_one.cost, vec![0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(phase_one.offset, 0.0);
        assert_eq!(phase_one.row_terms(0), vec![(0, 1.0), (1, 1.0), (2, 1.0)]);
        assert_eq!(phase_one.row_terms(1), vec![(0, 1.0), (3, 1.0), (4, -1.0)]);
        assert!(!phase_one.integer[2]);
    }

    #[test]
    fn test_feasible_node_passes_through() {
        let lp = LinearProgram::from_dense(
            vec![1.0, 1.0],
            0.0,
            &[vec![1.0, 1.0]],
            vec![1.0],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
        )
        .unwrap();
        let node =
            solve_with_restoration(&ClarabelOracle::new(), &lp, &lp.lower, &lp.upper).unwrap();
        assert!(node.feasible);
        assert!(!node.restored);
        assert!((node.objective - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_node_reports_infeasibility_measure() {
        // x0 + x1 ≥ 3 over binaries: best effort leaves a gap of 1
        let lp = LinearProgram::from_dense(
            vec![1.0, 1.0],
            0.0,
            &[vec![1.0, 1.0]],
            vec![3.0],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
        )
        .unwrap();
        let node =
            solve_with_restoration(&ClarabelOracle::new(), &lp, &lp.lower, &lp.upper).unwrap();
        assert!(!node.feasible);
        assert!(node.restored);
        assert_eq!(node.primal.len(), 2);
        assert!((node.objective - 1.0).abs() < 1e-5);
        assert_eq!(node.duals.len(), 1);
    }

    #[test]
    fn test_crossed_bounds_cannot_be_restored() {
        let lp =
            LinearProgram::from_dense(vec![1.0], 0.0, &[], vec![], vec![1.0], vec![0.0]).unwrap();
        let err = solve_with_restoration(&ClarabelOracle::new(), &lp, &lp.lower, &lp.upper)
            .unwrap_err();
        assert!(matches!(err, PlanError::OracleInfeasible(_)));
    }
}
