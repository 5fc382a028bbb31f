//! Canonical linear programs with optional integrality
//!
//! Every model in the engine is expressed in one canonical form:
//!
//! ```text
//! minimize    c·x + d
//! subject to  A_i·x ≥ b_i      (rows with RowSense::GreaterEqual)
//!             A_i·x = b_i      (rows with RowSense::Equal)
//!             lb ≤ x ≤ ub
//!             x_j ∈ {0, 1}     for columns marked integer
//! ```
//!
//! A program whose rows are all `≥` and whose columns are all integer is the
//! 0/1 program consumed by the branch-and-bound search. The master and
//! operational models use the same type with a mixed integrality mask, so one
//! search implementation serves all three.

use crate::error::{PlanError, PlanResult};
use sprs::{CsMat, TriMat};

/// Sense of a constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSense {
    /// `a·x ≥ b`
    GreaterEqual,
    /// `a·x = b`
    Equal,
}

/// A linear program in canonical `≥` form.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    /// Objective coefficients `c`
    pub cost: Vec<f64>,
    /// Constant objective offset `d`
    pub offset: f64,
    /// Constraint matrix `A` (CSR, one outer vector per row)
    pub rows: CsMat<f64>,
    /// Right-hand side `b`
    pub rhs: Vec<f64>,
    /// Sense of each row
    pub senses: Vec<RowSense>,
    /// Column lower bounds (may be `-∞` for continuous columns)
    pub lower: Vec<f64>,
    /// Column upper bounds (may be `+∞` for continuous columns)
    pub upper: Vec<f64>,
    /// Integrality mask; integer columns are binary
    pub integer: Vec<bool>,
}

impl LinearProgram {
    /// Build a pure 0/1 program `min c·x + d, A·x ≥ b, lb ≤ x ≤ ub` from
    /// dense rows.
    pub fn from_dense(
        cost: Vec<f64>,
        offset: f64,
        matrix: &[Vec<f64>],
        rhs: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
    ) -> PlanResult<Self> {
        let n = cost.len();
        if matrix.len() != rhs.len() {
            return Err(PlanError::DimensionMismatch(format!(
                "A has {} rows but b has {} entries",
                matrix.len(),
                rhs.len()
            )));
        }
        let mut tri = TriMat::new((matrix.len(), n));
        for (i, row) in matrix.iter().enumerate() {
            if row.len() != n {
                return Err(PlanError::DimensionMismatch(format!(
                    "row {} of A has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            for (j, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    tri.add_triplet(i, j, value);
                }
            }
        }

        let program = LinearProgram {
            cost,
            offset,
            rows: tri.to_csr(),
            senses: vec![RowSense::GreaterEqual; rhs.len()],
            rhs,
            lower,
            upper,
            integer: vec![true; n],
        };
        program.validate()?;
        Ok(program)
    }

    pub fn num_columns(&self) -> usize {
        self.cost.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rhs.len()
    }

    pub fn num_integer(&self) -> usize {
        self.integer.iter().filter(|&&b| b).count()
    }

    /// Check the shape invariants. Fails fast, before any oracle call.
    pub fn validate(&self) -> PlanResult<()> {
        let n = self.cost.len();
        let m = self.rhs.len();
        let mismatch = |what: &str, actual: usize, expected: usize| {
            Err(PlanError::DimensionMismatch(format!(
                "{what} has length {actual}, expected {expected}"
            )))
        };

        if self.rows.rows() != m {
            return mismatch("A (rows)", self.rows.rows(), m);
        }
        if self.rows.cols() != n {
            return mismatch("A (columns)", self.rows.cols(), n);
        }
        if self.senses.len() != m {
            return mismatch("row senses", self.senses.len(), m);
        }
        if self.lower.len() != n {
            return mismatch("lb", self.lower.len(), n);
        }
        if self.upper.len() != n {
            return mismatch("ub", self.upper.len(), n);
        }
        if self.integer.len() != n {
            return mismatch("integrality mask", self.integer.len(), n);
        }
        if !self.offset.is_finite() || self.cost.iter().any(|c| !c.is_finite()) {
            return Err(PlanError::DimensionMismatch(
                "objective contains non-finite values".into(),
            ));
        }
        if self.rhs.iter().any(|b| !b.is_finite()) {
            return Err(PlanError::DimensionMismatch(
                "right-hand side contains non-finite values".into(),
            ));
        }
        for j in 0..n {
            if self.integer[j] {
                let binary = |v: f64| v == 0.0 || v == 1.0;
                if !binary(self.lower[j]) || !binary(self.upper[j]) {
                    return Err(PlanError::DimensionMismatch(format!(
                        "integer column {} has bounds [{}, {}], expected values in {{0, 1}}",
                        j, self.lower[j], self.upper[j]
                    )));
                }
            } else if self.lower[j].is_nan() || self.upper[j].is_nan() {
                return Err(PlanError::DimensionMismatch(format!(
                    "column {j} has NaN bounds"
                )));
            }
        }
        Ok(())
    }

    /// Objective `c·x + d`
    pub fn objective_value(&self, x: &[f64]) -> f64 {
        self.cost.iter().zip(x).map(|(c, v)| c * v).sum::<f64>() + self.offset
    }

    /// Row activities `A·x`
    pub fn row_activity(&self, x: &[f64]) -> Vec<f64> {
        self.rows
            .outer_iterator()
            .map(|row| row.iter().map(|(j, &a)| a * x[j]).sum())
            .collect()
    }

    /// Whether `x` satisfies rows and bounds within `tol`
    pub fn is_feasible(&self, x: &[f64], tol: f64) -> bool {
        if x.len() != self.num_columns() {
            return false;
        }
        let bounds_ok = x
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(&v, (&lo, &hi))| v >= lo - tol && v <= hi + tol);
        if !bounds_ok {
            return false;
        }
        self.row_activity(x)
            .iter()
            .zip(self.rhs.iter().zip(&self.senses))
            .all(|(&ax, (&b, sense))| match sense {
                RowSense::GreaterEqual => ax >= b - tol,
                RowSense::Equal => (ax - b).abs() <= tol,
            })
    }

    /// Nonzero terms `(column, coefficient)` of row `i`
    pub fn row_terms(&self, i: usize) -> Vec<(usize, f64)> {
        self.rows
            .outer_view(i)
            .map(|row| row.iter().map(|(j, &a)| (j, a)).collect())
            .unwrap_or_default()
    }

    /// Whether row `i` only touches columns in `0..limit`
    pub fn row_within(&self, i: usize, limit: usize) -> bool {
        self.rows
            .outer_view(i)
            .map(|row| row.iter().all(|(j, _)| j < limit))
            .unwrap_or(true)
    }
}

/// Incremental builder for [`LinearProgram`].
#[derive(Debug, Clone, Default)]
pub struct ProgramBuilder {
    cost: Vec<f64>,
    offset: f64,
    lower: Vec<f64>,
    upper: Vec<f64>,
    integer: Vec<bool>,
    triplets: Vec<(usize, usize, f64)>,
    rhs: Vec<f64>,
    senses: Vec<RowSense>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing program, keeping its columns and rows
    pub fn from_program(program: &LinearProgram) -> Self {
        let mut triplets = Vec::with_capacity(program.rows.nnz());
        for (i, row) in program.rows.outer_iterator().enumerate() {
            for (j, &a) in row.iter() {
                triplets.push((i, j, a));
            }
        }
        Self {
            cost: program.cost.clone(),
            offset: program.offset,
            lower: program.lower.clone(),
            upper: program.upper.clone(),
            integer: program.integer.clone(),
            triplets,
            rhs: program.rhs.clone(),
            senses: program.senses.clone(),
        }
    }

    pub fn num_columns(&self) -> usize {
        self.cost.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rhs.len()
    }

    /// Add a column and return its index
    pub fn add_column(&mut self, cost: f64, lower: f64, upper: f64, integer: bool) -> usize {
        self.cost.push(cost);
        self.lower.push(lower);
        self.upper.push(upper);
        self.integer.push(integer);
        self.cost.len() - 1
    }

    /// Add a binary column with bounds `[0, 1]`
    pub fn add_binary(&mut self, cost: f64) -> usize {
        self.add_column(cost, 0.0, 1.0, true)
    }

    /// Add `a·x ≥ b` or `a·x = b`; zero coefficients are dropped
    pub fn add_row(&mut self, terms: &[(usize, f64)], sense: RowSense, rhs: f64) -> usize {
        let row = self.rhs.len();
        for &(col, coef) in terms {
            if coef != 0.0 {
                self.triplets.push((row, col, coef));
            }
        }
        self.rhs.push(rhs);
        self.senses.push(sense);
        row
    }

    pub fn add_ge(&mut self, terms: &[(usize, f64)], rhs: f64) -> usize {
        self.add_row(terms, RowSense::GreaterEqual, rhs)
    }

    /// `a·x ≤ b`, stored as `-a·x ≥ -b`
    pub fn add_le(&mut self, terms: &[(usize, f64)], rhs: f64) -> usize {
        let negated: Vec<(usize, f64)> = terms.iter().map(|&(j, a)| (j, -a)).collect();
        self.add_row(&negated, RowSense::GreaterEqual, -rhs)
    }

    pub fn add_eq(&mut self, terms: &[(usize, f64)], rhs: f64) -> usize {
        self.add_row(terms, RowSense::Equal, rhs)
    }

    pub fn add_cost(&mut self, col: usize, value: f64) {
        self.cost[col] += value;
    }

    pub fn set_cost(&mut self, col: usize, value: f64) {
        self.cost[col] = value;
    }

    /// Add `coef` to entry `(row, col)`; duplicates are summed on build
    pub fn add_entry(&mut self, row: usize, col: usize, coef: f64) {
        if coef != 0.0 {
            self.triplets.push((row, col, coef));
        }
    }

    pub fn set_integer(&mut self, col: usize, integer: bool) {
        self.integer[col] = integer;
    }

    pub fn set_bounds(&mut self, col: usize, lower: f64, upper: f64) {
        self.lower[col] = lower;
        self.upper[col] = upper;
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    pub fn build(self) -> LinearProgram {
        let mut tri = TriMat::new((self.rhs.len(), self.cost.len()));
        for (i, j, a) in self.triplets {
            tri.add_triplet(i, j, a);
        }
        LinearProgram {
            cost: self.cost,
            offset: self.offset,
            rows: tri.to_csr(),
            rhs: self.rhs,
            senses: self.senses,
            lower: self.lower,
            upper: self.upper,
            integer: self.integer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dense_shapes() {
        let lp = LinearProgram::from_dense(
            vec![-1.0, -1.0],
            0.5,
            &[vec![1.0, 1.0]],
            vec![1.0],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
        )
        .unwrap();
        assert_eq!(lp.num_columns(), 2);
        assert_eq!(lp.num_rows(), 1);
        assert_eq!(lp.num_integer(), 2);
        assert_eq!(lp.objective_value(&[1.0, 0.0]), -0.5);
        assert_eq!(lp.row_terms(0), vec![(0, 1.0), (1, 1.0)]);
    }

    #[test]
    fn test_row_count_mismatch_is_rejected() {
        let err = LinearProgram::from_dense(
            vec![1.0],
            0.0,
            &[vec![1.0], vec![1.0]],
            vec![1.0],
            vec![0.0],
            vec![1.0],
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::DimensionMismatch(_)));
    }

    #[test]
    fn test_bound_length_mismatch_is_rejected() {
        let err = LinearProgram::from_dense(
            vec![1.0, 2.0],
            0.0,
            &[vec![1.0, 1.0]],
            vec![1.0],
            vec![0.0],
            vec![1.0, 1.0],
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::DimensionMismatch(_)));
    }

    #[test]
    fn test_non_binary_integer_bounds_are_rejected() {
        let err = LinearProgram::from_dense(
            vec![1.0],
            0.0,
            &[],
            vec![],
            vec![0.0],
            vec![2.0],
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::DimensionMismatch(_)));
    }

    #[test]
    fn test_contradictory_binary_bounds_are_valid_input() {
        // lb = 1, ub = 0 is infeasible, not malformed
        let lp = LinearProgram::from_dense(vec![1.0], 0.0, &[], vec![], vec![1.0], vec![0.0]);
        assert!(lp.is_ok());
    }

    #[test]
    fn test_builder_le_rows_are_negated() {
        let mut builder = ProgramBuilder::new();
        let x = builder.add_binary(1.0);
        let y = builder.add_column(0.0, 0.0, f64::INFINITY, false);
        builder.add_le(&[(x, 2.0), (y, 1.0)], 3.0);
        builder.add_eq(&[(y, 1.0)], 1.0);
        let lp = builder.build();
        lp.validate().unwrap();

        assert_eq!(lp.row_terms(0), vec![(0, -2.0), (1, -1.0)]);
        assert_eq!(lp.rhs[0], -3.0);
        assert_eq!(lp.senses[1], RowSense::Equal);
        assert!(lp.is_feasible(&[1.0, 1.0], 1e-9));
        assert!(!lp.is_feasible(&[1.0, 2.0], 1e-9));
        assert!(lp.row_within(0, 2));
        assert!(!lp.row_within(0, 1));
    }

    #[test]
    fn test_from_program_round_trips_rows() {
        let lp = LinearProgram::from_dense(
            vec![1.0, 1.0],
            0.0,
            &[vec![1.0, 0.0], vec![0.0, 3.0]],
            vec![1.0, 2.0],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
        )
        .unwrap();
        let mut builder = ProgramBuilder::from_program(&lp);
        builder.add_ge(&[(0, 1.0), (1, 1.0)], 1.0);
        let extended = builder.build();
        assert_eq!(extended.num_rows(), 3);
        assert_eq!(extended.row_terms(1), vec![(1, 3.0)]);
        assert_eq!(extended.row_terms(2), vec![(0, 1.0), (1, 1.0)]);
    }
}
