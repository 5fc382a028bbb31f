//! Dual bundles, 0/1 relaxations and Benders cuts
//!
//! After the operational MILP of a (stage, scenario) is solved, its binary
//! assignment `y₀` is fixed and the continuous program re-solved. The duals
//! of the fixing rows give the marginal cost `λ` of each binary. The 0/1
//! relaxation then prices a configuration `y` as
//!
//! ```text
//! λ·y + (z(y₀) − λ·y₀)
//! ```
//!
//! which equals `z(y₀)` at `y₀`, subject to the operational model's own
//! structural rows. Equality rows are split into two `≥` rows so the
//! relaxation is a plain `A·y ≥ b` program. Its optimum, together with the
//! duals of its pinning rows, yields a cut on the master's `θ` column.

use crate::blocks::BlockLayout;
use crate::branch_bound::BranchBoundResult;
use crate::error::{PlanError, PlanResult};
use crate::formulate::{AssetRef, InvestmentPlan, OperationalModel, PinningRow};
use crate::oracle::{LpOracle, LpStatus};
use crate::program::{LinearProgram, ProgramBuilder, RowSense};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Marginal cost of each binary of an operational model at a fixed assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct DualBundle {
    /// Binary block layout shared with the operational model
    pub layout: BlockLayout,
    /// Assignment `y₀` the marginals were taken at
    pub assignment: Vec<f64>,
    /// `λ_i = ∂z/∂y₀_i`
    pub marginals: Vec<f64>,
    /// `z(y₀)`
    pub objective: f64,
}

impl DualBundle {
    /// Collect the marginals from the duals of the fixing rows.
    pub fn from_fixing_duals(
        layout: BlockLayout,
        assignment: Vec<f64>,
        duals: &[f64],
        fixing_rows: &[usize],
        objective: f64,
    ) -> PlanResult<Self> {
        let n = layout.total();
        if assignment.len() != n || fixing_rows.len() != n {
            return Err(PlanError::DimensionMismatch(format!(
                "dual bundle over {} binaries got {} values and {} fixing rows",
                n,
                assignment.len(),
                fixing_rows.len()
            )));
        }
        let marginals = fixing_rows
            .iter()
            .map(|&row| {
                duals.get(row).copied().ok_or_else(|| {
                    PlanError::DimensionMismatch(format!(
                        "fixing row {row} outside {} duals",
                        duals.len()
                    ))
                })
            })
            .collect::<PlanResult<Vec<f64>>>()?;

        Ok(Self {
            layout,
            assignment,
            marginals,
            objective,
        })
    }

    /// Fix `assignment` in `model`, re-solve and collect the marginals
    pub fn price<O: LpOracle + ?Sized>(
        oracle: &O,
        model: &OperationalModel,
        assignment: &[f64],
    ) -> PlanResult<Self> {
        let (fixed, rows) = model.fixed_program(assignment)?;
        let outcome = oracle.solve(&fixed)?;
        match outcome.status {
            LpStatus::Optimal => {}
            LpStatus::Infeasible => {
                return Err(PlanError::OracleInfeasible(format!(
                    "stage {} scenario {}: fixed-binary program is infeasible",
                    model.stage, model.scenario
                )))
            }
            LpStatus::Unbounded => {
                return Err(PlanError::OracleUnbounded(format!(
                    "stage {} scenario {}: fixed-binary program is unbounded",
                    model.stage, model.scenario
                )))
            }
        }
        Self::from_fixing_duals(
            model.binary_layout.clone(),
            assignment.to_vec(),
            &outcome.duals,
            &rows,
            outcome.objective,
        )
    }

    /// Marginals of one named block
    pub fn block(&self, name: &str) -> PlanResult<&[f64]> {
        let block = self.layout.require(name)?;
        Ok(&self.marginals[block.range()])
    }
}

/// Canonical 0/1 program built from a dual bundle.
#[derive(Debug, Clone)]
pub struct Relaxation {
    pub stage: usize,
    pub scenario: usize,
    pub program: LinearProgram,
    pub layout: BlockLayout,
    /// Pinning rows, renumbered into `program`
    pub pinning: Vec<PinningRow>,
    /// Assignment the bundle was taken at
    pub reference: Vec<f64>,
}

/// Build the 0/1 relaxation of `model` priced by `bundle`.
pub fn build_relaxation(model: &OperationalModel, bundle: &DualBundle) -> PlanResult<Relaxation> {
    if bundle.layout != model.binary_layout {
        return Err(PlanError::DimensionMismatch(
            "dual bundle layout differs from the operational model's binary blocks".into(),
        ));
    }
    let nb = model.binary_len();

    let mut builder = ProgramBuilder::new();
    for &lambda in &bundle.marginals {
        builder.add_binary(lambda);
    }
    let shift: f64 = bundle
        .marginals
        .iter()
        .zip(&bundle.assignment)
        .map(|(l, y)| l * y)
        .sum();
    builder.set_offset(bundle.objective - shift);

    let mut renumbered = vec![None; model.program.num_rows()];
    for i in 0..model.program.num_rows() {
        if !model.program.row_within(i, nb) {
            continue;
        }
        let terms = model.program.row_terms(i);
        let rhs = model.program.rhs[i];
        renumbered[i] = Some(builder.add_ge(&terms, rhs));
        if model.program.senses[i] == RowSense::Equal {
            builder.add_le(&terms, rhs);
        }
    }
    let pinning = model
        .pinning
        .iter()
        .filter_map(|pin| {
            renumbered[pin.row].map(|row| PinningRow {
                row,
                asset: pin.asset,
                investment: pin.investment,
            })
        })
        .collect();

    let program = builder.build();
    debug!(
        stage = model.stage,
        scenario = model.scenario,
        columns = program.num_columns(),
        rows = program.num_rows(),
        "relaxation built"
    );

    Ok(Relaxation {
        stage: model.stage,
        scenario: model.scenario,
        program,
        layout: bundle.layout.clone(),
        pinning,
        reference: bundle.assignment.clone(),
    })
}

/// Optimality cut `θ[stage, scenario] + Σ coef·x[asset, stage] ≥ rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BendersCut {
    pub stage: usize,
    pub scenario: usize,
    pub rhs: f64,
    pub coefficients: Vec<(AssetRef, f64)>,
    /// Optimum of the relaxation the cut was derived from
    pub relaxation_objective: f64,
}

impl BendersCut {
    /// Left-hand side at a master point
    pub fn evaluate(&self, theta: f64, plan: &InvestmentPlan) -> f64 {
        theta
            + self
                .coefficients
                .iter()
                .map(|&(asset, coef)| coef * plan.value(asset, self.stage))
                .sum::<f64>()
    }

    /// How far a master point falls short of the cut (positive if violated)
    pub fn violation(&self, theta: f64, plan: &InvestmentPlan) -> f64 {
        self.rhs - self.evaluate(theta, plan)
    }
}

/// Derive a cut from the search over `relaxation`.
///
/// With `z*` the relaxation optimum and `u_k ≥ 0` the duals of the pinning
/// rows at the node that produced it, the cut reads
/// `θ ≥ z* − Σ u_k (x_k − x̂_k)`. Returns `None` unless the search proved its
/// incumbent optimal: the objective of a search stopped at a limit only
/// bounds `z*` from above.
pub fn synthesize_cut(relaxation: &Relaxation, result: &BranchBoundResult) -> Option<BendersCut> {
    if !result.is_optimal() {
        return None;
    }
    let incumbent = result.incumbent.as_ref()?;
    let duals = result.incumbent_duals().unwrap_or(&[]);

    let mut rhs = incumbent.objective;
    let mut coefficients = Vec::new();
    for pin in &relaxation.pinning {
        let u = duals.get(pin.row).copied().unwrap_or(0.0).max(0.0);
        if u == 0.0 {
            continue;
        }
        rhs += u * pin.investment;
        coefficients.push((pin.asset, u));
    }

    Some(BendersCut {
        stage: relaxation.stage,
        scenario: relaxation.scenario,
        rhs,
        coefficients,
        relaxation_objective: incumbent.objective,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch_bound::{
        BranchAndBound, BranchBoundConfig, Incumbent, NodeOutcome, NodeRecord, SearchStatus,
    };
    use crate::oracle::ClarabelOracle;
    use crate::test_utils::{feeder_case, two_bus_case};
    use gridplan_core::Topology;
    use std::time::Duration;

    fn two_bus_model() -> OperationalModel {
        let case = two_bus_case();
        let topology = Topology::new(&case);
        let plan = InvestmentPlan::empty(&case);
        OperationalModel::formulate(&case, &topology, 0, 0, &plan).unwrap()
    }

    #[test]
    fn test_bundle_length_checks() {
        let mut layout = BlockLayout::new();
        layout.push("line", 2);
        let err =
            DualBundle::from_fixing_duals(layout.clone(), vec![1.0], &[0.0, 0.0], &[0, 1], 0.0)
                .unwrap_err();
        assert!(matches!(err, PlanError::DimensionMismatch(_)));

        let err = DualBundle::from_fixing_duals(layout, vec![1.0, 0.0], &[0.0], &[0, 1], 0.0)
            .unwrap_err();
        assert!(matches!(err, PlanError::DimensionMismatch(_)));
    }

    #[test]
    fn test_relaxation_reproduces_reference_objective() {
        let model = two_bus_model();
        let assignment = vec![1.0, 1.0, 0.0, 1.0];
        let bundle = DualBundle::price(&ClarabelOracle::new(), &model, &assignment).unwrap();
        assert_eq!(bundle.marginals.len(), 4);
        assert_eq!(bundle.block("substation").unwrap().len(), 1);

        let relaxation = build_relaxation(&model, &bundle).unwrap();
        assert_eq!(relaxation.program.num_columns(), 4);
        let structural = model.structural_rows();
        let equalities = structural
            .iter()
            .filter(|&&i| model.program.senses[i] == RowSense::Equal)
            .count();
        assert!(equalities > 0);
        assert_eq!(relaxation.program.num_rows(), structural.len() + equalities);
        assert!(relaxation
            .program
            .senses
            .iter()
            .all(|&sense| sense == RowSense::GreaterEqual));
        let at_reference = relaxation.program.objective_value(&assignment);
        assert!((at_reference - bundle.objective).abs() < 1e-6 * bundle.objective.abs().max(1.0));
        assert!(relaxation.program.is_feasible(&assignment, 1e-9));
    }

    #[test]
    fn test_relaxation_reads_back_as_dense_program() {
        let model = two_bus_model();
        let assignment = vec![1.0, 1.0, 0.0, 1.0];
        let oracle = ClarabelOracle::new();
        let bundle = DualBundle::price(&oracle, &model, &assignment).unwrap();
        let program = build_relaxation(&model, &bundle).unwrap().program;

        let matrix: Vec<Vec<f64>> = (0..program.num_rows())
            .map(|i| {
                let mut row = vec![0.0; program.num_columns()];
                for (j, value) in program.row_terms(i) {
                    row[j] += value;
                }
                row
            })
            .collect();
        let reread = LinearProgram::from_dense(
            program.cost.clone(),
            program.offset,
            &matrix,
            program.rhs.clone(),
            program.lower.clone(),
            program.upper.clone(),
        )
        .unwrap();

        let search = BranchAndBound::new(&oracle, BranchBoundConfig::default());
        let original = search.solve(&program).unwrap();
        let dense = search.solve(&reread).unwrap();
        assert_eq!(original.status, SearchStatus::IntegerOptimal);
        assert_eq!(original.solution(), dense.solution());
        assert_eq!(original.objective(), dense.objective());
    }

    #[test]
    fn test_relaxation_rejects_foreign_layout() {
        let model = two_bus_model();
        let mut layout = BlockLayout::new();
        layout.push("line", 4);
        let bundle = DualBundle {
            layout,
            assignment: vec![0.0; 4],
            marginals: vec![0.0; 4],
            objective: 0.0,
        };
        let err = build_relaxation(&model, &bundle).unwrap_err();
        assert!(matches!(err, PlanError::DimensionMismatch(_)));
    }

    #[test]
    fn test_relaxation_search_bounds_operational_cost() {
        let case = feeder_case();
        let topology = Topology::new(&case);
        let mut plan = InvestmentPlan::empty(&case);
        plan.set(AssetRef::line(3), 1, true);
        let model = OperationalModel::formulate(&case, &topology, 1, 0, &plan).unwrap();

        let oracle = ClarabelOracle::new();
        let search = BranchAndBound::new(&oracle, BranchBoundConfig::default());
        let operational = model.solve(&search).unwrap();
        let bundle = DualBundle::price(&oracle, &model, &operational.assignment).unwrap();
        let relaxation = build_relaxation(&model, &bundle).unwrap();
        // Candidate lines 2, 3, 4 and the generator
        assert_eq!(relaxation.pinning.len(), 4);

        let result = search.solve(&relaxation.program).unwrap();
        assert_eq!(result.status, SearchStatus::IntegerOptimal);
        let z = result.objective().unwrap();
        let tol = 1e-4 * operational.objective.abs().max(1.0);
        assert!(z <= operational.objective + tol, "{z} > {}", operational.objective);

        let cut = synthesize_cut(&relaxation, &result).unwrap();
        assert_eq!((cut.stage, cut.scenario), (1, 0));
        assert!(cut.coefficients.iter().all(|&(_, u)| u > 0.0));
        // The cut is tight at the plan it was derived from
        assert!(cut.violation(z, &plan).abs() < 1e-6 * z.abs().max(1.0));
    }

    fn result_with(duals: Vec<f64>, objective: f64) -> BranchBoundResult {
        BranchBoundResult {
            status: SearchStatus::IntegerOptimal,
            incumbent: Some(Incumbent {
                solution: vec![1.0, 0.0],
                objective,
                node: 0,
            }),
            trace: vec![NodeRecord {
                depth: 0,
                duals,
                feasible: true,
                fixed_to_zero: Vec::new(),
                fixed_to_one: Vec::new(),
                relaxed_objective: objective,
                incumbent_objective: f64::INFINITY,
                outcome: NodeOutcome::Integral,
            }],
            nodes_explored: 1,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_cut_coefficients_from_pinning_duals() {
        let relaxation = Relaxation {
            stage: 1,
            scenario: 0,
            program: LinearProgram::from_dense(
                vec![0.0, 0.0],
                0.0,
                &[],
                vec![],
                vec![0.0; 2],
                vec![1.0; 2],
            )
            .unwrap(),
            layout: BlockLayout::new(),
            pinning: vec![
                PinningRow {
                    row: 0,
                    asset: AssetRef::line(2),
                    investment: 1.0,
                },
                PinningRow {
                    row: 1,
                    asset: AssetRef::generator(0),
                    investment: 0.0,
                },
                PinningRow {
                    row: 2,
                    asset: AssetRef::line(4),
                    investment: 0.0,
                },
            ],
            reference: vec![1.0, 0.0],
        };
        // Row 2 carries a slightly negative interior-point dual
        let result = result_with(vec![5.0, 3.0, -1e-10], 100.0);
        let cut = synthesize_cut(&relaxation, &result).unwrap();

        assert_eq!(cut.rhs, 105.0);
        assert_eq!(
            cut.coefficients,
            vec![(AssetRef::line(2), 5.0), (AssetRef::generator(0), 3.0)]
        );
        assert_eq!(cut.relaxation_objective, 100.0);

        let mut case_plan = InvestmentPlan::empty(&feeder_case());
        case_plan.set(AssetRef::line(2), 1, true);
        // θ = 100 at the reference point satisfies the cut with equality
        assert_eq!(cut.violation(100.0, &case_plan), 0.0);
        // Dropping line 2 raises the bound by its dual
        assert_eq!(cut.violation(100.0, &InvestmentPlan::empty(&feeder_case())), 5.0);
    }

    #[test]
    fn test_no_cut_without_incumbent() {
        let relaxation = Relaxation {
            stage: 0,
            scenario: 0,
            program: LinearProgram::from_dense(vec![0.0], 0.0, &[], vec![], vec![0.0], vec![1.0])
                .unwrap(),
            layout: BlockLayout::new(),
            pinning: Vec::new(),
            reference: vec![0.0],
        };
        let mut result = result_with(Vec::new(), 0.0);
        result.incumbent = None;
        result.status = SearchStatus::Infeasible;
        assert!(synthesize_cut(&relaxation, &result).is_none());
    }

    #[test]
    fn test_no_cut_from_stopped_search() {
        // min -x0 - 3x1 with x0 + x1 ≤ 1.5: the optimum -3 sits in the floor
        // subtree of x0, which a four-node search never reaches
        let program = LinearProgram::from_dense(
            vec![-1.0, -3.0],
            0.0,
            &[vec![-1.0, -1.0]],
            vec![-1.5],
            vec![0.0; 2],
            vec![1.0; 2],
        )
        .unwrap();
        let relaxation = Relaxation {
            stage: 0,
            scenario: 0,
            program,
            layout: BlockLayout::new(),
            pinning: Vec::new(),
            reference: vec![0.0, 0.0],
        };
        let config = BranchBoundConfig {
            max_nodes: Some(4),
            ..Default::default()
        };
        let oracle = ClarabelOracle::new();
        let stopped = BranchAndBound::new(&oracle, config)
            .solve(&relaxation.program)
            .unwrap();
        assert_eq!(stopped.status, SearchStatus::LimitReached);
        assert!(synthesize_cut(&relaxation, &stopped).is_none());

        let full = BranchAndBound::new(&oracle, BranchBoundConfig::default())
            .solve(&relaxation.program)
            .unwrap();
        let cut = synthesize_cut(&relaxation, &full).unwrap();
        assert!((cut.rhs + 3.0).abs() < 1e-6, "{}", cut.rhs);
    }
}
