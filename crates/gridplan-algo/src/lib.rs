//! # gridplan-algo: Logic-Based Benders Decomposition for Distribution Planning
//!
//! This crate splits multistage distribution planning into an investment
//! master problem and one operational subproblem per (stage, scenario), and
//! links them with cuts derived from LP duals.
//!
//! ## Pipeline
//!
//! | Step | Component | Output |
//! |------|-----------|--------|
//! | 1 | [`MasterModel`] | Investment plan and `θ` estimates |
//! | 2 | [`OperationalModel`] solved by [`BranchAndBound`] | Binary assignment `y₀` |
//! | 3 | [`DualBundle::price`] | Marginal cost of each binary at `y₀` |
//! | 4 | [`build_relaxation`] | Canonical 0/1 program |
//! | 5 | [`BranchAndBound`] + [`synthesize_cut`] | Benders cut for the master |
//!
//! [`Decomposition`] runs the pipeline until no violated cut remains.
//!
//! ### Architecture
//!
//! - **[`LinearProgram`]**: one canonical form (`min c·x + d`, `A x ≥ b`,
//!   bounds, integrality mask) for every model
//! - **[`LpOracle`]**: the LP kernel seam; [`ClarabelOracle`] is the
//!   interior-point implementation
//! - **[`BranchAndBound`]**: depth-first 0/1 search that keeps a trace of
//!   every node with its duals
//! - **[`BlockLayout`]**: named column blocks shared by the model that
//!   produces duals and the relaxation that consumes them
//!
//! ## Example
//!
//! ```ignore
//! use gridplan_algo::{Decomposition, DecompositionConfig};
//! use gridplan_core::PlanningCase;
//!
//! let case = PlanningCase::from_json_str(&std::fs::read_to_string("feeder.json")?)?;
//! let driver = Decomposition::with_clarabel(DecompositionConfig::default());
//! let solution = driver.run(&case)?;
//! println!("{}", solution.summary());
//! ```

pub mod blocks;
pub mod branch_bound;
pub mod driver;
pub mod error;
pub mod formulate;
pub mod oracle;
pub mod program;
pub mod relax;
pub mod solution;
pub mod test_utils;

pub use blocks::{Block, BlockLayout};
pub use branch_bound::{
    branch_and_bound, BranchAndBound, BranchBoundConfig, BranchBoundResult, Incumbent,
    NodeOutcome, NodeRecord, SearchStatus,
};
pub use driver::{Decomposition, DecompositionConfig};
pub use error::{PlanError, PlanResult};
pub use formulate::{
    AssetKind, AssetRef, InvestmentPlan, MasterModel, MasterSolution, OperationalModel,
    OperationalSolution, PinningRow,
};
pub use oracle::{ClarabelOracle, LpOracle, LpOutcome, LpStatus, NodeRelaxation, OracleSettings};
pub use program::{LinearProgram, ProgramBuilder, RowSense};
pub use relax::{build_relaxation, synthesize_cut, BendersCut, DualBundle, Relaxation};
pub use solution::{
    BuildDecision, DecompositionStatus, IterationSummary, PlanningSolution, ScenarioFailure,
    SubproblemOutcome,
};
