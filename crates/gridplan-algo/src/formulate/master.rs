//! Multistage investment master problem
//!
//! Decides which candidate lines, substations and generators are in service
//! at each stage. Connectivity of the expanded network is enforced with a
//! fictitious single-commodity flow: every loaded bus consumes one unit that
//! substations must deliver over built lines. Operating cost enters through
//! one `θ[stage, scenario]` column per operating point, bounded from below by
//! Benders cuts.

use super::{AssetKind, AssetRef, InvestmentPlan};
use crate::blocks::{Block, BlockLayout};
use crate::branch_bound::{BranchAndBound, SearchStatus};
use crate::error::{PlanError, PlanResult};
use crate::oracle::LpOracle;
use crate::program::{LinearProgram, ProgramBuilder};
use crate::relax::BendersCut;
use gridplan_core::{capital_recovery_factor, stage_present_worth, BusId, PlanningCase, Topology};
use tracing::{debug, warn};

/// Master problem with the cuts added so far.
#[derive(Debug, Clone)]
pub struct MasterModel {
    builder: ProgramBuilder,
    layout: BlockLayout,
    stages: usize,
    scenarios: usize,
    /// Candidate position of each case line (`None` for existing lines)
    line_slot: Vec<Option<usize>>,
    sub_slot: Vec<Option<usize>>,
    n_lines: usize,
    n_subs: usize,
    n_gens: usize,
    present_worth: Vec<f64>,
    cuts: Vec<BendersCut>,
}

/// Incumbent of the master problem.
#[derive(Debug, Clone)]
pub struct MasterSolution {
    pub plan: InvestmentPlan,
    /// `theta[t][s]`: operating cost estimate of stage `t`, scenario `s`
    pub theta: Vec<Vec<f64>>,
    /// Investment plus discounted `θ`; a lower bound on the plan cost only
    /// when the search proved it optimal
    pub objective: f64,
    /// Discounted investment part of the objective
    pub investment_cost: f64,
    pub status: SearchStatus,
    pub nodes_explored: usize,
}

impl MasterSolution {
    /// Objective as a bound on the optimal plan cost; `None` when the search
    /// stopped at a limit and the incumbent may not be optimal
    pub fn lower_bound(&self) -> Option<f64> {
        (self.status == SearchStatus::IntegerOptimal).then_some(self.objective)
    }
}

fn candidate_slots(flags: impl Iterator<Item = bool>) -> (Vec<Option<usize>>, usize) {
    let mut next = 0;
    let slots = flags
        .map(|candidate| {
            candidate.then(|| {
                next += 1;
                next - 1
            })
        })
        .collect();
    (slots, next)
}

impl MasterModel {
    pub fn formulate(case: &PlanningCase, topology: &Topology) -> PlanResult<Self> {
        let params = &case.params;
        let stages = case.num_stages();
        let scenarios = case.num_scenarios();
        if stages == 0 || scenarios == 0 {
            return Err(PlanError::InvalidCase(
                "master problem needs at least one stage and one scenario".into(),
            ));
        }
        let n_bus = case.buses.len();
        let n_lines = case.lines.len();
        let n_subs = case.substations.len();
        let n_gens = case.generators.len();

        let (line_slot, cand_lines) = candidate_slots(case.lines.iter().map(|l| l.is_candidate()));
        let (sub_slot, cand_subs) =
            candidate_slots(case.substations.iter().map(|s| s.is_candidate()));

        let mut layout = BlockLayout::new();
        let line_build = layout.push("line_build", cand_lines * stages);
        let sub_build = layout.push("substation_build", cand_subs * stages);
        let gen_build = layout.push("generator_build", n_gens * stages);
        let line_flow = layout.push("line_flow", n_lines * stages);
        let sub_flow = layout.push("substation_flow", n_subs * stages);
        layout.push("theta", stages * scenarios);

        let rate = params.interest_rate;
        let present_worth: Vec<f64> = (0..stages)
            .map(|t| stage_present_worth(rate, t, params.years_per_stage))
            .collect();
        let line_crf = capital_recovery_factor(rate, params.line_life_years);
        let sub_crf = capital_recovery_factor(rate, params.substation_life_years);
        let gen_crf = capital_recovery_factor(rate, params.generator_life_years);

        let mut builder = ProgramBuilder::new();
        for &pw in &present_worth {
            for line in case.candidate_lines() {
                builder.add_binary(pw * line_crf * line.investment_cost);
            }
        }
        for &pw in &present_worth {
            for sub in case.candidate_substations() {
                builder.add_binary(pw * sub_crf * sub.investment_cost);
            }
        }
        for &pw in &present_worth {
            for gen in &case.generators {
                builder.add_binary(pw * gen_crf * gen.investment_cost);
            }
        }
        // One unit per loaded bus is the most any fictitious flow carries
        let flow_cap = n_bus as f64;
        for _ in 0..stages * n_lines {
            builder.add_column(0.0, -flow_cap, flow_cap, false);
        }
        for _ in 0..stages * n_subs {
            builder.add_column(0.0, 0.0, flow_cap, false);
        }
        for &pw in &present_worth {
            for _ in 0..scenarios {
                builder.add_column(pw, 0.0, f64::INFINITY, false);
            }
        }
        debug_assert_eq!(builder.num_columns(), layout.total());

        let line_col = |slot: usize, t: usize| line_build.at(t * cand_lines + slot);
        let sub_col = |slot: usize, t: usize| sub_build.at(t * cand_subs + slot);
        let gen_col = |g: usize, t: usize| gen_build.at(t * n_gens + g);

        // Built assets stay built
        for t in 0..stages.saturating_sub(1) {
            for c in 0..cand_lines {
                builder.add_le(&[(line_col(c, t), 1.0), (line_col(c, t + 1), -1.0)], 0.0);
            }
            for c in 0..cand_subs {
                builder.add_le(&[(sub_col(c, t), 1.0), (sub_col(c, t + 1), -1.0)], 0.0);
            }
            for g in 0..n_gens {
                builder.add_le(&[(gen_col(g, t), 1.0), (gen_col(g, t + 1), -1.0)], 0.0);
            }
        }

        for t in 0..stages {
            // A line into a new substation's bus needs the substation
            for (s, sub) in case.substations.iter().enumerate() {
                let Some(sub_pos) = sub_slot[s] else {
                    continue;
                };
                for l in topology.incident_lines(sub.bus) {
                    if let Some(line_pos) = line_slot[l.value()] {
                        builder.add_le(
                            &[(line_col(line_pos, t), 1.0), (sub_col(sub_pos, t), -1.0)],
                            0.0,
                        );
                    }
                }
            }

            // No new lines into buses that are empty at this stage
            for (b, bus) in case.buses.iter().enumerate() {
                let bus_id = BusId::new(b);
                if bus.is_loaded(t) || topology.has_substation(bus_id) {
                    continue;
                }
                for l in topology.incident_lines(bus_id) {
                    if let Some(line_pos) = line_slot[l.value()] {
                        builder.set_bounds(line_col(line_pos, t), 0.0, 0.0);
                    }
                }
            }

            // Fictitious flow only on lines and substations in service
            for (l, slot) in line_slot.iter().enumerate() {
                if let Some(pos) = slot {
                    let f = line_flow.at(t * n_lines + l);
                    let x = line_col(*pos, t);
                    builder.add_le(&[(f, 1.0), (x, -flow_cap)], 0.0);
                    builder.add_le(&[(f, -1.0), (x, -flow_cap)], 0.0);
                }
            }
            for (s, slot) in sub_slot.iter().enumerate() {
                if let Some(pos) = slot {
                    let f = sub_flow.at(t * n_subs + s);
                    builder.add_le(&[(f, 1.0), (sub_col(*pos, t), -flow_cap)], 0.0);
                }
            }

            // Fictitious flow balance: each loaded bus absorbs one unit
            for (b, bus) in case.buses.iter().enumerate() {
                let mut terms = Vec::new();
                for l in &topology.lines_head[b] {
                    terms.push((line_flow.at(t * n_lines + l.value()), 1.0));
                }
                for l in &topology.lines_tail[b] {
                    terms.push((line_flow.at(t * n_lines + l.value()), -1.0));
                }
                for s in &topology.substations[b] {
                    terms.push((sub_flow.at(t * n_subs + s.value()), -1.0));
                }
                let absorbed = if bus.is_loaded(t) { 1.0 } else { 0.0 };
                builder.add_eq(&terms, -absorbed);
            }
        }

        debug!(
            stages,
            scenarios,
            columns = builder.num_columns(),
            rows = builder.num_rows(),
            "master problem formulated"
        );

        Ok(Self {
            builder,
            layout,
            stages,
            scenarios,
            line_slot,
            sub_slot,
            n_lines,
            n_subs,
            n_gens,
            present_worth,
            cuts: Vec::new(),
        })
    }

    fn block(&self, name: &str) -> PlanResult<&Block> {
        self.layout.require(name)
    }

    /// Column of an asset's build decision at `stage`, if it has one
    pub fn column(&self, asset: AssetRef, stage: usize) -> Option<usize> {
        if stage >= self.stages {
            return None;
        }
        let (name, slot, per_stage) = match asset.kind {
            AssetKind::Line => (
                "line_build",
                self.line_slot.get(asset.index).copied().flatten()?,
                self.line_slot.iter().flatten().count(),
            ),
            AssetKind::Substation => (
                "substation_build",
                self.sub_slot.get(asset.index).copied().flatten()?,
                self.sub_slot.iter().flatten().count(),
            ),
            AssetKind::Generator => {
                if asset.index >= self.n_gens {
                    return None;
                }
                ("generator_build", asset.index, self.n_gens)
            }
        };
        self.layout
            .get(name)
            .map(|block| block.at(stage * per_stage + slot))
    }

    /// Column of `θ[stage, scenario]`
    pub fn theta_column(&self, stage: usize, scenario: usize) -> Option<usize> {
        if stage >= self.stages || scenario >= self.scenarios {
            return None;
        }
        self.layout
            .get("theta")
            .map(|block| block.at(stage * self.scenarios + scenario))
    }

    /// Append `θ[t,s] + Σ coef·x[asset, t] ≥ rhs`
    pub fn add_cut(&mut self, cut: BendersCut) -> PlanResult<usize> {
        let theta = self.theta_column(cut.stage, cut.scenario).ok_or_else(|| {
            PlanError::DimensionMismatch(format!(
                "cut for stage {} scenario {} outside the master horizon",
                cut.stage, cut.scenario
            ))
        })?;
        let mut terms = vec![(theta, 1.0)];
        for &(asset, coef) in &cut.coefficients {
            let column = self.column(asset, cut.stage).ok_or_else(|| {
                PlanError::DimensionMismatch(format!(
                    "cut references {asset}, which has no build decision"
                ))
            })?;
            terms.push((column, coef));
        }
        let row = self.builder.add_ge(&terms, cut.rhs);
        self.cuts.push(cut);
        Ok(row)
    }

    pub fn cuts(&self) -> &[BendersCut] {
        &self.cuts
    }

    pub fn program(&self) -> LinearProgram {
        self.builder.clone().build()
    }

    pub fn present_worth(&self, stage: usize) -> f64 {
        self.present_worth.get(stage).copied().unwrap_or(0.0)
    }

    /// Solve the master with the cuts added so far
    pub fn solve<O: LpOracle + ?Sized>(
        &self,
        search: &BranchAndBound<'_, O>,
    ) -> PlanResult<MasterSolution> {
        let program = self.program();
        let result = search.solve(&program)?;
        let Some(incumbent) = result.incumbent else {
            return Err(PlanError::OracleInfeasible(format!(
                "master problem has no feasible investment plan ({})",
                result.status
            )));
        };
        if result.status == SearchStatus::LimitReached {
            warn!(
                nodes = result.nodes_explored,
                "master search stopped at its limit, using best plan found without a lower bound"
            );
        }

        let x = &incumbent.solution;
        let mut plan = InvestmentPlan {
            lines: vec![vec![false; self.n_lines]; self.stages],
            substations: vec![vec![false; self.n_subs]; self.stages],
            generators: vec![vec![false; self.n_gens]; self.stages],
        };
        let assets = (0..self.n_lines)
            .map(AssetRef::line)
            .chain((0..self.n_subs).map(AssetRef::substation))
            .chain((0..self.n_gens).map(AssetRef::generator));
        for asset in assets {
            for t in 0..self.stages {
                if let Some(col) = self.column(asset, t) {
                    plan.set(asset, t, x[col] > 0.5);
                }
            }
        }

        let mut theta = vec![vec![0.0; self.scenarios]; self.stages];
        let mut operating = 0.0;
        for (t, row) in theta.iter_mut().enumerate() {
            for (s, value) in row.iter_mut().enumerate() {
                if let Some(col) = self.theta_column(t, s) {
                    *value = x[col];
                    operating += program.cost[col] * x[col];
                }
            }
        }

        let build_end = self.block("generator_build")?.range().end;
        let investment_cost = (0..build_end).map(|j| program.cost[j] * x[j]).sum();

        debug!(
            objective = incumbent.objective,
            operating,
            nodes = result.nodes_explored,
            "master solved"
        );

        Ok(MasterSolution {
            plan,
            theta,
            objective: incumbent.objective,
            investment_cost,
            status: result.status,
            nodes_explored: result.nodes_explored,
        })
    }
}
