//! Master and operational model formulators
//!
//! The master problem decides which candidate assets are in service at each
//! stage. The operational model, one per (stage, scenario), decides how the
//! network is configured and dispatched given those decisions. Both produce
//! [`LinearProgram`](crate::program::LinearProgram)s with a mixed integrality
//! mask, solved by the same branch-and-bound search.

mod master;
mod operation;

pub use master::{MasterModel, MasterSolution};
pub use operation::{OperationalModel, OperationalSolution, PinningRow};

use gridplan_core::{capital_recovery_factor, stage_present_worth, PlanningCase};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of an investable asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Line,
    Substation,
    Generator,
}

/// An asset of a planning case, by kind and position in the case lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetRef {
    pub kind: AssetKind,
    pub index: usize,
}

impl AssetRef {
    pub fn line(index: usize) -> Self {
        Self {
            kind: AssetKind::Line,
            index,
        }
    }

    pub fn substation(index: usize) -> Self {
        Self {
            kind: AssetKind::Substation,
            index,
        }
    }

    pub fn generator(index: usize) -> Self {
        Self {
            kind: AssetKind::Generator,
            index,
        }
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AssetKind::Line => write!(f, "line {}", self.index),
            AssetKind::Substation => write!(f, "substation {}", self.index),
            AssetKind::Generator => write!(f, "generator {}", self.index),
        }
    }
}

/// Build decisions of every candidate asset at every stage.
///
/// Entries of existing lines and substations stay `false`: they are in
/// service without an investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentPlan {
    /// `lines[t][l]`: candidate line `l` is in service at stage `t`
    pub lines: Vec<Vec<bool>>,
    pub substations: Vec<Vec<bool>>,
    pub generators: Vec<Vec<bool>>,
}

impl InvestmentPlan {
    /// Plan that builds nothing
    pub fn empty(case: &PlanningCase) -> Self {
        let stages = case.num_stages();
        Self {
            lines: vec![vec![false; case.lines.len()]; stages],
            substations: vec![vec![false; case.substations.len()]; stages],
            generators: vec![vec![false; case.generators.len()]; stages],
        }
    }

    pub fn num_stages(&self) -> usize {
        self.lines.len()
    }

    fn slot(&self, asset: AssetRef, stage: usize) -> Option<&bool> {
        let per_stage = match asset.kind {
            AssetKind::Line => &self.lines,
            AssetKind::Substation => &self.substations,
            AssetKind::Generator => &self.generators,
        };
        per_stage.get(stage).and_then(|row| row.get(asset.index))
    }

    /// Whether a candidate is built by `stage`
    pub fn is_built(&self, asset: AssetRef, stage: usize) -> bool {
        self.slot(asset, stage).copied().unwrap_or(false)
    }

    /// Build decision as a 0/1 value
    pub fn value(&self, asset: AssetRef, stage: usize) -> f64 {
        if self.is_built(asset, stage) {
            1.0
        } else {
            0.0
        }
    }

    pub fn set(&mut self, asset: AssetRef, stage: usize, built: bool) {
        let per_stage = match asset.kind {
            AssetKind::Line => &mut self.lines,
            AssetKind::Substation => &mut self.substations,
            AssetKind::Generator => &mut self.generators,
        };
        if let Some(slot) = per_stage.get_mut(stage).and_then(|row| row.get_mut(asset.index)) {
            *slot = built;
        }
    }

    /// Whether an asset may operate at `stage`: existing, or a built candidate
    pub fn in_service(&self, case: &PlanningCase, asset: AssetRef, stage: usize) -> bool {
        let existing = match asset.kind {
            AssetKind::Line => case.lines.get(asset.index).map(|l| l.existing),
            AssetKind::Substation => case.substations.get(asset.index).map(|s| s.existing),
            AssetKind::Generator => Some(false),
        };
        existing.unwrap_or(false) || self.is_built(asset, stage)
    }

    /// Candidates first built at `stage`
    pub fn new_assets(&self, stage: usize) -> Vec<AssetRef> {
        let mut assets = Vec::new();
        let mut collect = |kind: AssetKind, per_stage: &[Vec<bool>]| {
            let Some(now) = per_stage.get(stage) else {
                return;
            };
            for (index, &built) in now.iter().enumerate() {
                let before = stage > 0 && per_stage[stage - 1][index];
                if built && !before {
                    assets.push(AssetRef { kind, index });
                }
            }
        };
        collect(AssetKind::Line, &self.lines);
        collect(AssetKind::Substation, &self.substations);
        collect(AssetKind::Generator, &self.generators);
        assets
    }

    /// Discounted annualized investment cost of the plan.
    ///
    /// A built candidate pays its annuity `CRF(life)·cost` in every year of
    /// every stage it is in service, discounted to present value.
    pub fn investment_cost(&self, case: &PlanningCase) -> f64 {
        let params = &case.params;
        let line_crf = capital_recovery_factor(params.interest_rate, params.line_life_years);
        let sub_crf = capital_recovery_factor(params.interest_rate, params.substation_life_years);
        let gen_crf = capital_recovery_factor(params.interest_rate, params.generator_life_years);

        let mut total = 0.0;
        for t in 0..self.num_stages() {
            let pw = stage_present_worth(params.interest_rate, t, params.years_per_stage);
            let mut annual = 0.0;
            for (l, line) in case.lines.iter().enumerate() {
                if line.is_candidate() && self.is_built(AssetRef::line(l), t) {
                    annual += line_crf * line.investment_cost;
                }
            }
            for (s, sub) in case.substations.iter().enumerate() {
                if sub.is_candidate() && self.is_built(AssetRef::substation(s), t) {
                    annual += sub_crf * sub.investment_cost;
                }
            }
            for (g, gen) in case.generators.iter().enumerate() {
                if self.is_built(AssetRef::generator(g), t) {
                    annual += gen_crf * gen.investment_cost;
                }
            }
            total += pw * annual;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::feeder_case;

    #[test]
    fn test_empty_plan_costs_nothing() {
        let case = feeder_case();
        let plan = InvestmentPlan::empty(&case);
        assert_eq!(plan.num_stages(), case.num_stages());
        assert_eq!(plan.investment_cost(&case), 0.0);
        assert!(plan.new_assets(0).is_empty());
        // Existing lines operate without investment
        assert!(plan.in_service(&case, AssetRef::line(0), 0));
        assert!(!plan.in_service(&case, AssetRef::line(3), 0));
    }

    #[test]
    fn test_new_assets_and_cost() {
        let case = feeder_case();
        let mut plan = InvestmentPlan::empty(&case);
        plan.set(AssetRef::line(3), 1, true);

        assert!(plan.is_built(AssetRef::line(3), 1));
        assert_eq!(plan.value(AssetRef::line(3), 0), 0.0);
        assert_eq!(plan.new_assets(1), vec![AssetRef::line(3)]);

        let params = &case.params;
        let expected = stage_present_worth(params.interest_rate, 1, params.years_per_stage)
            * capital_recovery_factor(params.interest_rate, params.line_life_years)
            * case.lines[3].investment_cost;
        assert!((plan.investment_cost(&case) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_asset_is_not_built() {
        let case = feeder_case();
        let mut plan = InvestmentPlan::empty(&case);
        plan.set(AssetRef::generator(99), 0, true);
        assert!(!plan.is_built(AssetRef::generator(99), 0));
        assert_eq!(AssetRef::substation(2).to_string(), "substation 2");
    }
}
