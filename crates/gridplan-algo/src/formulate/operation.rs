//! Operational model of one (stage, scenario)
//!
//! Columns, binary blocks first:
//!
//! | block              | size  | meaning                                   |
//! |--------------------|-------|-------------------------------------------|
//! | `line`             | L     | line closed                               |
//! | `flow_pos`         | L     | line closed, tail bus is the child        |
//! | `flow_neg`         | L     | line closed, head bus is the child        |
//! | `substation`       | S     | substation energized                      |
//! | `generator`        | G     | generator connected                       |
//! | `voltage`          | B·H   | squared bus voltage (kV²)                 |
//! | `line_flow`        | L·H   | active flow head → tail (MW)              |
//! | `substation_power` | S·H   | power purchased upstream (MW)             |
//! | `load_shed`        | B·H   | unserved load (MW)                        |
//! | `generation`       | G·H   | renewable output (MW)                     |
//! | `curtailment`      | G·H   | curtailed renewable availability (MW)     |
//!
//! Hourly blocks are hour-major: element `(h, k)` sits at `h·n + k`.
//!
//! Rows that only touch binary columns (pinning, radiality, direction) are
//! the structural rows copied into the 0/1 relaxation.

use super::{AssetRef, InvestmentPlan};
use crate::blocks::{Block, BlockLayout};
use crate::branch_bound::{BranchAndBound, SearchStatus};
use crate::error::{PlanError, PlanResult};
use crate::oracle::LpOracle;
use crate::program::{LinearProgram, ProgramBuilder};
use gridplan_core::{BusId, PlanningCase, Topology};
use tracing::{debug, warn};

/// Row pinning a binary to the master's decision for a candidate asset:
/// `−y ≥ −x̂`.
#[derive(Debug, Clone, PartialEq)]
pub struct PinningRow {
    pub row: usize,
    pub asset: AssetRef,
    /// Master decision `x̂` the row pins to
    pub investment: f64,
}

/// Operational MILP of one (stage, scenario) under a fixed investment plan.
#[derive(Debug, Clone)]
pub struct OperationalModel {
    pub stage: usize,
    pub scenario: usize,
    pub program: LinearProgram,
    /// Layout of every column
    pub layout: BlockLayout,
    /// Layout of the binary prefix
    pub binary_layout: BlockLayout,
    pub pinning: Vec<PinningRow>,
}

/// Incumbent of the operational MILP.
#[derive(Debug, Clone)]
pub struct OperationalSolution {
    /// Values of the binary prefix
    pub assignment: Vec<f64>,
    pub objective: f64,
    pub status: SearchStatus,
    pub nodes_explored: usize,
    /// Full primal point
    pub primal: Vec<f64>,
}

struct Columns {
    line: Block,
    pos: Block,
    neg: Block,
    sub: Block,
    gen: Block,
    voltage: Block,
    flow: Block,
    purchase: Block,
    shed: Block,
    output: Block,
    curtail: Block,
}

impl OperationalModel {
    pub fn formulate(
        case: &PlanningCase,
        topology: &Topology,
        stage: usize,
        scenario: usize,
        plan: &InvestmentPlan,
    ) -> PlanResult<Self> {
        let Some(sc) = case.scenarios.get(scenario) else {
            return Err(PlanError::InvalidCase(format!("no scenario {scenario}")));
        };
        if stage >= case.num_stages() {
            return Err(PlanError::InvalidCase(format!(
                "stage {stage} outside the {}-stage horizon",
                case.num_stages()
            )));
        }
        if plan.num_stages() != case.num_stages() {
            return Err(PlanError::DimensionMismatch(format!(
                "investment plan covers {} stages, case has {}",
                plan.num_stages(),
                case.num_stages()
            )));
        }

        let params = &case.params;
        let n_bus = case.buses.len();
        let n_line = case.lines.len();
        let n_sub = case.substations.len();
        let n_gen = case.generators.len();
        let hours = sc.hours();

        let mut layout = BlockLayout::new();
        let line = layout.push("line", n_line);
        let pos = layout.push("flow_pos", n_line);
        let neg = layout.push("flow_neg", n_line);
        let sub = layout.push("substation", n_sub);
        let gen = layout.push("generator", n_gen);
        let binary_layout = layout.clone();
        let cols = Columns {
            line,
            pos,
            neg,
            sub,
            gen,
            voltage: layout.push("voltage", n_bus * hours),
            flow: layout.push("line_flow", n_line * hours),
            purchase: layout.push("substation_power", n_sub * hours),
            shed: layout.push("load_shed", n_bus * hours),
            output: layout.push("generation", n_gen * hours),
            curtail: layout.push("curtailment", n_gen * hours),
        };

        let weight = sc.days;
        let line_cap: Vec<f64> = (0..n_line)
            .map(|l| case.lines[l].capacity(plan.is_built(AssetRef::line(l), stage)))
            .collect();
        let sub_cap: Vec<f64> = (0..n_sub)
            .map(|s| case.substations[s].capacity(plan.is_built(AssetRef::substation(s), stage)))
            .collect();
        let available = |g: usize, h: usize| {
            let gen = &case.generators[g];
            gen.capacity_mw * sc.availability(gen.kind, h)
        };
        let demand = |b: usize, h: usize| case.buses[b].load_at(stage) * sc.load_profile[h];

        let mut builder = ProgramBuilder::new();
        for _ in 0..binary_layout.total() {
            builder.add_binary(0.0);
        }
        let (v_lo, v_hi) = params.squared_voltage_band();
        for _ in 0..n_bus * hours {
            builder.add_column(0.0, v_lo, v_hi, false);
        }
        for _ in 0..hours {
            for &cap in &line_cap {
                builder.add_column(0.0, -cap, cap, false);
            }
        }
        for _ in 0..hours {
            for &cap in &sub_cap {
                builder.add_column(weight * params.cost_power, 0.0, cap, false);
            }
        }
        for h in 0..hours {
            for b in 0..n_bus {
                builder.add_column(weight * params.cost_shed, 0.0, demand(b, h), false);
            }
        }
        for h in 0..hours {
            for (g, gen) in case.generators.iter().enumerate() {
                builder.add_column(weight * gen.energy_cost, 0.0, available(g, h), false);
            }
        }
        for h in 0..hours {
            for g in 0..n_gen {
                builder.add_column(weight * params.cost_curtail, 0.0, available(g, h), false);
            }
        }
        debug_assert_eq!(builder.num_columns(), layout.total());

        // Pinning rows for every candidate
        let mut pinning = Vec::new();
        let mut pin = |builder: &mut ProgramBuilder, asset: AssetRef, column: usize| {
            let investment = plan.value(asset, stage);
            let row = builder.add_le(&[(column, 1.0)], investment);
            pinning.push(PinningRow {
                row,
                asset,
                investment,
            });
        };
        for (l, ln) in case.lines.iter().enumerate() {
            if ln.is_candidate() {
                pin(&mut builder, AssetRef::line(l), cols.line.at(l));
            }
        }
        for (s, substation) in case.substations.iter().enumerate() {
            if substation.is_candidate() {
                pin(&mut builder, AssetRef::substation(s), cols.sub.at(s));
            }
        }
        for g in 0..n_gen {
            pin(&mut builder, AssetRef::generator(g), cols.gen.at(g));
        }

        // Radiality: a loaded bus without a substation has one parent, others none
        for (b, bus) in case.buses.iter().enumerate() {
            let parents = if bus.is_loaded(stage) && !topology.has_substation(BusId::new(b)) {
                1.0
            } else {
                0.0
            };
            let mut terms = Vec::new();
            for l in &topology.lines_tail[b] {
                terms.push((cols.pos.at(l.value()), 1.0));
            }
            for l in &topology.lines_head[b] {
                terms.push((cols.neg.at(l.value()), 1.0));
            }
            if !terms.is_empty() || parents != 0.0 {
                builder.add_eq(&terms, parents);
            }
        }

        // Direction
        for l in 0..n_line {
            builder.add_eq(
                &[(cols.pos.at(l), 1.0), (cols.neg.at(l), 1.0), (cols.line.at(l), -1.0)],
                0.0,
            );
        }

        let big_m = params.big_m;
        let reactive = params.reactive_ratio();
        for h in 0..hours {
            // Active power balance
            for b in 0..n_bus {
                let mut terms = Vec::new();
                for l in &topology.lines_tail[b] {
                    terms.push((cols.flow.at(h * n_line + l.value()), 1.0));
                }
                for l in &topology.lines_head[b] {
                    terms.push((cols.flow.at(h * n_line + l.value()), -1.0));
                }
                for s in &topology.substations[b] {
                    terms.push((cols.purchase.at(h * n_sub + s.value()), 1.0));
                }
                for g in &topology.generators[b] {
                    terms.push((cols.output.at(h * n_gen + g.value()), 1.0));
                }
                terms.push((cols.shed.at(h * n_bus + b), 1.0));
                builder.add_eq(&terms, demand(b, h));
            }

            // Voltage drop, enforced only on closed lines
            for (l, ln) in case.lines.iter().enumerate() {
                let k = 2.0 * (ln.resistance_ohm + ln.reactance_ohm * reactive);
                let head = cols.voltage.at(h * n_bus + ln.from_bus.value());
                let tail = cols.voltage.at(h * n_bus + ln.to_bus.value());
                let flow = cols.flow.at(h * n_line + l);
                let closed = cols.line.at(l);
                builder.add_ge(
                    &[(head, 1.0), (tail, -1.0), (flow, -k), (closed, -big_m)],
                    -big_m,
                );
                builder.add_le(
                    &[(head, 1.0), (tail, -1.0), (flow, -k), (closed, big_m)],
                    big_m,
                );
            }

            // Renewable availability
            for g in 0..n_gen {
                builder.add_eq(
                    &[
                        (cols.output.at(h * n_gen + g), 1.0),
                        (cols.curtail.at(h * n_gen + g), 1.0),
                        (cols.gen.at(g), -available(g, h)),
                    ],
                    0.0,
                );
            }

            // Line and substation capacity
            for (l, &cap) in line_cap.iter().enumerate() {
                let flow = cols.flow.at(h * n_line + l);
                builder.add_ge(&[(cols.line.at(l), cap), (flow, -1.0)], 0.0);
                builder.add_ge(&[(cols.line.at(l), cap), (flow, 1.0)], 0.0);
            }
            for (s, &cap) in sub_cap.iter().enumerate() {
                builder.add_ge(
                    &[(cols.sub.at(s), cap), (cols.purchase.at(h * n_sub + s), -1.0)],
                    0.0,
                );
            }
        }

        let program = builder.build();
        debug!(
            stage,
            scenario,
            columns = program.num_columns(),
            rows = program.num_rows(),
            binaries = binary_layout.total(),
            "operational model formulated"
        );

        Ok(Self {
            stage,
            scenario,
            program,
            layout,
            binary_layout,
            pinning,
        })
    }

    /// Number of binary columns (the prefix shared with the relaxation)
    pub fn binary_len(&self) -> usize {
        self.binary_layout.total()
    }

    /// Rows touching binary columns only
    pub fn structural_rows(&self) -> Vec<usize> {
        let nb = self.binary_len();
        (0..self.program.num_rows())
            .filter(|&i| self.program.row_within(i, nb))
            .collect()
    }

    /// Solve the operational MILP
    pub fn solve<O: LpOracle + ?Sized>(
        &self,
        search: &BranchAndBound<'_, O>,
    ) -> PlanResult<OperationalSolution> {
        let result = search.solve(&self.program)?;
        let Some(incumbent) = result.incumbent else {
            return Err(PlanError::OracleInfeasible(format!(
                "operational model of stage {} scenario {} has no feasible configuration ({})",
                self.stage, self.scenario, result.status
            )));
        };
        if result.status == SearchStatus::LimitReached {
            warn!(
                stage = self.stage,
                scenario = self.scenario,
                nodes = result.nodes_explored,
                "operational search stopped at its limit, using best configuration found"
            );
        }

        Ok(OperationalSolution {
            assignment: incumbent.solution[..self.binary_len()].to_vec(),
            objective: incumbent.objective,
            status: result.status,
            nodes_explored: result.nodes_explored,
            primal: incumbent.solution,
        })
    }

    /// Continuous program with the binaries fixed to `assignment`.
    ///
    /// Binary columns are freed and held by one equality row each, so the
    /// duals of those rows are the marginal costs of the assignment.
    /// Structural rows are dropped; with every binary fixed they are either
    /// satisfied or contradict the fixing rows. Returns the program and the
    /// indices of the fixing rows.
    pub fn fixed_program(&self, assignment: &[f64]) -> PlanResult<(LinearProgram, Vec<usize>)> {
        let nb = self.binary_len();
        if assignment.len() != nb {
            return Err(PlanError::DimensionMismatch(format!(
                "assignment has {} entries, model has {} binaries",
                assignment.len(),
                nb
            )));
        }

        let mut builder = ProgramBuilder::new();
        for j in 0..self.program.num_columns() {
            if j < nb {
                builder.add_column(
                    self.program.cost[j],
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                    false,
                );
            } else {
                builder.add_column(
                    self.program.cost[j],
                    self.program.lower[j],
                    self.program.upper[j],
                    false,
                );
            }
        }
        builder.set_offset(self.program.offset);

        for i in 0..self.program.num_rows() {
            if self.program.row_within(i, nb) {
                continue;
            }
            builder.add_row(
                &self.program.row_terms(i),
                self.program.senses[i],
                self.program.rhs[i],
            );
        }
        let fixing = assignment
            .iter()
            .enumerate()
            .map(|(j, &value)| builder.add_eq(&[(j, 1.0)], value))
            .collect();

        Ok((builder.build(), fixing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch_bound::BranchBoundConfig;
    use crate::oracle::ClarabelOracle;
    use crate::program::RowSense;
    use crate::test_utils::{feeder_case, two_bus_case};

    #[test]
    fn test_block_layout() {
        let case = feeder_case();
        let topology = Topology::new(&case);
        let plan = InvestmentPlan::empty(&case);
        let model = OperationalModel::formulate(&case, &topology, 0, 0, &plan).unwrap();

        let names: Vec<&str> = model.layout.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "line",
                "flow_pos",
                "flow_neg",
                "substation",
                "generator",
                "voltage",
                "line_flow",
                "substation_power",
                "load_shed",
                "generation",
                "curtailment",
            ]
        );
        // 3·5 line binaries + 1 substation + 1 generator
        assert_eq!(model.binary_len(), 17);
        assert_eq!(model.program.num_integer(), 17);
        assert_eq!(model.layout.total(), model.program.num_columns());
        model.program.validate().unwrap();
    }

    #[test]
    fn test_pinning_rows_follow_plan() {
        let case = feeder_case();
        let topology = Topology::new(&case);
        let mut plan = InvestmentPlan::empty(&case);
        plan.set(AssetRef::line(3), 1, true);
        let model = OperationalModel::formulate(&case, &topology, 1, 0, &plan).unwrap();

        // Candidates: lines 2, 3, 4 and generator 0
        let assets: Vec<AssetRef> = model.pinning.iter().map(|p| p.asset).collect();
        assert_eq!(
            assets,
            vec![
                AssetRef::line(2),
                AssetRef::line(3),
                AssetRef::line(4),
                AssetRef::generator(0)
            ]
        );
        let pin = &model.pinning[1];
        assert_eq!(pin.investment, 1.0);
        assert_eq!(model.program.row_terms(pin.row), vec![(3, -1.0)]);
        assert_eq!(model.program.rhs[pin.row], -1.0);
        assert_eq!(model.program.senses[pin.row], RowSense::GreaterEqual);

        let structural = model.structural_rows();
        assert!(structural.contains(&pin.row));
        // pinning (4) + radiality (4 buses) + direction (5 lines)
        assert_eq!(structural.len(), 13);
    }

    #[test]
    fn test_two_bus_dispatch() {
        let case = two_bus_case();
        let topology = Topology::new(&case);
        let plan = InvestmentPlan::empty(&case);
        let model = OperationalModel::formulate(&case, &topology, 0, 0, &plan).unwrap();

        let oracle = ClarabelOracle::new();
        let search = BranchAndBound::new(&oracle, BranchBoundConfig::default());
        let solution = model.solve(&search).unwrap();

        // Line closed, head bus feeds the tail bus, substation energized
        assert_eq!(solution.assignment, vec![1.0, 1.0, 0.0, 1.0]);
        // 3 MW bought for one hour on 365 days at 70 $/MWh
        let expected = 365.0 * 70.0 * 3.0;
        assert!(
            (solution.objective - expected).abs() < 1e-3 * expected,
            "objective {} vs {}",
            solution.objective,
            expected
        );
    }

    #[test]
    fn test_fixed_program_frees_binaries() {
        let case = two_bus_case();
        let topology = Topology::new(&case);
        let plan = InvestmentPlan::empty(&case);
        let model = OperationalModel::formulate(&case, &topology, 0, 0, &plan).unwrap();

        let (fixed, rows) = model.fixed_program(&[1.0, 1.0, 0.0, 1.0]).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(fixed.num_integer(), 0);
        assert_eq!(fixed.lower[0], f64::NEG_INFINITY);
        assert_eq!(fixed.senses[rows[2]], RowSense::Equal);
        assert_eq!(fixed.rhs[rows[2]], 0.0);
        // Structural rows are gone
        assert_eq!(
            fixed.num_rows(),
            model.program.num_rows() - model.structural_rows().len() + 4
        );
        assert!(model.fixed_program(&[1.0]).is_err());
    }

    #[test]
    fn test_bad_scenario_index() {
        let case = two_bus_case();
        let topology = Topology::new(&case);
        let plan = InvestmentPlan::empty(&case);
        let err = OperationalModel::formulate(&case, &topology, 0, 3, &plan).unwrap_err();
        assert!(matches!(err, PlanError::InvalidCase(_)));
    }
}
