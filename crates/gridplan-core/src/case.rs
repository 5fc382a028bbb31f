//! Planning case data structures
//!
//! Defines the input data for multistage distribution planning problems.

use crate::{BusId, GeneratorId, LineId, SubstationId};
use serde::{Deserialize, Serialize};

/// A bus of the distribution network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    #[serde(default)]
    pub name: String,
    /// Peak active load per planning stage (MW)
    pub load_mw: Vec<f64>,
}

impl Bus {
    /// Peak load at `stage`, zero when the stage is not listed
    pub fn load_at(&self, stage: usize) -> f64 {
        self.load_mw.get(stage).copied().unwrap_or(0.0)
    }

    /// Whether the bus carries load at `stage`
    pub fn is_loaded(&self, stage: usize) -> bool {
        self.load_at(stage) > 0.0
    }
}

/// A feeder section between two buses.
///
/// Existing lines are always available to the operator. Candidate lines
/// (`existing == false`) only exist once the master problem builds them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    #[serde(default)]
    pub name: String,
    /// Head-end bus; positive flow leaves this bus
    pub from_bus: BusId,
    /// Tail-end bus
    pub to_bus: BusId,
    /// Series resistance (ohm)
    pub resistance_ohm: f64,
    /// Series reactance (ohm)
    pub reactance_ohm: f64,
    /// Capacity of the existing circuit (MVA), zero for candidates
    #[serde(default)]
    pub existing_capacity_mva: f64,
    /// Capacity added when the candidate is built (MVA)
    #[serde(default)]
    pub new_capacity_mva: f64,
    /// Investment cost to build this line ($)
    #[serde(default)]
    pub investment_cost: f64,
    pub existing: bool,
}

impl Line {
    /// Capacity available at a stage given the build decision for that stage
    pub fn capacity(&self, built: bool) -> f64 {
        if built {
            self.existing_capacity_mva + self.new_capacity_mva
        } else {
            self.existing_capacity_mva
        }
    }

    /// Whether the line is an investment candidate
    pub fn is_candidate(&self) -> bool {
        !self.existing
    }
}

/// A substation feeding the distribution network from upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Substation {
    pub id: SubstationId,
    #[serde(default)]
    pub name: String,
    pub bus: BusId,
    #[serde(default)]
    pub existing_capacity_mva: f64,
    #[serde(default)]
    pub new_capacity_mva: f64,
    #[serde(default)]
    pub investment_cost: f64,
    pub existing: bool,
}

impl Substation {
    pub fn capacity(&self, built: bool) -> f64 {
        if built {
            self.existing_capacity_mva + self.new_capacity_mva
        } else {
            self.existing_capacity_mva
        }
    }

    pub fn is_candidate(&self) -> bool {
        !self.existing
    }
}

/// Renewable technology of a distributed generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Wind,
    Solar,
}

/// A candidate distributed generator (wind farm or PV station).
///
/// Generators are always investment candidates; their hourly availability is
/// `capacity_mw` times the scenario profile of their technology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub id: GeneratorId,
    #[serde(default)]
    pub name: String,
    pub bus: BusId,
    pub kind: GeneratorKind,
    pub capacity_mw: f64,
    pub investment_cost: f64,
    /// Cost of energy produced ($/MWh)
    #[serde(default)]
    pub energy_cost: f64,
}

/// A typical operating period, e.g. a six-hour block of a seasonal day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Number of days per year this scenario represents
    pub days: f64,
    /// Hourly load multipliers (fraction of stage peak)
    pub load_profile: Vec<f64>,
    /// Hourly wind availability (fraction of capacity)
    #[serde(default)]
    pub wind_profile: Vec<f64>,
    /// Hourly solar availability (fraction of capacity)
    #[serde(default)]
    pub solar_profile: Vec<f64>,
}

impl Scenario {
    pub fn hours(&self) -> usize {
        self.load_profile.len()
    }

    /// Availability factor of a technology at hour `h`
    pub fn availability(&self, kind: GeneratorKind, hour: usize) -> f64 {
        let profile = match kind {
            GeneratorKind::Wind => &self.wind_profile,
            GeneratorKind::Solar => &self.solar_profile,
        };
        profile.get(hour).copied().unwrap_or(0.0)
    }
}

/// Horizon, economics and operating prices of a planning case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningParams {
    /// Number of planning stages
    pub stages: usize,
    /// Years covered by each stage
    pub years_per_stage: usize,
    /// Interest rate for annualization and discounting
    pub interest_rate: f64,
    /// Big-M for disjunctive voltage-drop and fictitious-flow constraints
    pub big_m: f64,
    /// Nominal voltage (kV)
    pub voltage_kv: f64,
    /// Allowed relative deviation from nominal voltage
    pub voltage_tolerance: f64,
    /// Load power factor, used to approximate reactive flow on lines
    pub load_power_factor: f64,
    /// Cost of power purchased at substations ($/MWh)
    pub cost_power: f64,
    /// Cost of load shedding ($/MWh)
    pub cost_shed: f64,
    /// Cost of renewable curtailment ($/MWh)
    pub cost_curtail: f64,
    pub line_life_years: usize,
    pub substation_life_years: usize,
    pub generator_life_years: usize,
}

impl Default for PlanningParams {
    fn default() -> Self {
        Self {
            stages: 3,
            years_per_stage: 5,
            interest_rate: 0.05,
            big_m: 500.0,
            voltage_kv: 35.0,
            voltage_tolerance: 0.05,
            load_power_factor: 0.95,
            cost_power: 70.0,
            cost_shed: 200.0,
            cost_curtail: 150.0,
            line_life_years: 25,
            substation_life_years: 15,
            generator_life_years: 15,
        }
    }
}

impl PlanningParams {
    /// Squared voltage band `(V_min², V_max²)` in kV²
    pub fn squared_voltage_band(&self) -> (f64, f64) {
        let low = self.voltage_kv * (1.0 - self.voltage_tolerance);
        let high = self.voltage_kv * (1.0 + self.voltage_tolerance);
        (low * low, high * high)
    }

    /// Ratio of reactive to active load power
    pub fn reactive_ratio(&self) -> f64 {
        let pf = self.load_power_factor.clamp(1e-6, 1.0);
        (1.0 - pf * pf).sqrt() / pf
    }
}

/// Complete planning case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanningCase {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub params: PlanningParams,
    pub buses: Vec<Bus>,
    pub lines: Vec<Line>,
    pub substations: Vec<Substation>,
    #[serde(default)]
    pub generators: Vec<Generator>,
    pub scenarios: Vec<Scenario>,
}

impl PlanningCase {
    pub fn num_stages(&self) -> usize {
        self.params.stages
    }

    pub fn num_scenarios(&self) -> usize {
        self.scenarios.len()
    }

    /// Candidate lines in ID order
    pub fn candidate_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|l| l.is_candidate())
    }

    /// Candidate substations in ID order
    pub fn candidate_substations(&self) -> impl Iterator<Item = &Substation> {
        self.substations.iter().filter(|s| s.is_candidate())
    }

    /// Total peak load at a stage (MW)
    pub fn total_load(&self, stage: usize) -> f64 {
        self.buses.iter().map(|b| b.load_at(stage)).sum()
    }

    /// Parse a case from JSON text
    pub fn from_json_str(text: &str) -> crate::GridResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
