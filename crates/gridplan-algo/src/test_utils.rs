//! Small planning cases shared by unit and integration tests.

use gridplan_core::{
    Bus, BusId, Generator, GeneratorId, GeneratorKind, Line, LineId, PlanningCase,
    PlanningParams, Scenario, Substation, SubstationId,
};

fn line(id: usize, from: usize, to: usize, existing: bool, cost: f64) -> Line {
    Line {
        id: LineId::new(id),
        name: format!("L{id}"),
        from_bus: BusId::new(from),
        to_bus: BusId::new(to),
        resistance_ohm: 0.3,
        reactance_ohm: 0.4,
        existing_capacity_mva: if existing { 10.0 } else { 0.0 },
        new_capacity_mva: if existing { 0.0 } else { 10.0 },
        investment_cost: cost,
        existing,
    }
}

/// Four-bus radial feeder with two stages and two operating scenarios.
///
/// Bus 0 hosts the only substation. Buses 1 and 2 are served by existing
/// lines; bus 3 picks up load in stage 1 and can only be reached through a
/// candidate line (2→3 or 1→3). A wind farm can be built at bus 3.
pub fn feeder_case() -> PlanningCase {
    PlanningCase {
        name: "four-bus feeder".into(),
        params: PlanningParams {
            stages: 2,
            years_per_stage: 5,
            ..Default::default()
        },
        buses: vec![
            Bus {
                id: BusId::new(0),
                name: "source".into(),
                load_mw: vec![0.0, 0.0],
            },
            Bus {
                id: BusId::new(1),
                name: "b1".into(),
                load_mw: vec![2.0, 2.5],
            },
            Bus {
                id: BusId::new(2),
                name: "b2".into(),
                load_mw: vec![1.5, 2.0],
            },
            Bus {
                id: BusId::new(3),
                name: "b3".into(),
                load_mw: vec![0.0, 1.0],
            },
        ],
        lines: vec![
            line(0, 0, 1, true, 0.0),
            line(1, 1, 2, true, 0.0),
            line(2, 0, 2, false, 5.0e4),
            line(3, 2, 3, false, 8.0e4),
            line(4, 1, 3, false, 9.0e4),
        ],
        substations: vec![Substation {
            id: SubstationId::new(0),
            name: "S0".into(),
            bus: BusId::new(0),
            existing_capacity_mva: 20.0,
            new_capacity_mva: 0.0,
            investment_cost: 0.0,
            existing: true,
        }],
        generators: vec![Generator {
            id: GeneratorId::new(0),
            name: "W0".into(),
            bus: BusId::new(3),
            kind: GeneratorKind::Wind,
            capacity_mw: 1.0,
            investment_cost: 1.0e5,
            energy_cost: 0.0,
        }],
        scenarios: vec![
            Scenario {
                name: "peak".into(),
                days: 180.0,
                load_profile: vec![0.8, 1.0],
                wind_profile: vec![0.3, 0.5],
                solar_profile: vec![0.0, 0.0],
            },
            Scenario {
                name: "valley".into(),
                days: 185.0,
                load_profile: vec![0.5, 0.6],
                wind_profile: vec![0.6, 0.4],
                solar_profile: vec![0.0, 0.0],
            },
        ],
    }
}

/// Two buses, one existing line, one stage and one scenario.
pub fn two_bus_case() -> PlanningCase {
    PlanningCase {
        name: "two-bus".into(),
        params: PlanningParams {
            stages: 1,
            years_per_stage: 1,
            ..Default::default()
        },
        buses: vec![
            Bus {
                id: BusId::new(0),
                name: "source".into(),
                load_mw: vec![0.0],
            },
            Bus {
                id: BusId::new(1),
                name: "load".into(),
                load_mw: vec![3.0],
            },
        ],
        lines: vec![line(0, 0, 1, true, 0.0)],
        substations: vec![Substation {
            id: SubstationId::new(0),
            name: "S0".into(),
            bus: BusId::new(0),
            existing_capacity_mva: 20.0,
            new_capacity_mva: 0.0,
            investment_cost: 0.0,
            existing: true,
        }],
        generators: Vec::new(),
        scenarios: vec![Scenario {
            name: "flat".into(),
            days: 365.0,
            load_profile: vec![1.0],
            wind_profile: vec![0.0],
            solar_profile: vec![0.0],
        }],
    }
}
