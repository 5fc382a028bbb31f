//! Planning case validation
//!
//! Formulations index elements positionally, so validation runs before any
//! model is built and fails fast on the first inconsistency.

use crate::{GridError, GridResult, PlanningCase, Topology};

impl PlanningCase {
    /// Check IDs, bus references, vector lengths and substation reachability.
    pub fn validate(&self) -> GridResult<()> {
        if self.params.stages == 0 {
            return Err(GridError::Validation("case has zero planning stages".into()));
        }
        if self.params.years_per_stage == 0 {
            return Err(GridError::Validation("years_per_stage must be positive".into()));
        }
        if self.buses.is_empty() {
            return Err(GridError::Validation("case has no buses".into()));
        }
        if self.substations.is_empty() {
            return Err(GridError::Validation("case has no substations".into()));
        }
        if self.scenarios.is_empty() {
            return Err(GridError::Validation("case has no operating scenarios".into()));
        }

        self.check_positional_ids()?;

        let n_bus = self.buses.len();
        let check_bus = |element: String, bus: usize| -> GridResult<()> {
            if bus >= n_bus {
                Err(GridError::UnknownBus { element, bus })
            } else {
                Ok(())
            }
        };

        for bus in &self.buses {
            if bus.load_mw.len() != self.params.stages {
                return Err(GridError::LengthMismatch {
                    what: format!("load_mw of bus {}", bus.id.value()),
                    expected: self.params.stages,
                    actual: bus.load_mw.len(),
                });
            }
        }
        for line in &self.lines {
            check_bus(format!("line {}", line.id.value()), line.from_bus.value())?;
            check_bus(format!("line {}", line.id.value()), line.to_bus.value())?;
            if line.from_bus == line.to_bus {
                return Err(GridError::Validation(format!(
                    "line {} connects bus {} to itself",
                    line.id.value(),
                    line.from_bus.value()
                )));
            }
        }
        for sub in &self.substations {
            check_bus(format!("substation {}", sub.id.value()), sub.bus.value())?;
        }
        for gen in &self.generators {
            check_bus(format!("generator {}", gen.id.value()), gen.bus.value())?;
        }

        for (idx, scenario) in self.scenarios.iter().enumerate() {
            let hours = scenario.hours();
            if hours == 0 {
                return Err(GridError::Validation(format!("scenario {idx} has no hours")));
            }
            for (what, profile) in [
                ("wind_profile", &scenario.wind_profile),
                ("solar_profile", &scenario.solar_profile),
            ] {
                if !profile.is_empty() && profile.len() != hours {
                    return Err(GridError::LengthMismatch {
                        what: format!("{what} of scenario {idx}"),
                        expected: hours,
                        actual: profile.len(),
                    });
                }
            }
        }

        let topology = Topology::new(self);
        let reached = topology.reachable_from_substations(self);
        for bus in &self.buses {
            let loaded = (0..self.params.stages).any(|t| bus.is_loaded(t));
            if loaded && !reached[bus.id.value()] {
                return Err(GridError::Unreachable(bus.id.value()));
            }
        }

        Ok(())
    }

    fn check_positional_ids(&self) -> GridResult<()> {
        let mismatch = |kind: &str, index: usize, id: usize| {
            GridError::Validation(format!("{kind} at position {index} has id {id}"))
        };
        for (i, bus) in self.buses.iter().enumerate() {
            if bus.id.value() != i {
                return Err(mismatch("bus", i, bus.id.value()));
            }
        }
        for (i, line) in self.lines.iter().enumerate() {
            if line.id.value() != i {
                return Err(mismatch("line", i, line.id.value()));
            }
        }
        for (i, sub) in self.substations.iter().enumerate() {
            if sub.id.value() != i {
                return Err(mismatch("substation", i, sub.id.value()));
            }
        }
        for (i, gen) in self.generators.iter().enumerate() {
            if gen.id.value() != i {
                return Err(mismatch("generator", i, gen.id.value()));
            }
        }
        Ok(())
    }
}
