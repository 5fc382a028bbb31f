//! Bus adjacency derived from a planning case
//!
//! Every formulation needs, for each bus, the lines whose head or tail end is
//! at that bus and the substations and generators connected there. The lists
//! are computed once per case and shared by the master and operational
//! formulations.

use crate::{BusId, GeneratorId, LineId, PlanningCase, SubstationId};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;

/// Per-bus element lists.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Lines whose head end (`from_bus`) is at bus i
    pub lines_head: Vec<Vec<LineId>>,
    /// Lines whose tail end (`to_bus`) is at bus i
    pub lines_tail: Vec<Vec<LineId>>,
    /// Substations at bus i
    pub substations: Vec<Vec<SubstationId>>,
    /// Generators at bus i
    pub generators: Vec<Vec<GeneratorId>>,
}

impl Topology {
    /// Build adjacency lists. References to buses outside the case are
    /// ignored here; [`PlanningCase::validate`] reports them.
    pub fn new(case: &PlanningCase) -> Self {
        let n_bus = case.buses.len();
        let mut topo = Topology {
            lines_head: vec![Vec::new(); n_bus],
            lines_tail: vec![Vec::new(); n_bus],
            substations: vec![Vec::new(); n_bus],
            generators: vec![Vec::new(); n_bus],
        };

        for line in &case.lines {
            if let Some(list) = topo.lines_head.get_mut(line.from_bus.value()) {
                list.push(line.id);
            }
            if let Some(list) = topo.lines_tail.get_mut(line.to_bus.value()) {
                list.push(line.id);
            }
        }
        for sub in &case.substations {
            if let Some(list) = topo.substations.get_mut(sub.bus.value()) {
                list.push(sub.id);
            }
        }
        for gen in &case.generators {
            if let Some(list) = topo.generators.get_mut(gen.bus.value()) {
                list.push(gen.id);
            }
        }

        topo
    }

    pub fn num_buses(&self) -> usize {
        self.lines_head.len()
    }

    /// First substation at a bus, if any
    pub fn substation_at(&self, bus: BusId) -> Option<SubstationId> {
        self.substations
            .get(bus.value())
            .and_then(|subs| subs.first().copied())
    }

    pub fn has_substation(&self, bus: BusId) -> bool {
        self.substation_at(bus).is_some()
    }

    /// All lines incident to a bus, head end first
    pub fn incident_lines(&self, bus: BusId) -> impl Iterator<Item = LineId> + '_ {
        let i = bus.value();
        self.lines_head[i]
            .iter()
            .chain(self.lines_tail[i].iter())
            .copied()
    }

    /// Buses reachable from any substation bus over all lines (existing and
    /// candidate). Returned as a membership mask indexed by bus.
    pub fn reachable_from_substations(&self, case: &PlanningCase) -> Vec<bool> {
        let n_bus = self.num_buses();
        let mut graph = UnGraph::<(), LineId>::with_capacity(n_bus + 1, case.lines.len());
        for _ in 0..n_bus {
            graph.add_node(());
        }
        // Virtual upstream source tied to every substation bus
        let source = graph.add_node(());

        for line in &case.lines {
            let (a, b) = (line.from_bus.value(), line.to_bus.value());
            if a < n_bus && b < n_bus {
                graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), line.id);
            }
        }
        for (bus, subs) in self.substations.iter().enumerate() {
            if !subs.is_empty() {
                graph.update_edge(source, NodeIndex::new(bus), LineId::new(usize::MAX));
            }
        }

        let mut reached = vec![false; n_bus];
        let mut bfs = Bfs::new(&graph, source);
        while let Some(node) = bfs.next(&graph) {
            if node.index() < n_bus {
                reached[node.index()] = true;
            }
        }
        reached
    }
}
