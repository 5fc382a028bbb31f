//! # gridplan-core: Distribution Planning Case Model
//!
//! Provides the data structures that describe a multistage distribution
//! network planning case: the network (buses, lines, substations,
//! distributed generators), the planning horizon, and the typical operating
//! scenarios that the operational subproblem is evaluated on.
//!
//! ## Core Data Structures
//!
//! - [`PlanningCase`] - the complete case (serde, loaded from JSON by the CLI)
//! - [`PlanningParams`] - horizon, economics, voltage band and prices
//! - [`Bus`], [`Line`], [`Substation`], [`Generator`], [`Scenario`]
//! - [`Topology`] - per-bus adjacency derived once from a case
//! - Type-safe IDs: [`BusId`], [`LineId`], [`SubstationId`], [`GeneratorId`]
//!
//! Element IDs are positional: the element with ID `k` is stored at index `k`
//! of its vector. [`PlanningCase::validate`] enforces this.
//!
//! ## Modules
//!
//! - [`economics`] - capital recovery and present-worth factors
//! - [`topology`] - bus adjacency lists
//! - [`validation`] - reference, length and reachability checks

use serde::{Deserialize, Serialize};

pub mod case;
pub mod economics;
pub mod error;
pub mod topology;
pub mod validation;

pub use case::{
    Bus, Generator, GeneratorKind, Line, PlanningCase, PlanningParams, Scenario, Substation,
};
pub use economics::{capital_recovery_factor, stage_present_worth};
pub use error::{GridError, GridResult};
pub use topology::Topology;

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubstationId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratorId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl LineId {
    #[inline]
    pub fn new(value: usize) -> Self {
        LineId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl SubstationId {
    #[inline]
    pub fn new(value: usize) -> Self {
        SubstationId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl GeneratorId {
    #[inline]
    pub fn new(value: usize) -> Self {
        GeneratorId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}
