//! # gat-core: Power Grid Modeling Core
//!
//! Data structures for the network snapshot consumed by the optimal power flow engine.
//!
//! ## Layout
//!
//! A [`Network`] owns three flat vectors: buses, branches and generators. Elements refer
//! to buses by [`BusId`]; anything that needs fast lookups (for example "which
//! generators sit on bus k") builds an index once with [`Network::bus_index_map`] or
//! [`Network::generators_by_bus`] instead of chasing references.
//!
//! Result fields (`p_lambda`, `mu_pmax`, branch flows, ...) live next to the input data
//! and are overwritten by every solve.
//!
//! ## Quick Start
//!
//! ```rust
//! use gat_core::*;
//!
//! let mut network = Network::new("two-bus");
//! network.add_bus(Bus::new(BusId::new(1), "North").as_reference()).unwrap();
//! network.add_bus(Bus::new(BusId::new(2), "South").with_demand(50.0, 10.0)).unwrap();
//! network
//!     .add_branch(Branch::new(BranchId::new(1), "1-2", BusId::new(1), BusId::new(2), 0.01, 0.1))
//!     .unwrap();
//! network
//!     .add_gen(
//!         Gen::new(GenId::new(1), "G1", BusId::new(1))
//!             .with_p_limits(0.0, 100.0)
//!             .with_cost(CostModel::linear(0.0, 20.0)),
//!     )
//!     .unwrap();
//!
//! network.derive_bus_types();
//! assert_eq!(network.buses[0].bus_type, BusType::Reference);
//! assert_eq!(network.buses[1].bus_type, BusType::Pq);
//! assert_eq!(network.stats().num_gens, 1);
//! ```
//!
//! ## Modules
//!
//! - [`cost`] - generator cost curves
//! - [`graph_utils`] - connectivity and island detection
//! - [`solver`] - dense linear-system backends
//! - [`units`] - unit newtypes

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod cost;
pub mod error;
pub mod graph_utils;
pub mod solver;
pub mod units;

pub use cost::CostModel;
pub use error::{ModelError, ModelResult};
pub use graph_utils::{find_islands, IslandAnalysis};
pub use units::{Degrees, Kilovolts, Megavars, MegavoltAmperes, Megawatts, PerUnit, Radians};

macro_rules! element_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            #[inline]
            pub fn new(value: usize) -> Self {
                $name(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }
    };
}

element_id!(BusId);
element_id!(BranchId);
element_id!(GenId);

/// Default system MVA base.
pub const DEFAULT_BASE_MVA: f64 = 100.0;

/// Bus classification used by the optimizer.
///
/// `Reference` and `Isolated` are explicit flags. `Pq`/`Pv` are derived from attached
/// online generation by [`Network::derive_bus_types`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusType {
    #[default]
    Pq,
    Pv,
    Reference,
    Isolated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    pub bus_type: BusType,
    /// Nominal voltage (informational)
    pub base_kv: Kilovolts,
    /// Active power demand
    pub p_demand: Megawatts,
    /// Reactive power demand
    pub q_demand: Megavars,
    /// Shunt conductance, MW demanded at 1.0 p.u. voltage
    pub g_shunt: Megawatts,
    /// Shunt susceptance, Mvar injected at 1.0 p.u. voltage
    pub b_shunt: Megavars,
    pub v_min: PerUnit,
    pub v_max: PerUnit,
    /// Voltage magnitude: initial guess before a solve, solution after
    pub voltage: PerUnit,
    /// Voltage angle: initial guess before a solve, solution after
    pub angle: Radians,

    /// Active power price ($/MWh)
    #[serde(default)]
    pub p_lambda: f64,
    /// Reactive power price ($/Mvar-h)
    #[serde(default)]
    pub q_lambda: f64,
    #[serde(default)]
    pub mu_vmin: f64,
    #[serde(default)]
    pub mu_vmax: f64,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId(0),
            name: String::new(),
            bus_type: BusType::Pq,
            base_kv: Kilovolts(0.0),
            p_demand: Megawatts(0.0),
            q_demand: Megavars(0.0),
            g_shunt: Megawatts(0.0),
            b_shunt: Megavars(0.0),
            v_min: PerUnit(0.9),
            v_max: PerUnit(1.1),
            voltage: PerUnit(1.0),
            angle: Radians(0.0),
            p_lambda: 0.0,
            q_lambda: 0.0,
            mu_vmin: 0.0,
            mu_vmax: 0.0,
        }
    }
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set active (MW) and reactive (Mvar) demand.
    pub fn with_demand(mut self, p_mw: f64, q_mvar: f64) -> Self {
        self.p_demand = Megawatts(p_mw);
        self.q_demand = Megavars(q_mvar);
        self
    }

    /// Set shunt conductance (MW) and susceptance (Mvar) at nominal voltage.
    pub fn with_shunt(mut self, g_mw: f64, b_mvar: f64) -> Self {
        self.g_shunt = Megawatts(g_mw);
        self.b_shunt = Megavars(b_mvar);
        self
    }

    pub fn with_voltage_limits(mut self, v_min: f64, v_max: f64) -> Self {
        self.v_min = PerUnit(v_min);
        self.v_max = PerUnit(v_max);
        self
    }

    pub fn with_angle(mut self, angle: Radians) -> Self {
        self.angle = angle;
        self
    }

    /// Flag as the slack (reference) bus of its island.
    pub fn as_reference(mut self) -> Self {
        self.bus_type = BusType::Reference;
        self
    }

    pub fn as_isolated(mut self) -> Self {
        self.bus_type = BusType::Isolated;
        self
    }

    pub fn is_reference(&self) -> bool {
        self.bus_type == BusType::Reference
    }

    pub fn is_isolated(&self) -> bool {
        self.bus_type == BusType::Isolated
    }

    pub fn reset_results(&mut self) {
        self.p_lambda = 0.0;
        self.q_lambda = 0.0;
        self.mu_vmin = 0.0;
        self.mu_vmax = 0.0;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Series resistance (per-unit)
    pub resistance: f64,
    /// Series reactance (per-unit)
    pub reactance: f64,
    /// Total line charging susceptance (per-unit, split half/half)
    pub charging_b: f64,
    /// Off-nominal turns ratio at the from end; 0 means nominal
    pub tap_ratio: f64,
    pub phase_shift: Radians,
    /// Long-term thermal rating; 0 means unconstrained
    pub rate_a: MegavoltAmperes,
    pub angle_min: Option<Radians>,
    pub angle_max: Option<Radians>,
    /// Operational status flag
    pub status: bool,

    #[serde(default)]
    pub p_from: Megawatts,
    #[serde(default)]
    pub q_from: Megavars,
    #[serde(default)]
    pub p_to: Megawatts,
    #[serde(default)]
    pub q_to: Megavars,
    #[serde(default)]
    pub mu_s_from: f64,
    #[serde(default)]
    pub mu_s_to: f64,
    #[serde(default)]
    pub mu_angmin: f64,
    #[serde(default)]
    pub mu_angmax: f64,
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            id: BranchId(0),
            name: String::new(),
            from_bus: BusId(0),
            to_bus: BusId(0),
            resistance: 0.0,
            reactance: 0.0,
            charging_b: 0.0,
            tap_ratio: 0.0,
            phase_shift: Radians(0.0),
            rate_a: MegavoltAmperes(0.0),
            angle_min: None,
            angle_max: None,
            status: true,
            p_from: Megawatts(0.0),
            q_from: Megavars(0.0),
            p_to: Megawatts(0.0),
            q_to: Megavars(0.0),
            mu_s_from: 0.0,
            mu_s_to: 0.0,
            mu_angmin: 0.0,
            mu_angmax: 0.0,
        }
    }
}

impl Branch {
    pub fn new(
        id: BranchId,
        name: impl Into<String>,
        from_bus: BusId,
        to_bus: BusId,
        resistance: f64,
        reactance: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            from_bus,
            to_bus,
            resistance,
            reactance,
            ..Self::default()
        }
    }

    pub fn with_charging(mut self, b_pu: f64) -> Self {
        self.charging_b = b_pu;
        self
    }

    /// Attach the long-term thermal rating in MVA.
    pub fn with_rate_a(mut self, mva: f64) -> Self {
        self.rate_a = MegavoltAmperes(mva);
        self
    }

    /// Model as a transformer with the given turns ratio and phase shift.
    pub fn with_tap(mut self, ratio: f64, shift: Radians) -> Self {
        self.tap_ratio = ratio;
        self.phase_shift = shift;
        self
    }

    pub fn with_angle_limits(mut self, min: Radians, max: Radians) -> Self {
        self.angle_min = Some(min);
        self.angle_max = Some(max);
        self
    }

    pub fn out_of_service(mut self) -> Self {
        self.status = false;
        self
    }

    /// Turns ratio with the "0 means nominal" convention resolved.
    pub fn effective_tap(&self) -> f64 {
        if self.tap_ratio == 0.0 {
            1.0
        } else {
            self.tap_ratio
        }
    }

    pub fn is_transformer(&self) -> bool {
        self.effective_tap() != 1.0 || self.phase_shift.value() != 0.0
    }

    /// Whether the thermal rating takes part in the optimization.
    pub fn is_rate_limited(&self) -> bool {
        let rate = self.rate_a.value();
        rate > 0.0 && rate < 1e10
    }

    pub fn reset_results(&mut self) {
        self.p_from = Megawatts(0.0);
        self.q_from = Megavars(0.0);
        self.p_to = Megawatts(0.0);
        self.q_to = Megavars(0.0);
        self.mu_s_from = 0.0;
        self.mu_s_to = 0.0;
        self.mu_angmin = 0.0;
        self.mu_angmax = 0.0;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gen {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    /// Active power output: initial guess before a solve, dispatch after
    pub p: Megawatts,
    /// Reactive power output: initial guess before a solve, dispatch after
    pub q: Megavars,
    pub pmin: Megawatts,
    pub pmax: Megawatts,
    pub qmin: Megavars,
    pub qmax: Megavars,
    /// In-service status
    pub status: bool,
    /// Voltage magnitude setpoint used as the AC starting point
    pub voltage_setpoint: PerUnit,
    pub cost_model: CostModel,

    #[serde(default)]
    pub mu_pmin: f64,
    #[serde(default)]
    pub mu_pmax: f64,
    #[serde(default)]
    pub mu_qmin: f64,
    #[serde(default)]
    pub mu_qmax: f64,
}

impl Default for Gen {
    fn default() -> Self {
        Self {
            id: GenId(0),
            name: String::new(),
            bus: BusId(0),
            p: Megawatts(0.0),
            q: Megavars(0.0),
            pmin: Megawatts(0.0),
            pmax: Megawatts(0.0),
            qmin: Megavars(0.0),
            qmax: Megavars(0.0),
            status: true,
            voltage_setpoint: PerUnit(1.0),
            cost_model: CostModel::NoCost,
            mu_pmin: 0.0,
            mu_pmax: 0.0,
            mu_qmin: 0.0,
            mu_qmax: 0.0,
        }
    }
}

impl Gen {
    pub fn new(id: GenId, name: impl Into<String>, bus: BusId) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            ..Self::default()
        }
    }

    /// Set active power limits (in MW)
    pub fn with_p_limits(mut self, pmin: f64, pmax: f64) -> Self {
        self.pmin = Megawatts(pmin);
        self.pmax = Megawatts(pmax);
        self
    }

    /// Set reactive power limits (in Mvar)
    pub fn with_q_limits(mut self, qmin: f64, qmax: f64) -> Self {
        self.qmin = Megavars(qmin);
        self.qmax = Megavars(qmax);
        self
    }

    pub fn with_cost(mut self, cost: CostModel) -> Self {
        self.cost_model = cost;
        self
    }

    pub fn with_voltage_setpoint(mut self, v_pu: f64) -> Self {
        self.voltage_setpoint = PerUnit(v_pu);
        self
    }

    pub fn out_of_service(mut self) -> Self {
        self.status = false;
        self
    }

    /// A dispatchable load is modeled as negative generation with `pmin < 0 = pmax`.
    pub fn is_dispatchable_load(&self) -> bool {
        self.pmin.value() < 0.0 && self.pmax.value() == 0.0
    }

    /// Production cost at the current dispatch ($/h).
    pub fn production_cost(&self) -> f64 {
        self.cost_model.evaluate(self.p.value())
    }

    pub fn reset_results(&mut self) {
        self.mu_pmin = 0.0;
        self.mu_pmax = 0.0;
        self.mu_qmin = 0.0;
        self.mu_qmax = 0.0;
    }
}

/// Network snapshot: buses, branches and generators on a common MVA base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub base_mva: f64,
    pub buses: Vec<Bus>,
    pub branches: Vec<Branch>,
    pub gens: Vec<Gen>,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_mva: DEFAULT_BASE_MVA,
            buses: Vec::new(),
            branches: Vec::new(),
            gens: Vec::new(),
        }
    }
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_base_mva(mut self, base_mva: f64) -> Self {
        self.base_mva = base_mva;
        self
    }

    /// Add a bus, returning its position. Bus ids must be unique.
    pub fn add_bus(&mut self, bus: Bus) -> ModelResult<usize> {
        if self.buses.iter().any(|b| b.id == bus.id) {
            return Err(ModelError::DuplicateBus(bus.id));
        }
        self.buses.push(bus);
        Ok(self.buses.len() - 1)
    }

    /// Add a branch between two existing buses, returning its position.
    pub fn add_branch(&mut self, branch: Branch) -> ModelResult<usize> {
        for bus in [branch.from_bus, branch.to_bus] {
            if self.bus_index(bus).is_none() {
                return Err(ModelError::BranchUnknownBus {
                    branch: branch.id,
                    bus,
                });
            }
        }
        self.branches.push(branch);
        Ok(self.branches.len() - 1)
    }

    /// Add a generator on an existing bus, returning its position.
    pub fn add_gen(&mut self, gen: Gen) -> ModelResult<usize> {
        if self.bus_index(gen.bus).is_none() {
            return Err(ModelError::GenUnknownBus {
                gen: gen.id,
                bus: gen.bus,
            });
        }
        self.gens.push(gen);
        Ok(self.gens.len() - 1)
    }

    pub fn bus_index(&self, id: BusId) -> Option<usize> {
        self.buses.iter().position(|b| b.id == id)
    }

    /// `BusId -> position` lookup, built once per caller.
    pub fn bus_index_map(&self) -> HashMap<BusId, usize> {
        self.buses
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id, i))
            .collect()
    }

    /// For every bus position, the positions of the generators attached to it.
    ///
    /// Generators whose bus does not exist are skipped; [`Network::validate`] reports them.
    pub fn generators_by_bus(&self) -> Vec<Vec<usize>> {
        let lookup = self.bus_index_map();
        let mut by_bus = vec![Vec::new(); self.buses.len()];
        for (g, gen) in self.gens.iter().enumerate() {
            if let Some(&b) = lookup.get(&gen.bus) {
                by_bus[b].push(g);
            }
        }
        by_bus
    }

    /// Structural checks: unique bus ids, resolvable references, well-formed curves.
    pub fn validate(&self) -> ModelResult<()> {
        if !(self.base_mva > 0.0) || !self.base_mva.is_finite() {
            return Err(ModelError::Validation(format!(
                "base MVA must be positive and finite, got {}",
                self.base_mva
            )));
        }
        let lookup = self.bus_index_map();
        if lookup.len() != self.buses.len() {
            let mut seen = std::collections::HashSet::new();
            for bus in &self.buses {
                if !seen.insert(bus.id) {
                    return Err(ModelError::DuplicateBus(bus.id));
                }
            }
        }
        for branch in &self.branches {
            for bus in [branch.from_bus, branch.to_bus] {
                if !lookup.contains_key(&bus) {
                    return Err(ModelError::BranchUnknownBus {
                        branch: branch.id,
                        bus,
                    });
                }
            }
        }
        for gen in &self.gens {
            if !lookup.contains_key(&gen.bus) {
                return Err(ModelError::GenUnknownBus {
                    gen: gen.id,
                    bus: gen.bus,
                });
            }
            gen.cost_model.validate()?;
        }
        Ok(())
    }

    /// Reclassify non-flagged buses as PV (online generation attached) or PQ.
    pub fn derive_bus_types(&mut self) {
        let by_bus = self.generators_by_bus();
        for (bus, gens) in self.buses.iter_mut().zip(by_bus) {
            if matches!(bus.bus_type, BusType::Reference | BusType::Isolated) {
                continue;
            }
            let has_online_gen = gens.iter().any(|&g| self.gens[g].status);
            bus.bus_type = if has_online_gen {
                BusType::Pv
            } else {
                BusType::Pq
            };
        }
    }

    /// Clear every solve-populated field (prices, multipliers, flows).
    pub fn reset_results(&mut self) {
        self.buses.iter_mut().for_each(Bus::reset_results);
        self.branches.iter_mut().for_each(Branch::reset_results);
        self.gens.iter_mut().for_each(Gen::reset_results);
    }

    /// Total active demand of non-isolated buses
    pub fn total_demand(&self) -> Megawatts {
        self.buses
            .iter()
            .filter(|b| !b.is_isolated())
            .map(|b| b.p_demand)
            .sum()
    }

    /// Total active output of online generators
    pub fn total_generation(&self) -> Megawatts {
        self.gens.iter().filter(|g| g.status).map(|g| g.p).sum()
    }

    /// Total production cost of online generators at their current dispatch ($/h)
    pub fn total_cost(&self) -> f64 {
        self.gens
            .iter()
            .filter(|g| g.status)
            .map(Gen::production_cost)
            .sum()
    }

    pub fn stats(&self) -> NetworkStats {
        let online: Vec<&Gen> = self.gens.iter().filter(|g| g.status).collect();
        NetworkStats {
            num_buses: self.buses.len(),
            num_branches: self.branches.len(),
            num_online_branches: self.branches.iter().filter(|b| b.status).count(),
            num_gens: self.gens.len(),
            num_online_gens: online.len(),
            total_load_mw: self.total_demand().value(),
            total_gen_capacity_mw: online.iter().map(|g| g.pmax.value()).sum(),
            total_gen_pmin_mw: online.iter().map(|g| g.pmin.value()).sum(),
        }
    }
}

/// Statistics about a network's size and capacity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_branches: usize,
    pub num_online_branches: usize,
    pub num_gens: usize,
    pub num_online_gens: usize,
    pub total_load_mw: f64,
    pub total_gen_capacity_mw: f64,
    pub total_gen_pmin_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {}/{} branches online, {}/{} gens online ({:.0} MW), load {:.0} MW",
            self.num_buses,
            self.num_online_branches,
            self.num_branches,
            self.num_online_gens,
            self.num_gens,
            self.total_gen_capacity_mw,
            self.total_load_mw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_bus() -> Network {
        let mut network = Network::new("three-bus");
        network
            .add_bus(Bus::new(BusId::new(1), "Bus 1").as_reference())
            .unwrap();
        network
            .add_bus(Bus::new(BusId::new(2), "Bus 2").with_demand(60.0, 20.0))
            .unwrap();
        network
            .add_bus(Bus::new(BusId::new(3), "Bus 3").with_demand(40.0, 10.0))
            .unwrap();
        network
            .add_branch(Branch::new(BranchId::new(1), "1-2", BusId::new(1), BusId::new(2), 0.01, 0.1))
            .unwrap();
        network
            .add_branch(Branch::new(BranchId::new(2), "2-3", BusId::new(2), BusId::new(3), 0.01, 0.1))
            .unwrap();
        network
            .add_gen(
                Gen::new(GenId::new(1), "G1", BusId::new(1))
                    .with_p_limits(0.0, 150.0)
                    .with_cost(CostModel::linear(0.0, 10.0)),
            )
            .unwrap();
        network
            .add_gen(
                Gen::new(GenId::new(2), "G3", BusId::new(3))
                    .with_p_limits(10.0, 50.0)
                    .with_cost(CostModel::linear(0.0, 20.0)),
            )
            .unwrap();
        network
    }

    #[test]
    fn test_add_rejects_duplicates_and_dangling_references() {
        let mut network = three_bus();
        assert_eq!(
            network.add_bus(Bus::new(BusId::new(2), "dup")),
            Err(ModelError::DuplicateBus(BusId::new(2)))
        );
        assert!(matches!(
            network.add_branch(Branch::new(BranchId::new(9), "x", BusId::new(1), BusId::new(42), 0.0, 0.1)),
            Err(ModelError::BranchUnknownBus { .. })
        ));
        assert!(matches!(
            network.add_gen(Gen::new(GenId::new(9), "g", BusId::new(42))),
            Err(ModelError::GenUnknownBus { .. })
        ));
    }

    #[test]
    fn test_validate_catches_hand_built_problems() {
        let mut network = three_bus();
        assert!(network.validate().is_ok());

        network.gens[0].cost_model =
            CostModel::piecewise_linear(vec![(0.0, 0.0), (10.0, 100.0), (20.0, 150.0)]);
        assert!(matches!(network.validate(), Err(ModelError::InvalidCostCurve(_))));

        let mut network = three_bus();
        network.buses[2].id = BusId::new(1);
        assert!(matches!(network.validate(), Err(ModelError::DuplicateBus(_))));

        let mut network = three_bus();
        network.base_mva = 0.0;
        assert!(matches!(network.validate(), Err(ModelError::Validation(_))));
    }

    #[test]
    fn test_derive_bus_types() {
        let mut network = three_bus();
        network.derive_bus_types();
        let types: Vec<BusType> = network.buses.iter().map(|b| b.bus_type).collect();
        assert_eq!(types, vec![BusType::Reference, BusType::Pq, BusType::Pv]);

        network.gens[1].status = false;
        network.derive_bus_types();
        assert_eq!(network.buses[2].bus_type, BusType::Pq);
    }

    #[test]
    fn test_generators_by_bus() {
        let network = three_bus();
        let by_bus = network.generators_by_bus();
        assert_eq!(by_bus, vec![vec![0], vec![], vec![1]]);
    }

    #[test]
    fn test_network_stats() {
        let mut network = three_bus();
        network.branches[1].status = false;
        let stats = network.stats();
        assert_eq!(stats.num_buses, 3);
        assert_eq!(stats.num_online_branches, 1);
        assert_eq!(stats.num_online_gens, 2);
        assert!((stats.total_load_mw - 100.0).abs() < 1e-9);
        assert!((stats.total_gen_capacity_mw - 200.0).abs() < 1e-9);
        assert!((stats.total_gen_pmin_mw - 10.0).abs() < 1e-9);
        assert!(stats.to_string().contains("3 buses"));
    }

    #[test]
    fn test_reset_results_clears_prices() {
        let mut network = three_bus();
        network.buses[0].p_lambda = 12.0;
        network.branches[0].mu_s_from = 3.0;
        network.branches[0].p_from = Megawatts(40.0);
        network.gens[1].mu_pmin = 1.5;
        network.reset_results();
        assert_eq!(network.buses[0].p_lambda, 0.0);
        assert_eq!(network.branches[0].mu_s_from, 0.0);
        assert_eq!(network.branches[0].p_from, Megawatts(0.0));
        assert_eq!(network.gens[1].mu_pmin, 0.0);
    }

    #[test]
    fn test_branch_helpers() {
        let line = Branch::new(BranchId::new(1), "l", BusId::new(1), BusId::new(2), 0.0, 0.1);
        assert_eq!(line.effective_tap(), 1.0);
        assert!(!line.is_transformer());
        assert!(!line.is_rate_limited());

        let xfmr = line.clone().with_tap(0.95, Radians(0.0)).with_rate_a(120.0);
        assert!(xfmr.is_transformer());
        assert!(xfmr.is_rate_limited());
    }

    #[test]
    fn test_dispatchable_load_and_cost() {
        let mut gen = Gen::new(GenId::new(1), "vl", BusId::new(1))
            .with_p_limits(-30.0, 0.0)
            .with_cost(CostModel::linear(0.0, 50.0));
        assert!(gen.is_dispatchable_load());
        gen.p = Megawatts(-20.0);
        assert!((gen.production_cost() + 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_network_serde_roundtrip() {
        let network = three_bus();
        let json = serde_json::to_string(&network).unwrap();
        let back: Network = serde_json::from_str(&json).unwrap();
        assert_eq!(back, network);
    }
}
