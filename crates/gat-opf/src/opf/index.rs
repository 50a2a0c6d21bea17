//! Participation index: which network elements take part in a solve and where they sit
//! in the optimization model.
//!
//! Model ordering keeps network order. Buses flagged isolated, out-of-service branches
//! and offline generators are left out, as is anything attached to an isolated bus.
//! Islands with neither online generation nor demand are left out as well; an island
//! that carries demand but has no generation stays in and fails the capacity check.

use crate::error::{ConfigurationError, OpfError};
use gat_core::{find_islands, BusId, BusType, ModelError, Network};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One connected island in model ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct IslandIndex {
    /// Model bus indices
    pub buses: Vec<usize>,
    /// Model bus index of the angle reference
    pub reference: usize,
    /// Model generator indices
    pub gens: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkIndex {
    /// Network bus position of every model bus
    pub buses: Vec<usize>,
    /// Network branch position of every model branch
    pub branches: Vec<usize>,
    /// Network generator position of every model generator
    pub gens: Vec<usize>,
    pub branch_from: Vec<usize>,
    pub branch_to: Vec<usize>,
    pub gen_bus: Vec<usize>,
    pub islands: Vec<IslandIndex>,
}

impl NetworkIndex {
    pub fn build(network: &Network) -> Result<Self, OpfError> {
        let lookup = network.bus_index_map();
        if lookup.len() != network.buses.len() {
            let mut seen = HashSet::new();
            if let Some(dup) = network.buses.iter().find(|b| !seen.insert(b.id)) {
                return Err(ModelError::DuplicateBus(dup.id).into());
            }
        }

        let live = |p: usize| network.buses[p].bus_type != BusType::Isolated;
        if !(0..network.buses.len()).any(live) {
            return Err(ConfigurationError::NoBuses.into());
        }

        let resolve = |entity: String, bus: BusId| -> Result<usize, ConfigurationError> {
            lookup
                .get(&bus)
                .copied()
                .ok_or(ConfigurationError::UnknownBus { entity, bus })
        };
        let branch_ends = network
            .branches
            .iter()
            .map(|branch| {
                let entity = format!("branch {:?}", branch.id);
                Ok((resolve(entity.clone(), branch.from_bus)?, resolve(entity, branch.to_bus)?))
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;
        let gen_pos = network
            .gens
            .iter()
            .map(|gen| resolve(format!("generator {:?}", gen.id), gen.bus))
            .collect::<Result<Vec<_>, ConfigurationError>>()?;

        let mut supplied = vec![false; network.buses.len()];
        for (gen, &b) in network.gens.iter().zip(&gen_pos) {
            if gen.status && live(b) {
                supplied[b] = true;
            }
        }
        if !supplied.contains(&true) {
            return Err(ConfigurationError::NoGenerators.into());
        }

        // An island with no online generation and nothing to serve is de-energized.
        let analysis = find_islands(network);
        let mut dead = vec![false; network.buses.len()];
        let mut energized = Vec::with_capacity(analysis.num_islands());
        for island in &analysis.islands {
            let has_gen = island.buses.iter().any(|&p| supplied[p]);
            let has_demand = island.buses.iter().any(|&p| {
                let bus = &network.buses[p];
                bus.p_demand.value() != 0.0
                    || bus.q_demand.value() != 0.0
                    || bus.g_shunt.value() != 0.0
            });
            if has_gen || has_demand {
                energized.push(island);
            } else {
                debug!(
                    island = island.island_id,
                    buses = island.buses.len(),
                    "dropping island with no generation and no demand"
                );
                island.buses.iter().for_each(|&p| dead[p] = true);
            }
        }

        let buses: Vec<usize> = (0..network.buses.len())
            .filter(|&p| live(p) && !dead[p])
            .collect();
        let mut model_bus = vec![None; network.buses.len()];
        for (k, &pos) in buses.iter().enumerate() {
            model_bus[pos] = Some(k);
        }

        let mut branches = Vec::new();
        let mut branch_from = Vec::new();
        let mut branch_to = Vec::new();
        for (pos, (branch, &(f, t))) in network.branches.iter().zip(&branch_ends).enumerate() {
            if !branch.status {
                continue;
            }
            if let (Some(mf), Some(mt)) = (model_bus[f], model_bus[t]) {
                branches.push(pos);
                branch_from.push(mf);
                branch_to.push(mt);
            }
        }

        let mut gens = Vec::new();
        let mut gen_bus = Vec::new();
        for (pos, (gen, &b)) in network.gens.iter().zip(&gen_pos).enumerate() {
            if !gen.status {
                continue;
            }
            if let Some(mb) = model_bus[b] {
                gens.push(pos);
                gen_bus.push(mb);
            }
        }

        let mut gens_by_bus: HashMap<usize, Vec<usize>> = HashMap::new();
        for (g, &b) in gen_bus.iter().enumerate() {
            gens_by_bus.entry(b).or_default().push(g);
        }
        let mut islands = Vec::with_capacity(energized.len());
        for island in energized {
            let members: Vec<usize> = island.buses.iter().filter_map(|&p| model_bus[p]).collect();
            let Some(&first) = members.first() else {
                continue;
            };
            let refs: Vec<usize> = members
                .iter()
                .copied()
                .filter(|&k| network.buses[buses[k]].bus_type == BusType::Reference)
                .collect();
            let reference = match refs.as_slice() {
                [] => {
                    warn!(
                        bus = ?network.buses[buses[first]].id,
                        island = island.island_id,
                        "island has no reference bus, using its first bus"
                    );
                    first
                }
                [single] => *single,
                [r, ..] => {
                    return Err(ConfigurationError::MultipleReferenceBuses {
                        first: network.buses[buses[*r]].id,
                        count: refs.len(),
                    }
                    .into())
                }
            };
            let island_gens = members
                .iter()
                .flat_map(|b| gens_by_bus.get(b).into_iter().flatten().copied())
                .collect();
            islands.push(IslandIndex {
                buses: members,
                reference,
                gens: island_gens,
            });
        }

        Ok(Self {
            buses,
            branches,
            gens,
            branch_from,
            branch_to,
            gen_bus,
            islands,
        })
    }

    #[inline]
    pub fn nb(&self) -> usize {
        self.buses.len()
    }

    #[inline]
    pub fn nl(&self) -> usize {
        self.branches.len()
    }

    #[inline]
    pub fn ng(&self) -> usize {
        self.gens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gat_core::{Branch, BranchId, Bus, CostModel, Gen, GenId};

    fn four_bus() -> Network {
        let mut network = Network::new("four");
        for i in 1..=4 {
            network.add_bus(Bus::new(BusId::new(i), format!("b{i}"))).unwrap();
        }
        for (k, (f, t)) in [(1, 2), (3, 4)].into_iter().enumerate() {
            network
                .add_branch(Branch::new(BranchId::new(k), "", BusId::new(f), BusId::new(t), 0.0, 0.1))
                .unwrap();
        }
        for (k, bus) in [2, 4].into_iter().enumerate() {
            network
                .add_gen(
                    Gen::new(GenId::new(k), "", BusId::new(bus))
                        .with_p_limits(0.0, 50.0)
                        .with_cost(CostModel::linear(0.0, 5.0)),
                )
                .unwrap();
        }
        network
    }

    #[test]
    fn islands_pick_reference_or_first_bus() {
        let mut network = four_bus();
        network.buses[3].bus_type = BusType::Reference;
        let index = NetworkIndex::build(&network).unwrap();
        assert_eq!(index.islands.len(), 2);
        assert_eq!(index.islands[0].reference, 0);
        assert_eq!(index.islands[1].reference, 3);
        assert_eq!(index.islands[0].gens, vec![0]);
        assert_eq!(index.islands[1].gens, vec![1]);
    }

    #[test]
    fn two_references_in_one_island_fail() {
        let mut network = four_bus();
        network.buses[2].bus_type = BusType::Reference;
        network.buses[3].bus_type = BusType::Reference;
        let err = NetworkIndex::build(&network).unwrap_err();
        assert_eq!(
            err,
            OpfError::Configuration(ConfigurationError::MultipleReferenceBuses {
                first: BusId::new(3),
                count: 2
            })
        );
    }

    #[test]
    fn isolated_elements_are_excluded() {
        let mut network = four_bus();
        network.buses[3].bus_type = BusType::Isolated;
        let index = NetworkIndex::build(&network).unwrap();
        assert_eq!(index.buses, vec![0, 1]);
        assert_eq!(index.branches, vec![0]);
        assert_eq!(index.gens, vec![0]);
        assert_eq!(index.islands.len(), 1);
    }

    #[test]
    fn unsupplied_islands_drop_only_without_demand() {
        let mut network = four_bus();
        network.gens[1].status = false;
        network.add_bus(Bus::new(BusId::new(5), "lone")).unwrap();
        let index = NetworkIndex::build(&network).unwrap();
        assert_eq!(index.buses, vec![0, 1]);
        assert_eq!(index.branches, vec![0]);
        assert_eq!(index.islands.len(), 1);

        network.buses[2] = network.buses[2].clone().with_demand(10.0, 0.0);
        let index = NetworkIndex::build(&network).unwrap();
        assert_eq!(index.buses, vec![0, 1, 2, 3]);
        assert_eq!(index.branches, vec![0, 1]);
        assert_eq!(index.islands.len(), 2);
        assert!(index.islands[1].gens.is_empty());
    }

    #[test]
    fn missing_generators_and_dangling_buses() {
        let mut network = four_bus();
        network.gens.iter_mut().for_each(|g| g.status = false);
        assert_eq!(
            NetworkIndex::build(&network).unwrap_err(),
            OpfError::Configuration(ConfigurationError::NoGenerators)
        );

        let mut network = four_bus();
        network.gens[0].bus = BusId::new(99);
        assert!(matches!(
            NetworkIndex::build(&network),
            Err(OpfError::Configuration(ConfigurationError::UnknownBus { .. }))
        ));
    }
}
