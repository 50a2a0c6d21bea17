//! Connectivity analysis over in-service branches.

use crate::{BusType, Network};
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::VecDeque;

/// One electrically connected group of buses.
#[derive(Debug, Clone, PartialEq)]
pub struct Island {
    pub island_id: usize,
    /// Bus positions (into `Network::buses`), ascending
    pub buses: Vec<usize>,
}

/// Island labeling for every bus in the network.
#[derive(Debug, Clone, PartialEq)]
pub struct IslandAnalysis {
    pub islands: Vec<Island>,
    /// Island of each bus position; `None` for buses flagged isolated
    pub bus_island: Vec<Option<usize>>,
}

impl IslandAnalysis {
    pub fn num_islands(&self) -> usize {
        self.islands.len()
    }
}

/// Build the bus graph: one node per bus position, one edge per in-service branch
/// between two non-isolated buses.
pub fn bus_graph(network: &Network) -> UnGraph<usize, usize> {
    let lookup = network.bus_index_map();
    let mut graph = UnGraph::with_capacity(network.buses.len(), network.branches.len());
    let nodes: Vec<NodeIndex> = (0..network.buses.len()).map(|i| graph.add_node(i)).collect();
    for (l, branch) in network.branches.iter().enumerate() {
        if !branch.status {
            continue;
        }
        let (Some(&f), Some(&t)) = (lookup.get(&branch.from_bus), lookup.get(&branch.to_bus)) else {
            continue;
        };
        if network.buses[f].bus_type == BusType::Isolated
            || network.buses[t].bus_type == BusType::Isolated
        {
            continue;
        }
        graph.add_edge(nodes[f], nodes[t], l);
    }
    graph
}

/// Label connected components with a breadth-first search from each unvisited bus.
///
/// Islands are numbered in order of their lowest bus position.
pub fn find_islands(network: &Network) -> IslandAnalysis {
    let graph = bus_graph(network);
    let mut bus_island = vec![None; network.buses.len()];
    let mut islands = Vec::new();

    for start in graph.node_indices() {
        let bus = graph[start];
        if bus_island[bus].is_some() || network.buses[bus].bus_type == BusType::Isolated {
            continue;
        }
        let island_id = islands.len();
        let mut members = Vec::new();
        let mut queue = VecDeque::from([start]);
        bus_island[bus] = Some(island_id);
        while let Some(node) = queue.pop_front() {
            members.push(graph[node]);
            for neighbor in graph.neighbors(node) {
                if bus_island[graph[neighbor]].is_none() {
                    bus_island[graph[neighbor]] = Some(island_id);
                    queue.push_back(neighbor);
                }
            }
        }
        members.sort_unstable();
        islands.push(Island {
            island_id,
            buses: members,
        });
    }

    IslandAnalysis {
        islands,
        bus_island,
    }
}
