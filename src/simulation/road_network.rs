//! Road connectivity graph
//!
//! Nodes are roads and edges are the road-to-road transitions a vehicle may
//! make. Used to validate vehicle paths at setup and to enumerate candidate
//! routes for route choice.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use petgraph::graph::{DiGraph, NodeIndex};

use super::types::RoadId;

/// Directed graph of permitted transitions between roads
#[derive(Debug, Clone, Default)]
pub struct SimRoadNetwork {
    graph: DiGraph<RoadId, ()>,

    /// Maps road IDs to their node indices in the graph
    road_to_node: HashMap<RoadId, NodeIndex>,
}

impl SimRoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a road to the network graph
    pub fn add_road(&mut self, road_id: RoadId) {
        if self.road_to_node.contains_key(&road_id) {
            return;
        }
        let node = self.graph.add_node(road_id);
        self.road_to_node.insert(road_id, node);
    }

    /// Allow vehicles at the end of `from` to continue onto `to`
    pub fn connect(&mut self, from: RoadId, to: RoadId) -> Result<()> {
        if from == to {
            bail!("Road {:?} cannot connect to itself", from);
        }
        let from_node = self.node(from)?;
        let to_node = self.node(to)?;
        if !self.graph.contains_edge(from_node, to_node) {
            self.graph.add_edge(from_node, to_node, ());
        }
        Ok(())
    }

    pub fn is_connected(&self, from: RoadId, to: RoadId) -> bool {
        match (self.road_to_node.get(&from), self.road_to_node.get(&to)) {
            (Some(a), Some(b)) => self.graph.contains_edge(*a, *b),
            _ => false,
        }
    }

    pub fn road_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check that every road exists and each consecutive pair is connected
    pub fn validate_path(&self, path: &[RoadId]) -> Result<()> {
        if path.is_empty() {
            bail!("Path is empty");
        }
        for road in path {
            self.node(*road)?;
        }
        for pair in path.windows(2) {
            if !self.is_connected(pair[0], pair[1]) {
                bail!("No connection from {:?} to {:?}", pair[0], pair[1]);
            }
        }
        Ok(())
    }

    /// Every simple path from an origin road to a destination road.
    ///
    /// Routes are returned in a deterministic order: by origin, then by
    /// destination, then depth-first following connection insertion order.
    /// `max_len` bounds the number of roads in a route.
    pub fn enumerate_routes(
        &self,
        origins: &[RoadId],
        destinations: &[RoadId],
        max_len: usize,
    ) -> Result<Vec<Vec<RoadId>>> {
        let mut routes = Vec::new();
        for origin in origins {
            let start = self.node(*origin)?;
            for destination in destinations {
                let goal = self.node(*destination)?;
                let mut stack = vec![start];
                self.collect_paths(start, goal, max_len, &mut stack, &mut routes);
            }
        }
        Ok(routes)
    }

    fn collect_paths(
        &self,
        current: NodeIndex,
        goal: NodeIndex,
        max_len: usize,
        stack: &mut Vec<NodeIndex>,
        routes: &mut Vec<Vec<RoadId>>,
    ) {
        if current == goal {
            routes.push(stack.iter().map(|n| self.graph[*n]).collect());
            return;
        }
        if stack.len() >= max_len {
            return;
        }
        // petgraph yields neighbors newest-edge first
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors(current).collect();
        neighbors.reverse();
        for next in neighbors {
            if stack.contains(&next) {
                continue;
            }
            stack.push(next);
            self.collect_paths(next, goal, max_len, stack, routes);
            stack.pop();
        }
    }

    fn node(&self, road: RoadId) -> Result<NodeIndex> {
        self.road_to_node
            .get(&road)
            .copied()
            .with_context(|| format!("Road {:?} not found in network", road))
    }
}
