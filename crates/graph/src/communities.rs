use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use recall_entities::{EntityKey, Fact};

type Graph = DiGraph<EntityKey, Fact>;

fn undirected_neighbors(graph: &Graph, node: NodeIndex) -> Vec<NodeIndex> {
  graph
    .edges_directed(node, petgraph::Direction::Outgoing)
    .map(|e| e.target())
    .chain(graph.edges_directed(node, petgraph::Direction::Incoming).map(|e| e.source()))
    .collect()
}

fn to_key_map(graph: &Graph, labels: HashMap<NodeIndex, u64>) -> HashMap<EntityKey, u64> {
  labels.into_iter().map(|(idx, label)| (graph[idx].clone(), label)).collect()
}

/// Connected components via BFS over the graph treated as undirected —
/// the simplest of the three algorithms.
#[must_use]
pub fn connected_components(graph: &Graph) -> HashMap<EntityKey, u64> {
  let mut labels: HashMap<NodeIndex, u64> = HashMap::new();
  let mut next_label = 0u64;

  for start in graph.node_indices() {
    if labels.contains_key(&start) {
      continue;
    }
    let mut stack = vec![start];
    labels.insert(start, next_label);
    while let Some(node) = stack.pop() {
      for neighbor in undirected_neighbors(graph, node) {
        labels.entry(neighbor).or_insert_with(|| {
          stack.push(neighbor);
          next_label
        });
      }
    }
    next_label += 1;
  }
  to_key_map(graph, labels)
}

/// Synchronous label propagation: each node adopts the most frequent label
/// among its neighbors, breaking ties toward the smallest label, for a
/// fixed number of rounds or until stable.
#[must_use]
pub fn label_propagation(graph: &Graph) -> HashMap<EntityKey, u64> {
  let mut labels: HashMap<NodeIndex, u64> = graph.node_indices().enumerate().map(|(i, idx)| (idx, i as u64)).collect();
  const MAX_ROUNDS: usize = 20;

  for _ in 0..MAX_ROUNDS {
    let mut changed = false;
    for node in graph.node_indices() {
      let neighbors = undirected_neighbors(graph, node);
      if neighbors.is_empty() {
        continue;
      }
      let mut counts: HashMap<u64, usize> = HashMap::new();
      for neighbor in neighbors {
        *counts.entry(labels[&neighbor]).or_insert(0) += 1;
      }
      let best = counts.into_iter().max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0))).map(|(label, _)| label);
      if let Some(best) = best {
        if labels[&node] != best {
          labels.insert(node, best);
          changed = true;
        }
      }
    }
    if !changed {
      break;
    }
  }
  to_key_map(graph, labels)
}

/// Single-pass greedy modularity optimization: a simplified Louvain that
/// runs one local-moving phase (no multi-level aggregation). Sufficient
/// for the entity-clustering use case at the corpus sizes this store
/// targets; a full multi-level Louvain is more machinery than this
/// clustering step needs.
#[must_use]
pub fn louvain(graph: &Graph) -> HashMap<EntityKey, u64> {
  let m = graph.edge_count().max(1) as f64;
  let degree: HashMap<NodeIndex, usize> = graph.node_indices().map(|n| (n, undirected_neighbors(graph, n).len())).collect();
  let mut community: HashMap<NodeIndex, u64> = graph.node_indices().enumerate().map(|(i, idx)| (idx, i as u64)).collect();

  const MAX_PASSES: usize = 10;
  for _ in 0..MAX_PASSES {
    let mut moved = false;
    for node in graph.node_indices() {
      let neighbors = undirected_neighbors(graph, node);
      if neighbors.is_empty() {
        continue;
      }
      let current = community[&node];
      let mut gains: HashMap<u64, f64> = HashMap::new();
      for neighbor in &neighbors {
        let target_community = community[neighbor];
        let k_i = degree[&node] as f64;
        let sigma_tot: f64 = community.iter().filter(|(_, &c)| c == target_community).map(|(n, _)| degree[n] as f64).sum();
        // simplified modularity-gain proxy: edges into the target
        // community minus the expected fraction under the null model.
        let edges_into: f64 = neighbors.iter().filter(|n| community[n] == target_community).count() as f64;
        let gain = edges_into / m - (sigma_tot * k_i) / (2.0 * m * m);
        gains.insert(target_community, gain);
      }
      if let Some((&best_community, &best_gain)) = gains.iter().max_by(|a, b| a.1.partial_cmp(b.1).unwrap()) {
        let current_gain = *gains.get(&current).unwrap_or(&0.0);
        if best_community != current && best_gain > current_gain {
          community.insert(node, best_community);
          moved = true;
        }
      }
    }
    if !moved {
      break;
    }
  }
  to_key_map(graph, community)
}

#[cfg(test)]
mod tests {
  use recall_entities::{EntityType, Fact, FactObject};

  use super::*;

  fn key(name: &str) -> EntityKey {
    EntityKey::new(name, EntityType::Person)
  }

  fn two_clusters() -> Graph {
    let mut graph = DiGraph::new();
    let a = graph.add_node(key("a"));
    let b = graph.add_node(key("b"));
    let c = graph.add_node(key("c"));
    let d = graph.add_node(key("d"));
    graph.add_edge(a, b, Fact::new(key("a"), "knows", FactObject::Entity(key("b")), 0.9));
    graph.add_edge(c, d, Fact::new(key("c"), "knows", FactObject::Entity(key("d")), 0.9));
    graph
  }

  #[test]
  fn connected_components_splits_disjoint_clusters() {
    let graph = two_clusters();
    let labels = connected_components(&graph);
    assert_eq!(labels[&key("a")], labels[&key("b")]);
    assert_eq!(labels[&key("c")], labels[&key("d")]);
    assert_ne!(labels[&key("a")], labels[&key("c")]);
  }

  #[test]
  fn label_propagation_agrees_within_a_cluster() {
    let graph = two_clusters();
    let labels = label_propagation(&graph);
    assert_eq!(labels[&key("a")], labels[&key("b")]);
  }
}
