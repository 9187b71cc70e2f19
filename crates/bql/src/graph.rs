//! Dependency graph construction and bounded BFS expansion.
//!
//! The graph holds every non-deleted relationship edge as two mirrored
//! adjacency maps so neighbors can be found in O(1) in either direction.
//! Expansion is cycle-safe: an ID is checked against the visited set before
//! it joins any frontier, so self-loops and cycles cannot cause re-visits.

use std::collections::{HashMap, HashSet};

use crate::ast::{Depth, Direction};
use crate::domain::RelationType;

/// Iteration ceiling applied when depth is unlimited. Cycle-safety does not
/// depend on this; it bounds wall-clock on pathologically deep graphs.
pub const MAX_EXPAND_ROUNDS: usize = 100;

/// One directed edge endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub target: String,
    pub relation: RelationType,
}

/// A raw relationship row from the store: subject → target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRow {
    pub issue_id: String,
    pub target_id: String,
    pub relation: RelationType,
}

/// Result of a graph expansion: every reachable ID (bases included), and
/// whether the unlimited-depth iteration ceiling cut the walk short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandResult {
    pub ids: HashSet<String>,
    pub truncated: bool,
}

/// The full relationship graph, held as mirrored forward/reverse adjacency
/// maps.
///
/// Forward holds edges where the key is the subject of a relation
/// (child → parent, blocked → blocker, discovery → origin); Reverse is the
/// exact inverse, built from the same rows. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    forward: HashMap<String, Vec<Edge>>,
    reverse: HashMap<String, Vec<Edge>>,
}

impl DependencyGraph {
    /// Build both adjacency maps in one pass over the edge rows. The mirror
    /// invariant holds by construction: every forward edge (a → b) inserts
    /// the reverse edge (b → a).
    pub fn from_rows(rows: Vec<DependencyRow>) -> Self {
        let mut graph = DependencyGraph::default();
        for row in rows {
            graph.forward.entry(row.issue_id.clone()).or_default().push(Edge {
                target: row.target_id.clone(),
                relation: row.relation,
            });
            graph.reverse.entry(row.target_id).or_default().push(Edge {
                target: row.issue_id,
                relation: row.relation,
            });
        }
        graph
    }

    /// Expand a base ID set through the graph.
    ///
    /// Runs up to `depth` BFS rounds (`Unlimited` is capped at
    /// `MAX_EXPAND_ROUNDS`), following forward edges for `Up`, reverse
    /// edges for `Down`, or both for `All`. Returns the full visited set
    /// including the base IDs. Stops early once a round yields nothing new.
    pub fn expand(&self, base_ids: &[String], direction: Direction, depth: Depth) -> ExpandResult {
        let rounds = match depth {
            Depth::Levels(n) => n as usize,
            Depth::Unlimited => MAX_EXPAND_ROUNDS,
        };

        let mut visited: HashSet<String> = base_ids.iter().cloned().collect();
        let mut frontier: Vec<String> = visited.iter().cloned().collect();

        for _ in 0..rounds {
            let mut next = Vec::new();
            for id in &frontier {
                for neighbor in self.neighbors(id, direction) {
                    if visited.insert(neighbor.clone()) {
                        next.push(neighbor);
                    }
                }
            }
            if next.is_empty() {
                return ExpandResult {
                    ids: visited,
                    truncated: false,
                };
            }
            frontier = next;
        }

        // Ran out of rounds with a live frontier; the walk is truncated
        // only if that frontier still has unvisited neighbors.
        let truncated = frontier.iter().any(|id| {
            self.neighbors(id, direction)
                .iter()
                .any(|n| !visited.contains(n))
        });
        ExpandResult {
            ids: visited,
            truncated,
        }
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<String> {
        let mut out = Vec::new();
        if matches!(direction, Direction::Up | Direction::All) {
            if let Some(edges) = self.forward.get(id) {
                out.extend(edges.iter().map(|e| e.target.clone()));
            }
        }
        if matches!(direction, Direction::Down | Direction::All) {
            if let Some(edges) = self.reverse.get(id) {
                out.extend(edges.iter().map(|e| e.target.clone()));
            }
        }
        out
    }

    /// Forward edges for an ID (subject → object).
    pub fn forward_edges(&self, id: &str) -> &[Edge] {
        self.forward.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reverse edges for an ID (object → subject).
    pub fn reverse_edges(&self, id: &str) -> &[Edge] {
        self.reverse.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}
