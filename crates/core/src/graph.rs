use indexmap::IndexMap;

use crate::error::{BadInputReason, Error, Result};
use crate::vertex::VertexId;
use crate::weight::Weight;

/// An immutable, undirected, simple graph with non-negative integer edge
/// weights, built once from a validated edge map and never mutated again.
///
/// Vertex ids must already be contiguous `0..num_vertices`; `Graph` itself
/// does not relabel (see [`crate::Relabelling`] for that). Adjacency is
/// stored as one `Vec<(VertexId, Weight)>` per vertex, sorted by neighbour
/// id, so `edge_weight` is a binary search and `neighbours_and_weights`
/// returns a stable slice reference.
#[derive(Debug, Clone)]
pub struct Graph {
    adjacency: Vec<Vec<(VertexId, Weight)>>,
    num_edges: usize,
}

impl Graph {
    /// Build from a map of canonical (unordered) edges to weights.
    ///
    /// Fails with [`BadInputReason::SelfLoop`] on a loop, with
    /// [`BadInputReason::NonContiguousVertices`] if the vertex ids spanned
    /// by the edges are not exactly `0..n`, and with
    /// [`BadInputReason::EmptyGraph`] if `edges` is empty. Duplicate
    /// reversed pairs are expected to have already been reconciled by the
    /// caller (relabelling does this); if `edges` itself contains the same
    /// unordered pair twice with different weights this is a logic error in
    /// the caller, not something this constructor re-validates.
    pub fn from_edges(edges: &[(u32, u32, Weight)]) -> Result<Self> {
        if edges.is_empty() {
            return Err(Error::BadInput(BadInputReason::EmptyGraph));
        }
        let mut max_vertex = 0u32;
        let mut seen = std::collections::HashSet::new();
        for &(u, v, _) in edges {
            if u == v {
                return Err(Error::BadInput(BadInputReason::SelfLoop));
            }
            seen.insert(u);
            seen.insert(v);
            max_vertex = max_vertex.max(u).max(v);
        }
        let num_vertices = max_vertex as usize + 1;
        if seen.len() != num_vertices {
            return Err(Error::BadInput(BadInputReason::NonContiguousVertices));
        }

        let mut pairwise: IndexMap<(u32, u32), Weight> = IndexMap::new();
        for &(u, v, w) in edges {
            let (a, b) = if u < v { (u, v) } else { (v, u) };
            if let Some(&existing) = pairwise.get(&(a, b)) {
                if existing != w {
                    return Err(Error::BadInput(BadInputReason::InconsistentDuplicateEdge));
                }
            } else {
                pairwise.insert((a, b), w);
            }
        }

        let mut adjacency = vec![Vec::new(); num_vertices];
        for (&(a, b), &w) in &pairwise {
            adjacency[a as usize].push((VertexId(b), w));
            adjacency[b as usize].push((VertexId(a), w));
        }
        for adj in &mut adjacency {
            adj.sort_unstable_by_key(|(v, _)| v.0);
        }

        Ok(Graph {
            adjacency,
            num_edges: pairwise.len(),
        })
    }

    pub fn num_vertices(&self) -> usize {
        self.adjacency.len()
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    pub fn degree(&self, v: VertexId) -> usize {
        self.adjacency[v.index()].len()
    }

    /// Neighbours of `v` with edge weights, sorted by neighbour id.
    pub fn neighbours_and_weights(&self, v: VertexId) -> &[(VertexId, Weight)] {
        &self.adjacency[v.index()]
    }

    /// Weight of edge `(u, v)` if present, via binary search.
    pub fn edge_weight(&self, u: VertexId, v: VertexId) -> Option<Weight> {
        self.adjacency[u.index()]
            .binary_search_by_key(&v.0, |(n, _)| n.0)
            .ok()
            .map(|i| self.adjacency[u.index()][i].1)
    }

    /// Degree sequence of `v`'s neighbours, sorted ascending. Allocates;
    /// intended for one-off use during domain initialisation.
    pub fn sorted_degree_sequence(&self, v: VertexId) -> Vec<usize> {
        let mut seq: Vec<usize> = self.adjacency[v.index()]
            .iter()
            .map(|&(n, _)| self.degree(n))
            .collect();
        seq.sort_unstable();
        seq
    }

    /// Every edge weight present in the graph. Allocates; used for
    /// trivial-upper-bound style checks, not on any hot path.
    pub fn all_weights(&self) -> Vec<Weight> {
        let mut out = Vec::with_capacity(self.num_edges);
        for (u, adj) in self.adjacency.iter().enumerate() {
            for &(v, w) in adj {
                if v.index() > u {
                    out.push(w);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_round_trips_edge_weights() {
        let g = Graph::from_edges(&[(0, 1, 1), (1, 2, 2), (0, 2, 3)]).unwrap();
        assert_eq!(g.num_vertices(), 3);
        assert_eq!(g.num_edges(), 3);
        assert_eq!(g.edge_weight(VertexId(0), VertexId(1)), Some(1));
        assert_eq!(g.edge_weight(VertexId(1), VertexId(0)), Some(1));
        assert_eq!(g.edge_weight(VertexId(0), VertexId(2)), Some(3));
        assert_eq!(g.edge_weight(VertexId(1), VertexId(2)), Some(2));
        for v in [VertexId(0), VertexId(1), VertexId(2)] {
            assert_eq!(g.degree(v), 2);
        }
    }

    #[test]
    fn rejects_self_loop() {
        let err = Graph::from_edges(&[(0, 0, 1)]).unwrap_err();
        assert_eq!(err, Error::BadInput(BadInputReason::SelfLoop));
    }

    #[test]
    fn rejects_empty_edge_set() {
        let err = Graph::from_edges(&[]).unwrap_err();
        assert_eq!(err, Error::BadInput(BadInputReason::EmptyGraph));
    }

    #[test]
    fn rejects_non_contiguous_vertices() {
        // vertex 1 never appears, so {0, 5} is not 0..n
        let err = Graph::from_edges(&[(0, 5, 1)]).unwrap_err();
        assert_eq!(err, Error::BadInput(BadInputReason::NonContiguousVertices));
    }

    #[test]
    fn rejects_inconsistent_duplicate_edge() {
        let err = Graph::from_edges(&[(0, 1, 1), (1, 0, 2)]).unwrap_err();
        assert_eq!(
            err,
            Error::BadInput(BadInputReason::InconsistentDuplicateEdge)
        );
    }
}
