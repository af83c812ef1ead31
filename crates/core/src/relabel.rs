use std::collections::HashMap;

use indexmap::IndexSet;

use crate::error::{BadInputReason, Error, Result};
use crate::vertex::VertexId;
use crate::weight::Weight;

/// A bijection between arbitrary user vertex ids (`u32`) and the contiguous
/// `0..n` ids the rest of the solver works with.
///
/// If the input ids already happen to be exactly `0..n`, the map is skipped
/// entirely (`is_identity() == true`) and `to_new`/`to_old` are the
/// identity function: a deliberate performance win on the (common) case of
/// pre-numbered graphs, called out explicitly in the design.
pub struct Relabelling {
    old_to_new: Option<HashMap<u32, u32>>,
    new_to_old: Vec<u32>,
}

impl Relabelling {
    /// Build a relabelling covering exactly the vertices mentioned in
    /// `edges`, and rewrite `edges` into an edge list over the new ids.
    ///
    /// Fails with [`BadInputReason::SelfLoop`] if any edge is a loop.
    /// Inconsistent reversed duplicate edges are not checked here -- that
    /// is [`crate::Graph::from_edges`]'s job, once ids are already new.
    pub fn build(edges: &[(u32, u32, Weight)]) -> Result<(Self, Vec<(u32, u32, Weight)>)> {
        let mut order: IndexSet<u32> = IndexSet::new();
        for &(u, v, _) in edges {
            if u == v {
                return Err(Error::BadInput(BadInputReason::SelfLoop));
            }
            order.insert(u);
            order.insert(v);
        }
        let n = order.len();
        let is_identity = order.iter().enumerate().all(|(i, &old)| i as u32 == old);

        if is_identity {
            let new_to_old: Vec<u32> = (0..n as u32).collect();
            let relabelling = Relabelling {
                old_to_new: None,
                new_to_old,
            };
            return Ok((relabelling, edges.to_vec()));
        }

        let new_to_old: Vec<u32> = order.iter().copied().collect();
        let mut old_to_new = HashMap::with_capacity(n);
        for (new, &old) in new_to_old.iter().enumerate() {
            old_to_new.insert(old, new as u32);
        }

        let new_edges: Vec<(u32, u32, Weight)> = edges
            .iter()
            .map(|&(u, v, w)| (old_to_new[&u], old_to_new[&v], w))
            .collect();

        Ok((
            Relabelling {
                old_to_new: Some(old_to_new),
                new_to_old,
            },
            new_edges,
        ))
    }

    pub fn is_identity(&self) -> bool {
        self.old_to_new.is_none()
    }

    pub fn num_vertices(&self) -> usize {
        self.new_to_old.len()
    }

    /// Map a user id to its contiguous id, if that user id was seen.
    pub fn to_new(&self, old: u32) -> Option<VertexId> {
        match &self.old_to_new {
            None => {
                if (old as usize) < self.new_to_old.len() {
                    Some(VertexId(old))
                } else {
                    None
                }
            }
            Some(map) => map.get(&old).copied().map(VertexId),
        }
    }

    /// Map a contiguous id back to the user's original id.
    pub fn to_old(&self, new: VertexId) -> u32 {
        self.new_to_old[new.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_contiguous_ids_skip_the_map() {
        let edges = vec![(0, 1, 1), (1, 2, 2)];
        let (r, new_edges) = Relabelling::build(&edges).unwrap();
        assert!(r.is_identity());
        assert_eq!(new_edges, edges);
        assert_eq!(r.to_old(VertexId(1)), 1);
    }

    #[test]
    fn arbitrary_ids_are_rewritten_and_invertible() {
        let edges = vec![(100, 205, 1), (205, 7, 2)];
        let (r, new_edges) = Relabelling::build(&edges).unwrap();
        assert!(!r.is_identity());
        assert_eq!(r.num_vertices(), 3);
        for &(u, v, _) in &edges {
            let nu = r.to_new(u).unwrap();
            let nv = r.to_new(v).unwrap();
            assert_eq!(r.to_old(nu), u);
            assert_eq!(r.to_old(nv), v);
        }
        for &(u, v, w) in &new_edges {
            assert!(u < 3 && v < 3);
            let _ = w;
        }
    }

    #[test]
    fn rejects_self_loop() {
        let err = Relabelling::build(&[(0, 0, 1)]).unwrap_err();
        assert_eq!(err, Error::BadInput(BadInputReason::SelfLoop));
    }
}
