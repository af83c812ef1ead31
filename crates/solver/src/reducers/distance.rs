use wsm_core::{Bitset, VertexId};

use crate::filter_utils::compatible_sorted_degree_counts;
use crate::nodes::{DomainsAccessor, ReductionResult};

use super::GraphContext;

/// Distance-`k` reducer, for some fixed `k >= 2`: tightens `Dom(pv')` for
/// every `pv'` at pattern-graph distance exactly `k` from a just-assigned
/// `pv` down to `tv`'s target vertices within distance `k`.
///
/// Grounded on `DistancesReducer.cpp`.
pub struct DistanceReducer {
    pub k: usize,
}

impl DistanceReducer {
    pub fn check(&mut self, ctx: &mut GraphContext<'_>, pv: VertexId, tv: VertexId) -> bool {
        let p_counts = ctx.pattern_nn.degree_counts_at(pv, self.k);
        let p_counts = p_counts.to_vec();
        let t_counts = ctx.target_nn.degree_counts_upto(tv, self.k);
        compatible_sorted_degree_counts(&p_counts, t_counts)
    }

    pub fn reduce(
        &mut self,
        ctx: &mut GraphContext<'_>,
        accessor: &mut DomainsAccessor<'_>,
        pv: VertexId,
        tv: VertexId,
        scratch: &mut Bitset,
    ) -> ReductionResult {
        let k = self.k;
        let num_tv = ctx.target_graph.num_vertices();
        let pv_at_d: Vec<VertexId> = ctx.pattern_nn.at_distance(pv, k).iter().collect();
        if scratch.len() != num_tv {
            *scratch = Bitset::with_capacity(num_tv);
        }
        scratch.clear();
        scratch.union_assign(ctx.target_nn.up_to_distance(tv, k));
        let mut result = ReductionResult::Success;
        for pv2 in pv_at_d {
            // Sound symmetry skip: the distance-k mapping is symmetric in
            // `pv`/`pv2`, the same way `NeighboursReducer`'s is, so an
            // already-assigned pv2 is guaranteed to pass.
            if super::already_assigned(accessor, pv2) {
                continue;
            }
            match accessor.intersect_domain(pv2, scratch).reduction_result {
                ReductionResult::NoGood => return ReductionResult::NoGood,
                ReductionResult::NewAssignment => result = ReductionResult::NewAssignment,
                ReductionResult::Success => {}
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodesRawData;
    use std::rc::Rc;
    use wsm_core::{Graph, NearNeighbours};

    #[test]
    fn reduce_intersects_distance_two_vertices() {
        // pattern: 0-1-2 path. target: 0-1-2-3 path.
        let p = Rc::new(Graph::from_edges(&[(0, 1, 1), (1, 2, 1)]).unwrap());
        let t = Rc::new(Graph::from_edges(&[(0, 1, 1), (1, 2, 1), (2, 3, 1)]).unwrap());
        let mut p_nn = NearNeighbours::new(Rc::clone(&p));
        let mut t_nn = NearNeighbours::new(Rc::clone(&t));
        let mut c = GraphContext {
            pattern_graph: &p,
            pattern_nn: &mut p_nn,
            target_graph: &t,
            target_nn: &mut t_nn,
        };
        let mut raw = NodesRawData::new(vec![Bitset::all_ones(4), Bitset::all_ones(4), Bitset::all_ones(4)]);
        let mut accessor = DomainsAccessor::new(&mut raw);
        let mut scratch = Bitset::with_capacity(4);
        let mut r = DistanceReducer { k: 2 };
        // pv0 at distance 2 from pv2 (via pv1); assign pv0 -> tv0.
        let result = r.reduce(&mut c, &mut accessor, VertexId(0), VertexId(0), &mut scratch);
        assert_ne!(result, ReductionResult::NoGood);
        // tv's at distance <=2 from tv0 are {1,2}; pv2's domain should shrink to that.
        assert!(accessor.domain(VertexId(2)).is_subset_of(&{
            let mut b = Bitset::with_capacity(4);
            b.insert(VertexId(1));
            b.insert(VertexId(2));
            b
        }));
    }
}
