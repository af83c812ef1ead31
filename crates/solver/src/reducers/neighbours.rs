use wsm_core::{Bitset, VertexId};

use crate::nodes::{DomainsAccessor, ReductionResult};

use super::GraphContext;

/// Distance-1 reducer: tightens `Dom(pv')` for every pattern neighbour `pv'`
/// of a just-assigned `pv` down to `tv`'s target neighbours, restricted to
/// edges heavy enough to carry the corresponding pattern edge weight.
///
/// Grounded on `NeighboursReducer.cpp`; the weight-aware variant is used
/// here rather than a plain degree/adjacency mask, since it cannot discard
/// a valid optimal assignment and strictly tightens the search.
pub struct NeighboursReducer;

impl NeighboursReducer {
    pub fn check(&mut self, ctx: &mut GraphContext<'_>, pv: VertexId, tv: VertexId) -> bool {
        ctx.pattern_graph.degree(pv) <= ctx.target_graph.degree(tv)
    }

    pub fn reduce(
        &mut self,
        ctx: &mut GraphContext<'_>,
        accessor: &mut DomainsAccessor<'_>,
        pv: VertexId,
        tv: VertexId,
        scratch: &mut Bitset,
    ) -> ReductionResult {
        let pattern_graph = ctx.pattern_graph;
        let target_graph = ctx.target_graph;
        let num_tv = target_graph.num_vertices();
        let target_neighbours = target_graph.neighbours_and_weights(tv);
        let mut result = ReductionResult::Success;
        for &(pv2, w_p) in pattern_graph.neighbours_and_weights(pv) {
            if super::already_assigned(accessor, pv2) {
                continue;
            }
            if scratch.len() != num_tv {
                *scratch = Bitset::with_capacity(num_tv);
            } else {
                scratch.clear();
            }
            for &(tv2, w_t) in target_neighbours {
                if w_t >= w_p {
                    scratch.insert(tv2);
                }
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
