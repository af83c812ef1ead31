use std::collections::BTreeMap;

use wsm_core::{Bitset, Graph, VertexId};

use crate::domain_init::sequence_dominated;
use crate::nodes::{DomainsAccessor, ReductionResult};

use super::GraphContext;

/// Per-vertex counts derived from paths of length 2 and 3: how many
/// length-2 (resp. 3) paths lead from this vertex to each other vertex, plus
/// the triangle count (closed length-3 paths back to itself).
///
/// Grounded on `DerivedGraphsCalculator.cpp`'s
/// `fill_mid_vertices_for_length_two_paths` / `fill_d2_neighbours_and_counts`
/// / `fill_d3_neighbours_and_counts_map` / `fill_remaining_d3_data`.
struct DerivedVertexData {
    triangle_count: usize,
    d2: Vec<(VertexId, usize)>,
    d3: Vec<(VertexId, usize)>,
    d2_sorted_counts: Vec<usize>,
    d3_sorted_counts: Vec<usize>,
}

fn compute_derived_vertex_data(graph: &Graph, v: VertexId) -> DerivedVertexData {
    // mid_vertices[v2] = the v1's (sorted ascending, since the outer loop
    // below visits v1 in increasing order) such that v-v1-v2 is a length-2
    // path with v2 != v.
    let mut mid_vertices: BTreeMap<VertexId, Vec<VertexId>> = BTreeMap::new();
    for &(v1, _) in graph.neighbours_and_weights(v) {
        for &(v2, _) in graph.neighbours_and_weights(v1) {
            if v2 == v {
                continue;
            }
            mid_vertices.entry(v2).or_default().push(v1);
        }
    }

    let d2: Vec<(VertexId, usize)> = mid_vertices.iter().map(|(&v2, v1s)| (v2, v1s.len())).collect();

    let mut d3_map: BTreeMap<VertexId, usize> = BTreeMap::new();
    for (&v2, v1s) in &mid_vertices {
        for &(v3, _) in graph.neighbours_and_weights(v2) {
            let contribution = if v1s.binary_search(&v3).is_ok() {
                v1s.len() - 1
            } else {
                v1s.len()
            };
            if contribution > 0 {
                *d3_map.entry(v3).or_insert(0) += contribution;
            }
        }
    }

    let triangle_count = d3_map.get(&v).copied().unwrap_or(0);
    let d3: Vec<(VertexId, usize)> = d3_map.iter().filter(|&(&v3, _)| v3 != v).map(|(&v3, &c)| (v3, c)).collect();

    let mut d2_sorted_counts: Vec<usize> = d2.iter().map(|&(_, c)| c).collect();
    d2_sorted_counts.sort_unstable();
    let mut d3_sorted_counts: Vec<usize> = d3.iter().map(|&(_, c)| c).collect();
    d3_sorted_counts.sort_unstable();

    DerivedVertexData {
        triangle_count,
        d2,
        d3,
        d2_sorted_counts,
        d3_sorted_counts,
    }
}

fn data_for<'a>(cache: &'a mut [Option<DerivedVertexData>], graph: &Graph, v: VertexId) -> &'a DerivedVertexData {
    if cache[v.index()].is_none() {
        cache[v.index()] = Some(compute_derived_vertex_data(graph, v));
    }
    cache[v.index()].as_ref().unwrap()
}

/// Considers the depth-2 and depth-3 derived (weighted multi-)graphs, whose
/// edge weight between `u` and `w` is the number of length-2 (resp. 3)
/// paths between them in the underlying graph.
///
/// Grounded on `DerivedGraphsReducer.cpp`.
pub struct DerivedGraphReducer {
    pattern_cache: Vec<Option<DerivedVertexData>>,
    target_cache: Vec<Option<DerivedVertexData>>,
}

impl DerivedGraphReducer {
    pub fn new(num_pattern_vertices: usize, num_target_vertices: usize) -> Self {
        DerivedGraphReducer {
            pattern_cache: (0..num_pattern_vertices).map(|_| None).collect(),
            target_cache: (0..num_target_vertices).map(|_| None).collect(),
        }
    }

    pub fn check(&mut self, ctx: &mut GraphContext<'_>, pv: VertexId, tv: VertexId) -> bool {
        let p = data_for(&mut self.pattern_cache, ctx.pattern_graph, pv);
        let t = data_for(&mut self.target_cache, ctx.target_graph, tv);
        p.triangle_count <= t.triangle_count
            && p.d2.len() <= t.d2.len()
            && p.d3.len() <= t.d3.len()
            && sequence_dominated(&p.d2_sorted_counts, &t.d2_sorted_counts)
            && sequence_dominated(&p.d3_sorted_counts, &t.d3_sorted_counts)
    }

    pub fn reduce(
        &mut self,
        ctx: &mut GraphContext<'_>,
        accessor: &mut DomainsAccessor<'_>,
        pv: VertexId,
        tv: VertexId,
        scratch: &mut Bitset,
    ) -> ReductionResult {
        let num_tv = ctx.target_graph.num_vertices();
        if scratch.len() != num_tv {
            *scratch = Bitset::with_capacity(num_tv);
        }
        // Detach from `self`'s cache borrows before interleaving calls into
        // `accessor`: these per-vertex lists are small, so cloning them is
        // cheap next to the cost of a bitset intersection.
        let p_d2 = data_for(&mut self.pattern_cache, ctx.pattern_graph, pv).d2.clone();
        let t_d2 = data_for(&mut self.target_cache, ctx.target_graph, tv).d2.clone();
        let p_d3 = data_for(&mut self.pattern_cache, ctx.pattern_graph, pv).d3.clone();
        let t_d3 = data_for(&mut self.target_cache, ctx.target_graph, tv).d3.clone();

        let d2_result = reduce_with_derived(&p_d2, &t_d2, accessor, scratch);
        if d2_result == ReductionResult::NoGood {
            return ReductionResult::NoGood;
        }
        let d3_result = reduce_with_derived(&p_d3, &t_d3, accessor, scratch);
        if d3_result == ReductionResult::NoGood {
            return ReductionResult::NoGood;
        }
        if d2_result == ReductionResult::NewAssignment || d3_result == ReductionResult::NewAssignment {
            ReductionResult::NewAssignment
        } else {
            ReductionResult::Success
        }
    }
}

fn reduce_with_derived(
    pattern_list: &[(VertexId, usize)],
    target_list: &[(VertexId, usize)],
    accessor: &mut DomainsAccessor<'_>,
    scratch: &mut Bitset,
) -> ReductionResult {
    let mut result = ReductionResult::Success;
    for &(pv2, p_count) in pattern_list {
        if super::already_assigned(accessor, pv2) {
            continue;
        }
        scratch.clear();
        for &(tv2, t_count) in target_list {
            if t_count >= p_count {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodesRawData;
    use std::rc::Rc;
    use wsm_core::NearNeighbours;

    #[test]
    fn triangle_has_triangle_count_one_at_each_vertex() {
        let g = Graph::from_edges(&[(0, 1, 1), (1, 2, 1), (0, 2, 1)]).unwrap();
        let data = compute_derived_vertex_data(&g, VertexId(0));
        assert_eq!(data.triangle_count, 1);
    }

    #[test]
    fn check_rejects_when_target_lacks_enough_triangles() {
        let p = Rc::new(Graph::from_edges(&[(0, 1, 1), (1, 2, 1), (0, 2, 1)]).unwrap());
        let t = Rc::new(Graph::from_edges(&[(0, 1, 1), (1, 2, 1), (2, 3, 1)]).unwrap());
        let mut p_nn = NearNeighbours::new(Rc::clone(&p));
        let mut t_nn = NearNeighbours::new(Rc::clone(&t));
        let mut c = GraphContext {
            pattern_graph: &p,
            pattern_nn: &mut p_nn,
            target_graph: &t,
            target_nn: &mut t_nn,
        };
        let mut r = DerivedGraphReducer::new(3, 4);
        assert!(!r.check(&mut c, VertexId(0), VertexId(1)));
    }

    #[test]
    fn reduce_tightens_depth_two_neighbours() {
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
        let mut r = DerivedGraphReducer::new(3, 4);
        let result = r.reduce(&mut c, &mut accessor, VertexId(0), VertexId(0), &mut scratch);
        assert_ne!(result, ReductionResult::NoGood);
    }
}
