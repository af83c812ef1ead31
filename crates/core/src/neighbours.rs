use std::rc::Rc;

use crate::bitset::Bitset;
use crate::graph::Graph;
use crate::vertex::VertexId;

/// A `(degree, count)` pair: `count` neighbours (at some fixed distance)
/// share `degree`. Kept sorted by `degree` ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegreeCount {
    pub degree: usize,
    pub count: usize,
}

struct VertexCache {
    /// `at_distance[d-1]` = vertices exactly at distance `d`, for
    /// `d` in `1..=known depth`.
    at_distance: Vec<Bitset>,
    /// `up_to_distance[d-1]` = union of `at_distance[0..d]`.
    up_to_distance: Vec<Bitset>,
    degree_counts_at: Vec<Vec<DegreeCount>>,
    degree_counts_upto: Vec<Vec<DegreeCount>>,
    /// Once a layer comes back empty, every deeper layer is the same empty
    /// set (the BFS frontier has exhausted the component); this is the
    /// depth (1-indexed) of the first such layer, once known.
    exhausted_at: Option<usize>,
}

impl VertexCache {
    fn new() -> Self {
        VertexCache {
            at_distance: Vec::new(),
            up_to_distance: Vec::new(),
            degree_counts_at: Vec::new(),
            degree_counts_upto: Vec::new(),
            exhausted_at: None,
        }
    }
}

/// Lazily computed, monotonically growing per-vertex BFS layers and
/// degree-count histograms over a fixed [`Graph`].
///
/// All mutation happens through plain `&mut self` fields: the solver is
/// single-threaded, so there is no need for interior mutability here, only
/// ordinary lazy-fill-on-demand caching. Holds the graph via `Rc` rather than
/// a borrow so that a cache can sit in the same owning struct as the graph
/// itself (the main solver keeps one of each, alive for as long as a solve
/// may be resumed) without a self-referential lifetime.
pub struct NearNeighbours {
    graph: Rc<Graph>,
    caches: Vec<VertexCache>,
}

impl NearNeighbours {
    pub fn new(graph: Rc<Graph>) -> Self {
        let caches = (0..graph.num_vertices()).map(|_| VertexCache::new()).collect();
        NearNeighbours { graph, caches }
    }

    /// Ensure layers `1..=d` are computed for `v`.
    fn ensure(&mut self, v: VertexId, d: usize) {
        debug_assert!(d >= 1);
        let n = self.graph.num_vertices();
        loop {
            let have = self.caches[v.index()].at_distance.len();
            if have >= d {
                return;
            }
            if let Some(exhausted) = self.caches[v.index()].exhausted_at {
                if have >= exhausted {
                    // Every deeper layer repeats the same empty set; pad up
                    // to `d` by cloning it rather than recomputing.
                    let empty = self.caches[v.index()].at_distance[exhausted - 1].clone();
                    let up_to_last = self.caches[v.index()]
                        .up_to_distance
                        .last()
                        .cloned()
                        .unwrap_or_else(|| Bitset::with_capacity(n));
                    while self.caches[v.index()].at_distance.len() < d {
                        self.caches[v.index()].at_distance.push(empty.clone());
                        self.caches[v.index()].up_to_distance.push(up_to_last.clone());
                        self.push_degree_counts(v);
                    }
                    return;
                }
            }
            let next_depth = have + 1;
            let layer = self.compute_layer(v, next_depth);
            let is_empty = layer.is_empty();
            let mut up_to = self.caches[v.index()]
                .up_to_distance
                .last()
                .cloned()
                .unwrap_or_else(|| Bitset::with_capacity(n));
            up_to.union_assign(&layer);
            self.caches[v.index()].at_distance.push(layer);
            self.caches[v.index()].up_to_distance.push(up_to);
            self.push_degree_counts(v);
            if is_empty && self.caches[v.index()].exhausted_at.is_none() {
                self.caches[v.index()].exhausted_at = Some(next_depth);
            }
        }
    }

    fn compute_layer(&self, v: VertexId, d: usize) -> Bitset {
        let n = self.graph.num_vertices();
        if d == 1 {
            let mut layer = Bitset::with_capacity(n);
            for &(nb, _) in self.graph.neighbours_and_weights(v) {
                layer.insert(nb);
            }
            return layer;
        }
        let prev = &self.caches[v.index()].at_distance[d - 2];
        let mut layer = Bitset::with_capacity(n);
        for u in prev.iter() {
            for &(nb, _) in self.graph.neighbours_and_weights(u) {
                layer.insert(nb);
            }
        }
        layer.subtract_assign(prev);
        if d >= 3 {
            layer.subtract_assign(&self.caches[v.index()].at_distance[d - 3]);
        }
        layer.remove(v);
        layer
    }

    fn push_degree_counts(&mut self, v: VertexId) {
        let idx = self.caches[v.index()].at_distance.len() - 1;
        let at = histogram(&self.graph, &self.caches[v.index()].at_distance[idx]);
        let upto = histogram(&self.graph, &self.caches[v.index()].up_to_distance[idx]);
        self.caches[v.index()].degree_counts_at.push(at);
        self.caches[v.index()].degree_counts_upto.push(upto);
    }

    /// Vertices at shortest-path distance exactly `d` from `v`, `d >= 1`.
    pub fn at_distance(&mut self, v: VertexId, d: usize) -> &Bitset {
        self.ensure(v, d);
        &self.caches[v.index()].at_distance[d - 1]
    }

    /// Vertices at shortest-path distance `1..=d` from `v`.
    pub fn up_to_distance(&mut self, v: VertexId, d: usize) -> &Bitset {
        self.ensure(v, d);
        &self.caches[v.index()].up_to_distance[d - 1]
    }

    /// `(degree, count)` histogram of vertices exactly at distance `d`,
    /// sorted ascending by degree.
    pub fn degree_counts_at(&mut self, v: VertexId, d: usize) -> &[DegreeCount] {
        self.ensure(v, d);
        &self.caches[v.index()].degree_counts_at[d - 1]
    }

    /// `(degree, count)` histogram of vertices at distance `1..=d`, sorted
    /// ascending by degree.
    pub fn degree_counts_upto(&mut self, v: VertexId, d: usize) -> &[DegreeCount] {
        self.ensure(v, d);
        &self.caches[v.index()].degree_counts_upto[d - 1]
    }
}

fn histogram(graph: &Graph, set: &Bitset) -> Vec<DegreeCount> {
    let mut degrees: Vec<usize> = set.iter().map(|v| graph.degree(v)).collect();
    degrees.sort_unstable();
    let mut out: Vec<DegreeCount> = Vec::new();
    for d in degrees {
        match out.last_mut() {
            Some(last) if last.degree == d => last.count += 1,
            _ => out.push(DegreeCount { degree: d, count: 1 }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path5() -> Rc<Graph> {
        // 0-1-2-3-4
        Rc::new(Graph::from_edges(&[(0, 1, 1), (1, 2, 1), (2, 3, 1), (3, 4, 1)]).unwrap())
    }

    #[test]
    fn at_distance_layers_along_a_path() {
        let g = path5();
        let mut nn = NearNeighbours::new(g);
        assert_eq!(nn.at_distance(VertexId(0), 1).iter().collect::<Vec<_>>(), vec![VertexId(1)]);
        assert_eq!(nn.at_distance(VertexId(0), 2).iter().collect::<Vec<_>>(), vec![VertexId(2)]);
        assert_eq!(nn.at_distance(VertexId(0), 3).iter().collect::<Vec<_>>(), vec![VertexId(3)]);
        assert_eq!(nn.at_distance(VertexId(0), 4).iter().collect::<Vec<_>>(), vec![VertexId(4)]);
        // Beyond the component diameter, layers are empty.
        assert!(nn.at_distance(VertexId(0), 5).is_empty());
        assert!(nn.at_distance(VertexId(0), 10).is_empty());
    }

    #[test]
    fn up_to_distance_is_cumulative() {
        let g = path5();
        let mut nn = NearNeighbours::new(g);
        let up_to_2: Vec<_> = nn.up_to_distance(VertexId(0), 2).iter().collect();
        assert_eq!(up_to_2, vec![VertexId(1), VertexId(2)]);
    }

    #[test]
    fn degree_counts_histogram_sums_to_layer_size() {
        let g = path5();
        let mut nn = NearNeighbours::new(g);
        let counts = nn.degree_counts_upto(VertexId(0), 4).to_vec();
        let total: usize = counts.iter().map(|c| c.count).sum();
        assert_eq!(total, 4);
    }
}
