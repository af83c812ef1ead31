//! Weight-based pruning: a lower-bound nogood detector for the residual
//! scalar product, and an adaptive feedback manager deciding when the
//! (expensive) detector is worth invoking.
//!
//! Grounded on `WeightNogoodDetector.cpp`, `WeightNogoodDetectorManager.cpp`
//! (and its header for the default constants), and `WeightChecker.cpp` for
//! how the two are wired together.

use wsm_core::{checked_add, checked_mul, Bitset, DyadicFraction, Graph, VertexId, Weight};

use crate::nodes::DomainsAccessor;

enum MinWeightCache {
    Unknown,
    NoValidNeighbour,
    Known(Weight),
}

/// Holds the currently-valid target vertices and a lazy per-vertex cache of
/// `min_w_T_from(tv)`: the minimum edge weight from `tv` to another
/// currently-valid target vertex.
pub struct WeightNogoodDetector {
    valid: Bitset,
    initial_count: usize,
    cache: Vec<MinWeightCache>,
    impossible_target_vertices: Vec<VertexId>,
}

impl WeightNogoodDetector {
    /// `initial_valid` is the union of all current domains at the point the
    /// detector is first constructed.
    pub fn new(num_target_vertices: usize, initial_valid: Bitset) -> Self {
        let cache = (0..num_target_vertices).map(|_| MinWeightCache::Unknown).collect();
        let initial_count = initial_valid.count();
        WeightNogoodDetector {
            valid: initial_valid,
            initial_count,
            cache,
            impossible_target_vertices: Vec::new(),
        }
    }

    pub fn take_impossible_target_vertices(&mut self) -> Vec<VertexId> {
        std::mem::take(&mut self.impossible_target_vertices)
    }

    fn min_weight_from(&mut self, tv: VertexId, target_graph: &Graph) -> Option<Weight> {
        if !self.valid.test(tv) {
            return None;
        }
        match self.cache[tv.index()] {
            MinWeightCache::Known(w) => return Some(w),
            MinWeightCache::NoValidNeighbour => return None,
            MinWeightCache::Unknown => {}
        }
        let mut best: Option<Weight> = None;
        for &(neighbour, w) in target_graph.neighbours_and_weights(tv) {
            if !self.valid.test(neighbour) {
                continue;
            }
            best = Some(best.map_or(w, |b| b.min(w)));
        }
        match best {
            Some(w) => {
                self.cache[tv.index()] = MinWeightCache::Known(w);
                Some(w)
            }
            None => {
                self.cache[tv.index()] = MinWeightCache::NoValidNeighbour;
                self.valid.remove(tv);
                self.impossible_target_vertices.push(tv);
                None
            }
        }
    }

    /// `L`, the lower bound on the residual scalar product, or `None` if the
    /// node is already provably a nogood (some unassigned pv has no valid
    /// target left, discovered via `min_weight_from`).
    ///
    /// Grounded on `WeightNogoodDetector::get_extra_scalar_product_lower_bound`:
    /// for every pattern edge with at least one unassigned endpoint, add
    /// `w_P * max(lb(pv1), lb(pv2))` (or `lb(pv1)` against the fixed
    /// `min_weight_from` of an already-assigned neighbour), counting every
    /// edge exactly once by only summing the unassigned-unassigned case when
    /// `pv1 < pv2`.
    pub fn lower_bound(
        &mut self,
        pattern_graph: &Graph,
        target_graph: &Graph,
        accessor: &DomainsAccessor<'_>,
        max_extra_scalar_product: Weight,
    ) -> Option<Weight> {
        let num_pv = accessor.num_pattern_vertices();
        let mut lb_t: Vec<Option<Weight>> = Vec::with_capacity(num_pv);
        for i in 0..num_pv {
            let pv = VertexId::from(i);
            if accessor.domain(pv).singleton().is_some() {
                lb_t.push(None); // assigned: not used directly, looked up per-edge instead.
                continue;
            }
            let mut best: Option<Weight> = None;
            for tv in accessor.domain(pv).iter() {
                let w = self.min_weight_from(tv, target_graph)?;
                best = Some(best.map_or(w, |b| b.min(w)));
            }
            lb_t.push(best);
        }

        let mut total: Weight = 0;
        for i in 0..num_pv {
            let pv1 = VertexId::from(i);
            let pv1_assigned = accessor.domain(pv1).singleton();
            for &(pv2, w_p) in pattern_graph.neighbours_and_weights(pv1) {
                if pv2.index() <= pv1.index() {
                    continue; // canonical: count each edge once, from the lower-indexed endpoint.
                }
                let pv2_assigned = accessor.domain(pv2).singleton();
                let contribution = match (pv1_assigned, pv2_assigned) {
                    (Some(_), Some(_)) => continue, // both assigned: already in scalar_product.
                    (None, None) => {
                        let lb1 = lb_t[pv1.index()]?;
                        let lb2 = lb_t[pv2.index()]?;
                        lb1.max(lb2)
                    }
                    (None, Some(tv2)) => {
                        let lb1 = lb_t[pv1.index()]?;
                        let m = self.min_weight_from(tv2, target_graph)?;
                        lb1.max(m)
                    }
                    (Some(tv1), None) => {
                        let lb2 = lb_t[pv2.index()]?;
                        let m = self.min_weight_from(tv1, target_graph)?;
                        lb2.max(m)
                    }
                };
                total = checked_add(total, checked_mul(w_p, contribution)?)?;
                if total > max_extra_scalar_product {
                    return None;
                }
            }
        }
        Some(total)
    }
}

/// Fixed-point "per-kilo" (x/1024) control parameters and running state for
/// deciding when the detector is worth calling.
///
/// Grounded on `WeightNogoodDetectorManager.hpp`/`.cpp`; default constants
/// match the header exactly, though §9 notes exact tuning is an open
/// question and need not be reproduced bit-for-bit to pass the end-to-end
/// tests.
pub struct WeightNogoodManager {
    min_weight_pk_to_activate: u64,
    final_weight_estimate_pk: u64,
    skip_counter: u32,
    resets_allowed: bool,
}

const MIN_WEIGHT_PK_DEFAULT: u64 = 80;
const MIN_WEIGHT_PK_MAX: u64 = 1024;
const MIN_WEIGHT_PK_SUCCESS_GROWTH: u64 = 320;
const MIN_WEIGHT_PK_OK_FAILURE_GROWTH: u64 = 1400;
const MIN_WEIGHT_PK_BAD_FAILURE_GROWTH: u64 = 1600;

const FINAL_WEIGHT_PK_DEFAULT: u64 = 800;
const FINAL_WEIGHT_PK_MAX: u64 = 1280;
const FINAL_WEIGHT_PK_SUCCESS_GROWTH: u64 = 720;
const FINAL_WEIGHT_PK_OK_FAILURE_GROWTH: u64 = 1200;
const FINAL_WEIGHT_PK_BAD_FAILURE_GROWTH: u64 = 1600;

const SKIP_LENGTH: u32 = 2;
const DROP_BELOW_PK: u64 = 256;
const RISE_ABOVE_PK: u64 = 800;

impl WeightNogoodManager {
    pub fn new() -> Self {
        WeightNogoodManager {
            min_weight_pk_to_activate: MIN_WEIGHT_PK_DEFAULT,
            final_weight_estimate_pk: FINAL_WEIGHT_PK_DEFAULT,
            skip_counter: 0,
            resets_allowed: true,
        }
    }

    /// Should the (expensive) detector be invoked for this node?
    #[allow(clippy::too_many_arguments)]
    pub fn should_activate(
        &mut self,
        current_weight: Weight,
        max_weight: Weight,
        current_assigned_p_weight: Weight,
        total_p_edge_weights: Weight,
        n_assigned: usize,
        n_unassigned: usize,
    ) -> bool {
        let n_total = n_assigned + n_unassigned;
        if n_total > 0 {
            // n_assigned/n_total <= DROP_BELOW_PK/1024  <=>  n_assigned*1024 <= DROP_BELOW_PK*n_total
            let mut assigned_scaled = DyadicFraction::new(n_assigned as u64);
            assigned_scaled.mult(1024);
            let mut drop_threshold = DyadicFraction::new(DROP_BELOW_PK);
            drop_threshold.mult(n_total as u64);
            let below_drop = !drop_threshold.less_than(&assigned_scaled);

            let mut rise_threshold = DyadicFraction::new(RISE_ABOVE_PK);
            rise_threshold.mult(n_total as u64);
            let above_rise = !assigned_scaled.less_than(&rise_threshold);

            if below_drop && self.resets_allowed {
                self.min_weight_pk_to_activate = MIN_WEIGHT_PK_DEFAULT;
                self.final_weight_estimate_pk = FINAL_WEIGHT_PK_DEFAULT;
                self.resets_allowed = false;
            } else if above_rise {
                self.resets_allowed = true;
            }
        }

        if n_assigned < 3 || n_unassigned < 3 {
            return false;
        }

        if self.skip_counter > 0 {
            self.skip_counter -= 1;
            return false;
        }

        if max_weight == 0 {
            return true;
        }

        // current_weight / max_weight >= min_weight_pk_to_activate / 1024
        let mut lhs = DyadicFraction::new(current_weight);
        lhs.mult(1024);
        let mut rhs = DyadicFraction::new(max_weight);
        rhs.mult(self.min_weight_pk_to_activate);
        if lhs.less_than(&rhs) {
            return false;
        }

        // (current_weight * total_p_edge_weights) >= (max_weight * current_assigned_p_weight) * pk/1024
        let mut lhs2 = DyadicFraction::new(current_weight);
        lhs2.mult(total_p_edge_weights);
        let mut rhs2 = DyadicFraction::new(max_weight);
        rhs2.mult(current_assigned_p_weight);
        rhs2.mult_n_over_k(self.final_weight_estimate_pk);
        if lhs2.less_than(&rhs2) {
            return false;
        }

        // (current_weight * n_total) >= (max_weight * n_assigned) * pk/1024
        let mut lhs3 = DyadicFraction::new(current_weight);
        lhs3.mult(n_total as u64);
        let mut rhs3 = DyadicFraction::new(max_weight);
        rhs3.mult(n_assigned as u64);
        rhs3.mult_n_over_k(self.final_weight_estimate_pk);
        if lhs3.less_than(&rhs3) {
            return false;
        }

        true
    }

    fn clamp(&mut self) {
        self.min_weight_pk_to_activate = self.min_weight_pk_to_activate.min(MIN_WEIGHT_PK_MAX);
        self.final_weight_estimate_pk = self.final_weight_estimate_pk.min(FINAL_WEIGHT_PK_MAX);
    }

    /// The detector proved a nogood: tighten (raise) both thresholds so the
    /// next activation happens a bit later, since this call paid off.
    pub fn register_success(&mut self) {
        self.min_weight_pk_to_activate = self.min_weight_pk_to_activate * MIN_WEIGHT_PK_SUCCESS_GROWTH / 1024;
        self.final_weight_estimate_pk = self.final_weight_estimate_pk * FINAL_WEIGHT_PK_SUCCESS_GROWTH / 1024;
        self.clamp();
    }

    /// The detector failed to prove a nogood. `close` distinguishes a
    /// near-miss (`current + 2L < max_weight` was false) from a clear miss.
    pub fn register_lower_bound_failure(&mut self, close: bool) {
        if close {
            self.min_weight_pk_to_activate = self.min_weight_pk_to_activate * MIN_WEIGHT_PK_OK_FAILURE_GROWTH / 1024;
            self.final_weight_estimate_pk = self.final_weight_estimate_pk * FINAL_WEIGHT_PK_OK_FAILURE_GROWTH / 1024;
        } else {
            self.min_weight_pk_to_activate = self.min_weight_pk_to_activate * MIN_WEIGHT_PK_BAD_FAILURE_GROWTH / 1024;
            self.final_weight_estimate_pk = self.final_weight_estimate_pk * FINAL_WEIGHT_PK_BAD_FAILURE_GROWTH / 1024;
        }
        self.clamp();
        self.skip_counter = SKIP_LENGTH;
    }
}

impl Default for WeightNogoodManager {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of [`WeightChecker::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightCheckOutcome {
    Ok,
    NoGood,
}

/// Glues the manager and detector together, lazily constructing the
/// detector on its first use (seeded from the domains at that point) and
/// tracking target vertices the detector proves globally impossible.
///
/// Grounded on `WeightChecker.cpp`/`.hpp`.
pub struct WeightChecker {
    manager: WeightNogoodManager,
    detector: Option<WeightNogoodDetector>,
    total_p_edge_weights: Option<Weight>,
}

impl WeightChecker {
    pub fn new() -> Self {
        WeightChecker {
            manager: WeightNogoodManager::new(),
            detector: None,
            total_p_edge_weights: None,
        }
    }

    /// `(initially_passed, still_valid)` target vertex counts for the
    /// lazily-constructed detector, if one has been built yet.
    pub fn detector_counts(&self) -> Option<(usize, usize)> {
        self.detector.as_ref().map(|d| (d.initial_count, d.valid.count()))
    }

    /// Checks whether the current node should be pruned on weight grounds.
    /// Returns any newly discovered globally-impossible target vertices
    /// alongside the verdict, so the caller can erase them from every node
    /// and restart the reduce loop.
    pub fn check(
        &mut self,
        pattern_graph: &Graph,
        target_graph: &Graph,
        accessor: &DomainsAccessor<'_>,
        max_weight: Weight,
    ) -> (WeightCheckOutcome, Vec<VertexId>) {
        let num_pv = accessor.num_pattern_vertices();
        let mut n_assigned = 0usize;
        for i in 0..num_pv {
            if accessor.domain(VertexId::from(i)).singleton().is_some() {
                n_assigned += 1;
            }
        }
        let n_unassigned = num_pv - n_assigned;

        let current_weight = accessor.scalar_product();
        let current_assigned_p_weight = accessor.total_p_edge_weights();
        let total_p_edge_weights = *self.total_p_edge_weights.get_or_insert_with(|| {
            pattern_graph
                .all_weights()
                .into_iter()
                .fold(0, |acc, w| acc.saturating_add(w))
        });

        if !self.manager.should_activate(
            current_weight,
            max_weight,
            current_assigned_p_weight,
            total_p_edge_weights,
            n_assigned,
            n_unassigned,
        ) {
            return (WeightCheckOutcome::Ok, Vec::new());
        }

        if self.detector.is_none() {
            let mut valid = Bitset::with_capacity(target_graph.num_vertices());
            for i in 0..num_pv {
                valid.union_assign(accessor.domain(VertexId::from(i)));
            }
            self.detector = Some(WeightNogoodDetector::new(target_graph.num_vertices(), valid));
        }
        let detector = self.detector.as_mut().unwrap();

        let max_extra = max_weight.saturating_sub(current_weight);
        let lb = detector.lower_bound(pattern_graph, target_graph, accessor, max_extra);
        let impossible = detector.take_impossible_target_vertices();

        match lb {
            None => {
                self.manager.register_success();
                (WeightCheckOutcome::NoGood, impossible)
            }
            Some(l) => {
                let close = current_weight.saturating_add(2 * l) >= max_weight;
                self.manager.register_lower_bound_failure(close);
                (WeightCheckOutcome::Ok, impossible)
            }
        }
    }
}

impl Default for WeightChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodesRawData;

    #[test]
    fn detector_declares_isolated_target_vertex_impossible() {
        let t = Graph::from_edges(&[(0, 1, 1), (2, 3, 1)]).unwrap();
        let mut valid = Bitset::with_capacity(4);
        valid.insert(VertexId(0));
        valid.insert(VertexId(2));
        // tv0's only neighbour (tv1) and tv2's only neighbour (tv3) are not valid.
        let mut d = WeightNogoodDetector::new(4, valid);
        assert!(d.min_weight_from(VertexId(0), &t).is_none());
        assert_eq!(d.take_impossible_target_vertices(), vec![VertexId(0)]);
    }

    #[test]
    fn lower_bound_accounts_for_unassigned_edge_weights() {
        let p = Graph::from_edges(&[(0, 1, 2)]).unwrap();
        let t = Graph::from_edges(&[(0, 1, 5), (1, 2, 9)]).unwrap();
        let mut raw = NodesRawData::new(vec![Bitset::all_ones(3), Bitset::all_ones(3)]);
        let accessor = DomainsAccessor::new(&mut raw);
        let mut valid = Bitset::all_ones(3);
        let mut d = WeightNogoodDetector::new(3, {
            valid.clear();
            valid.insert(VertexId(0));
            valid.insert(VertexId(1));
            valid.insert(VertexId(2));
            valid
        });
        let lb = d.lower_bound(&p, &t, &accessor, Weight::MAX).unwrap();
        assert!(lb > 0);
    }

    #[test]
    fn manager_requires_a_minimum_of_assigned_and_unassigned_vertices() {
        let mut m = WeightNogoodManager::new();
        assert!(!m.should_activate(100, 100, 10, 10, 1, 10));
        assert!(!m.should_activate(100, 100, 10, 10, 10, 1));
    }
}
