//! The main reduce loop, branching, and backtracking.
//!
//! Grounded on `SearchBranch.cpp` for the loop shape and
//! `NodeListTraversal.hpp` for the move-down/backtrack contract.

use std::rc::Rc;

use wsm_core::{Bitset, Graph, NearNeighbours, Rng, VertexId, Weight};

use crate::nodes::{DomainsAccessor, NodesRawData, ReductionResult};
use crate::nogood::{WeightCheckOutcome, WeightChecker};
use crate::reducers::{GraphContext, HallSetReducer, Reducer, ReducerWrapper};
use crate::value_ordering::choose_value;
use crate::weight_calc;

/// Counters surfaced to callers for diagnostics and tests, mirroring the
/// crate root's public `ExtraStatistics`.
#[derive(Debug, Clone, Default)]
pub struct ExtraStatistics {
    pub number_of_pattern_vertices: usize,
    pub number_of_target_vertices: usize,
    pub initial_number_of_possible_assignments: usize,
    pub total_number_of_assignments_tried: u64,
    pub total_number_of_impossible_assignments: u64,
    pub n_tv_initially_passed_to_weight_nogood_detector: usize,
    pub n_tv_still_valid_in_weight_nogood_detector: usize,
    pub impossible_target_vertices: Vec<VertexId>,
}

/// Outcome of reducing the current node: either it survived (possibly with
/// the search complete, every pv assigned) or it didn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOutcome {
    Success,
    NoGood,
}

/// Holds everything the backtracking search needs: the node stack, the
/// reducer pipeline, the weight calculator and checker, and per-solve
/// diagnostics. One `SearchBranch` runs exactly one solve, but may be kept
/// alive across a `solve`/`solve_resume` pair, which is why the graphs are
/// held via `Rc` rather than borrowed.
pub struct SearchBranch {
    pattern_graph: Rc<Graph>,
    target_graph: Rc<Graph>,
    pattern_nn: NearNeighbours,
    target_nn: NearNeighbours,
    raw: NodesRawData,
    reducer_wrappers: Vec<ReducerWrapper>,
    hall_set: HallSetReducer,
    weight_checker: WeightChecker,
    scratch: Bitset,
    rng: Rng,
    pub stats: ExtraStatistics,
}

impl SearchBranch {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pattern_graph: Rc<Graph>,
        target_graph: Rc<Graph>,
        pattern_nn: NearNeighbours,
        target_nn: NearNeighbours,
        initial_domains: Vec<Bitset>,
        max_distance_reducer_k: usize,
        rng_seed: u64,
    ) -> Self {
        let num_pv = pattern_graph.num_vertices();
        let num_tv = target_graph.num_vertices();

        let initial_possible: usize = initial_domains.iter().map(|d| d.count()).sum();

        let mut reducer_wrappers = vec![ReducerWrapper::new(Reducer::neighbours())];
        for k in 2..=max_distance_reducer_k {
            reducer_wrappers.push(ReducerWrapper::new(Reducer::distance(k)));
        }
        reducer_wrappers.push(ReducerWrapper::new(Reducer::derived(num_pv, num_tv)));

        let raw = NodesRawData::new(initial_domains);

        SearchBranch {
            pattern_graph,
            target_graph,
            pattern_nn,
            target_nn,
            raw,
            reducer_wrappers,
            hall_set: HallSetReducer::new(),
            weight_checker: WeightChecker::new(),
            scratch: Bitset::with_capacity(num_tv),
            rng: Rng::new(rng_seed),
            stats: ExtraStatistics {
                number_of_pattern_vertices: num_pv,
                number_of_target_vertices: num_tv,
                initial_number_of_possible_assignments: initial_possible,
                ..Default::default()
            },
        }
    }

    pub fn depth(&self) -> usize {
        self.raw.depth()
    }

    /// `true` once every pattern vertex is assigned in the current node.
    pub fn is_complete(&self) -> bool {
        (0..self.raw.num_pattern_vertices()).all(|i| self.raw.domain(VertexId::from(i)).singleton().is_some())
    }

    /// The current node's assignments, sorted by pattern vertex, once
    /// [`Self::is_complete`] holds.
    pub fn current_assignments(&self) -> Vec<(VertexId, VertexId)> {
        (0..self.raw.num_pattern_vertices())
            .map(|i| {
                let pv = VertexId::from(i);
                (pv, self.raw.domain(pv).singleton().expect("current_assignments requires a complete node"))
            })
            .collect()
    }

    pub fn current_scalar_product(&self) -> Weight {
        self.raw.scalar_product()
    }

    pub fn current_total_p_edge_weights(&self) -> Weight {
        self.raw.total_p_edge_weights()
    }

    fn ctx(&mut self) -> GraphContext<'_> {
        GraphContext {
            pattern_graph: &self.pattern_graph,
            pattern_nn: &mut self.pattern_nn,
            target_graph: &self.target_graph,
            target_nn: &mut self.target_nn,
        }
    }

    /// The main reduce loop: run alldiff and every reducer to a fixed
    /// point, or until a nogood is proved.
    pub fn reduce_current_node(&mut self, max_weight: Weight) -> ReduceOutcome {
        for wrapper in &mut self.reducer_wrappers {
            wrapper.clear();
        }
        self.hall_set.clear();

        let mut n_processed = 0usize;
        loop {
            {
                let mut accessor = DomainsAccessor::new(&mut self.raw);
                if !accessor.alldiff_reduce_current_node(n_processed) {
                    return ReduceOutcome::NoGood;
                }
            }

            let to_check: Vec<(VertexId, VertexId)> = {
                let accessor = DomainsAccessor::new(&mut self.raw);
                accessor.new_assignments()[n_processed..].to_vec()
            };
            for (pv, tv) in to_check {
                self.stats.total_number_of_assignments_tried += 1;
                let mut impossible = false;
                {
                    let mut ctx = self.ctx();
                    for wrapper in &mut self.reducer_wrappers {
                        if !wrapper.reducer.check(&mut ctx, pv, tv) {
                            impossible = true;
                            break;
                        }
                    }
                }
                if impossible {
                    self.stats.total_number_of_impossible_assignments += 1;
                    self.raw.erase_impossible_assignment(pv, tv);
                    return ReduceOutcome::NoGood;
                }
            }

            {
                let accessor = DomainsAccessor::new(&mut self.raw);
                match weight_calc::update_scalar_product(
                    &self.pattern_graph,
                    &self.target_graph,
                    &accessor,
                    n_processed,
                    max_weight,
                ) {
                    None => return ReduceOutcome::NoGood,
                    Some((sp, dw)) => {
                        let total = accessor.total_p_edge_weights();
                        drop(accessor);
                        let mut accessor = DomainsAccessor::new(&mut self.raw);
                        accessor.set_scalar_product(sp);
                        let new_total = match wsm_core::checked_add(total, dw) {
                            Some(t) => t,
                            None => return ReduceOutcome::NoGood,
                        };
                        accessor.set_total_p_edge_weights(new_total);
                    }
                }
            }

            n_processed = {
                let accessor = DomainsAccessor::new(&mut self.raw);
                accessor.new_assignments().len()
            };

            {
                let (outcome, impossible_tvs) = {
                    let accessor = DomainsAccessor::new(&mut self.raw);
                    self.weight_checker
                        .check(&self.pattern_graph, &self.target_graph, &accessor, max_weight)
                };
                if !impossible_tvs.is_empty() {
                    self.stats.impossible_target_vertices.extend(impossible_tvs.iter().copied());
                    for tv in impossible_tvs {
                        for i in 0..self.raw.num_pattern_vertices() {
                            self.raw.erase_impossible_assignment(VertexId::from(i), tv);
                        }
                    }
                }
                if outcome == WeightCheckOutcome::NoGood {
                    return ReduceOutcome::NoGood;
                }
            }

            let mut restart = false;
            {
                let mut ctx_owner = self.ctx();
                let mut accessor = DomainsAccessor::new(&mut self.raw);
                for wrapper in &mut self.reducer_wrappers {
                    match wrapper.run(&mut ctx_owner, &mut accessor, &mut self.scratch) {
                        ReductionResult::NoGood => return ReduceOutcome::NoGood,
                        ReductionResult::NewAssignment => {
                            restart = true;
                            break;
                        }
                        ReductionResult::Success => {}
                    }
                }
                if !restart {
                    match self.hall_set.reduce(&mut accessor) {
                        ReductionResult::NoGood => return ReduceOutcome::NoGood,
                        ReductionResult::NewAssignment => restart = true,
                        ReductionResult::Success => {}
                    }
                }
            }
            if restart {
                continue;
            }

            let done = {
                let accessor = DomainsAccessor::new(&mut self.raw);
                n_processed == accessor.new_assignments().len()
            };
            if done {
                break;
            }
        }

        {
            let mut accessor = DomainsAccessor::new(&mut self.raw);
            accessor.clear_new_assignments();
        }
        ReduceOutcome::Success
    }

    /// Pick the unassigned pv with smallest domain (ties to the smallest
    /// pv), draw a value from it via
    /// solution-biased ordering, remove that value from the current node
    /// (so it remains a valid alternative on backtrack), and push a child
    /// node with the forced assignment.
    pub fn move_down_from_reduced_node(&mut self) {
        let (pv, tv) = {
            let accessor = DomainsAccessor::new(&mut self.raw);
            let candidates = accessor.get_unassigned_pattern_vertices_superset();
            let mut best: Option<(VertexId, usize)> = None;
            for &pv in candidates {
                let size = accessor.domain_size(pv);
                if size <= 1 {
                    continue;
                }
                if best.is_none_or(|(_, best_size)| size < best_size) {
                    best = Some((pv, size));
                }
            }
            let (pv, _) = best.expect("move_down requires an unassigned pattern vertex");
            let tv = choose_value(accessor.domain(pv), &self.target_graph, &mut self.rng);
            (pv, tv)
        };

        {
            let mut accessor = DomainsAccessor::new(&mut self.raw);
            let mut remaining = accessor.domain(pv).clone();
            remaining.remove(tv);
            accessor.intersect_domain(pv, &remaining);
        }

        self.raw.push_node(Some((pv, tv)));

        // Seed the child's unassigned superset from the parent's, minus pv,
        // so later calls don't keep scanning already-assigned vertices.
        {
            let mut accessor = DomainsAccessor::new(&mut self.raw);
            let parent_superset: Vec<VertexId> =
                accessor.get_unassigned_pattern_vertices_superset().iter().copied().filter(|&p| p != pv).collect();
            let slot = accessor.get_unassigned_pattern_vertices_superset_to_overwrite();
            *slot = parent_superset;
        }
    }

    /// Pop nodes until either the stack empties (search finished, returns
    /// `false`) or the new top reduces successfully (returns `true`).
    pub fn backtrack(&mut self, max_weight: Weight) -> bool {
        loop {
            if !self.raw.pop_node() {
                return false;
            }
            if self.reduce_current_node(max_weight) == ReduceOutcome::Success {
                return true;
            }
        }
    }

    /// Fold the weight nogood detector's latest activation counts (if any)
    /// into `self.stats.n_tv_initially_passed_to_weight_nogood_detector` /
    /// `n_tv_still_valid_in_weight_nogood_detector`.
    pub fn record_detector_stats(&mut self) {
        if let Some((initial, still_valid)) = self.weight_checker.detector_counts() {
            self.stats.n_tv_initially_passed_to_weight_nogood_detector = initial;
            self.stats.n_tv_still_valid_in_weight_nogood_detector = still_valid;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsm_core::NearNeighbours;

    fn triangle() -> Rc<Graph> {
        Rc::new(Graph::from_edges(&[(0, 1, 1), (1, 2, 1), (0, 2, 1)]).unwrap())
    }

    #[test]
    fn reduces_and_completes_a_trivial_triangle_match() {
        let p = triangle();
        let t = triangle();
        let p_nn = NearNeighbours::new(Rc::clone(&p));
        let t_nn = NearNeighbours::new(Rc::clone(&t));
        let domains = crate::domain_init::initialise_domains(
            &p,
            &mut NearNeighbours::new(Rc::clone(&p)),
            &t,
            &mut NearNeighbours::new(Rc::clone(&t)),
            3,
        )
        .unwrap();
        let mut branch = SearchBranch::new(Rc::clone(&p), Rc::clone(&t), p_nn, t_nn, domains, 2, 42);
        assert_eq!(branch.reduce_current_node(Weight::MAX), ReduceOutcome::Success);
        while !branch.is_complete() {
            branch.move_down_from_reduced_node();
            if branch.reduce_current_node(Weight::MAX) == ReduceOutcome::NoGood {
                assert!(branch.backtrack(Weight::MAX));
            }
        }
        assert_eq!(branch.current_scalar_product(), 3);
    }
}
