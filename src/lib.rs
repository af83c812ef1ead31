//! Weighted subgraph monomorphism (WSM): given a *pattern* graph and a
//! *target* graph, both undirected and simple with non-negative integer
//! edge weights, find an injective vertex map from the pattern into the
//! target such that every pattern edge lands on a target edge, minimising
//!
//! ```text
//! S(f) = sum over pattern edges (u,v) of w_P(u,v) * w_T(f(u),f(v))
//! ```
//!
//! subject to an optional weight cap, an iteration budget, and a wall-clock
//! timeout.
//!
//! # Usage
//!
//! ```
//! use wsm::{solve, Params};
//!
//! // pattern: a single edge 0-1 of weight 2.
//! let pattern = [(0u32, 1u32, 2u64)];
//! // target: a triangle, one edge of which is heavy enough to host it.
//! let target = [(0u32, 1u32, 5u64), (1, 2, 1), (0, 2, 1)];
//!
//! let result = solve(&pattern, &target, Params::default()).unwrap();
//! assert!(result.finished);
//! assert_eq!(result.solutions[0].scalar_product, 10);
//! ```
//!
//! [`solve`] runs a single solve to completion or exhaustion of its budget.
//! [`MainSolver`] is the reusable handle behind it: keep one around and
//! call [`MainSolver::solve_resume`] to continue a search that timed out or
//! hit its iteration cap, without losing the work already done. The
//! [`iqp`] module is a separate, self-contained entry point for the Initial
//! Qubit Placement variant described in the crate's design notes.

mod iqp;

use std::rc::Rc;
use std::time::{Duration, Instant};

use wsm_core::{Graph, NearNeighbours, Relabelling, VertexId, Weight};
use wsm_solver::{initialise_domains, ReduceOutcome, SearchBranch};

pub use iqp::{iqp_solve, IqpParams, ImplicitTargetWeight};
pub use wsm_core::{BadInputReason, Error};

/// Convenience alias matching [`wsm_core::Result`] but fixed to [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

/// A deterministic seed for the value-ordering RNG: search reproducibility
/// (needed for the resume-equivalence property) depends on never drawing
/// this from an external entropy source.
const VALUE_ORDERING_RNG_SEED: u64 = 0x5eed_c0de_f00d_babe;

/// Parameters for one call to [`solve`] or [`MainSolver::solve_resume`].
///
/// `max_path_length` only matters on the very first call (it seeds domain
/// initialisation and the distance-reducer ceiling); later calls ignore it.
#[derive(Debug, Clone, Copy)]
pub struct Params {
    /// Extra wall-clock budget granted to this call, in milliseconds.
    pub timeout_ms: u64,
    /// Extra search-iteration budget granted to this call.
    pub iterations_timeout: u64,
    /// If set, further tightens the weight cap beyond whatever bound the
    /// search has already converged on from its own improving solutions.
    pub weight_upper_bound_constraint: Option<Weight>,
    /// Stop as soon as the first complete assignment is found, rather than
    /// continuing to search for a strictly cheaper one.
    pub terminate_with_first_full_solution: bool,
    /// Distance ceiling for domain initialisation and the distance-k
    /// reducers. Only consulted when constructing the solver.
    pub max_path_length: u32,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            timeout_ms: u64::MAX,
            iterations_timeout: u64::MAX,
            weight_upper_bound_constraint: None,
            terminate_with_first_full_solution: false,
            max_path_length: 3,
        }
    }
}

/// A single candidate embedding, in the caller's original vertex ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// `(pattern vertex, target vertex)`, sorted by pattern vertex.
    pub assignments: Vec<(u32, u32)>,
    pub scalar_product: Weight,
    pub total_p_edges_weight: Weight,
}

/// Diagnostic counters accumulated over the lifetime of a [`MainSolver`].
#[derive(Debug, Clone, Default)]
pub struct ExtraStatistics {
    pub number_of_pattern_vertices: usize,
    pub number_of_target_vertices: usize,
    pub initial_number_of_possible_assignments: usize,
    pub total_number_of_assignments_tried: u64,
    pub total_number_of_impossible_assignments: u64,
    pub n_tv_initially_passed_to_weight_nogood_detector: usize,
    pub n_tv_still_valid_in_weight_nogood_detector: usize,
    /// Target vertices, in the caller's original ids, the weight-nogood
    /// detector has proved can never appear in any valid assignment.
    pub impossible_target_vertices: Vec<u32>,
}

/// Everything reported back from a [`solve`]/[`MainSolver::solve_resume`]
/// call.
#[derive(Debug, Clone, Default)]
pub struct SolutionData {
    /// `true` iff the search proved optimality (or infeasibility), or
    /// `terminate_with_first_full_solution` was satisfied. `false` means
    /// the call ran out of its time or iteration budget and can be resumed.
    pub finished: bool,
    /// Cumulative search iterations across every call on this handle.
    pub iterations: u64,
    /// Wall-clock time spent inside this call only, in milliseconds.
    pub search_time_ms: u64,
    /// Wall-clock time spent building the solver (relabelling, graph
    /// stores, domain initialisation), in milliseconds. Constant across
    /// every call on the same handle.
    pub init_time_ms: u64,
    /// A cheap lower bound on the optimal scalar product, from the
    /// cheapest possible target edge for every pattern edge.
    pub trivial_weight_lower_bound: Weight,
    /// A cheap upper bound on the optimal scalar product, from the most
    /// expensive possible target edge for every pattern edge.
    pub trivial_weight_initial_upper_bound: Weight,
    /// Sum of pattern edge weights, independent of any assignment.
    pub total_p_edge_weights: Weight,
    /// Whether the target graph has every possible edge (relevant to the
    /// IQP variant, whose target is always complete).
    pub target_is_complete: bool,
    /// The single best solution found so far, if any. Only the incumbent
    /// is ever reported, never the full Pareto set of equally-cheap
    /// alternatives.
    pub solutions: Vec<Solution>,
    pub extra_stats: ExtraStatistics,
}

enum SolverState {
    /// Insufficient target size or an empty domain discovered at
    /// initialisation: there is provably no valid assignment, and no
    /// search is ever run.
    TriviallyInfeasible,
    Active(SearchBranch),
}

struct BestSolution {
    assignments: Vec<(VertexId, VertexId)>,
    scalar_product: Weight,
    total_p_edges_weight: Weight,
}

/// The reusable handle behind [`solve`]: owns the relabelled graphs, the
/// search state, and the cumulative counters that make `solve_resume`
/// meaningful. Construct with [`MainSolver::new`], then drive it with
/// repeated [`MainSolver::solve_resume`] calls until `finished` comes back
/// `true`.
pub struct MainSolver {
    pattern_relabelling: Relabelling,
    target_relabelling: Relabelling,
    pattern_graph: Rc<Graph>,
    target_graph: Rc<Graph>,
    state: SolverState,
    finished: bool,
    root_reduced: bool,
    best: Option<BestSolution>,
    cumulative_iterations: u64,
    max_weight: Weight,
    trivial_weight_lower_bound: Weight,
    trivial_weight_initial_upper_bound: Weight,
    total_p_edge_weights: Weight,
    target_is_complete: bool,
    init_time_ms: u64,
}

impl MainSolver {
    /// Validate and relabel both graphs, build their graph stores and
    /// near-neighbours caches, and seed domains. Fails with [`Error`] on
    /// malformed input or weight-arithmetic overflow while computing the
    /// trivial bounds; does not run any search yet (see [`Self::solve`]).
    pub fn new(
        pattern_edges: &[(u32, u32, Weight)],
        target_edges: &[(u32, u32, Weight)],
        max_path_length: u32,
    ) -> Result<Self> {
        let init_start = Instant::now();

        let (pattern_relabelling, pattern_new_edges) = Relabelling::build(pattern_edges)?;
        let (target_relabelling, target_new_edges) = Relabelling::build(target_edges)?;
        let pattern_graph = Rc::new(Graph::from_edges(&pattern_new_edges)?);
        let target_graph = Rc::new(Graph::from_edges(&target_new_edges)?);

        let total_p_edge_weights = sum_weights(&pattern_graph)?;
        let target_weights = target_graph.all_weights();
        // `Graph::from_edges` already rejects an empty edge set, so this
        // always has at least one element.
        let min_t_weight = target_weights.iter().copied().min().unwrap_or(0);
        let max_t_weight = target_weights.iter().copied().max().unwrap_or(0);
        let trivial_weight_lower_bound =
            wsm_core::checked_mul(total_p_edge_weights, min_t_weight).ok_or(Error::Overflow)?;
        let trivial_weight_initial_upper_bound =
            wsm_core::checked_mul(total_p_edge_weights, max_t_weight).ok_or(Error::Overflow)?;

        let num_tv = target_graph.num_vertices();
        let target_is_complete = target_graph.num_edges() == num_tv * num_tv.saturating_sub(1) / 2;

        let num_pv = pattern_graph.num_vertices();
        let state = if num_pv > num_tv {
            log::debug!("pattern has {num_pv} vertices, target only {num_tv}: trivially infeasible");
            SolverState::TriviallyInfeasible
        } else {
            let mut pattern_nn = NearNeighbours::new(Rc::clone(&pattern_graph));
            let mut target_nn = NearNeighbours::new(Rc::clone(&target_graph));
            match initialise_domains(
                &pattern_graph,
                &mut pattern_nn,
                &target_graph,
                &mut target_nn,
                max_path_length as usize,
            ) {
                None => {
                    log::debug!("domain initialisation emptied a domain: trivially infeasible");
                    SolverState::TriviallyInfeasible
                }
                Some(domains) => {
                    let max_distance_reducer_k = (max_path_length as usize).max(1);
                    let branch = SearchBranch::new(
                        Rc::clone(&pattern_graph),
                        Rc::clone(&target_graph),
                        pattern_nn,
                        target_nn,
                        domains,
                        max_distance_reducer_k,
                        VALUE_ORDERING_RNG_SEED,
                    );
                    SolverState::Active(branch)
                }
            }
        };

        let init_time_ms = init_start.elapsed().as_millis() as u64;
        let finished = matches!(state, SolverState::TriviallyInfeasible);

        Ok(MainSolver {
            pattern_relabelling,
            target_relabelling,
            pattern_graph,
            target_graph,
            state,
            finished,
            root_reduced: false,
            best: None,
            cumulative_iterations: 0,
            max_weight: trivial_weight_initial_upper_bound,
            trivial_weight_lower_bound,
            trivial_weight_initial_upper_bound,
            total_p_edge_weights,
            target_is_complete,
            init_time_ms,
        })
    }

    /// The first call on a freshly constructed handle. Equivalent to
    /// [`Self::solve_resume`]; kept as a separate name so callers mirror
    /// the two-entry-point shape of the core contract (`solve` to start,
    /// `solve_resume` to continue).
    pub fn solve(&mut self, params: Params) -> SolutionData {
        self.run(params)
    }

    /// Continue a previous, not-yet-finished solve with a fresh budget.
    /// Idempotent once `finished` has been reported: calling again just
    /// returns the same answer at no additional cost.
    pub fn solve_resume(&mut self, params: Params) -> SolutionData {
        self.run(params)
    }

    fn run(&mut self, params: Params) -> SolutionData {
        let call_start = Instant::now();

        if self.finished {
            return self.snapshot(0);
        }

        // `timeout_ms == u64::MAX` means "no deadline"; adding it to `Instant`
        // directly risks overflowing the platform clock's representable range.
        let deadline = (params.timeout_ms != u64::MAX).then(|| call_start + Duration::from_millis(params.timeout_ms));

        let branch = match &mut self.state {
            SolverState::TriviallyInfeasible => {
                self.finished = true;
                return self.snapshot(call_start.elapsed().as_millis() as u64);
            }
            SolverState::Active(branch) => branch,
        };

        if !self.root_reduced {
            self.root_reduced = true;
            if let Some(cap) = params.weight_upper_bound_constraint {
                self.max_weight = self.max_weight.min(cap);
            }
            if branch.reduce_current_node(self.max_weight) == ReduceOutcome::NoGood {
                log::info!("root node is a nogood: no valid assignment exists");
                self.finished = true;
                branch.record_detector_stats();
                return self.snapshot(call_start.elapsed().as_millis() as u64);
            }
        } else if let Some(cap) = params.weight_upper_bound_constraint {
            self.max_weight = self.max_weight.min(cap);
        }

        let mut iterations_this_call = 0u64;
        loop {
            let past_deadline = deadline.is_some_and(|d| Instant::now() >= d);
            if iterations_this_call >= params.iterations_timeout || past_deadline {
                log::debug!("call budget exhausted after {iterations_this_call} iterations");
                break;
            }
            iterations_this_call += 1;
            self.cumulative_iterations += 1;

            if branch.is_complete() {
                let scalar_product = branch.current_scalar_product();
                log::info!("improved solution found, scalar_product={scalar_product}");
                self.best = Some(BestSolution {
                    assignments: branch.current_assignments(),
                    scalar_product,
                    total_p_edges_weight: branch.current_total_p_edge_weights(),
                });
                if params.terminate_with_first_full_solution {
                    self.finished = true;
                    break;
                }
                self.max_weight = scalar_product.saturating_sub(1);
                if !branch.backtrack(self.max_weight) {
                    log::info!("search tree exhausted: optimum proved");
                    self.finished = true;
                    break;
                }
                continue;
            }

            branch.move_down_from_reduced_node();
            if branch.reduce_current_node(self.max_weight) == ReduceOutcome::NoGood
                && !branch.backtrack(self.max_weight)
            {
                log::info!("search tree exhausted: optimum proved");
                self.finished = true;
                break;
            }
        }

        branch.record_detector_stats();
        self.snapshot(call_start.elapsed().as_millis() as u64)
    }

    fn snapshot(&self, search_time_ms: u64) -> SolutionData {
        let solutions = match &self.best {
            Some(best) => {
                let mut assignments: Vec<(u32, u32)> = best
                    .assignments
                    .iter()
                    .map(|&(pv, tv)| (self.pattern_relabelling.to_old(pv), self.target_relabelling.to_old(tv)))
                    .collect();
                assignments.sort_unstable_by_key(|&(pv, _)| pv);
                vec![Solution {
                    assignments,
                    scalar_product: best.scalar_product,
                    total_p_edges_weight: best.total_p_edges_weight,
                }]
            }
            None => Vec::new(),
        };

        let extra_stats = match &self.state {
            SolverState::Active(branch) => ExtraStatistics {
                number_of_pattern_vertices: branch.stats.number_of_pattern_vertices,
                number_of_target_vertices: branch.stats.number_of_target_vertices,
                initial_number_of_possible_assignments: branch.stats.initial_number_of_possible_assignments,
                total_number_of_assignments_tried: branch.stats.total_number_of_assignments_tried,
                total_number_of_impossible_assignments: branch.stats.total_number_of_impossible_assignments,
                n_tv_initially_passed_to_weight_nogood_detector: branch
                    .stats
                    .n_tv_initially_passed_to_weight_nogood_detector,
                n_tv_still_valid_in_weight_nogood_detector: branch.stats.n_tv_still_valid_in_weight_nogood_detector,
                impossible_target_vertices: branch
                    .stats
                    .impossible_target_vertices
                    .iter()
                    .map(|&tv| self.target_relabelling.to_old(tv))
                    .collect(),
            },
            SolverState::TriviallyInfeasible => ExtraStatistics {
                number_of_pattern_vertices: self.pattern_graph.num_vertices(),
                number_of_target_vertices: self.target_graph.num_vertices(),
                ..Default::default()
            },
        };

        SolutionData {
            finished: self.finished,
            iterations: self.cumulative_iterations,
            search_time_ms,
            init_time_ms: self.init_time_ms,
            trivial_weight_lower_bound: self.trivial_weight_lower_bound,
            trivial_weight_initial_upper_bound: self.trivial_weight_initial_upper_bound,
            total_p_edge_weights: self.total_p_edge_weights,
            target_is_complete: self.target_is_complete,
            solutions,
            extra_stats,
        }
    }
}

fn sum_weights(graph: &Graph) -> Result<Weight> {
    let mut total: Weight = 0;
    for w in graph.all_weights() {
        total = wsm_core::checked_add(total, w).ok_or(Error::Overflow)?;
    }
    Ok(total)
}

/// Run a single solve to completion, exhaustion of its budget, or
/// infeasibility proof. Equivalent to `MainSolver::new(...)?.solve(params)`;
/// use [`MainSolver`] directly when the call might need to be resumed.
pub fn solve(
    pattern_edges: &[(u32, u32, Weight)],
    target_edges: &[(u32, u32, Weight)],
    params: Params,
) -> Result<SolutionData> {
    let mut solver = MainSolver::new(pattern_edges, target_edges, params.max_path_length)?;
    Ok(solver.solve(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_into_triangle_finds_the_identity_embedding() {
        let p = [(0u32, 1u32, 1u64), (1, 2, 1), (0, 2, 1)];
        let t = [(0u32, 1u32, 1u64), (1, 2, 1), (0, 2, 1)];
        let result = solve(&p, &t, Params::default()).unwrap();
        assert!(result.finished);
        assert_eq!(result.solutions.len(), 1);
        assert_eq!(result.solutions[0].scalar_product, 3);
    }

    #[test]
    fn oversized_pattern_is_reported_as_finished_with_no_solutions() {
        let p = [(0u32, 1u32, 1u64), (1, 2, 1), (2, 3, 1), (3, 4, 1), (4, 5, 1)];
        let t = [(0u32, 1u32, 1u64)];
        let result = solve(&p, &t, Params::default()).unwrap();
        assert!(result.finished);
        assert!(result.solutions.is_empty());
    }

    #[test]
    fn self_loop_is_a_bad_input_error() {
        let p = [(0u32, 0u32, 1u64)];
        let t = [(0u32, 1u32, 1u64)];
        let err = solve(&p, &t, Params::default()).unwrap_err();
        assert_eq!(err, Error::BadInput(BadInputReason::SelfLoop));
    }

    #[test]
    fn star_into_bigger_star_minimises_scalar_product() {
        // pattern: K_{1,4} centred on 0, all weight 1.
        let p = [(0u32, 1u32, 1u64), (0, 2, 1), (0, 3, 1), (0, 4, 1)];
        // target: K_{1,5} centred on 0, weights 1..=5.
        let t = [(0u32, 1u32, 1u64), (0, 2, 2), (0, 3, 3), (0, 4, 4), (0, 5, 5)];
        let result = solve(&p, &t, Params::default()).unwrap();
        assert!(result.finished);
        assert_eq!(result.solutions[0].scalar_product, 1 + 2 + 3 + 4);
    }

    #[test]
    fn resuming_with_a_tiny_budget_eventually_reaches_the_same_answer() {
        let p = [(0u32, 1u32, 1u64), (1, 2, 1), (0, 2, 1)];
        let t = [(0u32, 1u32, 1u64), (1, 2, 1), (0, 2, 1)];
        let mut solver = MainSolver::new(&p, &t, 3).unwrap();
        let small_budget = Params {
            iterations_timeout: 1,
            ..Params::default()
        };
        let mut last = solver.solve(small_budget);
        let mut guard = 0;
        while !last.finished {
            guard += 1;
            assert!(guard < 10_000, "resume loop did not converge");
            last = solver.solve_resume(small_budget);
        }
        assert_eq!(last.solutions[0].scalar_product, 3);

        let one_shot = solve(&p, &t, Params::default()).unwrap();
        assert_eq!(one_shot.solutions[0].scalar_product, last.solutions[0].scalar_product);
    }
}
