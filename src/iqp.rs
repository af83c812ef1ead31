//! Initial Qubit Placement (IQP): an application-level boundary built on top
//! of the exact WSM solver.
//!
//! `T` is treated as implicitly complete: every pair of target vertices not
//! given an explicit edge still carries a configured [`ImplicitTargetWeight`].
//! A randomized local search ("Monte Carlo Complete Target", MCCT) hunts for
//! a cheap permutation of the pattern vertices onto distinct target
//! vertices; the permutation is then pruned down to a small weighted
//! subgraph (the edges it actually used, plus a bounded number of cheap
//! extras between used target vertices) and handed to the exact core
//! solver with a weight cap one below the MCCT score, to prove optimality
//! within that restricted target or improve on it.
//!
//! The random-jumping move operator itself is kept deliberately simple:
//! this module's job is the orchestration (MCCT -> prune -> exact), not a
//! tuned metaheuristic. It is a plain consumer of the crate's public
//! [`solve`] entry point -- nothing here touches `wsm_solver`'s search
//! state directly.

use std::collections::HashMap;

use wsm_core::{checked_add, checked_mul, BadInputReason, Error, Graph, Relabelling, Rng, VertexId, Weight};

use crate::{solve, ExtraStatistics, Params, Result, Solution, SolutionData};

/// The scalar-product cost charged for a pattern edge whose endpoints land
/// on a target pair with no explicit hardware edge -- e.g. a missing qubit
/// coupling that would need an inserted SWAP chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImplicitTargetWeight(pub Weight);

/// Tuning for [`iqp_solve`]: how hard the Monte Carlo phase searches before
/// handing its best permutation to the exact follow-up, how large a pruned
/// target subgraph it is allowed to build, and what the exact phase itself
/// is allowed to spend.
#[derive(Debug, Clone)]
pub struct IqpParams {
    /// Cost of a missing target edge; see [`ImplicitTargetWeight`].
    pub implicit_weight: ImplicitTargetWeight,
    /// Number of independent random restarts the local search runs.
    pub mcct_restarts: u32,
    /// Hill-climbing moves attempted per restart.
    pub mcct_moves_per_restart: u32,
    /// Seed for the local search's RNG (reproducibility, not entropy).
    pub mcct_rng_seed: u64,
    /// Upper bound on how many extra (unused-by-MCCT) target edges the
    /// pruning step may add beyond the ones the MCCT solution actually used.
    pub max_extra_target_edges: usize,
    /// Parameters forwarded to the exact follow-up solve. Its
    /// `weight_upper_bound_constraint` is overwritten with the MCCT score
    /// minus one before the call.
    pub exact: Params,
}

impl Default for IqpParams {
    fn default() -> Self {
        IqpParams {
            implicit_weight: ImplicitTargetWeight(1_000),
            mcct_restarts: 16,
            mcct_moves_per_restart: 2_000,
            mcct_rng_seed: 0x1ab1_e_1ab1_e_5eed,
            max_extra_target_edges: 64,
            exact: Params::default(),
        }
    }
}

/// A lookup over the explicit hardware edges, with every other pair
/// defaulting to [`IqpParams::implicit_weight`]. Vertices are taken as
/// already contiguous `0..num_target_vertices` (the usual numbering for a
/// fixed piece of hardware); unlike [`wsm_core::Graph`] a vertex need not
/// appear in any explicit edge.
struct CompleteTarget {
    num_vertices: usize,
    explicit: HashMap<(u32, u32), Weight>,
    implicit_weight: Weight,
}

impl CompleteTarget {
    fn build(
        target_edges: &[(u32, u32, Weight)],
        num_target_vertices: usize,
        implicit_weight: Weight,
    ) -> Result<Self> {
        let mut explicit = HashMap::with_capacity(target_edges.len());
        for &(u, v, w) in target_edges {
            if u == v {
                return Err(Error::BadInput(BadInputReason::SelfLoop));
            }
            if u as usize >= num_target_vertices || v as usize >= num_target_vertices {
                return Err(Error::BadInput(BadInputReason::NonContiguousVertices));
            }
            let key = if u < v { (u, v) } else { (v, u) };
            if let Some(&existing) = explicit.get(&key) {
                if existing != w {
                    return Err(Error::BadInput(BadInputReason::InconsistentDuplicateEdge));
                }
            } else {
                explicit.insert(key, w);
            }
        }
        Ok(CompleteTarget {
            num_vertices: num_target_vertices,
            explicit,
            implicit_weight,
        })
    }

    fn effective_weight(&self, u: VertexId, v: VertexId) -> Weight {
        let key = if u.0 < v.0 { (u.0, v.0) } else { (v.0, u.0) };
        self.explicit.get(&key).copied().unwrap_or(self.implicit_weight)
    }

    fn explicit_weight(&self, u: VertexId, v: VertexId) -> Option<Weight> {
        let key = if u.0 < v.0 { (u.0, v.0) } else { (v.0, u.0) };
        self.explicit.get(&key).copied()
    }
}

/// A full injective assignment of every pattern vertex to a distinct target
/// vertex (MCCT always places *every* pattern vertex, unlike the core
/// search's partial-then-complete domains).
#[derive(Clone)]
struct Placement {
    /// `assigned[pv] = tv`.
    assigned: Vec<VertexId>,
    /// `occupant[tv] = Some(pv)` if `tv` is currently used.
    occupant: Vec<Option<VertexId>>,
}

impl Placement {
    fn random(num_pv: usize, num_tv: usize, rng: &mut Rng) -> Self {
        let mut pool: Vec<VertexId> = (0..num_tv as u32).map(VertexId).collect();
        for i in 0..num_pv {
            let j = i + rng.next_below((num_tv - i) as u64) as usize;
            pool.swap(i, j);
        }
        pool.truncate(num_pv);

        let mut occupant = vec![None; num_tv];
        for (pv_idx, &tv) in pool.iter().enumerate() {
            occupant[tv.index()] = Some(VertexId::from(pv_idx));
        }
        Placement {
            assigned: pool,
            occupant,
        }
    }

    fn swap(&mut self, pv1: VertexId, pv2: VertexId) {
        self.assigned.swap(pv1.index(), pv2.index());
        self.occupant[self.assigned[pv1.index()].index()] = Some(pv1);
        self.occupant[self.assigned[pv2.index()].index()] = Some(pv2);
    }

    fn jump(&mut self, pv: VertexId, new_tv: VertexId) {
        let old_tv = self.assigned[pv.index()];
        self.occupant[old_tv.index()] = None;
        self.occupant[new_tv.index()] = Some(pv);
        self.assigned[pv.index()] = new_tv;
    }
}

fn score(pattern: &Graph, target: &CompleteTarget, placement: &Placement) -> Option<Weight> {
    let mut total: Weight = 0;
    for i in 0..pattern.num_vertices() {
        let pv = VertexId::from(i);
        for &(pv2, w_p) in pattern.neighbours_and_weights(pv) {
            if pv2.index() <= pv.index() {
                continue; // each unordered pattern edge scored once.
            }
            let w_t = target.effective_weight(placement.assigned[pv.index()], placement.assigned[pv2.index()]);
            total = checked_add(total, checked_mul(w_p, w_t)?)?;
        }
    }
    Some(total)
}

/// One MCCT restart: random start, then `moves` swap-or-jump hill-climbing
/// steps, keeping whichever placement scores lowest along the way.
fn mcct_restart(
    pattern: &Graph,
    target: &CompleteTarget,
    moves: u32,
    rng: &mut Rng,
) -> Result<(Placement, Weight)> {
    let num_pv = pattern.num_vertices();
    let num_tv = target.num_vertices;
    let mut current = Placement::random(num_pv, num_tv, rng);
    let mut current_score = score(pattern, target, &current).ok_or(Error::Overflow)?;
    let mut best = current.clone();
    let mut best_score = current_score;

    for _ in 0..moves {
        let jump_allowed = num_tv > num_pv;
        let do_jump = jump_allowed && num_pv < 2 || (jump_allowed && rng.next_below(2) == 0);

        let mut candidate = current.clone();
        if do_jump {
            let pv = VertexId::from(rng.next_below(num_pv as u64) as u32);
            // pick a currently-unused target vertex to jump to.
            let free_count = num_tv - num_pv;
            let mut draw = rng.next_below(free_count as u64);
            let mut chosen = None;
            for tv_idx in 0..num_tv {
                if candidate.occupant[tv_idx].is_none() {
                    if draw == 0 {
                        chosen = Some(VertexId::from(tv_idx));
                        break;
                    }
                    draw -= 1;
                }
            }
            let new_tv = chosen.expect("free_count matched the number of unoccupied target vertices");
            candidate.jump(pv, new_tv);
        } else if num_pv >= 2 {
            let i = rng.next_below(num_pv as u64) as u32;
            let mut j = rng.next_below(num_pv as u64) as u32;
            if j == i {
                j = (j + 1) % num_pv as u32;
            }
            candidate.swap(VertexId(i), VertexId(j));
        } else {
            continue;
        }

        let candidate_score = score(pattern, target, &candidate).ok_or(Error::Overflow)?;
        if candidate_score <= current_score {
            current = candidate;
            current_score = candidate_score;
            if current_score < best_score {
                best_score = current_score;
                best = current.clone();
            }
        }
    }

    Ok((best, best_score))
}

/// Run MCCT's restarts and return the best placement found plus its score.
fn mcct_search(pattern: &Graph, target: &CompleteTarget, params: &IqpParams) -> Result<(Placement, Weight)> {
    let mut rng = Rng::new(params.mcct_rng_seed);
    let mut best: Option<(Placement, Weight)> = None;
    for _ in 0..params.mcct_restarts.max(1) {
        let (placement, s) = mcct_restart(pattern, target, params.mcct_moves_per_restart, &mut rng)?;
        if best.as_ref().is_none_or(|(_, best_s)| s < *best_s) {
            best = Some((placement, s));
        }
    }
    Ok(best.expect("mcct_restarts.max(1) guarantees at least one restart ran"))
}

/// Prune the implicit-complete target down to the edges the MCCT placement
/// used, plus up to `max_extra` cheap explicit edges between two used target
/// vertices that weren't already included.
fn prune_target(
    pattern: &Graph,
    target: &CompleteTarget,
    placement: &Placement,
    max_extra: usize,
) -> Vec<(u32, u32, Weight)> {
    let mut kept: HashMap<(u32, u32), Weight> = HashMap::new();
    let mut used: Vec<VertexId> = placement.assigned.clone();
    used.sort_unstable_by_key(|v| v.0);
    used.dedup();

    for i in 0..pattern.num_vertices() {
        let pv = VertexId::from(i);
        for &(pv2, _) in pattern.neighbours_and_weights(pv) {
            if pv2.index() <= pv.index() {
                continue;
            }
            let tv1 = placement.assigned[pv.index()];
            let tv2 = placement.assigned[pv2.index()];
            let key = if tv1.0 < tv2.0 { (tv1.0, tv2.0) } else { (tv2.0, tv1.0) };
            kept.entry(key).or_insert_with(|| target.effective_weight(tv1, tv2));
        }
    }

    let mut candidates: Vec<(u32, u32, Weight)> = Vec::new();
    for (a_idx, &tv_a) in used.iter().enumerate() {
        for &tv_b in &used[a_idx + 1..] {
            let key = if tv_a.0 < tv_b.0 { (tv_a.0, tv_b.0) } else { (tv_b.0, tv_a.0) };
            if kept.contains_key(&key) {
                continue;
            }
            if let Some(w) = target.explicit_weight(tv_a, tv_b) {
                candidates.push((key.0, key.1, w));
            }
        }
    }
    candidates.sort_unstable_by_key(|&(_, _, w)| w);
    for &(u, v, w) in candidates.iter().take(max_extra) {
        kept.insert((u, v), w);
    }

    kept.into_iter().map(|((u, v), w)| (u, v, w)).collect()
}

/// Run the IQP heuristic: MCCT local search for an upper bound, prune the
/// implicit-complete target to a small explicit subgraph around it, then
/// hand that to the exact core solver to prove optimality (within the
/// pruned target) or improve on it. `pattern_edges` may use arbitrary
/// vertex ids; `target_edges` must use ids in `0..num_target_vertices`.
pub fn iqp_solve(
    pattern_edges: &[(u32, u32, Weight)],
    target_edges: &[(u32, u32, Weight)],
    num_target_vertices: u32,
    params: IqpParams,
) -> Result<SolutionData> {
    let (pattern_relabelling, pattern_new_edges) = Relabelling::build(pattern_edges)?;
    let pattern_graph = Graph::from_edges(&pattern_new_edges)?;

    if pattern_graph.num_vertices() > num_target_vertices as usize {
        return Ok(SolutionData {
            finished: true,
            target_is_complete: true,
            extra_stats: ExtraStatistics {
                number_of_pattern_vertices: pattern_graph.num_vertices(),
                number_of_target_vertices: num_target_vertices as usize,
                ..Default::default()
            },
            ..Default::default()
        });
    }

    let target = CompleteTarget::build(
        target_edges,
        num_target_vertices as usize,
        params.implicit_weight.0,
    )?;

    let (best_placement, mcct_weight) = mcct_search(&pattern_graph, &target, &params)?;

    let pruned_target_edges = prune_target(&pattern_graph, &target, &best_placement, params.max_extra_target_edges);

    let mut exact_params = params.exact;
    exact_params.weight_upper_bound_constraint = Some(
        exact_params
            .weight_upper_bound_constraint
            .unwrap_or(Weight::MAX)
            .min(mcct_weight.saturating_sub(1)),
    );

    let mut exact_result = solve(pattern_edges, &pruned_target_edges, exact_params)?;
    exact_result.target_is_complete = true;
    exact_result.trivial_weight_initial_upper_bound = mcct_weight;

    if exact_result.solutions.is_empty() {
        // The exact phase found nothing strictly cheaper within the pruned
        // target: report the MCCT placement itself, translated back to the
        // caller's original pattern vertex ids.
        let total_p_edges_weight = pattern_graph
            .all_weights()
            .into_iter()
            .try_fold(0u64, |acc, w| checked_add(acc, w))
            .ok_or(Error::Overflow)?;
        let mut assignments: Vec<(u32, u32)> = (0..pattern_graph.num_vertices())
            .map(|i| {
                let pv = VertexId::from(i);
                (pattern_relabelling.to_old(pv), best_placement.assigned[i].0)
            })
            .collect();
        assignments.sort_unstable_by_key(|&(pv, _)| pv);
        exact_result.solutions = vec![Solution {
            assignments,
            scalar_product: mcct_weight,
            total_p_edges_weight,
        }];
    }

    Ok(exact_result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_target_falls_back_to_the_implicit_weight() {
        let t = CompleteTarget::build(&[(0, 1, 5)], 3, 99).unwrap();
        assert_eq!(t.effective_weight(VertexId(0), VertexId(1)), 5);
        assert_eq!(t.effective_weight(VertexId(0), VertexId(2)), 99);
        assert_eq!(t.effective_weight(VertexId(1), VertexId(2)), 99);
    }

    #[test]
    fn placement_swap_keeps_occupant_table_consistent() {
        let mut rng = Rng::new(7);
        let mut p = Placement::random(3, 5, &mut rng);
        let before = p.assigned.clone();
        p.swap(VertexId(0), VertexId(1));
        assert_eq!(p.assigned[0], before[1]);
        assert_eq!(p.assigned[1], before[0]);
        assert_eq!(p.occupant[p.assigned[0].index()], Some(VertexId(0)));
        assert_eq!(p.occupant[p.assigned[1].index()], Some(VertexId(1)));
    }

    #[test]
    fn placement_jump_frees_the_old_target_vertex() {
        let mut rng = Rng::new(7);
        let mut p = Placement::random(2, 5, &mut rng);
        let old_tv = p.assigned[0];
        let free_tv = (0..5).map(VertexId).find(|tv| p.occupant[tv.index()].is_none()).unwrap();
        p.jump(VertexId(0), free_tv);
        assert_eq!(p.assigned[0], free_tv);
        assert_eq!(p.occupant[old_tv.index()], None);
        assert_eq!(p.occupant[free_tv.index()], Some(VertexId(0)));
    }

    #[test]
    fn mcct_finds_the_identity_placement_on_an_exact_triangle_match() {
        let pattern = Graph::from_edges(&[(0, 1, 1), (1, 2, 1), (0, 2, 1)]).unwrap();
        let target = CompleteTarget::build(&[(0, 1, 1), (1, 2, 1), (0, 2, 1)], 3, 1_000).unwrap();
        let params = IqpParams {
            mcct_restarts: 8,
            mcct_moves_per_restart: 200,
            mcct_rng_seed: 42,
            ..IqpParams::default()
        };
        let (_, score) = mcct_search(&pattern, &target, &params).unwrap();
        assert_eq!(score, 3);
    }

    #[test]
    fn prune_target_keeps_every_edge_the_placement_used() {
        let pattern = Graph::from_edges(&[(0, 1, 1), (1, 2, 1)]).unwrap();
        let target = CompleteTarget::build(&[(0, 1, 2), (1, 2, 3), (0, 2, 4)], 3, 1_000).unwrap();
        let placement = Placement {
            assigned: vec![VertexId(0), VertexId(1), VertexId(2)],
            occupant: vec![Some(VertexId(0)), Some(VertexId(1)), Some(VertexId(2))],
        };
        let pruned = prune_target(&pattern, &target, &placement, 0);
        let has = |u: u32, v: u32, w: Weight| pruned.iter().any(|&(a, b, ww)| (a, b) == (u, v) && ww == w);
        assert!(has(0, 1, 2));
        assert!(has(1, 2, 3));
    }

    #[test]
    fn iqp_solve_finds_the_optimum_on_a_tiny_exact_instance() {
        let pattern = [(0u32, 1u32, 1u64), (1, 2, 1), (0, 2, 1)];
        let target_edges = [(0u32, 1u32, 1u64), (1, 2, 1), (0, 2, 1)];
        let params = IqpParams {
            mcct_restarts: 8,
            mcct_moves_per_restart: 200,
            mcct_rng_seed: 1,
            exact: Params {
                terminate_with_first_full_solution: false,
                ..Params::default()
            },
            ..IqpParams::default()
        };
        let result = iqp_solve(&pattern, &target_edges, 3, params).unwrap();
        assert!(result.finished);
        assert_eq!(result.solutions[0].scalar_product, 3);
        assert!(result.target_is_complete);
    }

    #[test]
    fn oversized_pattern_is_trivially_infeasible() {
        let pattern = [(0u32, 1u32, 1u64), (1, 2, 1), (2, 3, 1), (3, 4, 1), (4, 5, 1)];
        let target_edges = [(0u32, 1u32, 1u64)];
        let result = iqp_solve(&pattern, &target_edges, 2, IqpParams::default()).unwrap();
        assert!(result.finished);
        assert!(result.solutions.is_empty());
    }
}
