//! End-to-end scenarios driving `wsm::solve` through its public API only,
//! mirroring the concrete worked examples used to validate the solver
//! during design: exact isomorphic matches, weighted optimisation,
//! infeasibility by size, weight-cap infeasibility, and resume
//! equivalence against a single uninterrupted run.

use wsm::{solve, BadInputReason, Error, MainSolver, Params};

/// Edges of an `w`x`h` grid (unit weight), vertices numbered row-major.
fn grid_edges(w: u32, h: u32) -> Vec<(u32, u32, u64)> {
    let id = |x: u32, y: u32| y * w + x;
    let mut edges = Vec::new();
    for y in 0..h {
        for x in 0..w {
            if x + 1 < w {
                edges.push((id(x, y), id(x + 1, y), 1));
            }
            if y + 1 < h {
                edges.push((id(x, y), id(x, y + 1), 1));
            }
        }
    }
    edges
}

/// A path pattern of `n` unit-weight edges on `n + 1` vertices.
fn path_edges(n: u32) -> Vec<(u32, u32, u64)> {
    (0..n).map(|i| (i, i + 1, 1)).collect()
}

#[test]
fn triangle_into_triangle_equal_weights() {
    let p = [(0u32, 1u32, 1u64), (1, 2, 1), (0, 2, 1)];
    let t = [(0u32, 1u32, 1u64), (1, 2, 1), (0, 2, 1)];

    let result = solve(&p, &t, Params::default()).unwrap();
    assert!(result.finished);
    assert_eq!(result.solutions.len(), 1);
    assert_eq!(result.solutions[0].scalar_product, 3);

    // every valid monomorphism scores the same here, so stopping at the
    // first complete assignment must agree with the fully-optimised run.
    let first_only = solve(
        &p,
        &t,
        Params {
            terminate_with_first_full_solution: true,
            ..Params::default()
        },
    )
    .unwrap();
    assert!(first_only.finished);
    assert_eq!(first_only.solutions[0].scalar_product, 3);
}

#[test]
fn increasing_unit_weight_paths_into_a_grid_score_their_own_length() {
    // a path of k unit-weight edges costs exactly k once embedded, for
    // every k that still fits injectively inside the grid.
    let target = grid_edges(3, 3);
    for k in 2..=7u32 {
        let pattern = path_edges(k);
        let result = solve(&pattern, &target, Params::default()).unwrap();
        assert!(result.finished, "k={k}");
        assert_eq!(result.solutions.len(), 1, "k={k}");
        assert_eq!(result.solutions[0].scalar_product, k as u64, "k={k}");
    }
}

#[test]
fn oversized_pattern_into_small_grid_is_trivially_infeasible() {
    // 9 pattern vertices cannot inject into an 8-vertex target.
    let pattern = path_edges(8);
    let target = grid_edges(4, 2);
    let result = solve(&pattern, &target, Params::default()).unwrap();
    assert!(result.finished);
    assert!(result.solutions.is_empty());
}

#[test]
fn star_minimises_scalar_product_by_pairing_heavy_with_heavy() {
    // K_{1,4}, spoke weights 1..4, into K_{1,5}, spoke weights 1..5: the
    // optimal pairing is the anti-sorted one (heaviest pattern spoke on
    // the heaviest available target spoke), leaving the spare spoke idle.
    let pattern = [(0u32, 1u32, 1u64), (0, 2, 2), (0, 3, 3), (0, 4, 4)];
    let target = [(0u32, 1u32, 1u64), (0, 2, 2), (0, 3, 3), (0, 4, 4), (0, 5, 5)];
    let result = solve(&pattern, &target, Params::default()).unwrap();
    assert!(result.finished);
    assert_eq!(result.solutions[0].scalar_product, 1 + 2 * 2 + 3 * 3 + 4 * 4);
}

#[test]
fn zero_weight_pattern_edges_contribute_nothing() {
    let pattern = [(0u32, 1u32, 0u64), (1, 2, 0)];
    let target = [(0u32, 1u32, 7u64), (1, 2, 9)];
    let result = solve(&pattern, &target, Params::default()).unwrap();
    assert!(result.finished);
    assert_eq!(result.solutions[0].scalar_product, 0);
}

#[test]
fn weight_cap_of_zero_makes_an_otherwise_solvable_instance_infeasible() {
    let pattern = [(0u32, 1u32, 1u64)];
    let target = [(0u32, 1u32, 1u64)];
    let params = Params {
        weight_upper_bound_constraint: Some(0),
        ..Params::default()
    };
    let result = solve(&pattern, &target, params).unwrap();
    assert!(result.finished);
    assert!(result.solutions.is_empty());
}

#[test]
fn empty_pattern_edge_set_is_bad_input() {
    let pattern: [(u32, u32, u64); 0] = [];
    let target = [(0u32, 1u32, 1u64)];
    let err = solve(&pattern, &target, Params::default()).unwrap_err();
    assert_eq!(err, Error::BadInput(BadInputReason::EmptyGraph));
}

#[test]
fn non_contiguous_user_vertex_ids_round_trip_through_relabelling() {
    // user ids are sparse and unordered; the reported assignments must
    // still be expressed in those original ids, not the internal ones.
    let pattern = [(100u32, 200u32, 1u64), (200, 300, 1)];
    let target = [(7u32, 42u32, 1u64), (42, 99, 1), (7, 99, 1)];
    let result = solve(&pattern, &target, Params::default()).unwrap();
    assert!(result.finished);
    let assignment = &result.solutions[0].assignments;
    let mapped_pvs: Vec<u32> = assignment.iter().map(|&(pv, _)| pv).collect();
    assert_eq!(mapped_pvs, vec![100, 200, 300]);
    let mapped_tvs: std::collections::HashSet<u32> = assignment.iter().map(|&(_, tv)| tv).collect();
    assert!(mapped_tvs.is_subset(&[7u32, 42, 99].into_iter().collect()));
}

#[test]
fn resuming_in_small_steps_matches_a_single_uninterrupted_solve() {
    let pattern = grid_edges(3, 2);
    let target = grid_edges(4, 3);

    let one_shot = solve(&pattern, &target, Params::default()).unwrap();
    assert!(one_shot.finished);

    let mut solver = MainSolver::new(&pattern, &target, 3).unwrap();
    let step = Params {
        iterations_timeout: 25,
        ..Params::default()
    };
    let mut last = solver.solve(step);
    let mut guard = 0;
    while !last.finished {
        guard += 1;
        assert!(guard < 100_000, "resume loop did not converge");
        last = solver.solve_resume(step);
    }

    assert_eq!(last.solutions[0].scalar_product, one_shot.solutions[0].scalar_product);
    assert_eq!(last.solutions[0].assignments, one_shot.solutions[0].assignments);
}

#[test]
fn inconsistent_duplicate_edge_weight_is_bad_input() {
    let pattern = [(0u32, 1u32, 1u64), (1, 0, 2)];
    let target = [(0u32, 1u32, 1u64)];
    let err = solve(&pattern, &target, Params::default()).unwrap_err();
    assert_eq!(err, Error::BadInput(BadInputReason::InconsistentDuplicateEdge));
}
