//! The reducer pipeline (neighbours, distance-k, derived-graph, Hall-set).
//!
//! Reducer kinds are a tagged enum rather than a trait object: the design
//! deliberately avoids dynamic dispatch here since the reduce loop is the
//! hottest part of the search and a `match` on a small closed set of
//! variants keeps it monomorphic with no heap allocation per call.

mod derived;
mod distance;
mod hall_set;
mod neighbours;

pub use hall_set::HallSetReducer;

use wsm_core::{Bitset, Graph, NearNeighbours, VertexId};

use crate::nodes::{DomainsAccessor, ReductionResult};

/// Borrowed graph-theoretic context a reducer needs: the two graphs plus
/// their (mutably cached) near-neighbours data.
pub struct GraphContext<'a> {
    pub pattern_graph: &'a Graph,
    pub pattern_nn: &'a mut NearNeighbours,
    pub target_graph: &'a Graph,
    pub target_nn: &'a mut NearNeighbours,
}

/// One of the domain-tightening reducer kinds. A tagged variant rather
/// than a trait object: dispatch stays a static match in the hot reduce
/// loop instead of a vtable call.
pub enum Reducer {
    Neighbours(neighbours::NeighboursReducer),
    Distance(distance::DistanceReducer),
    Derived(derived::DerivedGraphReducer),
}

impl Reducer {
    pub fn distance(k: usize) -> Self {
        Reducer::Distance(distance::DistanceReducer { k })
    }

    pub fn neighbours() -> Self {
        Reducer::Neighbours(neighbours::NeighboursReducer)
    }

    pub fn derived(num_pattern_vertices: usize, num_target_vertices: usize) -> Self {
        Reducer::Derived(derived::DerivedGraphReducer::new(num_pattern_vertices, num_target_vertices))
    }

    /// Context-free feasibility test: `false` means `(pv, tv)` is
    /// universally impossible, not just wrong in the current node.
    pub fn check(&mut self, ctx: &mut GraphContext<'_>, pv: VertexId, tv: VertexId) -> bool {
        match self {
            Reducer::Neighbours(r) => r.check(ctx, pv, tv),
            Reducer::Distance(r) => r.check(ctx, pv, tv),
            Reducer::Derived(r) => r.check(ctx, pv, tv),
        }
    }

    /// Tighten domains of pattern vertices affected by `(pv, tv)` having
    /// just been assigned.
    pub fn reduce(
        &mut self,
        ctx: &mut GraphContext<'_>,
        accessor: &mut DomainsAccessor<'_>,
        pv: VertexId,
        tv: VertexId,
        scratch: &mut Bitset,
    ) -> ReductionResult {
        match self {
            Reducer::Neighbours(r) => r.reduce(ctx, accessor, pv, tv, scratch),
            Reducer::Distance(r) => r.reduce(ctx, accessor, pv, tv, scratch),
            Reducer::Derived(r) => r.reduce(ctx, accessor, pv, tv, scratch),
        }
    }
}

/// Remembers, per node, how many of the current node's `new_assignments`
/// this reducer has already folded in -- reset via [`ReducerWrapper::clear`]
/// at the start of reducing each node.
pub struct ReducerWrapper {
    pub reducer: Reducer,
    n_processed: usize,
}

impl ReducerWrapper {
    pub fn new(reducer: Reducer) -> Self {
        ReducerWrapper {
            reducer,
            n_processed: 0,
        }
    }

    pub fn clear(&mut self) {
        self.n_processed = 0;
    }

    /// Fold in every new assignment not yet processed. Stops at the first
    /// `NoGood` or `NewAssignment` so the caller can re-run `alldiff`
    /// before asking any reducer for more.
    pub fn run(
        &mut self,
        ctx: &mut GraphContext<'_>,
        accessor: &mut DomainsAccessor<'_>,
        scratch: &mut Bitset,
    ) -> ReductionResult {
        loop {
            let assignments = accessor.new_assignments();
            if self.n_processed >= assignments.len() {
                return ReductionResult::Success;
            }
            let (pv, tv) = assignments[self.n_processed];
            self.n_processed += 1;
            match self.reducer.reduce(ctx, accessor, pv, tv, scratch) {
                ReductionResult::Success => continue,
                other => return other,
            }
        }
    }
}

/// `true` iff `pv'` can be skipped when tightening after `(pv, tv)` was
/// assigned: the neighbours and distance reducers are symmetric (their
/// derived mapping `M` satisfies `tv2 in M(pv1,tv1)[pv2] <=> tv1 in
/// M(pv2,tv2)[pv1]`), so once `pv'` is itself assigned, its own
/// already-applied tightening guarantees consistency and redoing the work
/// here would be wasted.
fn already_assigned(accessor: &DomainsAccessor<'_>, pv: VertexId) -> bool {
    accessor.domain_size(pv) == 1
}
