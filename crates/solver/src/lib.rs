//! The backtracking search engine: the node stack, the reducer pipeline,
//! weight-based pruning, branching, and the main reduce loop.
//!
//! [`wsm_core`] supplies graphs and numbers; this crate supplies *search*
//! on top of them. Nothing here knows about user-facing vertex ids, input
//! validation, or timeouts -- that is the root `wsm` crate's job.

mod branch;
mod domain_init;
mod filter_utils;
mod nodes;
mod nogood;
mod reducers;
mod value_ordering;
mod weight_calc;

pub use branch::{ExtraStatistics, ReduceOutcome, SearchBranch};
pub use domain_init::initialise_domains;
pub use nodes::{DomainsAccessor, IntersectionResult, NodesRawData, ReductionResult};
pub use nogood::{WeightCheckOutcome, WeightChecker, WeightNogoodDetector, WeightNogoodManager};
pub use reducers::{GraphContext, HallSetReducer, Reducer, ReducerWrapper};
pub use value_ordering::choose_value;
