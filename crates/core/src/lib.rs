//! Graph-theoretic primitives shared by the weighted subgraph monomorphism
//! solver: an immutable adjacency store, a lazily-computed near-neighbours
//! cache, vertex relabelling, a dense bitset domain type, and the small
//! numeric helpers (dyadic fractions, a deterministic RNG) used to keep the
//! search overflow-safe and reproducible.
//!
//! This crate has no notion of *search*: it knows about graphs and numbers,
//! not about domains-as-search-state or reducers. [`wsm_solver`] builds on
//! top of it.

mod bitset;
mod dyadic;
mod error;
mod graph;
mod neighbours;
mod relabel;
mod rng;
mod vertex;
mod weight;

pub use bitset::Bitset;
pub use dyadic::DyadicFraction;
pub use error::{BadInputReason, Error, Result};
pub use graph::Graph;
pub use neighbours::{DegreeCount, NearNeighbours};
pub use relabel::Relabelling;
pub use rng::Rng;
pub use vertex::VertexId;
pub use weight::{checked_add, checked_mul, checked_mul_add, Weight};
