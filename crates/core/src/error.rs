use core::fmt;

/// Errors surfaced from graph construction and weight arithmetic.
///
/// Both variants are non-recoverable: callers see them once, before or at
/// the point of failure, and the solver does not attempt to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A structural problem with the input graph: a self-loop, an edge
    /// given twice with different weights, a non-contiguous vertex
    /// numbering, or an empty edge set.
    BadInput(BadInputReason),
    /// A weight addition or multiplication would not fit in a `u64`.
    Overflow,
}

/// Why a graph failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadInputReason {
    /// An edge `(v, v)` was given.
    SelfLoop,
    /// `(u, v)` and `(v, u)` were both given with different weights.
    InconsistentDuplicateEdge,
    /// Vertex ids are not exactly `0..n` for some `n`.
    NonContiguousVertices,
    /// The edge set was empty.
    EmptyGraph,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadInput(reason) => write!(f, "bad input: {reason}"),
            Error::Overflow => write!(f, "weight arithmetic overflowed u64"),
        }
    }
}

impl fmt::Display for BadInputReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            BadInputReason::SelfLoop => "graph contains a self-loop",
            BadInputReason::InconsistentDuplicateEdge => {
                "edge given twice with different weights"
            }
            BadInputReason::NonContiguousVertices => "vertex ids are not contiguous from 0",
            BadInputReason::EmptyGraph => "edge set is empty",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}

/// Convenience alias for results that fail with [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
