use thiserror::Error;

/// The ways in which a learning session can fail.
///
/// None of these are recoverable inside the core: every error unwinds out of
/// [`LStar::learn`](crate::LStar::learn). The membership cache of the
/// knowledge base stays valid, so a caller may retry a failed session with a
/// larger state bound without re-querying the target.
#[derive(Debug, Error)]
pub enum LearnError {
    /// The teacher could not answer a membership query.
    #[error("teacher transport failed: {0}")]
    Transport(#[from] std::io::Error),
    /// The teacher contradicted an earlier answer, or an equivalence oracle
    /// returned a word that is not actually a counterexample.
    #[error("oracle misbehavior: {0}")]
    OracleMisbehavior(String),
    /// The hypothesis grew beyond the state bound the session was given.
    #[error("hypothesis has {states} states, exceeding the bound of {bound}")]
    StateBoundExceeded { states: usize, bound: usize },
    /// The cancel flag was observed set.
    #[error("learning session was cancelled")]
    Cancelled,
    /// An operation was invoked in a state that its contract forbids.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
