#![forbid(unsafe_code)]

//! Errors reported by the fallible engine operations.

use thiserror::Error;

use crate::stream::NodeId;

pub type Result<T> = std::result::Result<T, StreamError>;

/// Engine misuse reported by the fallible stream operations.
///
/// Pipeline failures do not live here: those travel as values on a stream's
/// error channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("stream {id} has ended")]
    Ended { id: NodeId },

    #[error("propagation aborted after {limit} recomputations")]
    PropagationLimit { limit: usize },
}

impl StreamError {
    /// The stream the error refers to, if any.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Ended { id } => Some(*id),
            Self::PropagationLimit { .. } => None,
        }
    }
}
