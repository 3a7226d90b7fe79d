//! Already-failed streams.

use thiserror::Error;

use crate::decorate::RunStream;

/// The error value carried by [`RunStream::reject`].
///
/// Converts into `true` for `bool` error channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Error)]
#[error("stream rejected")]
pub struct Rejected;

impl From<Rejected> for bool {
    fn from(_: Rejected) -> Self {
        true
    }
}

impl From<Rejected> for String {
    fn from(rejected: Rejected) -> Self {
        rejected.to_string()
    }
}

impl From<Rejected> for &'static str {
    fn from(_: Rejected) -> Self {
        "stream rejected"
    }
}

/// A pending stream whose error channel holds [`Rejected`] and which is
/// ended.
pub fn rejecter<T, E>() -> RunStream<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Rejected> + 'static,
{
    reject_with(Rejected.into())
}

/// A pending stream whose error channel holds `error` and which is ended.
pub fn reject_with<T, E>(error: E) -> RunStream<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let stream = RunStream::pending();
    stream.error().set(error);
    stream.end();
    tracing::debug!(message = "run_stream.reject", id = %stream.id());
    stream
}
