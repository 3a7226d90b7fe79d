#![forbid(unsafe_code)]

//! The stream decorator: [`RunStream`] and its [`ErrorChannel`].
//!
//! # Design
//!
//! [`decorate`] wraps a [`Stream`] together with a freshly created, pending
//! error stream. `run`, `catch` and `error().run` are thin closures over the
//! combinators in [`crate::combinators`], each returning a new decorated
//! stream with its own error channel.
//!
//! # Invariants
//!
//! 1. Every `RunStream` owns exactly one error stream, created by `decorate`
//!    and never shared with another main stream. Clones of a `RunStream`
//!    share both.
//! 2. Nothing pushes into an error stream on its own: errors are pushed by
//!    whoever owns the main stream (or by [`RunStream::try_run`]).
//! 3. Derived streams outlive the `RunStream` handle that created them for
//!    as long as their source stream is alive.

use std::fmt;

use runstream_core::{NodeId, Result, Stream, Subscription};

use crate::combinators::{catcher, err_runner, fallible_runner, relay, runner};
use crate::reject::{Rejected, reject_with, rejecter};

/// A stream with conditional `run`, an error channel and `catch`.
///
/// `E` is the type of values carried by the error channel.
///
/// ```
/// use runstream::RunStream;
///
/// let count: RunStream<i32> = RunStream::new(0);
/// let plus_four = count.run(|n| n + 1).run(|n| n + 1).run(|n| n + 1).run(|n| n + 1);
/// assert_eq!(plus_four.get(), Some(4));
///
/// count.set(10);
/// assert_eq!(plus_four.get(), Some(14));
/// ```
pub struct RunStream<T, E = Rejected> {
    stream: Stream<T>,
    error: ErrorChannel<T, E>,
}

/// The error side of a [`RunStream`].
///
/// Holds the error values pushed by the main stream's owner. Its
/// [`run`](Self::run) only fires while the main stream is pending.
///
/// The error stream is a plain [`Stream<E>`] with a conditional `run` on
/// top: it has no error channel or `catch` of its own. Reach the bare stream
/// through [`stream`](Self::stream) to combine it further.
///
/// Holds a strong handle to the main stream so `run` can derive from both.
/// Nothing points back at the channel, so this forms no cycle.
pub struct ErrorChannel<T, E> {
    main: Stream<T>,
    stream: Stream<E>,
}

/// Wrap `stream` with a fresh, pending error channel.
pub fn decorate<T, E>(stream: Stream<T>) -> RunStream<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    decorate_with_error(stream, Stream::pending())
}

pub(crate) fn decorate_with_error<T, E>(stream: Stream<T>, error: Stream<E>) -> RunStream<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    RunStream {
        error: ErrorChannel {
            main: stream.clone(),
            stream: error,
        },
        stream,
    }
}

impl<T, E> Clone for RunStream<T, E> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T, E> Clone for ErrorChannel<T, E> {
    fn clone(&self) -> Self {
        Self {
            main: self.main.clone(),
            stream: self.stream.clone(),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for RunStream<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunStream")
            .field("stream", &self.stream)
            .field("error", &self.error.stream)
            .finish()
    }
}

impl<T, E: fmt::Debug> fmt::Debug for ErrorChannel<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorChannel")
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

impl<T, E> AsRef<Stream<T>> for RunStream<T, E> {
    fn as_ref(&self) -> &Stream<T> {
        &self.stream
    }
}

impl<T, E> From<Stream<T>> for RunStream<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn from(stream: Stream<T>) -> Self {
        decorate(stream)
    }
}

impl<T, E> RunStream<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Create a decorated stream holding `value`.
    pub fn new(value: T) -> Self {
        decorate(Stream::new(value))
    }

    /// Create a pending decorated stream.
    pub fn pending() -> Self {
        decorate(Stream::pending())
    }

    /// Create a decorated stream that is pending when `value` is `None`.
    pub fn from_option(value: Option<T>) -> Self {
        decorate(Stream::from_option(value))
    }

    /// Decorate an existing stream.
    pub fn from_stream(stream: Stream<T>) -> Self {
        decorate(stream)
    }

    /// A stream that is already failed: its error channel holds
    /// [`Rejected`] and it is ended.
    pub fn reject() -> Self
    where
        E: From<Rejected>,
    {
        rejecter()
    }

    /// A stream that is already failed with `error`.
    pub fn reject_with(error: E) -> Self {
        reject_with(error)
    }

    /// Derive a stream holding `callback(value)` for every defined value.
    ///
    /// The callback is not invoked while this stream is pending, and runs
    /// immediately if it already holds a value.
    pub fn run<U>(&self, callback: impl Fn(&T) -> U + 'static) -> RunStream<U, E>
    where
        U: Clone + 'static,
    {
        runner(callback, &self.stream)
    }

    /// Derive a stream that falls back to `callback(error)` while this stream
    /// is pending and its error channel holds a value.
    pub fn catch(&self, callback: impl Fn(&E) -> T + 'static) -> RunStream<T, E> {
        catcher(callback, &self.stream, &self.error.stream)
    }

    /// Like [`run`](Self::run) with a fallible callback: `Err` values are
    /// pushed into the derived stream's error channel.
    pub fn try_run<U>(&self, callback: impl Fn(&T) -> std::result::Result<U, E> + 'static) -> RunStream<U, E>
    where
        U: Clone + 'static,
    {
        fallible_runner(callback, &self.stream)
    }

    /// Use another stream as the callback: every defined value is pushed into
    /// `target` and carried on by the returned stream.
    pub fn run_into(&self, target: &impl AsRef<Stream<T>>) -> RunStream<T, E> {
        relay(target.as_ref(), &self.stream)
    }

    /// This stream's error channel.
    #[must_use]
    pub fn error(&self) -> &ErrorChannel<T, E> {
        &self.error
    }

    /// The underlying stream.
    #[must_use]
    pub fn stream(&self) -> &Stream<T> {
        &self.stream
    }

    #[must_use]
    pub fn into_stream(self) -> Stream<T> {
        self.stream
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.stream.id()
    }

    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.stream.get()
    }

    /// Access the current value by reference. See [`Stream::with`].
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        self.stream.with(f)
    }

    pub fn set(&self, value: T) {
        self.stream.set(value);
    }

    pub fn set_pending(&self) {
        self.stream.set_pending();
    }

    pub fn try_set(&self, value: T) -> Result<()> {
        self.stream.try_set(value)
    }

    /// Mark the main stream ended. The error channel is left open.
    pub fn end(&self) {
        self.stream.end();
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.stream.is_ended()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.stream.is_pending()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.stream.version()
    }

    pub fn subscribe(&self, callback: impl Fn(Option<&T>) + 'static) -> Subscription {
        self.stream.subscribe(callback)
    }
}

impl<T, E> ErrorChannel<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Derive a stream holding `callback(error)` while the main stream is
    /// pending and an error value is present.
    ///
    /// A defined main value suppresses the callback, even for errors pushed
    /// after the main value arrived.
    pub fn run<U>(&self, callback: impl Fn(&E) -> U + 'static) -> RunStream<U, E>
    where
        U: Clone + 'static,
    {
        err_runner(callback, &self.main, &self.stream)
    }

    /// Push an error value.
    pub fn set(&self, error: E) {
        self.stream.set(error);
    }

    /// Clear the error channel.
    pub fn set_pending(&self) {
        self.stream.set_pending();
    }

    #[must_use]
    pub fn get(&self) -> Option<E> {
        self.stream.get()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.stream.is_pending()
    }

    /// The underlying error stream.
    #[must_use]
    pub fn stream(&self) -> &Stream<E> {
        &self.stream
    }

    pub fn subscribe(&self, callback: impl Fn(Option<&E>) + 'static) -> Subscription {
        self.stream.subscribe(callback)
    }
}
