#![forbid(unsafe_code)]

//! The conditional combinators behind `run`, `error().run` and `catch`.
//!
//! Each combinator derives a new stream and hands it to [`decorate`], so the
//! result can be chained further.
//!
//! # Firing rules
//!
//! | combinator | main | error | result |
//! |------------|------|-------|--------|
//! | [`runner`] | defined | - | `callback(main)` |
//! | [`runner`] | pending | - | pending |
//! | [`err_runner`] | defined | any | pending, callback not invoked |
//! | [`err_runner`] | pending | defined | `callback(error)` |
//! | [`err_runner`] | pending | pending | pending |
//! | [`catcher`] | defined | any | `main` |
//! | [`catcher`] | pending | defined | `callback(error)` |
//! | [`catcher`] | pending | pending | pending |
//!
//! A defined main value always suppresses the error handler of
//! [`err_runner`], including errors pushed after the main value.
//!
//! Callbacks run synchronously inside the push that triggered them. A
//! panicking callback unwinds to whoever pushed.

use runstream_core::Stream;

use crate::decorate::{RunStream, decorate, decorate_with_error};
use crate::defined::is_defined;

/// `callback(value)` when `stream` is defined, pending otherwise.
fn run<T, U>(callback: &impl Fn(&T) -> U, stream: &Stream<T>) -> Option<U>
where
    T: Clone + 'static,
{
    if !stream.with(is_defined) {
        return None;
    }
    // Cloned out so the callback may push into `stream`.
    stream.get().map(|value| callback(&value))
}

/// Derive a stream that holds `callback(source)` whenever `source` is
/// defined and is pending otherwise.
///
/// The callback runs immediately if `source` already holds a value.
pub fn runner<T, U, E>(callback: impl Fn(&T) -> U + 'static, source: &Stream<T>) -> RunStream<U, E>
where
    T: Clone + 'static,
    U: Clone + 'static,
    E: Clone + 'static,
{
    let running = Stream::combine(source, move |source, this| {
        this.set_option(run(&callback, source));
    });
    decorate(running)
}

/// Derive a stream that runs `callback` on the error value while `main` is
/// pending.
pub fn err_runner<T, E, U>(
    callback: impl Fn(&E) -> U + 'static,
    main: &Stream<T>,
    error: &Stream<E>,
) -> RunStream<U, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
    U: Clone + 'static,
{
    let running = Stream::combine2(main, error, move |main, error, this| {
        if main.with(is_defined) {
            this.set_pending();
            return;
        }
        this.set_option(run(&callback, error));
    });
    decorate(running)
}

/// Derive a stream holding `main` when defined, else `callback(error)` when
/// the error is defined, else pending.
pub fn catcher<T, E>(
    callback: impl Fn(&E) -> T + 'static,
    main: &Stream<T>,
    error: &Stream<E>,
) -> RunStream<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let caught = Stream::combine2(main, error, move |main, error, this| {
        if main.with(is_defined) {
            this.set_option(main.get());
        } else if error.with(is_defined) {
            this.set_option(run(&callback, error));
        } else {
            this.set_pending();
        }
    });
    decorate(caught)
}

/// Like [`runner`], but `Err` results are pushed into the derived stream's
/// error channel and leave its value pending.
pub fn fallible_runner<T, U, E>(
    callback: impl Fn(&T) -> Result<U, E> + 'static,
    source: &Stream<T>,
) -> RunStream<U, E>
where
    T: Clone + 'static,
    U: Clone + 'static,
    E: Clone + 'static,
{
    let error = Stream::pending();
    let error_sink = error.clone();
    let running = Stream::combine(source, move |source, this| match run(&callback, source) {
        Some(Ok(value)) => this.set(value),
        Some(Err(err)) => {
            tracing::debug!(message = "run_stream.try_run.err", id = %this.id());
            this.set_pending();
            error_sink.set(err);
        }
        None => this.set_pending(),
    });
    decorate_with_error(running, error)
}

/// Use `target` as the callback: every defined value of `source` is pushed
/// into `target` and carried on by the derived stream.
pub fn relay<T, E>(target: &Stream<T>, source: &Stream<T>) -> RunStream<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let target = target.clone();
    runner(
        move |value: &T| {
            target.set(value.clone());
            value.clone()
        },
        source,
    )
}
