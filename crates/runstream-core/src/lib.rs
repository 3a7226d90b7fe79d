#![forbid(unsafe_code)]

//! Push-based reactive streams for runstream.
//!
//! This crate provides the reactive engine the `runstream` decorators are
//! built on:
//!
//! - [`Stream`]: a shared cell that is either pending or holds a value, with
//!   an ended flag, a version counter, and change notification.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Stream::combine`] / [`Stream::combine2`] / [`Stream::combine_all`]:
//!   derived streams recomputed whenever a dependency is pushed.
//! - [`EngineConfig`]: per-thread propagation limits and tracing switches.
//!
//! # Architecture
//!
//! Streams use `Rc<RefCell<..>>` for single-threaded shared ownership. A push
//! is fully propagated before it returns: dependents are recomputed in rank
//! order, so a derived stream always sees every dependency in its updated
//! state and recomputes once per push.
//!
//! # Example
//!
//! ```
//! use runstream_core::Stream;
//!
//! let x = Stream::new(3.0f64);
//! let y = Stream::new(4.0f64);
//! let distance = Stream::combine2(&x, &y, |x, y, this| {
//!     this.set_option(x.get().zip(y.get()).map(|(x, y)| (x * x + y * y).sqrt()));
//! });
//! assert_eq!(distance.get(), Some(5.0));
//!
//! y.set(0.0);
//! assert_eq!(distance.get(), Some(3.0));
//! ```

pub mod combine;
pub mod config;
pub mod error;
pub mod propagate;
pub mod stream;

pub use config::EngineConfig;
pub use error::{Result, StreamError};
pub use propagate::is_draining;
pub use stream::{NodeId, Stream, Subscription};
