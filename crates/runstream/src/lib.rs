#![forbid(unsafe_code)]

//! Conditional runs, error channels and catch fallbacks for reactive streams.
//!
//! A [`RunStream`] wraps a [`Stream`] and adds:
//!
//! - [`run`](RunStream::run): a callback that only fires once the stream
//!   holds a value, and fires immediately if it already does;
//! - [`error`](RunStream::error): a parallel error channel whose own
//!   [`run`](ErrorChannel::run) fires only while the main stream is pending;
//! - [`catch`](RunStream::catch): a fallback that collapses the main value and
//!   the error channel back into one stream.
//!
//! Every combinator returns a new `RunStream`, so calls chain. Propagation is
//! synchronous: by the time a push returns, every derived stream has been
//! recomputed.
//!
//! # Example
//!
//! ```
//! use runstream::RunStream;
//!
//! let response: RunStream<u16, String> = RunStream::pending();
//! let body = response.run(|status| format!("status {status}"));
//! let shown = response.catch(|_| 503);
//!
//! assert!(body.is_pending());
//! assert!(shown.is_pending());
//!
//! response.error().set("timed out".to_string());
//! assert_eq!(shown.get(), Some(503));
//! assert!(body.is_pending());
//!
//! response.set(200);
//! assert_eq!(body.get().as_deref(), Some("status 200"));
//! assert_eq!(shown.get(), Some(200));
//! ```

pub mod combinators;
pub mod decorate;
pub mod defined;
pub mod reject;

pub use decorate::{ErrorChannel, RunStream, decorate};
pub use defined::is_defined;
pub use reject::Rejected;
pub use runstream_core::{EngineConfig, NodeId, Result, Stream, StreamError, Subscription};
