#![forbid(unsafe_code)]

//! Push-based reactive streams with change notification.
//!
//! # Design
//!
//! [`Stream<T>`] is a shared handle to a cell holding `Option<T>`, where
//! `None` is the pending state. Pushing a value bumps the version, calls the
//! stream's subscribers, and recomputes every derived stream downstream of
//! it before the push returns (see [`crate::propagate`]). A push made from a
//! callback while another push is propagating is stored at once and
//! propagated right after the running one finishes.
//!
//! Ownership runs downstream: a stream holds its dependents strongly and a
//! derived stream holds its dependencies weakly. Attaching a derived stream
//! and dropping the handle keeps it running for as long as its sources live.
//! Subscribers are the exception: they are held weakly and live exactly as
//! long as their [`Subscription`] guard.
//!
//! # Invariants
//!
//! 1. The version increments exactly once per push, pending pushes included.
//! 2. Subscribers are notified in registration order, before dependents are
//!    recomputed.
//! 3. Ending a stream ends every transitive dependent and detaches it from
//!    all of its dependencies.
//! 4. An ended derived stream never recomputes.
//! 5. Ending or dropping a chain of derived streams uses the same stack depth
//!    whatever the chain's length.
//!
//! # Failure Modes
//!
//! - **Re-entrant access**: pushing into a stream from inside its own
//!   [`with`](Stream::with) closure panics (the value is borrowed).
//! - **Dependency dropped**: a derived stream whose dependency was freed keeps
//!   its last value and skips recomputation triggered by its other
//!   dependencies.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, StreamError};
use crate::propagate::{self, Deferred, Node};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Derivation<T> = Rc<dyn Fn(&Stream<T>)>;
type Callback<T> = dyn Fn(Option<&T>);

pub(crate) struct StreamInner<T> {
    id: NodeId,
    value: RefCell<Option<T>>,
    version: Cell<u64>,
    ended: Cell<bool>,
    rank: Cell<u32>,
    derivation: RefCell<Option<Derivation<T>>>,
    upstream: RefCell<Vec<Weak<dyn Node>>>,
    dependents: RefCell<Vec<Rc<dyn Node>>>,
    subscribers: RefCell<Vec<Weak<Callback<T>>>>,
}

/// A shared, version-tracked cell that is either pending or holds a value.
///
/// Cloning a `Stream` creates a new handle to the **same** cell.
pub struct Stream<T> {
    pub(crate) inner: Rc<StreamInner<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> AsRef<Stream<T>> for Stream<T> {
    fn as_ref(&self) -> &Stream<T> {
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.inner.id)
            .field("value", &self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .field("ended", &self.inner.ended.get())
            .field("rank", &self.inner.rank.get())
            .finish()
    }
}

/// RAII guard for a subscriber callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    _callback: Box<dyn Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Create a stream holding `value`.
    pub fn new(value: T) -> Self {
        Self::from_option(Some(value))
    }

    /// Create a pending stream.
    pub fn pending() -> Self {
        Self::from_option(None)
    }

    /// Create a stream that is pending when `value` is `None`.
    pub fn from_option(value: Option<T>) -> Self {
        Self {
            inner: Rc::new(StreamInner {
                id: NodeId::next(),
                value: RefCell::new(value),
                version: Cell::new(0),
                ended: Cell::new(false),
                rank: Cell::new(0),
                derivation: RefCell::new(None),
                upstream: RefCell::new(Vec::new()),
                dependents: RefCell::new(Vec::new()),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Number of pushes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Depth in the dependency graph; 0 for streams nothing is derived into.
    #[must_use]
    pub fn rank(&self) -> u32 {
        self.inner.rank.get()
    }

    /// Whether the stream holds no value.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.value.borrow().is_none()
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.inner.ended.get()
    }

    /// Number of streams currently derived from this one.
    #[must_use]
    pub fn dependent_count(&self) -> usize {
        self.inner.dependents.borrow().len()
    }

    /// Whether both handles point at the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A clone of the current value, `None` while pending.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure pushes into this same stream.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.value.borrow().as_ref())
    }

    /// Push a new value.
    ///
    /// Called from a callback during propagation, the value is readable
    /// immediately but subscribers and dependents see it only after the
    /// running push has finished.
    ///
    /// Pushing into an ended stream is not rejected; use
    /// [`try_set`](Self::try_set) to detect it.
    pub fn set(&self, value: T) {
        // An aborted drain has already been logged by the scheduler.
        let _ = self.push(Some(value));
    }

    /// Put the stream back into the pending state and notify dependents.
    pub fn set_pending(&self) {
        let _ = self.push(None);
    }

    /// Push `value` as-is: `None` makes the stream pending.
    pub fn set_option(&self, value: Option<T>) {
        let _ = self.push(value);
    }

    /// Push a new value, reporting pushes into ended streams and aborted
    /// propagation.
    pub fn try_set(&self, value: T) -> Result<()> {
        if self.is_ended() {
            return Err(StreamError::Ended { id: self.id() });
        }
        self.push(Some(value))
    }

    fn push(&self, value: Option<T>) -> Result<()> {
        if propagate::defers(self.inner.id) {
            // Visible to reads now, propagated after the running push.
            *self.inner.value.borrow_mut() = value.clone();
            let stream = self.clone();
            propagate::defer(Deferred {
                id: self.inner.id,
                apply: Box::new(move || stream.apply(value)),
            });
            return Ok(());
        }
        self.apply(value);
        propagate::drain()
    }

    /// Store `value`, notify subscribers and queue dependents.
    fn apply(&self, value: Option<T>) {
        let pending = value.is_none();
        *self.inner.value.borrow_mut() = value;
        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);

        if self.inner.ended.get() {
            tracing::debug!(message = "stream.set_after_end", id = %self.inner.id, version);
        } else {
            tracing::trace!(message = "stream.set", id = %self.inner.id, version, pending);
        }

        self.notify();

        let dependents: Vec<Rc<dyn Node>> = self.inner.dependents.borrow().clone();
        propagate::enqueue(dependents);
    }

    fn notify(&self) {
        let callbacks: Vec<Rc<Callback<T>>> = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        if callbacks.is_empty() {
            return;
        }
        let snapshot = self.get();
        for callback in callbacks {
            callback(snapshot.as_ref());
        }
    }

    /// Register a callback invoked after every push with the new value.
    ///
    /// The callback is not invoked for the value present at subscription
    /// time.
    pub fn subscribe(&self, callback: impl Fn(Option<&T>) + 'static) -> Subscription {
        let callback: Rc<Callback<T>> = Rc::new(callback);
        self.inner
            .subscribers
            .borrow_mut()
            .push(Rc::downgrade(&callback));
        Subscription {
            _callback: Box::new(callback),
        }
    }

    /// Mark the stream ended.
    ///
    /// Every derived stream downstream of this one is ended too and detached
    /// from its dependencies. Ending twice is a no-op.
    pub fn end(&self) {
        let mut worklist = Vec::new();
        self.inner.end_into(&mut worklist);
        while let Some(node) = worklist.pop() {
            node.end_into(&mut worklist);
        }
    }

    pub(crate) fn as_node(&self) -> Rc<dyn Node> {
        Rc::clone(&self.inner) as Rc<dyn Node>
    }

    /// Build a derived stream over `upstream` and compute its first value.
    pub(crate) fn derived(upstream: Vec<Rc<dyn Node>>, derive: impl Fn(&Stream<T>) + 'static) -> Self {
        let stream = Self::pending();
        let rank = upstream
            .iter()
            .map(|dependency| dependency.rank() + 1)
            .max()
            .unwrap_or(0);
        stream.inner.rank.set(rank);
        *stream.inner.derivation.borrow_mut() = Some(Rc::new(derive));
        *stream.inner.upstream.borrow_mut() = upstream.iter().map(Rc::downgrade).collect();

        let node = stream.as_node();
        for dependency in &upstream {
            dependency.attach_dependent(Rc::clone(&node));
        }
        tracing::trace!(
            message = "stream.derive",
            id = %stream.inner.id,
            rank,
            dependencies = upstream.len(),
        );

        propagate::recompute(node);
        stream
    }
}

impl<T: Clone + 'static> Node for StreamInner<T> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn rank(&self) -> u32 {
        self.rank.get()
    }

    fn is_ended(&self) -> bool {
        self.ended.get()
    }

    fn recompute(self: Rc<Self>) {
        if self.ended.get() {
            return;
        }
        let derivation = self.derivation.borrow().clone();
        if let Some(derive) = derivation {
            derive(&Stream { inner: self });
        }
    }

    fn end_into(&self, worklist: &mut Vec<Rc<dyn Node>>) {
        if self.ended.replace(true) {
            return;
        }
        let dependents = std::mem::take(&mut *self.dependents.borrow_mut());
        tracing::debug!(
            message = "stream.end",
            id = %self.id,
            dependents = dependents.len(),
        );

        let upstream = std::mem::take(&mut *self.upstream.borrow_mut());
        for dependency in upstream.iter().filter_map(Weak::upgrade) {
            dependency.detach_dependent(self.id);
        }
        self.derivation.borrow_mut().take();

        worklist.extend(dependents);
    }

    fn take_dependents(&self) -> Vec<Rc<dyn Node>> {
        std::mem::take(&mut *self.dependents.borrow_mut())
    }

    fn attach_dependent(&self, dependent: Rc<dyn Node>) {
        // Ended streams keep no dependents.
        if !self.ended.get() {
            self.dependents.borrow_mut().push(dependent);
        }
    }

    fn detach_dependent(&self, id: NodeId) {
        self.dependents
            .borrow_mut()
            .retain(|dependent| dependent.id() != id);
    }
}

impl<T> Drop for StreamInner<T> {
    fn drop(&mut self) {
        // Unlink dependents one level at a time so long chains do not recurse.
        let mut orphans = std::mem::take(self.dependents.get_mut());
        while let Some(node) = orphans.pop() {
            if Rc::strong_count(&node) == 1 {
                orphans.extend(node.take_dependents());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_holds_value() {
        let stream = Stream::new(7);
        assert_eq!(stream.get(), Some(7));
        assert!(!stream.is_pending());
        assert_eq!(stream.version(), 0);
        assert_eq!(stream.rank(), 0);
    }

    #[test]
    fn pending_until_set() {
        let stream = Stream::<i32>::pending();
        assert!(stream.is_pending());
        stream.set(1);
        assert_eq!(stream.get(), Some(1));
        stream.set_pending();
        assert!(stream.is_pending());
        assert_eq!(stream.version(), 2);
    }

    #[test]
    fn every_push_bumps_version() {
        let stream = Stream::new(1);
        stream.set(1);
        stream.set(1);
        assert_eq!(stream.version(), 2);
    }

    #[test]
    fn subscribers_see_each_push_in_order() {
        let stream = Stream::<i32>::pending();
        let log = Rc::new(RefCell::new(Vec::new()));

        let first_log = Rc::clone(&log);
        let _first = stream.subscribe(move |v| first_log.borrow_mut().push(("first", v.copied())));
        let second_log = Rc::clone(&log);
        let _second = stream.subscribe(move |v| second_log.borrow_mut().push(("second", v.copied())));

        stream.set(3);
        stream.set_pending();

        assert_eq!(
            *log.borrow(),
            vec![
                ("first", Some(3)),
                ("second", Some(3)),
                ("first", None),
                ("second", None),
            ]
        );
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let stream = Stream::new(0);
        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        let sub = stream.subscribe(move |_| calls_clone.set(calls_clone.get() + 1));

        stream.set(1);
        drop(sub);
        stream.set(2);

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn subscriber_may_push_into_its_stream() {
        let stream = Stream::new(0);
        let target = stream.clone();
        let _sub = stream.subscribe(move |v| {
            if let Some(&v) = v
                && v < 3
            {
                target.set(v + 1);
            }
        });

        stream.set(1);
        assert_eq!(stream.get(), Some(3));
    }

    #[test]
    fn try_set_rejects_ended_stream() {
        let stream = Stream::new(1);
        stream.end();
        assert_eq!(
            stream.try_set(2),
            Err(StreamError::Ended { id: stream.id() })
        );
        assert_eq!(stream.get(), Some(1));
    }

    #[test]
    fn set_after_end_still_stores() {
        let stream = Stream::new(1);
        stream.end();
        stream.set(2);
        assert_eq!(stream.get(), Some(2));
        assert!(stream.is_ended());
    }

    #[test]
    fn end_is_idempotent() {
        let stream = Stream::<u8>::pending();
        stream.end();
        stream.end();
        assert!(stream.is_ended());
    }

    #[test]
    fn clone_shares_state() {
        let a = Stream::new("a".to_string());
        let b = a.clone();
        b.set("b".to_string());
        assert_eq!(a.get().as_deref(), Some("b"));
        assert!(a.ptr_eq(&b));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn ids_are_unique() {
        let a = Stream::new(1);
        let b = Stream::new(1);
        assert_ne!(a.id(), b.id());
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn with_borrows_without_clone() {
        let stream = Stream::new(vec![1, 2, 3]);
        let sum: i32 = stream.with(|v| v.map_or(0, |v| v.iter().sum()));
        assert_eq!(sum, 6);
    }

    #[test]
    fn debug_format() {
        let stream = Stream::new(42);
        let dbg = format!("{stream:?}");
        assert!(dbg.contains("Stream"));
        assert!(dbg.contains("42"));
    }

    #[test]
    fn node_id_display() {
        let stream = Stream::new(());
        assert_eq!(stream.id().to_string(), format!("#{}", stream.id().raw()));
    }
}
