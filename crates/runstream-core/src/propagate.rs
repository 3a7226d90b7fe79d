#![forbid(unsafe_code)]

//! Ranked propagation queue.
//!
//! # Design
//!
//! Every stream has a rank: roots are rank 0, a derived stream is one more
//! than the highest rank among its dependencies. A push stores the new value
//! and enqueues the stream's dependents. The outermost push then drains the
//! queue in `(rank, enqueue order)` order.
//!
//! While a drain is running, a derived stream setting its own value is part
//! of the current push and is propagated in rank order. Any other push made
//! by a callback is deferred: its value is stored right away so reads see
//! it, and the push itself is replayed in FIFO order once the current push
//! has fully propagated. Two pushes into the same stream from one callback
//! therefore reach its dependents as two separate updates.
//!
//! # Invariants
//!
//! 1. A node is queued at most once at any moment (deduplicated by id).
//! 2. A node is recomputed only after every queued node of lower rank.
//! 3. Deferred pushes are replayed one at a time, in the order they were
//!    made, each only after the queue is empty.
//! 4. At most one drain runs per thread.
//! 5. The queue and the deferred pushes are empty whenever no drain is
//!    running, including after a callback panics or a drain is aborted.
//!
//! # Failure Modes
//!
//! - **Feedback loop**: a callback that pushes into one of its own upstream
//!   streams re-enqueues the loop forever. The drain stops after
//!   [`EngineConfig::max_updates_per_drain`] updates (recomputations plus
//!   replayed pushes), discards the rest and reports
//!   [`StreamError::PropagationLimit`].
//! - **Callback panic**: unwinds out of the push that started the drain. The
//!   drain guard clears the queue so the next push starts clean.

use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::rc::Rc;

use ahash::AHashSet;

use crate::config::EngineConfig;
use crate::error::{Result, StreamError};
use crate::stream::NodeId;

/// Type-erased view of a stream used by the scheduler and by the graph
/// wiring between streams of different value types.
pub(crate) trait Node {
    fn id(&self) -> NodeId;
    fn rank(&self) -> u32;
    fn is_ended(&self) -> bool;
    /// Re-run the derivation, if this node has one.
    fn recompute(self: Rc<Self>);
    /// Mark this node ended, detach it from its dependencies and move its
    /// dependents into `worklist` to be ended next.
    fn end_into(&self, worklist: &mut Vec<Rc<dyn Node>>);
    /// Give up ownership of the dependents, leaving the list empty.
    fn take_dependents(&self) -> Vec<Rc<dyn Node>>;
    fn attach_dependent(&self, dependent: Rc<dyn Node>);
    fn detach_dependent(&self, id: NodeId);
}

struct Queued {
    rank: u32,
    seq: u64,
    node: Rc<dyn Node>,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.rank, self.seq).cmp(&(other.rank, other.seq))
    }
}

/// A push made by a callback during a drain, replayed once the queue is
/// empty.
pub(crate) struct Deferred {
    pub(crate) id: NodeId,
    pub(crate) apply: Box<dyn FnOnce()>,
}

#[derive(Default)]
struct DrainQueue {
    heap: BinaryHeap<Reverse<Queued>>,
    queued: AHashSet<NodeId>,
    deferred: VecDeque<Deferred>,
    seq: u64,
    draining: bool,
    current: Option<NodeId>,
}

impl DrainQueue {
    fn reset(&mut self) {
        self.heap.clear();
        self.queued.clear();
        self.draining = false;
        self.deferred.clear();
        self.current = None;
    }
}

thread_local! {
    static QUEUE: RefCell<DrainQueue> = RefCell::new(DrainQueue::default());
}

/// Resets the queue when a drain finishes, aborts, or unwinds.
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let _ = QUEUE.try_with(|queue| queue.borrow_mut().reset());
    }
}

/// Queue `nodes` for recomputation. Ended nodes are skipped.
pub(crate) fn enqueue(nodes: impl IntoIterator<Item = Rc<dyn Node>>) {
    QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        for node in nodes {
            if node.is_ended() || !queue.queued.insert(node.id()) {
                continue;
            }
            queue.seq += 1;
            let seq = queue.seq;
            queue.heap.push(Reverse(Queued {
                rank: node.rank(),
                seq,
                node,
            }));
        }
    });
}

fn pop() -> Option<Rc<dyn Node>> {
    QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        let Reverse(entry) = queue.heap.pop()?;
        queue.queued.remove(&entry.node.id());
        Some(entry.node)
    })
}

fn pop_deferred() -> Option<Deferred> {
    QUEUE.with(|queue| queue.borrow_mut().deferred.pop_front())
}

/// Whether a push into `id` must be deferred: a drain is running and `id`
/// is not the node being recomputed.
pub(crate) fn defers(id: NodeId) -> bool {
    QUEUE.with(|queue| {
        let queue = queue.borrow();
        queue.draining && queue.current != Some(id)
    })
}

/// Replay `update` after the running drain has emptied its queue.
pub(crate) fn defer(update: Deferred) {
    QUEUE.with(|queue| queue.borrow_mut().deferred.push_back(update));
}

/// Restores the previously recomputing node.
struct CurrentGuard(Option<NodeId>);

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let previous = self.0;
        let _ = QUEUE.try_with(|queue| queue.borrow_mut().current = previous);
    }
}

/// Recompute `node`, treating pushes into it as part of the current update.
pub(crate) fn recompute(node: Rc<dyn Node>) {
    let previous = QUEUE.with(|queue| queue.borrow_mut().current.replace(node.id()));
    let _restore = CurrentGuard(previous);
    node.recompute();
}

/// Whether a drain is running on this thread.
#[must_use]
pub fn is_draining() -> bool {
    QUEUE.with(|queue| queue.borrow().draining)
}

enum Step {
    Recompute(Rc<dyn Node>),
    Replay(Deferred),
}

impl Step {
    fn next() -> Option<Self> {
        pop()
            .map(Step::Recompute)
            .or_else(|| pop_deferred().map(Step::Replay))
    }

    fn id(&self) -> NodeId {
        match self {
            Self::Recompute(node) => node.id(),
            Self::Replay(update) => update.id,
        }
    }
}

/// Recompute queued nodes and replay deferred pushes until both are empty.
///
/// Returns immediately when called from inside a running drain.
pub(crate) fn drain() -> Result<()> {
    let started = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        !std::mem::replace(&mut queue.draining, true)
    });
    if !started {
        return Ok(());
    }
    let _guard = DrainGuard;

    let config = EngineConfig::current();
    let span = tracing::trace_span!("propagate.drain", updates = tracing::field::Empty);
    let _enter = span.enter();

    let mut updates = 0usize;
    while let Some(step) = Step::next() {
        if updates >= config.max_updates_per_drain {
            tracing::error!(
                message = "propagate.limit",
                limit = config.max_updates_per_drain,
                next = %step.id(),
            );
            return Err(StreamError::PropagationLimit {
                limit: config.max_updates_per_drain,
            });
        }
        updates += 1;
        match step {
            Step::Recompute(node) => {
                if config.trace_recompute {
                    tracing::trace!(message = "propagate.recompute", id = %node.id(), rank = node.rank());
                }
                recompute(node);
            }
            Step::Replay(update) => {
                if config.trace_recompute {
                    tracing::trace!(message = "propagate.replay", id = %update.id);
                }
                (update.apply)();
            }
        }
    }

    span.record("updates", updates);
    Ok(())
}
