#![forbid(unsafe_code)]

//! Derived streams that recompute when a dependency is pushed.
//!
//! # Design
//!
//! A derivation body receives a handle to each dependency and a handle to the
//! derived stream itself, and decides what (if anything) to push into it.
//! The body runs once at creation, then once per propagation drain in which
//! any dependency was pushed.
//!
//! # Invariants
//!
//! 1. The derived stream's rank is one more than its highest-ranked
//!    dependency, so a drain never recomputes it before its dependencies.
//! 2. The body runs at most once per drain.
//! 3. The first run happens before the constructor returns, whatever state
//!    the dependencies are in (pending, ended, or holding a value).

use std::rc::Rc;

use crate::stream::Stream;

impl<T: Clone + 'static> Stream<T> {
    /// Derive a stream from a single dependency.
    ///
    /// ```
    /// use runstream_core::Stream;
    ///
    /// let count = Stream::new(2);
    /// let doubled = Stream::combine(&count, |count, this| {
    ///     this.set_option(count.get().map(|n| n * 2));
    /// });
    /// assert_eq!(doubled.get(), Some(4));
    ///
    /// count.set(5);
    /// assert_eq!(doubled.get(), Some(10));
    /// ```
    pub fn combine<A>(a: &Stream<A>, body: impl Fn(&Stream<A>, &Stream<T>) + 'static) -> Self
    where
        A: Clone + 'static,
    {
        let source = Rc::downgrade(&a.inner);
        Self::derived(vec![a.as_node()], move |this| {
            if let Some(inner) = source.upgrade() {
                body(&Stream { inner }, this);
            }
        })
    }

    /// Derive a stream from two dependencies.
    pub fn combine2<A, B>(
        a: &Stream<A>,
        b: &Stream<B>,
        body: impl Fn(&Stream<A>, &Stream<B>, &Stream<T>) + 'static,
    ) -> Self
    where
        A: Clone + 'static,
        B: Clone + 'static,
    {
        let first = Rc::downgrade(&a.inner);
        let second = Rc::downgrade(&b.inner);
        Self::derived(vec![a.as_node(), b.as_node()], move |this| {
            if let (Some(first), Some(second)) = (first.upgrade(), second.upgrade()) {
                body(&Stream { inner: first }, &Stream { inner: second }, this);
            }
        })
    }

    /// Derive a stream from any number of dependencies of one type.
    pub fn combine_all<A>(
        deps: &[Stream<A>],
        body: impl Fn(&[Stream<A>], &Stream<T>) + 'static,
    ) -> Self
    where
        A: Clone + 'static,
    {
        let sources: Vec<_> = deps.iter().map(|dep| Rc::downgrade(&dep.inner)).collect();
        Self::derived(deps.iter().map(Stream::as_node).collect(), move |this| {
            let live: Option<Vec<Stream<A>>> = sources
                .iter()
                .map(|weak| weak.upgrade().map(|inner| Stream { inner }))
                .collect();
            if let Some(live) = live {
                body(&live, this);
            }
        })
    }

    /// Derive a stream by mapping every push of `source`, pending included.
    pub fn map<A>(source: &Stream<A>, f: impl Fn(Option<&A>) -> Option<T> + 'static) -> Self
    where
        A: Clone + 'static,
    {
        Self::combine(source, move |source, this| {
            let next = source.with(|value| f(value));
            this.set_option(next);
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
