//! Property-based invariant tests for the run/error/catch combinators.
//!
//! Each property drives a `RunStream` with an arbitrary sequence of pushes
//! and checks it against a direct model of the firing rules:
//!
//! 1. `run` fires once per defined push, never for pending pushes.
//! 2. `run` on a stream with a value fires once on attachment.
//! 3. `error().run` fires exactly when the main stream is pending and the
//!    error stream is defined, after any push to either.
//! 4. `catch` resolves to main, else `f(error)`, else pending.
//! 5. A chain of `k` increments from `v` holds `v + k`.
//! 6. Pushes made from inside a callback fire `run` exactly like the same
//!    pushes made directly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use runstream::RunStream;

// ── Strategies ──────────────────────────────────────────────────────────

fn maybe_value() -> impl Strategy<Value = Option<i32>> {
    prop_oneof![
        3 => (-100i32..100).prop_map(Some),
        1 => Just(None),
    ]
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Main(Option<i32>),
    Error(Option<i32>),
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            maybe_value().prop_map(Op::Main),
            maybe_value().prop_map(Op::Error),
        ],
        0..48,
    )
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn apply(stream: &RunStream<i32, i32>, op: Op) {
    match op {
        Op::Main(Some(v)) => stream.set(v),
        Op::Main(None) => stream.set_pending(),
        Op::Error(Some(e)) => stream.error().set(e),
        Op::Error(None) => stream.error().set_pending(),
    }
}

fn recording(calls: &Rc<RefCell<Vec<i32>>>) -> impl Fn(&i32) -> i32 + 'static {
    let calls = Rc::clone(calls);
    move |v: &i32| {
        calls.borrow_mut().push(*v);
        v * 3
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1-2. run fires once per defined value
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn run_fires_per_defined_push(
        initial in proptest::option::of(-100i32..100),
        pushes in proptest::collection::vec(maybe_value(), 0..48),
    ) {
        let st: RunStream<i32> = RunStream::from_option(initial);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let run = st.run(recording(&calls));

        let mut expected: Vec<i32> = initial.into_iter().collect();
        prop_assert_eq!(&*calls.borrow(), &expected);

        for push in &pushes {
            match push {
                Some(v) => st.set(*v),
                None => st.set_pending(),
            }
            expected.extend(push.iter().copied());
            prop_assert_eq!(run.get(), push.map(|v| v * 3));
        }
        prop_assert_eq!(&*calls.borrow(), &expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. error().run follows the suppression rule
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn error_run_matches_model(seq in ops()) {
        let st: RunStream<i32, i32> = RunStream::pending();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let handled = st.error().run(recording(&calls));

        let (mut main, mut error) = (None::<i32>, None::<i32>);
        let mut expected = Vec::new();
        for op in seq {
            apply(&st, op);
            match op {
                Op::Main(v) => main = v,
                Op::Error(e) => error = e,
            }
            if main.is_none() && let Some(e) = error {
                expected.push(e);
            }
            let model = if main.is_some() { None } else { error.map(|e| e * 3) };
            prop_assert_eq!(handled.get(), model);
        }
        prop_assert_eq!(&*calls.borrow(), &expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. catch collapses both channels
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn catch_matches_model(seq in ops()) {
        let st: RunStream<i32, i32> = RunStream::pending();
        let fallback_calls = Rc::new(Cell::new(0usize));
        let fallback_clone = Rc::clone(&fallback_calls);
        let caught = st.catch(move |e| {
            fallback_clone.set(fallback_clone.get() + 1);
            -e
        });

        let (mut main, mut error) = (None::<i32>, None::<i32>);
        let mut expected_fallbacks = 0usize;
        for op in seq {
            apply(&st, op);
            match op {
                Op::Main(v) => main = v,
                Op::Error(e) => error = e,
            }
            if main.is_none() && error.is_some() {
                expected_fallbacks += 1;
            }
            prop_assert_eq!(caught.get(), main.or(error.map(|e| -e)));
        }
        prop_assert_eq!(fallback_calls.get(), expected_fallbacks);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Chains compose
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn chain_of_increments(start in -1000i64..1000, depth in 1usize..24, later in -1000i64..1000) {
        let st: RunStream<i64> = RunStream::new(start);
        let mut tail = st.run(|v| v + 1);
        for _ in 1..depth {
            tail = tail.run(|v| v + 1);
        }
        prop_assert_eq!(tail.get(), Some(start + depth as i64));

        st.set(later);
        prop_assert_eq!(tail.get(), Some(later + depth as i64));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Pushes from callbacks match direct pushes
// ═════════════════════════════════════════════════════════════════════════

fn push(stream: &RunStream<i32>, value: Option<i32>) {
    match value {
        Some(v) => stream.set(v),
        None => stream.set_pending(),
    }
}

proptest! {
    #[test]
    fn pushes_from_callbacks_match_direct_pushes(
        pushes in proptest::collection::vec(maybe_value(), 0..32),
    ) {
        let direct: RunStream<i32> = RunStream::pending();
        let direct_calls = Rc::new(RefCell::new(Vec::new()));
        let direct_run = direct.run(recording(&direct_calls));
        for value in &pushes {
            push(&direct, *value);
        }

        let nested: RunStream<i32> = RunStream::pending();
        let nested_calls = Rc::new(RefCell::new(Vec::new()));
        let nested_run = nested.run(recording(&nested_calls));
        let trigger: RunStream<()> = RunStream::pending();
        let (target, replay) = (nested.clone(), pushes.clone());
        let _replay = trigger.run(move |_| {
            for value in &replay {
                push(&target, *value);
            }
        });
        trigger.set(());

        prop_assert_eq!(&*nested_calls.borrow(), &*direct_calls.borrow());
        prop_assert_eq!(nested.get(), direct.get());
        prop_assert_eq!(nested.version(), direct.version());
        prop_assert_eq!(nested_run.get(), direct_run.get());
    }
}
