#![forbid(unsafe_code)]

//! Per-thread engine configuration.
//!
//! The engine is single-threaded, so configuration is installed into a
//! thread-local slot and read at the start of every drain. Threads that never
//! call [`EngineConfig::install`] run with [`EngineConfig::default`].

use std::cell::RefCell;
use std::env;

/// Environment variable overriding [`EngineConfig::max_updates_per_drain`].
pub const MAX_UPDATES_ENV: &str = "RUNSTREAM_MAX_UPDATES";

/// Environment variable overriding [`EngineConfig::trace_recompute`].
pub const TRACE_RECOMPUTE_ENV: &str = "RUNSTREAM_TRACE_RECOMPUTE";

thread_local! {
    static CURRENT: RefCell<EngineConfig> = RefCell::new(EngineConfig::default());
}

/// Tunables for the propagation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on recomputations and replayed pushes performed by a
    /// single drain.
    /// A drain that hits the bound is aborted with
    /// [`StreamError::PropagationLimit`](crate::StreamError::PropagationLimit).
    /// Default: 100_000.
    pub max_updates_per_drain: usize,

    /// Emit a `propagate.recompute` trace event for every recomputed node and
    /// a `propagate.replay` event for every replayed push.
    /// Default: false.
    pub trace_recompute: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_updates_per_drain: 100_000,
            trace_recompute: false,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by the `RUNSTREAM_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// Values that fail to parse are ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup(MAX_UPDATES_ENV)
            && let Ok(n) = val.trim().parse::<usize>()
            && n > 0
        {
            config.max_updates_per_drain = n;
        }
        if let Some(val) = lookup(TRACE_RECOMPUTE_ENV) {
            let val = val.trim();
            config.trace_recompute = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }

    /// Set the drain recomputation bound.
    #[must_use]
    pub fn with_max_updates(mut self, max_updates_per_drain: usize) -> Self {
        self.max_updates_per_drain = max_updates_per_drain.max(1);
        self
    }

    /// Enable or disable per-node recompute tracing.
    #[must_use]
    pub fn with_trace_recompute(mut self, enabled: bool) -> Self {
        self.trace_recompute = enabled;
        self
    }

    /// Make this the configuration for the current thread.
    ///
    /// Returns the configuration it replaced.
    pub fn install(self) -> EngineConfig {
        CURRENT.with(|current| current.replace(self))
    }

    /// The configuration in effect on the current thread.
    #[must_use]
    pub fn current() -> EngineConfig {
        CURRENT.with(|current| current.borrow().clone())
    }
}
