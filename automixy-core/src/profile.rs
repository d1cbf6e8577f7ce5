//! Call profiling for compute functions.
//!
//! [`profile`] wraps a compute function and counts how often it runs and how
//! long it spends running. The wrapper has the same calling contract as the
//! function it wraps, so it can be handed to a derived node directly:
//!
//! ```rust,ignore
//! let plus_one = profile(|x: i32| x + 1);
//! let stats = plus_one.stats();
//!
//! let r = Reactive::lazy(plus_one, (b.clone(),));
//! assert_eq!(stats.call_count(), 0);
//! r.read()?;
//! assert_eq!(stats.call_count(), 1);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::reactive::Apply;

/// Wrap `func` with call counting and timing.
///
/// The report name defaults to the function's type name.
pub fn profile<F>(func: F) -> Profiled<F> {
    profile_named(std::any::type_name::<F>(), func)
}

/// Like [`profile`], but with an explicit name for the report.
pub fn profile_named<F>(name: impl Into<Arc<str>>, func: F) -> Profiled<F> {
    Profiled {
        func,
        stats: CallStats {
            inner: Arc::new(Counters {
                name: name.into(),
                calls: AtomicU64::new(0),
                nanos: AtomicU64::new(0),
            }),
        },
    }
}

/// A compute function with profiling counters attached.
pub struct Profiled<F> {
    func: F,
    stats: CallStats,
}

impl<F> Profiled<F> {
    /// Handle to the counters. It stays valid after the wrapper has been
    /// moved into a node.
    pub fn stats(&self) -> CallStats {
        self.stats.clone()
    }
}

impl<F, Args, R> Apply<Args, R> for Profiled<F>
where
    F: Apply<Args, R>,
{
    fn apply(&self, args: Args) -> R {
        self.stats.inner.calls.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let result = self.func.apply(args);
        self.stats.record(start.elapsed());
        result
    }
}

struct Counters {
    name: Arc<str>,
    calls: AtomicU64,
    nanos: AtomicU64,
}

/// Shared view of a [`Profiled`] function's counters.
#[derive(Clone)]
pub struct CallStats {
    inner: Arc<Counters>,
}

impl CallStats {
    fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.inner.nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of times the wrapped function has been invoked.
    pub fn call_count(&self) -> u64 {
        self.inner.calls.load(Ordering::Relaxed)
    }

    /// Cumulative wall-clock time spent inside the wrapped function.
    pub fn total_time(&self) -> Duration {
        Duration::from_nanos(self.inner.nanos.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> ProfileStats {
        ProfileStats {
            name: self.name().to_owned(),
            call_count: self.call_count(),
            total_time_secs: self.total_time().as_secs_f64(),
        }
    }

    /// One-line human readable summary.
    pub fn report(&self) -> String {
        self.snapshot().to_string()
    }

    /// Emit the summary through `tracing` at info level.
    pub fn log_stats(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            name = %snapshot.name,
            call_count = snapshot.call_count,
            total_time_secs = snapshot.total_time_secs,
            "{}",
            snapshot
        );
    }
}

impl fmt::Debug for CallStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallStats")
            .field("name", &self.name())
            .field("call_count", &self.call_count())
            .field("total_time", &self.total_time())
            .finish()
    }
}

/// Point-in-time copy of the profiling counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStats {
    pub name: String,
    pub call_count: u64,
    pub total_time_secs: f64,
}

impl fmt::Display for ProfileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} was called {} times. Total time: {:.4} seconds",
            self.name, self.call_count, self.total_time_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_call() {
        let double = profile(|x: i32| x * 2);
        let stats = double.stats();

        assert_eq!(stats.call_count(), 0);
        assert_eq!(double.apply((4,)), 8);
        assert_eq!(double.apply((5,)), 10);
        assert_eq!(stats.call_count(), 2);
    }

    #[test]
    fn accumulates_time() {
        let slow = profile(|| std::thread::sleep(Duration::from_millis(2)));
        let stats = slow.stats();

        slow.apply(());
        assert!(stats.total_time() >= Duration::from_millis(2));
    }

    #[test]
    fn report_uses_name() {
        let sum = profile_named("sum_triple", |x: i32, y: i32, z: i32| x + y + z);
        let stats = sum.stats();
        assert_eq!(sum.apply((1, 2, 3)), 6);

        let report = stats.report();
        assert!(report.starts_with("sum_triple was called 1 times. Total time: "));
        assert!(report.ends_with(" seconds"));
    }

    #[test]
    fn snapshot_serializes() {
        let id = profile_named("identity", |x: u8| x);
        id.apply((1,));

        let json = serde_json::to_value(id.stats().snapshot()).unwrap();
        assert_eq!(json["name"], "identity");
        assert_eq!(json["call_count"], 1);
        assert!(json["total_time_secs"].is_number());
    }
}
