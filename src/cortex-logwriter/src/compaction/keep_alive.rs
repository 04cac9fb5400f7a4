//! Host-provided scope that keeps the process awake during compaction.

use tracing::debug;

/// Something that prevents the host from suspending, such as a wake lock.
///
/// The compactor never touches this itself. Hosts hold a
/// [`KeepAliveGuard`] around [`Compactor::compact`](super::Compactor::compact).
pub trait KeepAlive {
    fn acquire(&self);
    fn release(&self);
}

/// Keep-alive for hosts with nothing to keep awake.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKeepAlive;

impl KeepAlive for NoopKeepAlive {
    fn acquire(&self) {}
    fn release(&self) {}
}

/// Holds a keep-alive scope until dropped.
pub struct KeepAliveGuard<'a> {
    scope: &'a dyn KeepAlive,
}

impl<'a> KeepAliveGuard<'a> {
    pub fn acquire(scope: &'a dyn KeepAlive) -> Self {
        debug!("Acquiring keep-alive");
        scope.acquire();
        Self { scope }
    }
}

impl Drop for KeepAliveGuard<'_> {
    fn drop(&mut self) {
        self.scope.release();
        debug!("Released keep-alive");
    }
}

/// Run `f` while holding `scope`. The scope is released even if `f` panics.
pub fn with_keep_alive<T>(scope: &dyn KeepAlive, f: impl FnOnce() -> T) -> T {
    let _guard = KeepAliveGuard::acquire(scope);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicI32, Ordering};

    #[derive(Default)]
    struct Counting {
        held: AtomicI32,
        acquired: AtomicI32,
    }

    impl KeepAlive for Counting {
        fn acquire(&self) {
            self.held.fetch_add(1, Ordering::SeqCst);
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }
        fn release(&self) {
            self.held.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_scope_held_during_call() {
        let scope = Counting::default();
        let held_inside = with_keep_alive(&scope, || scope.held.load(Ordering::SeqCst));
        assert_eq!(held_inside, 1);
        assert_eq!(scope.held.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_scope_released_on_error() {
        let scope = Counting::default();
        let result: Result<(), &str> = with_keep_alive(&scope, || Err("boom"));
        assert!(result.is_err());
        assert_eq!(scope.held.load(Ordering::SeqCst), 0);
        assert_eq!(scope.acquired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scope_released_on_panic() {
        let scope = Counting::default();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            with_keep_alive(&scope, || panic!("compaction blew up"))
        }));
        assert!(outcome.is_err());
        assert_eq!(scope.held.load(Ordering::SeqCst), 0);
    }
}
