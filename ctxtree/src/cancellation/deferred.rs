//! Per-thread work queue that flattens listener cascades.
//!
//! Firing a signal runs its listeners, which fire child signals, which run
//! their listeners, and so on down the tree. Dropping a signal drops its
//! listeners, which may own the last reference to a child signal, and so on.
//! Done directly, both walk one stack frame per tree level. Instead, the
//! outermost call on a thread drains a queue and nested calls only append.

use super::signal::FireCallback;
use std::cell::RefCell;
use std::collections::VecDeque;
use tracing::warn;

enum Work {
    Run(FireCallback),
    Release(FireCallback),
}

impl Work {
    fn complete(self) {
        match self {
            Self::Run(callback) => {
                if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
                    warn!("Abort listener panicked: {:?}", e);
                }
            }
            Self::Release(callback) => drop(callback),
        }
    }
}

thread_local! {
    /// `Some` while a drain is in progress on this thread.
    static QUEUE: RefCell<Option<VecDeque<Work>>> = const { RefCell::new(None) };
}

/// Runs `callbacks`, after any work already queued on this thread.
///
/// Returns once every callback, and everything they queue in turn, has run,
/// unless this call is nested in another drain. In that case the outer
/// drain runs them before it returns.
pub(super) fn run_all(callbacks: Vec<FireCallback>) {
    submit(callbacks.into_iter().map(Work::Run).collect());
}

/// Drops `callbacks` without running them, flattening any teardown they
/// trigger.
pub(super) fn release_all(callbacks: Vec<FireCallback>) {
    submit(callbacks.into_iter().map(Work::Release).collect());
}

fn submit(work: VecDeque<Work>) {
    if work.is_empty() {
        return;
    }

    let mut work = Some(work);
    let drain = QUEUE
        .try_with(|queue| {
            let mut queue = queue.borrow_mut();
            let nested = queue.is_some();
            let incoming = work.take().unwrap_or_default();
            queue.get_or_insert_with(VecDeque::new).extend(incoming);
            !nested
        })
        .unwrap_or(false);

    // Thread-local storage is already torn down; nothing can be queued.
    if let Some(work) = work {
        work.into_iter().for_each(Work::complete);
        return;
    }

    if drain {
        while let Some(next) = pop() {
            next.complete();
        }
        let _ = QUEUE.try_with(|queue| queue.borrow_mut().take());
    }
}

fn pop() -> Option<Work> {
    QUEUE
        .try_with(|queue| queue.borrow_mut().as_mut().and_then(VecDeque::pop_front))
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_nested_work_runs_after_current_callback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let outer_log = log.clone();
        let inner_log = log.clone();

        run_all(vec![Box::new(move || {
            outer_log.lock().push("outer start");
            let inner_log = inner_log.clone();
            run_all(vec![Box::new(move || inner_log.lock().push("inner"))]);
            outer_log.lock().push("outer end");
        })]);

        assert_eq!(*log.lock(), vec!["outer start", "outer end", "inner"]);
    }

    #[test]
    fn test_queue_is_reset_after_drain() {
        run_all(vec![Box::new(|| {})]);
        assert!(QUEUE.with(|queue| queue.borrow().is_none()));
    }

    #[test]
    fn test_release_drops_without_running() {
        let owned = Arc::new(());
        let held = owned.clone();
        let ran = Arc::new(Mutex::new(false));
        let ran_clone = ran.clone();

        release_all(vec![Box::new(move || {
            drop(held);
            *ran_clone.lock() = true;
        })]);

        assert_eq!(Arc::strong_count(&owned), 1);
        assert!(!*ran.lock());
    }

    #[test]
    fn test_panicking_work_does_not_stall_queue() {
        let ran = Arc::new(Mutex::new(false));
        let ran_clone = ran.clone();

        run_all(vec![
            Box::new(|| panic!("listener failure")),
            Box::new(move || *ran_clone.lock() = true),
        ]);

        assert!(*ran.lock());
        assert!(QUEUE.with(|queue| queue.borrow().is_none()));
    }
}
