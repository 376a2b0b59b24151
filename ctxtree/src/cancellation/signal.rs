//! Fire-once abort signal with removable listeners.

use super::deferred;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::{trace, warn};

/// A callback invoked when a signal fires.
pub type FireCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: Vec<(u64, FireCallback)>,
}

#[derive(Default)]
struct SignalInner {
    fired: AtomicBool,
    /// Guards both the listener list and the unfired-to-fired transition.
    listeners: Mutex<ListenerTable>,
    notify: Notify,
}

impl Drop for SignalInner {
    fn drop(&mut self) {
        let entries = std::mem::take(&mut self.listeners.get_mut().entries);
        deferred::release_all(entries.into_iter().map(|(_, callback)| callback).collect());
    }
}

/// A cancellation signal that fires at most once.
///
/// Cloning produces another handle to the same signal. Firing is
/// irreversible and idempotent: only the first call to [`fire`](Self::fire)
/// runs the listeners.
#[derive(Clone, Default)]
pub struct AbortSignal {
    inner: Arc<SignalInner>,
}

impl AbortSignal {
    /// Creates a new unfired signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the signal has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Fires the signal.
    ///
    /// Returns true if this call performed the transition. Listeners run on
    /// the calling thread after the internal lock is released. A panicking
    /// listener is logged and suppressed.
    ///
    /// A fire triggered from inside a listener marks its signal fired at
    /// once, but its own listeners run after the current listener returns.
    /// Either way, all of them have run by the time the outermost `fire`
    /// returns.
    pub fn fire(&self) -> bool {
        let listeners = {
            let mut table = self.inner.listeners.lock();
            if self.inner.fired.swap(true, Ordering::SeqCst) {
                return false;
            }
            std::mem::take(&mut table.entries)
        };

        trace!(listeners = listeners.len(), "abort signal fired");
        self.inner.notify.notify_waiters();

        deferred::run_all(listeners.into_iter().map(|(_, callback)| callback).collect());
        true
    }

    /// Registers a callback to run once when the signal fires.
    ///
    /// If the signal already fired, the callback runs immediately and the
    /// returned subscription is inert.
    pub fn on_fire<F>(&self, callback: F) -> Subscription
    where
        F: FnOnce() + Send + 'static,
    {
        let mut table = self.inner.listeners.lock();
        if self.is_fired() {
            drop(table);
            invoke(Box::new(callback));
            return Subscription::inert();
        }

        let id = table.next_id;
        table.next_id += 1;
        table.entries.push((id, Box::new(callback)));

        Subscription {
            signal: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Returns the number of listeners still waiting for this signal.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().entries.len()
    }

    /// Waits until the signal fires.
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        if self.is_fired() {
            return;
        }
        notified.await;
    }

    /// Returns true if both handles refer to the same signal.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("fired", &self.is_fired())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn invoke(callback: FireCallback) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Abort listener panicked: {:?}", e);
    }
}

/// A registration made with [`AbortSignal::on_fire`].
///
/// Dropping a subscription leaves the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug)]
#[must_use = "dropping a subscription does not remove the listener"]
pub struct Subscription {
    signal: Weak<SignalInner>,
    id: u64,
}

impl Subscription {
    fn inert() -> Self {
        Self {
            signal: Weak::new(),
            id: 0,
        }
    }

    /// Removes the listener if it is still registered.
    ///
    /// Returns true if a listener was removed. Safe to call any number of
    /// times, including after the signal fired or was dropped.
    pub fn unsubscribe(&self) -> bool {
        let Some(inner) = self.signal.upgrade() else {
            return false;
        };
        let mut table = inner.listeners.lock();
        let before = table.entries.len();
        table.entries.retain(|(id, _)| *id != self.id);
        table.entries.len() < before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        (counter, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_signal_default_not_fired() {
        let signal = AbortSignal::new();
        assert!(!signal.is_fired());
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn test_fire_idempotent() {
        let signal = AbortSignal::new();
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(signal.is_fired());
    }

    #[test]
    fn test_clone_shares_state() {
        let signal = AbortSignal::new();
        let other = signal.clone();
        other.fire();
        assert!(signal.is_fired());
        assert!(signal.ptr_eq(&other));
        assert!(!signal.ptr_eq(&AbortSignal::new()));
    }

    #[test]
    fn test_on_fire_before_fire() {
        let signal = AbortSignal::new();
        let (count, callback) = counter();

        let _sub = signal.on_fire(callback);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(signal.listener_count(), 1);

        signal.fire();
        signal.fire();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn test_on_fire_after_fire_runs_immediately() {
        let signal = AbortSignal::new();
        signal.fire();

        let (count, callback) = counter();
        let sub = signal.on_fire(callback);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.listener_count(), 0);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_unsubscribe_idempotent() {
        let signal = AbortSignal::new();
        let (count, callback) = counter();

        let sub = signal.on_fire(callback);
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());

        signal.fire();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_only_removes_own_listener() {
        let signal = AbortSignal::new();
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();

        let sub = signal.on_fire(first_cb);
        let _keep = signal.on_fire(second_cb);
        sub.unsubscribe();
        assert_eq!(signal.listener_count(), 1);

        signal.fire();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_after_signal_dropped() {
        let signal = AbortSignal::new();
        let sub = signal.on_fire(|| {});
        drop(signal);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_listener_panic_suppressed() {
        let signal = AbortSignal::new();
        let (count, callback) = counter();

        let _a = signal.on_fire(|| panic!("Intentional panic"));
        let _b = signal.on_fire(callback);

        assert!(signal.fire());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_subscribe_during_fire() {
        let signal = AbortSignal::new();
        let (count, callback) = counter();
        let reentrant = signal.clone();

        let _sub = signal.on_fire(move || {
            // Runs outside the lock, so this sees the fired state.
            let _inner = reentrant.on_fire(callback);
        });

        signal.fire();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_fire() {
        let signal = AbortSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        tokio::task::yield_now().await;
        signal.fire();

        handle.await.unwrap();
    }

    #[test]
    fn test_cancelled_pending_until_fire() {
        let signal = AbortSignal::new();
        let mut fut = tokio_test::task::spawn(signal.cancelled());

        tokio_test::assert_pending!(fut.poll());
        signal.fire();
        assert!(fut.is_woken());
        tokio_test::assert_ready!(fut.poll());
    }

    #[test]
    fn test_cancelled_ready_when_already_fired() {
        let signal = AbortSignal::new();
        signal.fire();
        let mut fut = tokio_test::task::spawn(signal.cancelled());
        tokio_test::assert_ready!(fut.poll());
    }
}
