//! The edge between a derived signal and its parent.

use super::{AbortSignal, Subscription};
use crate::time::{Timer, TimerHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Owns a derived signal together with everything that can fire it: the
/// subscription on the parent's signal and, for deadline contexts, a
/// pending timer.
///
/// Each attachment is taken out exactly once, by whichever of parent fire,
/// timer, or manual abort resolves the link first.
pub(crate) struct AbortLink {
    signal: AbortSignal,
    parent: Mutex<Option<Subscription>>,
    timer: Mutex<Option<(Arc<dyn Timer>, TimerHandle)>>,
}

impl AbortLink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            signal: AbortSignal::new(),
            parent: Mutex::new(None),
            timer: Mutex::new(None),
        })
    }

    pub(crate) fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// Subscribes to the parent's signal.
    ///
    /// If the parent already fired, the link resolves before this returns.
    pub(crate) fn attach_parent(self: &Arc<Self>, parent: Option<&AbortSignal>) {
        let Some(parent) = parent else {
            return;
        };

        let link = Arc::clone(self);
        let subscription = parent.on_fire(move || link.resolve("parent"));
        *self.parent.lock() = Some(subscription);

        // A concurrent abort may have resolved the link before the
        // subscription was stored.
        if self.signal.is_fired() {
            self.release_parent();
        }
    }

    /// Schedules the link to resolve after `delay`.
    pub(crate) fn arm_timer(self: &Arc<Self>, timer: Arc<dyn Timer>, delay: Duration) {
        if self.signal.is_fired() {
            return;
        }

        let link = Arc::clone(self);
        let handle = timer.schedule(delay, Box::new(move || link.resolve("deadline")));
        *self.timer.lock() = Some((timer, handle));

        if self.signal.is_fired() {
            self.release_timer();
        }
    }

    /// Detaches from the parent, cancels any timer, then fires.
    pub(crate) fn resolve(&self, cause: &'static str) {
        self.release_parent();
        self.release_timer();
        if self.signal.fire() {
            debug!(cause, "context aborted");
        }
    }

    fn release_parent(&self) {
        let subscription = self.parent.lock().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    fn release_timer(&self) {
        let timer = self.timer.lock().take();
        if let Some((timer, handle)) = timer {
            timer.cancel(&handle);
        }
    }
}

/// Aborts a derived context.
///
/// Cloning yields another handle to the same context.
#[derive(Clone)]
pub struct AbortHandle {
    link: Arc<AbortLink>,
}

impl AbortHandle {
    pub(crate) fn new(link: Arc<AbortLink>) -> Self {
        Self { link }
    }

    /// Aborts the context.
    ///
    /// Detaches the context from its parent and cancels its timer before
    /// firing. Calling this more than once, or after the parent already
    /// propagated a fire, has no further effect.
    pub fn abort(&self) {
        self.link.resolve("abort");
    }

    /// Returns whether the context's signal has fired.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.link.signal().is_fired()
    }

    /// Returns the signal this handle fires.
    #[must_use]
    pub fn signal(&self) -> &AbortSignal {
        self.link.signal()
    }
}

impl std::fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortHandle")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
