//! Deriving child contexts.

use super::key::Bindings;
use super::node::Context;
use crate::cancellation::{AbortHandle, AbortLink, AbortSignal};
use crate::time::{time_source, TimeSource};
use crate::utils::{delay_until, saturating_add, Deadline};
use std::time::Duration;
use tracing::debug;

/// A derived context paired with the handle that aborts it.
#[derive(Debug, Clone)]
pub struct Abortable {
    /// The derived context.
    pub ctx: Context,
    /// Aborts `ctx` and everything derived from it.
    pub abort: AbortHandle,
}

impl Abortable {
    /// Aborts the context.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Returns whether the context's signal has fired.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Returns the context's own signal.
    #[must_use]
    pub fn signal(&self) -> &AbortSignal {
        self.abort.signal()
    }

    /// Splits into the context and its abort handle.
    #[must_use]
    pub fn into_parts(self) -> (Context, AbortHandle) {
        (self.ctx, self.abort)
    }
}

/// Derives a context that binds `values` on top of `parent`.
///
/// A key bound here shadows the same key bound by any ancestor.
#[must_use]
pub fn with_values(parent: &Context, values: Bindings) -> Context {
    Context::derive(parent, None, None, values)
}

/// Derives a context with its own signal.
///
/// The signal fires when the parent's signal fires or when the returned
/// handle aborts, whichever happens first. If the parent already fired, the
/// child is fired before this returns.
#[must_use]
pub fn with_abort(parent: &Context) -> Abortable {
    let link = AbortLink::new();
    let ctx = Context::derive(parent, Some(link.signal().clone()), None, Bindings::new());
    link.attach_parent(parent.signal());
    debug!(depth = ctx.depth(), fired = link.signal().is_fired(), "derived abort context");

    Abortable {
        ctx,
        abort: AbortHandle::new(link),
    }
}

/// Derives a context that aborts at `deadline`, using the process-wide
/// [`TimeSource`].
///
/// See [`with_deadline_using`].
#[must_use]
pub fn with_deadline(parent: &Context, deadline: impl Into<Deadline>) -> Abortable {
    with_deadline_using(parent, deadline, &time_source())
}

/// Derives a context that aborts at `deadline`.
///
/// A deadline can only be tightened. If `parent` already inherits an
/// earlier deadline, the request is ignored and the result behaves exactly
/// like [`with_abort`]: the parent's deadline fires first anyway. A deadline
/// in the past fires as soon as the timer allows.
#[must_use]
pub fn with_deadline_using(
    parent: &Context,
    deadline: impl Into<Deadline>,
    time: &TimeSource,
) -> Abortable {
    let requested = deadline.into().instant();

    if let Some(inherited) = parent.deadline() {
        if requested > inherited {
            debug!(
                %requested,
                %inherited,
                "requested deadline is later than the inherited one, keeping inherited"
            );
            return with_abort(parent);
        }
    }

    let link = AbortLink::new();
    let ctx = Context::derive(
        parent,
        Some(link.signal().clone()),
        Some(requested),
        Bindings::new(),
    );
    link.attach_parent(parent.signal());
    link.arm_timer(time.timer().clone(), delay_until(time.now(), requested));
    debug!(depth = ctx.depth(), deadline = %requested, "derived deadline context");

    Abortable {
        ctx,
        abort: AbortHandle::new(link),
    }
}

/// Derives a context that aborts after `duration`, using the process-wide
/// [`TimeSource`].
#[must_use]
pub fn with_timeout(parent: &Context, duration: Duration) -> Abortable {
    with_timeout_using(parent, duration, &time_source())
}

/// Derives a context that aborts after `duration` according to `time`.
#[must_use]
pub fn with_timeout_using(parent: &Context, duration: Duration, time: &TimeSource) -> Abortable {
    let deadline = saturating_add(time.now(), duration);
    with_deadline_using(parent, deadline, time)
}
