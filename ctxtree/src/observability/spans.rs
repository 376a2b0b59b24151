//! Tracing spans describing a context.

use crate::context::{request_id, Context};
use crate::utils::format_iso8601;
use tracing::{field, info_span, Span};

/// Creates an `info` span carrying the context's request id, depth,
/// cancellation state and deadline.
#[must_use]
pub fn context_span(ctx: &Context) -> Span {
    let span = info_span!(
        "context",
        depth = ctx.depth(),
        cancelled = ctx.is_cancelled(),
        request_id = field::Empty,
        deadline = field::Empty,
    );
    if let Some(id) = request_id(ctx) {
        span.record("request_id", id.as_str());
    }
    if let Some(deadline) = ctx.deadline() {
        span.record("deadline", format_iso8601(&deadline).as_str());
    }
    span
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{background, with_abort, with_request_id};
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        captured.text()
    }

    #[test]
    fn test_context_span_records_fields() {
        let ctx = with_request_id(&background(), "req-1");
        let child = with_abort(&ctx);

        let output = capture(|| {
            let span = context_span(&child.ctx);
            let _guard = span.enter();
            tracing::info!("inside context span");
        });

        assert!(output.contains("inside context span"), "{output}");
        assert!(output.contains("depth=2"), "{output}");
        assert!(output.contains("cancelled=false"), "{output}");
        assert!(output.contains(r#"request_id="req-1""#), "{output}");
        assert!(!output.contains("deadline"), "{output}");
    }

    #[test]
    fn test_context_span_reports_cancellation() {
        let child = with_abort(&background());
        child.abort();

        let output = capture(|| {
            let _guard = context_span(&child.ctx).entered();
            tracing::info!("after abort");
        });

        assert!(output.contains("cancelled=true"), "{output}");
        assert!(!output.contains("request_id"), "{output}");
    }
}
