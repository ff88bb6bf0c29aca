//! Request-scoped structured logging.
//!
//! A [`LogContext`] is passed explicitly along a call chain and carries the logger (a
//! [`tracing::Span`]) that work on behalf of a request should be recorded under. If the request
//! is part of a distributed trace, the context can also carry the trace and span ids, and the
//! logger it hands out is annotated with them so log lines can be joined with trace spans.
//!
//! There is no process-wide default: a context with no logger hands out a disabled span, and
//! events then fall through to whatever span is current.
//!
//! ```rust
//! use dialtone::log::{LogContext, SpanId, TraceContext, TraceId};
//!
//! let ctx = LogContext::new()
//!     .with_logger(tracing::info_span!("request", id = 7))
//!     .with_trace(TraceContext::new(TraceId::from(0x4bf92f35_u128), SpanId::from(0x00f067aa_u64)));
//!
//! ctx.logger().in_scope(|| tracing::info!("handling request"));
//! ```

use std::fmt;

use tracing::Span;

/// A 16-byte distributed trace identifier, displayed as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    /// Build a trace id from its big-endian byte representation.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        TraceId(u128::from_be_bytes(bytes))
    }

    /// The big-endian byte representation of this id.
    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

impl From<u128> for TraceId {
    fn from(value: u128) -> Self {
        TraceId(value)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// An 8-byte span identifier, displayed as 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    /// Build a span id from its big-endian byte representation.
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        SpanId(u64::from_be_bytes(bytes))
    }

    /// The big-endian byte representation of this id.
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl From<u64> for SpanId {
    fn from(value: u64) -> Self {
        SpanId(value)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The trace correlation ids for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceContext {
    /// The trace this request belongs to.
    pub trace_id: TraceId,

    /// The span within the trace.
    pub span_id: SpanId,
}

impl TraceContext {
    /// Create a trace context from a trace and span id.
    pub fn new(trace_id: TraceId, span_id: SpanId) -> Self {
        Self { trace_id, span_id }
    }
}

/// Carries a request's logger and trace correlation ids.
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    logger: Option<Span>,
    trace: Option<TraceContext>,
}

impl LogContext {
    /// An empty context, with no logger and no trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a logger to this context, replacing any existing one.
    pub fn with_logger(mut self, logger: Span) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Attach trace correlation ids to this context.
    pub fn with_trace(mut self, trace: TraceContext) -> Self {
        self.trace = Some(trace);
        self
    }

    /// The trace correlation ids, if any.
    pub fn trace(&self) -> Option<&TraceContext> {
        self.trace.as_ref()
    }

    /// The logger for this context.
    ///
    /// When the context carries trace ids, this is a child of the attached logger with
    /// `trace_id` and `span_id` fields recorded. Without a logger, a disabled span is returned.
    pub fn logger(&self) -> Span {
        let logger = self.logger.clone().unwrap_or_else(Span::none);
        match &self.trace {
            Some(trace) => tracing::info_span!(
                parent: &logger,
                "trace",
                trace_id = %trace.trace_id,
                span_id = %trace.span_id,
            ),
            None => logger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use static_assertions::assert_impl_all;

    assert_impl_all!(LogContext: Clone, Send, Sync);

    #[test]
    fn ids_display_as_fixed_width_hex() {
        let trace = TraceId::from(0x4bf92f3577b34da6a3ce929d0e0e4736_u128);
        assert_eq!(trace.to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(TraceId::from(1_u128).to_string(), format!("{:0>32}", "1"));

        let span = SpanId::from(0x00f067aa0ba902b7_u64);
        assert_eq!(span.to_string(), "00f067aa0ba902b7");
    }

    #[test]
    fn ids_from_bytes() {
        let trace = TraceId::from_bytes([0xab; 16]);
        assert_eq!(trace.to_string(), "ab".repeat(16));
        assert_eq!(trace.to_bytes(), [0xab; 16]);

        let span = SpanId::from_bytes([0, 0, 0, 0, 0, 0, 0, 0x2a]);
        assert_eq!(span, SpanId::from(42_u64));
    }

    #[test]
    fn empty_context_is_a_no_op() {
        let ctx = LogContext::new();
        assert!(ctx.trace().is_none());
        assert!(ctx.logger().is_none());
    }

    /// Spans only carry metadata while a subscriber is interested in them.
    fn with_subscriber<T>(f: impl FnOnce() -> T) -> T {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    #[test]
    fn attached_logger_is_returned() {
        with_subscriber(|| {
            let ctx = LogContext::new().with_logger(tracing::info_span!("request"));
            let logger = ctx.logger();
            assert_eq!(logger.metadata().map(|m| m.name()), Some("request"));
        });
    }

    #[test]
    fn trace_fields_annotate_the_logger() {
        with_subscriber(|| {
            let trace = TraceContext::new(TraceId::from(7_u128), SpanId::from(9_u64));
            let ctx = LogContext::new()
                .with_logger(tracing::info_span!("request"))
                .with_trace(trace);

            assert_eq!(ctx.trace(), Some(&trace));

            let logger = ctx.logger();
            assert_eq!(logger.metadata().map(|m| m.name()), Some("trace"));
            assert!(logger.field("trace_id").is_some());
            assert!(logger.field("span_id").is_some());
        });
    }
}
