//! The process-wide trace provider.
//!
//! A single [`TraceProvider`] per process holds the registered
//! [`SpanProcessor`]s and the tracing-enabled flag. The enabled flag is
//! seeded once from `OPENAI_AGENTS_DISABLE_TRACING` and can be overridden
//! programmatically. Processor notification is failure-isolated: a panicking
//! processor is caught and logged so the others still receive the event.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, RwLock};

use tracing::warn;

use super::processor::SpanProcessor;
use super::span::Span;

static GLOBAL: LazyLock<TraceProvider> = LazyLock::new(TraceProvider::from_env);

/// The global trace provider.
#[must_use]
pub fn provider() -> &'static TraceProvider {
    &GLOBAL
}

/// Process-wide registry of span processors.
pub struct TraceProvider {
    processors: RwLock<Vec<Arc<dyn SpanProcessor>>>,
    enabled: AtomicBool,
}

impl TraceProvider {
    fn from_env() -> Self {
        let disabled = std::env::var("OPENAI_AGENTS_DISABLE_TRACING")
            .map(|v| {
                let v = v.trim().to_ascii_lowercase();
                v == "true" || v == "1"
            })
            .unwrap_or(false);
        Self {
            processors: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(!disabled),
        }
    }

    /// Whether tracing is enabled process-wide.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable tracing process-wide.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Register an additional processor.
    pub fn add_processor(&self, processor: Arc<dyn SpanProcessor>) {
        if let Ok(mut guard) = self.processors.write() {
            guard.push(processor);
        }
    }

    /// Replace the processor list.
    pub fn set_processors(&self, processors: Vec<Arc<dyn SpanProcessor>>) {
        if let Ok(mut guard) = self.processors.write() {
            *guard = processors;
        }
    }

    /// Number of registered processors.
    #[must_use]
    pub fn processor_count(&self) -> usize {
        self.processors.read().map(|g| g.len()).unwrap_or(0)
    }

    /// Flush every processor.
    pub fn force_flush(&self) {
        self.for_each("force_flush", |p| p.force_flush());
    }

    /// Shut every processor down.
    pub fn shutdown(&self) {
        self.for_each("shutdown", |p| p.shutdown());
    }

    pub(crate) fn emit_start(&self, span: &Span) {
        self.for_each("on_span_start", |p| p.on_span_start(span));
    }

    pub(crate) fn emit_end(&self, span: &Span) {
        self.for_each("on_span_end", |p| p.on_span_end(span));
    }

    fn for_each(&self, op: &str, f: impl Fn(&dyn SpanProcessor)) {
        let Ok(guard) = self.processors.read() else {
            return;
        };
        for processor in guard.iter() {
            if catch_unwind(AssertUnwindSafe(|| f(processor.as_ref()))).is_err() {
                warn!(operation = op, "span processor panicked; continuing with remaining processors");
            }
        }
    }
}

impl std::fmt::Debug for TraceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceProvider")
            .field("enabled", &self.is_enabled())
            .field("processors", &self.processor_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::processor::InMemorySpanProcessor;
    use crate::trace::span::SpanKind;

    #[test]
    fn fanout_survives_a_panicking_processor() {
        struct Panicking;
        impl SpanProcessor for Panicking {
            fn on_span_start(&self, _span: &Span) {
                panic!("bad processor");
            }
            fn on_span_end(&self, _span: &Span) {
                panic!("bad processor");
            }
        }

        let provider = TraceProvider {
            processors: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(true),
        };
        let collector = Arc::new(InMemorySpanProcessor::new());
        provider.add_processor(Arc::new(Panicking));
        provider.add_processor(Arc::clone(&collector) as Arc<dyn SpanProcessor>);

        let mut span = Span::start("trace_t", None, SpanKind::Custom, "custom.x");
        provider.emit_start(&span);
        span.end();
        provider.emit_end(&span);

        assert_eq!(collector.started().len(), 1);
        assert_eq!(collector.ended().len(), 1);
    }

    #[test]
    fn processors_can_be_replaced() {
        let provider = TraceProvider {
            processors: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(true),
        };
        provider.add_processor(Arc::new(InMemorySpanProcessor::new()));
        assert_eq!(provider.processor_count(), 1);
        provider.set_processors(Vec::new());
        assert_eq!(provider.processor_count(), 0);
    }
}
