//! Span processors — subscribers to span lifecycle notifications.
//!
//! Processors are registered on the global
//! [`TraceProvider`](super::provider::TraceProvider) and receive every span
//! start and end in the process. Notification fan-out is failure-isolated: a
//! panicking processor is caught and logged, and the remaining processors
//! still receive the event.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use super::span::Span;

/// Subscriber to span lifecycle notifications.
///
/// `force_flush` and `shutdown` are collective operations invoked through
/// the provider; the defaults do nothing.
pub trait SpanProcessor: Send + Sync {
    /// Called when a span is opened.
    fn on_span_start(&self, span: &Span);

    /// Called when a span is closed.
    fn on_span_end(&self, span: &Span);

    /// Flush any buffered spans.
    fn force_flush(&self) {}

    /// Flush and release resources.
    fn shutdown(&self) {
        self.force_flush();
    }
}

/// Receiver for batches of ended spans.
pub trait SpanExporter: Send + Sync {
    /// Export a batch of ended spans.
    fn export(&self, batch: &[Span]);
}

/// A processor that collects ended spans in memory.
///
/// Intended for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySpanProcessor {
    started: Mutex<Vec<Span>>,
    ended: Mutex<Vec<Span>>,
}

impl InMemorySpanProcessor {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of spans seen at start, in notification order.
    #[must_use]
    pub fn started(&self) -> Vec<Span> {
        self.started.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Snapshot of ended spans, in notification order.
    #[must_use]
    pub fn ended(&self) -> Vec<Span> {
        self.ended.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Ended spans whose name starts with the given prefix.
    #[must_use]
    pub fn ended_with_prefix(&self, prefix: &str) -> Vec<Span> {
        self.ended()
            .into_iter()
            .filter(|s| s.name.starts_with(prefix))
            .collect()
    }
}

impl SpanProcessor for InMemorySpanProcessor {
    fn on_span_start(&self, span: &Span) {
        if let Ok(mut guard) = self.started.lock() {
            guard.push(span.clone());
        }
    }

    fn on_span_end(&self, span: &Span) {
        if let Ok(mut guard) = self.ended.lock() {
            guard.push(span.clone());
        }
    }
}

/// A processor that logs span completions through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSpanProcessor;

impl SpanProcessor for LoggingSpanProcessor {
    fn on_span_start(&self, span: &Span) {
        debug!(span.id = %span.span_id, span.name = %span.name, "span started");
    }

    fn on_span_end(&self, span: &Span) {
        debug!(
            span.id = %span.span_id,
            span.name = %span.name,
            span.status = ?span.status,
            "span ended",
        );
    }
}

/// Tuning for [`BatchSpanProcessor`], seeded from the environment.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Maximum spans buffered before an export is forced.
    pub max_batch_size: usize,
    /// Maximum age of the buffer before an export is forced.
    pub flush_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 128,
            flush_interval: Duration::from_secs(5),
        }
    }
}

impl BatchConfig {
    /// Read tuning from `OPENAI_AGENTS_TRACE_BATCH_SIZE` and
    /// `OPENAI_AGENTS_TRACE_FLUSH_INTERVAL` (seconds), falling back to the
    /// defaults on absent or unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_batch_size = std::env::var("OPENAI_AGENTS_TRACE_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.max_batch_size);
        let flush_interval = std::env::var("OPENAI_AGENTS_TRACE_FLUSH_INTERVAL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(defaults.flush_interval, Duration::from_secs);
        Self {
            max_batch_size,
            flush_interval,
        }
    }
}

/// A processor that buffers ended spans and hands batches to an exporter.
///
/// Flushing happens inline on the notifying flow when the buffer reaches
/// `max_batch_size` or the oldest buffered span exceeds `flush_interval`;
/// there is no background task, matching the cooperative scheduling model.
pub struct BatchSpanProcessor<E> {
    exporter: E,
    config: BatchConfig,
    buffer: Mutex<BatchBuffer>,
}

#[derive(Debug)]
struct BatchBuffer {
    spans: Vec<Span>,
    last_flush: Instant,
}

impl<E: SpanExporter> BatchSpanProcessor<E> {
    /// Create a batching processor with environment-seeded tuning.
    #[must_use]
    pub fn new(exporter: E) -> Self {
        Self::with_config(exporter, BatchConfig::from_env())
    }

    /// Create a batching processor with explicit tuning.
    #[must_use]
    pub fn with_config(exporter: E, config: BatchConfig) -> Self {
        Self {
            exporter,
            config,
            buffer: Mutex::new(BatchBuffer {
                spans: Vec::new(),
                last_flush: Instant::now(),
            }),
        }
    }

    fn flush_locked(&self, buffer: &mut BatchBuffer) {
        if !buffer.spans.is_empty() {
            let batch = std::mem::take(&mut buffer.spans);
            self.exporter.export(&batch);
        }
        buffer.last_flush = Instant::now();
    }
}

impl<E: SpanExporter> SpanProcessor for BatchSpanProcessor<E> {
    fn on_span_start(&self, _span: &Span) {}

    fn on_span_end(&self, span: &Span) {
        let Ok(mut buffer) = self.buffer.lock() else {
            return;
        };
        buffer.spans.push(span.clone());
        if buffer.spans.len() >= self.config.max_batch_size
            || buffer.last_flush.elapsed() >= self.config.flush_interval
        {
            self.flush_locked(&mut buffer);
        }
    }

    fn force_flush(&self) {
        if let Ok(mut buffer) = self.buffer.lock() {
            self.flush_locked(&mut buffer);
        }
    }
}

impl<E> std::fmt::Debug for BatchSpanProcessor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSpanProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::span::SpanKind;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct CountingExporter {
        batches: Mutex<Vec<usize>>,
    }

    impl SpanExporter for Arc<CountingExporter> {
        fn export(&self, batch: &[Span]) {
            if let Ok(mut guard) = self.batches.lock() {
                guard.push(batch.len());
            }
        }
    }

    fn ended_span(name: &str) -> Span {
        let mut span = Span::start("trace_t", None, SpanKind::Custom, name);
        span.end();
        span
    }

    #[test]
    fn in_memory_collects_both_phases() {
        let processor = InMemorySpanProcessor::new();
        let span = ended_span("custom.x");
        processor.on_span_start(&span);
        processor.on_span_end(&span);
        assert_eq!(processor.started().len(), 1);
        assert_eq!(processor.ended().len(), 1);
        assert_eq!(processor.ended_with_prefix("custom.").len(), 1);
    }

    #[test]
    fn batch_flushes_at_size() {
        let exporter = Arc::new(CountingExporter::default());
        let processor = BatchSpanProcessor::with_config(
            Arc::clone(&exporter),
            BatchConfig {
                max_batch_size: 2,
                flush_interval: Duration::from_secs(3600),
            },
        );

        processor.on_span_end(&ended_span("a"));
        assert!(exporter.batches.lock().expect("lock").is_empty());
        processor.on_span_end(&ended_span("b"));
        assert_eq!(*exporter.batches.lock().expect("lock"), vec![2]);
    }

    #[test]
    fn force_flush_drains_partial_batch() {
        let exporter = Arc::new(CountingExporter::default());
        let processor = BatchSpanProcessor::with_config(
            Arc::clone(&exporter),
            BatchConfig {
                max_batch_size: 100,
                flush_interval: Duration::from_secs(3600),
            },
        );

        processor.on_span_end(&ended_span("a"));
        processor.force_flush();
        assert_eq!(*exporter.batches.lock().expect("lock"), vec![1]);

        // Flushing an empty buffer exports nothing.
        processor.force_flush();
        assert_eq!(*exporter.batches.lock().expect("lock"), vec![1]);
    }

    #[test]
    fn batch_config_env_fallbacks() {
        let config = BatchConfig::default();
        assert_eq!(config.max_batch_size, 128);
        assert_eq!(config.flush_interval, Duration::from_secs(5));
    }
}
