//! Reporter capability objects for progress and stream operations
//!
//! A reporter is the one channel an operation body has back into the event
//! stream while it runs. The executor constructs a fresh reporter per
//! invocation with the sink installed up front; the operation only ever sees
//! the finished capability. A reporter built without a sink silently drops
//! every update, which is what standalone invocations (tests, benchmarks)
//! want.
//!
//! Reporters are owned by the operation instance for the duration of one
//! invocation and never shared across nodes.

use std::sync::Arc;

/// Sink receiving `(percent, message)` progress ticks
pub type ProgressSink = Arc<dyn Fn(f64, &str) + Send + Sync>;

/// Sink receiving non-empty text chunks
pub type StreamSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Percent/message reporter handed to progress operations
///
/// Two equivalent signaling forms are exposed: [`update`](Self::update)
/// computes a fraction from `(current, total)`, while
/// [`report`](Self::report) takes the fraction directly.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    sink: Option<ProgressSink>,
}

impl ProgressReporter {
    /// Reporter that drops every update
    pub fn new() -> Self {
        Self::default()
    }

    /// Reporter forwarding every tick into `sink`
    pub fn with_sink(sink: impl Fn(f64, &str) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    /// Signal progress as a step count: percent is `current / total`,
    /// or 0 when `total` is 0
    pub fn update(&self, current: u64, total: u64, message: &str) {
        let percent = if total > 0 {
            current as f64 / total as f64
        } else {
            0.0
        };
        self.report(percent, message);
    }

    /// Signal progress as a fraction in `[0, 1]`
    pub fn report(&self, percent: f64, message: &str) {
        if let Some(sink) = &self.sink {
            sink(percent, message);
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("installed", &self.sink.is_some())
            .finish()
    }
}

/// Text-chunk reporter handed to stream operations
///
/// Empty chunks are dropped before they reach the sink.
#[derive(Clone, Default)]
pub struct StreamReporter {
    sink: Option<StreamSink>,
}

impl StreamReporter {
    /// Reporter that drops every chunk
    pub fn new() -> Self {
        Self::default()
    }

    /// Reporter forwarding every non-empty chunk into `sink`
    pub fn with_sink(sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    /// Emit one text chunk
    pub fn emit(&self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        if let Some(sink) = &self.sink {
            sink(chunk);
        }
    }
}

impl std::fmt::Debug for StreamReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReporter")
            .field("installed", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn both_signal_forms_reach_one_sink() {
        let seen: Arc<Mutex<Vec<(f64, String)>>> = Arc::default();
        let sink_seen = Arc::clone(&seen);
        let reporter = ProgressReporter::with_sink(move |pct, msg| {
            sink_seen.lock().unwrap().push((pct, msg.to_string()));
        });

        reporter.update(1, 4, "quarter");
        reporter.update(3, 0, "no total");
        reporter.report(0.9, "almost");

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (0.25, "quarter".to_string()),
                (0.0, "no total".to_string()),
                (0.9, "almost".to_string()),
            ]
        );
    }

    #[test]
    fn updates_without_a_sink_are_dropped() {
        ProgressReporter::new().update(1, 2, "nobody listening");
        StreamReporter::new().emit("nobody listening");
    }

    #[test]
    fn stream_chunks_preserve_order_and_drop_empties() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink_seen = Arc::clone(&seen);
        let reporter = StreamReporter::with_sink(move |chunk| {
            sink_seen.lock().unwrap().push(chunk.to_string());
        });

        reporter.emit("Hel");
        reporter.emit("");
        reporter.emit("lo");

        assert_eq!(*seen.lock().unwrap(), vec!["Hel".to_string(), "lo".to_string()]);
    }
}
