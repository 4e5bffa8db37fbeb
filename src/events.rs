//! Event Bus (C9, §4.9).
//!
//! Named channels plus a catch-all `"*"` channel. `silent(f)` suppresses
//! every emission for the dynamic extent of `f`, restoring the prior flag
//! on exit — the same closure-based scoped-guard shape as [`crate::gate`]
//! and [`crate::identity`].

use std::cell::Cell;
use std::sync::Mutex;

use serde_json::Value;

use crate::constants::EVENT_ALL;
use crate::observability::{flatten_fields, Logger, Severity, Sink, StdioSink};

type Listener = Box<dyn Fn(&str, &Value) + Send + Sync>;

thread_local! {
    static SILENCED_DEPTH: Cell<u32> = Cell::new(0);
}

/// Runs `f` with all event emissions suppressed, restoring the previous
/// silenced depth afterwards regardless of how `f` returns.
pub fn silent<R>(f: impl FnOnce() -> R) -> R {
    SILENCED_DEPTH.with(|d| d.set(d.get() + 1));
    let result = f();
    SILENCED_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    result
}

fn is_silenced() -> bool {
    SILENCED_DEPTH.with(|d| d.get() > 0)
}

#[derive(Default)]
struct Channels {
    by_name: std::collections::HashMap<String, Vec<Listener>>,
}

/// A registry of named listeners an engine fans events out to. Every
/// triggered event is also rendered as one structured log line (§1.1)
/// through an injectable sink, so the log stream and the listener
/// fan-out share one emission point and one silencing rule.
pub struct EventBus {
    channels: Mutex<Channels>,
    sink: Box<dyn Sink>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_sink(Box::new(StdioSink))
    }

    pub fn with_sink(sink: Box<dyn Sink>) -> Self {
        Self {
            channels: Mutex::new(Channels::default()),
            sink,
        }
    }

    /// Registers `listener` on `event`. Use [`crate::constants::EVENT_ALL`]
    /// to listen on every event.
    pub fn on(&self, event: &str, listener: impl Fn(&str, &Value) + Send + Sync + 'static) {
        self.channels
            .lock()
            .unwrap()
            .by_name
            .entry(event.to_string())
            .or_default()
            .push(Box::new(listener));
    }

    /// Fans `event` out to catch-all listeners first, then same-name
    /// listeners, then renders one structured log line. A no-op inside
    /// [`silent`] — neither listeners nor the log line fire.
    pub fn trigger(&self, event: &str, payload: Value) {
        if is_silenced() {
            return;
        }
        {
            let channels = self.channels.lock().unwrap();
            if let Some(listeners) = channels.by_name.get(EVENT_ALL) {
                for listener in listeners {
                    listener(event, &payload);
                }
            }
            if event != EVENT_ALL {
                if let Some(listeners) = channels.by_name.get(event) {
                    for listener in listeners {
                        listener(event, &payload);
                    }
                }
            }
        }
        Logger::log(self.sink.as_ref(), Severity::Info, event, &flatten_fields(&payload));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn catch_all_fires_before_same_name_listener() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_a = order.clone();
        let order_b = order.clone();
        bus.on(EVENT_ALL, move |_, _| order_a.lock().unwrap().push("all"));
        bus.on("document_create", move |_, _| order_b.lock().unwrap().push("named"));
        bus.trigger("document_create", json!({}));
        assert_eq!(*order.lock().unwrap(), vec!["all", "named"]);
    }

    #[test]
    fn silent_suppresses_every_emission() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.on(EVENT_ALL, move |_, _| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        silent(|| bus.trigger("document_create", json!({})));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        bus.trigger("document_create", json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    struct RecordingSink {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl Sink for RecordingSink {
        fn write(&self, _severity: Severity, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    #[test]
    fn trigger_emits_one_log_line_per_event_and_none_when_silenced() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let bus = EventBus::with_sink(Box::new(RecordingSink { lines: lines.clone() }));

        bus.trigger("document_create", json!({ "collectionId": "books" }));
        silent(|| bus.trigger("document_create", json!({ "collectionId": "books" })));

        let captured = lines.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].contains("\"collectionId\":\"books\""));
    }
}
