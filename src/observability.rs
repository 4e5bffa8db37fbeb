//! Structured logging (§1.1, ADDED).
//!
//! One log line per event, deterministic field ordering, no buffering.
//! Output goes through an injectable [`Sink`] so host applications can
//! redirect or silence it without pulling in a logging framework; the
//! default sink writes informational lines to stdout and error/fatal
//! lines to stderr.

use std::io::{self, Write};

/// Log severity. Ordered so callers can filter ("only Warn and above").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

/// Where a log line ends up. Implementations must not panic.
pub trait Sink: Send + Sync {
    fn write(&self, severity: Severity, line: &str);
}

/// Default sink: informational lines to stdout, Warn/Error to stderr.
pub struct StdioSink;

impl Sink for StdioSink {
    fn write(&self, severity: Severity, line: &str) {
        let mut out: Box<dyn Write> = match severity {
            Severity::Info => Box::new(io::stdout()),
            Severity::Warn | Severity::Error => Box::new(io::stderr()),
        };
        let _ = writeln!(out, "{line}");
    }
}

/// Builds and writes one structured log line.
pub struct Logger;

impl Logger {
    pub fn log(sink: &dyn Sink, severity: Severity, event: &str, fields: &[(String, String)]) {
        let line = render(severity, event, fields);
        sink.write(severity, &line);
    }
}

fn render(severity: Severity, event: &str, fields: &[(String, String)]) -> String {
    let mut out = String::with_capacity(128);
    out.push('{');
    out.push_str("\"event\":\"");
    escape(&mut out, event);
    out.push_str("\",\"severity\":\"");
    out.push_str(severity.as_str());
    out.push('"');

    let mut sorted: Vec<&(String, String)> = fields.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in sorted {
        out.push_str(",\"");
        escape(&mut out, key);
        out.push_str("\":\"");
        escape(&mut out, value);
        out.push('"');
    }
    out.push('}');
    out
}

fn escape(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

/// Flattens a JSON object's top-level entries into sorted `(key, value)`
/// string pairs for logging. Nested values are rendered via their JSON
/// text; `null` entries are dropped.
pub fn flatten_fields(payload: &serde_json::Value) -> Vec<(String, String)> {
    let serde_json::Value::Object(map) = payload else {
        return Vec::new();
    };
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let rendered = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), rendered)
        })
        .collect()
}
