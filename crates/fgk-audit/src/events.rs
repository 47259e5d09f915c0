use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed vocabulary of kernel events. Serialized in SCREAMING_SNAKE_CASE,
/// which is also the wire form supervisors consume.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    AuditSnapshot,
    DayStarted,
    KillSwitchFired,
    ForceFlattenRequested,
    RiskStateChanged,
    FlattenStarted,
    FlattenCompleted,
    FlattenSkippedAlreadyInProgress,
    FlattenAbortedTooManyRejections,
    DataQualityMissingBook,
    DataQualityInconsistentPosition,
    MarginAlert,
    ProtectionRejected,
    ComplianceViolation,
    HftDetected,
}

/// One correlated event record. `correlation_id` ties every record of a
/// tick together; `data` carries the event payload, including the
/// `snapshot_hash` on [`EventType::AuditSnapshot`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelEvent {
    pub event_type: EventType,
    pub ts: f64,
    pub correlation_id: Option<String>,
    pub data: Value,
}

impl KernelEvent {
    pub fn new(event_type: EventType, ts: f64, data: Value) -> Self {
        Self {
            event_type,
            ts,
            correlation_id: None,
            data,
        }
    }

    pub fn with_correlation(mut self, correlation_id: &str) -> Self {
        self.correlation_id = Some(correlation_id.to_string());
        self
    }
}

/// Sink abstraction for kernel events. Ordering is FIFO within a single
/// writer; implementations must be safe to call on every tick.
pub trait EventSink {
    fn emit(&mut self, event: &KernelEvent) -> Result<()>;
}

/// Emit to a sink, logging and swallowing failures. Background evidence
/// must never abort the tick that produced it.
pub fn emit_or_log<S: EventSink + ?Sized>(sink: &mut S, event: &KernelEvent) {
    if let Err(err) = sink.emit(event) {
        tracing::warn!(event_type = ?event.event_type, error = %err, "event sink emit failed");
    }
}

/// In-memory ring sink, bounded; oldest records drop first.
#[derive(Debug)]
pub struct MemorySink {
    events: Vec<KernelEvent>,
    max_events: usize,
}

impl MemorySink {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events,
        }
    }

    pub fn events(&self) -> &[KernelEvent] {
        &self.events
    }

    pub fn count_of(&self, event_type: EventType) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(65_536)
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, event: &KernelEvent) -> Result<()> {
        if self.events.len() >= self.max_events {
            self.events.remove(0);
        }
        self.events.push(event.clone());
        Ok(())
    }
}

/// Line-delimited JSON file sink (one event per line, append-only).
/// Rotation is the collaborator's responsibility.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlSink {
    fn emit(&mut self, event: &KernelEvent) -> Result<()> {
        let line = serde_json::to_string(event).context("serialize kernel event failed")?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open event log {:?}", self.path))?;
        f.write_all(line.as_bytes()).context("write event line failed")?;
        f.write_all(b"\n").context("write newline failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_is_fifo_and_bounded() {
        let mut sink = MemorySink::new(2);
        for i in 0..3 {
            let ev = KernelEvent::new(
                EventType::AuditSnapshot,
                i as f64,
                serde_json::json!({ "i": i }),
            );
            sink.emit(&ev).unwrap();
        }
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.events()[0].ts, 1.0);
        assert_eq!(sink.events()[1].ts, 2.0);
    }

    #[test]
    fn event_type_wire_form_is_screaming_snake() {
        let s = serde_json::to_string(&EventType::FlattenSkippedAlreadyInProgress).unwrap();
        assert_eq!(s, "\"FLATTEN_SKIPPED_ALREADY_IN_PROGRESS\"");
    }
}
