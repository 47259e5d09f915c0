//! fgk-audit
//!
//! The evidence layer of the guard kernel:
//! - [`KernelEvent`] — correlated, ordered event records emitted per tick
//! - [`EventSink`] — pluggable sink (in-memory ring, JSONL file)
//! - [`AuditWriter`] — append-only JSONL writer with an optional
//!   tamper-evident hash chain, plus chain verification
//! - [`AuditLog`] — compliance audit entries with per-record integrity
//!   hashes and an optional remote-backup callback
//!
//! Sinks must never abort the calling tick: use [`emit_or_log`] at call
//! sites that cannot propagate errors.

mod compliance;
mod events;
mod writer;

pub use compliance::{AuditLog, AuditLogEntry};
pub use events::{emit_or_log, EventSink, EventType, JsonlSink, KernelEvent, MemorySink};
pub use writer::{
    compute_record_hash, verify_hash_chain, verify_hash_chain_str, AuditRecord, AuditWriter,
    VerifyResult,
};
