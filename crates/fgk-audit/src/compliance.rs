use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fgk_schemas::{canonical_json_of, sha256_hex};

/// Compliance audit entry. Every throttle decision, violation, and HFT
/// detection writes one of these; `integrity_hash` covers the canonical
/// form of everything else in the entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub ts: String,
    pub event_type: String,
    /// "account_id/strategy_id" of the actor being audited.
    pub operator: String,
    /// What the action applied to (order id, account id, check name).
    pub target: String,
    pub action: String,
    pub result: String,
    pub context: Value,
    /// Which supervisory rule mandated the record (e.g. "M3", "M17").
    pub military_rule: String,
    pub sequence_id: u64,
    pub integrity_hash: String,
}

impl AuditLogEntry {
    /// SHA-256 over the canonical form of the entry with the hash field
    /// blanked. Same content always produces the same hash.
    pub fn compute_integrity_hash(&self) -> String {
        let mut clone = self.clone();
        clone.integrity_hash = String::new();
        sha256_hex(canonical_json_of(&clone).as_bytes())
    }
}

/// In-memory compliance audit log with monotonically increasing sequence
/// ids and an optional remote-backup callback. The backup is
/// fire-and-forget; its failures must be handled by the callback itself.
pub struct AuditLog {
    entries: Vec<AuditLogEntry>,
    seq: u64,
    backup: Option<Box<dyn Fn(&AuditLogEntry) + Send>>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            seq: 0,
            backup: None,
        }
    }

    pub fn with_backup(mut self, backup: Box<dyn Fn(&AuditLogEntry) + Send>) -> Self {
        self.backup = Some(backup);
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log(
        &mut self,
        now_ts: f64,
        event_type: &str,
        operator: &str,
        target: &str,
        action: &str,
        result: &str,
        context: Value,
        military_rule: &str,
    ) -> AuditLogEntry {
        let mut entry = AuditLogEntry {
            ts: iso_ts(now_ts),
            event_type: event_type.to_string(),
            operator: operator.to_string(),
            target: target.to_string(),
            action: action.to_string(),
            result: result.to_string(),
            context,
            military_rule: military_rule.to_string(),
            sequence_id: self.seq,
            integrity_hash: String::new(),
        };
        entry.integrity_hash = entry.compute_integrity_hash();
        self.seq += 1;

        if let Some(backup) = &self.backup {
            backup(&entry);
        }

        self.entries.push(entry.clone());
        entry
    }

    /// True if the entry's integrity hash matches its content.
    pub fn verify_integrity(entry: &AuditLogEntry) -> bool {
        entry.integrity_hash == entry.compute_integrity_hash()
    }

    pub fn entries(&self) -> &[AuditLogEntry] {
        &self.entries
    }

    pub fn entries_of_type(&self, event_type: &str) -> Vec<&AuditLogEntry> {
        self.entries
            .iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn iso_ts(ts: f64) -> String {
    let secs = ts.floor() as i64;
    let nanos = ((ts - secs as f64) * 1e9) as u32;
    match DateTime::from_timestamp(secs, nanos) {
        Some(dt) => dt.to_rfc3339(),
        None => format!("invalid-ts:{ts}"),
    }
}
