use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fgk_schemas::{canonical_json_of, sha256_hex};

/// One persisted audit record. Field order is the wire order supervisors
/// expect; hashing uses the canonical (sorted-key) form so declaration
/// order never affects the chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub ts: f64,
    pub correlation_id: Option<String>,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_hash: Option<String>,
    pub sequence_id: u64,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Append-only audit writer. Writes JSON Lines (one record per line).
/// Optional hash chain: h_i = SHA256(canonical(record_i with hash_prev =
/// h_{i-1}, hash_self = None)); any single-record tampering invalidates
/// every subsequent hash.
pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
}

impl AuditWriter {
    /// Creates the audit writer and ensures parent dirs exist.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }
        Ok(Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        })
    }

    /// Restore chain state when resuming an existing log after restart.
    /// `seq` is the number of records already written.
    pub fn resume(&mut self, last_hash: Option<String>, seq: u64) {
        self.last_hash = last_hash;
        self.seq = seq;
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Append one record; returns the record as written (hashes filled in).
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        ts: f64,
        correlation_id: Option<&str>,
        event_type: &str,
        account_id: Option<&str>,
        strategy_id: Option<&str>,
        symbol: Option<&str>,
        payload: Value,
        snapshot_hash: Option<&str>,
    ) -> Result<AuditRecord> {
        let mut record = AuditRecord {
            ts,
            correlation_id: correlation_id.map(str::to_string),
            event_type: event_type.to_string(),
            account_id: account_id.map(str::to_string),
            strategy_id: strategy_id.map(str::to_string),
            symbol: symbol.map(str::to_string),
            payload,
            snapshot_hash: snapshot_hash.map(str::to_string),
            sequence_id: self.seq,
            hash_prev: None,
            hash_self: None,
        };
        self.seq += 1;

        if self.hash_chain {
            record.hash_prev = self.last_hash.clone();
            let hash = compute_record_hash(&record);
            record.hash_self = Some(hash.clone());
            self.last_hash = Some(hash);
        }

        let line = serde_json::to_string(&record).context("serialize audit record failed")?;
        append_line(&self.path, &line)?;

        Ok(record)
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes()).context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Chain hash of a record, computed over the canonical form WITHOUT
/// hash_self (to avoid self-reference).
pub fn compute_record_hash(record: &AuditRecord) -> String {
    let mut clone = record.clone();
    clone.hash_self = None;
    sha256_hex(canonical_json_of(&clone).as_bytes())
}

/// Result of hash chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// The entire chain is valid.
    Valid { lines: usize },
    /// The chain is broken at the given 1-based line.
    Broken { line: usize, reason: String },
}

/// Verify the hash chain integrity of an audit log file.
pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Verify the hash chain integrity of JSONL content held in memory.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: AuditRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit record at line {}", i + 1))?;
        line_count += 1;

        if record.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, record.hash_prev
                ),
            });
        }

        if let Some(ref claimed) = record.hash_self {
            let recomputed = compute_record_hash(&record);
            if *claimed != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!(
                        "hash_self mismatch: claimed {}, recomputed {}",
                        claimed, recomputed
                    ),
                });
            }
        }

        prev_hash = record.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: line_count })
}
