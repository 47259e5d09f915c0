use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fgk_audit::AuditLog;
use fgk_schemas::{canonical_json, canonical_json_of, sha256_hex};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    Daily,
    Exception,
    Change,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportFormat {
    Json,
    Xml,
    Csv,
    Text,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Pending,
    Submitted,
    Accepted,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub strategy_id: String,
    pub order_count: u64,
    pub cancel_count: u64,
    pub trade_count: u64,
}

/// Per-account, per-trading-date aggregate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyReportContent {
    pub account_id: String,
    pub trading_date: String,
    pub total_orders: u64,
    pub total_cancels: u64,
    pub total_trades: u64,
    pub max_orders_per_sec: f64,
    pub max_cancels_per_sec: f64,
    pub is_hft: bool,
    pub strategies: Vec<StrategySummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExceptionReportContent {
    pub account_id: String,
    pub strategy_id: String,
    pub exception_type: String,
    pub description: String,
    pub impact: String,
    pub action_taken: String,
    pub resolved: bool,
    pub related_orders: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeReportContent {
    pub account_id: String,
    pub change_type: String,
    pub old_value: String,
    pub new_value: String,
    pub changed_by: String,
    pub reason: String,
}

/// One report with submission state. `content_hash` is SHA-256 over the
/// canonical-JSON content and is stable across re-exports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub report_id: String,
    pub report_type: ReportType,
    pub account_id: String,
    pub created_at: String,
    pub submitted_at: Option<String>,
    pub status: ReportStatus,
    pub status_message: String,
    pub content: Value,
    pub content_hash: String,
    pub retry_count: u32,
}

const MAX_RETRIES: u32 = 3;

/// Generates, submits, and exports regulatory reports. Submission is a
/// caller-supplied transport; failures are bounded-retried and audited.
pub struct RegulatoryReporter {
    reports: BTreeMap<String, ReportRecord>,
    audit: AuditLog,
    report_dir: Option<PathBuf>,
}

impl Default for RegulatoryReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl RegulatoryReporter {
    pub fn new() -> Self {
        Self {
            reports: BTreeMap::new(),
            audit: AuditLog::new(),
            report_dir: None,
        }
    }

    /// Reporter persisting each generated report to `<dir>/<id>.json`.
    pub fn with_report_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.report_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    pub fn get_report(&self, report_id: &str) -> Option<&ReportRecord> {
        self.reports.get(report_id)
    }

    pub fn reports_with_status(&self, status: ReportStatus) -> Vec<&ReportRecord> {
        self.reports.values().filter(|r| r.status == status).collect()
    }

    pub fn generate_daily_report(&mut self, content: &DailyReportContent, now_ts: f64) -> String {
        let account = content.account_id.clone();
        self.generate(ReportType::Daily, &account, canonical_value(content), now_ts)
    }

    pub fn generate_exception_report(
        &mut self,
        content: &ExceptionReportContent,
        now_ts: f64,
    ) -> String {
        let account = content.account_id.clone();
        self.generate(
            ReportType::Exception,
            &account,
            canonical_value(content),
            now_ts,
        )
    }

    pub fn generate_change_report(&mut self, content: &ChangeReportContent, now_ts: f64) -> String {
        let account = content.account_id.clone();
        self.generate(ReportType::Change, &account, canonical_value(content), now_ts)
    }

    fn generate(
        &mut self,
        report_type: ReportType,
        account_id: &str,
        content: Value,
        now_ts: f64,
    ) -> String {
        let created_at = iso_ts(now_ts);
        let content_hash = sha256_hex(canonical_json(&content).as_bytes());
        let report_id = format!(
            "RPT-{}",
            &sha256_hex(format!("{report_type:?}|{content_hash}|{created_at}").as_bytes())[..12]
                .to_uppercase()
        );

        let record = ReportRecord {
            report_id: report_id.clone(),
            report_type,
            account_id: account_id.to_string(),
            created_at,
            submitted_at: None,
            status: ReportStatus::Pending,
            status_message: String::new(),
            content,
            content_hash,
            retry_count: 0,
        };

        if let Some(dir) = &self.report_dir {
            if let Err(err) = write_report_file(dir, &record) {
                tracing::warn!(%err, report_id = %record.report_id, "report persistence failed");
            }
        }

        self.reports.insert(report_id.clone(), record);
        report_id
    }

    /// Submit one report through the transport. Failure marks the report
    /// FAILED and counts a retry; both outcomes write audit entries.
    pub fn submit_report<F>(
        &mut self,
        report_id: &str,
        transport: F,
        now_ts: f64,
    ) -> Option<ReportStatus>
    where
        F: FnOnce(&ReportRecord) -> Result<(), String>,
    {
        let record = self.reports.get_mut(report_id)?;
        match transport(record) {
            Ok(()) => {
                record.status = ReportStatus::Submitted;
                record.submitted_at = Some(iso_ts(now_ts));
                record.status_message = "submitted".to_string();
                let hash = record.content_hash.clone();
                self.audit.log(
                    now_ts,
                    "REPORT_SUBMITTED",
                    "reporter",
                    report_id,
                    "submit",
                    "SUCCESS",
                    serde_json::json!({ "content_hash": hash }),
                    "M3",
                );
                Some(ReportStatus::Submitted)
            }
            Err(reason) => {
                record.status = ReportStatus::Failed;
                record.status_message = reason.clone();
                record.retry_count += 1;
                let retries = record.retry_count;
                self.audit.log(
                    now_ts,
                    "REPORT_SUBMIT_FAILED",
                    "reporter",
                    report_id,
                    "submit",
                    "FAILED",
                    serde_json::json!({ "reason": reason, "retry_count": retries }),
                    "M3",
                );
                Some(ReportStatus::Failed)
            }
        }
    }

    /// Retry every FAILED report still under the retry budget. Returns
    /// how many submissions were attempted.
    pub fn retry_failed_reports<F>(&mut self, mut transport: F, now_ts: f64) -> usize
    where
        F: FnMut(&ReportRecord) -> Result<(), String>,
    {
        let candidates: Vec<String> = self
            .reports
            .values()
            .filter(|r| r.status == ReportStatus::Failed && r.retry_count < MAX_RETRIES)
            .map(|r| r.report_id.clone())
            .collect();

        let attempted = candidates.len();
        for report_id in candidates {
            self.submit_report(&report_id, &mut transport, now_ts);
        }
        attempted
    }

    /// Record the supervisor's verdict on a submitted report.
    pub fn mark_report(&mut self, report_id: &str, accepted: bool, message: &str, now_ts: f64) {
        if let Some(record) = self.reports.get_mut(report_id) {
            record.status = if accepted {
                ReportStatus::Accepted
            } else {
                ReportStatus::Rejected
            };
            record.status_message = message.to_string();
            self.audit.log(
                now_ts,
                "REPORT_VERDICT",
                "reporter",
                report_id,
                "verdict",
                if accepted { "ACCEPTED" } else { "REJECTED" },
                serde_json::json!({ "message": message }),
                "M3",
            );
        }
    }

    /// Export a report in one of the four supported formats.
    pub fn export_report(&self, report_id: &str, format: ReportFormat) -> Option<String> {
        let record = self.reports.get(report_id)?;
        Some(match format {
            ReportFormat::Json => canonical_json_of(record),
            ReportFormat::Xml => export_xml(record),
            ReportFormat::Csv => export_csv(record),
            ReportFormat::Text => export_text(record),
        })
    }
}

fn canonical_value<T: Serialize>(content: &T) -> Value {
    serde_json::to_value(content).unwrap_or(Value::Null)
}

fn write_report_file(dir: &Path, record: &ReportRecord) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("create_dir_all {:?}", dir))?;
    let path = dir.join(format!("{}.json", record.report_id));
    let body = serde_json::to_string_pretty(record).context("serialize report")?;
    std::fs::write(&path, body).with_context(|| format!("write report {:?}", path))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Export formats
// ---------------------------------------------------------------------------

/// Element-per-field XML; lists become `<k><item>..</item></k>`.
fn export_xml(record: &ReportRecord) -> String {
    let value = canonical_value(record);
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    value_to_xml("report", &sort_value(&value), &mut out);
    out.push('\n');
    out
}

fn value_to_xml(tag: &str, value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('<');
            out.push_str(tag);
            out.push('>');
            for (key, child) in map {
                value_to_xml(key, child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Value::Array(items) => {
            out.push('<');
            out.push_str(tag);
            out.push('>');
            for item in items {
                value_to_xml("item", item, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Value::Null => {
            out.push('<');
            out.push_str(tag);
            out.push_str("/>");
        }
        Value::String(s) => {
            out.push('<');
            out.push_str(tag);
            out.push('>');
            out.push_str(&xml_escape(s));
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        other => {
            out.push('<');
            out.push_str(tag);
            out.push('>');
            out.push_str(&other.to_string());
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_value(&map[&key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

/// Flattened CSV: nested keys join with `_`, list fields JSON-encode into
/// a single cell. One header row, one data row.
fn export_csv(record: &ReportRecord) -> String {
    let value = sort_value(&canonical_value(record));
    let mut flat = BTreeMap::new();
    flatten_value("", &value, &mut flat);

    let mut writer = csv::Writer::from_writer(Vec::new());
    let headers: Vec<&String> = flat.keys().collect();
    let cells: Vec<&String> = flat.values().collect();
    // Writing the rows into an in-memory buffer cannot fail.
    let _ = writer.write_record(headers.iter().map(|h| h.as_str()));
    let _ = writer.write_record(cells.iter().map(|c| c.as_str()));
    let bytes = writer.into_inner().unwrap_or_default();
    String::from_utf8(bytes).unwrap_or_default()
}

fn flatten_value(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let joined = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}_{key}")
                };
                flatten_value(&joined, child, out);
            }
        }
        Value::Array(_) => {
            out.insert(
                prefix.to_string(),
                serde_json::to_string(value).unwrap_or_default(),
            );
        }
        Value::Null => {
            out.insert(prefix.to_string(), String::new());
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// Human-readable report with a boxed header.
fn export_text(record: &ReportRecord) -> String {
    let title = match record.report_type {
        ReportType::Daily => "DAILY REGULATORY REPORT",
        ReportType::Exception => "EXCEPTION REGULATORY REPORT",
        ReportType::Change => "CHANGE REGULATORY REPORT",
    };
    let width = title.len() + 6;
    let border = "=".repeat(width);

    let mut out = String::new();
    out.push_str(&format!("+{border}+\n"));
    out.push_str(&format!("|   {title}   |\n"));
    out.push_str(&format!("+{border}+\n"));
    out.push_str(&format!("report_id: {}\n", record.report_id));
    out.push_str(&format!("account_id: {}\n", record.account_id));
    out.push_str(&format!("created_at: {}\n", record.created_at));
    out.push_str(&format!("status: {:?}\n", record.status));
    out.push_str(&format!("content_hash: {}\n", record.content_hash));
    out.push_str("content:\n");

    let mut flat = BTreeMap::new();
    flatten_value("", &sort_value(&record.content), &mut flat);
    for (key, cell) in flat {
        out.push_str(&format!("  {key}: {cell}\n"));
    }
    out
}

fn iso_ts(ts: f64) -> String {
    let secs = ts.floor() as i64;
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.to_rfc3339(),
        None => format!("invalid-ts:{ts}"),
    }
}
