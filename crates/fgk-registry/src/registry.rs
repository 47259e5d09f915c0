use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use fgk_schemas::sha256_hex;

/// Serializes registry file writes within the process. Writes are
/// write-temp-then-rename so a crash can never leave a torn file.
static PERSIST_LOCK: Mutex<()> = Mutex::new(());

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
    Expired,
    Revoked,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "PENDING",
            RegistrationStatus::Approved => "APPROVED",
            RegistrationStatus::Rejected => "REJECTED",
            RegistrationStatus::Suspended => "SUSPENDED",
            RegistrationStatus::Expired => "EXPIRED",
            RegistrationStatus::Revoked => "REVOKED",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Programmatic,
    Quantitative,
    HighFrequency,
    Algorithmic,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyType {
    Trend,
    MeanReversion,
    Arbitrage,
    MarketMaking,
    Statistical,
    MachineLearning,
    Other,
}

/// One immutable account registration version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub registration_id: String,
    pub account_id: String,
    pub account_type: AccountType,
    pub responsible_person: String,
    pub contact_info: String,
    pub registered_at: String,
    pub status: RegistrationStatus,
    pub status_reason: String,
    pub approved_at: Option<String>,
}

/// One immutable strategy registration, keyed `account_id:strategy_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyRegistration {
    pub registration_id: String,
    pub account_id: String,
    pub strategy_id: String,
    pub strategy_type: StrategyType,
    pub strategy_name: String,
    pub description: String,
    pub version: String,
    pub code_hash: String,
    pub registered_at: String,
}

impl StrategyRegistration {
    pub fn full_id(&self) -> String {
        format!("{}:{}", self.account_id, self.strategy_id)
    }
}

/// Append-only audit row for a registration state change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrationChange {
    pub ts: String,
    pub target: String,
    pub old_value: String,
    pub new_value: String,
    pub changed_by: String,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("account {0} is already registered")]
    AlreadyRegistered(String),
    #[error("account {0} is not registered")]
    UnknownAccount(String),
    #[error("account {account_id} has status {status}, strategies cannot be registered")]
    AccountNotEligible {
        account_id: String,
        status: &'static str,
    },
    #[error("strategy {0} is already registered")]
    StrategyAlreadyRegistered(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedRegistry {
    registrations: BTreeMap<String, RegistrationInfo>,
    strategies: BTreeMap<String, StrategyRegistration>,
    account_strategies: BTreeMap<String, Vec<String>>,
    version: u64,
}

/// In-memory registration store; the source of truth within a process.
/// Mutations produce new immutable versions plus a change row; the file
/// sink is best-effort and never fails a mutation.
pub struct RegistrationRegistry {
    registrations: BTreeMap<String, RegistrationInfo>,
    strategies: BTreeMap<String, StrategyRegistration>,
    account_strategies: BTreeMap<String, Vec<String>>,
    changes: Vec<RegistrationChange>,
    version: u64,
    persist_path: Option<PathBuf>,
}

impl Default for RegistrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationRegistry {
    pub fn new() -> Self {
        Self {
            registrations: BTreeMap::new(),
            strategies: BTreeMap::new(),
            account_strategies: BTreeMap::new(),
            changes: Vec::new(),
            version: 0,
            persist_path: None,
        }
    }

    /// Registry backed by a JSON file; loads existing state when present.
    pub fn with_persistence(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut registry = Self::new();
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read registry file {:?}", path))?;
            let persisted: PersistedRegistry =
                serde_json::from_str(&raw).context("parse registry file")?;
            registry.registrations = persisted.registrations;
            registry.strategies = persisted.strategies;
            registry.account_strategies = persisted.account_strategies;
            registry.version = persisted.version;
        }
        registry.persist_path = Some(path);
        Ok(registry)
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    pub fn register_account(
        &mut self,
        account_id: &str,
        account_type: AccountType,
        responsible_person: &str,
        contact_info: &str,
        now_ts: f64,
    ) -> Result<RegistrationInfo, RegistryError> {
        if self.registrations.contains_key(account_id) {
            return Err(RegistryError::AlreadyRegistered(account_id.to_string()));
        }

        let registered_at = iso_ts(now_ts);
        let registration_id = format!(
            "REG-{}",
            &sha256_hex(format!("{account_id}|{registered_at}").as_bytes())[..12].to_uppercase()
        );
        let info = RegistrationInfo {
            registration_id,
            account_id: account_id.to_string(),
            account_type,
            responsible_person: responsible_person.to_string(),
            contact_info: contact_info.to_string(),
            registered_at: registered_at.clone(),
            status: RegistrationStatus::Pending,
            status_reason: String::new(),
            approved_at: None,
        };
        self.registrations.insert(account_id.to_string(), info.clone());
        self.push_change(
            &registered_at,
            account_id,
            "",
            RegistrationStatus::Pending.as_str(),
            "system",
            "account registered",
        );
        self.bump_and_persist();
        Ok(info)
    }

    pub fn register_strategy(
        &mut self,
        account_id: &str,
        strategy_id: &str,
        strategy_type: StrategyType,
        strategy_name: &str,
        version: &str,
        code_hash: &str,
        now_ts: f64,
    ) -> Result<StrategyRegistration, RegistryError> {
        let account = self
            .registrations
            .get(account_id)
            .ok_or_else(|| RegistryError::UnknownAccount(account_id.to_string()))?;
        if !matches!(
            account.status,
            RegistrationStatus::Approved | RegistrationStatus::Pending
        ) {
            return Err(RegistryError::AccountNotEligible {
                account_id: account_id.to_string(),
                status: account.status.as_str(),
            });
        }

        let full_id = format!("{account_id}:{strategy_id}");
        if self.strategies.contains_key(&full_id) {
            return Err(RegistryError::StrategyAlreadyRegistered(full_id));
        }

        let registered_at = iso_ts(now_ts);
        let registration_id = format!(
            "STRAT-{}",
            &sha256_hex(format!("{full_id}|{registered_at}").as_bytes())[..12].to_uppercase()
        );
        let registration = StrategyRegistration {
            registration_id,
            account_id: account_id.to_string(),
            strategy_id: strategy_id.to_string(),
            strategy_type,
            strategy_name: strategy_name.to_string(),
            description: String::new(),
            version: version.to_string(),
            code_hash: code_hash.to_string(),
            registered_at,
        };
        self.strategies.insert(full_id.clone(), registration.clone());
        self.account_strategies
            .entry(account_id.to_string())
            .or_default()
            .push(strategy_id.to_string());
        self.bump_and_persist();
        Ok(registration)
    }

    /// Status transition: replaces the record with a new immutable
    /// version and appends one change row to the history.
    pub fn update_registration_status(
        &mut self,
        account_id: &str,
        new_status: RegistrationStatus,
        reason: &str,
        changed_by: &str,
        now_ts: f64,
    ) -> Result<RegistrationInfo, RegistryError> {
        let current = self
            .registrations
            .get(account_id)
            .ok_or_else(|| RegistryError::UnknownAccount(account_id.to_string()))?
            .clone();

        let ts = iso_ts(now_ts);
        let mut updated = current.clone();
        updated.status = new_status;
        updated.status_reason = reason.to_string();
        if new_status == RegistrationStatus::Approved {
            updated.approved_at = Some(ts.clone());
        }

        self.push_change(
            &ts,
            account_id,
            current.status.as_str(),
            new_status.as_str(),
            changed_by,
            reason,
        );
        self.registrations
            .insert(account_id.to_string(), updated.clone());
        self.bump_and_persist();
        Ok(updated)
    }

    pub fn get_registration(&self, account_id: &str) -> Option<&RegistrationInfo> {
        self.registrations.get(account_id)
    }

    pub fn get_strategy(&self, account_id: &str, strategy_id: &str) -> Option<&StrategyRegistration> {
        self.strategies.get(&format!("{account_id}:{strategy_id}"))
    }

    pub fn is_account_registered(&self, account_id: &str) -> bool {
        self.registrations.contains_key(account_id)
    }

    /// Approved implies registered.
    pub fn is_account_approved(&self, account_id: &str) -> bool {
        self.registrations
            .get(account_id)
            .map(|r| r.status == RegistrationStatus::Approved)
            .unwrap_or(false)
    }

    pub fn strategies_of(&self, account_id: &str) -> Vec<&StrategyRegistration> {
        self.account_strategies
            .get(account_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|sid| self.strategies.get(&format!("{account_id}:{sid}")))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Append-only change history, oldest first.
    pub fn changes(&self) -> &[RegistrationChange] {
        &self.changes
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn push_change(
        &mut self,
        ts: &str,
        target: &str,
        old_value: &str,
        new_value: &str,
        changed_by: &str,
        reason: &str,
    ) {
        self.changes.push(RegistrationChange {
            ts: ts.to_string(),
            target: target.to_string(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
            changed_by: changed_by.to_string(),
            reason: reason.to_string(),
        });
    }

    fn bump_and_persist(&mut self) {
        self.version += 1;
        if let Err(err) = self.persist() {
            tracing::warn!(%err, "registry persistence failed");
        }
    }

    /// Atomic write of the persisted form. A no-op without a backing file.
    pub fn persist(&self) -> anyhow::Result<()> {
        let path = match &self.persist_path {
            Some(path) => path,
            None => return Ok(()),
        };
        let _guard = PERSIST_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let persisted = PersistedRegistry {
            registrations: self.registrations.clone(),
            strategies: self.strategies.clone(),
            account_strategies: self.account_strategies.clone(),
            version: self.version,
        };
        let body = serde_json::to_string_pretty(&persisted).context("serialize registry")?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).with_context(|| format!("create_dir_all {:?}", dir))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).context("create temp registry file")?;
        tmp.write_all(body.as_bytes()).context("write temp registry file")?;
        tmp.persist(path)
            .with_context(|| format!("rename temp registry file to {:?}", path))?;
        Ok(())
    }
}

fn iso_ts(ts: f64) -> String {
    let secs = ts.floor() as i64;
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.to_rfc3339(),
        None => format!("invalid-ts:{ts}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approved_implies_registered() {
        let mut reg = RegistrationRegistry::new();
        reg.register_account("acc_001", AccountType::Programmatic, "ops", "", 1_000.0)
            .unwrap();
        assert!(reg.is_account_registered("acc_001"));
        assert!(!reg.is_account_approved("acc_001"));

        reg.update_registration_status(
            "acc_001",
            RegistrationStatus::Approved,
            "checks passed",
            "supervisor",
            1_100.0,
        )
        .unwrap();
        assert!(reg.is_account_approved("acc_001"));
        assert!(reg.is_account_registered("acc_001"));
    }

    #[test]
    fn approve_revoke_approve_appends_history() {
        let mut reg = RegistrationRegistry::new();
        reg.register_account("acc_001", AccountType::Quantitative, "ops", "", 1_000.0)
            .unwrap();
        let baseline_changes = reg.changes().len();

        reg.update_registration_status(
            "acc_001",
            RegistrationStatus::Approved,
            "ok",
            "supervisor",
            1_100.0,
        )
        .unwrap();
        reg.update_registration_status(
            "acc_001",
            RegistrationStatus::Revoked,
            "violation",
            "supervisor",
            1_200.0,
        )
        .unwrap();
        reg.update_registration_status(
            "acc_001",
            RegistrationStatus::Approved,
            "reinstated",
            "supervisor",
            1_300.0,
        )
        .unwrap();

        assert_eq!(reg.changes().len(), baseline_changes + 3);
        assert!(reg.is_account_approved("acc_001"));
        // History is append-only: the middle row still records the
        // revocation.
        let row = &reg.changes()[baseline_changes + 1];
        assert_eq!(row.old_value, "APPROVED");
        assert_eq!(row.new_value, "REVOKED");
    }

    #[test]
    fn suspended_account_cannot_register_strategies() {
        let mut reg = RegistrationRegistry::new();
        reg.register_account("acc_001", AccountType::Programmatic, "ops", "", 1_000.0)
            .unwrap();
        reg.update_registration_status(
            "acc_001",
            RegistrationStatus::Suspended,
            "risk",
            "supervisor",
            1_100.0,
        )
        .unwrap();

        let err = reg
            .register_strategy(
                "acc_001",
                "strat_001",
                StrategyType::Trend,
                "trend v1",
                "1.0.0",
                "",
                1_200.0,
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::AccountNotEligible { .. }));
    }

    #[test]
    fn strategies_key_on_account_and_id() {
        let mut reg = RegistrationRegistry::new();
        reg.register_account("acc_001", AccountType::Programmatic, "ops", "", 1_000.0)
            .unwrap();
        reg.register_strategy(
            "acc_001",
            "strat_001",
            StrategyType::Arbitrage,
            "arb v1",
            "1.0.0",
            "abc123",
            1_100.0,
        )
        .unwrap();

        assert_eq!(reg.strategies_of("acc_001").len(), 1);
        assert!(reg.get_strategy("acc_001", "strat_001").is_some());
        assert!(reg.get_strategy("acc_002", "strat_001").is_none());
    }
}
