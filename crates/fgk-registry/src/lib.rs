//! fgk-registry
//!
//! Programmatic-trading registration and regulatory reporting:
//! - [`RegistrationRegistry`] — immutable account/strategy registration
//!   records with an append-only change history and atomic JSON-file
//!   persistence
//! - [`RegulatoryReporter`] — daily / exception / change reports with
//!   deterministic content hashes, bounded submission retry, and JSON /
//!   XML / CSV / TEXT export
//! - [`ComplianceValidator`] — offline threshold validation of an
//!   account's metrics before a report goes out

mod registry;
mod reporter;
mod validator;

pub use registry::{
    AccountType, RegistrationChange, RegistrationInfo, RegistrationRegistry, RegistrationStatus,
    RegistryError, StrategyRegistration, StrategyType,
};
pub use reporter::{
    ChangeReportContent, DailyReportContent, ExceptionReportContent, RegulatoryReporter,
    ReportFormat, ReportRecord, ReportStatus, ReportType, StrategySummary,
};
pub use validator::{
    ComplianceMetrics, ComplianceValidator, ValidationResult, ValidatorConfig, ViolationDetail,
    ViolationSeverity,
};
