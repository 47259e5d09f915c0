//! Report generation, deterministic hashing, export formats, and the
//! bounded retry loop.

use fgk_registry::{
    DailyReportContent, ExceptionReportContent, RegulatoryReporter, ReportFormat, ReportStatus,
    StrategySummary,
};

fn daily_content() -> DailyReportContent {
    DailyReportContent {
        account_id: "acc_001".to_string(),
        trading_date: "20250616".to_string(),
        total_orders: 1200,
        total_cancels: 300,
        total_trades: 650,
        max_orders_per_sec: 14.0,
        max_cancels_per_sec: 6.0,
        is_hft: false,
        strategies: vec![StrategySummary {
            strategy_id: "strat_001".to_string(),
            order_count: 1200,
            cancel_count: 300,
            trade_count: 650,
        }],
    }
}

#[test]
fn content_hash_is_deterministic_across_reexports() {
    let mut reporter = RegulatoryReporter::new();
    let id = reporter.generate_daily_report(&daily_content(), 1_750_039_200.0);

    let record = reporter.get_report(&id).unwrap().clone();
    let json_a = reporter.export_report(&id, ReportFormat::Json).unwrap();
    let json_b = reporter.export_report(&id, ReportFormat::Json).unwrap();
    assert_eq!(json_a, json_b);

    // Same content generated again carries the same content hash.
    let mut other = RegulatoryReporter::new();
    let id2 = other.generate_daily_report(&daily_content(), 1_750_039_999.0);
    assert_eq!(
        record.content_hash,
        other.get_report(&id2).unwrap().content_hash
    );
}

#[test]
fn canonical_json_roundtrips() {
    let mut reporter = RegulatoryReporter::new();
    let id = reporter.generate_daily_report(&daily_content(), 1_750_039_200.0);
    let json = reporter.export_report(&id, ReportFormat::Json).unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(fgk_schemas::canonical_json(&parsed), json);
}

#[test]
fn xml_export_uses_item_elements_for_lists() {
    let mut reporter = RegulatoryReporter::new();
    let id = reporter.generate_daily_report(&daily_content(), 1_750_039_200.0);
    let xml = reporter.export_report(&id, ReportFormat::Xml).unwrap();

    assert!(xml.starts_with("<?xml version=\"1.0\""));
    assert!(xml.contains("<report>"));
    assert!(xml.contains("<strategies><item>"));
    assert!(xml.contains("<strategy_id>strat_001</strategy_id>"));
    assert!(xml.contains("</report>"));
}

#[test]
fn csv_export_flattens_with_underscores_and_json_lists() {
    let mut reporter = RegulatoryReporter::new();
    let id = reporter.generate_daily_report(&daily_content(), 1_750_039_200.0);
    let csv = reporter.export_report(&id, ReportFormat::Csv).unwrap();

    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    let row = lines.next().unwrap();
    assert!(header.contains("content_account_id"));
    assert!(header.contains("content_total_orders"));
    // The list field is one JSON-encoded cell.
    assert!(row.contains("strategy_id"));
    assert_eq!(lines.next(), None);
}

#[test]
fn text_export_has_boxed_header() {
    let mut reporter = RegulatoryReporter::new();
    let id = reporter.generate_daily_report(&daily_content(), 1_750_039_200.0);
    let text = reporter.export_report(&id, ReportFormat::Text).unwrap();

    assert!(text.starts_with("+===="));
    assert!(text.contains("DAILY REGULATORY REPORT"));
    assert!(text.contains("content_hash: "));
}

#[test]
fn failed_submissions_retry_at_most_three_times() {
    let mut reporter = RegulatoryReporter::new();
    let content = ExceptionReportContent {
        account_id: "acc_001".to_string(),
        strategy_id: "strat_001".to_string(),
        exception_type: "ORDER_REJECT_STORM".to_string(),
        description: "burst of rejects".to_string(),
        impact: "orders suppressed".to_string(),
        action_taken: "throttled".to_string(),
        resolved: false,
        related_orders: vec!["o-1".to_string(), "o-2".to_string()],
    };
    let id = reporter.generate_exception_report(&content, 1_000.0);

    let status = reporter
        .submit_report(&id, |_| Err("gateway down".to_string()), 1_001.0)
        .unwrap();
    assert_eq!(status, ReportStatus::Failed);

    // Two failing retries exhaust the budget (retry_count reaches 3)...
    let expected = [1usize, 1, 0];
    for (i, want) in expected.iter().enumerate() {
        let attempted =
            reporter.retry_failed_reports(|_| Err("gateway down".to_string()), 1_002.0 + i as f64);
        assert_eq!(attempted, *want, "retry round {i}");
    }
    // ...after which even a healthy transport is never consulted.
    let attempted = reporter.retry_failed_reports(|_| Ok(()), 1_010.0);
    assert_eq!(attempted, 0);
    assert_eq!(
        reporter.get_report(&id).unwrap().status,
        ReportStatus::Failed
    );

    // Audit captured the initial failure and each retry.
    assert_eq!(
        reporter.audit().entries_of_type("REPORT_SUBMIT_FAILED").len(),
        3
    );
}

#[test]
fn successful_submit_then_verdict() {
    let mut reporter = RegulatoryReporter::new();
    let id = reporter.generate_daily_report(&daily_content(), 1_000.0);

    let status = reporter.submit_report(&id, |_| Ok(()), 1_001.0).unwrap();
    assert_eq!(status, ReportStatus::Submitted);

    reporter.mark_report(&id, true, "accepted by CFFEX gateway", 1_002.0);
    assert_eq!(
        reporter.get_report(&id).unwrap().status,
        ReportStatus::Accepted
    );
    assert_eq!(reporter.audit().entries_of_type("REPORT_SUBMITTED").len(), 1);
}
