use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{OrderEvent, OrderEventType};

/// Recognized programmatic trading patterns.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingPattern {
    Unknown,
    MarketMaking,
    Momentum,
    Arbitrage,
    Layering,
    Scalping,
    Normal,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BehaviorRiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// One pattern hypothesis with its supporting evidence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternIndicator {
    pub pattern: TradingPattern,
    pub confidence: f64,
    pub evidence: String,
}

/// Behavioural profile of one account over an order-flow sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub account_id: String,
    pub primary_pattern: TradingPattern,
    pub indicators: Vec<PatternIndicator>,
    pub risk_level: BehaviorRiskLevel,
    pub order_frequency: f64,
    pub cancel_ratio: f64,
    pub buy_sell_ratio: f64,
    pub symbol_diversity: usize,
    pub risk_factors: Vec<String>,
    pub military_rule: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Below this many events the sample is too thin to profile.
    pub min_orders_for_analysis: usize,
    pub high_freq_threshold: f64,
    pub high_cancel_ratio: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_orders_for_analysis: 10,
            high_freq_threshold: 100.0,
            high_cancel_ratio: 0.4,
        }
    }
}

/// Offline pattern analyzer supervisors run over an account's order flow.
/// Produces a profile, never a trading decision.
#[derive(Debug, Default)]
pub struct PatternAnalyzer {
    config: AnalyzerConfig,
}

impl PatternAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn analyze_account(&self, account_id: &str, flows: &[OrderEvent]) -> BehaviorProfile {
        if flows.len() < self.config.min_orders_for_analysis {
            return BehaviorProfile {
                account_id: account_id.to_string(),
                primary_pattern: TradingPattern::Unknown,
                indicators: Vec::new(),
                risk_level: BehaviorRiskLevel::Low,
                order_frequency: 0.0,
                cancel_ratio: 0.0,
                buy_sell_ratio: 1.0,
                symbol_diversity: 0,
                risk_factors: vec!["sample too small for analysis".to_string()],
                military_rule: "M17".to_string(),
            };
        }

        let total = flows.len();
        let cancels = flows
            .iter()
            .filter(|e| e.event_type == OrderEventType::Cancel)
            .count();
        let symbols: BTreeSet<&str> = flows.iter().map(|e| e.symbol.as_str()).collect();

        let first_ts = flows.iter().map(|e| e.ts).fold(f64::INFINITY, f64::min);
        let last_ts = flows.iter().map(|e| e.ts).fold(f64::NEG_INFINITY, f64::max);
        let span = (last_ts - first_ts).max(1.0);

        let order_frequency = total as f64 / span;
        let cancel_ratio = cancels as f64 / total as f64;
        // Submit/cancel flows carry no side; approximate direction balance
        // from strategy-tagged order ids is out of scope, so the ratio
        // degrades to neutral when unavailable.
        let buy_sell_ratio = 1.0;

        let indicators = self.identify_patterns(order_frequency, cancel_ratio, symbols.len());
        let primary = indicators
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|i| i.pattern)
            .unwrap_or(TradingPattern::Unknown);
        let (risk_level, risk_factors) =
            self.assess_risk(order_frequency, cancel_ratio, &indicators);

        BehaviorProfile {
            account_id: account_id.to_string(),
            primary_pattern: primary,
            indicators,
            risk_level,
            order_frequency,
            cancel_ratio,
            buy_sell_ratio,
            symbol_diversity: symbols.len(),
            risk_factors,
            military_rule: "M17".to_string(),
        }
    }

    fn identify_patterns(
        &self,
        order_frequency: f64,
        cancel_ratio: f64,
        symbol_count: usize,
    ) -> Vec<PatternIndicator> {
        let mut indicators = Vec::new();

        if order_frequency > self.config.high_freq_threshold && cancel_ratio < 0.3 {
            indicators.push(PatternIndicator {
                pattern: TradingPattern::Scalping,
                confidence: 0.8,
                evidence: format!("{order_frequency:.1} orders/s with low cancel ratio"),
            });
        }

        if cancel_ratio > self.config.high_cancel_ratio {
            indicators.push(PatternIndicator {
                pattern: TradingPattern::Layering,
                confidence: if cancel_ratio > 0.6 { 0.7 } else { 0.5 },
                evidence: format!("cancel ratio {:.1}% suggests layered quoting", cancel_ratio * 100.0),
            });
        }

        if symbol_count >= 3 {
            indicators.push(PatternIndicator {
                pattern: TradingPattern::Arbitrage,
                confidence: 0.5,
                evidence: format!("{symbol_count} instruments traded in the sample"),
            });
        }

        if indicators.is_empty() {
            indicators.push(PatternIndicator {
                pattern: TradingPattern::Normal,
                confidence: 0.9,
                evidence: "no high-frequency signature detected".to_string(),
            });
        }

        indicators
    }

    fn assess_risk(
        &self,
        order_frequency: f64,
        cancel_ratio: f64,
        indicators: &[PatternIndicator],
    ) -> (BehaviorRiskLevel, Vec<String>) {
        let mut factors = Vec::new();
        let mut score = 0u32;

        if order_frequency > self.config.high_freq_threshold {
            factors.push(format!("order frequency {order_frequency:.1}/s"));
            score += 2;
        }
        if cancel_ratio > self.config.high_cancel_ratio {
            factors.push(format!("cancel ratio {:.1}%", cancel_ratio * 100.0));
            score += 2;
        }
        if indicators.iter().any(|i| i.pattern == TradingPattern::Layering) {
            factors.push("layering signature".to_string());
            score += 3;
        }

        let level = if score >= 5 {
            BehaviorRiskLevel::Critical
        } else if score >= 3 {
            BehaviorRiskLevel::High
        } else if score >= 1 {
            BehaviorRiskLevel::Medium
        } else {
            BehaviorRiskLevel::Low
        };
        (level, factors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(event_type: OrderEventType, symbol: &str, ts: f64) -> OrderEvent {
        OrderEvent {
            account_id: "acc_001".to_string(),
            strategy_id: "strat_001".to_string(),
            order_id: format!("o-{ts}"),
            event_type,
            symbol: symbol.to_string(),
            ts,
            audit_recorded_ts: None,
        }
    }

    #[test]
    fn thin_sample_is_unknown() {
        let analyzer = PatternAnalyzer::default();
        let flows = vec![flow(OrderEventType::Submit, "rb2501", 1.0)];
        let profile = analyzer.analyze_account("acc_001", &flows);
        assert_eq!(profile.primary_pattern, TradingPattern::Unknown);
        assert_eq!(profile.risk_level, BehaviorRiskLevel::Low);
    }

    #[test]
    fn heavy_cancelling_profiles_as_layering() {
        let analyzer = PatternAnalyzer::default();
        let mut flows = Vec::new();
        for i in 0..20 {
            let kind = if i % 3 == 0 {
                OrderEventType::Submit
            } else {
                OrderEventType::Cancel
            };
            flows.push(flow(kind, "rb2501", 100.0 + i as f64));
        }
        let profile = analyzer.analyze_account("acc_001", &flows);
        assert_eq!(profile.primary_pattern, TradingPattern::Layering);
        assert!(profile.risk_level >= BehaviorRiskLevel::Medium);
        assert!(profile.cancel_ratio > 0.6);
    }

    #[test]
    fn quiet_flow_profiles_as_normal() {
        let analyzer = PatternAnalyzer::default();
        let flows: Vec<OrderEvent> = (0..15)
            .map(|i| flow(OrderEventType::Submit, "rb2501", 100.0 + i as f64 * 10.0))
            .collect();
        let profile = analyzer.analyze_account("acc_001", &flows);
        assert_eq!(profile.primary_pattern, TradingPattern::Normal);
        assert_eq!(profile.risk_level, BehaviorRiskLevel::Low);
        assert!(profile.risk_factors.is_empty());
    }

    #[test]
    fn multi_symbol_flow_suggests_arbitrage() {
        let analyzer = PatternAnalyzer::default();
        let symbols = ["rb2501", "hc2501", "i2501", "j2501"];
        let flows: Vec<OrderEvent> = (0..20)
            .map(|i| {
                flow(
                    OrderEventType::Submit,
                    symbols[i % symbols.len()],
                    100.0 + i as f64 * 5.0,
                )
            })
            .collect();
        let profile = analyzer.analyze_account("acc_001", &flows);
        assert!(profile
            .indicators
            .iter()
            .any(|i| i.pattern == TradingPattern::Arbitrage));
        assert_eq!(profile.symbol_diversity, 4);
    }
}
