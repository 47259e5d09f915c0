use serde::{Deserialize, Serialize};

/// Training/validation history the evaluator scores. Regime labels come
/// from the set {bull, bear, sideways, high_vol, low_vol}; drawdowns are
/// negative fractions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub strategy_id: String,
    pub daily_returns: Vec<f64>,
    pub daily_signals: Vec<f64>,
    pub market_regimes: Vec<String>,
    pub drawdowns: Vec<f64>,
    pub trade_count: u64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub calmar_ratio: f64,
}

impl TrainingHistory {
    pub fn training_days(&self) -> usize {
        self.daily_returns.len()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaturityLevel {
    Embryonic,
    Developing,
    Growing,
    Maturing,
    Mature,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaturityScore {
    pub dimension: String,
    pub score: f64,
    pub weight: f64,
    pub reason: String,
}

impl MaturityScore {
    pub fn weighted_score(&self) -> f64 {
        self.score * self.weight
    }

    pub fn is_passing(&self) -> bool {
        self.score >= DIMENSION_THRESHOLD
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaturityReport {
    pub strategy_id: String,
    pub dimension_scores: Vec<MaturityScore>,
    pub total_score: f64,
    pub level: MaturityLevel,
    pub is_mature: bool,
    pub can_activate: bool,
    pub blocking_issues: Vec<String>,
}

const WEIGHT_RETURN_STABILITY: f64 = 0.25;
const WEIGHT_RISK_CONTROL: f64 = 0.25;
const WEIGHT_MARKET_ADAPTABILITY: f64 = 0.20;
const WEIGHT_TRAINING_SUFFICIENCY: f64 = 0.20;
const WEIGHT_CONSISTENCY: f64 = 0.10;

const ACTIVATION_THRESHOLD: f64 = 0.80;
const DIMENSION_THRESHOLD: f64 = 0.60;
const MIN_TRAINING_DAYS: usize = 90;

const EXPECTED_REGIMES: [&str; 5] = ["bull", "bear", "sideways", "high_vol", "low_vol"];

/// Five-dimension maturity score. Conservative by construction: any
/// weak dimension blocks activation regardless of the total.
#[derive(Debug, Default)]
pub struct MaturityEvaluator;

impl MaturityEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, history: &TrainingHistory) -> MaturityReport {
        let scores = vec![
            self.return_stability(history),
            self.risk_control(history),
            self.market_adaptability(history),
            self.training_sufficiency(history),
            self.consistency(history),
        ];

        let total_score: f64 = scores.iter().map(MaturityScore::weighted_score).sum();
        let total_score = total_score.clamp(0.0, 1.0);

        let mut blocking_issues = Vec::new();
        if total_score < ACTIVATION_THRESHOLD {
            blocking_issues.push(format!(
                "total maturity {:.2} below the {:.2} activation threshold",
                total_score, ACTIVATION_THRESHOLD
            ));
        }
        for score in &scores {
            if !score.is_passing() {
                blocking_issues.push(format!(
                    "{} score {:.2} below the {:.2} dimension threshold",
                    score.dimension, score.score, DIMENSION_THRESHOLD
                ));
            }
        }
        if history.training_days() < MIN_TRAINING_DAYS {
            blocking_issues.push(format!(
                "{} training days below the {MIN_TRAINING_DAYS}-day minimum",
                history.training_days()
            ));
        }

        let is_mature = total_score >= ACTIVATION_THRESHOLD
            && scores.iter().all(MaturityScore::is_passing)
            && history.training_days() >= MIN_TRAINING_DAYS;

        MaturityReport {
            strategy_id: history.strategy_id.clone(),
            dimension_scores: scores,
            total_score,
            level: level_for(total_score),
            is_mature,
            can_activate: is_mature,
            blocking_issues,
        }
    }

    /// Sharpe banding (40%), coefficient-of-variation stability (30%),
    /// and monthly consistency over 20-day buckets (30%).
    fn return_stability(&self, history: &TrainingHistory) -> MaturityScore {
        let sharpe_score = band_up(history.sharpe_ratio, 2.0, 1.5, 1.0);

        let cv_score = if history.daily_returns.len() >= 2 {
            let (mean, std) = mean_std(&history.daily_returns);
            if mean.abs() > 1e-8 {
                let cv = std / mean.abs();
                (1.0 - cv / 5.0).max(0.0)
            } else {
                0.5
            }
        } else {
            0.0
        };

        let monthly = monthly_consistency(&history.daily_returns);
        let score = sharpe_score * 0.4 + cv_score * 0.3 + monthly * 0.3;

        MaturityScore {
            dimension: "return_stability".to_string(),
            score,
            weight: WEIGHT_RETURN_STABILITY,
            reason: format!(
                "sharpe {:.2}, cv stability {:.2}, monthly consistency {:.2}",
                history.sharpe_ratio, cv_score, monthly
            ),
        }
    }

    /// Drawdown (35%), Calmar (25%), win rate (20%), profit factor (20%).
    fn risk_control(&self, history: &TrainingHistory) -> MaturityScore {
        let dd = history.max_drawdown.abs();
        let dd_score = if dd <= 0.10 {
            1.0
        } else if dd <= 0.15 {
            0.8 + (0.15 - dd) / 0.05 * 0.2
        } else if dd <= 0.20 {
            0.6 + (0.20 - dd) / 0.05 * 0.2
        } else {
            ((0.30 - dd) / 0.10 * 0.6).max(0.0)
        };

        let calmar = history.calmar_ratio;
        let calmar_score = if calmar >= 3.0 {
            1.0
        } else if calmar >= 2.0 {
            0.8 + (calmar - 2.0) * 0.2
        } else if calmar >= 1.0 {
            0.6 + (calmar - 1.0) * 0.2
        } else {
            (calmar * 0.6).max(0.0)
        };

        let wr_score = band_up(history.win_rate, 0.55, 0.50, 0.45);
        let pf_score = band_up(history.profit_factor, 2.0, 1.5, 1.2);

        let score = dd_score * 0.35 + calmar_score * 0.25 + wr_score * 0.20 + pf_score * 0.20;

        MaturityScore {
            dimension: "risk_control".to_string(),
            score,
            weight: WEIGHT_RISK_CONTROL,
            reason: format!(
                "drawdown {:.2}, calmar {:.2}, win rate {:.2}, profit factor {:.2}",
                dd, calmar, history.win_rate, history.profit_factor
            ),
        }
    }

    /// Regime coverage (40%), per-regime consistency (30%), post-drawdown
    /// survival (30%).
    fn market_adaptability(&self, history: &TrainingHistory) -> MaturityScore {
        let covered = EXPECTED_REGIMES
            .iter()
            .filter(|r| history.market_regimes.iter().any(|m| m == *r))
            .count();
        let coverage = covered as f64 / EXPECTED_REGIMES.len() as f64;

        let regime_consistency =
            regime_consistency(&history.daily_returns, &history.market_regimes);
        let survival = survival_score(&history.drawdowns);

        let score = coverage * 0.4 + regime_consistency * 0.3 + survival * 0.3;

        MaturityScore {
            dimension: "market_adaptability".to_string(),
            score,
            weight: WEIGHT_MARKET_ADAPTABILITY,
            reason: format!(
                "{covered}/5 regimes, consistency {:.2}, survival {:.2}",
                regime_consistency, survival
            ),
        }
    }

    /// Training days (50%), trade count (30%), regime diversity (20%).
    fn training_sufficiency(&self, history: &TrainingHistory) -> MaturityScore {
        let days = history.training_days() as f64;
        let days_score = if days >= 180.0 {
            1.0
        } else if days >= 120.0 {
            0.8 + (days - 120.0) / 60.0 * 0.2
        } else if days >= 90.0 {
            0.6 + (days - 90.0) / 30.0 * 0.2
        } else {
            days / 90.0 * 0.6
        };

        let trades = history.trade_count as f64;
        let trades_score = if trades >= 500.0 {
            1.0
        } else if trades >= 300.0 {
            0.8 + (trades - 300.0) / 200.0 * 0.2
        } else if trades >= 100.0 {
            0.6 + (trades - 100.0) / 200.0 * 0.2
        } else {
            trades / 100.0 * 0.6
        };

        let unique: std::collections::BTreeSet<&str> = history
            .market_regimes
            .iter()
            .map(String::as_str)
            .collect();
        let diversity = (unique.len() as f64 / 5.0).min(1.0);

        let score = days_score * 0.5 + trades_score * 0.3 + diversity * 0.2;

        MaturityScore {
            dimension: "training_sufficiency".to_string(),
            score,
            weight: WEIGHT_TRAINING_SUFFICIENCY,
            reason: format!(
                "{} days, {} trades, diversity {:.2}",
                history.training_days(),
                history.trade_count,
                diversity
            ),
        }
    }

    /// Signal/return correlation (50%) and rolling-sharpe positivity (50%).
    fn consistency(&self, history: &TrainingHistory) -> MaturityScore {
        let correlation =
            pearson(&history.daily_signals, &history.daily_returns).max(0.0);
        let rolling = rolling_sharpe_positivity(&history.daily_returns, 20);
        let score = correlation * 0.5 + rolling * 0.5;

        MaturityScore {
            dimension: "consistency".to_string(),
            score,
            weight: WEIGHT_CONSISTENCY,
            reason: format!(
                "signal correlation {:.2}, rolling positivity {:.2}",
                correlation, rolling
            ),
        }
    }
}

fn level_for(score: f64) -> MaturityLevel {
    if score >= 0.8 {
        MaturityLevel::Mature
    } else if score >= 0.6 {
        MaturityLevel::Maturing
    } else if score >= 0.4 {
        MaturityLevel::Growing
    } else if score >= 0.2 {
        MaturityLevel::Developing
    } else {
        MaturityLevel::Embryonic
    }
}

/// Piecewise band score for "higher is better" metrics: 1.0 at
/// `excellent`, linear 0.8..1.0 down to `good`, 0.6..0.8 down to `pass`,
/// proportional below.
fn band_up(value: f64, excellent: f64, good: f64, pass: f64) -> f64 {
    if value >= excellent {
        1.0
    } else if value >= good {
        0.8 + (value - good) / (excellent - good) * 0.2
    } else if value >= pass {
        0.6 + (value - pass) / (good - pass) * 0.2
    } else {
        (value / pass * 0.6).max(0.0)
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Fraction of 20-day buckets (months) with positive summed return.
/// Needs at least two months of data.
fn monthly_consistency(daily_returns: &[f64]) -> f64 {
    if daily_returns.len() < 60 {
        return 0.0;
    }
    let mut months = Vec::new();
    for chunk in daily_returns.chunks(20) {
        if chunk.len() >= 15 {
            months.push(chunk.iter().sum::<f64>());
        }
    }
    if months.len() < 2 {
        return 0.0;
    }
    let positive = months.iter().filter(|m| **m > 0.0).count();
    positive as f64 / months.len() as f64
}

/// Fraction of regimes with positive mean return. One regime scores a
/// neutral 0.5.
fn regime_consistency(daily_returns: &[f64], regimes: &[String]) -> f64 {
    if daily_returns.is_empty() || daily_returns.len() != regimes.len() {
        return 0.0;
    }
    let mut sums: std::collections::BTreeMap<&str, (f64, usize)> = Default::default();
    for (ret, regime) in daily_returns.iter().zip(regimes.iter()) {
        let entry = sums.entry(regime.as_str()).or_insert((0.0, 0));
        entry.0 += ret;
        entry.1 += 1;
    }
    if sums.len() < 2 {
        return 0.5;
    }
    let positive = sums
        .values()
        .filter(|(sum, count)| *count > 0 && sum / *count as f64 > 0.0)
        .count();
    positive as f64 / sums.len() as f64
}

/// Recovery ratio after the deepest drawdown. Shallow histories (max
/// drawdown above -5%) score full marks.
fn survival_score(drawdowns: &[f64]) -> f64 {
    if drawdowns.is_empty() {
        return 0.5;
    }
    let max_dd = drawdowns.iter().cloned().fold(f64::INFINITY, f64::min);
    if max_dd >= -0.05 {
        return 1.0;
    }
    let idx = drawdowns
        .iter()
        .position(|d| *d == max_dd)
        .unwrap_or(drawdowns.len() - 1);
    let last = drawdowns[idx..].last().copied().unwrap_or(max_dd);
    if max_dd == 0.0 {
        return 1.0;
    }
    (1.0 - last / max_dd).clamp(0.0, 1.0)
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 10 {
        return 0.0;
    }
    let xs = &xs[..n];
    let ys = &ys[..n];
    let (mean_x, std_x) = mean_std(xs);
    let (mean_y, std_y) = mean_std(ys);
    if std_x < 1e-8 || std_y < 1e-8 {
        return 0.0;
    }
    let cov = xs
        .iter()
        .zip(ys.iter())
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum::<f64>()
        / n as f64;
    (cov / (std_x * std_y)).clamp(-1.0, 1.0)
}

/// Fraction of rolling windows with a positive sharpe. Needs three full
/// windows of history.
fn rolling_sharpe_positivity(daily_returns: &[f64], window: usize) -> f64 {
    if daily_returns.len() < window * 3 {
        return 0.0;
    }
    let mut positive = 0usize;
    let mut total = 0usize;
    for chunk in daily_returns.windows(window) {
        let (mean, std) = mean_std(chunk);
        let sharpe = if std > 0.0 { mean / std } else { 0.0 };
        total += 1;
        if sharpe > 0.0 {
            positive += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        positive as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong_history() -> TrainingHistory {
        let days = 200;
        // Mildly noisy but consistently positive daily returns.
        let daily_returns: Vec<f64> = (0..days)
            .map(|i| 0.002 + 0.0005 * ((i % 7) as f64 - 3.0))
            .collect();
        let daily_signals: Vec<f64> = daily_returns.iter().map(|r| r * 0.8).collect();
        let regimes = ["bull", "bear", "sideways", "high_vol", "low_vol"];
        let market_regimes: Vec<String> = (0..days)
            .map(|i| regimes[i % regimes.len()].to_string())
            .collect();
        let drawdowns: Vec<f64> = (0..days)
            .map(|i| if i == 100 { -0.08 } else { -0.01 })
            .collect();

        TrainingHistory {
            strategy_id: "ppo_v1".to_string(),
            daily_returns,
            daily_signals,
            market_regimes,
            drawdowns,
            trade_count: 600,
            win_rate: 0.56,
            profit_factor: 2.1,
            sharpe_ratio: 2.2,
            max_drawdown: 0.08,
            calmar_ratio: 3.2,
        }
    }

    #[test]
    fn strong_history_is_mature_and_activatable() {
        let report = MaturityEvaluator::new().evaluate(&strong_history());
        assert!(report.total_score >= 0.8, "total {:.3}", report.total_score);
        assert!(report.is_mature);
        assert!(report.can_activate);
        assert!(report.blocking_issues.is_empty());
        assert_eq!(report.level, MaturityLevel::Mature);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let report = MaturityEvaluator::new().evaluate(&strong_history());
        assert!(report.total_score >= 0.0 && report.total_score <= 1.0);
        for score in &report.dimension_scores {
            assert!(
                score.score >= 0.0 && score.score <= 1.0,
                "{} = {}",
                score.dimension,
                score.score
            );
        }
    }

    #[test]
    fn short_training_blocks_activation() {
        let mut history = strong_history();
        history.daily_returns.truncate(60);
        history.daily_signals.truncate(60);
        history.market_regimes.truncate(60);
        let report = MaturityEvaluator::new().evaluate(&history);
        assert!(!report.can_activate);
        assert!(report
            .blocking_issues
            .iter()
            .any(|issue| issue.contains("training days")));
    }

    #[test]
    fn weak_dimension_blocks_even_with_high_total() {
        let mut history = strong_history();
        // Deep unrecovered drawdown wrecks risk control.
        history.max_drawdown = 0.28;
        history.calmar_ratio = 0.2;
        history.win_rate = 0.35;
        history.profit_factor = 0.9;
        let report = MaturityEvaluator::new().evaluate(&history);
        assert!(!report.is_mature);
        assert!(report
            .blocking_issues
            .iter()
            .any(|issue| issue.contains("risk_control")));
    }

    #[test]
    fn empty_history_is_embryonic() {
        let report = MaturityEvaluator::new().evaluate(&TrainingHistory::default());
        assert!(!report.is_mature);
        assert!(report.total_score < 0.4);
    }
}
