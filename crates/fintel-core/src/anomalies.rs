//! Anomaly detection
//!
//! Flags three kinds of unusual transactions:
//! - Unusual amount: absolute amount above mean + k·σ of the whole set
//! - Potential duplicate: same description and amount within a short window
//! - Unusual merchant: no earlier transaction with the same merchant
//!
//! Records are walked in input order and each record is checked in that
//! order, so the output is a pure function of the input and the
//! generation time.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use tracing::debug;

use crate::config::{AnomalyConfig, MerchantHistoryWindow};
use crate::models::{Anomaly, AnomalyKind, AnomalyStatus, Severity, Transaction};
use crate::stats::{mean, population_std_dev};

/// Distribution of absolute amounts used by the unusual-amount check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountStats {
    pub mean: f64,
    pub std_dev: f64,
    /// mean + sigma_multiplier × std_dev
    pub threshold: f64,
}

impl AmountStats {
    /// Compute over well-formed records; `None` when empty or σ is zero
    pub fn compute(transactions: &[Transaction], sigma_multiplier: f64) -> Option<Self> {
        let amounts: Vec<f64> = transactions
            .iter()
            .filter(|t| t.is_well_formed())
            .filter_map(Transaction::abs_amount)
            .collect();
        let mu = mean(&amounts)?;
        let sigma = population_std_dev(&amounts)?;
        if sigma <= 0.0 {
            return None;
        }
        Some(Self {
            mean: mu,
            std_dev: sigma,
            threshold: mu + sigma_multiplier * sigma,
        })
    }
}

/// Anomaly detector
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
    detected_at: DateTime<Utc>,
}

impl AnomalyDetector {
    /// Create a detector stamping anomalies with `detected_at`
    pub fn new(detected_at: DateTime<Utc>) -> Self {
        Self {
            config: AnomalyConfig::default(),
            detected_at,
        }
    }

    pub fn with_config(mut self, config: AnomalyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn detect(&self, transactions: &[Transaction]) -> Vec<Anomaly> {
        let stats = AmountStats::compute(transactions, self.config.sigma_multiplier);
        let history = MerchantHistory::build(transactions);
        let mut anomalies = Vec::new();

        for (index, t) in transactions.iter().enumerate() {
            if let Some(stats) = stats {
                if let Some(anomaly) = self.check_amount(t, &stats) {
                    anomalies.push(anomaly);
                }
            }
            if self.is_duplicate(index, t, transactions) {
                anomalies.push(self.anomaly(
                    t,
                    AnomalyKind::PotentialDuplicate,
                    format!(
                        "Potential duplicate transaction detected within {} hours",
                        self.config.duplicate_window.num_hours()
                    ),
                    Severity::High,
                ));
            }
            if let Some(merchant) = self.new_merchant(t, &history) {
                anomalies.push(self.anomaly(
                    t,
                    AnomalyKind::UnusualMerchant,
                    format!("First transaction with merchant {}", merchant),
                    Severity::Low,
                ));
            }
        }

        for (i, anomaly) in anomalies.iter_mut().enumerate() {
            anomaly.id = format!("anomaly_{}", i + 1);
        }

        debug!(count = anomalies.len(), "Anomaly detection complete");
        anomalies
    }

    fn anomaly(
        &self,
        t: &Transaction,
        kind: AnomalyKind,
        description: String,
        severity: Severity,
    ) -> Anomaly {
        Anomaly {
            id: String::new(),
            transaction_id: t.id.clone(),
            kind,
            description,
            severity,
            detected_at: self.detected_at,
            status: AnomalyStatus::New,
        }
    }

    fn check_amount(&self, t: &Transaction, stats: &AmountStats) -> Option<Anomaly> {
        if !t.is_well_formed() {
            return None;
        }
        let amount = t.abs_amount()?;
        if amount <= stats.threshold {
            return None;
        }

        let severity = if amount >= stats.threshold * self.config.high_severity_factor {
            Severity::High
        } else {
            Severity::Medium
        };
        Some(self.anomaly(
            t,
            AnomalyKind::UnusualAmount,
            format!(
                "Transaction amount is {:.1}x higher than your average",
                amount / stats.mean
            ),
            severity,
        ))
    }

    fn is_duplicate(&self, index: usize, t: &Transaction, all: &[Transaction]) -> bool {
        let (Some(date), Some(amount)) = (t.date, t.amount) else {
            return false;
        };
        let window = self.config.duplicate_window;

        all.iter().enumerate().any(|(j, other)| {
            j != index
                && other.description == t.description
                && other
                    .amount
                    .is_some_and(|a| (a - amount).abs() < self.config.duplicate_amount_tolerance)
                && other
                    .date
                    .is_some_and(|d| d - date < window && date - d < window)
        })
    }

    fn new_merchant<'a>(&self, t: &'a Transaction, history: &MerchantHistory) -> Option<&'a str> {
        let merchant = t.merchant.as_deref().filter(|m| !m.is_empty())?;
        let date = t.date?;
        let window = match self.config.merchant_history {
            MerchantHistoryWindow::AllTime => None,
            // A window too large to represent covers all history
            MerchantHistoryWindow::RollingDays(days) => TimeDelta::try_days(days),
        };
        if history.seen_before(merchant, date, window) {
            None
        } else {
            Some(merchant)
        }
    }
}

/// Sorted timestamps per merchant
struct MerchantHistory {
    dates: HashMap<String, Vec<NaiveDateTime>>,
}

impl MerchantHistory {
    fn build(transactions: &[Transaction]) -> Self {
        let mut dates: HashMap<String, Vec<NaiveDateTime>> = HashMap::new();
        for t in transactions {
            if let (Some(merchant), Some(date)) = (t.merchant.as_ref(), t.date) {
                dates.entry(merchant.clone()).or_default().push(date);
            }
        }
        for list in dates.values_mut() {
            list.sort();
        }
        Self { dates }
    }

    /// Whether the merchant occurs strictly before `date` (within `window` if set)
    fn seen_before(&self, merchant: &str, date: NaiveDateTime, window: Option<TimeDelta>) -> bool {
        let Some(list) = self.dates.get(merchant) else {
            return false;
        };
        let earlier = &list[..list.partition_point(|d| *d < date)];
        match (earlier.last(), window) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(latest), Some(window)) => date - *latest <= window,
        }
    }
}

/// Detect anomalies with the default configuration
pub fn detect_anomalies(transactions: &[Transaction], detected_at: DateTime<Utc>) -> Vec<Anomaly> {
    AnomalyDetector::new(detected_at).detect(transactions)
}
