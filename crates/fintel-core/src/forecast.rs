//! Spending, income, budget and savings forecasts
//!
//! History is read through a trailing lookback window that ends at the latest
//! well-formed transaction, so the same input always yields the same
//! forecast regardless of when it runs. Only `target_date` depends on the
//! injected generation time.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use crate::categorize::Categorizer;
use crate::config::ForecastConfig;
use crate::models::{BudgetStatus, Category, ForecastHorizon, Prediction, PredictionKind, Transaction};
use crate::stats::{clamp_score, coefficient_of_variation, mean};

const BUDGET_CONFIDENCE: f64 = 0.85;

/// Forecaster
#[derive(Debug, Clone)]
pub struct Forecaster {
    config: ForecastConfig,
    as_of: DateTime<Utc>,
}

/// Budget usage of one category in the current month
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetUsage {
    pub category_id: String,
    pub category_name: String,
    pub spent: f64,
    pub budget: f64,
    pub status: BudgetStatus,
}

impl Forecaster {
    /// Create a forecaster generating predictions as of `as_of`
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self {
            config: ForecastConfig::default(),
            as_of,
        }
    }

    pub fn with_config(mut self, config: ForecastConfig) -> Self {
        self.config = config;
        self
    }

    /// Forecast from already categorized transactions
    pub fn forecast(
        &self,
        transactions: &[Transaction],
        categories: &[Category],
        horizon: ForecastHorizon,
    ) -> Vec<Prediction> {
        let valid: Vec<&Transaction> = transactions.iter().filter(|t| t.is_well_formed()).collect();
        let Some(latest) = valid.iter().filter_map(|t| t.date).max() else {
            debug!("No well-formed transactions, nothing to forecast");
            return Vec::new();
        };

        let lookback = self.config.lookback_months.max(1);
        let window_start = latest
            .checked_sub_months(Months::new(lookback))
            .unwrap_or(NaiveDateTime::MIN);
        let windowed: Vec<&Transaction> = valid
            .iter()
            .copied()
            .filter(|t| t.date.is_some_and(|d| d > window_start && d <= latest))
            .collect();

        let Some(target) = self.target_date(horizon.months()) else {
            return Vec::new();
        };

        let mut predictions = self.category_predictions(&windowed, categories, horizon, target);
        predictions.extend(self.budget_prediction(&valid, categories, latest.date()));
        predictions.extend(self.savings_prediction(&windowed, horizon, target));

        for (i, prediction) in predictions.iter_mut().enumerate() {
            prediction.id = format!("prediction_{}", i + 1);
        }

        debug!(count = predictions.len(), horizon = %horizon, "Forecast complete");
        predictions
    }

    /// Generation date plus `months`
    fn target_date(&self, months: u32) -> Option<NaiveDate> {
        self.as_of.date_naive().checked_add_months(Months::new(months))
    }

    fn category_predictions(
        &self,
        windowed: &[&Transaction],
        categories: &[Category],
        horizon: ForecastHorizon,
        target: NaiveDate,
    ) -> Vec<Prediction> {
        let lookback = self.config.lookback_months.max(1) as f64;
        let scale = horizon.months() as f64 / lookback;

        categories
            .iter()
            .filter_map(|category| {
                let amounts: Vec<f64> = windowed
                    .iter()
                    .filter(|t| t.category_id.as_deref() == Some(category.id.as_str()))
                    .filter_map(|t| t.abs_amount())
                    .collect();
                let avg = mean(&amounts)?;
                if avg <= 0.0 {
                    return None;
                }
                let cv = coefficient_of_variation(&amounts)?;
                let count = amounts.len();

                let (kind, noun) = if category.is_income {
                    (PredictionKind::Income, "income")
                } else {
                    (PredictionKind::Spending, "spending")
                };

                Some(Prediction {
                    id: String::new(),
                    kind,
                    category_id: Some(category.id.clone()),
                    description: format!(
                        "Predicted {} {} for the {}",
                        category.name,
                        noun,
                        horizon.label()
                    ),
                    amount: avg * count as f64 * scale,
                    target_date: target,
                    confidence_score: clamp_score(1.0 - cv, 0.5, 0.95),
                    factors: vec![
                        format!("{} transactions in the last {} months", count, lookback),
                        format!("average {:.2} per transaction", avg),
                    ],
                    budget_status: None,
                })
            })
            .collect()
    }

    /// Budget usage for the calendar month containing `month_of`
    pub fn budget_usage(
        &self,
        transactions: &[&Transaction],
        categories: &[Category],
        month_of: NaiveDate,
    ) -> Vec<BudgetUsage> {
        categories
            .iter()
            .filter_map(|category| {
                let budget = category.budget_amount.filter(|b| b.is_finite() && *b > 0.0)?;
                // Outflows are negative; refunds reduce spend but never below zero
                let net: f64 = transactions
                    .iter()
                    .filter(|t| t.category_id.as_deref() == Some(category.id.as_str()))
                    .filter(|t| {
                        t.day().is_some_and(|d| {
                            d.year() == month_of.year() && d.month() == month_of.month()
                        })
                    })
                    .filter_map(|t| t.amount.filter(|a| a.is_finite()))
                    .sum();
                let spent = (-net).max(0.0);
                Some(BudgetUsage {
                    category_id: category.id.clone(),
                    category_name: category.name.clone(),
                    spent,
                    budget,
                    status: BudgetStatus::from_ratio(spent / budget, self.config.at_risk_ratio),
                })
            })
            .collect()
    }

    fn budget_prediction(
        &self,
        valid: &[&Transaction],
        categories: &[Category],
        latest: NaiveDate,
    ) -> Option<Prediction> {
        let usage = self.budget_usage(valid, categories, latest);
        let worst = usage.iter().map(|u| u.status).max_by_key(|s| s.severity())?;
        let target = self.target_date(1)?;

        Some(Prediction {
            id: String::new(),
            kind: PredictionKind::Budget,
            category_id: None,
            description: format!(
                "Overall budget status for {}: {}",
                latest.format("%B %Y"),
                worst.as_str().replace('_', " ")
            ),
            amount: usage.iter().map(|u| u.spent).sum(),
            target_date: target,
            confidence_score: BUDGET_CONFIDENCE,
            factors: usage
                .iter()
                .filter(|u| u.status == worst)
                .map(|u| u.category_name.clone())
                .collect(),
            budget_status: Some(worst),
        })
    }

    fn savings_prediction(
        &self,
        windowed: &[&Transaction],
        horizon: ForecastHorizon,
        target: NaiveDate,
    ) -> Option<Prediction> {
        if windowed.is_empty() {
            return None;
        }
        let lookback = self.config.lookback_months.max(1) as f64;

        let mut income = 0.0;
        let mut expenses = 0.0;
        let mut monthly_net: BTreeMap<(i32, u32), f64> = BTreeMap::new();
        for t in windowed {
            let (Some(amount), Some(day)) = (t.amount, t.day()) else {
                continue;
            };
            if amount >= 0.0 {
                income += amount;
            } else {
                expenses += -amount;
            }
            *monthly_net.entry((day.year(), day.month())).or_default() += amount;
        }

        let nets: Vec<f64> = monthly_net.into_values().collect();
        let confidence = coefficient_of_variation(&nets)
            .map(|cv| clamp_score(1.0 - cv, 0.5, 0.95))
            .unwrap_or(0.5);

        Some(Prediction {
            id: String::new(),
            kind: PredictionKind::Savings,
            category_id: None,
            description: format!("Projected savings for the {}", horizon.label()),
            amount: (income - expenses) / lookback * horizon.months() as f64,
            target_date: target,
            confidence_score: confidence,
            factors: vec![
                format!("income {:.2}", income),
                format!("expenses {:.2}", expenses),
            ],
            budget_status: None,
        })
    }
}

/// Categorize, then forecast with the default configuration
pub fn generate_predictions(
    transactions: &[Transaction],
    categories: &[Category],
    horizon: ForecastHorizon,
    as_of: DateTime<Utc>,
) -> Vec<Prediction> {
    let categorized = Categorizer::new().categorize(transactions, categories);
    Forecaster::new(as_of).forecast(&categorized, categories, horizon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()
    }

    fn groceries() -> Category {
        Category::new("groc", "Groceries").with_budget(300.0)
    }

    #[test]
    fn test_over_budget() {
        let txs = vec![
            Transaction::new("t1", date(2024, 3, 2), "Store A", -200.0).with_category("groc"),
            Transaction::new("t2", date(2024, 3, 20), "Store B", -130.0).with_category("groc"),
            // Previous month does not count toward the current budget
            Transaction::new("t0", date(2024, 2, 20), "Store B", -250.0).with_category("groc"),
        ];

        let predictions = Forecaster::new(now()).forecast(&txs, &[groceries()], ForecastHorizon::OneMonth);
        let budget = predictions
            .iter()
            .find(|p| p.kind == PredictionKind::Budget)
            .unwrap();
        assert_eq!(budget.budget_status, Some(BudgetStatus::OverBudget));
        assert_eq!(budget.factors, vec!["Groceries"]);
        assert!((budget.amount - 330.0).abs() < 1e-9);
    }

    #[test]
    fn test_refund_reduces_budget_spend() {
        let txs = vec![
            Transaction::new("t1", date(2024, 3, 2), "Store A", -280.0).with_category("groc"),
            Transaction::new("t2", date(2024, 3, 9), "Store A refund", 50.0).with_category("groc"),
            Transaction::new("t3", date(2024, 3, 20), "Store B", -40.0).with_category("groc"),
        ];
        let valid: Vec<&Transaction> = txs.iter().collect();
        let usage = Forecaster::new(now()).budget_usage(&valid, &[groceries()], date(2024, 3, 31));
        assert!((usage[0].spent - 270.0).abs() < 1e-9);
        assert_eq!(usage[0].status, BudgetStatus::AtRisk);

        // A month of refunds only counts as no spend
        let refunds = vec![Transaction::new("r1", date(2024, 3, 5), "Refund", 20.0).with_category("groc")];
        let valid: Vec<&Transaction> = refunds.iter().collect();
        let usage = Forecaster::new(now()).budget_usage(&valid, &[groceries()], date(2024, 3, 31));
        assert_eq!(usage[0].spent, 0.0);
        assert_eq!(usage[0].status, BudgetStatus::OnTrack);
    }

    #[test]
    fn test_worst_status_wins() {
        let cats = vec![
            groceries(),
            Category::new("fun", "Entertainment").with_budget(100.0),
            Category::new("ut", "Utilities").with_budget(100.0),
        ];
        let txs = vec![
            Transaction::new("t1", date(2024, 3, 2), "a", -100.0).with_category("groc"),
            Transaction::new("t2", date(2024, 3, 3), "b", -90.0).with_category("fun"),
            Transaction::new("t3", date(2024, 3, 4), "c", -85.0).with_category("ut"),
        ];
        let forecaster = Forecaster::new(now());
        let valid: Vec<&Transaction> = txs.iter().collect();
        let usage = forecaster.budget_usage(&valid, &cats, date(2024, 3, 31));
        assert_eq!(usage[0].status, BudgetStatus::OnTrack);
        assert_eq!(usage[1].status, BudgetStatus::AtRisk);

        let predictions = forecaster.forecast(&txs, &cats, ForecastHorizon::ThreeMonths);
        let budget = predictions
            .iter()
            .find(|p| p.kind == PredictionKind::Budget)
            .unwrap();
        assert_eq!(budget.budget_status, Some(BudgetStatus::AtRisk));
        assert_eq!(budget.factors, vec!["Entertainment", "Utilities"]);
    }

    #[test]
    fn test_spending_prediction_scales_with_horizon() {
        let txs = vec![
            Transaction::new("t1", date(2024, 1, 10), "a", -100.0).with_category("groc"),
            Transaction::new("t2", date(2024, 2, 10), "b", -100.0).with_category("groc"),
            Transaction::new("t3", date(2024, 3, 10), "c", -100.0).with_category("groc"),
        ];
        let cats = vec![Category::new("groc", "Groceries")];

        let three = Forecaster::new(now()).forecast(&txs, &cats, ForecastHorizon::ThreeMonths);
        let spending = &three[0];
        assert_eq!(spending.kind, PredictionKind::Spending);
        assert!((spending.amount - 300.0).abs() < 1e-9);
        assert_eq!(spending.confidence_score, 0.95);

        let six = Forecaster::new(now()).forecast(&txs, &cats, ForecastHorizon::SixMonths);
        assert!((six[0].amount - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_income_category_and_savings() {
        let cats = vec![Category::new("pay", "Salary").income(), Category::new("rent", "Housing")];
        let txs = vec![
            Transaction::new("p1", date(2024, 2, 1), "Payroll", 3000.0).with_category("pay"),
            Transaction::new("r1", date(2024, 2, 3), "Rent", -1500.0).with_category("rent"),
            Transaction::new("p2", date(2024, 3, 1), "Payroll", 3000.0).with_category("pay"),
            Transaction::new("r2", date(2024, 3, 3), "Rent", -1500.0).with_category("rent"),
        ];

        let predictions = Forecaster::new(now()).forecast(&txs, &cats, ForecastHorizon::ThreeMonths);
        assert_eq!(predictions[0].kind, PredictionKind::Income);
        assert_eq!(predictions[1].kind, PredictionKind::Spending);

        let savings = predictions.last().unwrap();
        assert_eq!(savings.kind, PredictionKind::Savings);
        // (6000 - 3000) over 3 months, extrapolated to 3 months
        assert!((savings.amount - 3000.0).abs() < 1e-9);
        assert_eq!(savings.target_date, date(2024, 7, 1));
    }

    #[test]
    fn test_targets_strictly_after_generation_time() {
        let txs = vec![
            Transaction::new("t1", date(2024, 3, 10), "Corner grocery", -40.0),
            Transaction::new("t2", date(2024, 3, 12), "Corner grocery", -60.0),
        ];
        let cats = vec![groceries()];
        for horizon in [
            ForecastHorizon::OneMonth,
            ForecastHorizon::ThreeMonths,
            ForecastHorizon::SixMonths,
            ForecastHorizon::TwelveMonths,
        ] {
            let predictions = generate_predictions(&txs, &cats, horizon, now());
            assert!(!predictions.is_empty());
            for p in &predictions {
                assert!(p.target_date > now().date_naive());
                assert!((0.0..=1.0).contains(&p.confidence_score));
            }
        }
    }

    #[test]
    fn test_zero_guards() {
        // Zero amounts: no spending prediction, budget with zero spend is on track
        let txs = vec![Transaction::new("t1", date(2024, 3, 10), "Refund", 0.0).with_category("groc")];
        let predictions = Forecaster::new(now()).forecast(&txs, &[groceries()], ForecastHorizon::OneMonth);
        assert!(predictions.iter().all(|p| p.kind != PredictionKind::Spending));
        let budget = predictions.iter().find(|p| p.kind == PredictionKind::Budget).unwrap();
        assert_eq!(budget.budget_status, Some(BudgetStatus::OnTrack));

        assert!(Forecaster::new(now()).forecast(&[], &[groceries()], ForecastHorizon::OneMonth).is_empty());
    }

    #[test]
    fn test_lookback_window_excludes_old_history() {
        let txs = vec![
            Transaction::new("old", date(2023, 6, 1), "a", -1000.0).with_category("groc"),
            Transaction::new("t1", date(2024, 3, 1), "b", -50.0).with_category("groc"),
        ];
        let cats = vec![Category::new("groc", "Groceries")];
        let predictions = Forecaster::new(now()).forecast(&txs, &cats, ForecastHorizon::ThreeMonths);
        assert!((predictions[0].amount - 50.0).abs() < 1e-9);
    }
}
