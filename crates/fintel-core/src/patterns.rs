//! Spending pattern detection
//!
//! Three independent detectors run over the same transaction list:
//! - Recurring: identical descriptions repeating at a steady interval
//! - Trend: per-category monthly spend moving along a straight line
//! - Seasonal: calendar months that spike above the yearly baseline every year
//!
//! Only well-formed records (dated, with a finite amount) take part.
//! Output order is recurring, trend, seasonal; within each kind, groups appear
//! in order of first appearance in the input (seasonal by calendar month).

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use crate::config::{PatternConfig, MIN_RECURRING_OCCURRENCES};
use crate::models::{Category, Pattern, PatternKind, Transaction};
use crate::stats::{clamp_score, coefficient_of_variation, linear_regression, mean};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Frequency label for an average gap in days
///
/// 28-31 days is monthly, 13-15 bi-weekly, exactly 7 weekly; anything else
/// is reported as "every N days".
pub fn frequency_label(avg_gap_days: f64) -> String {
    if (28.0..=31.0).contains(&avg_gap_days) {
        "monthly".to_string()
    } else if (13.0..=15.0).contains(&avg_gap_days) {
        "bi-weekly".to_string()
    } else if avg_gap_days == 7.0 {
        "weekly".to_string()
    } else {
        format!("every {} days", avg_gap_days.round() as i64)
    }
}

/// Continuous month index (year * 12 + zero-based month)
fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn index_to_year_month(index: i32) -> (i32, u32) {
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// Whole days between two timestamps, rounded to the nearest day
fn gap_days(earlier: &Transaction, later: &Transaction) -> Option<i64> {
    let delta = later.date? - earlier.date?;
    Some((delta.num_seconds() as f64 / 86_400.0).round() as i64)
}

/// Group well-formed transactions by a key, preserving first-appearance order
fn group_by<'a, K, F>(transactions: &'a [Transaction], key: F) -> Vec<(K, Vec<&'a Transaction>)>
where
    K: std::hash::Hash + Eq + Clone,
    F: Fn(&Transaction) -> Option<K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&Transaction>)> = Vec::new();

    for t in transactions.iter().filter(|t| t.is_well_formed()) {
        let Some(k) = key(t) else { continue };
        match index.get(&k) {
            Some(&i) => groups[i].1.push(t),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![t]));
            }
        }
    }

    groups
}

fn sort_by_date(members: &mut [&Transaction]) {
    // Stable, so same-instant members keep input order
    members.sort_by_key(|t| t.date);
}

fn date_span(members: &[&Transaction]) -> Option<(NaiveDate, NaiveDate)> {
    let first = members.iter().filter_map(|t| t.day()).min()?;
    let last = members.iter().filter_map(|t| t.day()).max()?;
    Some((first, last))
}

/// Pattern detector
#[derive(Debug, Clone, Default)]
pub struct PatternDetector {
    config: PatternConfig,
}

impl PatternDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PatternConfig) -> Self {
        Self { config }
    }

    /// Run all detectors; trend patterns are named by category id
    pub fn detect(&self, transactions: &[Transaction]) -> Vec<Pattern> {
        self.detect_with_categories(transactions, &[])
    }

    /// Run all detectors, resolving category names for trend patterns
    pub fn detect_with_categories(
        &self,
        transactions: &[Transaction],
        categories: &[Category],
    ) -> Vec<Pattern> {
        let mut patterns = self.detect_recurring(transactions);
        patterns.extend(self.detect_trends(transactions, categories));
        patterns.extend(self.detect_seasonal(transactions));

        for (i, pattern) in patterns.iter_mut().enumerate() {
            pattern.id = format!("pattern_{}", i + 1);
        }

        debug!(count = patterns.len(), "Pattern detection complete");
        patterns
    }

    /// Recurring charges: same description at a steady interval
    pub fn detect_recurring(&self, transactions: &[Transaction]) -> Vec<Pattern> {
        group_by(transactions, |t| Some(t.description.clone()))
            .into_iter()
            .filter_map(|(description, mut members)| {
                if members.len() < self.config.min_occurrences.max(MIN_RECURRING_OCCURRENCES) {
                    return None;
                }
                sort_by_date(&mut members);

                let gaps: Vec<i64> = members
                    .windows(2)
                    .map(|w| gap_days(w[0], w[1]))
                    .collect::<Option<_>>()?;

                let regular = gaps
                    .windows(2)
                    .all(|w| (w[1] - w[0]).abs() <= self.config.gap_tolerance_days);
                if !regular {
                    return None;
                }

                let avg_gap = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;

                let frequency = frequency_label(avg_gap);
                let amount = members.first()?.amount?;
                let (first, last) = date_span(&members)?;

                debug!(description = %description, frequency = %frequency, count = members.len(), "Recurring pattern");

                Some(Pattern {
                    id: String::new(),
                    kind: PatternKind::Recurring,
                    name: format!("{} ({})", description, frequency),
                    description: format!("Regular payment occurring {}", frequency),
                    amount,
                    frequency: Some(frequency),
                    transaction_ids: members.iter().map(|t| t.id.clone()).collect(),
                    confidence_score: self.config.recurring_confidence,
                    first_occurrence: first,
                    last_occurrence: last,
                })
            })
            .collect()
    }

    /// Category spend trends from a least-squares fit over monthly totals
    pub fn detect_trends(&self, transactions: &[Transaction], categories: &[Category]) -> Vec<Pattern> {
        group_by(transactions, |t| t.category_id.clone())
            .into_iter()
            .filter_map(|(category_id, mut members)| {
                sort_by_date(&mut members);

                let mut monthly: BTreeMap<i32, f64> = BTreeMap::new();
                for t in &members {
                    *monthly.entry(month_index(t.day()?)).or_default() += t.abs_amount()?;
                }
                if monthly.len() < 2 {
                    return None;
                }

                // Contiguous series with empty months as zero
                let (&start, _) = monthly.first_key_value()?;
                let (&end, _) = monthly.last_key_value()?;
                let series: Vec<f64> = (start..=end)
                    .map(|m| monthly.get(&m).copied().unwrap_or(0.0))
                    .collect();

                let fit = linear_regression(&series)?;
                if fit.slope == 0.0 || fit.r_squared <= self.config.trend_min_r_squared {
                    return None;
                }
                let increasing = fit.slope > 0.0;
                if longest_run(&series, increasing) < self.config.trend_min_consecutive_months {
                    return None;
                }

                let name = categories
                    .iter()
                    .find(|c| c.id == category_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| category_id.clone());
                let direction = if increasing { "increasing" } else { "decreasing" };
                let (first, last) = date_span(&members)?;

                debug!(category = %name, slope = fit.slope, r_squared = fit.r_squared, "Trend pattern");

                Some(Pattern {
                    id: String::new(),
                    kind: PatternKind::Trend,
                    name: format!("{} spending {}", name, direction),
                    description: format!(
                        "{} spending has been {} by about {:.2} per month",
                        name,
                        direction,
                        fit.slope.abs()
                    ),
                    amount: fit.slope.abs(),
                    frequency: Some("monthly".to_string()),
                    transaction_ids: members.iter().map(|t| t.id.clone()).collect(),
                    confidence_score: clamp_score(fit.r_squared, 0.5, 0.95),
                    first_occurrence: first,
                    last_occurrence: last,
                })
            })
            .collect()
    }

    /// Calendar months whose outflow spikes above the yearly baseline
    pub fn detect_seasonal(&self, transactions: &[Transaction]) -> Vec<Pattern> {
        let outflows: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| t.is_well_formed() && t.amount.is_some_and(|a| a < 0.0))
            .collect();
        let Some((first, last)) = date_span(&outflows) else {
            return Vec::new();
        };
        if last - first < Duration::days(365) {
            return Vec::new();
        }

        let mut monthly: BTreeMap<i32, f64> = BTreeMap::new();
        for t in &outflows {
            if let (Some(day), Some(amount)) = (t.day(), t.abs_amount()) {
                *monthly.entry(month_index(day)).or_default() += amount;
            }
        }

        // Baseline per year over the months of that year inside the span
        let (span_start, span_end) = (month_index(first), month_index(last));
        let mut year_months: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
        for m in span_start..=span_end {
            let (year, _) = index_to_year_month(m);
            year_months
                .entry(year)
                .or_default()
                .push(monthly.get(&m).copied().unwrap_or(0.0));
        }
        let baselines: HashMap<i32, f64> = year_months
            .iter()
            .filter(|(_, totals)| totals.len() >= 3)
            .filter_map(|(&year, totals)| mean(totals).filter(|b| *b > 0.0).map(|b| (year, b)))
            .collect();

        let threshold = 1.0 + self.config.seasonal_min_uplift;
        let mut patterns = Vec::new();

        for month in 1..=12u32 {
            // (year, uplift, extra spend) for every observed year of this month
            let observations: Vec<(i32, f64, f64)> = (span_start..=span_end)
                .filter_map(|m| {
                    let (year, mo) = index_to_year_month(m);
                    if mo != month {
                        return None;
                    }
                    let baseline = *baselines.get(&year)?;
                    let total = monthly.get(&m).copied().unwrap_or(0.0);
                    Some((year, total / baseline, total - baseline))
                })
                .collect();

            let spikes: Vec<&(i32, f64, f64)> =
                observations.iter().filter(|(_, uplift, _)| *uplift >= threshold).collect();
            if spikes.len() < 2 {
                continue;
            }

            let uplifts: Vec<f64> = observations.iter().map(|(_, u, _)| *u).collect();
            let Some(cv) = coefficient_of_variation(&uplifts) else {
                continue;
            };
            if cv > self.config.seasonal_max_cv {
                continue;
            }

            let extras: Vec<f64> = spikes.iter().map(|(_, _, extra)| *extra).collect();
            let Some(extra) = mean(&extras) else { continue };
            let mean_uplift = mean(&spikes.iter().map(|(_, u, _)| *u).collect::<Vec<_>>())
                .unwrap_or(threshold);

            let spike_years: Vec<i32> = spikes.iter().map(|(y, _, _)| *y).collect();
            let mut members: Vec<&Transaction> = outflows
                .iter()
                .copied()
                .filter(|t| {
                    t.day()
                        .is_some_and(|d| d.month() == month && spike_years.contains(&d.year()))
                })
                .collect();
            sort_by_date(&mut members);
            let Some((first_seen, last_seen)) = date_span(&members) else {
                continue;
            };

            let month_name = MONTH_NAMES[(month - 1) as usize];
            debug!(month = month_name, cv, years = spikes.len(), "Seasonal pattern");

            patterns.push(Pattern {
                id: String::new(),
                kind: PatternKind::Seasonal,
                name: format!("{} spending spike", month_name),
                description: format!(
                    "Spending in {} runs about {:.0}% above the monthly average",
                    month_name,
                    (mean_uplift - 1.0) * 100.0
                ),
                amount: extra,
                frequency: Some("yearly".to_string()),
                transaction_ids: members.iter().map(|t| t.id.clone()).collect(),
                confidence_score: clamp_score(1.0 - cv, 0.5, 0.95),
                first_occurrence: first_seen,
                last_occurrence: last_seen,
            });
        }

        patterns
    }
}

/// Longest run of consecutive months moving strictly in one direction
///
/// Counted in months, so a run of two rises spans three months.
fn longest_run(series: &[f64], increasing: bool) -> usize {
    if series.is_empty() {
        return 0;
    }
    let mut best = 1;
    let mut current = 1;
    for w in series.windows(2) {
        let moved = if increasing { w[1] > w[0] } else { w[1] < w[0] };
        if moved {
            current += 1;
            best = best.max(current);
        } else {
            current = 1;
        }
    }
    best
}

/// Detect patterns with the default configuration
pub fn detect_patterns(transactions: &[Transaction]) -> Vec<Pattern> {
    PatternDetector::new().detect(transactions)
}
