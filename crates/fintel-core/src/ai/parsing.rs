//! JSON parsing and validation for remote model responses
//!
//! Model output often wraps the JSON payload in prose or code fences, so the
//! outermost `{...}` is extracted first. The payload is then checked against
//! the request it answers: every referenced transaction or category must
//! exist, scores must lie in [0, 1], dates must be ordered and targets must
//! lie in the future. A single invalid item rejects the whole response; the
//! engine then falls back to the heuristics.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::models::{
    parse_date, Anomaly, AnomalyKind, AnomalyStatus, BudgetStatus, Category, Pattern, PatternKind,
    Prediction, PredictionKind, Severity, Transaction,
};

use super::types::{CategoryAssignments, RemoteAnomalies, RemotePatterns, RemotePredictions};

/// Truncate long responses for error messages
fn truncate(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}

/// Find the outermost JSON object in a model response
pub fn extract_json(response: &str) -> Result<&str> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(&response[s..=e]),
        _ => Err(Error::InvalidData(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(response)
        ))),
    }
}

/// Extract and deserialize the JSON payload
fn parse_payload<T: DeserializeOwned>(response: &str) -> Result<T> {
    let json_str = extract_json(response)?;
    serde_json::from_str(json_str).map_err(|e| {
        Error::InvalidData(format!(
            "Invalid JSON from AI: {} | Raw: {}",
            e,
            truncate(json_str)
        ))
    })
}

fn check_score(score: f64, what: &str) -> Result<f64> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(Error::InvalidData(format!(
            "{} confidence out of range: {}",
            what, score
        )))
    }
}

fn check_amount(amount: f64, what: &str) -> Result<f64> {
    if amount.is_finite() {
        Ok(amount)
    } else {
        Err(Error::InvalidData(format!("{} amount is not finite", what)))
    }
}

fn parse_day(value: &str, field: &str) -> Result<NaiveDate> {
    parse_date(value)
        .map(|d| d.date())
        .ok_or_else(|| Error::InvalidData(format!("Invalid {} date: {}", field, value)))
}

/// Apply a categorization response to the input transactions
///
/// Assignments are only applied to transactions whose `category_id` is null;
/// assignments for already categorized transactions are ignored.
pub fn parse_category_assignments(
    response: &str,
    transactions: &[Transaction],
    categories: &[Category],
) -> Result<Vec<Transaction>> {
    let payload: CategoryAssignments = parse_payload(response)?;

    let known_categories: HashSet<&str> = categories.iter().map(|c| c.id.as_str()).collect();
    let known_transactions: HashSet<&str> = transactions.iter().map(|t| t.id.as_str()).collect();

    let mut assigned: HashMap<String, String> = HashMap::new();
    for assignment in payload.assignments {
        if !known_transactions.contains(assignment.transaction_id.as_str()) {
            return Err(Error::InvalidData(format!(
                "Assignment references unknown transaction: {}",
                assignment.transaction_id
            )));
        }
        if !known_categories.contains(assignment.category_id.as_str()) {
            return Err(Error::InvalidData(format!(
                "Assignment references unknown category: {}",
                assignment.category_id
            )));
        }
        assigned
            .entry(assignment.transaction_id)
            .or_insert(assignment.category_id);
    }

    Ok(transactions
        .iter()
        .map(|t| {
            let mut t = t.clone();
            if t.category_id.is_none() {
                t.category_id = assigned.get(&t.id).cloned();
            }
            t
        })
        .collect())
}

/// Parse and validate a patterns response
pub fn parse_patterns(response: &str, transactions: &[Transaction]) -> Result<Vec<Pattern>> {
    let payload: RemotePatterns = parse_payload(response)?;
    let known: HashSet<&str> = transactions.iter().map(|t| t.id.as_str()).collect();

    payload
        .patterns
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let kind: PatternKind = raw.kind.parse().map_err(Error::InvalidData)?;
            if raw.transaction_ids.is_empty() {
                return Err(Error::InvalidData(format!(
                    "Pattern '{}' cites no transactions",
                    raw.name
                )));
            }
            if let Some(id) = raw.transaction_ids.iter().find(|id| !known.contains(id.as_str())) {
                return Err(Error::InvalidData(format!(
                    "Pattern '{}' references unknown transaction: {}",
                    raw.name, id
                )));
            }
            let first = parse_day(&raw.first_occurrence, "first_occurrence")?;
            let last = parse_day(&raw.last_occurrence, "last_occurrence")?;
            if first > last {
                return Err(Error::InvalidData(format!(
                    "Pattern '{}' has first_occurrence after last_occurrence",
                    raw.name
                )));
            }

            Ok(Pattern {
                id: format!("pattern_{}", i + 1),
                kind,
                confidence_score: check_score(raw.confidence_score, "Pattern")?,
                amount: check_amount(raw.amount, "Pattern")?,
                name: raw.name,
                description: raw.description,
                frequency: raw.frequency,
                transaction_ids: raw.transaction_ids,
                first_occurrence: first,
                last_occurrence: last,
            })
        })
        .collect()
}

/// Parse and validate an anomalies response
///
/// Repeated (transaction, kind) pairs are collapsed to the first.
pub fn parse_anomalies(
    response: &str,
    transactions: &[Transaction],
    detected_at: DateTime<Utc>,
) -> Result<Vec<Anomaly>> {
    let payload: RemoteAnomalies = parse_payload(response)?;
    let known: HashSet<&str> = transactions.iter().map(|t| t.id.as_str()).collect();

    let mut seen = HashSet::new();
    let mut anomalies = Vec::new();
    for raw in payload.anomalies {
        if !known.contains(raw.transaction_id.as_str()) {
            return Err(Error::InvalidData(format!(
                "Anomaly references unknown transaction: {}",
                raw.transaction_id
            )));
        }
        let kind: AnomalyKind = raw.kind.parse().map_err(Error::InvalidData)?;
        let severity: Severity = raw.severity.parse().map_err(Error::InvalidData)?;

        if !seen.insert((raw.transaction_id.clone(), kind)) {
            continue;
        }

        anomalies.push(Anomaly {
            id: format!("anomaly_{}", anomalies.len() + 1),
            transaction_id: raw.transaction_id,
            kind,
            description: raw.description,
            severity,
            detected_at,
            status: AnomalyStatus::New,
        });
    }

    Ok(anomalies)
}

/// Parse and validate a predictions response
pub fn parse_predictions(
    response: &str,
    categories: &[Category],
    as_of: DateTime<Utc>,
) -> Result<Vec<Prediction>> {
    let payload: RemotePredictions = parse_payload(response)?;
    let known: HashSet<&str> = categories.iter().map(|c| c.id.as_str()).collect();
    let today = as_of.date_naive();

    payload
        .predictions
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let kind: PredictionKind = raw.kind.parse().map_err(Error::InvalidData)?;

            let category_id = raw.category_id.filter(|id| !id.is_empty());
            if let Some(ref id) = category_id {
                if !known.contains(id.as_str()) {
                    return Err(Error::InvalidData(format!(
                        "Prediction references unknown category: {}",
                        id
                    )));
                }
            }

            let target_date = parse_day(&raw.target_date, "target")?;
            if target_date <= today {
                return Err(Error::InvalidData(format!(
                    "Prediction target date {} is not after {}",
                    target_date, today
                )));
            }

            let budget_status = match (kind, raw.budget_status.as_deref()) {
                (PredictionKind::Budget, Some(s)) => {
                    Some(s.parse::<BudgetStatus>().map_err(Error::InvalidData)?)
                }
                _ => None,
            };

            Ok(Prediction {
                id: format!("prediction_{}", i + 1),
                kind,
                category_id,
                description: raw.description,
                amount: check_amount(raw.amount, "Prediction")?,
                target_date,
                confidence_score: check_score(raw.confidence_score, "Prediction")?,
                factors: raw.factors,
                budget_status,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn transactions() -> Vec<Transaction> {
        vec![
            Transaction::new("t1", date(2024, 1, 5), "Whole Foods Market", -82.5),
            Transaction::new("t2", date(2024, 1, 9), "Rent", -1500.0).with_category("rent"),
        ]
    }

    fn categories() -> Vec<Category> {
        vec![
            Category::new("groc", "Groceries"),
            Category::new("rent", "Housing"),
        ]
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_extract_json_with_prose() {
        let response = "Sure! Here you go:\n```json\n{\"anomalies\": []}\n```";
        assert_eq!(extract_json(response).unwrap(), "{\"anomalies\": []}");
        assert!(extract_json("no json here").is_err());
    }

    #[test]
    fn test_category_assignments_fill_only_nulls() {
        let response = r#"{"assignments": [
            {"transaction_id": "t1", "category_id": "groc"},
            {"transaction_id": "t2", "category_id": "groc"}
        ]}"#;
        let result = parse_category_assignments(response, &transactions(), &categories()).unwrap();
        assert_eq!(result[0].category_id.as_deref(), Some("groc"));
        assert_eq!(result[1].category_id.as_deref(), Some("rent"));
    }

    #[test]
    fn test_category_assignments_reject_unknown_ids() {
        let unknown_tx = r#"{"assignments": [{"transaction_id": "t9", "category_id": "groc"}]}"#;
        assert!(parse_category_assignments(unknown_tx, &transactions(), &categories()).is_err());

        let unknown_cat = r#"{"assignments": [{"transaction_id": "t1", "category_id": "fun"}]}"#;
        assert!(parse_category_assignments(unknown_cat, &transactions(), &categories()).is_err());
    }

    #[test]
    fn test_parse_patterns_valid() {
        let response = r#"{"patterns": [{
            "kind": "recurring", "name": "Groceries", "description": "Weekly shop",
            "amount": 82.5, "frequency": "weekly", "transaction_ids": ["t1"],
            "confidence_score": 0.7, "first_occurrence": "2024-01-05", "last_occurrence": "2024-01-05"
        }]}"#;
        let patterns = parse_patterns(response, &transactions()).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].id, "pattern_1");
        assert_eq!(patterns[0].kind, PatternKind::Recurring);
    }

    #[test]
    fn test_parse_patterns_rejects_bad_items() {
        let bad_score = r#"{"patterns": [{
            "kind": "trend", "name": "x", "amount": 1.0, "transaction_ids": ["t1"],
            "confidence_score": 1.4, "first_occurrence": "2024-01-05", "last_occurrence": "2024-01-05"
        }]}"#;
        assert!(parse_patterns(bad_score, &transactions()).is_err());

        let reversed = r#"{"patterns": [{
            "kind": "trend", "name": "x", "amount": 1.0, "transaction_ids": ["t1"],
            "confidence_score": 0.5, "first_occurrence": "2024-02-05", "last_occurrence": "2024-01-05"
        }]}"#;
        assert!(parse_patterns(reversed, &transactions()).is_err());

        let missing_key = r#"{"result": []}"#;
        assert!(parse_patterns(missing_key, &transactions()).is_err());
    }

    #[test]
    fn test_parse_anomalies() {
        let response = r#"{"anomalies": [
            {"transaction_id": "t2", "kind": "unusual_amount", "description": "Large", "severity": "high"},
            {"transaction_id": "t2", "kind": "unusual_amount", "description": "Again", "severity": "low"}
        ]}"#;
        let anomalies = parse_anomalies(response, &transactions(), now()).unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::High);
        assert_eq!(anomalies[0].detected_at, now());
        assert_eq!(anomalies[0].status, AnomalyStatus::New);

        let bad_kind = r#"{"anomalies": [{"transaction_id": "t1", "kind": "potential_fraud", "severity": "high"}]}"#;
        assert!(parse_anomalies(bad_kind, &transactions(), now()).is_err());
    }

    #[test]
    fn test_parse_predictions() {
        let response = r#"{"predictions": [
            {"kind": "budget", "category_id": "groc", "description": "Groceries budget",
             "amount": 300.0, "target_date": "2024-03-01", "confidence_score": 0.8,
             "factors": ["Groceries"], "budget_status": "at_risk"},
            {"kind": "savings", "category_id": null, "amount": 120.0,
             "target_date": "2024-05-01", "confidence_score": 0.6}
        ]}"#;
        let predictions = parse_predictions(response, &categories(), now()).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].budget_status, Some(BudgetStatus::AtRisk));
        assert_eq!(predictions[1].id, "prediction_2");
        assert!(predictions[1].category_id.is_none());
    }

    #[test]
    fn test_parse_predictions_rejects_past_target() {
        let response = r#"{"predictions": [{"kind": "spending", "amount": 10.0,
            "target_date": "2024-02-01", "confidence_score": 0.6}]}"#;
        assert!(parse_predictions(response, &categories(), now()).is_err());
    }
}
