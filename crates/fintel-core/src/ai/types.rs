//! Raw response shapes expected from the remote model
//!
//! These mirror the JSON formats requested in `prompts/*.md`. Enumerations
//! and dates are kept as strings here and checked in [`super::parsing`].

use serde::Deserialize;

/// Response to `categorize_transactions`
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryAssignments {
    pub assignments: Vec<CategoryAssignment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryAssignment {
    pub transaction_id: String,
    pub category_id: String,
}

/// Response to `identify_patterns`
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePatterns {
    pub patterns: Vec<RemotePattern>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePattern {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub frequency: Option<String>,
    pub transaction_ids: Vec<String>,
    pub confidence_score: f64,
    pub first_occurrence: String,
    pub last_occurrence: String,
}

/// Response to `detect_anomalies`
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAnomalies {
    pub anomalies: Vec<RemoteAnomaly>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAnomaly {
    pub transaction_id: String,
    pub kind: String,
    #[serde(default)]
    pub description: String,
    pub severity: String,
}

/// Response to `generate_predictions`
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePredictions {
    pub predictions: Vec<RemotePrediction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePrediction {
    pub kind: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    pub target_date: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub factors: Vec<String>,
    #[serde(default)]
    pub budget_status: Option<String>,
}
