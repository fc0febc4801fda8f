//! Domain models for fintel
//!
//! Inputs (`Transaction`, `Category`) are owned by the host application; the
//! engine only reads them (and fills `category_id` during categorization).
//! Outputs (`Pattern`, `Anomaly`, `Prediction`) are created fresh per call.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A financial transaction as supplied by the ingestion collaborator
///
/// `date` and `amount` are optional so that malformed records can pass
/// through the engine untouched; such records are skipped by every
/// statistical aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(default, with = "flexible_date")]
    pub date: Option<NaiveDateTime>,
    #[serde(default)]
    pub description: String,
    /// Signed amount; negative is an outflow
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
}

impl Transaction {
    /// Create a transaction dated at midnight of `date`
    pub fn new(id: impl Into<String>, date: NaiveDate, description: impl Into<String>, amount: f64) -> Self {
        Self {
            id: id.into(),
            date: Some(date.and_time(NaiveTime::MIN)),
            description: description.into(),
            amount: Some(amount),
            category_id: None,
            merchant: None,
        }
    }

    /// Set an explicit timestamp (for same-day duplicate detection)
    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.date = Some(timestamp);
        self
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    /// Calendar day of the transaction
    pub fn day(&self) -> Option<NaiveDate> {
        self.date.map(|d| d.date())
    }

    /// Absolute amount, if the amount is present and finite
    pub fn abs_amount(&self) -> Option<f64> {
        self.amount.filter(|a| a.is_finite()).map(f64::abs)
    }

    /// Whether the record can take part in statistical aggregates
    pub fn is_well_formed(&self) -> bool {
        self.date.is_some() && self.amount.is_some_and(f64::is_finite)
    }
}

/// A category in the user's taxonomy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_income: bool,
    /// Monthly budget
    #[serde(default)]
    pub budget_amount: Option<f64>,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_income: false,
            budget_amount: None,
        }
    }

    pub fn income(mut self) -> Self {
        self.is_income = true;
        self
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget_amount = Some(budget);
        self
    }
}

/// Kind of spending pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Recurring,
    Trend,
    Seasonal,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recurring => "recurring",
            Self::Trend => "trend",
            Self::Seasonal => "seasonal",
        }
    }
}

impl std::str::FromStr for PatternKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recurring" => Ok(Self::Recurring),
            "trend" => Ok(Self::Trend),
            "seasonal" => Ok(Self::Seasonal),
            _ => Err(format!("Unknown pattern kind: {}", s)),
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected spending pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub kind: PatternKind,
    pub name: String,
    pub description: String,
    /// Representative (recurring) or monthly (trend, seasonal) magnitude
    pub amount: f64,
    pub frequency: Option<String>,
    pub transaction_ids: Vec<String>,
    pub confidence_score: f64,
    pub first_occurrence: NaiveDate,
    pub last_occurrence: NaiveDate,
}

/// Kind of anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    UnusualAmount,
    PotentialDuplicate,
    UnusualMerchant,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnusualAmount => "unusual_amount",
            Self::PotentialDuplicate => "potential_duplicate",
            Self::UnusualMerchant => "unusual_merchant",
        }
    }
}

impl std::str::FromStr for AnomalyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unusual_amount" => Ok(Self::UnusualAmount),
            "potential_duplicate" | "duplicate" => Ok(Self::PotentialDuplicate),
            "unusual_merchant" => Ok(Self::UnusualMerchant),
            _ => Err(format!("Unknown anomaly kind: {}", s)),
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review status of an anomaly
///
/// The engine always produces `New`; the host moves anomalies through review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    #[default]
    New,
    Reviewed,
    FalsePositive,
}

impl AnomalyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Reviewed => "reviewed",
            Self::FalsePositive => "false_positive",
        }
    }
}

/// A transaction flagged as unusual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    pub transaction_id: String,
    pub kind: AnomalyKind,
    pub description: String,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    #[serde(default)]
    pub status: AnomalyStatus,
}

/// Kind of prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    Spending,
    Income,
    Budget,
    Savings,
}

impl PredictionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spending => "spending",
            Self::Income => "income",
            Self::Budget => "budget",
            Self::Savings => "savings",
        }
    }
}

impl std::str::FromStr for PredictionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spending" => Ok(Self::Spending),
            "income" => Ok(Self::Income),
            "budget" => Ok(Self::Budget),
            "savings" => Ok(Self::Savings),
            _ => Err(format!("Unknown prediction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Budget status of a category (or of the budget as a whole)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    OnTrack,
    AtRisk,
    OverBudget,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnTrack => "on_track",
            Self::AtRisk => "at_risk",
            Self::OverBudget => "over_budget",
        }
    }

    /// Classify a spend/budget ratio
    ///
    /// Below `at_risk_ratio` is on track, up to and including 1.0 is at risk,
    /// anything above 1.0 is over budget.
    pub fn from_ratio(ratio: f64, at_risk_ratio: f64) -> Self {
        if ratio > 1.0 {
            Self::OverBudget
        } else if ratio >= at_risk_ratio {
            Self::AtRisk
        } else {
            Self::OnTrack
        }
    }

    /// Numeric severity (higher = worse)
    pub fn severity(&self) -> u8 {
        match self {
            Self::OnTrack => 0,
            Self::AtRisk => 1,
            Self::OverBudget => 2,
        }
    }
}

impl std::str::FromStr for BudgetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on_track" => Ok(Self::OnTrack),
            "at_risk" => Ok(Self::AtRisk),
            "over_budget" => Ok(Self::OverBudget),
            _ => Err(format!("Unknown budget status: {}", s)),
        }
    }
}

impl std::fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A forward-looking prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub kind: PredictionKind,
    pub category_id: Option<String>,
    pub description: String,
    pub amount: f64,
    pub target_date: NaiveDate,
    pub confidence_score: f64,
    pub factors: Vec<String>,
    /// Only set on budget predictions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_status: Option<BudgetStatus>,
}

/// Forward time window for predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForecastHorizon {
    #[serde(rename = "1month")]
    OneMonth,
    #[default]
    #[serde(rename = "3months")]
    ThreeMonths,
    #[serde(rename = "6months")]
    SixMonths,
    #[serde(rename = "12months")]
    TwelveMonths,
}

impl ForecastHorizon {
    pub fn months(&self) -> u32 {
        match self {
            Self::OneMonth => 1,
            Self::ThreeMonths => 3,
            Self::SixMonths => 6,
            Self::TwelveMonths => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMonth => "1month",
            Self::ThreeMonths => "3months",
            Self::SixMonths => "6months",
            Self::TwelveMonths => "12months",
        }
    }

    /// Human-readable label ("next month", "next 3 months")
    pub fn label(&self) -> String {
        match self {
            Self::OneMonth => "next month".to_string(),
            Self::TwelveMonths => "next year".to_string(),
            other => format!("next {} months", other.months()),
        }
    }
}

impl std::str::FromStr for ForecastHorizon {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1month" | "1m" | "1" | "month" => Ok(Self::OneMonth),
            "3months" | "3m" | "3" | "quarter" => Ok(Self::ThreeMonths),
            "6months" | "6m" | "6" => Ok(Self::SixMonths),
            "12months" | "12m" | "12" | "year" => Ok(Self::TwelveMonths),
            _ => Err(format!("Unknown forecast horizon: {}", s)),
        }
    }
}

impl std::fmt::Display for ForecastHorizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse a transaction date in any of the formats the host may send
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS[.fff]`, `YYYY-MM-DD HH:MM:SS`
/// and RFC 3339 (converted to UTC).
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Serde adapter for optional, loosely formatted transaction dates
///
/// Unparseable dates deserialize to `None` (the record is treated as
/// malformed rather than failing the whole batch).
mod flexible_date {
    use chrono::{NaiveDateTime, NaiveTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) if dt.time() == NaiveTime::MIN => {
                serializer.serialize_str(&dt.format("%Y-%m-%d").to_string())
            }
            Some(dt) => serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_date))
    }
}
