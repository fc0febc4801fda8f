//! Analysis orchestration
//!
//! Every analysis runs the same two-step pipeline:
//! 1. If a remote model is configured and enabled, render the analysis prompt,
//!    call the model under the per-analysis timeout and validate its JSON
//!    against the input.
//! 2. On any failure, or without a remote model, run the heuristic.
//!
//! The heuristic never starts before the remote attempt has resolved, and a
//! timed-out request is dropped, so a fallback result is exactly the
//! heuristic result. There is no retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::activity::{input_digest, ActivityEntry, ActivityLogger, TracingActivityLogger};
use crate::ai::{parsing, AIBackend, AIClient};
use crate::anomalies::AnomalyDetector;
use crate::categorize::categorize;
use crate::config::{AnalysisKind, EngineConfig};
use crate::error::{Error, Result};
use crate::forecast::Forecaster;
use crate::models::{Anomaly, Category, ForecastHorizon, Pattern, Prediction, Transaction};
use crate::patterns::PatternDetector;
use crate::prompts::PromptLibrary;

/// Where an analysis result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Remote,
    Heuristic,
}

impl AnalysisSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Heuristic => "heuristic",
        }
    }
}

impl std::fmt::Display for AnalysisSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one analysis call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome<T> {
    pub data: T,
    pub source: AnalysisSource,
    /// Why the remote attempt was abandoned (None if it was not attempted)
    pub fallback_reason: Option<String>,
    /// Remote model that produced or was asked for the result
    pub model: Option<String>,
}

impl<T> AnalysisOutcome<T> {
    /// Whether a remote attempt failed and the heuristic answered instead
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Input for running every analysis at once
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub transactions: Vec<Transaction>,
    pub categories: Vec<Category>,
    pub horizon: ForecastHorizon,
    /// Generation time for anomalies and predictions
    pub as_of: DateTime<Utc>,
}

/// Results of all four analyses
#[derive(Debug, Clone, Serialize)]
pub struct FullAnalysis {
    pub categorized: AnalysisOutcome<Vec<Transaction>>,
    pub patterns: AnalysisOutcome<Vec<Pattern>>,
    pub anomalies: AnalysisOutcome<Vec<Anomaly>>,
    pub predictions: AnalysisOutcome<Vec<Prediction>>,
}

/// The transaction intelligence engine
#[derive(Clone)]
pub struct IntelligenceEngine {
    ai: Option<AIClient>,
    config: EngineConfig,
    prompts: PromptLibrary,
    activity: Arc<dyn ActivityLogger>,
    activity_timeout: Duration,
}

/// Longest an activity sink may hold up an analysis result
const ACTIVITY_LOG_TIMEOUT: Duration = Duration::from_millis(500);

impl Default for IntelligenceEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl IntelligenceEngine {
    /// Heuristic-only engine with the given configuration
    pub fn new(config: EngineConfig) -> Self {
        Self {
            ai: None,
            config,
            prompts: PromptLibrary::new(),
            activity: Arc::new(TracingActivityLogger),
            activity_timeout: ACTIVITY_LOG_TIMEOUT,
        }
    }

    /// Attach the remote backend named by `AI_BACKEND` and friends
    ///
    /// Leaves the engine heuristic-only when nothing is configured.
    pub fn with_env_backend(mut self) -> Self {
        self.ai = AIClient::from_env();
        if let Some(ref ai) = self.ai {
            info!(host = ai.host(), model = ai.model(), "Remote model configured");
        }
        self
    }

    pub fn with_ai(mut self, ai: AIClient) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn without_ai(mut self) -> Self {
        self.ai = None;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_activity_logger(mut self, logger: Arc<dyn ActivityLogger>) -> Self {
        self.activity = logger;
        self
    }

    /// Cap on how long `record` waits for the activity sink
    pub fn with_activity_timeout(mut self, timeout: Duration) -> Self {
        self.activity_timeout = timeout;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ai(&self) -> Option<&AIClient> {
        self.ai.as_ref()
    }

    /// Assign categories to uncategorized transactions
    pub async fn categorize(
        &self,
        transactions: &[Transaction],
        categories: &[Category],
    ) -> AnalysisOutcome<Vec<Transaction>> {
        self.run(
            AnalysisKind::CategorizeTransactions,
            transactions,
            || prompt_vars(transactions, Some(categories)),
            |text| parsing::parse_category_assignments(text, transactions, categories),
            || categorize(transactions, categories),
        )
        .await
    }

    /// Find recurring, trend and seasonal patterns
    pub async fn detect_patterns(
        &self,
        transactions: &[Transaction],
        categories: &[Category],
    ) -> AnalysisOutcome<Vec<Pattern>> {
        self.run(
            AnalysisKind::IdentifyPatterns,
            transactions,
            || prompt_vars(transactions, None),
            |text| parsing::parse_patterns(text, transactions),
            || {
                PatternDetector::with_config(self.config.patterns.clone())
                    .detect_with_categories(transactions, categories)
            },
        )
        .await
    }

    /// Flag unusual transactions
    pub async fn detect_anomalies(
        &self,
        transactions: &[Transaction],
        detected_at: DateTime<Utc>,
    ) -> AnalysisOutcome<Vec<Anomaly>> {
        self.run(
            AnalysisKind::DetectAnomalies,
            transactions,
            || prompt_vars(transactions, None),
            |text| parsing::parse_anomalies(text, transactions, detected_at),
            || {
                AnomalyDetector::new(detected_at)
                    .with_config(self.config.anomalies.clone())
                    .detect(transactions)
            },
        )
        .await
    }

    /// Forecast spending, income, budget status and savings
    ///
    /// The heuristic path categorizes first so uncategorized spending still
    /// counts toward its category.
    pub async fn generate_predictions(
        &self,
        transactions: &[Transaction],
        categories: &[Category],
        horizon: ForecastHorizon,
        as_of: DateTime<Utc>,
    ) -> AnalysisOutcome<Vec<Prediction>> {
        let build_vars = || {
            let mut vars = prompt_vars(transactions, Some(categories))?;
            vars.insert("horizon", horizon.label());
            vars.insert("as_of", as_of.date_naive().format("%Y-%m-%d").to_string());
            vars.insert(
                "budgets",
                categories
                    .iter()
                    .filter_map(|c| c.budget_amount.map(|b| format!("{} ({:.2})", c.name, b)))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            Ok(vars)
        };
        self.run(
            AnalysisKind::GeneratePredictions,
            transactions,
            build_vars,
            |text| parsing::parse_predictions(text, categories, as_of),
            || {
                Forecaster::new(as_of)
                    .with_config(self.config.forecast.clone())
                    .forecast(&categorize(transactions, categories), categories, horizon)
            },
        )
        .await
    }

    /// Run all four analyses concurrently
    pub async fn analyze_all(&self, request: &AnalysisRequest) -> FullAnalysis {
        let (categorized, patterns, anomalies, predictions) = tokio::join!(
            self.categorize(&request.transactions, &request.categories),
            self.detect_patterns(&request.transactions, &request.categories),
            self.detect_anomalies(&request.transactions, request.as_of),
            self.generate_predictions(
                &request.transactions,
                &request.categories,
                request.horizon,
                request.as_of
            ),
        );

        FullAnalysis {
            categorized,
            patterns,
            anomalies,
            predictions,
        }
    }

    /// Shared two-step pipeline
    async fn run<U, V, P, H>(
        &self,
        kind: AnalysisKind,
        transactions: &[Transaction],
        build_vars: V,
        parse: P,
        heuristic: H,
    ) -> AnalysisOutcome<Vec<U>>
    where
        V: FnOnce() -> Result<HashMap<&'static str, String>>,
        P: FnOnce(&str) -> Result<Vec<U>>,
        H: FnOnce() -> Vec<U>,
    {
        let started = Instant::now();

        let outcome = match self.remote_client() {
            None => AnalysisOutcome {
                data: heuristic(),
                source: AnalysisSource::Heuristic,
                fallback_reason: None,
                model: None,
            },
            Some(client) => {
                let model = client.model().to_string();
                let remote = self
                    .call_remote(client, kind, build_vars)
                    .await
                    .and_then(|text| parse(&text));
                match remote {
                    Ok(data) => {
                        debug!(analysis = %kind, model = %model, count = data.len(), "Remote analysis accepted");
                        AnalysisOutcome {
                            data,
                            source: AnalysisSource::Remote,
                            fallback_reason: None,
                            model: Some(model),
                        }
                    }
                    Err(e) => {
                        warn!(analysis = %kind, model = %model, error = %e, "Remote analysis failed, using heuristics");
                        AnalysisOutcome {
                            data: heuristic(),
                            source: AnalysisSource::Heuristic,
                            fallback_reason: Some(e.to_string()),
                            model: Some(model),
                        }
                    }
                }
            }
        };

        self.record(kind, &outcome, transactions, started).await;
        outcome
    }

    fn remote_client(&self) -> Option<&AIClient> {
        if self.config.remote.enabled {
            self.ai.as_ref()
        } else {
            None
        }
    }

    async fn call_remote<V>(&self, client: &AIClient, kind: AnalysisKind, build_vars: V) -> Result<String>
    where
        V: FnOnce() -> Result<HashMap<&'static str, String>>,
    {
        let vars = build_vars()?;
        let prompt = self.prompts.get(kind)?.render_parts(&vars);
        let timeout = self.config.remote.timeout_for(kind);

        debug!(analysis = %kind, timeout_ms = timeout.as_millis() as u64, "Calling remote model");
        match tokio::time::timeout(timeout, client.generate(&prompt.user, prompt.system.as_deref())).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(timeout.as_millis())),
        }
    }

    async fn record<U>(
        &self,
        kind: AnalysisKind,
        outcome: &AnalysisOutcome<Vec<U>>,
        transactions: &[Transaction],
        started: Instant,
    ) {
        let entry = ActivityEntry::analysis(
            kind.as_str(),
            serde_json::json!({
                "source": outcome.source.as_str(),
                "model": outcome.model,
                "fallback_reason": outcome.fallback_reason,
                "input_count": transactions.len(),
                "output_count": outcome.data.len(),
                "input_digest": input_digest(transactions),
                "duration_ms": started.elapsed().as_millis() as u64,
            }),
        );
        match tokio::time::timeout(self.activity_timeout, self.activity.log(entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(analysis = %kind, error = %e, "Activity logger failed"),
            Err(_) => warn!(
                analysis = %kind,
                timeout_ms = self.activity_timeout.as_millis() as u64,
                "Activity logger timed out; entry dropped"
            ),
        }
    }
}

/// Template variables shared by every prompt
fn prompt_vars(
    transactions: &[Transaction],
    categories: Option<&[Category]>,
) -> Result<HashMap<&'static str, String>> {
    let mut vars = HashMap::new();
    vars.insert("transactions", serde_json::to_string_pretty(transactions)?);
    if let Some(categories) = categories {
        vars.insert("categories", serde_json::to_string_pretty(categories)?);
    }
    Ok(vars)
}
