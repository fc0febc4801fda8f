//! Fintel Core Library
//!
//! Transaction intelligence for personal finance applications:
//! - Keyword categorization of uncategorized transactions
//! - Recurring, trend and seasonal pattern detection
//! - Anomaly detection (unusual amounts, duplicates, new merchants)
//! - Spending, income, budget and savings forecasts
//! - Pluggable remote models (Ollama, OpenAI-compatible) with heuristic fallback
//! - Prompt library for customizable AI prompts
//!
//! The free functions below are the pure heuristics. [`IntelligenceEngine`]
//! wraps them with the remote-first pipeline and activity logging.

pub mod activity;
pub mod ai;
pub mod anomalies;
pub mod categorize;
pub mod config;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod models;
pub mod patterns;
pub mod prompts;
pub mod stats;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use activity::{
    ActivityEntry, ActivityLogger, MemoryActivityLogger, NoopActivityLogger, TracingActivityLogger,
};
pub use ai::{AIBackend, AIClient, MockBackend, OllamaBackend, OpenAICompatibleBackend};
pub use anomalies::{detect_anomalies, AnomalyDetector};
pub use categorize::{categorize, Categorizer, CategoryRule};
pub use config::{AnalysisKind, EngineConfig};
pub use engine::{AnalysisOutcome, AnalysisRequest, AnalysisSource, FullAnalysis, IntelligenceEngine};
pub use error::{Error, Result};
pub use forecast::{generate_predictions, Forecaster};
pub use models::{
    Anomaly, AnomalyKind, AnomalyStatus, BudgetStatus, Category, ForecastHorizon, Pattern,
    PatternKind, Prediction, PredictionKind, Severity, Transaction,
};
pub use patterns::{detect_patterns, PatternDetector};
pub use prompts::{Prompt, PromptInfo, PromptLibrary};
