//! Shared utilities for analysis commands
//!
//! This module contains:
//! - `EngineOptions` / `load_config` / `build_engine` - Engine setup from global flags
//! - `load_input` - Read transactions and categories from JSON or CSV
//! - `parse_as_of` / `parse_horizon` - Argument parsing helpers

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fintel_core::models::parse_date;
use fintel_core::{Category, EngineConfig, ForecastHorizon, IntelligenceEngine, Transaction};
use serde::Deserialize;
use tracing::debug;

use crate::cli::InputArgs;

/// Global flags that shape the engine
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub config: Option<PathBuf>,
    pub no_remote: bool,
    pub json: bool,
}

/// Engine config from `--config`, else the data directory override
pub fn load_config(opts: &EngineOptions) -> Result<EngineConfig> {
    match opts.config {
        Some(ref path) => EngineConfig::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => EngineConfig::load().context("Failed to load engine config"),
    }
}

/// Load configuration and pick the remote backend
pub fn build_engine(opts: &EngineOptions) -> Result<IntelligenceEngine> {
    let engine = IntelligenceEngine::new(load_config(opts)?);
    if opts.no_remote {
        return Ok(engine);
    }
    Ok(engine.with_env_backend())
}

/// JSON input document
#[derive(Debug, Deserialize)]
pub struct InputDocument {
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// One CSV row; unparseable fields become missing values
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<f64>,
    #[serde(default)]
    category_id: Option<String>,
    #[serde(default)]
    merchant: Option<String>,
}

impl From<CsvRow> for Transaction {
    fn from(row: CsvRow) -> Self {
        Transaction {
            id: row.id,
            date: row.date.as_deref().and_then(parse_date),
            description: row.description,
            amount: row.amount,
            category_id: row.category_id.filter(|c| !c.is_empty()),
            merchant: row.merchant.filter(|m| !m.is_empty()),
        }
    }
}

/// Read transactions and categories from the input flags
pub fn load_input(input: &InputArgs) -> Result<(Vec<Transaction>, Vec<Category>)> {
    if let Some(ref path) = input.input {
        let doc = read_json_document(path)?;
        debug!(
            transactions = doc.transactions.len(),
            categories = doc.categories.len(),
            "Loaded JSON input"
        );
        return Ok((doc.transactions, doc.categories));
    }

    if let Some(ref path) = input.csv {
        let file =
            File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
        let transactions = parse_csv_transactions(file)?;
        let categories = match input.categories {
            Some(ref path) => read_categories(path)?,
            None => Vec::new(),
        };
        debug!(
            transactions = transactions.len(),
            categories = categories.len(),
            "Loaded CSV input"
        );
        return Ok((transactions, categories));
    }

    anyhow::bail!("No input given. Use --input <json> or --csv <file>")
}

fn read_json_document(path: &Path) -> Result<InputDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid input document: {}", path.display()))
}

fn read_categories(path: &Path) -> Result<Vec<Category>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read categories: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid categories file: {}", path.display()))
}

/// Parse transactions from CSV
pub fn parse_csv_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut transactions = Vec::new();
    for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row.with_context(|| format!("Invalid CSV row {}", line + 2))?;
        transactions.push(row.into());
    }
    Ok(transactions)
}

/// Generation time from `--as-of`, or now
pub fn parse_as_of(value: Option<&str>) -> Result<DateTime<Utc>> {
    match value {
        None => Ok(Utc::now()),
        Some(s) => parse_date(s)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| anyhow::anyhow!("Invalid --as-of date: {} (use YYYY-MM-DD)", s)),
    }
}

pub fn parse_horizon(value: &str) -> Result<ForecastHorizon> {
    value.parse().map_err(|e: String| anyhow::anyhow!(e))
}
