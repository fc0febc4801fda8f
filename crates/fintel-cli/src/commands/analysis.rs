//! Analysis command implementations

use std::collections::HashMap;

use anyhow::Result;
use fintel_core::{
    AnalysisOutcome, AnalysisRequest, AnalysisSource, Anomaly, Category, Pattern, Prediction,
    Transaction,
};
use serde::Serialize;

use super::core::{build_engine, load_input, parse_as_of, parse_horizon, EngineOptions};
use super::truncate;
use crate::cli::InputArgs;

pub async fn cmd_categorize(opts: &EngineOptions, input: &InputArgs) -> Result<()> {
    let engine = build_engine(opts)?;
    let (transactions, categories) = load_input(input)?;

    let outcome = engine.categorize(&transactions, &categories).await;
    if opts.json {
        return print_json(&outcome);
    }

    print_source(&outcome);
    print_categorized(&transactions, &outcome.data, &categories);
    Ok(())
}

pub async fn cmd_patterns(opts: &EngineOptions, input: &InputArgs) -> Result<()> {
    let engine = build_engine(opts)?;
    let (transactions, categories) = load_input(input)?;

    let outcome = engine.detect_patterns(&transactions, &categories).await;
    if opts.json {
        return print_json(&outcome);
    }

    print_source(&outcome);
    print_patterns(&outcome.data);
    Ok(())
}

pub async fn cmd_anomalies(opts: &EngineOptions, input: &InputArgs, as_of: Option<&str>) -> Result<()> {
    let engine = build_engine(opts)?;
    let (transactions, _) = load_input(input)?;
    let detected_at = parse_as_of(as_of)?;

    let outcome = engine.detect_anomalies(&transactions, detected_at).await;
    if opts.json {
        return print_json(&outcome);
    }

    print_source(&outcome);
    print_anomalies(&outcome.data);
    Ok(())
}

pub async fn cmd_predict(
    opts: &EngineOptions,
    input: &InputArgs,
    horizon: &str,
    as_of: Option<&str>,
) -> Result<()> {
    let engine = build_engine(opts)?;
    let (transactions, categories) = load_input(input)?;
    let horizon = parse_horizon(horizon)?;
    let as_of = parse_as_of(as_of)?;

    let outcome = engine
        .generate_predictions(&transactions, &categories, horizon, as_of)
        .await;
    if opts.json {
        return print_json(&outcome);
    }

    println!("🔮 Forecast for the {}\n", horizon.label());
    print_source(&outcome);
    print_predictions(&outcome.data, &categories);
    Ok(())
}

pub async fn cmd_analyze(
    opts: &EngineOptions,
    input: &InputArgs,
    horizon: &str,
    as_of: Option<&str>,
) -> Result<()> {
    let engine = build_engine(opts)?;
    let (transactions, categories) = load_input(input)?;
    let request = AnalysisRequest {
        transactions,
        categories,
        horizon: parse_horizon(horizon)?,
        as_of: parse_as_of(as_of)?,
    };

    let result = engine.analyze_all(&request).await;
    if opts.json {
        return print_json(&result);
    }

    println!("📊 Analyzed {} transactions\n", request.transactions.len());

    println!("== Categories ==");
    print_source(&result.categorized);
    print_categorized(&request.transactions, &result.categorized.data, &request.categories);

    println!("\n== Patterns ==");
    print_source(&result.patterns);
    print_patterns(&result.patterns.data);

    println!("\n== Anomalies ==");
    print_source(&result.anomalies);
    print_anomalies(&result.anomalies.data);

    println!("\n== Predictions ({}) ==", request.horizon.label());
    print_source(&result.predictions);
    print_predictions(&result.predictions.data, &request.categories);

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One line saying where the results came from
pub fn source_line<T>(outcome: &AnalysisOutcome<T>) -> String {
    match (outcome.source, &outcome.model, &outcome.fallback_reason) {
        (AnalysisSource::Remote, Some(model), _) => format!("Source: remote model {}", model),
        (AnalysisSource::Remote, None, _) => "Source: remote model".to_string(),
        (AnalysisSource::Heuristic, _, Some(reason)) => {
            format!("Source: heuristics (remote failed: {})", truncate(reason, 60))
        }
        (AnalysisSource::Heuristic, _, None) => "Source: heuristics".to_string(),
    }
}

fn print_source<T>(outcome: &AnalysisOutcome<T>) {
    println!("{}\n", source_line(outcome));
}

fn category_names(categories: &[Category]) -> HashMap<&str, &str> {
    categories
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect()
}

fn print_categorized(before: &[Transaction], after: &[Transaction], categories: &[Category]) {
    let names = category_names(categories);
    let mut assigned = 0;

    println!("{:<12} {:<40} {}", "ID", "DESCRIPTION", "CATEGORY");
    println!("{}", "-".repeat(72));
    for (old, new) in before.iter().zip(after) {
        let category = match new.category_id.as_deref() {
            Some(id) => names.get(id).copied().unwrap_or(id),
            None => "-",
        };
        let marker = if old.category_id.is_none() && new.category_id.is_some() {
            assigned += 1;
            " (new)"
        } else {
            ""
        };
        println!(
            "{:<12} {:<40} {}{}",
            truncate(&new.id, 12),
            truncate(&new.description, 40),
            category,
            marker
        );
    }

    println!();
    println!("✅ Assigned {} of {} transactions", assigned, after.len());
}

fn print_patterns(patterns: &[Pattern]) {
    if patterns.is_empty() {
        println!("No patterns found.");
        return;
    }

    println!(
        "{:<10} {:<36} {:>10}  {:<12} {:>5}",
        "KIND", "NAME", "AMOUNT", "FREQUENCY", "CONF"
    );
    println!("{}", "-".repeat(80));
    for p in patterns {
        println!(
            "{:<10} {:<36} {:>10.2}  {:<12} {:>4.0}%",
            p.kind.as_str(),
            truncate(&p.name, 36),
            p.amount,
            p.frequency.as_deref().unwrap_or("-"),
            p.confidence_score * 100.0
        );
    }
}

fn print_anomalies(anomalies: &[Anomaly]) {
    if anomalies.is_empty() {
        println!("✅ Nothing unusual.");
        return;
    }

    println!(
        "{:<20} {:<8} {:<12} {}",
        "KIND", "SEVERITY", "TRANSACTION", "DESCRIPTION"
    );
    println!("{}", "-".repeat(80));
    for a in anomalies {
        let icon = match a.severity.as_str() {
            "high" => "🔴",
            "medium" => "🟡",
            _ => "⚪",
        };
        println!(
            "{:<20} {} {:<5} {:<12} {}",
            a.kind.as_str(),
            icon,
            a.severity.as_str(),
            truncate(&a.transaction_id, 12),
            truncate(&a.description, 50)
        );
    }
}

fn print_predictions(predictions: &[Prediction], categories: &[Category]) {
    if predictions.is_empty() {
        println!("Not enough history to forecast.");
        return;
    }

    let names = category_names(categories);
    println!(
        "{:<9} {:<20} {:>10}  {:<10} {:>5}  {}",
        "KIND", "CATEGORY", "AMOUNT", "BY", "CONF", "STATUS"
    );
    println!("{}", "-".repeat(72));
    for p in predictions {
        let category = p
            .category_id
            .as_deref()
            .map(|id| names.get(id).copied().unwrap_or(id))
            .unwrap_or("-");
        println!(
            "{:<9} {:<20} {:>10.2}  {:<10} {:>4.0}%  {}",
            p.kind.as_str(),
            truncate(category, 20),
            p.amount,
            p.target_date.format("%Y-%m-%d").to_string(),
            p.confidence_score * 100.0,
            p.budget_status.map(|s| s.as_str()).unwrap_or("")
        );
    }
}
