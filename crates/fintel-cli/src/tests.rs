//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use chrono::{Datelike, Timelike};
use clap::Parser;
use fintel_core::{ForecastHorizon, MockBackend, AIClient};

use crate::cli::{Cli, Commands, InputArgs};
use crate::commands::{self, truncate, EngineOptions};

const INPUT_JSON: &str = r#"{
    "transactions": [
        {"id": "n1", "date": "2024-01-15", "description": "NETFLIX.COM", "amount": -15.99},
        {"id": "n2", "date": "2024-02-15", "description": "NETFLIX.COM", "amount": -15.99},
        {"id": "n3", "date": "2024-03-15", "description": "NETFLIX.COM", "amount": -15.99},
        {"id": "g1", "date": "2024-03-16", "description": "Corner Grocery", "amount": -180.0},
        {"id": "g2", "date": "2024-03-28", "description": "Farmers Market", "amount": -150.0}
    ],
    "categories": [
        {"id": "groc", "name": "Groceries", "budget_amount": 300.0},
        {"id": "fun", "name": "Entertainment"}
    ]
}"#;

fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn json_input(file: &tempfile::NamedTempFile) -> InputArgs {
    InputArgs {
        input: Some(file.path().to_path_buf()),
        csv: None,
        categories: None,
    }
}

fn offline() -> EngineOptions {
    EngineOptions {
        config: None,
        no_remote: true,
        json: false,
    }
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_cli_parses_predict() {
    let cli = Cli::try_parse_from([
        "fintel",
        "predict",
        "--input",
        "data.json",
        "--horizon",
        "6months",
        "--no-remote",
    ])
    .unwrap();
    assert!(cli.no_remote);
    match cli.command {
        Commands::Predict { input, horizon, as_of } => {
            assert_eq!(input.input.unwrap().to_str(), Some("data.json"));
            assert_eq!(horizon, "6months");
            assert!(as_of.is_none());
        }
        _ => panic!("expected predict"),
    }
}

#[test]
fn test_cli_rejects_json_and_csv_together() {
    let result = Cli::try_parse_from(["fintel", "patterns", "--input", "a.json", "--csv", "b.csv"]);
    assert!(result.is_err());
}

#[test]
fn test_parse_horizon() {
    assert_eq!(commands::parse_horizon("12months").unwrap(), ForecastHorizon::TwelveMonths);
    assert!(commands::parse_horizon("fortnight").is_err());
}

#[test]
fn test_parse_as_of() {
    let as_of = commands::parse_as_of(Some("2024-04-01")).unwrap();
    assert_eq!((as_of.year(), as_of.month(), as_of.day()), (2024, 4, 1));
    assert_eq!(as_of.hour(), 0);

    assert!(commands::parse_as_of(Some("04/01/2024")).is_err());
    assert!(commands::parse_as_of(None).is_ok());
}

// ========== Input Loading Tests ==========

#[test]
fn test_load_json_input() {
    let file = write_temp(INPUT_JSON, ".json");
    let (transactions, categories) = commands::load_input(&json_input(&file)).unwrap();
    assert_eq!(transactions.len(), 5);
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].budget_amount, Some(300.0));
}

#[test]
fn test_load_csv_input_with_categories() {
    let csv = "id,date,description,amount,category_id\n\
               t1,2024-03-01,Corner Grocery,-20.50,\n\
               t2,2024-03-02,Rent,-1200,housing\n\
               t3,not a date,Broken,abc,\n";
    let csv_file = write_temp(csv, ".csv");
    let cats_file = write_temp(r#"[{"id": "groc", "name": "Groceries"}]"#, ".json");

    let input = InputArgs {
        input: None,
        csv: Some(csv_file.path().to_path_buf()),
        categories: Some(cats_file.path().to_path_buf()),
    };
    let (transactions, categories) = commands::load_input(&input).unwrap();

    assert_eq!(transactions.len(), 3);
    assert_eq!(transactions[0].amount, Some(-20.5));
    assert!(transactions[0].category_id.is_none());
    assert_eq!(transactions[1].category_id.as_deref(), Some("housing"));
    // Malformed row passes through with missing fields
    assert!(transactions[2].date.is_none());
    assert!(transactions[2].amount.is_none());
    assert_eq!(categories.len(), 1);
}

#[test]
fn test_load_input_requires_a_source() {
    let input = InputArgs {
        input: None,
        csv: None,
        categories: None,
    };
    assert!(commands::load_input(&input).is_err());
}

#[test]
fn test_load_invalid_json_fails() {
    let file = write_temp("{not json", ".json");
    assert!(commands::load_input(&json_input(&file)).is_err());
}

// ========== Engine Setup Tests ==========

#[test]
fn test_build_engine_with_config_file() {
    let config = write_temp("[forecast]\nlookback_months = 6\n", ".toml");
    let opts = EngineOptions {
        config: Some(config.path().to_path_buf()),
        ..offline()
    };
    let engine = commands::build_engine(&opts).unwrap();
    assert_eq!(engine.config().forecast.lookback_months, 6);
    assert!(engine.ai().is_none());
}

#[test]
fn test_build_engine_with_bad_config_fails() {
    let config = write_temp("[anomalies]\nmerchant_history = \"sometimes\"\n", ".toml");
    let opts = EngineOptions {
        config: Some(config.path().to_path_buf()),
        ..offline()
    };
    assert!(commands::build_engine(&opts).is_err());
}

// ========== Analysis Command Tests ==========

#[tokio::test]
async fn test_cmd_categorize() {
    let file = write_temp(INPUT_JSON, ".json");
    assert!(commands::cmd_categorize(&offline(), &json_input(&file)).await.is_ok());
}

#[tokio::test]
async fn test_cmd_patterns_json_output() {
    let file = write_temp(INPUT_JSON, ".json");
    let opts = EngineOptions {
        json: true,
        ..offline()
    };
    assert!(commands::cmd_patterns(&opts, &json_input(&file)).await.is_ok());
}

#[tokio::test]
async fn test_cmd_anomalies() {
    let file = write_temp(INPUT_JSON, ".json");
    let result = commands::cmd_anomalies(&offline(), &json_input(&file), Some("2024-04-01")).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cmd_predict_invalid_horizon() {
    let file = write_temp(INPUT_JSON, ".json");
    let result = commands::cmd_predict(&offline(), &json_input(&file), "2weeks", None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cmd_analyze() {
    let file = write_temp(INPUT_JSON, ".json");
    let result =
        commands::cmd_analyze(&offline(), &json_input(&file), "1month", Some("2024-04-01")).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_source_line() {
    let engine = fintel_core::IntelligenceEngine::default()
        .with_ai(AIClient::Mock(MockBackend::new().with_error("connection refused")));
    let outcome = engine.categorize(&[], &[]).await;
    let line = commands::source_line(&outcome);
    assert!(line.starts_with("Source: heuristics (remote failed"));

    let engine = fintel_core::IntelligenceEngine::default();
    let outcome = engine.categorize(&[], &[]).await;
    assert_eq!(commands::source_line(&outcome), "Source: heuristics");
}

// ========== Prompts / Config Command Tests ==========

#[test]
fn test_cmd_prompts_list() {
    assert!(commands::cmd_prompts_list().is_ok());
}

#[test]
fn test_cmd_prompts_show() {
    assert!(commands::cmd_prompts_show("detect_anomalies").is_ok());
    // Unknown ids print the available list instead of failing
    assert!(commands::cmd_prompts_show("classify_merchant").is_ok());
}

#[test]
fn test_cmd_config_show() {
    assert!(commands::cmd_config_show(&offline()).is_ok());
}

// ========== Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly 10", 10), "exactly 10");
    assert_eq!(truncate("this is a long description", 10), "this is...");
    assert_eq!(truncate("café au lait", 7), "café...");
}
