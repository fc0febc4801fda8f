//! Remote model command implementations

use anyhow::Result;
use fintel_core::ai::{AIBackend, AIClient};
use fintel_core::{AnalysisSource, Category, EngineConfig, IntelligenceEngine, Transaction};

/// Check the configured backend and run a sample categorization through it
pub async fn cmd_remote_test() -> Result<()> {
    println!("🔍 Testing remote model connection...\n");

    let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());
    println!("  AI_BACKEND: {}", backend);

    let Some(client) = AIClient::from_env() else {
        println!("\n⚠️  No remote model configured; all analyses use heuristics.");
        println!("\nTo use Ollama:");
        println!("  1. Install Ollama: https://ollama.ai/download");
        println!("  2. Start the server: ollama serve");
        println!("  3. Pull a model: ollama pull llama3.2");
        println!("  4. Set environment variable: export OLLAMA_HOST=http://localhost:11434");
        return Ok(());
    };
    println!("  Host:  {}", client.host());
    println!("  Model: {}\n", client.model());

    print!("Checking availability... ");
    if client.health_check().await {
        println!("✅ Connected");
    } else {
        println!("❌ Failed");
        println!("\n⚠️  Could not reach {}", client.host());
        return Ok(());
    }

    println!("\n📋 Sample categorization...\n");
    let today = chrono::Utc::now().date_naive();
    let transactions = vec![
        Transaction::new("s1", today, "TRADER JOE'S #552", -54.20),
        Transaction::new("s2", today, "NETFLIX.COM", -15.99),
        Transaction::new("s3", today, "SHELL OIL 12345", -41.00),
    ];
    let categories = vec![
        Category::new("groceries", "Groceries"),
        Category::new("entertainment", "Entertainment"),
        Category::new("transportation", "Transportation"),
    ];

    let config = EngineConfig::load().unwrap_or_default();
    let engine = IntelligenceEngine::new(config).with_ai(client);
    let outcome = engine.categorize(&transactions, &categories).await;

    for t in &outcome.data {
        println!(
            "  \"{}\" → {}",
            t.description,
            t.category_id.as_deref().unwrap_or("(none)")
        );
    }

    println!();
    match outcome.source {
        AnalysisSource::Remote => println!("✅ Remote model answered with valid output"),
        AnalysisSource::Heuristic => println!(
            "⚠️  Fell back to heuristics: {}",
            outcome.fallback_reason.as_deref().unwrap_or("unknown")
        ),
    }

    Ok(())
}
