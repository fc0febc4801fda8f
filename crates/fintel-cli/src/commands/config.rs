//! Config-related command implementations

use anyhow::Result;
use fintel_core::config::{default_config_path, AnalysisKind, MerchantHistoryWindow};

use super::core::{load_config, EngineOptions};

/// Show the effective configuration
pub fn cmd_config_show(opts: &EngineOptions) -> Result<()> {
    let config = load_config(opts)?;

    println!("[remote]");
    println!("  enabled:            {}", config.remote.enabled);
    println!("  default timeout:    {} ms", config.remote.default_timeout.as_millis());
    for kind in AnalysisKind::all() {
        println!(
            "  {:<24}  {} ms",
            kind.as_str(),
            config.remote.timeout_for(*kind).as_millis()
        );
    }

    let p = &config.patterns;
    println!("\n[patterns]");
    println!("  min occurrences:    {}", p.min_occurrences);
    println!("  gap tolerance:      {} days", p.gap_tolerance_days);
    println!("  recurring conf.:    {:.2}", p.recurring_confidence);
    println!("  trend min R²:       {:.2}", p.trend_min_r_squared);
    println!("  trend min months:   {}", p.trend_min_consecutive_months);
    println!("  seasonal uplift:    {:.0}%", p.seasonal_min_uplift * 100.0);
    println!("  seasonal max cv:    {:.2}", p.seasonal_max_cv);

    let a = &config.anomalies;
    println!("\n[anomalies]");
    println!("  threshold:          mean + {}σ", a.sigma_multiplier);
    println!("  high severity at:   {}× threshold", a.high_severity_factor);
    println!("  duplicate window:   {} h", a.duplicate_window.num_hours());
    println!("  amount tolerance:   {}", a.duplicate_amount_tolerance);
    match a.merchant_history {
        MerchantHistoryWindow::AllTime => println!("  merchant history:   all time"),
        MerchantHistoryWindow::RollingDays(days) => {
            println!("  merchant history:   last {} days", days)
        }
    }

    println!("\n[forecast]");
    println!("  lookback:           {} months", config.forecast.lookback_months);
    println!("  at-risk ratio:      {:.2}", config.forecast.at_risk_ratio);

    Ok(())
}

/// Show the path where the config override should be placed
pub fn cmd_config_path() -> Result<()> {
    match default_config_path() {
        Some(path) => {
            println!("{}", path.display());
            if !path.exists() {
                eprintln!();
                eprintln!("Note: No override file yet; built-in defaults are in use.");
            }
        }
        None => {
            eprintln!("Could not determine config directory.");
            eprintln!("The data directory is not available on this system.");
        }
    }

    Ok(())
}
