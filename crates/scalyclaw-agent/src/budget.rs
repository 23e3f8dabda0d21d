//! Budget checks (spec.md §4.15): a pure function of config + `getCostStats`.

use chrono::{Datelike, Utc};
use scalyclaw_core::config::BudgetConfig;
use scalyclaw_memory::error::Result;
use scalyclaw_memory::manager::MemoryManager;
use scalyclaw_memory::types::Pricing;

/// Heuristic per-model pricing table (USD per million tokens), used when no
/// provider-specific price list is wired in. Figures are ballpark list
/// prices for the model families the orchestrator is likely to hit; callers
/// with real billing data should pass their own `pricing` closure instead.
pub fn default_pricing(model: &str) -> Pricing {
    let m = model.to_ascii_lowercase();
    if m.contains("opus") {
        Pricing { input_per_million: 15.0, output_per_million: 75.0 }
    } else if m.contains("sonnet") || m.contains("claude") {
        Pricing { input_per_million: 3.0, output_per_million: 15.0 }
    } else if m.contains("haiku") {
        Pricing { input_per_million: 0.8, output_per_million: 4.0 }
    } else if m.contains("gpt-4o") || m.contains("gpt-4.1") {
        Pricing { input_per_million: 2.5, output_per_million: 10.0 }
    } else if m.contains("o1") || m.contains("o3") {
        Pricing { input_per_million: 15.0, output_per_million: 60.0 }
    } else if m.contains("gemini") {
        Pricing { input_per_million: 1.25, output_per_million: 5.0 }
    } else {
        Pricing { input_per_million: 1.0, output_per_million: 3.0 }
    }
}

/// Outcome of a budget check, handed back to callers of the orchestrator /
/// agent runner so they can deny new runs and surface alerts.
#[derive(Debug, Clone)]
pub struct BudgetStatus {
    pub allowed: bool,
    pub current_day_cost: f64,
    pub current_month_cost: f64,
    pub daily_limit: Option<f64>,
    pub monthly_limit: Option<f64>,
    pub hard_limit: bool,
    pub alerts: Vec<String>,
}

/// Evaluate the current spend against `cfg`'s limits.
///
/// Denies (sets `allowed = false`) only when `hard_limit` is set and either
/// limit configured is exceeded. Alerts fire once per configured percentage
/// threshold crossed, independent of `hard_limit`.
pub fn check(cfg: &BudgetConfig, memory: &MemoryManager, pricing: impl Fn(&str) -> Pricing) -> Result<BudgetStatus> {
    let now = Utc::now();
    let day_start = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    let month_start = now
        .date_naive()
        .with_day(1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();

    let day_cost = memory.get_cost_stats(&pricing, Some(day_start), Some(now))?.total_usd;
    let month_cost = memory.get_cost_stats(&pricing, Some(month_start), Some(now))?.total_usd;

    let mut alerts = Vec::new();
    for pct in &cfg.alert_thresholds_pct {
        if let Some(limit) = cfg.daily_limit_usd {
            if limit > 0.0 && day_cost >= limit * (*pct as f64 / 100.0) {
                alerts.push(format!("daily spend at {pct}% of limit (${day_cost:.2}/${limit:.2})"));
            }
        }
        if let Some(limit) = cfg.monthly_limit_usd {
            if limit > 0.0 && month_cost >= limit * (*pct as f64 / 100.0) {
                alerts.push(format!("monthly spend at {pct}% of limit (${month_cost:.2}/${limit:.2})"));
            }
        }
    }

    let day_exceeded = cfg.daily_limit_usd.is_some_and(|l| day_cost > l);
    let month_exceeded = cfg.monthly_limit_usd.is_some_and(|l| month_cost > l);
    let allowed = !(cfg.hard_limit && (day_exceeded || month_exceeded));

    Ok(BudgetStatus {
        allowed,
        current_day_cost: day_cost,
        current_month_cost: month_cost,
        daily_limit: cfg.daily_limit_usd,
        monthly_limit: cfg.monthly_limit_usd,
        hard_limit: cfg.hard_limit,
        alerts,
    })
}
