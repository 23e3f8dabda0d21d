//! Two-tier weighted model selection (spec.md §4.7 step 5).
//!
//! Tries the orchestrator-scoped pool first, then falls back to the global
//! enabled pool. Within a pool, the lowest `priority` wins; ties within that
//! priority are broken by a weighted-random draw over `weight`.

use rand::Rng;
use scalyclaw_core::config::WeightedModel;

/// Pick a model name from `orchestrator_pool`, falling back to `global_pool`.
/// Returns `None` if both pools are empty — callers must treat this as the
/// "model selection returns nothing" edge case (spec.md §4.7) and fail with
/// an actionable error rather than silently defaulting.
pub fn select_model(orchestrator_pool: &[WeightedModel], global_pool: &[WeightedModel]) -> Option<String> {
    select_from_pool(orchestrator_pool).or_else(|| select_from_pool(global_pool))
}

fn select_from_pool(pool: &[WeightedModel]) -> Option<String> {
    if pool.is_empty() {
        return None;
    }
    let min_priority = pool.iter().map(|m| m.priority).min()?;
    let candidates: Vec<&WeightedModel> = pool.iter().filter(|m| m.priority == min_priority).collect();
    if candidates.len() == 1 {
        return Some(candidates[0].model.clone());
    }
    weighted_pick(&candidates)
}

fn weighted_pick(candidates: &[&WeightedModel]) -> Option<String> {
    let total_weight: u32 = candidates.iter().map(|m| m.weight.max(1)).sum();
    if total_weight == 0 {
        return candidates.first().map(|m| m.model.clone());
    }
    let mut roll = rand::thread_rng().gen_range(0..total_weight);
    for model in candidates {
        let w = model.weight.max(1);
        if roll < w {
            return Some(model.model.clone());
        }
        roll -= w;
    }
    candidates.last().map(|m| m.model.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, priority: u32, weight: u32) -> WeightedModel {
        WeightedModel { model: name.to_string(), priority, weight }
    }

    #[test]
    fn empty_pools_yield_none() {
        assert!(select_model(&[], &[]).is_none());
    }

    #[test]
    fn falls_back_to_global_pool_when_orchestrator_pool_empty() {
        let global = vec![model("claude-haiku-4-5", 0, 1)];
        assert_eq!(select_model(&[], &global), Some("claude-haiku-4-5".to_string()));
    }

    #[test]
    fn lower_priority_wins_over_higher() {
        let pool = vec![model("fallback", 5, 1), model("primary", 0, 1)];
        assert_eq!(select_model(&pool, &[]), Some("primary".to_string()));
    }

    #[test]
    fn single_candidate_at_min_priority_is_deterministic() {
        let pool = vec![model("only", 1, 3), model("other", 2, 100)];
        assert_eq!(select_model(&pool, &[]), Some("only".to_string()));
    }

    #[test]
    fn weighted_pick_only_returns_tied_priority_candidates() {
        let pool = vec![model("a", 0, 1), model("b", 0, 1), model("c", 9, 1000)];
        for _ in 0..20 {
            let picked = select_model(&pool, &[]).unwrap();
            assert!(picked == "a" || picked == "b");
        }
    }
}
