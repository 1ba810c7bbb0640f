//! Selection policies: pure functions from a child's visit statistics and its
//! parent's total visit count to a real-valued score used by the tree policy's
//! best-child step. Expressed as free functions plus a small tagged enum for static
//! dispatch, per the design notes — no virtual dispatch needed for four strategies.

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionPolicy {
    Ucb1,
    Ucb1Tuned,
    UcbV,
    SpMcts,
}

/// Stats for one child as seen from its parent during selection.
#[derive(Debug, Clone, Copy)]
pub struct ChildStats {
    pub score_sum: f64,
    pub squared_score_sum: f64,
    pub rollout_count: u64,
    pub parent_rollout_count: u64,
}

impl ChildStats {
    fn mean(&self) -> f64 {
        self.score_sum / self.rollout_count as f64
    }

    fn variance(&self) -> f64 {
        let n = self.rollout_count as f64;
        let mean = self.mean();
        (self.squared_score_sum / n - mean * mean).max(0.0)
    }
}

pub fn ucb1(stats: ChildStats, c: f64) -> f64 {
    if stats.rollout_count == 0 {
        return f64::INFINITY;
    }
    let n = stats.rollout_count as f64;
    let t = stats.parent_rollout_count as f64;
    stats.mean() + 2.0 * c * ((2.0 * t.ln()) / n).sqrt()
}

pub fn ucb1_tuned(stats: ChildStats) -> f64 {
    if stats.rollout_count == 0 {
        return f64::INFINITY;
    }
    let n = stats.rollout_count as f64;
    let t = stats.parent_rollout_count as f64;
    let c = std::f64::consts::FRAC_1_SQRT_2;
    let variance_term =
        stats.variance() + ((2.0 * t.ln()) / n).sqrt();
    stats.mean() + 8.0 * c * (((t.ln() / n)) * variance_term.min(0.25)).sqrt()
}

pub fn ucb_v(stats: ChildStats) -> f64 {
    if stats.rollout_count == 0 {
        return f64::INFINITY;
    }
    let n = stats.rollout_count as f64;
    let t = stats.parent_rollout_count as f64;
    let c = std::f64::consts::FRAC_1_SQRT_2;
    const B: f64 = 1.4;
    stats.mean()
        + (2.0 * t.ln() * stats.variance() / n).sqrt()
        + 16.0 * c * (3.0 * t.ln() * B) / n
}

pub fn sp_mcts(stats: ChildStats, c: f64, d: f64) -> f64 {
    if stats.rollout_count == 0 {
        return f64::INFINITY;
    }
    let n = stats.rollout_count as f64;
    ucb1(stats, c) + (stats.variance() + d / n).sqrt()
}

/// Dispatch to the configured policy using `ucb1_c`/`sp_mcts_d` constants from `Config`.
pub fn score(policy: DecisionPolicy, stats: ChildStats, ucb1_c: f64, sp_mcts_d: f64) -> f64 {
    match policy {
        DecisionPolicy::Ucb1 => ucb1(stats, ucb1_c),
        DecisionPolicy::Ucb1Tuned => ucb1_tuned(stats),
        DecisionPolicy::UcbV => ucb_v(stats),
        DecisionPolicy::SpMcts => sp_mcts(stats, ucb1_c, sp_mcts_d),
    }
}
