// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Verdict and Reward Types
// ─────────────────────────────────────────────────────────────────────

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::predicate::Predicate;

/// Clamp a value to [lo, hi], mapping NaN to lo and Inf to nearest bound.
#[inline]
pub fn clamp_score(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_score: NaN detected, clamping to {lo:.4}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_score: Inf detected, clamping to {boundary:.4}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// Outcome of checking one predicate against the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Supported,
    Contradicted,
    Unverifiable,
    /// Confidence below the configured floor; excluded from the reward.
    Skipped,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Supported => "supported",
            Verdict::Contradicted => "contradicted",
            Verdict::Unverifiable => "unverifiable",
            Verdict::Skipped => "skipped",
        }
    }
}

/// How the deciding graph fact related to the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    /// Same claim with opposite polarity (`allows` vs `cannot`).
    Negation,
    /// Single-valued predicate with a different object.
    Functional,
    None,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Fuzzy => "fuzzy",
            MatchKind::Negation => "negation",
            MatchKind::Functional => "functional",
            MatchKind::None => "none",
        }
    }
}

/// Verification result for a single predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredicateVerdict {
    pub predicate: Predicate,
    pub verdict: Verdict,
    pub match_kind: MatchKind,
    /// Graph fact that decided the verdict, if any.
    pub evidence: Option<Predicate>,
    /// Contribution weight in [0, 1] before reward weights are applied.
    pub weight: f64,
}

impl PredicateVerdict {
    pub fn new(
        predicate: Predicate,
        verdict: Verdict,
        match_kind: MatchKind,
        evidence: Option<Predicate>,
        weight: f64,
    ) -> Self {
        Self {
            predicate,
            verdict,
            match_kind,
            evidence,
            weight: clamp_score(weight, 0.0, 1.0),
        }
    }
}

/// Scalar reward for one completion plus the per-predicate trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// Final clipped reward.
    pub reward: f64,
    /// Reward before clipping.
    pub raw_reward: f64,
    /// Reward minus the running baseline (0 until `review` sets it).
    pub advantage: f64,
    pub supported: u32,
    pub contradicted: u32,
    pub unverifiable: u32,
    pub skipped: u32,
    pub verdicts: Vec<PredicateVerdict>,
    pub elapsed_ms: f64,
    /// Scoring (extraction included) ran past `deadline_ms`.
    #[serde(default)]
    pub deadline_exceeded: bool,
}

impl RewardBreakdown {
    /// Predicates that contributed to the reward.
    pub fn counted(&self) -> u32 {
        self.supported + self.contradicted + self.unverifiable
    }

    /// Supported share of verifiable predicates; `None` if nothing was
    /// confirmed or refuted.
    pub fn factual_precision(&self) -> Option<f64> {
        let decided = self.supported + self.contradicted;
        if decided == 0 {
            return None;
        }
        Some(self.supported as f64 / decided as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.counted() == 0
    }
}

/// Rewards for a group of completions sampled from the same prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupScore {
    pub breakdowns: Vec<RewardBreakdown>,
    pub rewards: Vec<f64>,
    /// Group-normalised advantages: `(r - mean) / (std + eps)`.
    pub advantages: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

/// A single training step seen by the reward monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub index: u32,
    pub reward: f64,
    /// Sliding window average at this step.
    pub window_avg: f64,
    /// Whether this step triggered (or arrived after) a halt.
    pub halted: bool,
    /// Why the step halted: the triggering check, or `monitor_inactive`
    /// for a step refused after an earlier halt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<String>,
}

/// Tracks reward health across training steps.
///
/// `events` and `reward_history` keep only the most recent steps; the
/// running statistics cover the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSession {
    pub events: VecDeque<StepEvent>,
    pub reward_history: VecDeque<f64>,
    pub halted: bool,
    pub halt_index: i64,
    pub halt_reason: String,
    steps: usize,
    reward_sum: f64,
    reward_min: Option<f64>,
}

impl Default for MonitorSession {
    fn default() -> Self {
        Self {
            events: VecDeque::new(),
            reward_history: VecDeque::new(),
            halted: false,
            halt_index: -1,
            halt_reason: String::new(),
            steps: 0,
            reward_sum: 0.0,
            reward_min: None,
        }
    }
}

impl MonitorSession {
    /// Append an accepted step, keeping at most `cap` recent entries.
    pub fn record(&mut self, event: StepEvent, cap: usize) {
        let cap = cap.max(1);
        self.steps += 1;
        self.reward_sum += event.reward;
        self.reward_min = Some(match self.reward_min {
            Some(min) => min.min(event.reward),
            None => event.reward,
        });

        self.reward_history.push_back(event.reward);
        while self.reward_history.len() > cap {
            self.reward_history.pop_front();
        }
        self.events.push_back(event);
        while self.events.len() > cap {
            self.events.pop_front();
        }
    }

    /// Steps accepted over the whole run.
    pub fn step_count(&self) -> usize {
        self.steps
    }

    pub fn avg_reward(&self) -> f64 {
        if self.steps == 0 {
            return 0.0;
        }
        self.reward_sum / self.steps as f64
    }

    pub fn min_reward(&self) -> Option<f64> {
        self.reward_min
    }

    pub fn last_reward(&self) -> Option<f64> {
        self.reward_history.back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_nan() {
        assert_eq!(clamp_score(f64::NAN, -1.0, 1.0), -1.0);
    }

    #[test]
    fn test_clamp_pos_inf() {
        assert_eq!(clamp_score(f64::INFINITY, -1.0, 1.0), 1.0);
    }

    #[test]
    fn test_clamp_neg_inf() {
        assert_eq!(clamp_score(f64::NEG_INFINITY, -1.0, 1.0), -1.0);
    }

    #[test]
    fn test_clamp_normal() {
        assert_eq!(clamp_score(0.25, -1.0, 1.0), 0.25);
    }

    #[test]
    fn test_verdict_weight_clamped() {
        let p = Predicate::new("a", "b", "c").unwrap();
        let v = PredicateVerdict::new(p, Verdict::Supported, MatchKind::Exact, None, 1.7);
        assert_eq!(v.weight, 1.0);
    }

    #[test]
    fn test_breakdown_precision() {
        let b = RewardBreakdown {
            supported: 3,
            contradicted: 1,
            unverifiable: 4,
            ..Default::default()
        };
        assert_eq!(b.counted(), 8);
        assert!((b.factual_precision().unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_breakdown_precision_undecided() {
        let b = RewardBreakdown {
            unverifiable: 2,
            ..Default::default()
        };
        assert!(b.factual_precision().is_none());
        assert!(!b.is_empty());
    }

    #[test]
    fn test_verdict_serializes_lowercase() {
        let s = serde_json::to_string(&Verdict::Contradicted).unwrap();
        assert_eq!(s, "\"contradicted\"");
    }

    fn step(index: u32, reward: f64) -> StepEvent {
        StepEvent {
            index,
            reward,
            window_avg: reward,
            halted: false,
            halt_reason: None,
        }
    }

    #[test]
    fn test_monitor_session_stats() {
        let mut session = MonitorSession::default();
        for (i, r) in [0.5, -0.1, 0.2].into_iter().enumerate() {
            session.record(step(i as u32, r), 16);
        }
        assert!((session.avg_reward() - 0.2).abs() < 1e-9);
        assert_eq!(session.min_reward(), Some(-0.1));
        assert_eq!(session.last_reward(), Some(0.2));
        assert_eq!(session.step_count(), 3);
    }

    #[test]
    fn test_monitor_session_history_capped() {
        let mut session = MonitorSession::default();
        for i in 0..10 {
            session.record(step(i, -(i as f64) / 10.0), 4);
        }
        assert_eq!(session.reward_history.len(), 4);
        assert_eq!(session.events.len(), 4);
        assert_eq!(session.events.front().map(|e| e.index), Some(6));
        assert_eq!(session.step_count(), 10);
        assert!((session.avg_reward() + 0.45).abs() < 1e-9);
        assert_eq!(session.min_reward(), Some(-0.9));
    }

    #[test]
    fn test_monitor_session_empty() {
        let session = MonitorSession::default();
        assert_eq!(session.avg_reward(), 0.0);
        assert!(session.min_reward().is_none());
        assert_eq!(session.halt_index, -1);
    }
}
