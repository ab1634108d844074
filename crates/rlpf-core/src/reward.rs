// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Reward Aggregator
// ─────────────────────────────────────────────────────────────────────
//! Turns verified predicates into a scalar training reward.
//!
//! For the counted (non-skipped) predicates of one completion:
//!
//! ```text
//! raw = (w_supported * Σ supported - w_contradicted * Σ contradicted
//!        - w_unverifiable * Σ unverifiable) / counted
//! ```
//!
//! where each Σ sums verdict weights. The reward is `raw` clipped to
//! `±reward_clip`; a completion with no countable predicates earns
//! `empty_reward`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use rlpf_types::score::clamp_score;
use rlpf_types::{GroupScore, Predicate, RewardBreakdown, RlpfConfig, Verdict};

use crate::extract::PredicateExtractor;
use crate::graph::KnowledgeGraph;
use crate::verify::{distinct, PredicateVerifier};

const GROUP_STD_EPS: f64 = 1e-6;

/// Predicate-feedback reward function.
///
/// Thread-safe: the advantage baseline is guarded by a `parking_lot::Mutex`.
pub struct RewardAggregator {
    config: RlpfConfig,
    extractor: Arc<dyn PredicateExtractor>,
    verifier: PredicateVerifier,
    baseline: Mutex<VecDeque<f64>>,
}

impl RewardAggregator {
    pub fn new(
        config: RlpfConfig,
        extractor: Arc<dyn PredicateExtractor>,
        graph: Arc<dyn KnowledgeGraph>,
    ) -> Self {
        let verifier = PredicateVerifier::new(config.clone(), graph);
        Self {
            config,
            extractor,
            verifier,
            baseline: Mutex::new(VecDeque::new()),
        }
    }

    /// Score already-extracted predicates.
    pub fn score_predicates(&self, predicates: &[Predicate]) -> RewardBreakdown {
        let start = Instant::now();
        let mut breakdown = self.aggregate(predicates);
        self.finish_timing(&mut breakdown, start);
        breakdown
    }

    /// Extract predicates from a completion and score them. The deadline
    /// covers extraction as well as verification.
    pub fn score(&self, text: &str) -> RewardBreakdown {
        let start = Instant::now();
        let predicates = self.extractor.extract(text);
        let mut breakdown = self.aggregate(&predicates);
        self.finish_timing(&mut breakdown, start);
        breakdown
    }

    fn finish_timing(&self, breakdown: &mut RewardBreakdown, start: Instant) {
        breakdown.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        breakdown.deadline_exceeded = breakdown.elapsed_ms > self.config.deadline_ms as f64;
        if breakdown.deadline_exceeded {
            log::warn!(
                "Reward scoring took {:.2}ms, over the {}ms deadline",
                breakdown.elapsed_ms,
                self.config.deadline_ms
            );
        }
    }

    fn aggregate(&self, predicates: &[Predicate]) -> RewardBreakdown {
        let mut unique = distinct(predicates);
        if unique.len() > self.config.max_predicates {
            log::warn!(
                "Truncating {} distinct predicates to max_predicates={}",
                unique.len(),
                self.config.max_predicates
            );
            unique.truncate(self.config.max_predicates);
        }

        let verdicts: Vec<_> = unique.into_iter().map(|p| self.verifier.verify(p)).collect();
        let mut breakdown = RewardBreakdown::default();
        let (mut sum_sup, mut sum_con, mut sum_unv) = (0.0, 0.0, 0.0);

        for v in &verdicts {
            match v.verdict {
                Verdict::Supported => {
                    breakdown.supported += 1;
                    sum_sup += v.weight;
                }
                Verdict::Contradicted => {
                    breakdown.contradicted += 1;
                    sum_con += v.weight;
                }
                Verdict::Unverifiable => {
                    breakdown.unverifiable += 1;
                    sum_unv += v.weight;
                }
                Verdict::Skipped => breakdown.skipped += 1,
            }
        }

        let clip = self.config.reward_clip;
        breakdown.raw_reward = if breakdown.counted() == 0 {
            self.config.empty_reward
        } else {
            (self.config.w_supported * sum_sup
                - self.config.w_contradicted * sum_con
                - self.config.w_unverifiable * sum_unv)
                / breakdown.counted() as f64
        };
        breakdown.reward = clamp_score(breakdown.raw_reward, -clip, clip);
        breakdown.verdicts = verdicts;
        breakdown
    }

    /// Score a completion and compute its advantage over the running
    /// baseline, then fold the reward into the baseline.
    pub fn review(&self, text: &str) -> RewardBreakdown {
        let mut breakdown = self.score(text);
        let mut baseline = self.baseline.lock();

        let mean = if baseline.is_empty() {
            0.0
        } else {
            baseline.iter().sum::<f64>() / baseline.len() as f64
        };
        breakdown.advantage = breakdown.reward - mean;

        baseline.push_back(breakdown.reward);
        if baseline.len() > self.config.baseline_window {
            baseline.pop_front();
        }

        if breakdown.contradicted > 0 {
            log::debug!(
                "Completion contradicts the graph on {} predicate(s), reward {:.4}",
                breakdown.contradicted,
                breakdown.reward
            );
        }
        breakdown
    }

    /// Score completions sampled for the same prompt and normalise the
    /// rewards within the group. Does not touch the running baseline.
    pub fn score_group(&self, completions: &[&str]) -> GroupScore {
        let breakdowns: Vec<RewardBreakdown> = completions.iter().map(|c| self.score(c)).collect();
        let rewards: Vec<f64> = breakdowns.iter().map(|b| b.reward).collect();

        if rewards.is_empty() {
            return GroupScore::default();
        }

        let n = rewards.len() as f64;
        let mean = rewards.iter().sum::<f64>() / n;
        let std = (rewards.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();

        let advantages = if rewards.len() < 2 || std < GROUP_STD_EPS {
            vec![0.0; rewards.len()]
        } else {
            rewards
                .iter()
                .map(|r| (r - mean) / (std + GROUP_STD_EPS))
                .collect()
        };

        GroupScore {
            breakdowns,
            rewards,
            advantages,
            mean,
            std,
        }
    }

    /// Mean of the rewards currently in the baseline window.
    pub fn baseline(&self) -> f64 {
        let baseline = self.baseline.lock();
        if baseline.is_empty() {
            return 0.0;
        }
        baseline.iter().sum::<f64>() / baseline.len() as f64
    }

    pub fn baseline_len(&self) -> usize {
        self.baseline.lock().len()
    }

    pub fn reset_baseline(&self) {
        self.baseline.lock().clear();
    }

    /// Read-only access to config.
    pub fn config(&self) -> &RlpfConfig {
        &self.config
    }

    pub fn verifier(&self) -> &PredicateVerifier {
        &self.verifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExternalExtractor, HeuristicExtractor, JsonExtractor};
    use crate::graph::InMemoryGraph;

    fn fact(s: &str, p: &str, o: &str) -> Predicate {
        Predicate::new(s, p, o).unwrap()
    }

    fn graph() -> Arc<InMemoryGraph> {
        Arc::new(InMemoryGraph::with_facts([
            fact("MIT License", "allows", "commercial use"),
            fact("GPL", "requires", "source disclosure"),
            fact("Python", "created_by", "Guido van Rossum"),
        ]))
    }

    fn make_aggregator(config: RlpfConfig) -> RewardAggregator {
        RewardAggregator::new(config, Arc::new(JsonExtractor), graph())
    }

    #[test]
    fn test_all_supported() {
        let agg = make_aggregator(RlpfConfig::default());
        let b = agg.score_predicates(&[
            fact("MIT License", "allows", "commercial use"),
            fact("GPL", "requires", "source disclosure"),
        ]);
        assert_eq!(b.supported, 2);
        assert!((b.reward - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mixed_reward_formula() {
        // (1.0 - 1.0 - 0.1 * 1.0) / 3 = -0.0333…
        let agg = make_aggregator(RlpfConfig::default());
        let b = agg.score_predicates(&[
            fact("MIT License", "allows", "commercial use"),
            fact("GPL", "cannot", "source disclosure"),
            fact("Rust", "is", "fast"),
        ]);
        assert_eq!((b.supported, b.contradicted, b.unverifiable), (1, 1, 1));
        assert!((b.reward - (-0.1 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_empty_reward() {
        let config = RlpfConfig {
            empty_reward: -0.2,
            ..Default::default()
        };
        let agg = make_aggregator(config);
        let b = agg.score("nothing to see");
        assert!(b.is_empty());
        assert!((b.reward + 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_skipped_not_counted() {
        let agg = make_aggregator(RlpfConfig::default());
        let b = agg.score_predicates(&[
            fact("GPL", "requires", "source disclosure"),
            fact("Python", "created_by", "Larry Wall").with_confidence(0.01).unwrap(),
        ]);
        assert_eq!(b.skipped, 1);
        assert!((b.reward - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reward_is_clipped() {
        let config = RlpfConfig {
            w_contradicted: 5.0,
            ..Default::default()
        };
        let agg = make_aggregator(config);
        let b = agg.score_predicates(&[fact("Python", "created_by", "Larry Wall")]);
        assert!((b.raw_reward + 5.0).abs() < 1e-9);
        assert_eq!(b.reward, -1.0);
    }

    #[test]
    fn test_max_predicates_truncates() {
        let config = RlpfConfig {
            max_predicates: 1,
            ..Default::default()
        };
        let agg = make_aggregator(config);
        let b = agg.score_predicates(&[
            fact("GPL", "requires", "source disclosure"),
            fact("Python", "created_by", "Larry Wall"),
        ]);
        assert_eq!(b.verdicts.len(), 1);
        assert_eq!(b.contradicted, 0);
    }

    #[test]
    fn test_truncation_counts_distinct_predicates() {
        let config = RlpfConfig {
            max_predicates: 2,
            ..Default::default()
        };
        let agg = make_aggregator(config);
        let repeated = fact("GPL", "requires", "source disclosure");
        let b = agg.score_predicates(&[
            repeated.clone(),
            repeated.clone(),
            repeated,
            fact("Python", "created_by", "Larry Wall"),
        ]);
        assert_eq!(b.verdicts.len(), 2);
        assert_eq!((b.supported, b.contradicted), (1, 1));
    }

    #[test]
    fn test_non_finite_empty_reward_is_clamped() {
        let config = RlpfConfig {
            empty_reward: f64::NAN,
            ..Default::default()
        };
        let agg = make_aggregator(config);
        let b = agg.score("nothing here");
        assert!(b.reward.is_finite());
        assert_eq!(b.reward, -1.0);

        let config = RlpfConfig {
            empty_reward: 3.0,
            ..Default::default()
        };
        let b = make_aggregator(config).score("nothing here");
        assert_eq!(b.reward, 1.0);
        assert_eq!(b.raw_reward, 3.0);
    }

    #[test]
    fn test_slow_extractor_overruns_deadline() {
        let config = RlpfConfig {
            deadline_ms: 1,
            ..Default::default()
        };
        let agg = RewardAggregator::new(
            config,
            Arc::new(ExternalExtractor::new(|_| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                vec![Predicate::new("GPL", "requires", "source disclosure").unwrap()]
            })),
            graph(),
        );
        let b = agg.score("x");
        assert!(b.elapsed_ms >= 20.0);
        assert!(b.deadline_exceeded);
        assert_eq!(b.supported, 1);

        let fast = make_aggregator(RlpfConfig::default())
            .score_predicates(&[fact("GPL", "requires", "source disclosure")]);
        assert!(!fast.deadline_exceeded);
    }

    #[test]
    fn test_score_with_heuristic_extractor() {
        let agg = RewardAggregator::new(
            RlpfConfig::default(),
            Arc::new(HeuristicExtractor::default()),
            graph(),
        );
        let good = agg.score("The MIT License allows commercial use. Python was created by Guido van Rossum.");
        let bad = agg.score("Python was created by Larry Wall.");
        assert!(good.reward > 0.0);
        assert!(bad.reward < 0.0);
        assert_eq!(bad.contradicted, 1);
    }

    #[test]
    fn test_review_advantage_and_baseline_cap() {
        let config = RlpfConfig {
            baseline_window: 3,
            ..Default::default()
        };
        let agg = RewardAggregator::new(
            config,
            Arc::new(ExternalExtractor::new(|_| {
                vec![Predicate::new("GPL", "requires", "source disclosure").unwrap()]
            })),
            graph(),
        );
        let first = agg.review("x");
        assert!((first.advantage - 1.0).abs() < 1e-9);
        let second = agg.review("x");
        assert!(second.advantage.abs() < 1e-9);
        for _ in 0..10 {
            agg.review("x");
        }
        assert_eq!(agg.baseline_len(), 3);
        assert!((agg.baseline() - 1.0).abs() < 1e-9);
        agg.reset_baseline();
        assert_eq!(agg.baseline_len(), 0);
        assert_eq!(agg.baseline(), 0.0);
    }

    #[test]
    fn test_group_normalisation() {
        let agg = RewardAggregator::new(
            RlpfConfig::default(),
            Arc::new(HeuristicExtractor::default()),
            graph(),
        );
        let group = agg.score_group(&[
            "Python was created by Guido van Rossum.",
            "Python was created by Larry Wall.",
        ]);
        assert_eq!(group.rewards.len(), 2);
        assert!(group.advantages[0] > 0.0);
        assert!(group.advantages[1] < 0.0);
        assert!((group.advantages[0] + group.advantages[1]).abs() < 1e-6);
        assert_eq!(agg.baseline_len(), 0);
    }

    #[test]
    fn test_group_uniform_rewards_zero_advantage() {
        let agg = make_aggregator(RlpfConfig::default());
        let group = agg.score_group(&["a", "b", "c"]);
        assert_eq!(group.advantages, vec![0.0, 0.0, 0.0]);
        assert!(agg.score_group(&[]).rewards.is_empty());
    }
}
