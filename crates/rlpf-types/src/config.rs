// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Configuration
// ─────────────────────────────────────────────────────────────────────

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RlpfError, RlpfResult};

/// Runtime configuration for extraction, verification, reward shaping
/// and the training-health monitor.
///
/// Missing keys in a JSON config fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RlpfConfig {
    /// Allow tolerant subject/object matching against the graph.
    /// Default: true.
    pub fuzzy_matching: bool,

    /// Jaccard threshold for fuzzy term matching.
    /// Default: 0.5.
    pub fuzzy_threshold: f64,

    /// Multiplier applied to the weight of fuzzily supported predicates.
    /// Default: 0.8.
    pub fuzzy_discount: f64,

    /// Predicates below this confidence are skipped, not scored.
    /// Default: 0.1.
    pub min_confidence: f64,

    /// Predicates whose subject admits a single object. A differing
    /// object in the graph counts as a contradiction.
    pub functional_predicates: Vec<String>,

    /// Confidence assigned to predicates from the pattern extractor.
    /// Default: 0.7.
    pub heuristic_confidence: f64,

    /// Reward weight per supported predicate.
    /// Default: 1.0.
    pub w_supported: f64,

    /// Penalty weight per contradicted predicate.
    /// Default: 1.0.
    pub w_contradicted: f64,

    /// Penalty weight per predicate the graph cannot confirm or refute.
    /// Default: 0.1.
    pub w_unverifiable: f64,

    /// Reward returned when no predicate could be scored.
    /// Default: 0.0.
    pub empty_reward: f64,

    /// Rewards are clipped to [-reward_clip, reward_clip].
    /// Default: 1.0.
    pub reward_clip: f64,

    /// Number of recent rewards averaged into the advantage baseline.
    /// Default: 64.
    pub baseline_window: usize,

    /// Upper bound on predicates scored per completion.
    /// Default: 256.
    pub max_predicates: usize,

    /// Soft scoring deadline in milliseconds; overruns are logged.
    /// Default: 50.
    pub deadline_ms: u64,

    /// Training steps in the monitor's sliding window.
    /// Default: 10.
    pub monitor_window: usize,

    /// Halt if the sliding window average drops below this.
    /// Default: -0.25.
    pub window_floor: f64,

    /// Halt immediately if a single step reward drops below this.
    /// Default: -0.8.
    pub hard_floor: f64,

    /// Steps inspected for a downward reward trend.
    /// Default: 5.
    pub trend_window: usize,

    /// Halt if reward drops more than this over the trend window.
    /// Default: 0.6.
    pub trend_threshold: f64,

    /// Recent steps the monitor keeps in its reward history and event
    /// trace. Running statistics cover every step regardless.
    /// Default: 1024.
    pub history_cap: usize,
}

impl Default for RlpfConfig {
    fn default() -> Self {
        Self {
            fuzzy_matching: true,
            fuzzy_threshold: 0.5,
            fuzzy_discount: 0.8,
            min_confidence: 0.1,
            functional_predicates: [
                "created_by",
                "founded_by",
                "founded_in",
                "born_in",
                "capital_of",
                "licensed_under",
                "located_in",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            heuristic_confidence: 0.7,
            w_supported: 1.0,
            w_contradicted: 1.0,
            w_unverifiable: 0.1,
            empty_reward: 0.0,
            reward_clip: 1.0,
            baseline_window: 64,
            max_predicates: 256,
            deadline_ms: 50,
            monitor_window: 10,
            window_floor: -0.25,
            hard_floor: -0.8,
            trend_window: 5,
            trend_threshold: 0.6,
            history_cap: 1024,
        }
    }
}

fn unit_interval(name: &str, value: f64) -> RlpfResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(RlpfError::Config(format!(
            "{name} must be in [0, 1], got {value}"
        )));
    }
    Ok(())
}

impl RlpfConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> RlpfResult<()> {
        if !(self.fuzzy_threshold > 0.0 && self.fuzzy_threshold <= 1.0) {
            return Err(RlpfError::Config(format!(
                "fuzzy_threshold must be in (0, 1], got {}",
                self.fuzzy_threshold
            )));
        }
        unit_interval("fuzzy_discount", self.fuzzy_discount)?;
        unit_interval("min_confidence", self.min_confidence)?;
        unit_interval("heuristic_confidence", self.heuristic_confidence)?;

        for (name, w) in [
            ("w_supported", self.w_supported),
            ("w_contradicted", self.w_contradicted),
            ("w_unverifiable", self.w_unverifiable),
        ] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(RlpfError::Config(format!(
                    "{name} must be finite and >= 0, got {w}"
                )));
            }
        }

        if !(self.reward_clip.is_finite() && self.reward_clip > 0.0) {
            return Err(RlpfError::Config(format!(
                "reward_clip must be finite and > 0, got {}",
                self.reward_clip
            )));
        }
        let clip = -self.reward_clip..=self.reward_clip;
        for (name, v) in [
            ("empty_reward", self.empty_reward),
            ("window_floor", self.window_floor),
            ("hard_floor", self.hard_floor),
        ] {
            if !clip.contains(&v) {
                return Err(RlpfError::Config(format!(
                    "{name} must be within ±reward_clip ({}), got {v}",
                    self.reward_clip
                )));
            }
        }

        if self.baseline_window < 1 {
            return Err(RlpfError::Config(format!(
                "baseline_window must be >= 1, got {}",
                self.baseline_window
            )));
        }
        if self.max_predicates < 1 {
            return Err(RlpfError::Config(format!(
                "max_predicates must be >= 1, got {}",
                self.max_predicates
            )));
        }
        if self.deadline_ms == 0 {
            return Err(RlpfError::Config("deadline_ms must be > 0".to_string()));
        }
        if self.monitor_window < 1 {
            return Err(RlpfError::Config(format!(
                "monitor_window must be >= 1, got {}",
                self.monitor_window
            )));
        }
        if self.trend_window < 2 {
            return Err(RlpfError::Config(format!(
                "trend_window must be >= 2, got {}",
                self.trend_window
            )));
        }
        if !(self.trend_threshold.is_finite() && self.trend_threshold > 0.0) {
            return Err(RlpfError::Config(format!(
                "trend_threshold must be finite and > 0, got {}",
                self.trend_threshold
            )));
        }
        if self.history_cap < 1 {
            return Err(RlpfError::Config(format!(
                "history_cap must be >= 1, got {}",
                self.history_cap
            )));
        }
        Ok(())
    }

    /// Load from JSON string.
    pub fn from_json(json: &str) -> RlpfResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| RlpfError::Config(format!("JSON parse error: {e}")))
    }

    /// Load from a JSON file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> RlpfResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn is_functional(&self, pred: &str) -> bool {
        self.functional_predicates.iter().any(|p| p == pred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RlpfConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RlpfConfig::from_json(r#"{"w_unverifiable": 0.3}"#).unwrap();
        assert_eq!(config.w_unverifiable, 0.3);
        assert_eq!(config.baseline_window, 64);
        assert!(config.is_functional("created_by"));
    }

    #[test]
    fn test_bad_json() {
        let err = RlpfConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, RlpfError::Config(_)));
    }

    #[test]
    fn test_rejects_negative_weight() {
        let config = RlpfConfig {
            w_contradicted: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_floor_outside_clip() {
        let config = RlpfConfig {
            hard_floor: -2.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_short_trend_window() {
        let config = RlpfConfig {
            trend_window: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_fuzzy_threshold() {
        let config = RlpfConfig {
            fuzzy_threshold: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_finite_trend_threshold() {
        for trend_threshold in [f64::NAN, f64::INFINITY, 0.0] {
            let config = RlpfConfig {
                trend_threshold,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "accepted {trend_threshold}");
        }
    }

    #[test]
    fn test_rejects_zero_history_cap() {
        let config = RlpfConfig {
            history_cap: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let err = RlpfConfig::from_file("/nonexistent/rlpf.json").unwrap_err();
        assert!(matches!(err, RlpfError::Io(_)));
    }
}
