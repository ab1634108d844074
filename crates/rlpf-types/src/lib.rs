// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Types
// (C) 2026 RLPF Kernel contributors. All rights reserved.
// License: GNU AGPL v3
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Predicate model, verdict and reward types, configuration and error
//! hierarchy for the RLPF (Reinforcement Learning from Predicate
//! Feedback) kernel.

pub mod config;
pub mod error;
pub mod predicate;
pub mod score;

pub use config::RlpfConfig;
pub use error::{RlpfError, RlpfResult};
pub use predicate::{fuzzy_match, normalize_term, polarity, Predicate, PredicateType};
pub use score::{
    GroupScore, MatchKind, MonitorSession, PredicateVerdict, RewardBreakdown, StepEvent, Verdict,
};
