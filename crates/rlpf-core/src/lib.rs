// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Core Engine
// (C) 2026 RLPF Kernel contributors. All rights reserved.
// License: GNU AGPL v3
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Predicate extraction, knowledge-graph verification and reward
//! aggregation for Reinforcement Learning from Predicate Feedback.
//!
//! A completion is scored by extracting (subject, predicate, object)
//! triples, checking each one against a `KnowledgeGraph`, and folding
//! the verdicts into a clipped scalar reward. `RewardMonitor` watches
//! those rewards across training steps and halts on collapse.
//!
//! # Invariants
//!
//! 1. **Every predicate gets exactly one verdict**: supported,
//!    contradicted, unverifiable or skipped. Duplicate triples in one
//!    completion are verified once.
//!
//! 2. **Rewards are always finite and bounded**: the aggregate is clipped
//!    to `±reward_clip` and NaN/Inf collapse to a bound. A non-finite step
//!    reward reaching the monitor counts as `-reward_clip`.
//!
//! 3. **Monitor halts are sticky**: once a halt fires, `observe()` refuses
//!    further steps until `reactivate()` is called. The active flag uses
//!    `SeqCst` ordering.

pub mod export;
pub mod extract;
pub mod graph;
pub mod monitor;
pub mod reward;
pub mod verify;

pub use export::{to_jsonl_string, write_jsonl, RewardRecord};
pub use extract::{ExternalExtractor, HeuristicExtractor, JsonExtractor, PredicateExtractor};
pub use graph::{ExternalGraph, InMemoryGraph, KnowledgeGraph};
pub use monitor::RewardMonitor;
pub use reward::RewardAggregator;
pub use verify::PredicateVerifier;
