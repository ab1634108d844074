// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Predicate Verifier
// ─────────────────────────────────────────────────────────────────────
//! Checks extracted predicates against the knowledge graph.
//!
//! Each predicate resolves to exactly one verdict, in this order:
//! 1. **Skipped** — confidence below `min_confidence`.
//! 2. **Supported** — exact triple in the graph, or a fuzzy/synonym match
//!    (`MIT allows commercial use` vs `MIT License permits commercial_use`).
//! 3. **Contradicted** — the graph states the opposite polarity
//!    (`allows` vs `cannot`), or a single-valued predicate has a different
//!    object (`created_by`).
//! 4. **Unverifiable** — nothing in the graph decides it.

use std::collections::HashSet;
use std::sync::Arc;

use rlpf_types::predicate::{fuzzy_match, normalize_term, polarity_conflict, same_polarity};
use rlpf_types::{MatchKind, Predicate, PredicateVerdict, RlpfConfig, Verdict};

use crate::graph::KnowledgeGraph;

pub struct PredicateVerifier {
    config: RlpfConfig,
    graph: Arc<dyn KnowledgeGraph>,
}

impl PredicateVerifier {
    pub fn new(config: RlpfConfig, graph: Arc<dyn KnowledgeGraph>) -> Self {
        Self { config, graph }
    }

    pub fn config(&self) -> &RlpfConfig {
        &self.config
    }

    fn terms_match(&self, a: &str, b: &str) -> bool {
        if self.config.fuzzy_matching {
            fuzzy_match(a, b, self.config.fuzzy_threshold)
        } else {
            normalize_term(a) == normalize_term(b)
        }
    }

    fn same_claim_target(&self, predicate: &Predicate, fact: &Predicate) -> bool {
        self.terms_match(predicate.subject(), fact.subject())
            && self.terms_match(&predicate.object_text(), &fact.object_text())
    }

    /// Verify a single predicate.
    pub fn verify(&self, predicate: &Predicate) -> PredicateVerdict {
        if predicate.confidence() < self.config.min_confidence {
            log::debug!("Skipping low-confidence {predicate}");
            return PredicateVerdict::new(
                predicate.clone(),
                Verdict::Skipped,
                MatchKind::None,
                None,
                0.0,
            );
        }

        let threshold = self
            .config
            .fuzzy_matching
            .then_some(self.config.fuzzy_threshold);
        let candidates = self.graph.lookup(predicate.subject(), threshold);

        let verdict = self
            .find_support(predicate, &candidates)
            .or_else(|| self.find_contradiction(predicate, &candidates))
            .unwrap_or_else(|| {
                PredicateVerdict::new(
                    predicate.clone(),
                    Verdict::Unverifiable,
                    MatchKind::None,
                    None,
                    predicate.confidence(),
                )
            });

        log::debug!(
            "{predicate} -> {:?} ({:?}, weight {:.3})",
            verdict.verdict,
            verdict.match_kind,
            verdict.weight
        );
        verdict
    }

    fn find_support(&self, predicate: &Predicate, candidates: &[Predicate]) -> Option<PredicateVerdict> {
        if let Some(fact) = candidates.iter().find(|f| predicate.matches(f, false)) {
            return Some(PredicateVerdict::new(
                predicate.clone(),
                Verdict::Supported,
                MatchKind::Exact,
                Some(fact.clone()),
                predicate.confidence() * fact.confidence(),
            ));
        }

        // Synonyms (`permits` / `allows`) count in both modes; `terms_match`
        // decides how loosely subject and object compare.
        candidates
            .iter()
            .find(|f| {
                same_polarity(predicate.predicate(), f.predicate())
                    && self.same_claim_target(predicate, f)
            })
            .map(|fact| {
                PredicateVerdict::new(
                    predicate.clone(),
                    Verdict::Supported,
                    MatchKind::Fuzzy,
                    Some(fact.clone()),
                    predicate.confidence() * fact.confidence() * self.config.fuzzy_discount,
                )
            })
    }

    fn find_contradiction(
        &self,
        predicate: &Predicate,
        candidates: &[Predicate],
    ) -> Option<PredicateVerdict> {
        let contradiction = |fact: &Predicate, kind: MatchKind| {
            PredicateVerdict::new(
                predicate.clone(),
                Verdict::Contradicted,
                kind,
                Some(fact.clone()),
                predicate.confidence() * fact.confidence(),
            )
        };

        if let Some(fact) = candidates.iter().find(|f| {
            polarity_conflict(predicate.predicate(), f.predicate())
                && self.same_claim_target(predicate, f)
        }) {
            return Some(contradiction(fact, MatchKind::Negation));
        }

        if !self.config.is_functional(predicate.predicate()) || predicate.is_negation() {
            return None;
        }

        candidates
            .iter()
            .find(|f| {
                f.predicate() == predicate.predicate()
                    && self.terms_match(predicate.subject(), f.subject())
                    && !self.terms_match(&predicate.object_text(), &f.object_text())
            })
            .map(|fact| contradiction(fact, MatchKind::Functional))
    }

    /// Verify a batch, counting each distinct triple once.
    pub fn verify_all(&self, predicates: &[Predicate]) -> Vec<PredicateVerdict> {
        distinct(predicates)
            .into_iter()
            .map(|p| self.verify(p))
            .collect()
    }
}

/// First occurrence of each distinct triple, in input order.
pub fn distinct(predicates: &[Predicate]) -> Vec<&Predicate> {
    let mut seen: HashSet<&Predicate> = HashSet::with_capacity(predicates.len());
    predicates.iter().filter(|p| seen.insert(*p)).collect()
}
