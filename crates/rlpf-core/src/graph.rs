// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Knowledge Graph Interface
// ─────────────────────────────────────────────────────────────────────
//! Fact store that extracted predicates are verified against.
//!
//! The in-memory backend indexes facts by normalised subject and is the
//! reference implementation for tests and small curated graphs. Larger
//! deployments plug a triple store or SPARQL endpoint in through the
//! `KnowledgeGraph` trait.

use std::collections::HashMap;
use std::io::BufRead;

use serde_json::Value;

use rlpf_types::predicate::{fuzzy_match, normalize_term};
use rlpf_types::{Predicate, RlpfError, RlpfResult};

/// Trait for knowledge graph backends.
pub trait KnowledgeGraph: Send + Sync {
    /// Facts whose subject matches `subject`.
    ///
    /// With `fuzzy_threshold` set, backends may also return facts about
    /// subjects that only fuzzily match (e.g. "MIT" for "MIT License").
    fn lookup(&self, subject: &str, fuzzy_threshold: Option<f64>) -> Vec<Predicate>;
}

/// In-memory triple store keyed by normalised subject.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    facts: HashMap<String, Vec<Predicate>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facts(facts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut graph = Self::new();
        for fact in facts {
            graph.add_fact(fact);
        }
        graph
    }

    /// Insert a fact. An existing fact with the same triple is replaced.
    pub fn add_fact(&mut self, fact: Predicate) {
        let bucket = self
            .facts
            .entry(normalize_term(fact.subject()))
            .or_default();
        match bucket.iter_mut().find(|f| **f == fact) {
            Some(existing) => *existing = fact,
            None => bucket.push(fact),
        }
    }

    /// Remove a fact by triple. Returns whether anything was removed.
    pub fn remove_fact(&mut self, fact: &Predicate) -> bool {
        let key = normalize_term(fact.subject());
        let Some(bucket) = self.facts.get_mut(&key) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|f| f != fact);
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            self.facts.remove(&key);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.facts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn facts(&self) -> impl Iterator<Item = &Predicate> {
        self.facts.values().flatten()
    }

    /// Load from a JSON array of predicate dictionaries.
    pub fn from_json(json: &str) -> RlpfResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Array(items) = value else {
            return Err(RlpfError::Graph(
                "expected a JSON array of facts".to_string(),
            ));
        };
        let facts = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                Predicate::from_dict(item)
                    .map_err(|e| RlpfError::Graph(format!("fact {i}: {e}")))
            })
            .collect::<RlpfResult<Vec<_>>>()?;
        Ok(Self::with_facts(facts))
    }

    /// Load one predicate dictionary per line. Blank lines are skipped.
    pub fn load_jsonl(reader: impl BufRead) -> RlpfResult<Self> {
        let mut graph = Self::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fact = Predicate::from_json(&line)
                .map_err(|e| RlpfError::Graph(format!("line {}: {e}", i + 1)))?;
            graph.add_fact(fact);
        }
        log::debug!("Loaded {} facts from JSONL", graph.len());
        Ok(graph)
    }
}

impl KnowledgeGraph for InMemoryGraph {
    fn lookup(&self, subject: &str, fuzzy_threshold: Option<f64>) -> Vec<Predicate> {
        let key = normalize_term(subject);
        let mut found: Vec<Predicate> = self.facts.get(&key).cloned().unwrap_or_default();

        if let Some(threshold) = fuzzy_threshold {
            for (other, bucket) in &self.facts {
                if *other != key && fuzzy_match(other, &key, threshold) {
                    found.extend(bucket.iter().cloned());
                }
            }
        }
        found
    }
}

/// Knowledge graph that delegates lookups to a closure.
///
/// Used by the PyO3 FFI layer to back the graph with a Python store.
type LookupFn = Box<dyn Fn(&str) -> Vec<Predicate> + Send + Sync>;

pub struct ExternalGraph {
    lookup_fn: LookupFn,
}

impl ExternalGraph {
    pub fn new(lookup_fn: impl Fn(&str) -> Vec<Predicate> + Send + Sync + 'static) -> Self {
        Self {
            lookup_fn: Box::new(lookup_fn),
        }
    }
}

impl KnowledgeGraph for ExternalGraph {
    fn lookup(&self, subject: &str, _fuzzy_threshold: Option<f64>) -> Vec<Predicate> {
        (self.lookup_fn)(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(s: &str, p: &str, o: &str) -> Predicate {
        Predicate::new(s, p, o).unwrap()
    }

    fn license_graph() -> InMemoryGraph {
        InMemoryGraph::with_facts([
            fact("MIT License", "allows", "commercial_use"),
            fact("MIT License", "requires", "license_notice"),
            fact("GPL", "requires", "source_disclosure"),
        ])
    }

    #[test]
    fn test_exact_lookup_normalises_subject() {
        let graph = license_graph();
        let facts = graph.lookup("mit_license", None);
        assert_eq!(facts.len(), 2);
    }

    #[test]
    fn test_lookup_miss() {
        let graph = license_graph();
        assert!(graph.lookup("Apache", None).is_empty());
        assert!(graph.lookup("Apache", Some(0.5)).is_empty());
    }

    #[test]
    fn test_fuzzy_lookup() {
        let graph = license_graph();
        assert!(graph.lookup("MIT", None).is_empty());
        assert_eq!(graph.lookup("MIT", Some(0.5)).len(), 2);
    }

    #[test]
    fn test_add_fact_replaces_same_triple() {
        let mut graph = license_graph();
        let updated = fact("GPL", "requires", "source_disclosure")
            .with_confidence(0.4)
            .unwrap();
        graph.add_fact(updated);
        assert_eq!(graph.len(), 3);
        let facts = graph.lookup("GPL", None);
        assert_eq!(facts[0].confidence(), 0.4);
    }

    #[test]
    fn test_remove_fact() {
        let mut graph = license_graph();
        assert!(graph.remove_fact(&fact("GPL", "requires", "source_disclosure")));
        assert!(!graph.remove_fact(&fact("GPL", "requires", "source_disclosure")));
        assert_eq!(graph.len(), 2);
        assert!(graph.lookup("GPL", None).is_empty());
    }

    #[test]
    fn test_from_json() {
        let graph = InMemoryGraph::from_json(
            r#"[
                {"subject": "Python", "predicate": "created_by", "object": "Guido van Rossum"},
                {"subject": "Rust", "predicate": "first_released", "object": 2015}
            ]"#,
        )
        .unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.facts().count(), 2);
    }

    #[test]
    fn test_from_json_rejects_object() {
        let err = InMemoryGraph::from_json(r#"{"subject": "x"}"#).unwrap_err();
        assert!(matches!(err, RlpfError::Graph(_)));
    }

    #[test]
    fn test_from_json_reports_bad_fact() {
        let err = InMemoryGraph::from_json(
            r#"[{"subject": "x", "predicate": "y", "object": null}]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("fact 0"));
    }

    #[test]
    fn test_load_jsonl() {
        let data = "{\"subject\": \"GPL\", \"predicate\": \"cannot\", \"object\": \"close_source\"}\n\n\
                    {\"subject\": \"MIT\", \"predicate\": \"allows\", \"object\": \"sublicensing\"}\n";
        let graph = InMemoryGraph::load_jsonl(data.as_bytes()).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_load_jsonl_reports_line() {
        let data = "{\"subject\": \"GPL\", \"predicate\": \"cannot\", \"object\": \"x\"}\nnot json\n";
        let err = InMemoryGraph::load_jsonl(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_external_graph() {
        let graph = ExternalGraph::new(|subject| {
            if subject == "sky" {
                vec![Predicate::new("sky", "has_color", "blue").unwrap()]
            } else {
                Vec::new()
            }
        });
        assert_eq!(graph.lookup("sky", None).len(), 1);
        assert!(graph.lookup("sea", Some(0.5)).is_empty());
    }
}
