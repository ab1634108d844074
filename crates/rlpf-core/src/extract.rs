// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Predicate Extraction
// ─────────────────────────────────────────────────────────────────────
//! Predicate extractor trait plus deterministic fallbacks.
//!
//! In production a learned extraction model runs behind this trait,
//! usually in Python via `ExternalExtractor`. The pattern extractor
//! covers simple declarative English and keeps tests model-free; the
//! JSON extractor handles policies prompted to emit their own triples.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use rlpf_types::{Predicate, PredicateType, RlpfConfig};

/// Trait for predicate extraction backends.
pub trait PredicateExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<Predicate>;
}

static SENTENCE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?;]+(?:\s+|$)|\n+").expect("valid sentence regex"));

static RELATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<subj>.+?)\s+(?:was|were|is|are)\s+(?P<verb>created|founded|developed|written|invented|designed|built|authored|discovered|maintained)\s+by\s+(?P<obj>.+)$",
    )
    .expect("valid relation regex")
});

static MODAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<subj>.+?)\s+(?P<modal>cannot|can't|can\s+not|can|may\s+not|may|must\s+not|mustn't|must|shall\s+not|shall|should\s+not|shouldn't|should|does\s+not\s+allow|doesn't\s+allow|allows|permits|requires|forbids|prohibits|restricts)\s+(?P<obj>.+)$",
    )
    .expect("valid modal regex")
});

static COPULA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<subj>.+?)\s+(?P<verb>isn't|aren't|wasn't|weren't|is|are|was|were)(?P<neg>\s+not)?\s+(?P<obj>.+)$",
    )
    .expect("valid copula regex")
});

const PRONOUNS: &[&str] = &[
    "it", "this", "that", "they", "he", "she", "we", "you", "i", "there", "these", "those",
];

const MAX_SUBJECT_WORDS: usize = 8;

/// Strip quotes, trailing punctuation and a leading article.
fn clean_term(term: &str) -> String {
    let term = term
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == ',' || c == ':');
    let lower = term.to_lowercase();
    for article in ["the ", "a ", "an "] {
        if lower.starts_with(article) {
            return term[article.len()..].trim().to_string();
        }
    }
    term.to_string()
}

fn snake_case_modal(modal: &str) -> String {
    let collapsed = modal
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    match collapsed.as_str() {
        "can't" | "can_not" => "cannot".to_string(),
        "mustn't" => "must_not".to_string(),
        "shouldn't" => "should_not".to_string(),
        "does_not_allow" | "doesn't_allow" => "forbids".to_string(),
        _ => collapsed,
    }
}

fn copula_predicate(verb: &str, negated: bool) -> String {
    let verb = verb.to_lowercase();
    if let Some(base) = verb.strip_suffix("n't") {
        return format!("{base}_not");
    }
    if negated {
        format!("{verb}_not")
    } else {
        verb
    }
}

/// Regex-based extractor for simple declarative sentences.
///
/// Handles `X was created by Y`, modal/permission statements
/// (`X cannot Y`, `X allows Y`) and copulas (`X is [not] Y`).
/// Pronoun subjects are dropped since they cannot be verified.
pub struct HeuristicExtractor {
    confidence: f64,
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self { confidence: 0.7 }
    }
}

impl HeuristicExtractor {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &RlpfConfig) -> Self {
        Self::new(config.heuristic_confidence)
    }

    fn extract_sentence(&self, sentence: &str) -> Option<Predicate> {
        let (subj, pred, obj) = if let Some(c) = RELATION.captures(sentence) {
            (
                c["subj"].to_string(),
                format!("{}_by", c["verb"].to_lowercase()),
                c["obj"].to_string(),
            )
        } else if let Some(c) = MODAL.captures(sentence) {
            (
                c["subj"].to_string(),
                snake_case_modal(&c["modal"]),
                c["obj"].to_string(),
            )
        } else if let Some(c) = COPULA.captures(sentence) {
            (
                c["subj"].to_string(),
                copula_predicate(&c["verb"], c.name("neg").is_some()),
                c["obj"].to_string(),
            )
        } else {
            return None;
        };

        let subj = clean_term(&subj);
        let obj = clean_term(&obj);
        if PRONOUNS.contains(&subj.to_lowercase().as_str())
            || subj.split_whitespace().count() > MAX_SUBJECT_WORDS
        {
            return None;
        }

        let predicate_type = PredicateType::infer(&pred);
        let predicate = Predicate::new(subj, pred, obj)
            .and_then(|p| p.with_confidence(self.confidence))
            .ok()?;
        Some(predicate.with_source("heuristic").with_type(predicate_type))
    }
}

impl PredicateExtractor for HeuristicExtractor {
    fn extract(&self, text: &str) -> Vec<Predicate> {
        SENTENCE_SPLIT
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| self.extract_sentence(s))
            .collect()
    }
}

/// Extractor for completions that already contain predicate JSON.
///
/// Accepts an array of predicate dictionaries, an array of
/// `[subject, predicate, object]` triples, or an object with a
/// `predicates` array. Surrounding prose or code fences are tolerated.
/// Malformed entries are skipped with a warning.
#[derive(Debug, Default)]
pub struct JsonExtractor;

impl JsonExtractor {
    fn locate(text: &str) -> Option<Value> {
        let trimmed = text.trim();
        if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
            return Some(v);
        }
        let start = trimmed.find('[')?;
        let end = trimmed.rfind(']')?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&trimmed[start..=end]).ok()
    }

    /// Parse one predicate dictionary or `[subject, predicate, object]`
    /// triple. Malformed entries are logged and yield `None`.
    pub fn parse_value(item: &Value) -> Option<Predicate> {
        let parsed = match item {
            Value::Array(triple) if triple.len() == 3 => match (&triple[0], &triple[1]) {
                (Value::String(s), Value::String(p)) => {
                    Predicate::new(s.as_str(), p.as_str(), triple[2].clone())
                }
                _ => {
                    log::warn!("Skipping triple with non-string subject/predicate: {item}");
                    return None;
                }
            },
            other => Predicate::from_dict(other),
        };
        match parsed {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("Skipping malformed predicate {item}: {e}");
                None
            }
        }
    }
}

impl PredicateExtractor for JsonExtractor {
    fn extract(&self, text: &str) -> Vec<Predicate> {
        let items = match Self::locate(text) {
            Some(Value::Array(items)) => items,
            Some(Value::Object(mut obj)) => match obj.remove("predicates") {
                Some(Value::Array(items)) => items,
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        items.iter().filter_map(Self::parse_value).collect()
    }
}

/// Extractor that delegates to a closure.
///
/// Used by the PyO3 FFI layer to call a learned extraction model living
/// in Python while the verification path stays in Rust.
type ExtractFn = Box<dyn Fn(&str) -> Vec<Predicate> + Send + Sync>;

pub struct ExternalExtractor {
    extract_fn: ExtractFn,
}

impl ExternalExtractor {
    pub fn new(extract_fn: impl Fn(&str) -> Vec<Predicate> + Send + Sync + 'static) -> Self {
        Self {
            extract_fn: Box::new(extract_fn),
        }
    }
}

impl PredicateExtractor for ExternalExtractor {
    fn extract(&self, text: &str) -> Vec<Predicate> {
        (self.extract_fn)(text)
    }
}
