// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Predicate Triples
// ─────────────────────────────────────────────────────────────────────
//! The (subject, predicate, object) triple extracted from model output,
//! plus the term-matching and polarity helpers the verifier relies on.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{RlpfError, RlpfResult};

/// Jaccard threshold used by [`Predicate::matches`] in fuzzy mode.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.5;

const NEGATION_PREDICATES: &[&str] = &[
    "cannot",
    "shall_not",
    "should_not",
    "must_not",
    "is_not",
    "are_not",
    "does_not",
    "do_not",
    "forbids",
    "restricts",
    "was_not",
    "were_not",
    "ought_not",
    "might_not",
];

/// Coarse semantic category of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateType {
    Assertion,
    Permission,
    Obligation,
    Restriction,
    Relation,
}

impl PredicateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateType::Assertion => "assertion",
            PredicateType::Permission => "permission",
            PredicateType::Obligation => "obligation",
            PredicateType::Restriction => "restriction",
            PredicateType::Relation => "relation",
        }
    }

    /// Infer a category from a snake_cased predicate such as `must_not`.
    pub fn infer(pred: &str) -> Self {
        let (base, negated) = polarity(pred);
        match base.as_str() {
            "allows" if negated => PredicateType::Restriction,
            "allows" => PredicateType::Permission,
            "requires" | "should" | "ought" if negated => PredicateType::Restriction,
            "requires" | "should" | "ought" => PredicateType::Obligation,
            "is" | "are" | "was" | "were" => PredicateType::Assertion,
            _ => PredicateType::Relation,
        }
    }
}

impl fmt::Display for PredicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredicateType {
    type Err = RlpfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "assertion" => Ok(PredicateType::Assertion),
            "permission" => Ok(PredicateType::Permission),
            "obligation" => Ok(PredicateType::Obligation),
            "restriction" => Ok(PredicateType::Restriction),
            "relation" => Ok(PredicateType::Relation),
            other => Err(RlpfError::Validation(format!(
                "unknown predicate type '{other}'"
            ))),
        }
    }
}

/// A factual claim as a (subject, predicate, object) triple.
///
/// Construction always goes through validation: subject and predicate are
/// trimmed and non-empty, the object is non-null, and confidence lies in
/// [0, 1]. Equality and hashing consider the triple only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PredicateRecord")]
pub struct Predicate {
    #[serde(rename = "subject")]
    subj: String,
    #[serde(rename = "predicate")]
    pred: String,
    #[serde(rename = "object")]
    obj: Value,
    confidence: f64,
    source: Option<String>,
    #[serde(rename = "type")]
    predicate_type: Option<PredicateType>,
    metadata: Map<String, Value>,
}

/// Wire shape accepted by `from_dict`/`from_json` before validation.
#[derive(Debug, Deserialize)]
struct PredicateRecord {
    subject: String,
    predicate: String,
    #[serde(default, alias = "obj")]
    object: Value,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    source: Option<String>,
    #[serde(default, rename = "type")]
    predicate_type: Option<PredicateType>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

fn default_confidence() -> f64 {
    1.0
}

impl TryFrom<PredicateRecord> for Predicate {
    type Error = RlpfError;

    fn try_from(record: PredicateRecord) -> Result<Self, Self::Error> {
        let mut predicate = Predicate::new(record.subject, record.predicate, record.object)?
            .with_confidence(record.confidence)?;
        predicate.source = record.source;
        predicate.predicate_type = record.predicate_type;
        predicate.metadata = record.metadata.unwrap_or_default();
        Ok(predicate)
    }
}

fn validate_confidence(confidence: f64) -> RlpfResult<()> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(RlpfError::Validation(format!(
            "confidence must be in [0, 1], got {confidence}"
        )));
    }
    Ok(())
}

impl Predicate {
    /// Build a validated predicate with confidence 1.0.
    pub fn new(
        subj: impl Into<String>,
        pred: impl Into<String>,
        obj: impl Into<Value>,
    ) -> RlpfResult<Self> {
        let subj = subj.into().trim().to_string();
        let pred = pred.into().trim().to_string();
        let obj = match obj.into() {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        };

        let empty_obj = obj.is_null() || obj.as_str().is_some_and(str::is_empty);
        if subj.is_empty() || pred.is_empty() || empty_obj {
            return Err(RlpfError::Validation(
                "subject, predicate and object must be non-empty".to_string(),
            ));
        }

        Ok(Self {
            subj,
            pred,
            obj,
            confidence: 1.0,
            source: None,
            predicate_type: None,
            metadata: Map::new(),
        })
    }

    pub fn with_confidence(mut self, confidence: f64) -> RlpfResult<Self> {
        validate_confidence(confidence)?;
        self.confidence = confidence;
        Ok(self)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_type(mut self, predicate_type: PredicateType) -> Self {
        self.predicate_type = Some(predicate_type);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn subject(&self) -> &str {
        &self.subj
    }

    pub fn predicate(&self) -> &str {
        &self.pred
    }

    pub fn object(&self) -> &Value {
        &self.obj
    }

    /// The object as plain text: strings unquoted, everything else as JSON.
    pub fn object_text(&self) -> Cow<'_, str> {
        match &self.obj {
            Value::String(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn predicate_type(&self) -> Option<PredicateType> {
        self.predicate_type
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn to_triple(&self) -> (&str, &str, &Value) {
        (&self.subj, &self.pred, &self.obj)
    }

    /// Dictionary form with keys `subject, predicate, object, confidence,
    /// source, type, metadata`.
    pub fn to_dict(&self) -> Value {
        json!({
            "subject": self.subj,
            "predicate": self.pred,
            "object": self.obj,
            "confidence": self.confidence,
            "source": self.source,
            "type": self.predicate_type.map(|t| t.as_str()),
            "metadata": self.metadata,
        })
    }

    /// Parse the dictionary form. Missing `confidence` defaults to 1.0.
    pub fn from_dict(value: &Value) -> RlpfResult<Self> {
        let record = PredicateRecord::deserialize(value)?;
        Self::try_from(record)
    }

    pub fn to_json(&self) -> RlpfResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> RlpfResult<Self> {
        let record: PredicateRecord = serde_json::from_str(json)?;
        Self::try_from(record)
    }

    pub fn is_negation(&self) -> bool {
        NEGATION_PREDICATES.contains(&self.pred.as_str()) || self.pred.starts_with("not_")
    }

    /// Exact mode compares triples; fuzzy mode tolerates subject/object
    /// spelling differences but still requires an identical predicate.
    pub fn matches(&self, other: &Predicate, fuzzy: bool) -> bool {
        if fuzzy {
            fuzzy_match(&self.subj, &other.subj, DEFAULT_FUZZY_THRESHOLD)
                && self.pred == other.pred
                && fuzzy_match(
                    &self.object_text(),
                    &other.object_text(),
                    DEFAULT_FUZZY_THRESHOLD,
                )
        } else {
            self == other
        }
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.subj == other.subj && self.pred == other.pred && self.obj == other.obj
    }
}

impl Eq for Predicate {}

impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subj.hash(state);
        self.pred.hash(state);
        self.obj.to_string().hash(state);
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({}, {}, {}", self.subj, self.pred, self.object_text())?;
        if self.confidence < 1.0 {
            write!(f, ", conf={:.2}", self.confidence)?;
        }
        f.write_str(")")
    }
}

/// Lowercase, turn underscores into spaces and collapse whitespace.
pub fn normalize_term(term: &str) -> String {
    term.to_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tolerant term comparison.
///
/// Equal after normalisation, or one contains the other ("MIT" vs
/// "MIT License"), or word-set Jaccard similarity >= `threshold`.
pub fn fuzzy_match(s1: &str, s2: &str, threshold: f64) -> bool {
    let a = normalize_term(s1);
    let b = normalize_term(s2);

    if a == b {
        return true;
    }
    if a.contains(&b) || b.contains(&a) {
        return true;
    }

    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return false;
    }

    let intersection = words_a.intersection(&words_b).count() as f64;
    let union = words_a.union(&words_b).count() as f64;
    intersection / union >= threshold
}

/// Map a predicate to its canonical positive base and a negation flag.
///
/// `cannot`, `forbids` and `must_not` all become `("allows", true)`;
/// `permits` and `can` become `("allows", false)`; `is_not` becomes
/// `("is", true)`; `not_x` becomes `("x", true)`.
pub fn polarity(pred: &str) -> (String, bool) {
    let p = pred.trim().to_lowercase().replace([' ', '-'], "_");

    let (base, negated) = match p.as_str() {
        "cannot" | "can_not" | "forbids" | "prohibits" | "restricts" | "disallows"
        | "must_not" | "shall_not" | "may_not" => ("allows", true),
        other => {
            if let Some(rest) = other.strip_prefix("not_") {
                (rest, true)
            } else if let Some(rest) = other.strip_suffix("_not") {
                (rest, true)
            } else {
                (other, false)
            }
        }
    };

    let canonical = match base {
        "can" | "may" | "allow" | "allows" | "permit" | "permits" => "allows",
        "must" | "shall" | "require" | "requires" => "requires",
        other => other,
    };
    (canonical.to_string(), negated)
}

/// True when both predicates share a canonical base and negation flag.
pub fn same_polarity(a: &str, b: &str) -> bool {
    polarity(a) == polarity(b)
}

/// True when one predicate asserts what the other denies.
///
/// Besides a plain sign flip on the same base, a requirement implies
/// permission, so `requires X` also conflicts with `forbids X`.
pub fn polarity_conflict(a: &str, b: &str) -> bool {
    let pa = polarity(a);
    let pb = polarity(b);
    if pa.0 == pb.0 && pa.1 != pb.1 {
        return true;
    }
    let permits = |p: &(String, bool)| !p.1 && (p.0 == "allows" || p.0 == "requires");
    let forbids = |p: &(String, bool)| p.1 && p.0 == "allows";
    (permits(&pa) && forbids(&pb)) || (forbids(&pa) && permits(&pb))
}
