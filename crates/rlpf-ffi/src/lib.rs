// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — PyO3 FFI Bindings
// (C) 2026 RLPF Kernel contributors. All rights reserved.
// License: GNU AGPL v3
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied — PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the RLPF reward kernel.
//!
//! Exposes `RlpfConfig`, `Predicate`, `RewardBreakdown`,
//! `RustRewardAggregator` and `RustRewardMonitor` to Python via PyO3, so
//! a Python training loop can compute predicate-feedback rewards in Rust.
//!
//! # FFI Safety
//!
//! - GIL acquired via `Python::with_gil` before every Python callback.
//! - Python exceptions in callbacks → safe defaults (no facts, no predicates).
//! - No borrowed references escape the GIL lock scope.
//! - All config validated before storage (`RlpfConfig::validate()`).
//!
//! Install: `pip install -e crates/rlpf-ffi` (requires maturin).
//!
//! Usage from Python:
//! ```python
//! from rlpf_kernel import Predicate, RustRewardAggregator
//!
//! facts = [Predicate("Python", "created_by", "Guido van Rossum")]
//! agg = RustRewardAggregator(facts=facts)
//! agg.score("Python was created by Larry Wall.").reward  # < 0
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use serde_json::Value;

use rlpf_core::{
    ExternalExtractor, ExternalGraph, HeuristicExtractor, InMemoryGraph, JsonExtractor,
    KnowledgeGraph, PredicateExtractor, RewardAggregator, RewardMonitor,
};
use rlpf_types::{Predicate, PredicateType, RewardBreakdown, RlpfConfig, RlpfError};

fn value_error(e: RlpfError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Convert a Python scalar into a JSON value; anything else goes through `str()`.
fn py_to_value(obj: &Bound<'_, PyAny>) -> PyResult<Value> {
    if obj.is_none() {
        return Ok(Value::Null);
    }
    if let Ok(b) = obj.extract::<bool>() {
        return Ok(Value::Bool(b));
    }
    if let Ok(i) = obj.extract::<i64>() {
        return Ok(Value::from(i));
    }
    if let Ok(f) = obj.extract::<f64>() {
        return Ok(Value::from(f));
    }
    if let Ok(s) = obj.extract::<String>() {
        return Ok(Value::String(s));
    }
    Ok(Value::String(obj.str()?.to_string()))
}

/// Callback results may mix `Predicate` objects and `(s, p, o)` tuples whose
/// object can be any scalar. Malformed items are logged and skipped.
fn extract_predicates(py: Python<'_>, result: &PyObject) -> Vec<Predicate> {
    if let Ok(preds) = result.extract::<Vec<PyPredicate>>(py) {
        return preds.into_iter().map(|p| p.inner).collect();
    }
    let items = match result.extract::<Vec<PyObject>>(py) {
        Ok(items) => items,
        Err(e) => {
            log::warn!("Callback returned a non-list result, ignoring it: {e}");
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let item = item.bind(py);
            if let Ok(p) = item.extract::<PyPredicate>() {
                return Some(p.inner);
            }
            match triple_value(item) {
                Ok(value) => JsonExtractor::parse_value(&value),
                Err(e) => {
                    log::warn!("Skipping callback item {i}: {e}");
                    None
                }
            }
        })
        .collect()
}

/// `(s, p, o)` tuple or list as a JSON array, each element converted on its own.
fn triple_value(item: &Bound<'_, PyAny>) -> PyResult<Value> {
    let parts = item.extract::<Vec<Bound<'_, PyAny>>>()?;
    let values = parts.iter().map(py_to_value).collect::<PyResult<Vec<_>>>()?;
    Ok(Value::Array(values))
}

// ─── PyRlpfConfig ───────────────────────────────────────────────────

/// Python-visible configuration for the RLPF kernel.
#[pyclass(name = "RlpfConfig")]
#[derive(Clone)]
struct PyRlpfConfig {
    inner: RlpfConfig,
}

#[pymethods]
impl PyRlpfConfig {
    #[new]
    #[pyo3(signature = (
        fuzzy_matching = true,
        fuzzy_threshold = 0.5,
        fuzzy_discount = 0.8,
        min_confidence = 0.1,
        functional_predicates = None,
        heuristic_confidence = 0.7,
        w_supported = 1.0,
        w_contradicted = 1.0,
        w_unverifiable = 0.1,
        empty_reward = 0.0,
        reward_clip = 1.0,
        baseline_window = 64,
        max_predicates = 256,
        deadline_ms = 50,
        monitor_window = 10,
        window_floor = -0.25,
        hard_floor = -0.8,
        trend_window = 5,
        trend_threshold = 0.6,
        history_cap = 1024,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        fuzzy_matching: bool,
        fuzzy_threshold: f64,
        fuzzy_discount: f64,
        min_confidence: f64,
        functional_predicates: Option<Vec<String>>,
        heuristic_confidence: f64,
        w_supported: f64,
        w_contradicted: f64,
        w_unverifiable: f64,
        empty_reward: f64,
        reward_clip: f64,
        baseline_window: usize,
        max_predicates: usize,
        deadline_ms: u64,
        monitor_window: usize,
        window_floor: f64,
        hard_floor: f64,
        trend_window: usize,
        trend_threshold: f64,
        history_cap: usize,
    ) -> PyResult<Self> {
        let defaults = RlpfConfig::default();
        let config = RlpfConfig {
            fuzzy_matching,
            fuzzy_threshold,
            fuzzy_discount,
            min_confidence,
            functional_predicates: functional_predicates
                .unwrap_or(defaults.functional_predicates),
            heuristic_confidence,
            w_supported,
            w_contradicted,
            w_unverifiable,
            empty_reward,
            reward_clip,
            baseline_window,
            max_predicates,
            deadline_ms,
            monitor_window,
            window_floor,
            hard_floor,
            trend_window,
            trend_threshold,
            history_cap,
        };
        config.validate().map_err(value_error)?;
        Ok(Self { inner: config })
    }

    /// Construct from JSON string.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = RlpfConfig::from_json(json).map_err(value_error)?;
        config.validate().map_err(value_error)?;
        Ok(Self { inner: config })
    }

    fn __repr__(&self) -> String {
        format!(
            "RlpfConfig(w_supported={}, w_contradicted={}, w_unverifiable={}, reward_clip={})",
            self.inner.w_supported,
            self.inner.w_contradicted,
            self.inner.w_unverifiable,
            self.inner.reward_clip
        )
    }
}

// ─── PyPredicate ────────────────────────────────────────────────────

/// Python-visible (subject, predicate, object) triple.
#[pyclass(name = "Predicate")]
#[derive(Clone)]
struct PyPredicate {
    inner: Predicate,
}

#[pymethods]
impl PyPredicate {
    #[new]
    #[pyo3(signature = (subject, predicate, object, confidence = 1.0, source = None, predicate_type = None))]
    fn new(
        subject: &str,
        predicate: &str,
        object: &Bound<'_, PyAny>,
        confidence: f64,
        source: Option<String>,
        predicate_type: Option<&str>,
    ) -> PyResult<Self> {
        let mut inner = Predicate::new(subject, predicate, py_to_value(object)?)
            .and_then(|p| p.with_confidence(confidence))
            .map_err(value_error)?;
        if let Some(source) = source {
            inner = inner.with_source(source);
        }
        if let Some(t) = predicate_type {
            inner = inner.with_type(t.parse::<PredicateType>().map_err(value_error)?);
        }
        Ok(Self { inner })
    }

    #[getter]
    fn subject(&self) -> &str {
        self.inner.subject()
    }

    #[getter]
    fn predicate(&self) -> &str {
        self.inner.predicate()
    }

    /// Object as text (non-string objects are rendered as JSON).
    #[getter]
    fn object(&self) -> String {
        self.inner.object_text().into_owned()
    }

    #[getter]
    fn confidence(&self) -> f64 {
        self.inner.confidence()
    }

    #[getter]
    fn source(&self) -> Option<&str> {
        self.inner.source()
    }

    #[getter]
    fn predicate_type(&self) -> Option<&'static str> {
        self.inner.predicate_type().map(|t| t.as_str())
    }

    fn to_triple(&self) -> (String, String, String) {
        (
            self.inner.subject().to_string(),
            self.inner.predicate().to_string(),
            self.inner.object_text().into_owned(),
        )
    }

    fn is_negation(&self) -> bool {
        self.inner.is_negation()
    }

    #[pyo3(signature = (other, fuzzy = false))]
    fn matches(&self, other: &PyPredicate, fuzzy: bool) -> bool {
        self.inner.matches(&other.inner, fuzzy)
    }

    fn to_json(&self) -> PyResult<String> {
        self.inner.to_json().map_err(value_error)
    }

    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let inner = Predicate::from_json(json).map_err(value_error)?;
        Ok(Self { inner })
    }

    fn __eq__(&self, other: &Self) -> bool {
        self.inner == other.inner
    }

    fn __hash__(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.inner.hash(&mut hasher);
        hasher.finish()
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}

// ─── PyRewardBreakdown ──────────────────────────────────────────────

/// Python-visible reward result for one completion.
#[pyclass(name = "RewardBreakdown")]
#[derive(Clone)]
struct PyRewardBreakdown {
    inner: RewardBreakdown,
}

#[pymethods]
impl PyRewardBreakdown {
    #[getter]
    fn reward(&self) -> f64 {
        self.inner.reward
    }

    #[getter]
    fn raw_reward(&self) -> f64 {
        self.inner.raw_reward
    }

    #[getter]
    fn advantage(&self) -> f64 {
        self.inner.advantage
    }

    #[getter]
    fn supported(&self) -> u32 {
        self.inner.supported
    }

    #[getter]
    fn contradicted(&self) -> u32 {
        self.inner.contradicted
    }

    #[getter]
    fn unverifiable(&self) -> u32 {
        self.inner.unverifiable
    }

    #[getter]
    fn skipped(&self) -> u32 {
        self.inner.skipped
    }

    #[getter]
    fn elapsed_ms(&self) -> f64 {
        self.inner.elapsed_ms
    }

    #[getter]
    fn deadline_exceeded(&self) -> bool {
        self.inner.deadline_exceeded
    }

    #[getter]
    fn factual_precision(&self) -> Option<f64> {
        self.inner.factual_precision()
    }

    /// Per-predicate trace as `(predicate, verdict, match_kind, weight)`.
    #[getter]
    fn verdicts(&self) -> Vec<(PyPredicate, &'static str, &'static str, f64)> {
        self.inner
            .verdicts
            .iter()
            .map(|v| {
                (
                    PyPredicate {
                        inner: v.predicate.clone(),
                    },
                    v.verdict.as_str(),
                    v.match_kind.as_str(),
                    v.weight,
                )
            })
            .collect()
    }

    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new(py);
        dict.set_item("reward", self.inner.reward)?;
        dict.set_item("raw_reward", self.inner.raw_reward)?;
        dict.set_item("advantage", self.inner.advantage)?;
        dict.set_item("supported", self.inner.supported)?;
        dict.set_item("contradicted", self.inner.contradicted)?;
        dict.set_item("unverifiable", self.inner.unverifiable)?;
        dict.set_item("skipped", self.inner.skipped)?;
        dict.set_item("elapsed_ms", self.inner.elapsed_ms)?;
        dict.set_item("deadline_exceeded", self.inner.deadline_exceeded)?;
        Ok(dict)
    }

    fn to_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner).map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn __repr__(&self) -> String {
        format!(
            "RewardBreakdown(reward={:.4}, supported={}, contradicted={}, unverifiable={})",
            self.inner.reward, self.inner.supported, self.inner.contradicted, self.inner.unverifiable
        )
    }
}

// ─── RustRewardAggregator ───────────────────────────────────────────

/// Predicate-feedback reward function exposed to Python.
///
/// The graph and the extractor can each be backed by a Python callable
/// that crosses the FFI boundary per invocation; verification and reward
/// aggregation stay in Rust.
#[pyclass(name = "RustRewardAggregator")]
struct PyRewardAggregator {
    inner: RewardAggregator,
}

#[pymethods]
impl PyRewardAggregator {
    /// Create a new aggregator.
    ///
    /// Args:
    ///     config: Optional RlpfConfig (uses defaults if None).
    ///     facts: Optional list of Predicate facts for the in-memory graph.
    ///     facts_json: Optional JSON array of fact dicts, merged with `facts`.
    ///     graph_callback: Optional Callable[[str], list[Predicate]] that
    ///                     returns facts about a subject. Overrides `facts`.
    ///     extractor_callback: Optional Callable[[str], list[Predicate]] for a
    ///                         learned extractor. Overrides `extractor`.
    ///     extractor: "heuristic" (pattern based) or "json" (model emits triples).
    #[new]
    #[pyo3(signature = (
        config = None,
        facts = None,
        facts_json = None,
        graph_callback = None,
        extractor_callback = None,
        extractor = "heuristic",
    ))]
    fn new(
        config: Option<PyRlpfConfig>,
        facts: Option<Vec<PyPredicate>>,
        facts_json: Option<&str>,
        graph_callback: Option<PyObject>,
        extractor_callback: Option<PyObject>,
        extractor: &str,
    ) -> PyResult<Self> {
        let cfg = config.map(|c| c.inner).unwrap_or_default();

        let graph: Arc<dyn KnowledgeGraph> = match graph_callback {
            Some(cb) => Arc::new(ExternalGraph::new(move |subject: &str| {
                Python::with_gil(|py| match cb.call1(py, (subject,)) {
                    Ok(result) => extract_predicates(py, &result),
                    Err(_) => Vec::new(),
                })
            })),
            None => {
                let mut graph = match facts_json {
                    Some(json) => InMemoryGraph::from_json(json).map_err(value_error)?,
                    None => InMemoryGraph::new(),
                };
                for fact in facts.unwrap_or_default() {
                    graph.add_fact(fact.inner);
                }
                Arc::new(graph)
            }
        };

        let extractor: Arc<dyn PredicateExtractor> = match extractor_callback {
            Some(cb) => Arc::new(ExternalExtractor::new(move |text: &str| {
                Python::with_gil(|py| match cb.call1(py, (text,)) {
                    Ok(result) => extract_predicates(py, &result),
                    Err(_) => Vec::new(),
                })
            })),
            None => match extractor {
                "heuristic" => Arc::new(HeuristicExtractor::from_config(&cfg)),
                "json" => Arc::new(JsonExtractor),
                other => {
                    return Err(PyValueError::new_err(format!(
                        "unknown extractor '{other}', expected 'heuristic' or 'json'"
                    )))
                }
            },
        };

        Ok(Self {
            inner: RewardAggregator::new(cfg, extractor, graph),
        })
    }

    /// Extract predicates from a completion and score them.
    fn score(&self, text: &str) -> PyRewardBreakdown {
        PyRewardBreakdown {
            inner: self.inner.score(text),
        }
    }

    /// Score and compute the advantage over the running baseline.
    fn review(&self, text: &str) -> PyRewardBreakdown {
        PyRewardBreakdown {
            inner: self.inner.review(text),
        }
    }

    /// Score already-extracted predicates.
    fn score_predicates(&self, predicates: Vec<PyPredicate>) -> PyRewardBreakdown {
        let predicates: Vec<Predicate> = predicates.into_iter().map(|p| p.inner).collect();
        PyRewardBreakdown {
            inner: self.inner.score_predicates(&predicates),
        }
    }

    /// Score a group of completions for one prompt.
    ///
    /// Returns: tuple(rewards: list[float], advantages: list[float])
    fn score_group(&self, completions: Vec<String>) -> (Vec<f64>, Vec<f64>) {
        let refs: Vec<&str> = completions.iter().map(|s| s.as_str()).collect();
        let group = self.inner.score_group(&refs);
        (group.rewards, group.advantages)
    }

    #[getter]
    fn baseline(&self) -> f64 {
        self.inner.baseline()
    }

    #[getter]
    fn baseline_len(&self) -> usize {
        self.inner.baseline_len()
    }

    fn reset_baseline(&self) {
        self.inner.reset_baseline();
    }
}

// ─── RustRewardMonitor ──────────────────────────────────────────────

/// Training-health monitor exposed to Python.
#[pyclass(name = "RustRewardMonitor")]
struct PyRewardMonitor {
    inner: RewardMonitor,
}

#[pymethods]
impl PyRewardMonitor {
    #[new]
    #[pyo3(signature = (config = None))]
    fn new(config: Option<PyRlpfConfig>) -> Self {
        let cfg = config.map(|c| c.inner).unwrap_or_default();
        Self {
            inner: RewardMonitor::new(cfg),
        }
    }

    /// Record one step's mean reward. Returns True if training must halt.
    fn observe(&self, reward: f64) -> bool {
        self.inner.observe(reward).halted
    }

    fn halt(&self, reason: &str) {
        self.inner.halt(reason);
    }

    fn reactivate(&self) {
        self.inner.reactivate();
    }

    #[getter]
    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    #[getter]
    fn halted(&self) -> bool {
        self.inner.halted()
    }

    #[getter]
    fn halt_index(&self) -> i64 {
        self.inner.halt_index()
    }

    #[getter]
    fn halt_reason(&self) -> String {
        self.inner.halt_reason()
    }

    /// Most recent step rewards (at most `history_cap`).
    #[getter]
    fn reward_history(&self) -> Vec<f64> {
        self.inner.reward_history()
    }

    fn step_count(&self) -> usize {
        self.inner.step_count()
    }

    fn avg_reward(&self) -> f64 {
        self.inner.avg_reward()
    }

    fn min_reward(&self) -> Option<f64> {
        self.inner.min_reward()
    }

    fn __repr__(&self) -> String {
        format!(
            "RewardMonitor(steps={}, halted={}, avg_reward={:.4})",
            self.inner.step_count(),
            self.inner.halted(),
            self.inner.avg_reward(),
        )
    }
}

#[pymodule]
fn rlpf_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyRlpfConfig>()?;
    m.add_class::<PyPredicate>()?;
    m.add_class::<PyRewardBreakdown>()?;
    m.add_class::<PyRewardAggregator>()?;
    m.add_class::<PyRewardMonitor>()?;
    Ok(())
}
