// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Reward Dataset Export
// ─────────────────────────────────────────────────────────────────────
//! JSONL export of scored completions, one record per line, for offline
//! analysis or for training a reward model on predicate feedback.

use std::io::Write;

use serde::{Deserialize, Serialize};

use rlpf_types::{PredicateVerdict, RewardBreakdown, RlpfResult};

/// One scored (prompt, completion) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardRecord {
    pub prompt: String,
    pub completion: String,
    pub reward: f64,
    pub advantage: f64,
    pub supported: u32,
    pub contradicted: u32,
    pub unverifiable: u32,
    pub skipped: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verdicts: Vec<PredicateVerdict>,
}

impl RewardRecord {
    pub fn new(
        prompt: impl Into<String>,
        completion: impl Into<String>,
        breakdown: &RewardBreakdown,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            completion: completion.into(),
            reward: breakdown.reward,
            advantage: breakdown.advantage,
            supported: breakdown.supported,
            contradicted: breakdown.contradicted,
            unverifiable: breakdown.unverifiable,
            skipped: breakdown.skipped,
            verdicts: breakdown.verdicts.clone(),
        }
    }

    /// Drop the per-predicate trace to keep exports small.
    pub fn without_verdicts(mut self) -> Self {
        self.verdicts.clear();
        self
    }
}

/// Write records as JSON Lines. Returns the number of records written.
pub fn write_jsonl<W: Write>(records: &[RewardRecord], mut writer: W) -> RlpfResult<usize> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(records.len())
}

pub fn to_jsonl_string(records: &[RewardRecord]) -> RlpfResult<String> {
    let mut buf = Vec::new();
    write_jsonl(records, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rlpf_types::{Predicate, RlpfConfig, Verdict};
    use serde_json::Value;

    use super::*;
    use crate::extract::HeuristicExtractor;
    use crate::graph::InMemoryGraph;
    use crate::reward::RewardAggregator;

    fn scored(text: &str) -> RewardBreakdown {
        let graph = InMemoryGraph::with_facts([
            Predicate::new("Python", "created_by", "Guido van Rossum").unwrap(),
        ]);
        let agg = RewardAggregator::new(
            RlpfConfig::default(),
            Arc::new(HeuristicExtractor::default()),
            Arc::new(graph),
        );
        agg.review(text)
    }

    #[test]
    fn test_record_from_breakdown() {
        let b = scored("Python was created by Larry Wall.");
        let record = RewardRecord::new("Who made Python?", "Python was created by Larry Wall.", &b);
        assert_eq!(record.contradicted, 1);
        assert!(record.reward < 0.0);
        assert_eq!(record.verdicts[0].verdict, Verdict::Contradicted);
    }

    #[test]
    fn test_write_jsonl_lines() {
        let records = vec![
            RewardRecord::new("p1", "c1", &scored("Python was created by Guido van Rossum.")),
            RewardRecord::new("p2", "c2", &scored("Nothing here")).without_verdicts(),
        ];
        let out = to_jsonl_string(&records).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["prompt"], "p1");
        assert_eq!(first["verdicts"][0]["verdict"], "supported");
        assert_eq!(first["verdicts"][0]["match_kind"], "exact");

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert!(second.get("verdicts").is_none());
    }

    #[test]
    fn test_jsonl_records_parse_back() {
        let records = vec![RewardRecord::new(
            "p",
            "c",
            &scored("Python was created by Guido van Rossum."),
        )];
        let out = to_jsonl_string(&records).unwrap();
        let back: RewardRecord = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(back.supported, 1);
        assert_eq!(back.verdicts[0].predicate.subject(), "Python");
    }

    #[test]
    fn test_write_count() {
        let mut sink = Vec::new();
        assert_eq!(write_jsonl(&[], &mut sink).unwrap(), 0);
        assert!(sink.is_empty());
    }
}
