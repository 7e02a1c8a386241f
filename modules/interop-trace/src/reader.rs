//! Reads a persisted trace back into an indexed causal graph.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::engine::TraceRecord;
use crate::span_id::SpanId;

/// Spans and events loaded from a trace.
#[derive(Debug, Default)]
pub struct TraceLog {
    /// Span → its direct causes.
    spans: HashMap<SpanId, Vec<SpanId>>,
    /// Span → types of events traced against it, in file order.
    events: HashMap<SpanId, Vec<String>>,
    records: Vec<TraceRecord>,
    skipped_lines: usize,
}

impl TraceLog {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading trace file {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    /// Parse newline-delimited records. Unparsable lines are counted and skipped.
    pub fn parse(text: &str) -> Self {
        let mut log = Self::default();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TraceRecord>(line) {
                Ok(record) => log.insert(record),
                Err(e) => {
                    warn!(line = line_no + 1, error = %e, "Skipping unreadable trace record");
                    log.skipped_lines += 1;
                }
            }
        }
        log
    }

    fn insert(&mut self, record: TraceRecord) {
        match &record {
            TraceRecord::Span { id, causes } => {
                self.spans.insert(*id, causes.clone());
            }
            TraceRecord::Event {
                span_id,
                event_type,
                ..
            } => {
                self.events
                    .entry(*span_id)
                    .or_default()
                    .push(event_type.clone());
            }
        }
        self.records.push(record);
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    pub fn causes(&self, span_id: SpanId) -> Option<&[SpanId]> {
        self.spans.get(&span_id).map(Vec::as_slice)
    }

    pub fn event_types(&self, span_id: SpanId) -> &[String] {
        self.events.get(&span_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn spans_with_event(&self, event_type: &str) -> Vec<SpanId> {
        let mut spans: Vec<SpanId> = self
            .events
            .iter()
            .filter(|(_, types)| types.iter().any(|t| t == event_type))
            .map(|(id, _)| *id)
            .collect();
        spans.sort();
        spans
    }

    pub fn root_spans(&self) -> Vec<SpanId> {
        let mut roots: Vec<SpanId> = self
            .spans
            .iter()
            .filter(|(_, causes)| causes.is_empty())
            .map(|(id, _)| *id)
            .collect();
        roots.sort();
        roots
    }

    /// Whether at least `min_causes` of `span_id`'s direct causes carry an
    /// event whose type is one of `cause_types`.
    pub fn check_event_trace_cause(
        &self,
        span_id: SpanId,
        cause_types: &[&str],
        min_causes: usize,
    ) -> bool {
        let Some(causes) = self.causes(span_id) else {
            return false;
        };
        let matching = causes
            .iter()
            .filter(|cause| {
                self.event_types(**cause)
                    .iter()
                    .any(|t| cause_types.contains(&t.as_str()))
            })
            .count();
        matching >= min_causes
    }

    /// Every span `span_id` transitively depends on, nearest first.
    pub fn ancestors(&self, span_id: SpanId) -> Vec<SpanId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<SpanId> = self
            .causes(span_id)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(causes) = self.causes(id) {
                queue.extend(causes.iter().copied());
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_line(id: SpanId, causes: &[SpanId]) -> String {
        let record = TraceRecord::Span {
            id,
            causes: causes.to_vec(),
        };
        serde_json::to_string(&record).unwrap()
    }

    fn event_line(span_id: SpanId, event_type: &str) -> String {
        let record = TraceRecord::Event {
            span_id,
            unix_timestamp_millis: 0,
            message: String::new(),
            event_type: event_type.to_string(),
            data: Default::default(),
        };
        serde_json::to_string(&record).unwrap()
    }

    #[test]
    fn indexes_spans_and_events() {
        let root = SpanId::generate();
        let child = SpanId::generate();
        let text = [
            span_line(root, &[]),
            event_line(root, "send"),
            span_line(child, &[root]),
            event_line(child, "receive"),
        ]
        .join("\n");

        let log = TraceLog::parse(&text);
        assert_eq!(log.span_count(), 2);
        assert_eq!(log.event_count(), 2);
        assert_eq!(log.root_spans(), vec![root]);
        assert_eq!(log.causes(child), Some(&[root][..]));
        assert!(log.check_event_trace_cause(child, &["send"], 1));
        assert!(!log.check_event_trace_cause(child, &["receive"], 1));
        assert!(!log.check_event_trace_cause(child, &["send"], 2));
    }

    #[test]
    fn skips_garbage_lines() {
        let root = SpanId::generate();
        let text = format!("{}\nnot json\n\n{{\"kind\":\"span\"", span_line(root, &[]));
        let log = TraceLog::parse(&text);
        assert_eq!(log.span_count(), 1);
        assert_eq!(log.skipped_lines(), 2);
    }

    #[test]
    fn ancestors_walks_the_dag_once() {
        let a = SpanId::generate();
        let b = SpanId::generate();
        let c = SpanId::generate();
        let d = SpanId::generate();
        let text = [
            span_line(a, &[]),
            span_line(b, &[a]),
            span_line(c, &[a]),
            span_line(d, &[b, c]),
        ]
        .join("\n");

        let log = TraceLog::parse(&text);
        let ancestors = log.ancestors(d);
        assert_eq!(ancestors.len(), 3);
        assert_eq!(&ancestors[..2], &[b, c]);
        assert_eq!(ancestors[2], a);
    }
}
