use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Which stage of a fallback cascade produced a value. Carried through to
/// the response so a missing field can be diagnosed without re-running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    StructuredContent,
    StructuredOuter,
    EmbeddedBlob,
    DomScan,
    BodyTextScan,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub stage: String,
    pub outcome: String,
    pub elapsed_ms: u64,
}

/// Append-only log of every navigation and extraction step. This is the
/// only debugging surface the pipeline has against the live site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosisTrace {
    pub entries: Vec<TraceEntry>,
}

impl DiagnosisTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: &str, outcome: impl Into<String>, started: Instant) {
        self.entries.push(TraceEntry {
            stage: stage.to_string(),
            outcome: outcome.into(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
    }

    pub fn note(&mut self, stage: &str, outcome: impl Into<String>) {
        self.entries.push(TraceEntry {
            stage: stage.to_string(),
            outcome: outcome.into(),
            elapsed_ms: 0,
        });
    }

    pub fn extend(&mut self, other: DiagnosisTrace) {
        self.entries.extend(other.entries);
    }
}

/// A field value together with the strategy that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult<T> {
    pub value: Option<T>,
    pub strategy: Strategy,
}

impl<T> ExtractionResult<T> {
    pub fn found(value: T, strategy: Strategy) -> Self {
        ExtractionResult {
            value: Some(value),
            strategy,
        }
    }

    pub fn absent() -> Self {
        ExtractionResult {
            value: None,
            strategy: Strategy::NotFound,
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }
}
