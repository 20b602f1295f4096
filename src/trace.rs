//! Composition trace: per-key contribution history for the environment
//! layers, recorded only when the caller asks for it.

use crate::types::EnvOp;
use serde::Serialize;
use std::collections::BTreeMap;

/// One attempt to contribute to a key, accepted or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub value: String,
    pub source_kind: String,
    pub source_path: String,
    pub precedence_rank: u32,
    pub operation: EnvOp,
    pub accepted: bool,
}

impl Serialize for Contribution {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Contribution", 6)?;
        s.serialize_field("accepted", &self.accepted)?;
        s.serialize_field("operation", self.operation.as_str())?;
        s.serialize_field("precedence_rank", &self.precedence_rank)?;
        s.serialize_field("source_kind", &self.source_kind)?;
        s.serialize_field("source_path", &self.source_path)?;
        s.serialize_field("value", &self.value)?;
        s.end()
    }
}

/// Serialized per-key entry: the winning contribution plus full history in
/// layer order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub history: Vec<Contribution>,
    pub precedence_rank: u32,
    pub source_kind: String,
    pub source_path: String,
    pub value: String,
}

/// section → key → entry. Keys serialize sorted at every level.
pub type Trace = BTreeMap<String, BTreeMap<String, TraceEntry>>;

/// Collects environment contributions during composition. A disabled
/// recorder ignores everything.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    enabled: bool,
    environment: BTreeMap<String, Vec<Contribution>>,
}

impl TraceRecorder {
    pub fn new(enabled: bool) -> Self {
        TraceRecorder {
            enabled,
            ..Default::default()
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_env(
        &mut self,
        key: &str,
        value: &str,
        source_kind: &str,
        source_path: &str,
        rank: u32,
        operation: EnvOp,
        accepted: bool,
    ) {
        if !self.enabled {
            return;
        }
        self.environment
            .entry(key.to_string())
            .or_default()
            .push(Contribution {
                value: value.to_string(),
                source_kind: source_kind.to_string(),
                source_path: source_path.to_string(),
                precedence_rank: rank,
                operation,
                accepted,
            });
    }

    /// Build the serialized trace. The winning contribution for a key is
    /// the last accepted one; the final value comes from the finished
    /// environment (it may differ after placeholder expansion).
    pub fn finish(self, environment: &BTreeMap<String, String>) -> Option<Trace> {
        if !self.enabled {
            return None;
        }

        let mut entries = BTreeMap::new();
        for (key, history) in self.environment {
            let mut entry = TraceEntry {
                value: environment.get(&key).cloned().unwrap_or_default(),
                ..Default::default()
            };
            if let Some(winner) = history.iter().rev().find(|c| c.accepted) {
                entry.source_kind = winner.source_kind.clone();
                entry.source_path = winner.source_path.clone();
                entry.precedence_rank = winner.precedence_rank;
            }
            entry.history = history;
            entries.insert(key, entry);
        }

        let mut trace = Trace::new();
        trace.insert("environment".to_string(), entries);
        Some(trace)
    }
}
