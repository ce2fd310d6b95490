//! Append-only store of produced artifacts across all jobs and modes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use vf_core::events::{EventBus, EventCategory, EventPayload};
use vf_core::{Error, ResultId, ResultSource};

use crate::artifact::Artifact;

/// An artifact as recorded by the aggregator. Never mutated once added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalResult {
    pub id: ResultId,
    pub source: ResultSource,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub artifact: Artifact,
}

pub struct ResultAggregator {
    results: RwLock<Vec<GlobalResult>>,
    events: Arc<EventBus>,
}

impl ResultAggregator {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            results: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Append all artifacts under one lock, sharing one timestamp.
    pub fn add_results(&self, artifacts: Vec<Artifact>, source: ResultSource) -> Vec<ResultId> {
        let timestamp = Utc::now();
        let added: Vec<GlobalResult> = artifacts
            .into_iter()
            .map(|artifact| GlobalResult {
                id: ResultId::new(),
                source,
                timestamp,
                artifact,
            })
            .collect();
        let ids: Vec<ResultId> = added.iter().map(|r| r.id).collect();

        self.results.write().extend(added);

        if !ids.is_empty() {
            tracing::debug!(count = ids.len(), %source, "results added");
            self.events.broadcast(
                EventCategory::Results,
                EventPayload::ResultsAdded {
                    result_ids: ids.clone(),
                    source,
                },
            );
        }
        ids
    }

    /// All results in insertion order.
    pub fn list(&self) -> Vec<GlobalResult> {
        self.results.read().clone()
    }

    pub fn by_source(&self, source: ResultSource) -> Vec<GlobalResult> {
        self.results
            .read()
            .iter()
            .filter(|r| r.source == source)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: ResultId) -> Option<GlobalResult> {
        self.results.read().iter().find(|r| r.id == id).cloned()
    }

    pub fn remove(&self, id: ResultId) -> vf_core::Result<GlobalResult> {
        let removed = {
            let mut results = self.results.write();
            let pos = results
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| Error::not_found("result", id))?;
            results.remove(pos)
        };
        self.events.broadcast(
            EventCategory::Results,
            EventPayload::ResultRemoved { result_id: id },
        );
        Ok(removed)
    }

    /// Drop every result; returns how many there were.
    pub fn clear(&self) -> usize {
        let removed = std::mem::take(&mut *self.results.write()).len();
        self.events.broadcast(
            EventCategory::Results,
            EventPayload::ResultsCleared { removed },
        );
        removed
    }

    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}

impl std::fmt::Debug for ResultAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultAggregator")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
