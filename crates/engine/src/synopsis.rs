//! The synopsis: the in-memory working set of eligible publishers and
//! its percentage normalizer.
//!
//! Derived state, rebuilt from storage write-backs; never persisted on
//! its own. Keyed by a `BTreeMap` so iteration (and therefore rounding
//! adjustment order) is deterministic and id-sorted.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tally_types::PublisherInfo;

use crate::scoring;

/// Working-set entry for one publisher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublisherSnapshot {
    pub id: String,
    pub duration: u64,
    pub visits: u32,
    pub score: f64,
    pub percent: u32,
    pub weight: f64,
}

#[derive(Debug, Default)]
pub struct Synopsis {
    publishers: BTreeMap<String, PublisherSnapshot>,
}

impl Synopsis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a freshly written record into the working set. Creates the
    /// entry only when absent; an existing entry is updated in place.
    pub fn upsert(&mut self, info: &PublisherInfo) {
        let entry = self
            .publishers
            .entry(info.id.clone())
            .or_insert_with(|| PublisherSnapshot {
                id: info.id.clone(),
                ..PublisherSnapshot::default()
            });
        entry.duration = info.duration;
        entry.score = info.score;
        entry.visits = info.visits;
        entry.percent = info.percent;
        entry.weight = info.weight;
    }

    pub fn remove(&mut self, publisher_id: &str) -> bool {
        self.publishers.remove(publisher_id).is_some()
    }

    pub fn get(&self, publisher_id: &str) -> Option<&PublisherSnapshot> {
        self.publishers.get(publisher_id)
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }

    /// Recomputes `percent` and `weight` across the working set so the
    /// percents sum to exactly 100. A no-op for an empty set or a zero
    /// score total.
    pub fn normalize(&mut self) {
        if self.publishers.is_empty() {
            return;
        }
        let total_score: f64 = self.publishers.values().map(|p| p.score).sum();
        if total_score <= 0.0 {
            return;
        }

        let reals: Vec<f64> = self
            .publishers
            .values()
            .map(|p| p.score / total_score * 100.0)
            .collect();
        let percents = scoring::round_percents(&reals);

        let count = self.publishers.len() as f64;
        for (entry, percent) in self.publishers.values_mut().zip(percents) {
            entry.percent = percent;
            entry.weight = entry.score / count * 100.0;
        }
    }

    /// The working set ordered for ballot allocation: descending score,
    /// ties broken by id ascending for determinism.
    pub fn top(&self) -> Vec<PublisherSnapshot> {
        let mut ranked: Vec<PublisherSnapshot> = self.publishers.values().cloned().collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked
    }
}
