//! Update orchestrator: per-publisher single-flight queues.
//!
//! Every state-modifying path on the attention tracker is a
//! load -> modify -> save cycle against host storage. While a cycle for
//! a publisher is outstanding, further operations for the same id are
//! queued (never collapsed) and applied in FIFO order once the in-flight
//! cycle completes. Distinct ids proceed independently.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tally_types::{Category, Month};

/// A queued mutation of one publisher's record.
#[derive(Debug, Clone, PartialEq)]
pub enum PublisherOp {
    Visit {
        favicon_url: String,
        duration: u64,
        month: Month,
        year: i32,
    },
    Payment {
        value: f64,
        timestamp: u64,
        category: Category,
        month: Month,
        year: i32,
    },
}

impl PublisherOp {
    /// Storage category the op's load filter selects.
    pub fn category(&self) -> Category {
        match self {
            PublisherOp::Visit { .. } => Category::AutoContribute,
            PublisherOp::Payment { category, .. } => *category,
        }
    }

    pub fn period(&self) -> (Month, i32) {
        match self {
            PublisherOp::Visit { month, year, .. } => (*month, *year),
            PublisherOp::Payment { month, year, .. } => (*month, *year),
        }
    }
}

#[derive(Default)]
struct IdQueue {
    draining: bool,
    pending: VecDeque<PublisherOp>,
}

/// Tracks which ids have a cycle in flight and what is queued behind it.
#[derive(Default)]
pub struct UpdateOrchestrator {
    queues: Mutex<HashMap<String, IdQueue>>,
}

impl UpdateOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `op` for `publisher_id`. Returns true when the caller has
    /// become the driver for this id and must pump [`Self::take_next`]
    /// until it returns `None`.
    pub fn enqueue(&self, publisher_id: &str, op: PublisherOp) -> bool {
        let mut queues = self.lock();
        let queue = queues.entry(publisher_id.to_string()).or_default();
        queue.pending.push_back(op);
        if queue.draining {
            return false;
        }
        queue.draining = true;
        true
    }

    /// Pops the next queued op for `publisher_id`. `None` releases the
    /// driver slot; ops enqueued afterwards elect a new driver.
    pub fn take_next(&self, publisher_id: &str) -> Option<PublisherOp> {
        let mut queues = self.lock();
        let queue = queues.get_mut(publisher_id)?;
        match queue.pending.pop_front() {
            Some(op) => Some(op),
            None => {
                queues.remove(publisher_id);
                None
            }
        }
    }

    /// Whether a cycle for `publisher_id` is currently in flight.
    pub fn in_flight(&self, publisher_id: &str) -> bool {
        self.lock()
            .get(publisher_id)
            .map(|q| q.draining)
            .unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, IdQueue>> {
        self.queues.lock().expect("orchestrator lock poisoned")
    }
}
