//! Verified/excluded publisher registry.
//!
//! An immutable snapshot shared by reference; a refresh builds a new
//! map and swaps it in atomically, so readers either see the whole old
//! list or the whole new one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use tally_types::{TallyError, TallyResult};

/// Registry flags for one publisher. Unknown publishers are neither
/// verified nor excluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryEntry {
    pub verified: bool,
    pub excluded: bool,
}

#[derive(Default)]
pub struct PublisherRegistry {
    snapshot: RwLock<Arc<HashMap<String, RegistryEntry>>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, publisher_id: &str) -> RegistryEntry {
        self.current()
            .get(publisher_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_verified(&self, publisher_id: &str) -> bool {
        self.lookup(publisher_id).verified
    }

    pub fn is_excluded(&self, publisher_id: &str) -> bool {
        self.lookup(publisher_id).excluded
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    /// Atomically replaces the whole snapshot.
    pub fn replace(&self, entries: HashMap<String, RegistryEntry>) {
        let mut guard = self.snapshot.write().expect("registry lock poisoned");
        *guard = Arc::new(entries);
    }

    fn current(&self) -> Arc<HashMap<String, RegistryEntry>> {
        self.snapshot.read().expect("registry lock poisoned").clone()
    }
}

/// Parses the registry wire format: a JSON object mapping publisher id
/// to `[verified, excluded, ...]`.
///
/// The parser is tolerant: trailing array elements are ignored, and
/// entries whose value is not a `[bool, bool, ...]` array are skipped
/// rather than failing the whole list.
pub fn parse_publishers_list(body: &str) -> TallyResult<HashMap<String, RegistryEntry>> {
    let root: Value = serde_json::from_str(body)
        .map_err(|err| TallyError::unexpected(format!("publishers list is not JSON: {err}")))?;
    let object = root
        .as_object()
        .ok_or_else(|| TallyError::unexpected("publishers list is not a JSON object"))?;

    let mut entries = HashMap::with_capacity(object.len());
    for (id, flags) in object {
        let Some(flags) = flags.as_array() else {
            log::debug!("skipping registry entry '{id}': value is not an array");
            continue;
        };
        match (
            flags.first().and_then(Value::as_bool),
            flags.get(1).and_then(Value::as_bool),
        ) {
            (Some(verified), Some(excluded)) => {
                entries.insert(id.clone(), RegistryEntry { verified, excluded });
            }
            _ => log::debug!("skipping registry entry '{id}': malformed flags"),
        }
    }
    Ok(entries)
}
