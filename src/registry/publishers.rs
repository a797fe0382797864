//! Append-only identity-blob to publisher-id bijection.

use crate::types::PublisherId;
use std::collections::HashMap;
use tracing::debug;

const PUBLISHER_REGISTRY_TAG: &str = "PublisherRegistry:";

/// Assigns stable integer ids to opaque publisher identity blobs.
///
/// Ids are handed out in first-seen order starting at 1 and are never reused
/// or reassigned for the lifetime of the registry. Registering a blob that
/// was seen before returns the id it was assigned the first time.
#[derive(Default)]
pub(crate) struct PublisherRegistry {
    ids_by_info: HashMap<Vec<u8>, PublisherId>,
    info_by_id: HashMap<PublisherId, Vec<u8>>,
}

impl PublisherRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `info`, allocating the next one on first sight.
    pub(crate) fn register(&mut self, info: &[u8]) -> PublisherId {
        if let Some(id) = self.ids_by_info.get(info) {
            return *id;
        }
        let id = self.ids_by_info.len() as PublisherId + 1;
        self.ids_by_info.insert(info.to_vec(), id);
        self.info_by_id.insert(id, info.to_vec());
        debug!(
            "{} assigned publisher id {} ({} bytes of identity info)",
            PUBLISHER_REGISTRY_TAG,
            id,
            info.len()
        );
        id
    }

    /// Returns the identity blob registered for `id`, or an empty blob if the
    /// id is unknown. Unknown ids are a normal occurrence, not an error.
    pub(crate) fn info_for(&self, id: PublisherId) -> Vec<u8> {
        self.info_by_id.get(&id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::PublisherRegistry;

    #[test]
    fn same_info_registers_once() {
        let mut registry = PublisherRegistry::new();
        let first = registry.register(b"publisher-a");
        let second = registry.register(b"publisher-a");
        assert_eq!(first, 1);
        assert_eq!(second, 1);
    }

    #[test]
    fn distinct_info_gets_distinct_ids_in_order() {
        let mut registry = PublisherRegistry::new();
        assert_eq!(registry.register(b"publisher-a"), 1);
        assert_eq!(registry.register(b"publisher-b"), 2);
        assert_eq!(registry.register(b"publisher-a"), 1);
        assert_eq!(registry.register(b"publisher-c"), 3);
    }

    #[test]
    fn info_round_trips_through_the_assigned_id() {
        let mut registry = PublisherRegistry::new();
        let id = registry.register(b"publisher-a");
        assert_eq!(registry.info_for(id), b"publisher-a".to_vec());
    }

    #[test]
    fn unknown_id_yields_empty_info() {
        let registry = PublisherRegistry::new();
        assert!(registry.info_for(12345).is_empty());
    }
}
