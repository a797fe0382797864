//! Sequenced snapshot types broadcast by the broker.

use crate::types::layer::{Layer, PublisherId};
use std::collections::BTreeSet;

/// A layer paired with the set of publishers currently able to supply it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssociatedLayer {
    pub layer: Layer,
    pub publishers: BTreeSet<PublisherId>,
}

impl AssociatedLayer {
    pub fn new(layer: Layer, publishers: BTreeSet<PublisherId>) -> Self {
        Self { layer, publishers }
    }
}

/// The set of layers currently resolvable from the active offerings.
///
/// `sequence` increases by exactly 1 on every accepted offering submission,
/// including resubmissions that leave `associated` unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvailableLayers {
    pub sequence: i32,
    pub associated: Vec<AssociatedLayer>,
}

impl AvailableLayers {
    /// The empty pre-offering snapshot at sequence 0.
    pub fn empty() -> Self {
        Self {
            sequence: 0,
            associated: Vec::new(),
        }
    }
}

/// The current subscription interest, as seen by publishers.
///
/// `associated_layers` merges all layer+publisher subscriptions to the same
/// layer into one entry with a unioned publisher set. `sequence` increases by
/// exactly 1 only when a mutation actually changes `monitor_all`, `layers`,
/// or `associated_layers`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionState {
    pub sequence: i32,
    pub monitor_all: bool,
    pub layers: BTreeSet<Layer>,
    pub associated_layers: Vec<AssociatedLayer>,
}

impl SubscriptionState {
    /// The empty pre-subscription snapshot at sequence 0.
    pub fn empty() -> Self {
        Self {
            sequence: 0,
            monitor_all: false,
            layers: BTreeSet::new(),
            associated_layers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AvailableLayers, SubscriptionState};

    #[test]
    fn empty_snapshots_start_at_sequence_zero() {
        let available = AvailableLayers::empty();
        assert_eq!(available.sequence, 0);
        assert!(available.associated.is_empty());

        let subscriptions = SubscriptionState::empty();
        assert_eq!(subscriptions.sequence, 0);
        assert!(!subscriptions.monitor_all);
        assert!(subscriptions.layers.is_empty());
        assert!(subscriptions.associated_layers.is_empty());
    }
}
