//! Per-publisher offering store and availability fixed-point resolver.

use crate::types::{AssociatedLayer, AvailableLayers, Layer, LayerOffering, PublisherId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

const OFFERING_STORE_TAG: &str = "OfferingStore:";

/// Dependency alternatives for the layers one publisher offers.
type PublisherOffering = BTreeMap<Layer, Vec<BTreeSet<Layer>>>;

/// Holds the current offering of every publisher and recomputes layer
/// availability whenever one changes.
///
/// An offering submission replaces the publisher's previous offering
/// unconditionally and always produces a new snapshot with the sequence
/// bumped by exactly 1, even when the submitted content is identical to the
/// previous one. A submission is a liveness announcement, not a diff.
#[derive(Default)]
pub(crate) struct OfferingStore {
    offerings: HashMap<PublisherId, PublisherOffering>,
    sequence: i32,
}

impl OfferingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replaces `publisher_id`'s offering with `entries` and returns the
    /// freshly resolved availability snapshot.
    ///
    /// Entries naming the same layer more than once contribute additional
    /// dependency alternatives for that layer. An entry with no alternatives
    /// is normalized to one empty alternative (no prerequisites).
    pub(crate) fn set_offering(
        &mut self,
        publisher_id: PublisherId,
        entries: Vec<LayerOffering>,
    ) -> AvailableLayers {
        let mut offering = PublisherOffering::new();
        for entry in entries {
            let alternatives = offering.entry(entry.layer).or_default();
            if entry.alternatives.is_empty() {
                alternatives.push(BTreeSet::new());
            } else {
                alternatives.extend(entry.alternatives);
            }
        }

        debug!(
            "{} publisher {} now offers {} layer(s)",
            OFFERING_STORE_TAG,
            publisher_id,
            offering.len()
        );
        self.offerings.insert(publisher_id, offering);
        self.sequence += 1;
        self.resolve()
    }

    /// Computes the availability closure over all current offerings.
    ///
    /// Repeats full passes until a pass adds nothing: an offered layer is
    /// added for its publisher once any one of its alternatives has every
    /// member layer present in the accumulating map, from any publisher.
    /// Zero-dependency entries land on the first pass; passes are bounded by
    /// the longest dependency chain, so the loop always terminates.
    fn resolve(&self) -> AvailableLayers {
        let mut available: BTreeMap<Layer, BTreeSet<PublisherId>> = BTreeMap::new();

        loop {
            let mut added = false;
            for (publisher_id, offering) in &self.offerings {
                for (layer, alternatives) in offering {
                    if available
                        .get(layer)
                        .is_some_and(|publishers| publishers.contains(publisher_id))
                    {
                        continue;
                    }
                    let satisfied = alternatives
                        .iter()
                        .any(|deps| deps.iter().all(|dep| available.contains_key(dep)));
                    if satisfied {
                        available.entry(*layer).or_default().insert(*publisher_id);
                        added = true;
                    }
                }
            }
            if !added {
                break;
            }
        }

        AvailableLayers {
            sequence: self.sequence,
            associated: available
                .into_iter()
                .map(|(layer, publishers)| AssociatedLayer::new(layer, publishers))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OfferingStore;
    use crate::types::{AssociatedLayer, Layer, LayerOffering};
    use std::collections::BTreeSet;

    fn layer(layer_type: i32) -> Layer {
        Layer::new(layer_type, 0, 1)
    }

    fn deps(layers: &[Layer]) -> BTreeSet<Layer> {
        layers.iter().copied().collect()
    }

    #[test]
    fn unconditional_offering_is_available_at_sequence_one() {
        let mut store = OfferingStore::new();
        let snapshot = store.set_offering(1, vec![LayerOffering::unconditional(layer(10))]);

        assert_eq!(snapshot.sequence, 1);
        assert_eq!(
            snapshot.associated,
            vec![AssociatedLayer::new(layer(10), [1].into())]
        );
    }

    #[test]
    fn resubmitting_identical_offering_still_bumps_sequence() {
        let mut store = OfferingStore::new();
        let entries = vec![LayerOffering::unconditional(layer(10))];

        let first = store.set_offering(1, entries.clone());
        let second = store.set_offering(1, entries);

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(first.associated, second.associated);
    }

    #[test]
    fn three_level_chain_resolves_in_one_submission() {
        let mut store = OfferingStore::new();
        let snapshot = store.set_offering(
            1,
            vec![
                LayerOffering::with_dependencies(layer(3), deps(&[layer(1), layer(2)])),
                LayerOffering::with_dependencies(layer(2), deps(&[layer(1)])),
                LayerOffering::unconditional(layer(1)),
            ],
        );

        assert_eq!(snapshot.sequence, 1);
        assert_eq!(
            snapshot.associated,
            vec![
                AssociatedLayer::new(layer(1), [1].into()),
                AssociatedLayer::new(layer(2), [1].into()),
                AssociatedLayer::new(layer(3), [1].into()),
            ]
        );
    }

    #[test]
    fn one_satisfied_alternative_suffices() {
        let mut store = OfferingStore::new();
        let never_offered = layer(99);
        let snapshot = store.set_offering(
            1,
            vec![
                LayerOffering::unconditional(layer(1)),
                // Same layer offered twice: one satisfiable alternative, one not.
                LayerOffering::with_dependencies(layer(2), deps(&[never_offered])),
                LayerOffering::with_dependencies(layer(2), deps(&[layer(1)])),
            ],
        );

        assert!(snapshot
            .associated
            .iter()
            .any(|associated| associated.layer == layer(2)));
    }

    #[test]
    fn unsatisfied_dependency_keeps_layer_unavailable() {
        let mut store = OfferingStore::new();
        let snapshot = store.set_offering(
            1,
            vec![LayerOffering::with_dependencies(
                layer(2),
                deps(&[layer(99)]),
            )],
        );

        assert!(snapshot.associated.is_empty());
    }

    #[test]
    fn dependency_satisfied_across_publishers() {
        let mut store = OfferingStore::new();
        store.set_offering(1, vec![LayerOffering::unconditional(layer(1))]);
        let snapshot = store.set_offering(
            2,
            vec![LayerOffering::with_dependencies(layer(2), deps(&[layer(1)]))],
        );

        assert_eq!(snapshot.sequence, 2);
        assert_eq!(
            snapshot.associated,
            vec![
                AssociatedLayer::new(layer(1), [1].into()),
                AssociatedLayer::new(layer(2), [2].into()),
            ]
        );
    }

    #[test]
    fn replacing_an_offering_retracts_dependent_layers() {
        let mut store = OfferingStore::new();
        store.set_offering(1, vec![LayerOffering::unconditional(layer(1))]);
        store.set_offering(
            2,
            vec![LayerOffering::with_dependencies(layer(2), deps(&[layer(1)]))],
        );

        // Publisher 1 stops offering the prerequisite.
        let snapshot = store.set_offering(1, Vec::new());

        assert_eq!(snapshot.sequence, 3);
        assert!(snapshot.associated.is_empty());
    }

    #[test]
    fn same_layer_from_two_publishers_merges_publisher_sets() {
        let mut store = OfferingStore::new();
        store.set_offering(1, vec![LayerOffering::unconditional(layer(1))]);
        let snapshot = store.set_offering(2, vec![LayerOffering::unconditional(layer(1))]);

        assert_eq!(
            snapshot.associated,
            vec![AssociatedLayer::new(layer(1), [1, 2].into())]
        );
    }
}
