//! Subscription registry with change-diffed sequencing.

use crate::types::{AssociatedLayer, Layer, PublisherId, SubscriptionState};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const SUBSCRIPTION_REGISTRY_TAG: &str = "SubscriptionRegistry:";

/// Tracks the subscriber side's current interest: a monitor-all flag, a set
/// of layer-only subscriptions, and layer+publisher subscriptions merged by
/// layer.
///
/// Every mutator returns `Some(snapshot)` only when it actually changed the
/// `(monitor_all, layers, associated)` tuple; a no-op mutation (subscribing
/// to something already subscribed, unsubscribing something never subscribed)
/// returns `None` and leaves the sequence untouched. The caller broadcasts
/// on `Some`.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    monitor_all: bool,
    layers: BTreeSet<Layer>,
    associated: BTreeMap<Layer, BTreeSet<PublisherId>>,
    sequence: i32,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe_all(&mut self) -> Option<SubscriptionState> {
        if self.monitor_all {
            return None;
        }
        self.monitor_all = true;
        Some(self.bump())
    }

    pub(crate) fn unsubscribe_all(&mut self) -> Option<SubscriptionState> {
        if !self.monitor_all {
            return None;
        }
        self.monitor_all = false;
        Some(self.bump())
    }

    pub(crate) fn subscribe(&mut self, layer: Layer) -> Option<SubscriptionState> {
        if !self.layers.insert(layer) {
            return None;
        }
        Some(self.bump())
    }

    pub(crate) fn unsubscribe(&mut self, layer: Layer) -> Option<SubscriptionState> {
        if !self.layers.remove(&layer) {
            debug!(
                "{} unsubscribe of layer with no subscription: {:?}",
                SUBSCRIPTION_REGISTRY_TAG, layer
            );
            return None;
        }
        Some(self.bump())
    }

    pub(crate) fn subscribe_to_publisher(
        &mut self,
        layer: Layer,
        publisher_id: PublisherId,
    ) -> Option<SubscriptionState> {
        if !self.associated.entry(layer).or_default().insert(publisher_id) {
            return None;
        }
        Some(self.bump())
    }

    pub(crate) fn unsubscribe_from_publisher(
        &mut self,
        layer: Layer,
        publisher_id: PublisherId,
    ) -> Option<SubscriptionState> {
        let Some(publishers) = self.associated.get_mut(&layer) else {
            debug!(
                "{} unsubscribe from publisher {} with no subscription: {:?}",
                SUBSCRIPTION_REGISTRY_TAG, publisher_id, layer
            );
            return None;
        };
        if !publishers.remove(&publisher_id) {
            return None;
        }
        // An associated layer with no publishers left is dropped entirely.
        if publishers.is_empty() {
            self.associated.remove(&layer);
        }
        Some(self.bump())
    }

    /// `true` when a publish of `layer` from `publisher_id` should reach the
    /// subscriber under any of the three match rules.
    pub(crate) fn matches(&self, layer: Layer, publisher_id: PublisherId) -> bool {
        self.monitor_all
            || self.layers.contains(&layer)
            || self
                .associated
                .get(&layer)
                .is_some_and(|publishers| publishers.contains(&publisher_id))
    }

    pub(crate) fn snapshot(&self) -> SubscriptionState {
        SubscriptionState {
            sequence: self.sequence,
            monitor_all: self.monitor_all,
            layers: self.layers.clone(),
            associated_layers: self
                .associated
                .iter()
                .map(|(layer, publishers)| AssociatedLayer::new(*layer, publishers.clone()))
                .collect(),
        }
    }

    fn bump(&mut self) -> SubscriptionState {
        self.sequence += 1;
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriptionRegistry;
    use crate::types::{AssociatedLayer, Layer, SubscriptionState};

    fn layer(layer_type: i32) -> Layer {
        Layer::new(layer_type, 0, 1)
    }

    #[test]
    fn subscribe_then_unsubscribe_restores_state_and_bumps_twice() {
        let mut registry = SubscriptionRegistry::new();
        let before = registry.snapshot();

        let subscribed = registry.subscribe(layer(1)).expect("change");
        assert_eq!(subscribed.sequence, 1);
        assert!(subscribed.layers.contains(&layer(1)));

        let unsubscribed = registry.unsubscribe(layer(1)).expect("change");
        assert_eq!(unsubscribed.sequence, 2);
        assert_eq!(unsubscribed.layers, before.layers);
        assert_eq!(unsubscribed.associated_layers, before.associated_layers);
        assert_eq!(unsubscribed.monitor_all, before.monitor_all);
    }

    #[test]
    fn redundant_mutations_are_silent() {
        let mut registry = SubscriptionRegistry::new();
        assert!(registry.unsubscribe(layer(1)).is_none());
        assert!(registry.unsubscribe_from_publisher(layer(1), 7).is_none());
        assert!(registry.unsubscribe_all().is_none());

        registry.subscribe(layer(1)).expect("change");
        assert!(registry.subscribe(layer(1)).is_none());

        registry.subscribe_all().expect("change");
        assert!(registry.subscribe_all().is_none());

        assert_eq!(registry.snapshot().sequence, 2);
    }

    #[test]
    fn publisher_subscriptions_merge_by_layer() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe_to_publisher(layer(1), 1).expect("change");
        let merged = registry.subscribe_to_publisher(layer(1), 2).expect("change");

        assert_eq!(
            merged.associated_layers,
            vec![AssociatedLayer::new(layer(1), [1, 2].into())]
        );

        let after_removal = registry
            .unsubscribe_from_publisher(layer(1), 1)
            .expect("change");
        assert_eq!(
            after_removal.associated_layers,
            vec![AssociatedLayer::new(layer(1), [2].into())]
        );
    }

    #[test]
    fn removing_last_publisher_drops_the_associated_layer() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe_to_publisher(layer(1), 1).expect("change");
        let snapshot = registry
            .unsubscribe_from_publisher(layer(1), 1)
            .expect("change");

        assert!(snapshot.associated_layers.is_empty());
        // The layer key is gone, so a repeat removal is a no-op.
        assert!(registry.unsubscribe_from_publisher(layer(1), 1).is_none());
    }

    #[test]
    fn match_rules_cover_all_three_subscription_kinds() {
        let mut registry = SubscriptionRegistry::new();
        assert!(!registry.matches(layer(1), 1));

        registry.subscribe(layer(1)).expect("change");
        assert!(registry.matches(layer(1), 1));
        assert!(!registry.matches(layer(2), 1));

        registry.subscribe_to_publisher(layer(2), 1).expect("change");
        assert!(registry.matches(layer(2), 1));
        assert!(!registry.matches(layer(2), 2));

        registry.subscribe_all().expect("change");
        assert!(registry.matches(layer(3), 9));
    }

    #[test]
    fn monitor_all_toggle_is_diffed_like_any_other_mutation() {
        let mut registry = SubscriptionRegistry::new();
        let on: SubscriptionState = registry.subscribe_all().expect("change");
        assert!(on.monitor_all);
        assert_eq!(on.sequence, 1);

        let off = registry.unsubscribe_all().expect("change");
        assert!(!off.monitor_all);
        assert_eq!(off.sequence, 2);
    }
}
