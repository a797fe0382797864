/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use crate::error::BrokerError;
use crate::listeners::{BrokerSubscriber, PublisherListener};
use crate::registry::offerings::OfferingStore;
use crate::registry::publishers::PublisherRegistry;
use crate::registry::subscriptions::SubscriptionRegistry;
use crate::types::{AvailableLayers, Layer, LayerOffering, PublisherId, SubscriptionState};
use arc_swap::ArcSwap;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const VMS_BROKER_TAG: &str = "VmsBroker:";
const VMS_BROKER_FN_SET_LAYERS_OFFERING_TAG: &str = "set_layers_offering():";
const VMS_BROKER_FN_PUBLISH_TAG: &str = "publish():";

/// Guarded by the facade mutex: every mutation sees all registries and the
/// callback slots in one consistent state, which is what makes sequence
/// assignment and closure recomputation sound.
struct BrokerState {
    publishers: PublisherRegistry,
    offerings: OfferingStore,
    subscriptions: SubscriptionRegistry,
    subscriber: Option<Arc<dyn BrokerSubscriber>>,
    publisher_listeners: Vec<Arc<dyn PublisherListener>>,
}

/// Publish/subscribe broker for map-data layers.
///
/// Maintains the publisher identity registry, the per-publisher offering
/// store with its availability resolver, and the subscription registry, all
/// serialized behind one mutex. Callback invocation (payload delivery and
/// snapshot broadcasts) happens after the lock is released, with a captured
/// immutable snapshot, so a slow subscriber cannot stall concurrent mutators.
///
/// The current snapshots are additionally published through lock-free cells,
/// making [`VmsBroker::available_layers`] and
/// [`VmsBroker::subscription_state`] cheap and synchronously consistent with
/// the most recent mutation.
pub struct VmsBroker {
    state: Mutex<BrokerState>,
    available: ArcSwap<AvailableLayers>,
    subscriptions: ArcSwap<SubscriptionState>,
}

impl Default for VmsBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl VmsBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BrokerState {
                publishers: PublisherRegistry::new(),
                offerings: OfferingStore::new(),
                subscriptions: SubscriptionRegistry::new(),
                subscriber: None,
                publisher_listeners: Vec::new(),
            }),
            available: ArcSwap::from_pointee(AvailableLayers::empty()),
            subscriptions: ArcSwap::from_pointee(SubscriptionState::empty()),
        }
    }

    /// Returns the stable id for a publisher identity blob, assigning the
    /// next one on first sight. Never fails; byte-identical blobs always
    /// resolve to the same id.
    pub async fn register_publisher(&self, info: &[u8]) -> PublisherId {
        self.state.lock().await.publishers.register(info)
    }

    /// Returns the identity blob registered for `publisher_id`, or an empty
    /// blob for an unknown id.
    pub async fn publisher_info(&self, publisher_id: PublisherId) -> Vec<u8> {
        self.state.lock().await.publishers.info_for(publisher_id)
    }

    /// Replaces `publisher_id`'s offering and rebroadcasts availability.
    ///
    /// Always produces a new snapshot with the sequence bumped by 1, even
    /// when `entries` is identical to the previous submission.
    pub async fn set_layers_offering(&self, publisher_id: PublisherId, entries: Vec<LayerOffering>) {
        let (snapshot, subscriber) = {
            let mut state = self.state.lock().await;
            let snapshot = Arc::new(state.offerings.set_offering(publisher_id, entries));
            self.available.store(snapshot.clone());
            (snapshot, state.subscriber.clone())
        };

        debug!(
            "{}{} broadcasting availability sequence {}",
            VMS_BROKER_TAG, VMS_BROKER_FN_SET_LAYERS_OFFERING_TAG, snapshot.sequence
        );
        if let Some(subscriber) = subscriber {
            subscriber.on_layers_availability_changed(snapshot).await;
        }
    }

    /// The current availability snapshot.
    pub fn available_layers(&self) -> Arc<AvailableLayers> {
        self.available.load_full()
    }

    /// The current subscription snapshot.
    pub fn subscription_state(&self) -> Arc<SubscriptionState> {
        self.subscriptions.load_full()
    }

    /// Registers the subscriber callback, replacing any previous one. The
    /// subscription sets and sequence are untouched.
    pub async fn register_subscriber(&self, subscriber: Arc<dyn BrokerSubscriber>) {
        self.state.lock().await.subscriber = Some(subscriber);
    }

    /// Unregisters the subscriber callback without mutating subscription
    /// state. Subsequent publishes are dropped until a new callback is
    /// registered; subscription mutations fail.
    pub async fn clear_subscriber(&self) {
        self.state.lock().await.subscriber = None;
    }

    /// Adds a publisher-side listener for subscription-change broadcasts.
    /// Adding the same listener again is a no-op.
    pub async fn add_publisher_listener(&self, listener: Arc<dyn PublisherListener>) {
        let mut state = self.state.lock().await;
        if state
            .publisher_listeners
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &listener))
        {
            return;
        }
        state.publisher_listeners.push(listener);
    }

    /// Removes a previously added publisher-side listener.
    pub async fn remove_publisher_listener(&self, listener: &Arc<dyn PublisherListener>) {
        self.state
            .lock()
            .await
            .publisher_listeners
            .retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    /// Subscribes to every published payload regardless of layer/publisher.
    pub async fn subscribe_all(&self) -> Result<(), BrokerError> {
        self.apply_subscription_change(|subscriptions| subscriptions.subscribe_all())
            .await
    }

    pub async fn unsubscribe_all(&self) -> Result<(), BrokerError> {
        self.apply_subscription_change(|subscriptions| subscriptions.unsubscribe_all())
            .await
    }

    /// Subscribes to `layer` from any publisher.
    pub async fn subscribe(&self, layer: Layer) -> Result<(), BrokerError> {
        self.apply_subscription_change(|subscriptions| subscriptions.subscribe(layer))
            .await
    }

    pub async fn unsubscribe(&self, layer: Layer) -> Result<(), BrokerError> {
        self.apply_subscription_change(|subscriptions| subscriptions.unsubscribe(layer))
            .await
    }

    /// Subscribes to `layer` from one specific publisher.
    pub async fn subscribe_to_publisher(
        &self,
        layer: Layer,
        publisher_id: PublisherId,
    ) -> Result<(), BrokerError> {
        self.apply_subscription_change(|subscriptions| {
            subscriptions.subscribe_to_publisher(layer, publisher_id)
        })
        .await
    }

    pub async fn unsubscribe_from_publisher(
        &self,
        layer: Layer,
        publisher_id: PublisherId,
    ) -> Result<(), BrokerError> {
        self.apply_subscription_change(|subscriptions| {
            subscriptions.unsubscribe_from_publisher(layer, publisher_id)
        })
        .await
    }

    /// Routes a published payload to the registered subscriber.
    ///
    /// Delivers at most once, when monitor-all, a plain layer subscription,
    /// or a matching layer+publisher subscription applies. With no registered
    /// subscriber the publish is silently dropped.
    pub async fn publish(&self, layer: Layer, publisher_id: PublisherId, payload: &[u8]) {
        let target = {
            let state = self.state.lock().await;
            if state.subscriptions.matches(layer, publisher_id) {
                state.subscriber.clone()
            } else {
                None
            }
        };

        match target {
            Some(subscriber) => {
                subscriber
                    .on_data(layer, publisher_id, payload.to_vec())
                    .await;
            }
            None => {
                debug!(
                    "{}{} dropping payload for {:?} from publisher {}",
                    VMS_BROKER_TAG, VMS_BROKER_FN_PUBLISH_TAG, layer, publisher_id
                );
            }
        }
    }

    /// Applies one subscription mutation under the lock; on a real change,
    /// stores the new snapshot and fans it out to publisher listeners after
    /// the lock is dropped.
    async fn apply_subscription_change<F>(&self, mutate: F) -> Result<(), BrokerError>
    where
        F: FnOnce(&mut SubscriptionRegistry) -> Option<SubscriptionState>,
    {
        let (snapshot, listeners) = {
            let mut state = self.state.lock().await;
            if state.subscriber.is_none() {
                return Err(BrokerError::NoSubscriberRegistered);
            }
            match mutate(&mut state.subscriptions) {
                Some(snapshot) => {
                    let snapshot = Arc::new(snapshot);
                    self.subscriptions.store(snapshot.clone());
                    (snapshot, state.publisher_listeners.clone())
                }
                None => return Ok(()),
            }
        };

        join_all(
            listeners
                .iter()
                .map(|listener| listener.on_subscription_change(snapshot.clone())),
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::VmsBroker;
    use crate::error::BrokerError;
    use crate::listeners::{BrokerSubscriber, PublisherListener};
    use crate::types::{AvailableLayers, Layer, LayerOffering, PublisherId, SubscriptionState};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn layer(layer_type: i32) -> Layer {
        Layer::new(layer_type, 0, 1)
    }

    #[derive(Default)]
    struct RecordingSubscriber {
        data: Mutex<Vec<(Layer, PublisherId, Vec<u8>)>>,
        availability: Mutex<Vec<Arc<AvailableLayers>>>,
    }

    #[async_trait]
    impl BrokerSubscriber for RecordingSubscriber {
        async fn on_data(&self, layer: Layer, publisher_id: PublisherId, payload: Vec<u8>) {
            self.data
                .lock()
                .unwrap()
                .push((layer, publisher_id, payload));
        }

        async fn on_layers_availability_changed(&self, available: Arc<AvailableLayers>) {
            self.availability.lock().unwrap().push(available);
        }
    }

    #[derive(Default)]
    struct RecordingPublisherListener {
        changes: Mutex<Vec<Arc<SubscriptionState>>>,
    }

    #[async_trait]
    impl PublisherListener for RecordingPublisherListener {
        async fn on_subscription_change(&self, subscriptions: Arc<SubscriptionState>) {
            self.changes.lock().unwrap().push(subscriptions);
        }
    }

    async fn broker_with_subscriber() -> (VmsBroker, Arc<RecordingSubscriber>) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let broker = VmsBroker::new();
        let subscriber = Arc::new(RecordingSubscriber::default());
        broker.register_subscriber(subscriber.clone()).await;
        (broker, subscriber)
    }

    #[tokio::test]
    async fn mutating_subscriptions_without_a_subscriber_fails() {
        let broker = VmsBroker::new();
        assert!(matches!(
            broker.subscribe(layer(1)).await,
            Err(BrokerError::NoSubscriberRegistered)
        ));
        assert!(broker.subscribe_all().await.is_err());
        assert!(broker.subscribe_to_publisher(layer(1), 1).await.is_err());
        // State stays untouched.
        assert_eq!(broker.subscription_state().sequence, 0);
    }

    #[tokio::test]
    async fn publish_reaches_each_kind_of_subscription() {
        for subscribe in ["all", "layer", "layer_and_publisher"] {
            let (broker, subscriber) = broker_with_subscriber().await;
            match subscribe {
                "all" => broker.subscribe_all().await.unwrap(),
                "layer" => broker.subscribe(layer(1)).await.unwrap(),
                _ => broker.subscribe_to_publisher(layer(1), 7).await.unwrap(),
            }

            broker.publish(layer(1), 7, b"payload").await;

            let data = subscriber.data.lock().unwrap();
            assert_eq!(data.len(), 1, "subscription kind: {subscribe}");
            assert_eq!(data[0], (layer(1), 7, b"payload".to_vec()));
        }
    }

    #[tokio::test]
    async fn publish_from_wrong_publisher_is_not_delivered() {
        let (broker, subscriber) = broker_with_subscriber().await;
        broker.subscribe_to_publisher(layer(1), 7).await.unwrap();

        broker.publish(layer(1), 8, b"payload").await;

        assert!(subscriber.data.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlapping_match_rules_deliver_exactly_once() {
        let (broker, subscriber) = broker_with_subscriber().await;
        broker.subscribe_all().await.unwrap();
        broker.subscribe(layer(1)).await.unwrap();
        broker.subscribe_to_publisher(layer(1), 7).await.unwrap();

        broker.publish(layer(1), 7, b"payload").await;

        assert_eq!(subscriber.data.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clearing_the_subscriber_drops_publishes_without_error() {
        let (broker, subscriber) = broker_with_subscriber().await;
        broker.subscribe(layer(1)).await.unwrap();

        broker.clear_subscriber().await;
        broker.publish(layer(1), 7, b"missed").await;

        // Re-registering does not retroactively deliver.
        broker.register_subscriber(subscriber.clone()).await;
        assert!(subscriber.data.lock().unwrap().is_empty());

        broker.publish(layer(1), 7, b"seen").await;
        assert_eq!(subscriber.data.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn registering_a_subscriber_replaces_the_previous_one() {
        let (broker, first) = broker_with_subscriber().await;
        broker.subscribe(layer(1)).await.unwrap();

        let second = Arc::new(RecordingSubscriber::default());
        broker.register_subscriber(second.clone()).await;

        broker.publish(layer(1), 7, b"payload").await;
        assert!(first.data.lock().unwrap().is_empty());
        assert_eq!(second.data.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn offering_broadcasts_availability_to_the_subscriber() {
        let (broker, subscriber) = broker_with_subscriber().await;
        let publisher_id = broker.register_publisher(b"publisher-a").await;

        broker
            .set_layers_offering(publisher_id, vec![LayerOffering::unconditional(layer(1))])
            .await;

        let seen = subscriber.availability.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].sequence, 1);
        assert_eq!(seen[0].associated[0].layer, layer(1));
        assert_eq!(broker.available_layers().sequence, 1);
    }

    #[tokio::test]
    async fn subscription_changes_fan_out_to_publisher_listeners() {
        let (broker, _subscriber) = broker_with_subscriber().await;
        let listener = Arc::new(RecordingPublisherListener::default());
        broker.add_publisher_listener(listener.clone()).await;
        // Re-adding the same listener must not double the fan-out.
        broker.add_publisher_listener(listener.clone()).await;

        broker.subscribe(layer(1)).await.unwrap();
        // No-op mutation: no broadcast.
        broker.subscribe(layer(1)).await.unwrap();
        broker.unsubscribe(layer(1)).await.unwrap();

        let changes = listener.changes.lock().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].sequence, 1);
        assert_eq!(changes[1].sequence, 2);
    }

    #[tokio::test]
    async fn removed_publisher_listener_stops_receiving_changes() {
        let (broker, _subscriber) = broker_with_subscriber().await;
        let listener = Arc::new(RecordingPublisherListener::default());
        let as_trait: Arc<dyn PublisherListener> = listener.clone();
        broker.add_publisher_listener(as_trait.clone()).await;
        broker.remove_publisher_listener(&as_trait).await;

        broker.subscribe(layer(1)).await.unwrap();
        assert!(listener.changes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshots_are_visible_when_the_mutating_call_returns() {
        let (broker, _subscriber) = broker_with_subscriber().await;
        broker.subscribe(layer(1)).await.unwrap();
        assert_eq!(broker.subscription_state().sequence, 1);

        let publisher_id = broker.register_publisher(b"publisher-a").await;
        broker
            .set_layers_offering(publisher_id, vec![LayerOffering::unconditional(layer(1))])
            .await;
        assert_eq!(broker.available_layers().sequence, 1);
    }

    #[tokio::test]
    async fn publisher_identity_round_trip() {
        let broker = VmsBroker::new();
        let first = broker.register_publisher(b"publisher-a").await;
        let second = broker.register_publisher(b"publisher-b").await;
        assert_eq!(broker.register_publisher(b"publisher-a").await, first);
        assert_ne!(first, second);
        assert_eq!(broker.publisher_info(first).await, b"publisher-a".to_vec());
        assert!(broker.publisher_info(99).await.is_empty());
    }
}
