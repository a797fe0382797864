//! Callback seams between the broker and its publisher/subscriber sides.

use crate::types::{AvailableLayers, Layer, PublisherId, SubscriptionState};
use async_trait::async_trait;
use std::sync::Arc;

/// The subscriber side's handle: receives routed payloads and availability
/// snapshots.
///
/// The broker holds at most one registered subscriber at a time
/// (replace-on-register). Callbacks are invoked outside the broker's state
/// lock, so implementations may block or call back into the broker.
#[async_trait]
pub trait BrokerSubscriber: Send + Sync {
    /// A published payload matched the current subscription interest.
    async fn on_data(&self, layer: Layer, publisher_id: PublisherId, payload: Vec<u8>);

    /// The set of available layers changed.
    async fn on_layers_availability_changed(&self, available: Arc<AvailableLayers>);
}

/// The publisher side's handle: receives subscription-state snapshots so it
/// can decide what to (re)publish.
#[async_trait]
pub trait PublisherListener: Send + Sync {
    /// The subscription interest changed.
    async fn on_subscription_change(&self, subscriptions: Arc<SubscriptionState>);
}
