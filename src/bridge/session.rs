//! Peer session lifecycle, inbound dispatch, and outbound forwarding.

use crate::bridge::message::{BridgeMessage, Frame};
use crate::bridge::transport::BridgeTransport;
use crate::broker::VmsBroker;
use crate::listeners::{BrokerSubscriber, PublisherListener};
use crate::types::{AvailableLayers, Layer, PublisherId, SubscriptionState};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

const SESSION_TAG: &str = "BridgeSession:";
const SESSION_FN_HANDLE_FRAME_TAG: &str = "handle_frame():";
const SESSION_FN_START_SESSION_TAG: &str = "handle_start_session():";

const UNKNOWN_CLIENT_ID: i32 = -1;

struct SessionState {
    connected: bool,
    client_id: i32,
    /// Highest subscription sequence forwarded to the peer; -1 before any.
    subscription_sequence: i32,
    /// Highest availability sequence forwarded to the peer; -1 before any.
    availability_sequence: i32,
}

/// One session with the peer process.
///
/// Owns the handshake state, suppresses out-of-order snapshot broadcasts,
/// and drains outbound frames through a bounded queue so a slow transport
/// cannot stall broker mutators. Once the handshake completes the session
/// registers itself with the broker as both the subscriber callback and a
/// publisher listener.
pub struct BridgeSession {
    service_id: i32,
    broker: Arc<VmsBroker>,
    outbound: mpsc::Sender<BridgeMessage>,
    state: Mutex<SessionState>,
}

impl BridgeSession {
    /// Creates the session and spawns its outbound forwarding loop.
    pub fn new(
        broker: Arc<VmsBroker>,
        transport: Arc<dyn BridgeTransport>,
        service_id: i32,
        queue_size: usize,
    ) -> Arc<Self> {
        let (outbound, receiver) = mpsc::channel(queue_size);
        tokio::spawn(Self::outbound_loop(transport, receiver));
        Arc::new(Self {
            service_id,
            broker,
            outbound,
            state: Mutex::new(SessionState {
                connected: false,
                client_id: UNKNOWN_CLIENT_ID,
                subscription_sequence: -1,
                availability_sequence: -1,
            }),
        })
    }

    /// Initiates the handshake by announcing our service id to the peer.
    pub async fn connect(&self) {
        self.enqueue(BridgeMessage::StartSession {
            service_id: self.service_id,
            client_id: UNKNOWN_CLIENT_ID,
        });
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    /// Entry point for inbound frames from the transport owner. Malformed
    /// frames are logged and dropped; they never poison the session.
    pub async fn handle_frame(self: &Arc<Self>, frame: &Frame) {
        match BridgeMessage::decode(frame) {
            Ok(message) => self.handle_message(message).await,
            Err(err) => {
                warn!(
                    "{}{} dropping malformed frame: {}",
                    SESSION_TAG, SESSION_FN_HANDLE_FRAME_TAG, err
                );
            }
        }
    }

    /// Dispatches one decoded inbound message. Anything other than
    /// `START_SESSION` is dropped until the handshake has completed.
    pub async fn handle_message(self: &Arc<Self>, message: BridgeMessage) {
        if let BridgeMessage::StartSession {
            service_id,
            client_id,
        } = message
        {
            self.handle_start_session(service_id, client_id).await;
            return;
        }

        {
            let state = self.state.lock().await;
            if !state.connected {
                warn!(
                    "{}{} dropping message type {} before session start",
                    SESSION_TAG,
                    SESSION_FN_HANDLE_FRAME_TAG,
                    message.message_type()
                );
                return;
            }
        }

        match message {
            BridgeMessage::Subscribe { layer } => {
                self.apply_subscription(self.broker.subscribe(layer).await, "subscribe");
            }
            BridgeMessage::Unsubscribe { layer } => {
                self.apply_subscription(self.broker.unsubscribe(layer).await, "unsubscribe");
            }
            BridgeMessage::SubscribeToPublisher {
                layer,
                publisher_id,
            } => {
                self.apply_subscription(
                    self.broker.subscribe_to_publisher(layer, publisher_id).await,
                    "subscribe_to_publisher",
                );
            }
            BridgeMessage::UnsubscribeFromPublisher {
                layer,
                publisher_id,
            } => {
                self.apply_subscription(
                    self.broker
                        .unsubscribe_from_publisher(layer, publisher_id)
                        .await,
                    "unsubscribe_from_publisher",
                );
            }
            BridgeMessage::Offering {
                publisher_id,
                entries,
            } => {
                self.broker.set_layers_offering(publisher_id, entries).await;
            }
            BridgeMessage::Data {
                layer,
                publisher_id,
                payload,
            } => {
                self.broker.publish(layer, publisher_id, &payload).await;
            }
            BridgeMessage::AvailabilityRequest => {
                self.enqueue(BridgeMessage::AvailabilityResponse {
                    available: (*self.broker.available_layers()).clone(),
                });
            }
            BridgeMessage::SubscriptionsRequest => {
                self.enqueue(BridgeMessage::SubscriptionsResponse {
                    subscriptions: (*self.broker.subscription_state()).clone(),
                });
            }
            BridgeMessage::PublisherIdRequest { info } => {
                let publisher_id = self.broker.register_publisher(&info).await;
                self.enqueue(BridgeMessage::PublisherIdResponse { publisher_id });
            }
            BridgeMessage::PublisherInfoRequest { publisher_id } => {
                let info = self.broker.publisher_info(publisher_id).await;
                self.enqueue(BridgeMessage::PublisherInfoResponse { info });
            }
            other => {
                // Responses and change pushes originate on this side only.
                warn!(
                    "{}{} unexpected inbound message type {}",
                    SESSION_TAG,
                    SESSION_FN_HANDLE_FRAME_TAG,
                    other.message_type()
                );
            }
        }
    }

    async fn handle_start_session(self: &Arc<Self>, peer_service_id: i32, client_id: i32) {
        let acknowledge = {
            let mut state = self.state.lock().await;
            state.connected = true;
            state.client_id = client_id;
            if peer_service_id == self.service_id {
                // The peer acknowledged the handshake we initiated.
                debug!(
                    "{}{} session established with client {}",
                    SESSION_TAG, SESSION_FN_START_SESSION_TAG, client_id
                );
                false
            } else {
                // The peer started a new session: forget everything we
                // believe it has seen and acknowledge with our service id.
                debug!(
                    "{}{} peer-initiated session from service {}, client {}",
                    SESSION_TAG, SESSION_FN_START_SESSION_TAG, peer_service_id, client_id
                );
                state.subscription_sequence = -1;
                state.availability_sequence = -1;
                true
            }
        };

        if acknowledge {
            self.enqueue(BridgeMessage::StartSession {
                service_id: self.service_id,
                client_id,
            });
        }

        // Attach to the broker on both sides; both calls are idempotent for
        // a repeated handshake from the same peer.
        let subscriber: Arc<dyn BrokerSubscriber> = self.clone();
        self.broker.register_subscriber(subscriber).await;
        let listener: Arc<dyn PublisherListener> = self.clone();
        self.broker.add_publisher_listener(listener).await;

        // Announce current availability so the peer can initialize its
        // clients without issuing a request.
        self.on_layers_availability_changed(self.broker.available_layers())
            .await;
    }

    fn apply_subscription(&self, result: Result<(), crate::error::BrokerError>, action: &str) {
        if let Err(err) = result {
            warn!(
                "{}{} {} failed: {}",
                SESSION_TAG, SESSION_FN_HANDLE_FRAME_TAG, action, err
            );
        }
    }

    fn enqueue(&self, message: BridgeMessage) {
        let message_type = message.message_type();
        if let Err(err) = self.outbound.try_send(message) {
            warn!(
                "{} dropping outbound message type {}: {}",
                SESSION_TAG, message_type, err
            );
        }
    }

    async fn outbound_loop(
        transport: Arc<dyn BridgeTransport>,
        mut receiver: mpsc::Receiver<BridgeMessage>,
    ) {
        while let Some(message) = receiver.recv().await {
            let message_type = message.message_type();
            if let Err(err) = transport.send(message.encode()).await {
                warn!(
                    "{} sending message type {} failed: {}",
                    SESSION_TAG, message_type, err
                );
            } else {
                debug!("{} sent message type {}", SESSION_TAG, message_type);
            }
        }
        debug!("{} outbound queue closed, forwarding loop ending", SESSION_TAG);
    }
}

#[async_trait]
impl BrokerSubscriber for BridgeSession {
    async fn on_data(&self, layer: Layer, publisher_id: PublisherId, payload: Vec<u8>) {
        self.enqueue(BridgeMessage::Data {
            layer,
            publisher_id,
            payload,
        });
    }

    async fn on_layers_availability_changed(&self, available: Arc<AvailableLayers>) {
        {
            let mut state = self.state.lock().await;
            if available.sequence <= state.availability_sequence {
                warn!(
                    "{} out of order availability: {} (expecting {})",
                    SESSION_TAG,
                    available.sequence,
                    state.availability_sequence + 1
                );
                return;
            }
            state.availability_sequence = available.sequence;
        }
        self.enqueue(BridgeMessage::AvailabilityChange {
            available: (*available).clone(),
        });
    }
}

#[async_trait]
impl PublisherListener for BridgeSession {
    async fn on_subscription_change(&self, subscriptions: Arc<SubscriptionState>) {
        {
            let mut state = self.state.lock().await;
            if subscriptions.sequence <= state.subscription_sequence {
                warn!(
                    "{} out of order subscription state: {} (expecting {})",
                    SESSION_TAG,
                    subscriptions.sequence,
                    state.subscription_sequence + 1
                );
                return;
            }
            state.subscription_sequence = subscriptions.sequence;
        }
        self.enqueue(BridgeMessage::SubscriptionsChange {
            subscriptions: (*subscriptions).clone(),
        });
    }
}
