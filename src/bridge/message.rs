//! Frame codec for the peer bridge.
//!
//! A frame is an integer vector whose first element is the message type,
//! plus an opaque byte payload. Layer identifiers flatten to three integers;
//! variable-length sections are length-prefixed.

use crate::types::{
    AssociatedLayer, AvailableLayers, Layer, LayerOffering, PublisherId, SubscriptionState,
};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Message type codes shared with the peer.
pub mod message_type {
    pub const SUBSCRIBE: i32 = 1;
    pub const UNSUBSCRIBE: i32 = 2;
    pub const SUBSCRIBE_TO_PUBLISHER: i32 = 3;
    pub const UNSUBSCRIBE_FROM_PUBLISHER: i32 = 4;
    pub const OFFERING: i32 = 5;
    pub const AVAILABILITY_REQUEST: i32 = 6;
    pub const AVAILABILITY_RESPONSE: i32 = 7;
    pub const AVAILABILITY_CHANGE: i32 = 8;
    pub const SUBSCRIPTIONS_REQUEST: i32 = 9;
    pub const SUBSCRIPTIONS_RESPONSE: i32 = 10;
    pub const SUBSCRIPTIONS_CHANGE: i32 = 11;
    pub const DATA: i32 = 12;
    pub const PUBLISHER_ID_REQUEST: i32 = 13;
    pub const PUBLISHER_ID_RESPONSE: i32 = 14;
    pub const PUBLISHER_INFORMATION_REQUEST: i32 = 15;
    pub const PUBLISHER_INFORMATION_RESPONSE: i32 = 16;
    pub const START_SESSION: i32 = 17;
}

/// One discrete message as carried by the physical transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub int32_values: Vec<i32>,
    pub bytes: Vec<u8>,
}

/// Frame parsing failures. A malformed frame is logged and dropped by the
/// session; it is never fatal.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The integer vector was empty, so no message type is present.
    EmptyFrame,
    /// The message type code is not one the bridge understands.
    UnknownMessageType(i32),
    /// The integer vector ended before the message layout was complete.
    Truncated { message_type: i32 },
    /// A length prefix was negative.
    InvalidCount { message_type: i32, count: i32 },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::EmptyFrame => write!(f, "frame carries no message type"),
            DecodeError::UnknownMessageType(message_type) => {
                write!(f, "unknown message type: {message_type}")
            }
            DecodeError::Truncated { message_type } => {
                write!(f, "truncated frame for message type {message_type}")
            }
            DecodeError::InvalidCount {
                message_type,
                count,
            } => {
                write!(
                    f,
                    "negative count {count} in frame for message type {message_type}"
                )
            }
        }
    }
}

impl Error for DecodeError {}

/// Typed view of every frame the bridge exchanges with the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeMessage {
    StartSession {
        service_id: i32,
        client_id: i32,
    },
    Subscribe {
        layer: Layer,
    },
    Unsubscribe {
        layer: Layer,
    },
    SubscribeToPublisher {
        layer: Layer,
        publisher_id: PublisherId,
    },
    UnsubscribeFromPublisher {
        layer: Layer,
        publisher_id: PublisherId,
    },
    /// One dependency list per declared layer; a layer declared repeatedly
    /// with different lists expresses alternatives.
    Offering {
        publisher_id: PublisherId,
        entries: Vec<LayerOffering>,
    },
    AvailabilityRequest,
    AvailabilityResponse {
        available: AvailableLayers,
    },
    AvailabilityChange {
        available: AvailableLayers,
    },
    SubscriptionsRequest,
    SubscriptionsResponse {
        subscriptions: SubscriptionState,
    },
    SubscriptionsChange {
        subscriptions: SubscriptionState,
    },
    Data {
        layer: Layer,
        publisher_id: PublisherId,
        payload: Vec<u8>,
    },
    PublisherIdRequest {
        info: Vec<u8>,
    },
    PublisherIdResponse {
        publisher_id: PublisherId,
    },
    PublisherInfoRequest {
        publisher_id: PublisherId,
    },
    PublisherInfoResponse {
        info: Vec<u8>,
    },
}

impl BridgeMessage {
    pub fn message_type(&self) -> i32 {
        match self {
            BridgeMessage::StartSession { .. } => message_type::START_SESSION,
            BridgeMessage::Subscribe { .. } => message_type::SUBSCRIBE,
            BridgeMessage::Unsubscribe { .. } => message_type::UNSUBSCRIBE,
            BridgeMessage::SubscribeToPublisher { .. } => message_type::SUBSCRIBE_TO_PUBLISHER,
            BridgeMessage::UnsubscribeFromPublisher { .. } => {
                message_type::UNSUBSCRIBE_FROM_PUBLISHER
            }
            BridgeMessage::Offering { .. } => message_type::OFFERING,
            BridgeMessage::AvailabilityRequest => message_type::AVAILABILITY_REQUEST,
            BridgeMessage::AvailabilityResponse { .. } => message_type::AVAILABILITY_RESPONSE,
            BridgeMessage::AvailabilityChange { .. } => message_type::AVAILABILITY_CHANGE,
            BridgeMessage::SubscriptionsRequest => message_type::SUBSCRIPTIONS_REQUEST,
            BridgeMessage::SubscriptionsResponse { .. } => message_type::SUBSCRIPTIONS_RESPONSE,
            BridgeMessage::SubscriptionsChange { .. } => message_type::SUBSCRIPTIONS_CHANGE,
            BridgeMessage::Data { .. } => message_type::DATA,
            BridgeMessage::PublisherIdRequest { .. } => message_type::PUBLISHER_ID_REQUEST,
            BridgeMessage::PublisherIdResponse { .. } => message_type::PUBLISHER_ID_RESPONSE,
            BridgeMessage::PublisherInfoRequest { .. } => {
                message_type::PUBLISHER_INFORMATION_REQUEST
            }
            BridgeMessage::PublisherInfoResponse { .. } => {
                message_type::PUBLISHER_INFORMATION_RESPONSE
            }
        }
    }

    pub fn encode(&self) -> Frame {
        let mut frame = Frame {
            int32_values: vec![self.message_type()],
            bytes: Vec::new(),
        };
        let values = &mut frame.int32_values;

        match self {
            BridgeMessage::StartSession {
                service_id,
                client_id,
            } => {
                values.push(*service_id);
                values.push(*client_id);
            }
            BridgeMessage::Subscribe { layer } | BridgeMessage::Unsubscribe { layer } => {
                push_layer(values, *layer);
            }
            BridgeMessage::SubscribeToPublisher {
                layer,
                publisher_id,
            }
            | BridgeMessage::UnsubscribeFromPublisher {
                layer,
                publisher_id,
            } => {
                push_layer(values, *layer);
                values.push(*publisher_id);
            }
            BridgeMessage::Offering {
                publisher_id,
                entries,
            } => {
                values.push(*publisher_id);
                // Each alternative flattens back to its own wire entry.
                let flattened: Vec<(Layer, BTreeSet<Layer>)> = entries
                    .iter()
                    .flat_map(|entry| {
                        if entry.alternatives.is_empty() {
                            vec![(entry.layer, BTreeSet::new())]
                        } else {
                            entry
                                .alternatives
                                .iter()
                                .map(|deps| (entry.layer, deps.clone()))
                                .collect()
                        }
                    })
                    .collect();
                values.push(flattened.len() as i32);
                for (layer, dependencies) in flattened {
                    push_layer(values, layer);
                    values.push(dependencies.len() as i32);
                    for dependency in dependencies {
                        push_layer(values, dependency);
                    }
                }
            }
            BridgeMessage::AvailabilityRequest | BridgeMessage::SubscriptionsRequest => {}
            BridgeMessage::AvailabilityResponse { available }
            | BridgeMessage::AvailabilityChange { available } => {
                values.push(available.sequence);
                values.push(available.associated.len() as i32);
                for associated in &available.associated {
                    push_associated_layer(values, associated);
                }
            }
            BridgeMessage::SubscriptionsResponse { subscriptions }
            | BridgeMessage::SubscriptionsChange { subscriptions } => {
                values.push(subscriptions.sequence);
                values.push(subscriptions.layers.len() as i32);
                values.push(subscriptions.associated_layers.len() as i32);
                for layer in &subscriptions.layers {
                    push_layer(values, *layer);
                }
                for associated in &subscriptions.associated_layers {
                    push_associated_layer(values, associated);
                }
            }
            BridgeMessage::Data {
                layer,
                publisher_id,
                payload,
            } => {
                push_layer(values, *layer);
                values.push(*publisher_id);
                frame.bytes = payload.clone();
            }
            BridgeMessage::PublisherIdRequest { info } => {
                frame.bytes = info.clone();
            }
            BridgeMessage::PublisherIdResponse { publisher_id } => {
                values.push(*publisher_id);
            }
            BridgeMessage::PublisherInfoRequest { publisher_id } => {
                values.push(*publisher_id);
            }
            BridgeMessage::PublisherInfoResponse { info } => {
                frame.bytes = info.clone();
            }
        }

        frame
    }

    pub fn decode(frame: &Frame) -> Result<Self, DecodeError> {
        let (&message_type, rest) = frame
            .int32_values
            .split_first()
            .ok_or(DecodeError::EmptyFrame)?;
        let mut reader = Reader {
            values: rest,
            pos: 0,
            message_type,
        };

        let message = match message_type {
            message_type::START_SESSION => BridgeMessage::StartSession {
                service_id: reader.next()?,
                client_id: reader.next()?,
            },
            message_type::SUBSCRIBE => BridgeMessage::Subscribe {
                layer: reader.read_layer()?,
            },
            message_type::UNSUBSCRIBE => BridgeMessage::Unsubscribe {
                layer: reader.read_layer()?,
            },
            message_type::SUBSCRIBE_TO_PUBLISHER => BridgeMessage::SubscribeToPublisher {
                layer: reader.read_layer()?,
                publisher_id: reader.next()?,
            },
            message_type::UNSUBSCRIBE_FROM_PUBLISHER => BridgeMessage::UnsubscribeFromPublisher {
                layer: reader.read_layer()?,
                publisher_id: reader.next()?,
            },
            message_type::OFFERING => {
                let publisher_id = reader.next()?;
                let entry_count = reader.read_count()?;
                let mut entries = Vec::with_capacity(entry_count);
                for _ in 0..entry_count {
                    let layer = reader.read_layer()?;
                    let dependency_count = reader.read_count()?;
                    if dependency_count == 0 {
                        entries.push(LayerOffering::unconditional(layer));
                    } else {
                        let mut dependencies = BTreeSet::new();
                        for _ in 0..dependency_count {
                            dependencies.insert(reader.read_layer()?);
                        }
                        entries.push(LayerOffering::with_dependencies(layer, dependencies));
                    }
                }
                BridgeMessage::Offering {
                    publisher_id,
                    entries,
                }
            }
            message_type::AVAILABILITY_REQUEST => BridgeMessage::AvailabilityRequest,
            message_type::AVAILABILITY_RESPONSE => BridgeMessage::AvailabilityResponse {
                available: reader.read_available_layers()?,
            },
            message_type::AVAILABILITY_CHANGE => BridgeMessage::AvailabilityChange {
                available: reader.read_available_layers()?,
            },
            message_type::SUBSCRIPTIONS_REQUEST => BridgeMessage::SubscriptionsRequest,
            message_type::SUBSCRIPTIONS_RESPONSE => BridgeMessage::SubscriptionsResponse {
                subscriptions: reader.read_subscription_state()?,
            },
            message_type::SUBSCRIPTIONS_CHANGE => BridgeMessage::SubscriptionsChange {
                subscriptions: reader.read_subscription_state()?,
            },
            message_type::DATA => BridgeMessage::Data {
                layer: reader.read_layer()?,
                publisher_id: reader.next()?,
                payload: frame.bytes.clone(),
            },
            message_type::PUBLISHER_ID_REQUEST => BridgeMessage::PublisherIdRequest {
                info: frame.bytes.clone(),
            },
            message_type::PUBLISHER_ID_RESPONSE => BridgeMessage::PublisherIdResponse {
                publisher_id: reader.next()?,
            },
            message_type::PUBLISHER_INFORMATION_REQUEST => BridgeMessage::PublisherInfoRequest {
                publisher_id: reader.next()?,
            },
            message_type::PUBLISHER_INFORMATION_RESPONSE => BridgeMessage::PublisherInfoResponse {
                info: frame.bytes.clone(),
            },
            unknown => return Err(DecodeError::UnknownMessageType(unknown)),
        };

        Ok(message)
    }
}

fn push_layer(values: &mut Vec<i32>, layer: Layer) {
    values.push(layer.layer_type);
    values.push(layer.subtype);
    values.push(layer.version);
}

fn push_associated_layer(values: &mut Vec<i32>, associated: &AssociatedLayer) {
    push_layer(values, associated.layer);
    values.push(associated.publishers.len() as i32);
    values.extend(associated.publishers.iter().copied());
}

struct Reader<'a> {
    values: &'a [i32],
    pos: usize,
    message_type: i32,
}

impl Reader<'_> {
    fn next(&mut self) -> Result<i32, DecodeError> {
        let value = self.values.get(self.pos).copied().ok_or(DecodeError::Truncated {
            message_type: self.message_type,
        })?;
        self.pos += 1;
        Ok(value)
    }

    fn read_count(&mut self) -> Result<usize, DecodeError> {
        let count = self.next()?;
        let count = usize::try_from(count).map_err(|_| DecodeError::InvalidCount {
            message_type: self.message_type,
            count,
        })?;
        // Every counted element occupies at least one integer, so a count
        // larger than what remains can never parse. Rejecting it here keeps
        // the element vectors from pre-allocating on a wire-supplied length.
        if count > self.values.len() - self.pos {
            return Err(DecodeError::Truncated {
                message_type: self.message_type,
            });
        }
        Ok(count)
    }

    fn read_layer(&mut self) -> Result<Layer, DecodeError> {
        Ok(Layer::new(self.next()?, self.next()?, self.next()?))
    }

    fn read_associated_layer(&mut self) -> Result<AssociatedLayer, DecodeError> {
        let layer = self.read_layer()?;
        let publisher_count = self.read_count()?;
        let mut publishers = BTreeSet::new();
        for _ in 0..publisher_count {
            publishers.insert(self.next()?);
        }
        Ok(AssociatedLayer::new(layer, publishers))
    }

    fn read_available_layers(&mut self) -> Result<AvailableLayers, DecodeError> {
        let sequence = self.next()?;
        let associated_count = self.read_count()?;
        let mut associated = Vec::with_capacity(associated_count);
        for _ in 0..associated_count {
            associated.push(self.read_associated_layer()?);
        }
        Ok(AvailableLayers {
            sequence,
            associated,
        })
    }

    fn read_subscription_state(&mut self) -> Result<SubscriptionState, DecodeError> {
        let sequence = self.next()?;
        let layer_count = self.read_count()?;
        let associated_count = self.read_count()?;
        let mut layers = BTreeSet::new();
        for _ in 0..layer_count {
            layers.insert(self.read_layer()?);
        }
        let mut associated_layers = Vec::with_capacity(associated_count);
        for _ in 0..associated_count {
            associated_layers.push(self.read_associated_layer()?);
        }
        // The monitor-all flag never crosses the wire; peers only see the
        // explicit subscription sets.
        Ok(SubscriptionState {
            sequence,
            monitor_all: false,
            layers,
            associated_layers,
        })
    }
}
