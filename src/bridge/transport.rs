//! Physical transport seam for the peer bridge.

use crate::bridge::message::Frame;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Failure to hand a frame to the underlying channel.
///
/// Delivery is fire-and-forget; the session logs a send failure and moves
/// on, so this error never propagates past the outbound loop.
#[derive(Debug)]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "transport send failed: {}", self.message)
    }
}

impl Error for TransportError {}

/// The channel that physically carries frames to the peer process.
///
/// Implementations wrap whatever actually moves the bytes (a vehicle
/// property, a socket, an in-process queue in tests). The bridge only ever
/// sends; inbound frames are delivered by the transport owner calling
/// [`crate::bridge::BridgeSession::handle_frame`].
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;
}
