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

//! Transport-bridge layer.
//!
//! Exchanges discrete typed frames with one peer process over a shared
//! property/channel. The bridge owns the frame codec, the session handshake,
//! out-of-order snapshot suppression, and the outbound forwarding loop; the
//! physical transport that carries frames is injected behind
//! [`BridgeTransport`].
//!
//! A session becomes live once `START_SESSION` has been exchanged; until
//! then every other inbound frame is dropped. After the handshake the
//! session registers itself with the broker on both sides, so subscription
//! and availability changes push `SUBSCRIPTIONS_CHANGE` /
//! `AVAILABILITY_CHANGE` frames and routed payloads push `DATA` frames.

pub(crate) mod message;
pub(crate) mod session;
pub(crate) mod transport;

pub use message::{message_type, BridgeMessage, DecodeError, Frame};
pub use session::BridgeSession;
pub use transport::{BridgeTransport, TransportError};
