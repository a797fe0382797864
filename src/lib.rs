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

//! # vms-broker
//!
//! `vms-broker` is a publish/subscribe broker core for versioned map-data
//! layers. Publishers declare which layers they can provide and under which
//! dependency alternatives; the broker resolves the transitive closure of
//! actually-available layers, tracks the union of subscriber interest, and
//! routes published payloads to the registered subscriber callback.
//!
//! Typical usage is API-first and remains centered on [`VmsBroker`]. The
//! [`bridge`] module adds an optional peer session that speaks the typed
//! int32-vector frame protocol over a [`bridge::BridgeTransport`].
//!
//! ## Quick start
//!
//! ```
//! use std::collections::BTreeSet;
//! use vms_broker::{Layer, LayerOffering, VmsBroker};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let broker = VmsBroker::new();
//! let publisher_id = broker.register_publisher(b"map-provider").await;
//!
//! // Traffic depends on road geometry; only the satisfied closure is
//! // reported as available.
//! let road_geometry = Layer::new(1, 0, 1);
//! let traffic = Layer::new(2, 0, 1);
//! broker
//!     .set_layers_offering(
//!         publisher_id,
//!         vec![
//!             LayerOffering::unconditional(road_geometry),
//!             LayerOffering::with_dependencies(traffic, BTreeSet::from([road_geometry])),
//!         ],
//!     )
//!     .await;
//!
//! let available = broker.available_layers();
//! assert_eq!(available.sequence, 1);
//! assert_eq!(available.associated.len(), 2);
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: [`VmsBroker`] owns all mutable state behind one lock and
//!   invokes callbacks only after releasing it
//! - Registries: publisher identity, offering store with availability
//!   resolution, and the subscription union
//! - Bridge: frame codec, session handshake, and the outbound forwarding loop
//!
//! ## Observability model
//!
//! The crate uses `tracing` for logs/events. Library code emits events and
//! does not unconditionally initialize a global subscriber; embedding
//! processes and tests are responsible for one-time `tracing_subscriber`
//! initialization at process boundaries.

pub mod bridge;

mod broker;
pub use broker::VmsBroker;

mod error;
pub use error::BrokerError;

mod listeners;
pub use listeners::{BrokerSubscriber, PublisherListener};

mod registry;

mod types;
pub use types::{
    AssociatedLayer, AvailableLayers, Layer, LayerOffering, PublisherId, SubscriptionState,
};
