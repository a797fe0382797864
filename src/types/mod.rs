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

//! Value-type layer.
//!
//! Owns the immutable data model shared between the registries and the
//! transport bridge: layer identifiers, per-publisher offerings with their
//! dependency alternatives, and the two sequenced snapshot types that the
//! broker broadcasts.

mod layer;
mod snapshot;

pub use layer::{Layer, LayerOffering, PublisherId};
pub use snapshot::{AssociatedLayer, AvailableLayers, SubscriptionState};
