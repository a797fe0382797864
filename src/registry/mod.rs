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

//! Registry layer.
//!
//! Owns the three mutable registries behind the broker facade: the
//! identity-blob to publisher-id bijection, the per-publisher offering store
//! with its availability fixed-point resolver, and the subscription registry
//! with change-diffed sequencing. None of these types lock; the facade
//! serializes access to all of them under one mutex so that sequence
//! assignment always observes a consistent view.

pub(crate) mod offerings;
pub(crate) mod publishers;
pub(crate) mod subscriptions;
