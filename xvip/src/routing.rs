// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Routing tables.
//!
//! A route connects one stream on a sink pad to one stream on a source pad
//! of the same entity. Entities that model routing keep a [`RoutingTable`];
//! the table is validated against the entity's [`RoutingRestriction`] with
//! [`validate`] before it replaces the current one.

mod validate;

use std::{fmt, ops};

use serde::{Deserialize, Serialize};

use crate::{graph::PadKind, stream::StreamMask};

pub use validate::validate;

/// Maximum number of routes in one table.
pub const MAX_ROUTES: usize = 64;

/// A sink pad/stream to source pad/stream association inside an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub sink_pad: u32,
    pub sink_stream: u32,
    pub source_pad: u32,
    pub source_stream: u32,
    /// Inactive routes stay in the table but carry no data.
    #[serde(default = "active_default")]
    pub active: bool,
}

fn active_default() -> bool {
    true
}

impl Route {
    /// Creates an active route.
    pub const fn new(sink_pad: u32, sink_stream: u32, source_pad: u32, source_stream: u32) -> Self {
        Self {
            sink_pad,
            sink_stream,
            source_pad,
            source_stream,
            active: true,
        }
    }

    /// Returns the same route marked inactive.
    pub const fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} -> {}/{}{}",
            self.sink_pad,
            self.sink_stream,
            self.source_pad,
            self.source_stream,
            if self.active { "" } else { " (inactive)" }
        )
    }
}

/// Routing shapes an entity refuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingRestriction(u32);

impl RoutingRestriction {
    pub const NONE: RoutingRestriction = RoutingRestriction(0);
    /// A sink stream may be routed to a single source stream only.
    pub const NO_1_TO_N: RoutingRestriction = RoutingRestriction(1 << 0);
    /// A source stream may be fed from a single sink stream only.
    pub const NO_N_TO_1: RoutingRestriction = RoutingRestriction(1 << 1);
    /// Routes may not change the stream id.
    pub const NO_STREAM_MIX: RoutingRestriction = RoutingRestriction(1 << 2);
    pub const ONLY_1_TO_1: RoutingRestriction = Self::NO_1_TO_N.union(Self::NO_N_TO_1);

    pub const fn union(self, other: RoutingRestriction) -> RoutingRestriction {
        RoutingRestriction(self.0 | other.0)
    }

    pub const fn contains(self, other: RoutingRestriction) -> bool {
        self.0 & other.0 == other.0
    }
}

impl ops::BitOr for RoutingRestriction {
    type Output = RoutingRestriction;
    fn bitor(self, rhs: RoutingRestriction) -> RoutingRestriction {
        self.union(rhs)
    }
}

/// The routing table of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    /// Wraps routes without validating them.
    pub(crate) fn from_routes(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Builds the default table for an entity with the given pads.
    ///
    /// Sinks and sources are paired by index, lowest first: the `i`th sink
    /// pad is routed to the `i`th source pad on stream 0, for as many pairs
    /// as the smaller side has pads.
    pub fn default_for(pads: &[PadKind]) -> Self {
        let sinks = pads.iter().enumerate().filter(|(_, k)| **k == PadKind::Sink);
        let sources = pads.iter().enumerate().filter(|(_, k)| **k == PadKind::Source);
        let routes = sinks
            .zip(sources)
            .map(|((sink, _), (source, _))| Route::new(sink as u32, 0, source as u32, 0))
            .collect();
        Self { routes }
    }

    /// All routes, including inactive ones.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Iterates over the active routes.
    pub fn active(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|route| route.active)
    }

    /// Returns the pad/stream at the other end of the active route touching
    /// `(pad, stream)`, if there is exactly one such route.
    ///
    /// Meaningful for 1:1 tables; with fan-out or fan-in the first match is
    /// ambiguous, so `None` is returned.
    pub fn find_opposite(&self, pad: u32, stream: u32) -> Option<(u32, u32)> {
        let mut matches = self.active().filter_map(|route| {
            if route.sink_pad == pad && route.sink_stream == stream {
                Some((route.source_pad, route.source_stream))
            } else if route.source_pad == pad && route.source_stream == stream {
                Some((route.sink_pad, route.sink_stream))
            } else {
                None
            }
        });
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    /// Returns the streams carried by active routes on `pad`.
    pub fn streams_on(&self, pad: u32) -> StreamMask {
        self.active()
            .flat_map(|route| {
                let sink = (route.sink_pad == pad).then_some(route.sink_stream);
                let source = (route.source_pad == pad).then_some(route.source_stream);
                sink.into_iter().chain(source)
            })
            .collect()
    }

    /// Returns every `(pad, stream)` pair touched by an active route.
    pub fn endpoints(&self) -> Vec<(u32, u32)> {
        let mut endpoints: Vec<_> = self
            .active()
            .flat_map(|route| {
                [
                    (route.sink_pad, route.sink_stream),
                    (route.source_pad, route.source_stream),
                ]
            })
            .collect();
        endpoints.sort_unstable();
        endpoints.dedup();
        endpoints
    }
}
