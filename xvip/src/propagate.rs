// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Stream propagation across links.

use std::collections::HashMap;

use tracing::{debug, error};

use crate::{
    Error, Result,
    config::PipelineConfig,
    graph::{EntityId, MediaGraph, PadKind},
    routing::RoutingTable,
    stream::StreamMask,
    subdev::Subdev,
};

/// What propagation needs to reach the neighbours of a subdevice.
pub(crate) struct StreamContext<'a> {
    pub graph: &'a MediaGraph,
    pub subdevs: &'a HashMap<EntityId, Subdev>,
    pub config: &'a PipelineConfig,
}

/// Collects, per local pad, the streams on the other side of `subdev` that
/// `streams` on `pad` flow to or from.
///
/// With a routing table the active routes decide. Legacy blocks forward
/// the whole mask to every pad of opposite polarity.
fn collect_streams(
    subdev: &Subdev,
    routing: Option<&RoutingTable>,
    pad: u32,
    streams: StreamMask,
) -> Vec<StreamMask> {
    let pads = subdev.pads();
    let mut collected = vec![StreamMask::EMPTY; pads.len()];

    match routing {
        Some(table) => {
            for route in table.active() {
                if route.sink_pad == pad && streams.contains(route.sink_stream) {
                    collected[route.source_pad as usize].insert(route.source_stream);
                    debug!(entity = subdev.name(), pad = route.source_pad, stream = route.source_stream, "collected stream");
                }
                if route.source_pad == pad && streams.contains(route.source_stream) {
                    collected[route.sink_pad as usize].insert(route.sink_stream);
                    debug!(entity = subdev.name(), pad = route.sink_pad, stream = route.sink_stream, "collected stream");
                }
            }
        }
        None => {
            let local: PadKind = pads[pad as usize];
            for (index, kind) in pads.iter().enumerate() {
                if *kind == local.opposite() {
                    collected[index] = streams;
                    debug!(entity = subdev.name(), pad = index, %streams, "collected pad");
                }
            }
        }
    }

    collected
}

/// Forwards an enable or disable request on `(subdev, pad, streams)` to the
/// subdevices connected through enabled data links.
///
/// Video nodes at the far end of a link are skipped; the pipeline
/// coordinator drives DMA engines itself.
///
/// Enabling stops at the first neighbour that fails, without undoing the
/// neighbours already enabled; the caller rolls back. Disabling visits every
/// neighbour and returns the first error.
///
/// # Errors
///
/// Returns [`Error::Propagation`] naming the entity that failed first.
pub(crate) fn propagate(
    ctx: &StreamContext<'_>,
    subdev: &Subdev,
    routing: Option<&RoutingTable>,
    pad: u32,
    streams: StreamMask,
    enable: bool,
) -> Result<()> {
    let collected = collect_streams(subdev, routing, pad, streams);
    let mut first_error = None;

    for link in ctx.graph.links_of(subdev.id()) {
        debug!(
            source = %ctx.graph.name(link.source.entity),
            source_pad = link.source.index,
            sink = %ctx.graph.name(link.sink.entity),
            sink_pad = link.sink.index,
            "processing link"
        );

        if !link.is_active_data() {
            continue;
        }

        let (local, remote) = link.endpoints_from(subdev.id());
        let link_streams = collected[local.index as usize];
        if link_streams.is_empty() {
            continue;
        }

        let Some(remote_sd) = ctx.subdevs.get(&remote.entity) else {
            continue;
        };

        debug!(
            entity = remote_sd.name(),
            pad = remote.index,
            streams = %link_streams,
            "{} streams",
            if enable { "enabling" } else { "disabling" }
        );

        let result = if enable {
            remote_sd.enable_streams(ctx, remote.index, link_streams)
        } else {
            remote_sd.disable_streams(ctx, remote.index, link_streams)
        };

        if let Err(err) = result {
            let err = Error::propagation(remote_sd.name(), err);
            if enable {
                error!(entity = remote_sd.name(), error = %err, "failed to enable streams");
                return Err(err);
            }
            error!(entity = remote_sd.name(), error = %err, "failed to disable streams");
            first_error.get_or_insert(err);
        }
    }

    first_error.map_or(Ok(()), Err)
}
