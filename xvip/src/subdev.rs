// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Subdevices: routing, formats and the streaming hook dispatch.
//!
//! A [`Subdev`] pairs a graph entity with the [`IpBlock`] backing it and the
//! state userspace configures: the routing table, the per-stream formats and
//! the streams currently enabled on each pad.
//!
//! Enabling streams runs the block's hook first and then forwards the request
//! to the connected subdevices; disabling forwards first and runs the hook
//! last. The subdevice's own lock is held while its hook runs and released
//! before the request is forwarded.

use std::{collections::BTreeMap, sync::Mutex};

use tracing::{debug, warn};

use crate::{
    Error, Result,
    devices::{HookContext, IpBlock},
    format::FrameFormat,
    graph::{EntityId, MediaGraph, PadKind},
    lock,
    propagate::{StreamContext, propagate},
    routing::{Route, RoutingTable, validate},
    stream::{StreamMask, check_stream},
};

struct SubdevState {
    /// `None` for legacy blocks without per-stream routing.
    routing: Option<RoutingTable>,
    /// Keyed by `(pad, stream)`. Legacy blocks only use stream 0.
    formats: BTreeMap<(u32, u32), FrameFormat>,
    enabled: Vec<StreamMask>,
}

impl SubdevState {
    fn is_streaming(&self) -> bool {
        self.enabled.iter().any(|mask| !mask.is_empty())
    }
}

/// A subdevice in a [`crate::MediaDevice`].
pub struct Subdev {
    id: EntityId,
    name: String,
    pads: Vec<PadKind>,
    block: IpBlock,
    state: Mutex<SubdevState>,
}

impl Subdev {
    pub(crate) fn new(id: EntityId, name: &str, block: IpBlock) -> Self {
        let pads = block.pads();
        let routing = block.default_routing();
        let formats = default_formats(&block, &pads, routing.as_ref(), &BTreeMap::new());
        Self {
            id,
            name: name.to_owned(),
            state: Mutex::new(SubdevState {
                routing,
                formats,
                enabled: vec![StreamMask::EMPTY; pads.len()],
            }),
            pads,
            block,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pads(&self) -> &[PadKind] {
        &self.pads
    }

    pub fn block(&self) -> &IpBlock {
        &self.block
    }

    /// Returns `true` if the block models per-stream routing.
    pub fn has_routing(&self) -> bool {
        self.block.routing_restriction().is_some()
    }

    /// Streams currently enabled on `pad`.
    pub fn enabled_streams(&self, pad: u32) -> StreamMask {
        lock(&self.state)
            .enabled
            .get(pad as usize)
            .copied()
            .unwrap_or_default()
    }

    fn pad_kind(&self, pad: u32) -> Result<PadKind> {
        self.pads.get(pad as usize).copied().ok_or_else(|| {
            Error::InvalidArgument(format!("'{}' has no pad {pad}", self.name))
        })
    }

    fn check_idle(&self, graph: &MediaGraph, state: &SubdevState) -> Result<()> {
        if graph.pipeline_of(self.id).is_some() || state.is_streaming() {
            return Err(Error::Busy(format!("'{}' is streaming", self.name)));
        }
        Ok(())
    }

    /// Replaces the routing table.
    ///
    /// Streams kept by the new table keep their formats; new streams get
    /// the block's default format.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] while the entity is part of a started pipeline,
    ///   whatever the requested routes
    /// - [`Error::InvalidArgument`] for legacy blocks and for tables failing
    ///   [`validate`]; the current table is left untouched
    pub(crate) fn set_routing(&self, graph: &MediaGraph, routes: Vec<Route>) -> Result<()> {
        let mut state = lock(&self.state);
        self.check_idle(graph, &state)?;

        let restriction = self.block.routing_restriction().ok_or_else(|| {
            Error::InvalidArgument(format!("'{}' does not support routing", self.name))
        })?;
        validate(&routes, &self.pads, restriction)?;

        let table = RoutingTable::from_routes(routes);
        state.formats = default_formats(&self.block, &self.pads, Some(&table), &state.formats);
        debug!(entity = %self.name, routes = table.routes().len(), "routing updated");
        state.routing = Some(table);
        Ok(())
    }

    /// Returns a snapshot of the routing table.
    pub(crate) fn get_routing(&self) -> Result<Vec<Route>> {
        lock(&self.state)
            .routing
            .as_ref()
            .map(|table| table.routes().to_vec())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("'{}' does not support routing", self.name))
            })
    }

    /// Returns the format of `stream` on `pad`.
    pub(crate) fn get_format(&self, pad: u32, stream: u32) -> Result<FrameFormat> {
        self.pad_kind(pad)?;
        check_stream(stream)?;
        let state = lock(&self.state);
        let key = if state.routing.is_some() { (pad, stream) } else { (pad, 0) };
        state.formats.get(&key).copied().ok_or_else(|| {
            Error::InvalidArgument(format!("'{}' has no stream {pad}/{stream}", self.name))
        })
    }

    /// Formats of all streams on `pad`, by stream id.
    pub(crate) fn pad_formats(&self, pad: u32) -> Vec<(u32, FrameFormat)> {
        let state = lock(&self.state);
        state
            .formats
            .iter()
            .filter(|((p, _), _)| *p == pad)
            .map(|((_, stream), format)| (*stream, *format))
            .collect()
    }

    /// Sets the format of a sink stream and mirrors it on the source side.
    ///
    /// Source pads of blocks with sinks are read-only: the current format is
    /// returned unchanged. The size is clamped and the field forced to
    /// progressive.
    ///
    /// # Returns
    ///
    /// The format actually applied.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] while streaming
    /// - [`Error::InvalidArgument`] for an unknown pad or a stream no route
    ///   covers
    pub(crate) fn set_format(
        &self,
        graph: &MediaGraph,
        pad: u32,
        stream: u32,
        format: FrameFormat,
    ) -> Result<FrameFormat> {
        let kind = self.pad_kind(pad)?;
        check_stream(stream)?;

        let mut state = lock(&self.state);
        self.check_idle(graph, &state)?;

        let has_sinks = self.pads.contains(&PadKind::Sink);
        let format = format.clamped();
        let mirrored = FrameFormat {
            code: self.block.source_code(format.code),
            ..format
        };

        let state = &mut *state;
        match (&state.routing, kind) {
            (_, PadKind::Source) if has_sinks => {
                let key = if state.routing.is_some() { (pad, stream) } else { (pad, 0) };
                return state.formats.get(&key).copied().ok_or_else(|| {
                    Error::InvalidArgument(format!("'{}' has no stream {pad}/{stream}", self.name))
                });
            }
            (Some(table), PadKind::Sink) => {
                let targets: Vec<(u32, u32)> = match table.find_opposite(pad, stream) {
                    Some(opposite) => vec![opposite],
                    None => table
                        .active()
                        .filter(|r| r.sink_pad == pad && r.sink_stream == stream)
                        .map(|r| (r.source_pad, r.source_stream))
                        .collect(),
                };
                if targets.is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "'{}': no route for stream {pad}/{stream}",
                        self.name
                    )));
                }
                state.formats.insert((pad, stream), format);
                for target in targets {
                    state.formats.insert(target, mirrored);
                }
            }
            (Some(table), PadKind::Source) => {
                if !table.streams_on(pad).contains(stream) {
                    return Err(Error::InvalidArgument(format!(
                        "'{}': no route for stream {pad}/{stream}",
                        self.name
                    )));
                }
                state.formats.insert((pad, stream), format);
            }
            (None, PadKind::Sink) => {
                state.formats.insert((pad, 0), format);
                for (index, _) in self
                    .pads
                    .iter()
                    .enumerate()
                    .filter(|(_, k)| **k == PadKind::Source)
                {
                    state.formats.insert((index as u32, 0), mirrored);
                }
            }
            (None, PadKind::Source) => {
                state.formats.insert((pad, 0), format);
            }
        }

        debug!(entity = %self.name, pad, stream, %format, "format set");
        Ok(format)
    }

    /// Enables `streams` on `pad`, then on everything connected to it.
    ///
    /// On failure to forward the request, the local hook is rolled back and
    /// the neighbour's error returned.
    pub(crate) fn enable_streams(
        &self,
        ctx: &StreamContext<'_>,
        pad: u32,
        streams: StreamMask,
    ) -> Result<()> {
        self.pad_kind(pad)?;

        let routing = {
            let mut state = lock(&self.state);
            let already = state.enabled[pad as usize] & streams;
            if !already.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "'{}': streams {already} already enabled on pad {pad}",
                    self.name
                )));
            }
            if let Some(table) = &state.routing {
                let unknown = streams - table.streams_on(pad);
                if !unknown.is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "'{}': no route for streams {unknown} on pad {pad}",
                        self.name
                    )));
                }
            }

            if self.block.has_hooks() {
                debug!(entity = %self.name, pad, %streams, "enabling streams");
            }
            self.block
                .enable_streams(&self.hook_context(ctx, &state), pad, streams)?;
            state.enabled[pad as usize] |= streams;
            state.routing.clone()
        };

        if let Err(err) = propagate(ctx, self, routing.as_ref(), pad, streams, true) {
            let mut state = lock(&self.state);
            if let Err(rollback) =
                self.block
                    .disable_streams(&self.hook_context(ctx, &state), pad, streams)
            {
                warn!(entity = %self.name, pad, error = %rollback, "rollback failed");
            }
            state.enabled[pad as usize] -= streams;
            return Err(err);
        }
        Ok(())
    }

    /// Disables `streams` on `pad`, after everything connected to it.
    ///
    /// The local hook runs whatever the outcome of the forwarded request;
    /// the first error is returned.
    pub(crate) fn disable_streams(
        &self,
        ctx: &StreamContext<'_>,
        pad: u32,
        streams: StreamMask,
    ) -> Result<()> {
        self.pad_kind(pad)?;

        let routing = {
            let state = lock(&self.state);
            let missing = streams - state.enabled[pad as usize];
            if !missing.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "'{}': streams {missing} not enabled on pad {pad}",
                    self.name
                )));
            }
            state.routing.clone()
        };

        let forwarded = propagate(ctx, self, routing.as_ref(), pad, streams, false);

        let mut state = lock(&self.state);
        if self.block.has_hooks() {
            debug!(entity = %self.name, pad, %streams, "disabling streams");
        }
        let local = self
            .block
            .disable_streams(&self.hook_context(ctx, &state), pad, streams);
        state.enabled[pad as usize] -= streams;

        forwarded.and(local)
    }

    fn hook_context<'a>(
        &'a self,
        ctx: &'a StreamContext<'_>,
        state: &'a SubdevState,
    ) -> HookContext<'a> {
        HookContext {
            entity: &self.name,
            pads: &self.pads,
            routing: state.routing.as_ref(),
            formats: &state.formats,
            enabled: &state.enabled,
            config: ctx.config,
        }
    }
}

/// Builds the format map for a routing table (or, for legacy blocks, for
/// every pad), keeping formats from `previous` where the stream survives.
fn default_formats(
    block: &IpBlock,
    pads: &[PadKind],
    routing: Option<&RoutingTable>,
    previous: &BTreeMap<(u32, u32), FrameFormat>,
) -> BTreeMap<(u32, u32), FrameFormat> {
    let keys: Vec<(u32, u32)> = match routing {
        Some(table) => table.endpoints(),
        None => (0..pads.len() as u32).map(|pad| (pad, 0)).collect(),
    };
    keys.into_iter()
        .map(|key| {
            let format = previous
                .get(&key)
                .copied()
                .unwrap_or_else(|| block.default_format(pads[key.0 as usize]));
            (key, format)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityKind;

    fn passthrough(graph: &MediaGraph) -> Subdev {
        let block = IpBlock::Passthrough { sinks: 1, sources: 1 };
        let id = graph.add_entity("pt", EntityKind::Subdev, block.pads());
        Subdev::new(id, "pt", block)
    }

    #[test]
    fn legacy_sink_format_mirrors_to_source() {
        let graph = MediaGraph::new();
        let sd = passthrough(&graph);
        let requested = FrameFormat {
            width: 10_000,
            height: 720,
            ..FrameFormat::default()
        };
        let applied = sd.set_format(&graph, 0, 0, requested).unwrap();
        assert_eq!(applied.width, 7680);
        assert_eq!(sd.get_format(1, 0).unwrap(), applied);

        // Source pads are read-only mirrors.
        let ignored = FrameFormat {
            width: 640,
            ..applied
        };
        assert_eq!(sd.set_format(&graph, 1, 0, ignored).unwrap(), applied);
    }

    #[test]
    fn legacy_blocks_refuse_routing() {
        let graph = MediaGraph::new();
        let sd = passthrough(&graph);
        assert!(sd.get_routing().is_err());
        assert!(matches!(
            sd.set_routing(&graph, vec![Route::new(0, 0, 1, 0)]),
            Err(Error::InvalidArgument(_))
        ));
    }
}
