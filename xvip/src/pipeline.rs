// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Pipeline coordination.
//!
//! Every DMA engine reachable from another through enabled data links shares
//! one [`Pipeline`]. The DMA engines can be started and stopped one by one,
//! but the subdevices between them have a single streaming state, so the
//! pipeline counts how many engines of each direction are streaming.
//!
//! AXI4-Stream slaves apply back-pressure until they are ready to accept
//! data. Output engines are therefore always started before the branches
//! feeding them, and input engines, which produce data, last. Stopping runs
//! the same steps backwards.
//!
//! Two multi-output modes are supported, see [`MultiOutMode`]:
//!
//! - `Sync`: the pipeline starts when its last DMA engine starts and stops
//!   as soon as one engine stops.
//! - `Async`: each engine starts and stops its own branch. This only works
//!   if the blocks upstream of a stopped branch can drop its data.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::{debug, error, info, warn};

use crate::{
    Error, MediaDevice, Result,
    config::MultiOutMode,
    dma::{DmaDirection, DmaEngine},
    format::link_validate,
    graph::{EntityId, Link, PipelineId},
    lock,
    stream::StreamMask,
};

/// Branches are always entered on stream 0 of the pad next to the DMA engine.
const BRANCH_STREAMS: StreamMask = StreamMask::from_bits(1);

#[derive(Default)]
struct PipelineState {
    /// Number of DMA engines that joined the pipeline.
    start_count: u32,
    /// Number of DMA engines that prepared the pipeline.
    use_count: u32,
    /// DMA engines found by the last graph walk, in walk order.
    dmas: Vec<EntityId>,
    num_inputs: u32,
    num_outputs: u32,
    input_stream_count: u32,
    output_stream_count: u32,
}

impl PipelineState {
    fn streaming(&self) -> u32 {
        self.input_stream_count + self.output_stream_count
    }

    fn total(&self) -> u32 {
        self.num_inputs + self.num_outputs
    }

    fn clear(&mut self) {
        self.dmas.clear();
        self.num_inputs = 0;
        self.num_outputs = 0;
    }
}

/// A set of entities streamed together.
pub struct Pipeline {
    id: PipelineId,
    members: Vec<EntityId>,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    fn new(id: PipelineId, members: Vec<EntityId>) -> Self {
        Self {
            id,
            members,
            state: Mutex::new(PipelineState::default()),
        }
    }

    pub fn id(&self) -> PipelineId {
        self.id
    }

    /// Entities that belong to the pipeline, starting with the DMA engine
    /// that created it.
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    /// Number of DMA engines currently using the pipeline.
    pub fn use_count(&self) -> u32 {
        lock(&self.state).use_count
    }

    /// Number of `(input, output)` DMA engines currently streaming.
    pub fn stream_counts(&self) -> (u32, u32) {
        let state = lock(&self.state);
        (state.input_stream_count, state.output_stream_count)
    }

    /// Validates the pipeline on first use and takes a reference on it.
    ///
    /// The first user walks the graph from `dma` and records every DMA
    /// engine it reaches, so topology changes made between two streaming
    /// sessions are picked up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPipeline`] if the walk finds no DMA engine.
    pub(crate) fn prepare(&self, dev: &MediaDevice, dma: &DmaEngine) -> Result<()> {
        let mut state = lock(&self.state);

        if state.use_count == 0 {
            state.clear();
            for id in dev.graph.walk(dma.id()) {
                let Some(engine) = dev.dmas.get(&id) else {
                    continue;
                };
                match engine.direction() {
                    DmaDirection::Output => state.num_outputs += 1,
                    DmaDirection::Input => state.num_inputs += 1,
                }
                state.dmas.push(id);
            }

            if state.dmas.is_empty() {
                return Err(Error::NoSuchPipeline(format!(
                    "no DMA engine reachable from '{}'",
                    dma.name()
                )));
            }
            debug!(
                pipeline = self.id.0,
                inputs = state.num_inputs,
                outputs = state.num_outputs,
                "pipeline initialized"
            );
        }

        state.use_count += 1;
        Ok(())
    }

    /// Drops a reference taken by [`Pipeline::prepare`].
    pub(crate) fn cleanup(&self) {
        let mut state = lock(&self.state);
        state.use_count = state.use_count.saturating_sub(1);
        if state.use_count == 0 {
            state.clear();
        }
    }

    /// Starts `dma` on the pipeline.
    ///
    /// The pipeline lock is held for the whole sequence so concurrent
    /// starters see a consistent count. Counters are left untouched on
    /// failure.
    pub(crate) fn start_dma(&self, dev: &MediaDevice, dma: &DmaEngine) -> Result<()> {
        let mut state = lock(&self.state);

        match dev.config.multi_out_mode {
            MultiOutMode::Sync => {
                if state.streaming() + 1 == state.total() {
                    self.start_all(dev, &state)?;
                }
                match dma.direction() {
                    DmaDirection::Output => state.output_stream_count += 1,
                    DmaDirection::Input => state.input_stream_count += 1,
                }
            }
            MultiOutMode::Async => {
                dma.start()?;
                if let Err(err) = enable_branch(dev, dma) {
                    dma.stop();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Stops `dma` on the pipeline. Never fails.
    pub(crate) fn stop_dma(&self, dev: &MediaDevice, dma: &DmaEngine) {
        let mut state = lock(&self.state);

        match dev.config.multi_out_mode {
            MultiOutMode::Sync => {
                let count = match dma.direction() {
                    DmaDirection::Output => &mut state.output_stream_count,
                    DmaDirection::Input => &mut state.input_stream_count,
                };
                *count = count.saturating_sub(1);

                if state.streaming() + 1 == state.total() {
                    self.stop_all(dev, &state);
                }
            }
            MultiOutMode::Async => {
                // Logged by disable_branch.
                let _ = disable_branch(dev, dma);
                dma.stop();
            }
        }
    }

    fn engines<'a>(
        dev: &'a MediaDevice,
        state: &PipelineState,
        direction: DmaDirection,
    ) -> Vec<&'a DmaEngine> {
        state
            .dmas
            .iter()
            .filter_map(|id| dev.dmas.get(id))
            .filter(|dma| dma.direction() == direction)
            .collect()
    }

    /// Starts the whole pipeline: output engines, then the branches feeding
    /// them, then input engines.
    fn start_all(&self, dev: &MediaDevice, state: &PipelineState) -> Result<()> {
        let outputs = Self::engines(dev, state, DmaDirection::Output);
        let inputs = Self::engines(dev, state, DmaDirection::Input);
        info!(pipeline = self.id.0, "starting pipeline");

        for (i, dma) in outputs.iter().enumerate() {
            if let Err(err) = dma.start() {
                outputs[..i].iter().rev().for_each(|dma| dma.stop());
                return Err(err);
            }
        }

        for (i, dma) in outputs.iter().enumerate() {
            if let Err(err) = enable_branch(dev, dma) {
                for dma in outputs[..i].iter().rev() {
                    let _ = disable_branch(dev, dma);
                }
                outputs.iter().rev().for_each(|dma| dma.stop());
                return Err(err);
            }
        }

        for (i, dma) in inputs.iter().enumerate() {
            if let Err(err) = dma.start() {
                inputs[..i].iter().rev().for_each(|dma| dma.stop());
                for dma in outputs.iter().rev() {
                    let _ = disable_branch(dev, dma);
                }
                outputs.iter().rev().for_each(|dma| dma.stop());
                return Err(err);
            }
        }

        Ok(())
    }

    /// Stops the whole pipeline: input engines, then the output branches,
    /// then output engines. Errors are logged and teardown carries on.
    fn stop_all(&self, dev: &MediaDevice, state: &PipelineState) {
        let outputs = Self::engines(dev, state, DmaDirection::Output);
        let inputs = Self::engines(dev, state, DmaDirection::Input);
        info!(pipeline = self.id.0, "stopping pipeline");

        inputs.iter().rev().for_each(|dma| dma.stop());
        for dma in outputs.iter().rev() {
            let _ = disable_branch(dev, dma);
        }
        outputs.iter().rev().for_each(|dma| dma.stop());
    }
}

fn enable_branch(dev: &MediaDevice, dma: &DmaEngine) -> Result<()> {
    debug!(dma = dma.name(), "enabling streams");

    let (subdev, pad) = dma.remote(&dev.graph, &dev.subdevs).ok_or_else(|| {
        Error::NoSuchPipeline(format!("no subdevice connected to '{}'", dma.name()))
    })?;

    subdev
        .enable_streams(&dev.stream_context(), pad, BRANCH_STREAMS)
        .map_err(|err| Error::propagation(subdev.name(), err))
        .inspect_err(|err| error!(dma = dma.name(), error = %err, "failed to enable streams"))
}

fn disable_branch(dev: &MediaDevice, dma: &DmaEngine) -> Result<()> {
    debug!(dma = dma.name(), "disabling streams");

    let (subdev, pad) = dma.remote(&dev.graph, &dev.subdevs).ok_or_else(|| {
        Error::NoSuchPipeline(format!("no subdevice connected to '{}'", dma.name()))
    })?;

    subdev
        .disable_streams(&dev.stream_context(), pad, BRANCH_STREAMS)
        .map_err(|err| Error::propagation(subdev.name(), err))
        .inspect_err(|err| error!(dma = dma.name(), error = %err, "failed to disable streams"))
}

/// Started pipelines, keyed by id. Guarded by the device lock.
#[derive(Default)]
pub(crate) struct PipelineRegistry {
    next_id: usize,
    pipelines: HashMap<PipelineId, Arc<Pipeline>>,
}

impl MediaDevice {
    /// Starts streaming on a DMA engine.
    ///
    /// The engine joins the pipeline of its graph component (creating and
    /// validating it if no other engine of the component streams yet), its
    /// format is checked against the connected subdevice, and the engine is
    /// started on the pipeline. Everything is undone on failure.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if the engine already streams, or part of its
    ///   component belongs to another pipeline
    /// - [`Error::NoSuchPipeline`] if a link carries incompatible formats or
    ///   no subdevice is connected to the engine
    /// - [`Error::InvalidArgument`] if the engine's format does not match
    ///   the connected subdevice
    /// - any error from the DMA channel or the streaming hooks, wrapped in
    ///   [`Error::Propagation`] when a subdevice failed
    pub fn start_streaming(&self, dma: EntityId) -> Result<()> {
        let engine = self.dma(dma)?;
        let mut slot = lock(&engine.pipeline);
        if slot.is_some() {
            return Err(Error::Busy(format!("'{}' is already streaming", engine.name())));
        }

        let pipe = self.pipeline_start(engine)?;
        if let Err(err) = self.start_on(&pipe, engine) {
            error!(dma = engine.name(), error = %err, "failed to start streaming");
            self.pipeline_stop(&pipe);
            return Err(err);
        }

        info!(dma = engine.name(), pipeline = pipe.id.0, "streaming started");
        *slot = Some(pipe);
        Ok(())
    }

    /// Stops streaming on a DMA engine. Never fails; stopping an engine that
    /// does not stream only logs a warning.
    pub fn stop_streaming(&self, dma: EntityId) {
        let Ok(engine) = self.dma(dma) else {
            warn!(entity = %dma, "not a DMA engine");
            return;
        };
        let mut slot = lock(&engine.pipeline);
        let Some(pipe) = slot.take() else {
            warn!(dma = engine.name(), "not streaming");
            return;
        };

        pipe.stop_dma(self, engine);
        pipe.cleanup();
        self.pipeline_stop(&pipe);
        info!(dma = engine.name(), "streaming stopped");
    }

    /// Returns the pipeline a DMA engine streams on.
    pub fn pipeline(&self, dma: EntityId) -> Option<Arc<Pipeline>> {
        self.dma(dma).ok().and_then(|engine| lock(&engine.pipeline).clone())
    }

    fn start_on(&self, pipe: &Pipeline, engine: &DmaEngine) -> Result<()> {
        engine.verify_format(&self.graph, &self.subdevs)?;
        pipe.prepare(self, engine)?;
        pipe.start_dma(self, engine).inspect_err(|_| pipe.cleanup())
    }

    /// Joins the pipeline of `engine`'s component, creating it if needed.
    ///
    /// A new pipeline marks all its members, which freezes their routing,
    /// formats and links until the last engine leaves. The marks are
    /// dropped again if link validation fails.
    fn pipeline_start(&self, engine: &DmaEngine) -> Result<Arc<Pipeline>> {
        let mut registry = lock(&self.pipelines);

        if let Some(id) = self.graph.pipeline_of(engine.id()) {
            let pipe = registry.pipelines.get(&id).cloned().ok_or_else(|| {
                Error::Other(format!("'{}' marked with unknown pipeline", engine.name()))
            })?;
            lock(&pipe.state).start_count += 1;
            return Ok(pipe);
        }

        let members = self.graph.walk(engine.id());
        if let Some(busy) = members
            .iter()
            .find(|id| self.graph.pipeline_of(**id).is_some())
        {
            return Err(Error::Busy(format!(
                "'{}' belongs to another pipeline",
                self.graph.name(*busy)
            )));
        }

        // Formats are checked on frozen members.
        let id = PipelineId(registry.next_id);
        self.graph.set_pipeline(&members, Some(id));
        if let Err(err) = self.validate_links(&members) {
            self.graph.set_pipeline(&members, None);
            return Err(err);
        }

        registry.next_id += 1;
        let pipe = Arc::new(Pipeline::new(id, members));
        lock(&pipe.state).start_count = 1;
        registry.pipelines.insert(id, pipe.clone());

        debug!(pipeline = id.0, members = pipe.members.len(), "pipeline created");
        Ok(pipe)
    }

    /// Leaves a pipeline; the last engine out releases its members.
    fn pipeline_stop(&self, pipe: &Arc<Pipeline>) {
        let mut registry = lock(&self.pipelines);
        let mut state = lock(&pipe.state);
        state.start_count = state.start_count.saturating_sub(1);
        if state.start_count == 0 {
            self.graph.set_pipeline(&pipe.members, None);
            registry.pipelines.remove(&pipe.id);
            debug!(pipeline = pipe.id.0, "pipeline released");
        }
    }

    /// Checks the formats on every enabled link between two member
    /// subdevices.
    fn validate_links(&self, members: &[EntityId]) -> Result<()> {
        for id in members {
            if !self.subdevs.contains_key(id) {
                continue;
            }
            for link in self.graph.links_of(*id) {
                if link.is_active_data() && link.sink.entity == *id {
                    self.validate_link(&link)?;
                }
            }
        }
        Ok(())
    }

    fn validate_link(&self, link: &Link) -> Result<()> {
        let (Some(source), Some(sink)) = (
            self.subdevs.get(&link.source.entity),
            self.subdevs.get(&link.sink.entity),
        ) else {
            return Ok(());
        };

        let source_formats = source.pad_formats(link.source.index);
        let sink_formats = sink.pad_formats(link.sink.index);

        // Routed on both ends: streams are matched by id. A legacy end has a
        // single format that must fit every stream on the other end.
        let pairs: Vec<_> = if source.has_routing() && sink.has_routing() {
            source_formats
                .iter()
                .filter_map(|(stream, src)| {
                    sink_formats
                        .iter()
                        .find(|(s, _)| s == stream)
                        .map(|(_, snk)| (*src, *snk))
                })
                .collect()
        } else {
            source_formats
                .iter()
                .flat_map(|(_, src)| sink_formats.iter().map(move |(_, snk)| (*src, *snk)))
                .collect()
        };

        for (src, snk) in pairs {
            link_validate(&src, &snk).inspect_err(|err| {
                error!(
                    source = source.name(),
                    sink = sink.name(),
                    error = %err,
                    "link validation failed"
                )
            })?;
        }
        Ok(())
    }
}
