// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

use std::{collections::HashMap, sync::Mutex};

use tracing::{debug, info};

use crate::{
    Error, Result,
    config::PipelineConfig,
    devices::IpBlock,
    dma::{DmaChannel, DmaDirection, DmaEngine},
    format::FrameFormat,
    graph::{EntityId, EntityKind, LinkId, LinkKind, MediaGraph, PadRef},
    pipeline::PipelineRegistry,
    propagate::StreamContext,
    routing::Route,
    stream::StreamMask,
    subdev::Subdev,
};

/// A media device: the graph of subdevices and DMA engines, plus the
/// pipelines currently streaming on it.
pub struct MediaDevice {
    pub(crate) graph: MediaGraph,
    pub(crate) config: PipelineConfig,
    pub(crate) subdevs: HashMap<EntityId, Subdev>,
    pub(crate) dmas: HashMap<EntityId, DmaEngine>,
    pub(crate) pipelines: Mutex<PipelineRegistry>,
}

impl MediaDevice {
    /// Returns a builder for a device using `config`.
    pub fn builder(config: PipelineConfig) -> MediaDeviceBuilder {
        MediaDeviceBuilder::new(config)
    }

    pub fn graph(&self) -> &MediaGraph {
        &self.graph
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Looks up an entity by name.
    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.graph.find(name)
    }

    /// Returns the subdevice with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `id` is not a subdevice.
    pub fn subdev(&self, id: EntityId) -> Result<&Subdev> {
        self.subdevs
            .get(&id)
            .ok_or_else(|| Error::InvalidArgument(format!("entity {id} is not a subdevice")))
    }

    /// Returns the DMA engine with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `id` is not a DMA engine.
    pub fn dma(&self, id: EntityId) -> Result<&DmaEngine> {
        self.dmas
            .get(&id)
            .ok_or_else(|| Error::InvalidArgument(format!("entity {id} is not a DMA engine")))
    }

    /// Subdevices, in no particular order.
    pub fn subdevs(&self) -> impl Iterator<Item = &Subdev> {
        self.subdevs.values()
    }

    /// DMA engines, in no particular order.
    pub fn dmas(&self) -> impl Iterator<Item = &DmaEngine> {
        self.dmas.values()
    }

    /// Replaces the routing table of a subdevice.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] while the subdevice belongs to a started pipeline
    /// - [`Error::InvalidArgument`] for an invalid table or a subdevice
    ///   without routing support
    pub fn set_routing(&self, id: EntityId, routes: Vec<Route>) -> Result<()> {
        self.subdev(id)?.set_routing(&self.graph, routes)
    }

    pub fn get_routing(&self, id: EntityId) -> Result<Vec<Route>> {
        self.subdev(id)?.get_routing()
    }

    /// Sets the format of a stream on a subdevice pad and returns the format
    /// actually applied.
    pub fn set_format(
        &self,
        id: EntityId,
        pad: u32,
        stream: u32,
        format: FrameFormat,
    ) -> Result<FrameFormat> {
        self.subdev(id)?.set_format(&self.graph, pad, stream, format)
    }

    pub fn get_format(&self, id: EntityId, pad: u32, stream: u32) -> Result<FrameFormat> {
        self.subdev(id)?.get_format(pad, stream)
    }

    /// Sets the format of a DMA engine and returns the format actually
    /// applied.
    pub fn set_dma_format(&self, id: EntityId, format: FrameFormat) -> Result<FrameFormat> {
        self.dma(id)?.set_format(format)
    }

    /// Enables or disables a link.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if either end belongs to a started pipeline.
    pub fn set_link_enabled(&self, link: LinkId, enabled: bool) -> Result<()> {
        self.graph.set_link_enabled(link, enabled)?;
        debug!(link = link.0, enabled, "link updated");
        Ok(())
    }

    /// Enables streams on a subdevice pad and everything upstream and
    /// downstream of it, outside of any DMA-driven pipeline.
    pub fn enable_streams(&self, id: EntityId, pad: u32, streams: StreamMask) -> Result<()> {
        self.subdev(id)?
            .enable_streams(&self.stream_context(), pad, streams)
    }

    /// Disables streams enabled with [`MediaDevice::enable_streams`].
    pub fn disable_streams(&self, id: EntityId, pad: u32, streams: StreamMask) -> Result<()> {
        self.subdev(id)?
            .disable_streams(&self.stream_context(), pad, streams)
    }

    pub(crate) fn stream_context(&self) -> StreamContext<'_> {
        StreamContext {
            graph: &self.graph,
            subdevs: &self.subdevs,
            config: &self.config,
        }
    }
}

/// Assembles a [`MediaDevice`].
pub struct MediaDeviceBuilder {
    graph: MediaGraph,
    config: PipelineConfig,
    subdevs: HashMap<EntityId, Subdev>,
    dmas: HashMap<EntityId, DmaEngine>,
}

impl MediaDeviceBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            graph: MediaGraph::new(),
            config,
            subdevs: HashMap::new(),
            dmas: HashMap::new(),
        }
    }

    /// Looks up an entity added so far by name.
    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.graph.find(name)
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self.find(name).is_some() {
            return Err(Error::InvalidArgument(format!("duplicate entity name '{name}'")));
        }
        Ok(())
    }

    /// Adds a subdevice backed by `block`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name is already taken.
    pub fn add_subdev(&mut self, name: &str, block: IpBlock) -> Result<EntityId> {
        self.check_name(name)?;
        let id = self.graph.add_entity(name, EntityKind::Subdev, block.pads());
        debug!(entity = name, kind = block.kind_name(), %id, "subdevice added");
        self.subdevs.insert(id, Subdev::new(id, name, block));
        Ok(id)
    }

    /// Adds a DMA engine driving `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name is already taken.
    pub fn add_dma(
        &mut self,
        name: &str,
        direction: DmaDirection,
        channel: Box<dyn DmaChannel>,
    ) -> Result<EntityId> {
        self.check_name(name)?;
        let id = self
            .graph
            .add_entity(name, EntityKind::VideoNode, vec![direction.pad_kind()]);
        debug!(entity = name, ?direction, %id, "DMA engine added");
        self.dmas
            .insert(id, DmaEngine::new(id, name, direction, channel));
        Ok(id)
    }

    /// Creates an enabled data link from `(entity, pad)` to `(entity, pad)`.
    pub fn link(&mut self, source: (EntityId, u32), sink: (EntityId, u32)) -> Result<LinkId> {
        self.link_with(source, sink, LinkKind::Data, true)
    }

    /// Creates a link of the given kind and state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for missing pads or pads of the
    /// wrong polarity.
    pub fn link_with(
        &mut self,
        source: (EntityId, u32),
        sink: (EntityId, u32),
        kind: LinkKind,
        enabled: bool,
    ) -> Result<LinkId> {
        self.graph.create_link(
            PadRef::new(source.0, source.1),
            PadRef::new(sink.0, sink.1),
            kind,
            enabled,
        )
    }

    pub fn build(self) -> MediaDevice {
        info!(
            subdevs = self.subdevs.len(),
            dmas = self.dmas.len(),
            mode = %self.config.multi_out_mode,
            "media device ready"
        );
        MediaDevice {
            graph: self.graph,
            config: self.config,
            subdevs: self.subdevs,
            dmas: self.dmas,
            pipelines: Mutex::new(PipelineRegistry::default()),
        }
    }
}
