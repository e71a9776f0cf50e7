// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! DMA engine adapter.
//!
//! A [`DmaEngine`] is the video node at one end of a pipeline. It owns one
//! hardware [`DmaChannel`] and the format of the frames it moves to or from
//! memory. Buffer management and descriptor submission stay behind the
//! channel.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Error, Result,
    format::FrameFormat,
    graph::{EntityId, MediaGraph, PadKind, PadRef},
    lock,
    pipeline::Pipeline,
    subdev::Subdev,
};

/// Direction of a DMA engine, seen from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DmaDirection {
    /// Captures frames from the pipeline into memory (video capture). The
    /// node has a sink pad.
    Output,
    /// Feeds frames from memory into the pipeline (video output). The node
    /// has a source pad.
    Input,
}

impl DmaDirection {
    /// Kind of the node's single pad.
    pub fn pad_kind(self) -> PadKind {
        match self {
            DmaDirection::Output => PadKind::Sink,
            DmaDirection::Input => PadKind::Source,
        }
    }
}

/// One hardware DMA channel.
pub trait DmaChannel: Send + Sync {
    /// Issues pending transfers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the channel refuses to start.
    fn start(&self) -> Result<()>;

    /// Terminates all transfers. Never fails.
    fn stop(&self);
}

impl<T: DmaChannel + ?Sized> DmaChannel for Arc<T> {
    fn start(&self) -> Result<()> {
        (**self).start()
    }

    fn stop(&self) {
        (**self).stop()
    }
}

/// A DMA-backed video node.
pub struct DmaEngine {
    id: EntityId,
    name: String,
    direction: DmaDirection,
    channel: Box<dyn DmaChannel>,
    format: Mutex<FrameFormat>,
    pub(crate) pipeline: Mutex<Option<Arc<Pipeline>>>,
}

impl DmaEngine {
    pub(crate) fn new(
        id: EntityId,
        name: &str,
        direction: DmaDirection,
        channel: Box<dyn DmaChannel>,
    ) -> Self {
        Self {
            id,
            name: name.to_owned(),
            direction,
            channel,
            format: Mutex::new(FrameFormat::default()),
            pipeline: Mutex::new(None),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> DmaDirection {
        self.direction
    }

    /// The node's pad.
    pub fn pad(&self) -> PadRef {
        PadRef::new(self.id, 0)
    }

    pub fn format(&self) -> FrameFormat {
        *lock(&self.format)
    }

    /// Returns `true` while the engine is streaming.
    pub fn is_streaming(&self) -> bool {
        lock(&self.pipeline).is_some()
    }

    /// Sets the frame format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while streaming.
    pub(crate) fn set_format(&self, format: FrameFormat) -> Result<FrameFormat> {
        if self.is_streaming() {
            return Err(Error::Busy(format!("'{}' is streaming", self.name)));
        }
        let format = format.clamped();
        *lock(&self.format) = format;
        Ok(format)
    }

    pub(crate) fn start(&self) -> Result<()> {
        debug!(dma = %self.name, "starting channel");
        self.channel.start()
    }

    pub(crate) fn stop(&self) {
        debug!(dma = %self.name, "stopping channel");
        self.channel.stop();
    }

    /// Returns the subdevice pad connected to this node, if any.
    pub(crate) fn remote<'a>(
        &self,
        graph: &MediaGraph,
        subdevs: &'a std::collections::HashMap<EntityId, Subdev>,
    ) -> Option<(&'a Subdev, u32)> {
        let remote = graph.remote_pad(self.pad())?;
        subdevs.get(&remote.entity).map(|sd| (sd, remote.index))
    }

    /// Checks the configured format against the connected subdevice.
    ///
    /// # Errors
    ///
    /// - [`Error::NoSuchPipeline`] if no subdevice is connected
    /// - [`Error::InvalidArgument`] on code, size or field mismatch
    pub(crate) fn verify_format(
        &self,
        graph: &MediaGraph,
        subdevs: &std::collections::HashMap<EntityId, Subdev>,
    ) -> Result<()> {
        let (subdev, pad) = self.remote(graph, subdevs).ok_or_else(|| {
            Error::NoSuchPipeline(format!("no subdevice connected to '{}'", self.name))
        })?;
        let remote = subdev.get_format(pad, 0)?;
        let local = self.format();

        if remote.code != local.code {
            return Err(Error::InvalidArgument(format!(
                "'{}': code mismatch {:?} != {:?}",
                self.name, remote.code, local.code
            )));
        }
        if remote.width != local.width || remote.height != local.height {
            return Err(Error::InvalidArgument(format!(
                "'{}': size mismatch {}x{} != {}x{}",
                self.name, remote.width, remote.height, local.width, local.height
            )));
        }
        if remote.field != local.field {
            return Err(Error::InvalidArgument(format!(
                "'{}': field mismatch {:?} != {:?}",
                self.name, remote.field, local.field
            )));
        }
        Ok(())
    }
}
