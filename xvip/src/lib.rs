// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! # XVIP - Xilinx Video IP pipeline control
//!
//! Streaming control for media-controller style video pipelines built from
//! Xilinx soft-IP blocks: stream switches, CSI-2 receivers, colour filter
//! array interpolation, chroma resampling, HLS cores and DMA engines, fed by
//! cameras behind GMSL serializers.
//!
//! ## Overview
//!
//! A [`MediaDevice`] owns a media graph of entities connected through pads
//! and links. Subdevices carry a routing table mapping sink streams to
//! source streams, a format per stream, and an IP block whose streaming
//! hooks program the hardware. DMA engines sit at the ends of the graph and
//! move frames to and from memory.
//!
//! ### Key Concepts
//!
//! - **Entity**: a node of the [`graph::MediaGraph`], either a [`Subdev`] or a [`DmaEngine`]
//! - **Stream**: an independent data flow on a pad, selected through a [`StreamMask`]
//! - **Route**: a sink stream to source stream mapping inside one subdevice ([`routing::Route`])
//! - **Pipeline**: the entities reachable from a DMA engine, started and stopped as a unit ([`Pipeline`])
//! - **Branch**: the subdevices between one DMA engine and the rest of its pipeline
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ MediaDevice │  start_streaming / stop_streaming
//! └──────┬──────┘
//!        │
//!        ├─► Pipeline ──► DmaEngine ──► DmaChannel
//!        │            └─► branch enable
//!        │                   │
//!        └─► Subdev ◄────────┘  hook, then propagate over links
//!               └─► IpBlock ──► RegisterIo
//! ```
//!
//! ## Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use xvip::{
//!     DmaDirection, MediaDevice,
//!     config::PipelineConfig,
//!     devices::IpBlock,
//!     sim::RecordingChannel,
//! };
//! use xvip_sys::TraceLog;
//!
//! # fn main() -> Result<(), xvip::Error> {
//! let log = TraceLog::new();
//! let mut builder = MediaDevice::builder(PipelineConfig::default());
//! let bridge = builder.add_subdev("bridge", IpBlock::Passthrough { sinks: 1, sources: 1 })?;
//! let input = builder.add_dma(
//!     "input",
//!     DmaDirection::Input,
//!     Box::new(Arc::new(RecordingChannel::new("input", log.clone()))),
//! )?;
//! let output = builder.add_dma(
//!     "output",
//!     DmaDirection::Output,
//!     Box::new(Arc::new(RecordingChannel::new("output", log.clone()))),
//! )?;
//! builder.link((input, 0), (bridge, 0))?;
//! builder.link((bridge, 1), (output, 0))?;
//! let device = builder.build();
//!
//! // In synchronous mode the pipeline only starts with its last DMA engine.
//! device.start_streaming(output)?;
//! assert!(log.is_empty());
//! device.start_streaming(input)?;
//! assert_eq!(log.len(), 2);
//!
//! device.stop_streaming(input);
//! device.stop_streaming(output);
//! # Ok(())
//! # }
//! ```
//!
//! ## Locking
//!
//! Locks are always taken in this order: DMA engine, device, pipeline,
//! subdevice, graph. The graph lock is held for single queries only, never
//! while a streaming hook runs.

use std::sync::{Mutex, MutexGuard};

mod device;
mod dma;
mod error;
mod pipeline;
mod propagate;
mod subdev;

pub mod config;
pub mod devices;
pub mod format;
pub mod graph;
pub mod graphdef;
pub mod routing;
pub mod sim;
pub mod stream;

pub use device::{MediaDevice, MediaDeviceBuilder};
pub use dma::{DmaChannel, DmaDirection, DmaEngine};
pub use error::{Error, Result};
pub use graphdef::DeviceBackend;
pub use pipeline::Pipeline;
pub use stream::StreamMask;
pub use subdev::Subdev;
pub use xvip_sys::RegisterIo;

/// Locks `mutex`, recovering the data if a previous holder panicked.
///
/// None of the protected state can be left half-updated by a panic, so a
/// poisoned lock carries no extra information.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
