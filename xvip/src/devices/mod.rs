// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Streaming hooks of the supported IP blocks.
//!
//! Each IP block programs its own registers when streams are enabled or
//! disabled on one of its pads. The hooks never touch neighbouring entities:
//! forwarding the request through the graph is the job of
//! [`crate::subdev`], which calls the hook of the local entity first on
//! enable and last on disable.

mod axis_switch;
mod cfa;
mod cresample;
mod csi2rx;
mod hls;
mod sensor;
mod switch;

use std::{collections::BTreeMap, fmt, thread, time::Duration};

use tracing::trace;
use xvip_sys::{
    RegisterIo,
    regs::vip::{
        ACTIVE_SIZE, CTRL_CONTROL, CTRL_CONTROL_REG_UPDATE, CTRL_CONTROL_SW_ENABLE, active_size,
    },
};

pub use axis_switch::AxisSwitch;
pub use cfa::Cfa;
pub use cresample::Cresample;
pub use csi2rx::Csi2Rx;
pub use hls::Hls;
pub use sensor::GmslSensor;
pub use switch::VideoSwitch;

use crate::{
    Error, Result,
    config::PipelineConfig,
    format::{FrameFormat, MbusCode},
    graph::PadKind,
    routing::{RoutingRestriction, RoutingTable},
    stream::StreamMask,
};

/// Everything a hook may look at while it runs.
///
/// `enabled` holds, per pad, the streams that were enabled *before* the
/// current call.
pub struct HookContext<'a> {
    pub entity: &'a str,
    pub pads: &'a [PadKind],
    pub routing: Option<&'a RoutingTable>,
    pub formats: &'a BTreeMap<(u32, u32), FrameFormat>,
    pub enabled: &'a [StreamMask],
    pub config: &'a PipelineConfig,
}

impl HookContext<'_> {
    /// Returns the format of `stream` on `pad`.
    pub fn format(&self, pad: u32, stream: u32) -> Result<FrameFormat> {
        self.formats.get(&(pad, stream)).copied().ok_or_else(|| {
            Error::InvalidArgument(format!("{}: no format on {pad}/{stream}", self.entity))
        })
    }

    /// Returns `true` if no stream is enabled on any pad yet.
    pub fn is_idle(&self) -> bool {
        self.enabled.iter().all(|mask| mask.is_empty())
    }

    /// Returns `true` if disabling `streams` on `pad` leaves nothing enabled.
    pub fn is_last(&self, pad: u32, streams: StreamMask) -> bool {
        self.enabled.iter().enumerate().all(|(index, mask)| {
            let remaining = if index as u32 == pad { *mask - streams } else { *mask };
            remaining.is_empty()
        })
    }

    pub fn num_sinks(&self) -> u32 {
        self.pads.iter().filter(|kind| **kind == PadKind::Sink).count() as u32
    }

    pub fn num_sources(&self) -> u32 {
        self.pads.iter().filter(|kind| **kind == PadKind::Source).count() as u32
    }
}

/// Hardware programming performed when streams start or stop on a pad.
///
/// `disable_streams` must be safe to call after a failed or partial
/// `enable_streams`.
pub trait StreamingHooks: Send + Sync {
    fn enable_streams(&self, ctx: &HookContext<'_>, pad: u32, streams: StreamMask) -> Result<()>;

    fn disable_streams(&self, ctx: &HookContext<'_>, pad: u32, streams: StreamMask) -> Result<()>;
}

/// The closed set of blocks a subdevice can be backed by.
pub enum IpBlock {
    Switch(VideoSwitch),
    AxisSwitch(AxisSwitch),
    Cfa(Cfa),
    Cresample(Cresample),
    Hls(Hls),
    Csi2Rx(Csi2Rx),
    Sensor(GmslSensor),
    /// A block without registers, forwarding streams from its sinks to its
    /// sources.
    Passthrough { sinks: u32, sources: u32 },
    /// A block supplied by the caller.
    ///
    /// `restriction` set to `None` makes the entity a legacy one, without a
    /// routing table.
    Custom {
        pads: Vec<PadKind>,
        restriction: Option<RoutingRestriction>,
        hooks: Box<dyn StreamingHooks>,
    },
}

impl IpBlock {
    /// Short name of the block type, used in logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            IpBlock::Switch(_) => "switch",
            IpBlock::AxisSwitch(_) => "axis-switch",
            IpBlock::Cfa(_) => "cfa",
            IpBlock::Cresample(_) => "cresample",
            IpBlock::Hls(_) => "hls",
            IpBlock::Csi2Rx(_) => "csi2rx",
            IpBlock::Sensor(_) => "sensor",
            IpBlock::Passthrough { .. } => "passthrough",
            IpBlock::Custom { .. } => "custom",
        }
    }

    /// Pads of the block, sinks first.
    pub fn pads(&self) -> Vec<PadKind> {
        match self {
            IpBlock::Switch(sw) => sinks_then_sources(sw.num_sinks(), sw.num_sources()),
            IpBlock::AxisSwitch(sw) => sinks_then_sources(sw.num_sinks(), sw.num_sources()),
            IpBlock::Cfa(_) | IpBlock::Cresample(_) | IpBlock::Hls(_) | IpBlock::Csi2Rx(_) => {
                sinks_then_sources(1, 1)
            }
            IpBlock::Sensor(_) => vec![PadKind::Source],
            IpBlock::Passthrough { sinks, sources } => sinks_then_sources(*sinks, *sources),
            IpBlock::Custom { pads, .. } => pads.clone(),
        }
    }

    /// Routing restrictions, or `None` for legacy blocks that do not model
    /// per-stream routing.
    pub fn routing_restriction(&self) -> Option<RoutingRestriction> {
        match self {
            IpBlock::Switch(_) => Some(VideoSwitch::RESTRICTION),
            IpBlock::AxisSwitch(sw) => Some(sw.restriction()),
            IpBlock::Csi2Rx(_) => Some(RoutingRestriction::NONE),
            IpBlock::Cfa(_)
            | IpBlock::Cresample(_)
            | IpBlock::Hls(_)
            | IpBlock::Sensor(_)
            | IpBlock::Passthrough { .. } => None,
            IpBlock::Custom { restriction, .. } => *restriction,
        }
    }

    /// Routing table installed when the subdevice is created.
    pub fn default_routing(&self) -> Option<RoutingTable> {
        self.routing_restriction()?;
        Some(match self {
            IpBlock::Csi2Rx(_) => Csi2Rx::default_routing(),
            other => RoutingTable::default_for(&other.pads()),
        })
    }

    /// Format every stream on a pad of the given kind starts with.
    pub fn default_format(&self, kind: PadKind) -> FrameFormat {
        match (self, kind) {
            (IpBlock::Cfa(_), PadKind::Sink) => Cfa::default_sink_format(),
            _ => FrameFormat::default(),
        }
    }

    /// Pixel code a source stream carries for a given sink code.
    pub fn source_code(&self, sink: MbusCode) -> MbusCode {
        match self {
            IpBlock::Cfa(_) => Cfa::source_code(sink),
            _ => sink,
        }
    }

    fn hooks(&self) -> Option<&dyn StreamingHooks> {
        match self {
            IpBlock::Switch(sw) => Some(sw),
            IpBlock::AxisSwitch(sw) => Some(sw),
            IpBlock::Cfa(cfa) => Some(cfa),
            IpBlock::Cresample(cresample) => Some(cresample),
            IpBlock::Hls(hls) => Some(hls),
            IpBlock::Csi2Rx(csi) => Some(csi),
            IpBlock::Sensor(sensor) => Some(sensor),
            IpBlock::Passthrough { .. } => None,
            IpBlock::Custom { hooks, .. } => Some(hooks.as_ref()),
        }
    }

    /// Returns `true` if the block programs hardware on stream changes.
    pub fn has_hooks(&self) -> bool {
        self.hooks().is_some()
    }

    pub(crate) fn enable_streams(
        &self,
        ctx: &HookContext<'_>,
        pad: u32,
        streams: StreamMask,
    ) -> Result<()> {
        self.hooks()
            .map_or(Ok(()), |hooks| hooks.enable_streams(ctx, pad, streams))
    }

    pub(crate) fn disable_streams(
        &self,
        ctx: &HookContext<'_>,
        pad: u32,
        streams: StreamMask,
    ) -> Result<()> {
        self.hooks()
            .map_or(Ok(()), |hooks| hooks.disable_streams(ctx, pad, streams))
    }
}

impl fmt::Debug for IpBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IpBlock").field(&self.kind_name()).finish()
    }
}

fn sinks_then_sources(sinks: u32, sources: u32) -> Vec<PadKind> {
    let mut pads = vec![PadKind::Sink; sinks as usize];
    pads.extend(std::iter::repeat_n(PadKind::Source, sources as usize));
    pads
}

/// Programs the active frame size from a sink format.
fn set_frame_size(regs: &dyn RegisterIo, format: &FrameFormat) {
    regs.write(ACTIVE_SIZE, active_size(format.width, format.height));
}

/// Sets the soft enable bit and latches the shadow registers.
fn start_core(regs: &dyn RegisterIo) {
    regs.set(CTRL_CONTROL, CTRL_CONTROL_SW_ENABLE | CTRL_CONTROL_REG_UPDATE);
}

fn stop_core(regs: &dyn RegisterIo) {
    regs.clr(CTRL_CONTROL, CTRL_CONTROL_SW_ENABLE);
}

/// Polls `ready` until it returns `true`, sleeping `delay` between polls.
///
/// `ready` is evaluated at most `attempts + 1` times.
///
/// # Errors
///
/// Returns [`Error::HardwareTimeout`] naming `what` when every poll failed.
pub(crate) fn poll_until(
    what: &str,
    attempts: u32,
    delay: Duration,
    mut ready: impl FnMut() -> bool,
) -> Result<()> {
    for attempt in 0..=attempts {
        if ready() {
            trace!(what, attempt, "ready");
            return Ok(());
        }
        if attempt < attempts {
            thread::sleep(delay);
        }
    }
    Err(Error::HardwareTimeout {
        what: what.to_owned(),
        attempts,
    })
}
