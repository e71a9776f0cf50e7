// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tracing::debug;
use xvip_sys::{
    RegisterIo,
    regs::axis_switch::{
        CTRL, CTRL_REG_UPDATE, MAX_SINKS, MAX_SOURCES, MI_MUX_DISABLE, MIN_SINKS, MIN_SOURCES,
        mi_mux,
    },
};

use super::{HookContext, StreamingHooks};
use crate::{Error, Result, routing::RoutingRestriction, stream::StreamMask};

/// AXI4-Stream switch.
///
/// In register routing mode each master port has a mux register selecting
/// its slave port. In TDEST routing mode the packets carry their own
/// destination and nothing is programmed.
pub struct AxisSwitch {
    regs: Arc<dyn RegisterIo>,
    num_sinks: u32,
    num_sources: u32,
    tdest_routing: bool,
}

impl AxisSwitch {
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for port counts outside `1..=16`,
    /// or for more than one sink in TDEST routing mode.
    pub fn new(
        regs: Arc<dyn RegisterIo>,
        num_sinks: u32,
        num_sources: u32,
        tdest_routing: bool,
    ) -> Result<Self> {
        if !(MIN_SINKS..=MAX_SINKS).contains(&num_sinks)
            || !(MIN_SOURCES..=MAX_SOURCES).contains(&num_sources)
        {
            return Err(Error::InvalidArgument(format!(
                "axis switch supports 1 to 16 ports per side, got {num_sinks}x{num_sources}"
            )));
        }
        if tdest_routing && num_sinks > 1 {
            return Err(Error::InvalidArgument(format!(
                "axis switch supports 1 sink in TDEST routing mode, got {num_sinks}"
            )));
        }
        Ok(Self {
            regs,
            num_sinks,
            num_sources,
            tdest_routing,
        })
    }

    pub fn num_sinks(&self) -> u32 {
        self.num_sinks
    }

    pub fn num_sources(&self) -> u32 {
        self.num_sources
    }

    pub fn tdest_routing(&self) -> bool {
        self.tdest_routing
    }

    /// TDEST routes can't be checked against the hardware, only fan-out is
    /// refused. Register routes map one stream to one stream.
    pub fn restriction(&self) -> RoutingRestriction {
        if self.tdest_routing {
            RoutingRestriction::NO_1_TO_N
        } else {
            RoutingRestriction::ONLY_1_TO_1 | RoutingRestriction::NO_STREAM_MIX
        }
    }

    fn disable_all(&self) {
        for source in 0..self.num_sources {
            self.regs.write(mi_mux(source), MI_MUX_DISABLE);
        }
        self.regs.write(CTRL, CTRL_REG_UPDATE);
    }
}

impl StreamingHooks for AxisSwitch {
    fn enable_streams(&self, ctx: &HookContext<'_>, pad: u32, streams: StreamMask) -> Result<()> {
        if self.tdest_routing {
            return Ok(());
        }

        debug!(entity = ctx.entity, pad, %streams, "programming axis switch muxes");

        // Several streams may leave through one master port; program it once.
        let mut unused_sources: u32 = (1 << self.num_sources) - 1;
        for route in ctx.routing.into_iter().flat_map(|table| table.active()) {
            let source = route.source_pad - self.num_sinks;
            if unused_sources & (1 << source) == 0 {
                continue;
            }
            self.regs.write(mi_mux(source), route.sink_pad);
            unused_sources &= !(1 << source);
        }
        for source in (0..self.num_sources).filter(|s| unused_sources & (1 << s) != 0) {
            self.regs.write(mi_mux(source), MI_MUX_DISABLE);
        }

        self.regs.write(CTRL, CTRL_REG_UPDATE);
        Ok(())
    }

    fn disable_streams(&self, ctx: &HookContext<'_>, pad: u32, streams: StreamMask) -> Result<()> {
        if self.tdest_routing || !ctx.is_last(pad, streams) {
            return Ok(());
        }
        self.disable_all();
        Ok(())
    }
}
