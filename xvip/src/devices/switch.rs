// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tracing::debug;
use xvip_sys::{
    RegisterIo,
    regs::{
        switch::{CORE_CH_CTRL, CORE_CH_CTRL_FORCE, MAX_PORTS},
        vip::{CTRL_CONTROL, CTRL_CONTROL_SW_ENABLE},
    },
};

use super::{HookContext, StreamingHooks};
use crate::{Error, Result, routing::RoutingRestriction, stream::StreamMask};

/// Video switch: a crossbar selecting one input per output.
///
/// The channel control register holds one 4-bit selector per output. Every
/// output must be driven, so outputs without an active route are fed from
/// the lowest input no route uses.
///
/// Fanning one input out to several outputs is a valid route, but each
/// output branch enables the same upstream stream. A synchronous pipeline
/// therefore fails to start with [`Error::InvalidArgument`] as soon as
/// another subdevice sits upstream of the fan-out.
pub struct VideoSwitch {
    regs: Arc<dyn RegisterIo>,
    num_sinks: u32,
    num_sources: u32,
}

impl VideoSwitch {
    pub const RESTRICTION: RoutingRestriction =
        RoutingRestriction::NO_N_TO_1.union(RoutingRestriction::NO_STREAM_MIX);

    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless both port counts are in
    /// `1..=8`.
    pub fn new(regs: Arc<dyn RegisterIo>, num_sinks: u32, num_sources: u32) -> Result<Self> {
        for (what, count) in [("sinks", num_sinks), ("sources", num_sources)] {
            if count == 0 || count > MAX_PORTS {
                return Err(Error::InvalidArgument(format!(
                    "video switch supports 1 to {MAX_PORTS} {what}, got {count}"
                )));
            }
        }
        Ok(Self {
            regs,
            num_sinks,
            num_sources,
        })
    }

    pub fn num_sinks(&self) -> u32 {
        self.num_sinks
    }

    pub fn num_sources(&self) -> u32 {
        self.num_sources
    }

    fn channel_control(&self, ctx: &HookContext<'_>) -> u32 {
        let mut routing = 0;
        let mut unused_inputs: u32 = 0xff;
        let mut unused_outputs: u32 = (1 << self.num_sources) - 1;

        for route in ctx.routing.into_iter().flat_map(|table| table.active()) {
            let output = route.source_pad - self.num_sinks;
            routing |= (CORE_CH_CTRL_FORCE | route.sink_pad) << (output * 4);
            unused_inputs &= !(1 << route.sink_pad);
            unused_outputs &= !(1 << output);
        }

        // With all 8 inputs in use there is no unused output either.
        let unused_input = if unused_inputs != 0 {
            unused_inputs.trailing_zeros()
        } else {
            0
        };
        for output in (0..MAX_PORTS).filter(|o| unused_outputs & (1 << o) != 0) {
            routing |= (CORE_CH_CTRL_FORCE | unused_input) << (output * 4);
        }
        routing
    }
}

impl StreamingHooks for VideoSwitch {
    fn enable_streams(&self, ctx: &HookContext<'_>, pad: u32, streams: StreamMask) -> Result<()> {
        let routing = self.channel_control(ctx);
        debug!(entity = ctx.entity, pad, %streams, routing = format_args!("{routing:#010x}"), "programming switch");
        self.regs.write(CORE_CH_CTRL, routing);
        self.regs.write(
            CTRL_CONTROL,
            (((1 << self.num_sources) - 1) << 4) | CTRL_CONTROL_SW_ENABLE,
        );
        Ok(())
    }

    fn disable_streams(&self, ctx: &HookContext<'_>, pad: u32, streams: StreamMask) -> Result<()> {
        if ctx.is_last(pad, streams) {
            self.regs.clr(CTRL_CONTROL, CTRL_CONTROL_SW_ENABLE);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use xvip_sys::{MemoryRegisters, TraceLog};

    use super::*;
    use crate::{
        config::PipelineConfig,
        graph::PadKind,
        routing::{Route, RoutingTable},
    };

    #[test]
    fn unused_outputs_take_lowest_unused_input() {
        let regs = Arc::new(MemoryRegisters::new("xsw", TraceLog::new()));
        let sw = VideoSwitch::new(regs.clone(), 2, 3).unwrap();
        let pads = [PadKind::Sink, PadKind::Sink, PadKind::Source, PadKind::Source, PadKind::Source];
        let table = RoutingTable::from_routes(vec![Route::new(0, 0, 3, 0)]);
        let formats = BTreeMap::new();
        let enabled = [StreamMask::EMPTY; 5];
        let config = PipelineConfig::default();
        let ctx = HookContext {
            entity: "xsw",
            pads: &pads,
            routing: Some(&table),
            formats: &formats,
            enabled: &enabled,
            config: &config,
        };

        sw.enable_streams(&ctx, 3, StreamMask::from_bits(1)).unwrap();

        // Output 1 <- input 0, outputs 0 and 2 <- input 1.
        let mut expected = CORE_CH_CTRL_FORCE << 4;
        for output in [0, 2] {
            expected |= (CORE_CH_CTRL_FORCE | 1) << (output * 4);
        }
        assert_eq!(regs.peek(CORE_CH_CTRL), expected);
        assert_eq!(regs.peek(CTRL_CONTROL), (0b111 << 4) | CTRL_CONTROL_SW_ENABLE);

        sw.disable_streams(&ctx, 3, StreamMask::from_bits(1)).unwrap();
        assert_eq!(regs.peek(CTRL_CONTROL) & CTRL_CONTROL_SW_ENABLE, 0);
    }

    #[test]
    fn port_count_is_bounded() {
        let regs = Arc::new(MemoryRegisters::new("xsw", TraceLog::new()));
        assert!(VideoSwitch::new(regs.clone(), 9, 1).is_err());
        assert!(VideoSwitch::new(regs, 1, 0).is_err());
    }
}
