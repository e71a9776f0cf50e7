// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use xvip_sys::{
    RegisterIo,
    regs::cfa::{
        BAYER_PHASE, BAYER_PHASE_BGGR, BAYER_PHASE_GBRG, BAYER_PHASE_GRBG, BAYER_PHASE_RGGB,
    },
};

use super::{HookContext, StreamingHooks, set_frame_size, start_core, stop_core};
use crate::{
    Error, Result,
    format::{FrameFormat, MbusCode},
    stream::StreamMask,
};

const SINK: u32 = 0;

/// Color filter array interpolation (demosaic), Bayer in, RGB out.
pub struct Cfa {
    regs: Arc<dyn RegisterIo>,
}

impl Cfa {
    pub fn new(regs: Arc<dyn RegisterIo>) -> Self {
        Self { regs }
    }

    pub(crate) fn default_sink_format() -> FrameFormat {
        FrameFormat {
            code: MbusCode::SRGGB8_1X8,
            ..FrameFormat::default()
        }
    }

    pub(crate) fn source_code(sink: MbusCode) -> MbusCode {
        if sink.is_bayer() {
            MbusCode::RGB888_1X24
        } else {
            sink
        }
    }

    /// Maps a Bayer media bus code to the core's phase register value.
    pub fn bayer_phase(code: MbusCode) -> Option<u32> {
        match code {
            MbusCode::SRGGB8_1X8 => Some(BAYER_PHASE_RGGB),
            MbusCode::SGRBG8_1X8 => Some(BAYER_PHASE_GRBG),
            MbusCode::SGBRG8_1X8 => Some(BAYER_PHASE_GBRG),
            MbusCode::SBGGR8_1X8 => Some(BAYER_PHASE_BGGR),
            _ => None,
        }
    }
}

impl StreamingHooks for Cfa {
    fn enable_streams(&self, ctx: &HookContext<'_>, _pad: u32, _streams: StreamMask) -> Result<()> {
        let format = ctx.format(SINK, 0)?;
        let phase = Self::bayer_phase(format.code).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "{}: sink code {:?} is not a Bayer pattern",
                ctx.entity, format.code
            ))
        })?;

        self.regs.write(BAYER_PHASE, phase);
        set_frame_size(self.regs.as_ref(), &format);
        start_core(self.regs.as_ref());
        Ok(())
    }

    fn disable_streams(&self, _ctx: &HookContext<'_>, _pad: u32, _streams: StreamMask) -> Result<()> {
        stop_core(self.regs.as_ref());
        Ok(())
    }
}
