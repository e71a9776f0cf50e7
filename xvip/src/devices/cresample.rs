// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use xvip_sys::RegisterIo;

use super::{HookContext, StreamingHooks, set_frame_size, start_core, stop_core};
use crate::{Result, stream::StreamMask};

/// Chroma resampler.
pub struct Cresample {
    regs: Arc<dyn RegisterIo>,
}

impl Cresample {
    pub fn new(regs: Arc<dyn RegisterIo>) -> Self {
        Self { regs }
    }
}

impl StreamingHooks for Cresample {
    fn enable_streams(&self, ctx: &HookContext<'_>, _pad: u32, _streams: StreamMask) -> Result<()> {
        set_frame_size(self.regs.as_ref(), &ctx.format(0, 0)?);
        start_core(self.regs.as_ref());
        Ok(())
    }

    fn disable_streams(&self, _ctx: &HookContext<'_>, _pad: u32, _streams: StreamMask) -> Result<()> {
        stop_core(self.regs.as_ref());
        Ok(())
    }
}
