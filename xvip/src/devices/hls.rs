// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use xvip_sys::{
    RegisterIo,
    regs::{
        hls::{REG_COLS, REG_CTRL_AUTO_RESTART, REG_ROWS},
        vip::{CTRL_CONTROL, CTRL_CONTROL_SW_ENABLE},
    },
};

use super::{HookContext, StreamingHooks};
use crate::{Result, stream::StreamMask};

/// Core generated by Vivado HLS.
///
/// Unlike the other cores it takes the frame size as separate column and
/// row registers and runs in auto-restart mode.
pub struct Hls {
    regs: Arc<dyn RegisterIo>,
}

impl Hls {
    pub fn new(regs: Arc<dyn RegisterIo>) -> Self {
        Self { regs }
    }
}

impl StreamingHooks for Hls {
    fn enable_streams(&self, ctx: &HookContext<'_>, _pad: u32, _streams: StreamMask) -> Result<()> {
        let format = ctx.format(0, 0)?;
        self.regs.write(REG_COLS, format.width);
        self.regs.write(REG_ROWS, format.height);
        self.regs
            .write(CTRL_CONTROL, REG_CTRL_AUTO_RESTART | CTRL_CONTROL_SW_ENABLE);
        Ok(())
    }

    fn disable_streams(&self, _ctx: &HookContext<'_>, _pad: u32, _streams: StreamMask) -> Result<()> {
        self.regs.write(CTRL_CONTROL, 0);
        Ok(())
    }
}
