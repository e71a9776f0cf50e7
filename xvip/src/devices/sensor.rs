// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, thread, time::Duration};

use tracing::{debug, error};
use xvip_sys::{
    RegisterIo,
    regs::max96705::{CLINKEN, FWDCCEN, INPUT_STATUS, MAIN_CONTROL, PCLKDET, REVCCEN, SEREN},
};

use super::{HookContext, StreamingHooks, poll_until};
use crate::{Result, stream::StreamMask};

const PCLK_POLL_DELAY: Duration = Duration::from_micros(50);

/// The reverse control channel drops for a while after the forward link
/// changes state; register writes issued too early get corrupted.
const LINK_SETTLE_DELAY: Duration = Duration::from_millis(5);

/// Camera module behind a MAX96705 GMSL serializer.
///
/// Streaming is controlled through the serializer: the serial link is
/// enabled once the sensor's pixel clock is detected, and put back in
/// configuration mode when streaming stops.
pub struct GmslSensor {
    serializer: Arc<dyn RegisterIo>,
}

impl GmslSensor {
    pub fn new(serializer: Arc<dyn RegisterIo>) -> Self {
        Self { serializer }
    }

    fn set_serial_link(&self, ctx: &HookContext<'_>, enable: bool) -> Result<()> {
        let mut value = REVCCEN | FWDCCEN;
        if enable {
            poll_until(
                "serializer pixel clock",
                ctx.config.pclk_detect_attempts,
                PCLK_POLL_DELAY,
                || self.serializer.read(INPUT_STATUS) & PCLKDET != 0,
            )
            .inspect_err(|_| error!(entity = ctx.entity, "unable to detect valid pixel clock"))?;
            value |= SEREN;
        } else {
            value |= CLINKEN;
        }

        self.serializer.write(MAIN_CONTROL, value);
        thread::sleep(LINK_SETTLE_DELAY);
        Ok(())
    }
}

impl StreamingHooks for GmslSensor {
    fn enable_streams(&self, ctx: &HookContext<'_>, pad: u32, streams: StreamMask) -> Result<()> {
        if !ctx.is_idle() {
            return Ok(());
        }
        debug!(entity = ctx.entity, pad, %streams, "enabling serial link");
        self.set_serial_link(ctx, true)
    }

    fn disable_streams(&self, ctx: &HookContext<'_>, pad: u32, streams: StreamMask) -> Result<()> {
        if !ctx.is_last(pad, streams) {
            return Ok(());
        }
        debug!(entity = ctx.entity, pad, %streams, "disabling serial link");
        self.set_serial_link(ctx, false)
    }
}
