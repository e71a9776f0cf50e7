// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tracing::{debug, error};
use xvip_sys::{
    RegisterIo,
    regs::csi2rx::{
        CCR, CCR_ENABLE, CCR_SOFTRESET, CSR, CSR_RIPCD, GIER, GIER_GIE, IER, IER_INTR_MASK,
    },
};

use super::{HookContext, StreamingHooks, poll_until};
use crate::{
    Error, Result, lock,
    routing::{Route, RoutingTable},
    stream::StreamMask,
};

const SINK: u32 = 0;
const SOURCE: u32 = 1;

/// MIPI CSI-2 receiver subsystem.
///
/// The core runs as long as at least one stream (virtual channel) is enabled
/// on its source pad. The first stream starts it, the last one stops it.
pub struct Csi2Rx {
    regs: Arc<dyn RegisterIo>,
    enabled_source_streams: Mutex<StreamMask>,
}

impl Csi2Rx {
    pub fn new(regs: Arc<dyn RegisterIo>) -> Self {
        Self {
            regs,
            enabled_source_streams: Mutex::new(StreamMask::EMPTY),
        }
    }

    /// A single stream from the sink to the source pad; virtual channels can
    /// be remapped freely afterwards.
    pub(crate) fn default_routing() -> RoutingTable {
        RoutingTable::from_routes(vec![Route::new(SINK, 0, SOURCE, 0)])
    }

    /// Streams currently flowing out of the receiver.
    pub fn enabled_source_streams(&self) -> StreamMask {
        *lock(&self.enabled_source_streams)
    }

    fn soft_reset(&self, attempts: u32) -> Result<()> {
        self.regs.set(CCR, CCR_SOFTRESET);
        poll_until("csi2rx soft reset", attempts, Duration::from_micros(1), || {
            self.regs.read(CSR) & CSR_RIPCD == 0
        })?;
        self.regs.clr(CCR, CCR_SOFTRESET);
        Ok(())
    }

    fn start(&self, ctx: &HookContext<'_>) -> Result<()> {
        self.regs.set(CCR, CCR_ENABLE);

        if let Err(err) = self.soft_reset(ctx.config.reset_timeout_us) {
            error!(entity = ctx.entity, "soft reset timed out");
            self.regs.clr(CCR, CCR_ENABLE);
            return Err(err);
        }

        self.regs.clr(GIER, GIER_GIE);
        self.regs.write(IER, IER_INTR_MASK);
        self.regs.set(GIER, GIER_GIE);
        Ok(())
    }

    fn stop(&self) {
        self.regs.clr(IER, IER_INTR_MASK);
        self.regs.clr(GIER, GIER_GIE);
        self.regs.clr(CCR, CCR_ENABLE);
    }
}

fn check_source_pad(ctx: &HookContext<'_>, pad: u32) -> Result<()> {
    if pad != SOURCE {
        return Err(Error::InvalidArgument(format!(
            "{}: streams can only be controlled on the source pad, not pad {pad}",
            ctx.entity
        )));
    }
    Ok(())
}

impl StreamingHooks for Csi2Rx {
    fn enable_streams(&self, ctx: &HookContext<'_>, pad: u32, streams: StreamMask) -> Result<()> {
        check_source_pad(ctx, pad)?;

        let mut enabled = lock(&self.enabled_source_streams);
        if enabled.is_empty() {
            debug!(entity = ctx.entity, "starting receiver");
            self.start(ctx)?;
        }
        *enabled |= streams;
        Ok(())
    }

    fn disable_streams(&self, ctx: &HookContext<'_>, pad: u32, streams: StreamMask) -> Result<()> {
        check_source_pad(ctx, pad)?;

        let mut enabled = lock(&self.enabled_source_streams);
        if !enabled.is_empty() && (*enabled - streams).is_empty() {
            debug!(entity = ctx.entity, "stopping receiver");
            self.stop();
        }
        *enabled -= streams;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use xvip_sys::{MemoryRegisters, TraceLog};

    use super::*;
    use crate::{config::PipelineConfig, graph::PadKind};

    fn with_ctx(config: &PipelineConfig, f: impl FnOnce(&HookContext<'_>)) {
        let pads = [PadKind::Sink, PadKind::Source];
        let formats = BTreeMap::new();
        let enabled = [StreamMask::EMPTY; 2];
        let ctx = HookContext {
            entity: "csi2rx",
            pads: &pads,
            routing: None,
            formats: &formats,
            enabled: &enabled,
            config,
        };
        f(&ctx);
    }

    #[test]
    fn core_runs_while_any_virtual_channel_is_enabled() {
        let regs = Arc::new(MemoryRegisters::new("csi2rx", TraceLog::new()));
        let csi = Csi2Rx::new(regs.clone());
        with_ctx(&PipelineConfig::default(), |ctx| {
            let vc0 = StreamMask::from_bits(0b01);
            let vc1 = StreamMask::from_bits(0b10);
            csi.enable_streams(ctx, SOURCE, vc0).unwrap();
            csi.enable_streams(ctx, SOURCE, vc1).unwrap();
            assert_eq!(regs.peek(CCR), CCR_ENABLE);
            assert_eq!(regs.peek(IER), IER_INTR_MASK);

            csi.disable_streams(ctx, SOURCE, vc0).unwrap();
            assert_eq!(regs.peek(CCR), CCR_ENABLE);
            csi.disable_streams(ctx, SOURCE, vc1).unwrap();
            assert_eq!(regs.peek(CCR), 0);
            assert_eq!(regs.peek(GIER), 0);
            assert!(csi.enabled_source_streams().is_empty());
        });
    }

    #[test]
    fn reset_timeout_disables_core() {
        let regs = Arc::new(MemoryRegisters::new("csi2rx", TraceLog::new()));
        regs.poke(CSR, CSR_RIPCD);
        let csi = Csi2Rx::new(regs.clone());
        let config = PipelineConfig {
            reset_timeout_us: 5,
            ..Default::default()
        };
        with_ctx(&config, |ctx| {
            let err = csi
                .enable_streams(ctx, SOURCE, StreamMask::from_bits(1))
                .unwrap_err();
            assert!(matches!(err, Error::HardwareTimeout { attempts: 5, .. }));
            assert_eq!(regs.peek(CCR) & CCR_ENABLE, 0);
            assert!(csi.enabled_source_streams().is_empty());
        });
    }

    #[test]
    fn sink_pad_is_refused() {
        let regs = Arc::new(MemoryRegisters::new("csi2rx", TraceLog::new()));
        let csi = Csi2Rx::new(regs);
        with_ctx(&PipelineConfig::default(), |ctx| {
            assert!(matches!(
                csi.enable_streams(ctx, SINK, StreamMask::from_bits(1)),
                Err(Error::InvalidArgument(_))
            ));
        });
    }
}
