// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use xvip::{
    DmaDirection, MediaDevice, MediaDeviceBuilder, Result,
    config::PipelineConfig,
    devices::{AxisSwitch, Cfa, Cresample, Csi2Rx, GmslSensor, HookContext, Hls, IpBlock, StreamingHooks},
    graph::{EntityId, PadKind},
    routing::Route,
    sim::RecordingChannel,
    stream::StreamMask,
};
use xvip_sys::{
    MemoryRegisters, TraceLog,
    regs::max96705::{INPUT_STATUS, PCLKDET},
};

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

/// Initializes logging (respects RUST_LOG, INFO by default).
pub fn setup_test() {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with_test_writer()
            .init();
    });
}

pub fn registers(name: &str, log: &TraceLog) -> Arc<MemoryRegisters> {
    Arc::new(MemoryRegisters::new(name, log.clone()))
}

pub fn add_dma(
    builder: &mut MediaDeviceBuilder,
    log: &TraceLog,
    name: &str,
    direction: DmaDirection,
) -> (EntityId, Arc<RecordingChannel>) {
    let channel = Arc::new(RecordingChannel::new(name, log.clone()));
    let id = builder
        .add_dma(name, direction, Box::new(channel.clone()))
        .unwrap();
    (id, channel)
}

/// Names of the devices in the log, consecutive duplicates collapsed.
pub fn device_order(log: &TraceLog) -> Vec<String> {
    let mut order: Vec<String> = log.events().iter().map(|e| e.device().to_owned()).collect();
    order.dedup();
    order
}

/// Legacy block recording its hook calls, optionally failing them.
pub struct ProbeBlock {
    name: String,
    log: TraceLog,
    pub fail_enable: AtomicBool,
    pub fail_disable: AtomicBool,
}

impl ProbeBlock {
    pub fn new(name: &str, log: &TraceLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            log: log.clone(),
            fail_enable: AtomicBool::new(false),
            fail_disable: AtomicBool::new(false),
        })
    }

    pub fn block(self: &Arc<Self>) -> IpBlock {
        IpBlock::Custom {
            pads: vec![PadKind::Sink, PadKind::Source],
            restriction: None,
            hooks: Box::new(ProbeHooks(self.clone())),
        }
    }
}

struct ProbeHooks(Arc<ProbeBlock>);

impl StreamingHooks for ProbeHooks {
    fn enable_streams(&self, _ctx: &HookContext<'_>, _pad: u32, _streams: StreamMask) -> Result<()> {
        if self.0.fail_enable.load(Ordering::Relaxed) {
            return Err(xvip::Error::Io(format!("{}: enable fault", self.0.name)));
        }
        self.0.log.action(&self.0.name, "enable");
        Ok(())
    }

    fn disable_streams(&self, _ctx: &HookContext<'_>, _pad: u32, _streams: StreamMask) -> Result<()> {
        self.0.log.action(&self.0.name, "disable");
        if self.0.fail_disable.load(Ordering::Relaxed) {
            return Err(xvip::Error::Io(format!("{}: disable fault", self.0.name)));
        }
        Ok(())
    }
}

/// `input` DMA → cresample → `middle` → hls → `output` DMA.
pub struct Linear {
    pub device: MediaDevice,
    pub log: TraceLog,
    pub input: EntityId,
    pub output: EntityId,
    pub cresample: EntityId,
    pub middle: EntityId,
    pub hls: EntityId,
    pub probe: Arc<ProbeBlock>,
    pub input_channel: Arc<RecordingChannel>,
    pub output_channel: Arc<RecordingChannel>,
}

impl Linear {
    pub fn new(config: PipelineConfig) -> Self {
        let log = TraceLog::new();
        let mut builder = MediaDevice::builder(config);

        let (input, input_channel) = add_dma(&mut builder, &log, "input", DmaDirection::Input);
        let cresample = builder
            .add_subdev(
                "cresample",
                IpBlock::Cresample(Cresample::new(registers("cresample", &log))),
            )
            .unwrap();
        let probe = ProbeBlock::new("probe", &log);
        let middle = builder.add_subdev("probe", probe.block()).unwrap();
        let hls = builder
            .add_subdev("hls", IpBlock::Hls(Hls::new(registers("hls", &log))))
            .unwrap();
        let (output, output_channel) = add_dma(&mut builder, &log, "output", DmaDirection::Output);

        builder.link((input, 0), (cresample, 0)).unwrap();
        builder.link((cresample, 1), (middle, 0)).unwrap();
        builder.link((middle, 1), (hls, 0)).unwrap();
        builder.link((hls, 1), (output, 0)).unwrap();

        Self {
            device: builder.build(),
            log,
            input,
            output,
            cresample,
            middle,
            hls,
            probe,
            input_channel,
            output_channel,
        }
    }
}

/// A camera on a CSI-2 receiver whose two virtual channels are split by a
/// TDEST-routed AXI4-Stream switch into two demosaic branches, each ending
/// in its own output DMA engine.
pub struct TwoBranches {
    pub device: MediaDevice,
    pub log: TraceLog,
    pub sensor_regs: Arc<MemoryRegisters>,
    pub csi_regs: Arc<MemoryRegisters>,
    pub cfa_a_regs: Arc<MemoryRegisters>,
    pub cfa_b_regs: Arc<MemoryRegisters>,
    pub csi: EntityId,
    pub switch: EntityId,
    pub dma_a: EntityId,
    pub dma_b: EntityId,
}

impl TwoBranches {
    pub fn new(config: PipelineConfig) -> Self {
        let log = TraceLog::new();
        let sensor_regs = registers("sensor", &log);
        sensor_regs.poke(INPUT_STATUS, PCLKDET);
        let csi_regs = registers("csi2rx", &log);
        let cfa_a_regs = registers("cfa_a", &log);
        let cfa_b_regs = registers("cfa_b", &log);

        let mut builder = MediaDevice::builder(config);
        let sensor = builder
            .add_subdev("sensor", IpBlock::Sensor(GmslSensor::new(sensor_regs.clone())))
            .unwrap();
        let csi = builder
            .add_subdev("csi2rx", IpBlock::Csi2Rx(Csi2Rx::new(csi_regs.clone())))
            .unwrap();
        let switch = builder
            .add_subdev(
                "switch",
                IpBlock::AxisSwitch(
                    AxisSwitch::new(registers("switch", &log), 1, 2, true).unwrap(),
                ),
            )
            .unwrap();
        let cfa_a = builder
            .add_subdev("cfa_a", IpBlock::Cfa(Cfa::new(cfa_a_regs.clone())))
            .unwrap();
        let cfa_b = builder
            .add_subdev("cfa_b", IpBlock::Cfa(Cfa::new(cfa_b_regs.clone())))
            .unwrap();
        let (dma_a, _) = add_dma(&mut builder, &log, "dma_a", DmaDirection::Output);
        let (dma_b, _) = add_dma(&mut builder, &log, "dma_b", DmaDirection::Output);

        builder.link((sensor, 0), (csi, 0)).unwrap();
        builder.link((csi, 1), (switch, 0)).unwrap();
        builder.link((switch, 1), (cfa_a, 0)).unwrap();
        builder.link((switch, 2), (cfa_b, 0)).unwrap();
        builder.link((cfa_a, 1), (dma_a, 0)).unwrap();
        builder.link((cfa_b, 1), (dma_b, 0)).unwrap();

        let device = builder.build();
        device
            .set_routing(csi, vec![Route::new(0, 0, 1, 0), Route::new(0, 1, 1, 1)])
            .unwrap();
        device
            .set_routing(switch, vec![Route::new(0, 0, 1, 0), Route::new(0, 1, 2, 0)])
            .unwrap();

        Self {
            device,
            log,
            sensor_regs,
            csi_regs,
            cfa_a_regs,
            cfa_b_regs,
            csi,
            switch,
            dma_a,
            dma_b,
        }
    }
}
