// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Simulated hardware.
//!
//! [`SimulatedBackend`] binds every entity of a [`crate::graphdef::GraphDef`]
//! to in-memory registers and [`RecordingChannel`]s sharing one
//! [`TraceLog`], so the exact order of register writes and DMA starts can be
//! inspected after the fact.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::trace;
use xvip_sys::{
    MemoryRegisters, RegisterIo, TraceLog,
    regs::max96705::{INPUT_STATUS, PCLKDET},
};

use crate::{
    DeviceBackend, Error, Result,
    dma::{DmaChannel, DmaDirection},
    graphdef::{BlockDef, EntityDef},
    lock,
};

/// A DMA channel recording `start` and `stop` actions.
pub struct RecordingChannel {
    name: String,
    log: TraceLog,
    fail_start: AtomicBool,
}

impl RecordingChannel {
    pub fn new(name: impl Into<String>, log: TraceLog) -> Self {
        Self {
            name: name.into(),
            log,
            fail_start: AtomicBool::new(false),
        }
    }

    /// Makes the next starts fail with [`Error::Io`] until reset.
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::Relaxed);
    }
}

impl DmaChannel for RecordingChannel {
    fn start(&self) -> Result<()> {
        if self.fail_start.load(Ordering::Relaxed) {
            return Err(Error::Io(format!("{}: channel refused to start", self.name)));
        }
        trace!(channel = %self.name, "start");
        self.log.action(&self.name, "start");
        Ok(())
    }

    fn stop(&self) {
        trace!(channel = %self.name, "stop");
        self.log.action(&self.name, "stop");
    }
}

/// Backend creating simulated registers and channels on demand.
///
/// Sensors come up with their pixel clock detected.
#[derive(Default)]
pub struct SimulatedBackend {
    log: TraceLog,
    registers: Mutex<HashMap<String, Arc<MemoryRegisters>>>,
    channels: Mutex<HashMap<String, Arc<RecordingChannel>>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The log every register file and channel records into.
    pub fn log(&self) -> &TraceLog {
        &self.log
    }

    /// Registers created for the named entity.
    pub fn registers_of(&self, name: &str) -> Option<Arc<MemoryRegisters>> {
        lock(&self.registers).get(name).cloned()
    }

    /// Channel created for the named DMA engine.
    pub fn channel_of(&self, name: &str) -> Option<Arc<RecordingChannel>> {
        lock(&self.channels).get(name).cloned()
    }
}

impl DeviceBackend for SimulatedBackend {
    fn registers(&self, entity: &EntityDef) -> Result<Arc<dyn RegisterIo>> {
        let regs = Arc::new(MemoryRegisters::new(entity.name.as_str(), self.log.clone()));
        if entity.kind == BlockDef::Sensor {
            regs.poke(INPUT_STATUS, PCLKDET);
        }
        lock(&self.registers).insert(entity.name.clone(), regs.clone());
        Ok(regs)
    }

    fn dma_channel(
        &self,
        entity: &EntityDef,
        _direction: DmaDirection,
    ) -> Result<Box<dyn DmaChannel>> {
        let channel = Arc::new(RecordingChannel::new(entity.name.as_str(), self.log.clone()));
        lock(&self.channels).insert(entity.name.clone(), channel.clone());
        Ok(Box::new(channel))
    }
}

#[cfg(test)]
mod tests {
    use xvip_sys::TraceEvent;

    use super::*;

    #[test]
    fn channel_records_actions_until_told_to_fail() {
        let log = TraceLog::new();
        let channel = RecordingChannel::new("vdma", log.clone());
        channel.start().unwrap();
        channel.set_fail_start(true);
        assert!(matches!(channel.start(), Err(Error::Io(_))));
        channel.stop();

        assert_eq!(
            log.events(),
            vec![
                TraceEvent::Action {
                    device: "vdma".into(),
                    action: "start".into()
                },
                TraceEvent::Action {
                    device: "vdma".into(),
                    action: "stop".into()
                },
            ]
        );
    }
}
