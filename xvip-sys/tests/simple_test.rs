// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Smoke test for the public register access surface.

use xvip_sys::{MemoryRegisters, RegisterIo, TraceEvent, TraceLog, regs};

/// Verifies that writes through the trait object land in the shared trace.
#[test]
fn writes_are_traced_through_trait_objects() {
    let log = TraceLog::new();
    let regs: Box<dyn RegisterIo> = Box::new(MemoryRegisters::new("hls", log.clone()));
    regs.write(regs::hls::REG_COLS, 1920);
    regs.write(
        regs::vip::CTRL_CONTROL,
        regs::hls::REG_CTRL_AUTO_RESTART | regs::vip::CTRL_CONTROL_SW_ENABLE,
    );

    let events = log.events();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        TraceEvent::Write {
            device: "hls".into(),
            offset: regs::vip::CTRL_CONTROL,
            value: 0x81,
        }
    );
    println!("{}", events[0]);
}
