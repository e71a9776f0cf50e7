// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Register offsets and field masks, one module per IP block.

use crate::{bit, genmask};

/// Registers shared by all Xilinx video IP cores.
pub mod vip {
    use super::*;

    pub const CTRL_CONTROL: u32 = 0x0000;
    pub const CTRL_CONTROL_SW_ENABLE: u32 = bit!(0);
    pub const CTRL_CONTROL_REG_UPDATE: u32 = bit!(1);
    pub const CTRL_CONTROL_BYPASS: u32 = bit!(4);
    pub const CTRL_CONTROL_TEST_PATTERN: u32 = bit!(5);
    pub const CTRL_CONTROL_FRAME_SYNC_RESET: u32 = bit!(30);
    pub const CTRL_CONTROL_SW_RESET: u32 = bit!(31);

    pub const CTRL_STATUS: u32 = 0x0004;
    pub const CTRL_ERROR: u32 = 0x0008;

    pub const ACTIVE_SIZE: u32 = 0x0020;
    pub const ACTIVE_VSIZE_SHIFT: u32 = 16;
    pub const ACTIVE_VSIZE_MASK: u32 = genmask!(28, 16);
    pub const ACTIVE_HSIZE_MASK: u32 = genmask!(12, 0);

    pub const MIN_WIDTH: u32 = 32;
    pub const MAX_WIDTH: u32 = 7680;
    pub const MIN_HEIGHT: u32 = 32;
    pub const MAX_HEIGHT: u32 = 7680;

    /// Encodes a frame size for the `ACTIVE_SIZE` register.
    pub const fn active_size(width: u32, height: u32) -> u32 {
        ((height << ACTIVE_VSIZE_SHIFT) & ACTIVE_VSIZE_MASK) | (width & ACTIVE_HSIZE_MASK)
    }
}

/// Video switch (crossbar with per-output input selection).
pub mod switch {
    use super::*;

    pub const CORE_CH_CTRL: u32 = 0x0100;
    pub const CORE_CH_CTRL_FORCE: u32 = bit!(3);
    pub const SWITCH_STATUS: u32 = 0x0104;

    /// Number of 4-bit output selector nibbles in `CORE_CH_CTRL`.
    pub const MAX_PORTS: u32 = 8;
}

/// AXI4-Stream video switch.
pub mod axis_switch {
    use super::*;

    pub const CTRL: u32 = 0x00;
    pub const CTRL_REG_UPDATE: u32 = bit!(1);

    pub const MI_MUX_BASE: u32 = 0x40;
    pub const MI_MUX_VAL_MASK: u32 = 0xf;
    pub const MI_MUX_DISABLE: u32 = bit!(31);

    pub const MIN_SINKS: u32 = 1;
    pub const MAX_SINKS: u32 = 16;
    pub const MIN_SOURCES: u32 = 1;
    pub const MAX_SOURCES: u32 = 16;

    /// Returns the offset of the mux register selecting the input of `source`.
    pub const fn mi_mux(source: u32) -> u32 {
        MI_MUX_BASE + source * 4
    }
}

/// Color filter array (demosaic).
pub mod cfa {
    pub const BAYER_PHASE: u32 = 0x100;
    pub const BAYER_PHASE_RGGB: u32 = 0;
    pub const BAYER_PHASE_GRBG: u32 = 1;
    pub const BAYER_PHASE_GBRG: u32 = 2;
    pub const BAYER_PHASE_BGGR: u32 = 3;
}

/// Chroma resampler.
pub mod cresample {
    use super::*;

    pub const ENCODING: u32 = 0x100;
    pub const ENCODING_FIELD: u32 = bit!(7);
    pub const ENCODING_CHROMA: u32 = bit!(8);
}

/// HLS-generated processing core.
pub mod hls {
    use super::*;

    pub const REG_CTRL_AUTO_RESTART: u32 = bit!(7);
    pub const REG_ROWS: u32 = 0x10;
    pub const REG_COLS: u32 = 0x18;
}

/// MIPI CSI-2 receiver subsystem.
pub mod csi2rx {
    use super::*;

    pub const CCR: u32 = 0x00;
    pub const CCR_SOFTRESET: u32 = bit!(1);
    pub const CCR_ENABLE: u32 = bit!(0);

    pub const PCR: u32 = 0x04;
    pub const PCR_MAXLANES_MASK: u32 = genmask!(4, 3);
    pub const PCR_ACTLANES_MASK: u32 = genmask!(1, 0);

    pub const CSR: u32 = 0x10;
    pub const CSR_PKTCNT: u32 = genmask!(31, 16);
    pub const CSR_SPFIFOFULL: u32 = bit!(3);
    pub const CSR_SPFIFONE: u32 = bit!(2);
    pub const CSR_SLBF: u32 = bit!(1);
    pub const CSR_RIPCD: u32 = bit!(0);

    pub const GIER: u32 = 0x20;
    pub const GIER_GIE: u32 = bit!(0);

    pub const ISR: u32 = 0x24;
    pub const IER: u32 = 0x28;

    pub const ISR_FR: u32 = bit!(31);
    pub const ISR_VCXFE: u32 = bit!(30);
    pub const ISR_YUV420: u32 = bit!(28);
    pub const ISR_SLBF: u32 = bit!(18);
    pub const ISR_STOP: u32 = bit!(17);
    pub const ISR_ALLINTR_MASK: u32 = 0xd07e_3fff;
    /// Frame-received and stop-state interrupts are too frequent to be useful.
    pub const IER_INTR_MASK: u32 = ISR_ALLINTR_MASK & !(ISR_STOP | ISR_FR);

    pub const MAX_VC: u32 = 4;
    pub const MAX_VCX: u32 = 16;
}

/// MAX96705 GMSL serializer (I2C register space).
pub mod max96705 {
    use super::*;

    pub const MAIN_CONTROL: u32 = 0x04;
    pub const SEREN: u32 = bit!(7);
    pub const CLINKEN: u32 = bit!(6);
    pub const REVCCEN: u32 = bit!(1);
    pub const FWDCCEN: u32 = bit!(0);

    pub const I2C_CONFIG: u32 = 0x0d;

    pub const INPUT_STATUS: u32 = 0x15;
    pub const PCLKDET: u32 = bit!(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_size_packs_both_dimensions() {
        assert_eq!(vip::active_size(1920, 1080), (1080 << 16) | 1920);
    }

    #[test]
    fn interrupt_mask_excludes_noisy_sources() {
        assert_eq!(csi2rx::IER_INTR_MASK & csi2rx::ISR_FR, 0);
        assert_eq!(csi2rx::IER_INTR_MASK & csi2rx::ISR_STOP, 0);
        assert_ne!(csi2rx::IER_INTR_MASK & csi2rx::ISR_SLBF, 0);
    }

    #[test]
    fn mux_registers_are_word_spaced() {
        assert_eq!(axis_switch::mi_mux(0), 0x40);
        assert_eq!(axis_switch::mi_mux(3), 0x4c);
    }
}
