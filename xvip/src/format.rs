// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Media bus frame formats.

use std::fmt;

use serde::{Deserialize, Serialize};
use xvip_sys::regs::vip::{MAX_HEIGHT, MAX_WIDTH, MIN_HEIGHT, MIN_WIDTH};

use crate::{Error, Result};

/// Media bus pixel code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MbusCode(pub u32);

impl MbusCode {
    pub const RGB888_1X24: MbusCode = MbusCode(0x100a);
    pub const UYVY8_1X16: MbusCode = MbusCode(0x200f);
    pub const SBGGR8_1X8: MbusCode = MbusCode(0x3001);
    pub const SGRBG8_1X8: MbusCode = MbusCode(0x3002);
    pub const SGBRG8_1X8: MbusCode = MbusCode(0x3013);
    pub const SRGGB8_1X8: MbusCode = MbusCode(0x3014);

    /// Returns `true` for raw Bayer codes.
    pub fn is_bayer(self) -> bool {
        self.0 & 0xf000 == 0x3000
    }
}

impl fmt::Debug for MbusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MbusCode({:#06x})", self.0)
    }
}

/// Field order of a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    #[default]
    Progressive,
    Interlaced,
    Alternate,
}

/// Format of the frames carried by one stream on one pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFormat {
    pub code: MbusCode,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub field: Field,
}

impl Default for FrameFormat {
    /// 1080p RGB, the format every stream starts with.
    fn default() -> Self {
        Self {
            code: MbusCode::RGB888_1X24,
            width: 1920,
            height: 1080,
            field: Field::Progressive,
        }
    }
}

impl FrameFormat {
    /// Returns a copy with the size clamped to what the IP cores accept and
    /// the field forced to progressive.
    pub fn clamped(mut self) -> Self {
        self.width = self.width.clamp(MIN_WIDTH, MAX_WIDTH);
        self.height = self.height.clamp(MIN_HEIGHT, MAX_HEIGHT);
        self.field = Field::Progressive;
        self
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#06x} {}x{} {:?}",
            self.code.0, self.width, self.height, self.field
        )
    }
}

/// Checks that the formats on both ends of a link are compatible.
///
/// Width and height must match. The field order must match unless the sink
/// is progressive, so interlaced sources can feed progressive-only
/// bridges. Pixel codes are not compared: IP blocks convert between
/// codes, and the DMA engine checks its own code in
/// [`crate::DmaEngine::verify_format`].
///
/// # Errors
///
/// Returns [`Error::NoSuchPipeline`] on mismatch.
pub fn link_validate(source: &FrameFormat, sink: &FrameFormat) -> Result<()> {
    if source.width != sink.width || source.height != sink.height {
        return Err(Error::NoSuchPipeline(format!(
            "size mismatch on link: {}x{} -> {}x{}",
            source.width, source.height, sink.width, sink.height
        )));
    }
    if source.field != sink.field && sink.field != Field::Progressive {
        return Err(Error::NoSuchPipeline(format!(
            "field mismatch on link: {:?} -> {:?}",
            source.field, sink.field
        )));
    }
    Ok(())
}
