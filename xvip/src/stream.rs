// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-width stream selection masks.

use std::{fmt, ops};

use crate::{Error, Result};

/// Maximum number of streams multiplexed on one pad.
pub const MAX_STREAMS: u32 = 64;

/// Set of stream ids on one pad, one bit per stream.
///
/// Stream ids are in `0..MAX_STREAMS`; a pad can never carry more than 64
/// concurrent streams.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StreamMask(u64);

impl StreamMask {
    pub const EMPTY: StreamMask = StreamMask(0);
    pub const ALL: StreamMask = StreamMask(u64::MAX);

    /// Creates a mask from its raw bit representation.
    pub const fn from_bits(bits: u64) -> Self {
        StreamMask(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns a mask containing only `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `stream >= MAX_STREAMS`.
    pub fn single(stream: u32) -> Result<Self> {
        check_stream(stream)?;
        Ok(StreamMask(1 << stream))
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, stream: u32) -> bool {
        stream < MAX_STREAMS && self.0 & (1 << stream) != 0
    }

    /// Adds `stream` to the mask. Ids out of range are ignored.
    pub fn insert(&mut self, stream: u32) {
        if stream < MAX_STREAMS {
            self.0 |= 1 << stream;
        }
    }

    pub const fn intersects(self, other: StreamMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Number of streams in the mask.
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates over the stream ids in the mask, lowest first.
    pub fn iter(self) -> impl Iterator<Item = u32> {
        (0..MAX_STREAMS).filter(move |&s| self.0 & (1 << s) != 0)
    }
}

/// Rejects stream ids that do not fit in a [`StreamMask`].
pub(crate) fn check_stream(stream: u32) -> Result<()> {
    if stream >= MAX_STREAMS {
        return Err(Error::InvalidArgument(format!(
            "stream {stream} exceeds the limit of {MAX_STREAMS} streams per pad"
        )));
    }
    Ok(())
}

impl FromIterator<u32> for StreamMask {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut mask = StreamMask::EMPTY;
        for stream in iter {
            mask.insert(stream);
        }
        mask
    }
}

impl ops::BitOr for StreamMask {
    type Output = StreamMask;
    fn bitor(self, rhs: StreamMask) -> StreamMask {
        StreamMask(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for StreamMask {
    fn bitor_assign(&mut self, rhs: StreamMask) {
        self.0 |= rhs.0;
    }
}

impl ops::BitAnd for StreamMask {
    type Output = StreamMask;
    fn bitand(self, rhs: StreamMask) -> StreamMask {
        StreamMask(self.0 & rhs.0)
    }
}

impl ops::Sub for StreamMask {
    type Output = StreamMask;
    fn sub(self, rhs: StreamMask) -> StreamMask {
        StreamMask(self.0 & !rhs.0)
    }
}

impl ops::SubAssign for StreamMask {
    fn sub_assign(&mut self, rhs: StreamMask) {
        self.0 &= !rhs.0;
    }
}

impl fmt::Debug for StreamMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamMask({:#x})", self.0)
    }
}

impl fmt::Display for StreamMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
