// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! # xvip-sys: Raw register maps for the Xilinx video IP blocks
//!
//! This crate provides the low-level view of the FPGA soft-IP cores and the
//! GMSL serializer that make up a capture pipeline: register offsets, bit
//! masks, and a minimal register access trait.
//!
//! ## Overview
//!
//! `xvip-sys` exposes:
//! - Register offsets and field masks for each IP block ([`regs`])
//! - The [`RegisterIo`] trait, implemented by whatever maps the register
//!   window (MMIO, a bus bridge, or the in-memory model below)
//! - [`MemoryRegisters`], an in-memory register file recording every write
//!   in a shared [`TraceLog`], used for simulation and tests
//!
//! ## Usage
//!
//! **Most users should NOT use this crate directly.** Use the [`xvip`] crate
//! instead, which drives these registers from the pipeline streaming logic.
//!
//! This crate is only needed for:
//! - Implementing a new register back-end
//! - Inspecting the register trace produced by a simulated pipeline
//!
//! [`xvip`]: https://docs.rs/xvip

mod io;
pub mod regs;

pub use io::{MemoryRegisters, RegisterIo, TraceEvent, TraceLog};

/// Produces a `u32` literal where bit `n` is set.
///
/// Equivalent to the kernel's `BIT` macro.
#[macro_export]
macro_rules! bit {
    ($n:expr) => {
        (1u32 << $n)
    };
}

/// Creates a contiguous `u32` bitmask starting at bit position `l` and
/// ending at position `h`, where `h >= l`.
///
/// # Examples
/// ```
/// use xvip_sys::genmask;
/// let mask = genmask!(4, 3);
/// assert_eq!(mask, 0x18);
/// ```
#[macro_export]
macro_rules! genmask {
    ($h:expr, $l:expr) => {{
        const _: () = {
            assert!($h >= $l && $h < 32);
        };
        ((!0u32) >> (31 - $h)) & ((!0u32) << $l)
    }};
}
