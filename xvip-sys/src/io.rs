// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Register access trait and the in-memory register file.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Access to the 32-bit register window of one IP block.
///
/// Offsets are byte offsets relative to the start of the window. Reads and
/// writes are single accesses; the read-modify-write helpers are not atomic
/// and must be serialized by the owner of the window.
pub trait RegisterIo: Send + Sync {
    /// Reads the register at `offset`.
    fn read(&self, offset: u32) -> u32;

    /// Writes `value` to the register at `offset`.
    fn write(&self, offset: u32, value: u32);

    /// Sets the bits of `mask` in the register at `offset`.
    fn set(&self, offset: u32, mask: u32) {
        let value = self.read(offset);
        self.write(offset, value | mask);
    }

    /// Clears the bits of `mask` in the register at `offset`.
    fn clr(&self, offset: u32, mask: u32) {
        let value = self.read(offset);
        self.write(offset, value & !mask);
    }

    /// Sets or clears the bits of `mask` depending on `set`.
    fn clr_or_set(&self, offset: u32, mask: u32, set: bool) {
        if set {
            self.set(offset, mask);
        } else {
            self.clr(offset, mask);
        }
    }

    /// Clears the bits of `clr`, then sets the bits of `set`, in a single write.
    fn clr_and_set(&self, offset: u32, clr: u32, set: u32) {
        let value = self.read(offset);
        self.write(offset, (value & !clr) | set);
    }
}

/// One entry of a [`TraceLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A register write on the named device.
    Write {
        device: String,
        offset: u32,
        value: u32,
    },
    /// A non-register action on the named device (e.g. a DMA channel start).
    Action { device: String, action: String },
}

impl TraceEvent {
    /// Returns the name of the device that produced this event.
    pub fn device(&self) -> &str {
        match self {
            TraceEvent::Write { device, .. } | TraceEvent::Action { device, .. } => device,
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Write {
                device,
                offset,
                value,
            } => write!(f, "{device}: [0x{offset:04x}] <= 0x{value:08x}"),
            TraceEvent::Action { device, action } => write!(f, "{device}: {action}"),
        }
    }
}

/// Ordered, shareable log of register writes and device actions.
///
/// Cloning the log yields another handle to the same event list, so several
/// register files can record into one global ordering.
#[derive(Clone, Default)]
pub struct TraceLog {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl TraceLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn push(&self, event: TraceEvent) {
        lock(&self.events).push(event);
    }

    /// Records a non-register action for `device`.
    pub fn action(&self, device: &str, action: &str) {
        self.push(TraceEvent::Action {
            device: device.to_owned(),
            action: action.to_owned(),
        });
    }

    /// Returns a copy of all events recorded so far.
    pub fn events(&self) -> Vec<TraceEvent> {
        lock(&self.events).clone()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }

    /// Discards all recorded events.
    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl fmt::Debug for TraceLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceLog").field("len", &self.len()).finish()
    }
}

#[derive(Default)]
struct RegisterFile {
    values: HashMap<u32, u32>,
    scripted: HashMap<u32, VecDeque<u32>>,
}

/// Sparse in-memory register window.
///
/// Unwritten registers read as zero. Every write is appended to the shared
/// [`TraceLog`] under the device name given at construction. Status
/// registers that hardware would update on its own can be modelled with
/// [`MemoryRegisters::poke`] (a silent store) or
/// [`MemoryRegisters::script_reads`] (a queue of values returned by the next
/// reads, before falling back to the stored value).
///
/// # Examples
///
/// ```
/// use xvip_sys::{MemoryRegisters, RegisterIo, TraceLog};
///
/// let log = TraceLog::new();
/// let regs = MemoryRegisters::new("cfa", log.clone());
/// regs.write(0x100, 3);
/// regs.set(0x000, 1);
/// assert_eq!(regs.read(0x100), 3);
/// assert_eq!(log.len(), 2);
/// ```
pub struct MemoryRegisters {
    name: String,
    file: Mutex<RegisterFile>,
    log: TraceLog,
}

impl MemoryRegisters {
    /// Creates an all-zero register window recording into `log`.
    pub fn new(name: impl Into<String>, log: TraceLog) -> Self {
        Self {
            name: name.into(),
            file: Mutex::new(RegisterFile::default()),
            log,
        }
    }

    /// Returns the device name used in trace events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the log this window records into.
    pub fn log(&self) -> &TraceLog {
        &self.log
    }

    /// Stores `value` without recording a write, as if the hardware changed it.
    pub fn poke(&self, offset: u32, value: u32) {
        lock(&self.file).values.insert(offset, value);
    }

    /// Returns the stored value of a register without consuming scripted reads.
    pub fn peek(&self, offset: u32) -> u32 {
        lock(&self.file).values.get(&offset).copied().unwrap_or(0)
    }

    /// Queues values to be returned by the next reads of `offset`.
    pub fn script_reads(&self, offset: u32, values: impl IntoIterator<Item = u32>) {
        lock(&self.file)
            .scripted
            .entry(offset)
            .or_default()
            .extend(values);
    }

    /// Returns all writes to this window, in order, as `(offset, value)` pairs.
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.log
            .events()
            .into_iter()
            .filter_map(|event| match event {
                TraceEvent::Write {
                    device,
                    offset,
                    value,
                } if device == self.name => Some((offset, value)),
                _ => None,
            })
            .collect()
    }
}

impl RegisterIo for MemoryRegisters {
    fn read(&self, offset: u32) -> u32 {
        let mut file = lock(&self.file);
        if let Some(value) = file.scripted.get_mut(&offset).and_then(VecDeque::pop_front) {
            return value;
        }
        file.values.get(&offset).copied().unwrap_or(0)
    }

    fn write(&self, offset: u32, value: u32) {
        lock(&self.file).values.insert(offset, value);
        self.log.push(TraceEvent::Write {
            device: self.name.clone(),
            offset,
            value,
        });
    }
}

impl fmt::Debug for MemoryRegisters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRegisters")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_reads_precede_stored_value() {
        let regs = MemoryRegisters::new("csi", TraceLog::new());
        regs.poke(0x10, 0);
        regs.script_reads(0x10, [1, 1]);
        assert_eq!(regs.read(0x10), 1);
        assert_eq!(regs.read(0x10), 1);
        assert_eq!(regs.read(0x10), 0);
    }

    #[test]
    fn read_modify_write_helpers() {
        let regs = MemoryRegisters::new("vip", TraceLog::new());
        regs.write(0, 0xf0);
        regs.set(0, 0x01);
        regs.clr(0, 0x10);
        assert_eq!(regs.peek(0), 0xe1);
        regs.clr_and_set(0, 0xe0, 0x02);
        assert_eq!(regs.peek(0), 0x03);
        regs.clr_or_set(0, 0x01, false);
        assert_eq!(regs.peek(0), 0x02);
        assert_eq!(regs.writes().len(), 5);
    }

    #[test]
    fn shared_log_keeps_global_order() {
        let log = TraceLog::new();
        let a = MemoryRegisters::new("a", log.clone());
        let b = MemoryRegisters::new("b", log.clone());
        a.write(0, 1);
        log.action("dma", "start");
        b.write(4, 2);
        let devices: Vec<_> = log.events().iter().map(|e| e.device().to_owned()).collect();
        assert_eq!(devices, ["a", "dma", "b"]);
        assert_eq!(a.writes(), [(0, 1)]);
    }
}
