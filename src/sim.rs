//! In-memory device and manual clock for deterministic scans.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::io;
use std::rc::Rc;

use crate::clock::Clock;
use crate::device::{BlockHandle, BlockIo};
use crate::plan::Direction;

pub const SIM_BYTES_PER_SEC: f64 = 100.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Default)]
pub struct SimClock(Rc<Cell<f64>>);

impl SimClock {
    pub fn advance(&self, secs: f64) {
        self.0.set(self.0.get() + secs);
    }
}

impl Clock for SimClock {
    fn now(&self) -> f64 {
        self.0.get()
    }
}

#[derive(Debug, Default)]
struct SimState {
    data: Vec<u8>,
    read_faults: HashSet<u64>,
    write_faults: HashSet<u64>,
    open_faults: HashSet<Direction>,
    slow: HashMap<u64, f64>,
    stuck: HashMap<usize, u8>,
    aliases: HashMap<u64, u64>,
    opens: Vec<Direction>,
}

/// Faults are keyed by the byte offset of the I/O request.
#[derive(Debug, Clone)]
pub struct SimDevice {
    state: Rc<RefCell<SimState>>,
    clock: SimClock,
}

impl SimDevice {
    pub fn new(size: usize, clock: &SimClock) -> Self {
        let state = SimState { data: vec![0u8; size], ..SimState::default() };
        Self { state: Rc::new(RefCell::new(state)), clock: clock.clone() }
    }

    pub fn fail_read_at(&self, offset: u64) {
        self.state.borrow_mut().read_faults.insert(offset);
    }

    pub fn fail_write_at(&self, offset: u64) {
        self.state.borrow_mut().write_faults.insert(offset);
    }

    pub fn fail_open(&self, direction: Direction) {
        self.state.borrow_mut().open_faults.insert(direction);
    }

    /// Requests at `offset` take `factor` times as long.
    pub fn slow_at(&self, offset: u64, factor: f64) {
        self.state.borrow_mut().slow.insert(offset, factor);
    }

    /// Reads always return `value` at byte `pos`.
    pub fn stuck_byte(&self, pos: usize, value: u8) {
        self.state.borrow_mut().stuck.insert(pos, value);
    }

    /// Reads at `offset` return the data stored at `source`.
    pub fn alias_reads(&self, offset: u64, source: u64) {
        self.state.borrow_mut().aliases.insert(offset, source);
    }

    pub fn opens(&self) -> Vec<Direction> {
        self.state.borrow().opens.clone()
    }

    pub fn data(&self) -> Vec<u8> {
        self.state.borrow().data.clone()
    }

    fn charge(&self, offset: u64, len: usize) {
        let factor = self.state.borrow().slow.get(&offset).copied().unwrap_or(1.0);
        self.clock.advance(len as f64 / SIM_BYTES_PER_SEC * factor);
    }
}

impl BlockIo for SimDevice {
    type Handle = SimHandle;

    fn label(&self) -> String {
        "sim".to_string()
    }

    fn size_bytes(&self) -> io::Result<u64> {
        Ok(self.state.borrow().data.len() as u64)
    }

    fn open(&self, direction: Direction) -> io::Result<SimHandle> {
        let mut state = self.state.borrow_mut();
        if state.open_faults.contains(&direction) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "simulated open failure"));
        }
        state.opens.push(direction);
        Ok(SimHandle { device: self.clone(), direction })
    }
}

pub struct SimHandle {
    device: SimDevice,
    direction: Direction,
}

impl BlockHandle for SimHandle {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        assert_eq!(self.direction, Direction::Read);
        self.device.charge(offset, buf.len());
        let state = self.device.state.borrow();
        if state.read_faults.contains(&offset) {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated media error"));
        }
        let source = state.aliases.get(&offset).copied().unwrap_or(offset) as usize;
        let end = source + buf.len();
        if end > state.data.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "read past end"));
        }
        buf.copy_from_slice(&state.data[source..end]);
        for (&pos, &value) in &state.stuck {
            if pos >= offset as usize && pos < offset as usize + buf.len() {
                buf[pos - offset as usize] = value;
            }
        }
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        assert_eq!(self.direction, Direction::Write);
        self.device.charge(offset, buf.len());
        let mut state = self.device.state.borrow_mut();
        if state.write_faults.contains(&offset) {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated write failure"));
        }
        let start = offset as usize;
        let end = start + buf.len();
        if end > state.data.len() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "write past end"));
        }
        state.data[start..end].copy_from_slice(buf);
        Ok(())
    }
}
