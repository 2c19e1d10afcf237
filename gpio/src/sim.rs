//! Simulated GPIO backend with an HD44780 controller wired to its pins.
//!
//! [SimHD44780] hands out pins like any other [GpioDriver]: index [SimHD44780::PIN_RS],
//! [SimHD44780::PIN_RW], [SimHD44780::PIN_E], followed by the data lines, most significant first.
//! The controller model reacts to the enable strobe the way the real chip does: it latches the
//! bus on the falling edge of a write and drives it while a read strobe is high. In 4-bit mode
//! only DB7..DB4 are wired and transfers are split into nibble pairs.
//!
//! The model keeps DDRAM linear (`0x00..0x80`) and records every executed transfer, which makes
//! it useful for checking wire-level behaviour without hardware.
use crate::lcd::hd44780::PinAssignment;
use crate::{GpioDirection, GpioDriver, GpioError, GpioPin, GpioResult};
use bitvec::vec::BitVec;
use log::trace;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::AtomicU8;

const DDRAM_SIZE: usize = 0x80;
const MAX_LINES: usize = 3 + 8;

/// A transfer completed by the simulated controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SimEvent {
    /// An instruction byte was executed (RS = 0).
    Instruction(u8),
    /// A character byte was written to DDRAM (RS = 1).
    Data(u8),
}

#[derive(Debug)]
struct SimState {
    data_lines: usize,
    levels: [bool; MAX_LINES],
    directions: [GpioDirection; MAX_LINES],

    eight_bit: bool,
    pending_nibble: Option<u8>,
    read_low_next: bool,
    read_latch: u8,
    driven: u8,

    busy_polls: u32,
    busy_remaining: u32,
    stuck_busy: bool,

    address: u8,
    increment: bool,
    display_shift: bool,
    display_on: bool,
    cursor_on: bool,
    blink_on: bool,
    two_lines: bool,
    ddram: [u8; DDRAM_SIZE],

    events: Vec<SimEvent>,
    write_strobes: usize,
    read_strobes: usize,
}

impl SimState {
    fn new(data_lines: usize) -> Self {
        SimState {
            data_lines,
            levels: [false; MAX_LINES],
            directions: [GpioDirection::Output; MAX_LINES],
            // The controller always powers up expecting 8-bit transfers.
            eight_bit: true,
            pending_nibble: None,
            read_low_next: false,
            read_latch: 0,
            driven: 0,
            busy_polls: 1,
            busy_remaining: 0,
            stuck_busy: false,
            address: 0,
            increment: true,
            display_shift: false,
            display_on: false,
            cursor_on: false,
            blink_on: false,
            two_lines: false,
            ddram: [b' '; DDRAM_SIZE],
            events: Vec::new(),
            write_strobes: 0,
            read_strobes: 0,
        }
    }

    /// The byte the controller sees on DB7..DB0. Unwired lines read as low.
    fn bus_value(&self) -> u8 {
        (0..self.data_lines)
            .filter(|&i| self.levels[SimHD44780::PIN_DATA + i])
            .fold(0, |value, i| value | (1 << (7 - i)))
    }

    fn write_line(&mut self, index: usize, value: bool) {
        let previous = self.levels[index];
        self.levels[index] = value;

        if index != SimHD44780::PIN_E || previous == value {
            return;
        }

        let reading = self.levels[SimHD44780::PIN_RW];
        match (value, reading) {
            (true, true) => self.read_strobe(),
            (false, false) => self.write_strobe(),
            _ => {}
        }
    }

    fn read_line(&self, index: usize) -> bool {
        match self.directions[index] {
            GpioDirection::Input if index >= SimHD44780::PIN_DATA => {
                let bit = 7 - (index - SimHD44780::PIN_DATA);
                (self.driven >> bit) & 1 != 0
            }
            _ => self.levels[index],
        }
    }

    fn write_strobe(&mut self) {
        self.write_strobes += 1;
        let bus = self.bus_value();

        if self.eight_bit {
            self.execute(bus);
            return;
        }

        match self.pending_nibble.take() {
            None => self.pending_nibble = Some(bus >> 4),
            Some(high) => self.execute((high << 4) | (bus >> 4)),
        }
    }

    fn read_strobe(&mut self) {
        self.read_strobes += 1;

        if !self.eight_bit && self.read_low_next {
            self.driven = self.read_latch << 4;
            self.read_low_next = false;
            return;
        }

        self.read_latch = if self.levels[SimHD44780::PIN_RS] {
            self.ddram[self.address as usize]
        } else {
            let busy = self.stuck_busy || self.busy_remaining > 0;
            self.busy_remaining = self.busy_remaining.saturating_sub(1);
            (u8::from(busy) << 7) | self.address
        };

        if self.eight_bit {
            self.driven = self.read_latch;
        } else {
            self.driven = self.read_latch & 0xF0;
            self.read_low_next = true;
        }
    }

    fn execute(&mut self, value: u8) {
        let data = self.levels[SimHD44780::PIN_RS];
        trace!("Simulated controller executing {:08b}, RS: {}", value, data);

        if data {
            self.events.push(SimEvent::Data(value));
            self.ddram[self.address as usize] = value;
            self.advance();
        } else {
            self.events.push(SimEvent::Instruction(value));
            self.instruction(value);
        }

        self.busy_remaining = self.busy_polls;
    }

    fn instruction(&mut self, value: u8) {
        match value.leading_zeros() {
            7 => {
                self.ddram = [b' '; DDRAM_SIZE];
                self.address = 0;
                self.increment = true;
            }
            6 => self.address = 0,
            5 => {
                self.increment = value & 0b10 != 0;
                self.display_shift = value & 0b01 != 0;
            }
            4 => {
                self.display_on = value & 0b100 != 0;
                self.cursor_on = value & 0b010 != 0;
                self.blink_on = value & 0b001 != 0;
            }
            3 => {
                if value & 0b1000 == 0 {
                    let right = value & 0b100 != 0;
                    self.address = if right {
                        (self.address + 1) % DDRAM_SIZE as u8
                    } else {
                        self.address.checked_sub(1).unwrap_or(DDRAM_SIZE as u8 - 1)
                    };
                }
            }
            2 => {
                let eight_bit = value & 0b1_0000 != 0;
                if eight_bit != self.eight_bit {
                    self.pending_nibble = None;
                    self.read_low_next = false;
                }
                self.eight_bit = eight_bit;
                self.two_lines = value & 0b1000 != 0;
            }
            0 => self.address = value & 0x7F,
            // CGRAM addressing has no visible effect in this model.
            _ => {}
        }
    }

    fn advance(&mut self) {
        self.address = if self.increment {
            (self.address + 1) % DDRAM_SIZE as u8
        } else {
            self.address.checked_sub(1).unwrap_or(DDRAM_SIZE as u8 - 1)
        };
    }
}

/// A simulated HD44780 together with the GPIO pins wired to it.
pub struct SimHD44780 {
    state: RefCell<SimState>,
    used_pins: BitVec<AtomicU8>,
}

impl SimHD44780 {
    /// Register select pin index.
    pub const PIN_RS: usize = 0;
    /// Read/write pin index.
    pub const PIN_RW: usize = 1;
    /// Enable strobe pin index.
    pub const PIN_E: usize = 2;
    /// Index of the first (most significant) data line.
    pub const PIN_DATA: usize = 3;

    /// Creates a simulated controller wired with 4 (DB7..DB4) or 8 data lines.
    pub fn new(data_lines: usize) -> GpioResult<Self> {
        if data_lines != 4 && data_lines != 8 {
            return Err(GpioError::InvalidArgument);
        }

        Ok(SimHD44780 {
            state: RefCell::new(SimState::new(data_lines)),
            used_pins: BitVec::repeat(false, Self::PIN_DATA + data_lines),
        })
    }

    /// Claims every pin of the simulated wiring as a [PinAssignment].
    pub fn pin_assignment(&self) -> GpioResult<PinAssignment<'_>> {
        let data_lines = self.state.borrow().data_lines;
        Ok(PinAssignment {
            rs: self.get_pin(Self::PIN_RS)?,
            rw: self.get_pin(Self::PIN_RW)?,
            e: self.get_pin(Self::PIN_E)?,
            data: (0..data_lines)
                .map(|i| self.get_pin(Self::PIN_DATA + i))
                .collect::<GpioResult<Vec<_>>>()?,
        })
    }

    /// Sets how many status reads report busy after each executed transfer.
    pub fn set_busy_polls(&self, polls: u32) {
        self.state.borrow_mut().busy_polls = polls;
    }

    /// Makes the controller report busy forever, like a disconnected or hung device.
    pub fn set_stuck_busy(&self, stuck: bool) {
        self.state.borrow_mut().stuck_busy = stuck;
    }

    /// Direction of a wired line, `None` past the last one.
    pub fn direction(&self, index: usize) -> Option<GpioDirection> {
        if index >= self.used_pins.len() {
            return None;
        }
        self.state.borrow().directions.get(index).copied()
    }

    /// Level of a wired line as seen on the wire, `None` past the last one.
    pub fn level(&self, index: usize) -> Option<bool> {
        if index >= self.used_pins.len() {
            return None;
        }
        self.state.borrow().levels.get(index).copied()
    }

    /// Current DDRAM address counter.
    pub fn address(&self) -> u8 {
        self.state.borrow().address
    }

    pub fn ddram(&self) -> [u8; DDRAM_SIZE] {
        self.state.borrow().ddram
    }

    /// DDRAM contents starting at `address`, as text.
    pub fn text_at(&self, address: u8, len: usize) -> String {
        let state = self.state.borrow();
        let start = address as usize;
        let end = (start + len).min(DDRAM_SIZE);
        state.ddram[start..end].iter().map(|&b| b as char).collect()
    }

    pub fn is_eight_bit(&self) -> bool {
        self.state.borrow().eight_bit
    }

    pub fn is_two_lines(&self) -> bool {
        self.state.borrow().two_lines
    }

    /// Display, cursor and blink flags, in that order.
    pub fn display_flags(&self) -> (bool, bool, bool) {
        let state = self.state.borrow();
        (state.display_on, state.cursor_on, state.blink_on)
    }

    /// Whether the address counter moves right after each character.
    pub fn is_incrementing(&self) -> bool {
        self.state.borrow().increment
    }

    pub fn is_display_shift(&self) -> bool {
        self.state.borrow().display_shift
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    /// Number of write strobes (falling edges of E with RW low) seen so far.
    pub fn write_strobes(&self) -> usize {
        self.state.borrow().write_strobes
    }

    /// Number of read strobes (rising edges of E with RW high) seen so far.
    pub fn read_strobes(&self) -> usize {
        self.state.borrow().read_strobes
    }
}

impl Debug for SimHD44780 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimHD44780({} data lines)", self.state.borrow().data_lines)
    }
}

impl GpioDriver for SimHD44780 {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.used_pins.len())
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(index, true);

        let mut state = self.state.borrow_mut();
        state.directions[index] = GpioDirection::Output;
        state.write_line(index, false);

        Ok(Box::new(SimPin { sim: self, index }))
    }
}

struct SimPin<'a> {
    sim: &'a SimHD44780,
    index: usize,
}

impl Debug for SimPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.sim, self.index)
    }
}

impl GpioPin for SimPin<'_> {
    fn direction(&self) -> GpioDirection {
        self.sim.state.borrow().directions[self.index]
    }

    fn set_direction(&mut self, direction: GpioDirection) -> GpioResult<()> {
        self.sim.state.borrow_mut().directions[self.index] = direction;
        Ok(())
    }

    fn read(&self) -> GpioResult<bool> {
        Ok(self.sim.state.borrow().read_line(self.index))
    }

    fn write(&self, value: bool) -> GpioResult<()> {
        let mut state = self.sim.state.borrow_mut();
        if state.directions[self.index] != GpioDirection::Output {
            return Err(GpioError::WrongDirection(GpioDirection::Output));
        }
        state.write_line(self.index, value);
        Ok(())
    }
}

impl Drop for SimPin<'_> {
    fn drop(&mut self) {
        self.sim.used_pins.set_aliased(self.index, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_four_or_eight_lines_can_be_wired() {
        assert!(SimHD44780::new(4).is_ok());
        assert!(SimHD44780::new(8).is_ok());
        assert_eq!(SimHD44780::new(5).err(), Some(GpioError::InvalidArgument));
    }

    #[test]
    fn pins_are_claimed_until_dropped() {
        let sim = SimHD44780::new(4).unwrap();
        let pin = sim.get_pin(SimHD44780::PIN_E).unwrap();
        assert_eq!(sim.get_pin(SimHD44780::PIN_E).err(), Some(GpioError::AlreadyInUse));
        drop(pin);
        assert!(sim.get_pin(SimHD44780::PIN_E).is_ok());
        assert_eq!(sim.get_pin(7).err(), Some(GpioError::InvalidArgument));
    }

    #[test]
    fn lines_past_the_wired_ones_have_no_state() {
        let sim = SimHD44780::new(4).unwrap();
        let pins = sim.pin_assignment().unwrap();
        pins.rs.write(true).unwrap();

        assert_eq!(sim.level(SimHD44780::PIN_RS), Some(true));
        assert_eq!(sim.direction(SimHD44780::PIN_DATA + 3), Some(GpioDirection::Output));
        assert_eq!(sim.direction(SimHD44780::PIN_DATA + 4), None);
        assert_eq!(sim.level(SimHD44780::PIN_DATA + 4), None);
        assert_eq!(sim.level(usize::MAX), None);
    }

    #[test]
    fn falling_edge_latches_a_byte() {
        let sim = SimHD44780::new(8).unwrap();
        let pins = sim.pin_assignment().unwrap();

        pins.rs.write(true).unwrap();
        for (i, pin) in pins.data.iter().enumerate() {
            pin.write(b'K' & (0x80 >> i) != 0).unwrap();
        }
        pins.e.write(true).unwrap();
        assert!(sim.events().is_empty());
        pins.e.write(false).unwrap();

        assert_eq!(sim.events(), vec![SimEvent::Data(b'K')]);
        assert_eq!(sim.text_at(0, 1), "K");
        assert_eq!(sim.address(), 1);
    }
}
