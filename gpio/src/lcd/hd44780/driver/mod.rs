pub mod command;
mod config;
mod gpio;

use crate::lcd::hd44780::{HD44780Error, HD44780Result};
use bitvec::prelude::*;
pub use config::*;
pub use gpio::*;
use std::fmt::Debug;

/// Low-level interface of an HD44780 controller: the transfers the chip understands, plus
/// the handful of instructions built on top of them that [HD44780Display](super::HD44780Display)
/// needs.
///
/// Every transfer waits until the controller reports it's ready before touching the bus.
pub trait HD44780Driver: Debug {
    /// Width of the data bus the controller is wired with.
    fn bus_width(&self) -> BusWidth;

    /// Runs the power-on initialization sequence.
    ///
    /// Leaves the controller with the display on, cursor and blink off, auto-increment entry
    /// mode and the address counter at 0.
    fn init(&mut self, multiline: bool) -> HD44780Result<()>;

    /// Samples the busy flag once. Returns `true` while the controller is busy.
    fn poll_ready(&mut self) -> HD44780Result<bool>;

    /// Sends an instruction byte (RS = 0).
    fn send_command(&mut self, command: u8) -> HD44780Result<()>;

    /// Sends a character byte to the current DDRAM/CGRAM address (RS = 1).
    fn send_data(&mut self, data: u8) -> HD44780Result<()>;

    /// Sends a prebuilt pin pattern, one bus phase at a time.
    fn send_raw(&mut self, command: &RawCommand) -> HD44780Result<()>;

    /// Reads the address counter.
    fn read_address(&mut self) -> HD44780Result<u8>;

    /// Clears the display and sets the address counter to 0.
    fn clear_display(&mut self) -> HD44780Result<()> {
        self.send_raw(&RawCommand::instruction(command::CLEAR_DISPLAY))
    }

    /// Sets the cursor move direction and whether the display shifts with it.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> HD44780Result<()> {
        self.send_raw(&RawCommand::instruction(command::entry_mode(cursor_direction, shift)))
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> HD44780Result<()> {
        self.send_raw(&RawCommand::instruction(command::display_control(
            display_on, cursor_on, blink_on,
        )))
    }

    /// Sets the DDRAM address.
    fn set_ddram_address(&mut self, address: u8) -> HD44780Result<()> {
        if address > 0b01111111 {
            return Err(HD44780Error::AddressOutOfBounds {
                address,
                limit: 0b10000000,
            });
        }
        self.send_command(command::set_ddram_address(address))
    }
}

/// Data bus width. Fixed for the lifetime of a driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusWidth {
    /// DB7..DB4 wired; every byte is sent as two nibbles.
    Narrow,
    /// DB7..DB0 wired; every byte is sent in one go.
    Wide,
}

impl BusWidth {
    /// Number of data lines.
    pub fn lines(self) -> usize {
        match self {
            BusWidth::Narrow => 4,
            BusWidth::Wide => 8,
        }
    }

    /// Number of strobes needed to move one byte across the bus.
    pub fn phases(self) -> usize {
        8 / self.lines()
    }
}

impl TryFrom<u8> for BusWidth {
    type Error = HD44780Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(BusWidth::Narrow),
            8 => Ok(BusWidth::Wide),
            _ => Err(HD44780Error::Configuration(format!(
                "bus width must be 4 or 8, got {}",
                value
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing/reading data.
    Left,
    /// Moves the cursor to the right after writing/reading data.
    Right,
}

/// Pin levels for an instruction that has no dedicated method.
///
/// `lines` holds the eight data line values, DB7 first. On a 4-bit bus the first four are sent
/// in the first phase and the last four in the second, each after its own ready check; on an
/// 8-bit bus all eight go out in a single phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RawCommand {
    pub register_select: bool,
    pub read_write: bool,
    pub lines: BitArray<[u8; 1], Msb0>,
}

impl RawCommand {
    pub fn new(register_select: bool, read_write: bool, lines: [bool; 8]) -> Self {
        let mut bits = BitArray::<[u8; 1], Msb0>::new([0]);
        for (i, &line) in lines.iter().enumerate() {
            bits.set(i, line);
        }
        RawCommand {
            register_select,
            read_write,
            lines: bits,
        }
    }

    /// A write of `value` as an instruction (RS = 0, RW = 0).
    pub fn instruction(value: u8) -> Self {
        RawCommand {
            register_select: false,
            read_write: false,
            lines: BitArray::new([value]),
        }
    }

    /// The line values packed into a byte, DB7 as the most significant bit.
    pub fn value(&self) -> u8 {
        self.lines.into_inner()[0]
    }

    /// The line values sent in each phase on a bus of the given width.
    pub fn phases(&self, bus_width: BusWidth) -> impl Iterator<Item = &BitSlice<u8, Msb0>> {
        self.lines.chunks(bus_width.lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_width_accepts_four_and_eight_only() {
        assert_eq!(BusWidth::try_from(4), Ok(BusWidth::Narrow));
        assert_eq!(BusWidth::try_from(8), Ok(BusWidth::Wide));
        for width in [0, 1, 5, 7, 16] {
            assert!(matches!(
                BusWidth::try_from(width),
                Err(HD44780Error::Configuration(_))
            ));
        }
    }

    #[test]
    fn raw_command_lines_are_msb_first() {
        let command = RawCommand::new(false, false, [false, false, false, false, true, true, false, false]);
        assert_eq!(command.value(), 0b0000_1100);
        assert_eq!(command, RawCommand::instruction(0x0C));
    }

    #[test]
    fn narrow_bus_splits_raw_command_in_two_phases() {
        let command = RawCommand::instruction(0b1010_0110);

        let narrow: Vec<Vec<bool>> = command
            .phases(BusWidth::Narrow)
            .map(|phase| phase.iter().by_vals().collect())
            .collect();
        assert_eq!(
            narrow,
            vec![vec![true, false, true, false], vec![false, true, true, false]]
        );

        assert_eq!(command.phases(BusWidth::Wide).count(), 1);
    }
}
