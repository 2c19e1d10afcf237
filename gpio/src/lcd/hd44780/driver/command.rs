//! Instruction encodings of the HD44780 instruction set.

use super::CursorDirection;

/// Clears the display and sets the address counter to 0.
pub const CLEAR_DISPLAY: u8 = 0b00000001;
pub const ENTRY_MODE_SET: u8 = 0b00000100;
pub const DISPLAY_CONTROL: u8 = 0b00001000;
pub const FUNCTION_SET: u8 = 0b00100000;
pub const SET_DDRAM_ADDRESS: u8 = 0b10000000;

/// Function set selecting an 8-bit interface, sent three times after power-on to bring the
/// controller into a known state. On a 4-bit bus only the high nibble reaches the chip.
pub const RESET_INSURANCE: u8 = 0b00110000;

/// Entry mode set: `000001IS`.
/// `I` is `1` for right cursor direction (auto-increment), `S` is `1` for display shift.
pub fn entry_mode(cursor_direction: CursorDirection, shift: bool) -> u8 {
    let mut command = ENTRY_MODE_SET;
    if cursor_direction == CursorDirection::Right {
        command |= 0b00000010;
    }
    if shift {
        command |= 0b00000001;
    }
    command
}

/// Display on/off control: `00001DCB`.
pub fn display_control(display_on: bool, cursor_on: bool, blink_on: bool) -> u8 {
    let mut command = DISPLAY_CONTROL;
    if display_on {
        command |= 0b00000100;
    }
    if cursor_on {
        command |= 0b00000010;
    }
    if blink_on {
        command |= 0b00000001;
    }
    command
}

/// Function set: `001DN000`.
/// `D` is `1` for an 8-bit interface, `N` is `1` for two display lines.
pub fn function_set(eight_bit: bool, two_lines: bool) -> u8 {
    let mut command = FUNCTION_SET;
    if eight_bit {
        command |= 0b00010000;
    }
    if two_lines {
        command |= 0b00001000;
    }
    command
}

/// Set DDRAM address: `1AAAAAAA`.
pub fn set_ddram_address(address: u8) -> u8 {
    SET_DDRAM_ADDRESS | (address & 0b01111111)
}
