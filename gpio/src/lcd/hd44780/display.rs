use crate::lcd::hd44780::driver::{
    BusWidth, CursorDirection, DriverConfig, GpioHD44780Driver, HD44780Driver, PinLevels, RawCommand,
};
use crate::lcd::hd44780::{HD44780Error, HD44780Result, PinAssignment};
use crate::GpioResult;
use log::{debug, error, warn};

/// How the display's lines map onto DDRAM.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Geometry {
    /// Number of physical lines.
    pub line_count: u8,
    /// DDRAM distance between the starts of consecutive lines.
    pub row_shift: u8,
    /// Size of the addressable DDRAM.
    pub ddram_size: u8,
}

impl Geometry {
    pub fn new(line_count: u8) -> Self {
        Geometry {
            line_count,
            ..Geometry::default()
        }
    }

    pub fn with_row_shift(mut self, row_shift: u8) -> Self {
        self.row_shift = row_shift;
        self
    }

    pub fn with_ddram_size(mut self, ddram_size: u8) -> Self {
        self.ddram_size = ddram_size;
        self
    }

    /// DDRAM address `line` starts at, `line × row_shift`, for lines `0..=line_count`. `None`
    /// past that.
    ///
    /// The address isn't checked against the DDRAM size; a product that doesn't fit in a byte
    /// saturates to `0xFF`.
    pub fn line_address(&self, line: u8) -> Option<u8> {
        if line > self.line_count {
            return None;
        }
        Some(line.saturating_mul(self.row_shift))
    }

    fn validate(&self) -> HD44780Result<()> {
        if self.line_count == 0 {
            return Err(HD44780Error::Configuration(
                "a display needs at least one line".into(),
            ));
        }
        if self.ddram_size == 0 || self.ddram_size > 0x80 {
            return Err(HD44780Error::Configuration(format!(
                "DDRAM size must be between 1 and 0x80, got {:#04x}",
                self.ddram_size
            )));
        }
        let last_line = (self.line_count - 1).checked_mul(self.row_shift);
        if last_line.is_none_or(|address| address >= self.ddram_size) {
            return Err(HD44780Error::Configuration(format!(
                "{} lines with a row shift of {:#04x} don't fit in {:#04x} bytes of DDRAM",
                self.line_count, self.row_shift, self.ddram_size
            )));
        }
        Ok(())
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            line_count: 2,
            row_shift: 0x40,
            ddram_size: 0x80,
        }
    }
}

/// A DDRAM address known to be within a display's [Geometry].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DdramAddress(u8);

impl DdramAddress {
    /// # Errors
    /// - `HD44780Error::AddressOutOfBounds` if `address` is past the end of the DDRAM.
    pub fn new(address: u8, geometry: &Geometry) -> HD44780Result<Self> {
        if address >= geometry.ddram_size {
            return Err(HD44780Error::AddressOutOfBounds {
                address,
                limit: geometry.ddram_size,
            });
        }
        Ok(DdramAddress(address))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// An HD44780 character display.
///
/// Tracks the display state the controller can't report back: the display, cursor and blink
/// flags, the entry mode direction and the print anchor. The flags are all sent together, so
/// changing one of them re-sends the other two as they were.
///
/// # Anchor
///
/// When the display is anchored, every [print](Self::print) ends by moving the cursor back to
/// the anchor address, so consecutive prints overwrite the same spot. Enabling the anchor takes
/// the current address as the anchor; [move_cursor](Self::move_cursor) and
/// [return_home](Self::return_home) replace it.
#[derive(Debug)]
pub struct HD44780Display<D: HD44780Driver> {
    driver: D,
    geometry: Geometry,
    display_on: bool,
    cursor_visible: bool,
    blink_on: bool,
    cursor_direction: CursorDirection,
    anchored: bool,
    anchor_address: u8,
}

impl<'a> HD44780Display<GpioHD44780Driver<'a>> {
    /// Creates a display driven over GPIO with the default timing, and initializes it.
    ///
    /// # Errors
    /// - `HD44780Error::Configuration` if `width` isn't 4 or 8, or doesn't match the number of
    ///   data pins. The pins are released.
    pub fn from_pins(pins: PinAssignment<'a>, width: u8, line_count: u8) -> HD44780Result<Self> {
        let bus_width = BusWidth::try_from(width)?;
        let driver = GpioHD44780Driver::new(pins, DriverConfig::new(bus_width))?;
        Self::new(driver, Geometry::new(line_count))
    }

    /// Levels of every pin wired to the controller.
    pub fn pin_levels(&self) -> GpioResult<PinLevels> {
        self.driver.pin_levels()
    }
}

impl<D: HD44780Driver> HD44780Display<D> {
    /// Initializes the controller and returns it with the display on, cursor hidden, not
    /// blinking and the address counter at 0.
    pub fn new(driver: D, geometry: Geometry) -> HD44780Result<Self> {
        geometry.validate()?;

        let mut display = HD44780Display {
            driver,
            geometry,
            display_on: true,
            cursor_visible: false,
            blink_on: false,
            cursor_direction: CursorDirection::Right,
            anchored: false,
            anchor_address: 0,
        };

        display.driver.init(geometry.line_count > 1)?;
        display.set_cursor_visible(false)?;

        debug!("HD44780 display ready: {:?}", geometry);
        Ok(display)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn is_display_on(&self) -> bool {
        self.display_on
    }

    pub fn is_cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn is_blink_on(&self) -> bool {
        self.blink_on
    }

    pub fn cursor_direction(&self) -> CursorDirection {
        self.cursor_direction
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    pub fn anchor_address(&self) -> u8 {
        self.anchor_address
    }

    fn update_display_control(&mut self) -> HD44780Result<()> {
        self.driver
            .set_display_control(self.display_on, self.cursor_visible, self.blink_on)
    }

    /// Clears the display and moves the cursor to address 0.
    pub fn clear(&mut self) -> HD44780Result<()> {
        self.driver.clear_display()
    }

    pub fn set_cursor_visible(&mut self, visible: bool) -> HD44780Result<()> {
        self.cursor_visible = visible;
        self.update_display_control()
    }

    pub fn set_blink(&mut self, blink: bool) -> HD44780Result<()> {
        self.blink_on = blink;
        self.update_display_control()
    }

    /// Turns the display on or off. DDRAM contents are kept while it's off.
    pub fn set_display_on(&mut self, on: bool) -> HD44780Result<()> {
        self.display_on = on;
        self.update_display_control()
    }

    /// Enables or disables the print anchor. Enabling it reads the current address from the
    /// controller and anchors there.
    pub fn set_anchored(&mut self, anchored: bool) -> HD44780Result<()> {
        if anchored {
            self.anchor_address = self.read_current_address()?;
            debug!("Anchored at {:#04x}", self.anchor_address);
        }
        self.anchored = anchored;
        Ok(())
    }

    /// Moves the cursor to a DDRAM address and makes it the anchor address.
    ///
    /// # Errors
    /// - `HD44780Error::AddressOutOfBounds` if the address is past the end of the DDRAM. Nothing
    ///   is sent to the controller.
    pub fn move_cursor(&mut self, address: u8) -> HD44780Result<()> {
        let address = DdramAddress::new(address, &self.geometry)?;
        self.anchor_address = address.get();
        self.driver.set_ddram_address(address.get())
    }

    /// Moves the cursor to `line × row_shift` through [move_cursor](Self::move_cursor).
    ///
    /// Lines `0..=line_count` are accepted. Anything past `line_count` is logged and ignored.
    ///
    /// # Errors
    /// - `HD44780Error::AddressOutOfBounds` if the line starts past the end of the DDRAM.
    pub fn return_home(&mut self, line: u8) -> HD44780Result<()> {
        match self.geometry.line_address(line) {
            Some(address) => self.move_cursor(address),
            None => {
                let err = HD44780Error::LineOutOfBounds {
                    line,
                    line_count: self.geometry.line_count,
                };
                error!("Can't return home: {}", err);
                Ok(())
            }
        }
    }

    /// Reads the address counter from the controller.
    pub fn read_current_address(&mut self) -> HD44780Result<u8> {
        self.driver.read_address()
    }

    /// Writes a single character code at the current address.
    pub fn write_byte(&mut self, byte: u8) -> HD44780Result<()> {
        self.driver.send_data(byte)
    }

    /// Writes `text` starting at the current address, then moves back to the anchor if the
    /// display is anchored.
    ///
    /// Characters outside ASCII are written as `?`.
    pub fn print(&mut self, text: &str) -> HD44780Result<()> {
        for c in text.chars() {
            if c.is_ascii() {
                self.driver.send_data(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.driver.send_data(b'?')?;
            }
        }

        if self.anchored {
            self.move_cursor(self.anchor_address)?;
        }
        Ok(())
    }

    /// Makes the cursor move left (`true`) or right (`false`) after each character.
    pub fn reverse_print(&mut self, reverse: bool) -> HD44780Result<()> {
        let direction = if reverse {
            CursorDirection::Left
        } else {
            CursorDirection::Right
        };
        self.driver.set_entry_mode(direction, false)?;
        self.cursor_direction = direction;
        Ok(())
    }

    /// Sends a raw command, for instructions without a dedicated method.
    ///
    /// State tracked by the display isn't updated.
    pub fn issue_raw(&mut self, command: &RawCommand) -> HD44780Result<()> {
        self.driver.send_raw(command)
    }
}
