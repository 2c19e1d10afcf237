//! HD44780 LCD module.
//!
//! The driver is split in two layers, mirroring how the controller is used:
//!
//! - [driver::HD44780Driver] is the wire protocol: busy-flag polling, byte and nibble transfers,
//!   raw instructions and the power-on initialization sequence. [driver::GpioHD44780Driver]
//!   implements it by bit-banging GPIO pins in either a 4-bit or 8-bit bus width.
//! - [HD44780Display] keeps the display state the controller can't report back (display, cursor
//!   and blink flags, the print anchor) and offers the operations used to put text on screen.
//!
//! ```no_run
//! use boardio_gpio::gpiod::GpiodDriver;
//! use boardio_gpio::lcd::hd44780::{HD44780Display, PinAssignment};
//! use boardio_gpio::GpioDriver;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gpio = GpiodDriver::open("/dev/gpiochip0")?;
//! let pins = PinAssignment {
//!     rs: gpio.get_pin(22)?,
//!     rw: gpio.get_pin(27)?,
//!     e: gpio.get_pin(17)?,
//!     data: vec![gpio.get_pin(21)?, gpio.get_pin(20)?, gpio.get_pin(16)?, gpio.get_pin(26)?],
//! };
//! let mut lcd = HD44780Display::from_pins(pins, 4, 2)?;
//! lcd.print("Hello")?;
//! lcd.return_home(1)?;
//! lcd.print("world")?;
//! # Ok(())
//! # }
//! ```

pub mod driver;
mod display;
mod error;

pub use display::*;
pub use driver::PinAssignment;
pub use error::*;
