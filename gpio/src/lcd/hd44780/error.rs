use crate::GpioError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum HD44780Error {
    /// The driver was configured in a way the hardware can't be driven with. Only returned
    /// while constructing a driver or display.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("line {line} is out of range for a display with {line_count} lines")]
    LineOutOfBounds { line: u8, line_count: u8 },
    #[error("DDRAM address {address:#04x} is outside the display memory (limit {limit:#04x})")]
    AddressOutOfBounds { address: u8, limit: u8 },
    /// The controller kept reporting busy past the configured poll bound.
    #[error("controller still busy after {polls} polls ({elapsed:?})")]
    HardwareTimeout { polls: u32, elapsed: Duration },
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
}

pub type HD44780Result<T> = Result<T, HD44780Error>;
