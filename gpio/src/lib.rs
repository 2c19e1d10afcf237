pub mod accel;
pub mod gpiod;
pub mod lcd;
pub mod sim;

use log::error;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("pin is not configured as {0}")]
    WrongDirection(GpioDirection),
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Gets the GPIO pin at the given index.
    ///
    /// The pin starts out as a low output and stays claimed until it's dropped.
    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>>;
}

/// Direction of a GPIO pin.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioDirection {
    Input,
    #[default] Output,
}

impl Display for GpioDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GpioDirection::Input => write!(f, "input"),
            GpioDirection::Output => write!(f, "output"),
        }
    }
}

/// Specifies the active level of the GPIO pin.
///
/// By default, the active level is high.
///
/// Might be software-implemented.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

impl GpioActiveLevel {
    /// Gets the real state that will be outputted on the GPIO pin based on the active level and the value.
    pub fn get_state(&self, value: bool) -> bool {
        match self {
            GpioActiveLevel::High => value,
            GpioActiveLevel::Low => !value,
        }
    }
}

/// Specifies the bias of the GPIO pin.
///
/// You can use this to enable pull-up or pull-down resistors.
/// These should work in both input and output modes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

/// A single digital line that can be driven, sampled and switched between directions.
pub trait GpioPin: Debug {
    /// Gets the current direction of the pin.
    fn direction(&self) -> GpioDirection;
    /// Switches the pin between input and output.
    ///
    /// An output keeps the last level written to it.
    fn set_direction(&mut self, direction: GpioDirection) -> GpioResult<()>;

    /// Reads the level of the pin.
    ///
    /// For an output, this is the level it's currently driven to.
    fn read(&self) -> GpioResult<bool>;
    /// Drives the pin to the given level.
    ///
    /// # Errors
    /// - `GpioError::WrongDirection` if the pin is currently an input.
    fn write(&self, value: bool) -> GpioResult<()>;

    /// Gets whether the GPIO pin supports active level.
    fn supports_active_level(&self) -> bool {
        false
    }
    /// Gets the active level of the GPIO pin.
    fn active_level(&self) -> GpioActiveLevel {
        GpioActiveLevel::High
    }
    /// Sets the active level of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the pin does not support active level.
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    /// Gets whether the GPIO pin supports bias (pull-up/pull-down resistors).
    fn supports_bias(&self) -> bool {
        false
    }
    /// Gets the bias of the GPIO pin.
    fn bias(&self) -> GpioBias {
        GpioBias::None
    }
    /// Sets the bias of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the pin does not support bias.
    fn set_bias(&mut self, _bias: GpioBias) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

/// Switches a group of pins to input for as long as the guard lives.
///
/// Every pin the guard touched is switched back to output when it's dropped, on error paths
/// as well, so a failed read never leaves the bus floating.
#[derive(Debug)]
pub struct InputGuard<'p, 'a> {
    pins: &'p mut [Box<dyn GpioPin + 'a>],
    touched: usize,
}

impl<'p, 'a> InputGuard<'p, 'a> {
    /// Switches all `pins` to input.
    pub fn new(pins: &'p mut [Box<dyn GpioPin + 'a>]) -> GpioResult<Self> {
        let mut guard = InputGuard { pins, touched: 0 };
        while guard.touched < guard.pins.len() {
            let index = guard.touched;
            guard.touched += 1;
            guard.pins[index].set_direction(GpioDirection::Input)?;
        }
        Ok(guard)
    }

    /// Number of pins held by the guard.
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Reads all pins and packs them into a value, first pin as the most significant bit.
    pub fn read_value(&self) -> GpioResult<u8> {
        let mut value = 0u8;
        for pin in self.pins.iter() {
            value = (value << 1) | u8::from(pin.read()?);
        }
        Ok(value)
    }
}

impl Drop for InputGuard<'_, '_> {
    fn drop(&mut self) {
        for pin in self.pins[..self.touched].iter_mut() {
            if let Err(err) = pin.set_direction(GpioDirection::Output) {
                error!("Failed to restore {:?} to output: {}", pin, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimHD44780;

    #[test]
    fn input_guard_restores_outputs_on_drop() {
        let sim = SimHD44780::new(4).unwrap();
        let mut pins = sim.pin_assignment().unwrap().data;

        {
            let guard = InputGuard::new(&mut pins[..2]).unwrap();
            assert_eq!(guard.len(), 2);
            assert_eq!(sim.direction(SimHD44780::PIN_DATA), Some(GpioDirection::Input));
            assert_eq!(sim.direction(SimHD44780::PIN_DATA + 1), Some(GpioDirection::Input));
            assert_eq!(sim.direction(SimHD44780::PIN_DATA + 2), Some(GpioDirection::Output));
        }

        for pin in &pins {
            assert_eq!(pin.direction(), GpioDirection::Output);
        }
    }

    #[test]
    fn idle_bus_reads_low() {
        let sim = SimHD44780::new(4).unwrap();
        let mut pins = sim.pin_assignment().unwrap().data;
        pins[0].write(true).unwrap();

        // The controller only drives the bus during a read strobe.
        let guard = InputGuard::new(&mut pins).unwrap();
        assert_eq!(guard.read_value().unwrap(), 0);
    }

    #[test]
    fn writing_an_input_is_rejected() {
        let sim = SimHD44780::new(8).unwrap();
        let mut pins = sim.pin_assignment().unwrap().data;
        pins[0].set_direction(GpioDirection::Input).unwrap();

        assert_eq!(
            pins[0].write(true),
            Err(GpioError::WrongDirection(GpioDirection::Output))
        );
    }

    #[test]
    fn active_level_inverts_state() {
        assert!(GpioActiveLevel::Low.get_state(false));
        assert!(GpioActiveLevel::High.get_state(true));
    }
}
