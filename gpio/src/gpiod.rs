//! GpiodDriver implementation for managing GPIO pins using the gpiod library.
//!
//! Works with any board exposing the Linux GPIO character device (`/dev/gpiochipN`).
use crate::{GpioActiveLevel, GpioBias, GpioDirection, GpioDriver, GpioError, GpioPin, GpioResult};
use bitvec::vec::BitVec;
use log::debug;
use std::cell::Cell;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO pins.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_pins: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        let bits = BitVec::repeat(false, n);
        Self {
            chip,
            used_pins: bits,
        }
    }

    /// Opens the GPIO chip at the given path, e.g. `/dev/gpiochip0`.
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        let chip = gpiod::Chip::new(path.as_ref())?;
        debug!("Opened {} ({} lines)", chip.name(), chip.num_lines());
        Ok(Self::new(chip))
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(index, true);

        let mut pin = GpiodPin {
            driver: self,
            pin_index: index,
            active_level: GpioActiveLevel::High,
            bias: GpioBias::None,
            line: None,
            level: Cell::new(false),
        };
        pin.request(GpioDirection::Output)?;

        Ok(Box::new(pin))
    }
}

impl From<GpioActiveLevel> for gpiod::Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => gpiod::Active::High,
            GpioActiveLevel::Low => gpiod::Active::Low,
        }
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

/// The line request currently held for a pin. Switching direction means releasing it and
/// requesting the line again.
enum GpiodLine {
    Input(gpiod::Lines<gpiod::Input>),
    Output(gpiod::Lines<gpiod::Output>),
}

struct GpiodPin<'a> {
    driver: &'a GpiodDriver,
    pin_index: usize,
    active_level: GpioActiveLevel,
    bias: GpioBias,
    line: Option<GpiodLine>,
    level: Cell<bool>,
}

impl GpiodPin<'_> {
    fn request(&mut self, direction: GpioDirection) -> GpioResult<()> {
        // The kernel refuses a second request for a line we still hold.
        self.line = None;

        let offsets = [self.pin_index as u32];
        let line = match direction {
            GpioDirection::Input => GpiodLine::Input(
                self.driver.chip.request_lines(
                    gpiod::Options::input(offsets)
                        .consumer(env!("CARGO_PKG_NAME"))
                        .active(self.active_level.into())
                        .bias(self.bias.into()),
                )?,
            ),
            GpioDirection::Output => {
                let lines = self.driver.chip.request_lines(
                    gpiod::Options::output(offsets)
                        .consumer(env!("CARGO_PKG_NAME"))
                        .active(self.active_level.into())
                        .bias(self.bias.into()),
                )?;
                lines.set_values([self.level.get()])?;
                GpiodLine::Output(lines)
            }
        };
        self.line = Some(line);
        Ok(())
    }
}

impl Debug for GpiodPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][{}]", self.driver, self.pin_index, self.direction())
    }
}

impl GpioPin for GpiodPin<'_> {
    fn direction(&self) -> GpioDirection {
        match self.line {
            Some(GpiodLine::Input(_)) => GpioDirection::Input,
            _ => GpioDirection::Output,
        }
    }

    fn set_direction(&mut self, direction: GpioDirection) -> GpioResult<()> {
        if self.line.is_some() && self.direction() == direction {
            return Ok(());
        }
        self.request(direction)
    }

    fn read(&self) -> GpioResult<bool> {
        match &self.line {
            Some(GpiodLine::Input(line)) => {
                let values = line.get_values([false])?;
                Ok(values[0])
            }
            _ => Ok(self.level.get()),
        }
    }

    fn write(&self, value: bool) -> GpioResult<()> {
        match &self.line {
            Some(GpiodLine::Output(line)) => {
                line.set_values([value])?;
                self.level.set(value);
                Ok(())
            }
            _ => Err(GpioError::WrongDirection(GpioDirection::Output)),
        }
    }

    fn supports_active_level(&self) -> bool {
        true
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        self.request(self.direction())
    }

    fn supports_bias(&self) -> bool {
        true
    }

    fn bias(&self) -> GpioBias {
        self.bias
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.bias = bias;
        self.request(self.direction())
    }
}

impl Drop for GpiodPin<'_> {
    fn drop(&mut self) {
        self.line = None;
        self.driver.used_pins.set_aliased(self.pin_index, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_chip_is_an_io_error() {
        let result = GpiodDriver::open("/dev/gpiochip-does-not-exist");
        assert!(matches!(result, Err(GpioError::Io(_))));
    }
}
