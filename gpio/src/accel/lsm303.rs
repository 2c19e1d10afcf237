//! LSM303 accelerometer over I²C.
//!
//! Only the accelerometer half of the chip is supported. Register accesses are limited to the
//! accelerometer's register block, `CTRL_REG1_A` through `TIME_WINDOW_A`; anything outside is
//! rejected before touching the bus.

use crate::accel::{Acceleration, Accelerometer};
use embedded_hal::i2c::I2c;
use log::{debug, trace};
use thiserror::Error;

/// I²C address of the accelerometer.
pub const DEFAULT_ADDRESS: u8 = 0x19;

/// Enables all three axes at 100 Hz.
pub const INIT_MASK: u8 = 0x57;
/// Powers the accelerometer down, keeping the axes enabled.
pub const DISABLE: u8 = 0x07;
/// Written to `CTRL_REG4_A`: high resolution output.
pub const HIGH_SENSITIVITY: u8 = 0x18;

/// Set on the register address to make multi-byte accesses auto-increment.
const AUTO_INCREMENT: u8 = 0x80;

pub mod register {
    pub const CTRL_REG1_A: u8 = 0x20;
    pub const CTRL_REG2_A: u8 = 0x21;
    pub const CTRL_REG3_A: u8 = 0x22;
    pub const CTRL_REG4_A: u8 = 0x23;
    pub const CTRL_REG5_A: u8 = 0x24;
    pub const CTRL_REG6_A: u8 = 0x25;
    pub const REFERENCE_A: u8 = 0x26;
    pub const STATUS_REG_A: u8 = 0x27;
    pub const OUT_X_L_A: u8 = 0x28;
    pub const OUT_X_H_A: u8 = 0x29;
    pub const OUT_Y_L_A: u8 = 0x2A;
    pub const OUT_Y_H_A: u8 = 0x2B;
    pub const OUT_Z_L_A: u8 = 0x2C;
    pub const OUT_Z_H_A: u8 = 0x2D;
    pub const FIFO_CTRL_REG_A: u8 = 0x2E;
    pub const FIFO_SRC_REG_A: u8 = 0x2F;
    pub const INT1_CFG_A: u8 = 0x30;
    pub const INT1_SOURCE_A: u8 = 0x31;
    pub const INT1_THS_A: u8 = 0x32;
    pub const INT1_DURATION_A: u8 = 0x33;
    pub const INT2_CFG_A: u8 = 0x34;
    pub const INT2_SOURCE_A: u8 = 0x35;
    pub const INT2_THS_A: u8 = 0x36;
    pub const INT2_DURATION_A: u8 = 0x37;
    pub const CLICK_CFG_A: u8 = 0x38;
    pub const CLICK_SRC_A: u8 = 0x39;
    pub const CLICK_THS_A: u8 = 0x3A;
    pub const TIME_LIMIT_A: u8 = 0x3B;
    pub const TIME_LATENCY_A: u8 = 0x3C;
    pub const TIME_WINDOW_A: u8 = 0x3D;
}

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum Lsm303Error<E> {
    #[error("registers {start:#04x}+{count} are outside the accelerometer register block")]
    OutOfBounds { start: u8, count: usize },
    #[error("I2C error: {0:?}")]
    Bus(E),
}

pub type Lsm303Result<T, E> = Result<T, Lsm303Error<E>>;

/// An LSM303 accelerometer on an I²C bus.
#[derive(Debug)]
pub struct Lsm303<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Lsm303<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Lsm303 { i2c, address }
    }

    /// Gives the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn check_bounds(start: u8, count: usize) -> Lsm303Result<(), I2C::Error> {
        let end = start as usize + count;
        if count == 0
            || start < register::CTRL_REG1_A
            || end > register::TIME_WINDOW_A as usize + 1
        {
            return Err(Lsm303Error::OutOfBounds { start, count });
        }
        Ok(())
    }

    /// Enables the accelerometer with `mask` written to `CTRL_REG1_A`. Use [INIT_MASK] for all
    /// axes.
    pub fn init(&mut self, mask: u8) -> Lsm303Result<(), I2C::Error> {
        debug!("Initializing LSM303 at {:#04x}", self.address);
        self.enable(mask)
    }

    /// Writes `mask` to `CTRL_REG1_A` and switches to high sensitivity.
    pub fn enable(&mut self, mask: u8) -> Lsm303Result<(), I2C::Error> {
        self.write_register(register::CTRL_REG1_A, mask)?;
        self.write_register(register::CTRL_REG4_A, HIGH_SENSITIVITY)
    }

    pub fn disable(&mut self) -> Lsm303Result<(), I2C::Error> {
        debug!("Disabling LSM303 at {:#04x}", self.address);
        self.write_register(register::CTRL_REG1_A, DISABLE)
    }

    pub fn write_register(&mut self, register: u8, value: u8) -> Lsm303Result<(), I2C::Error> {
        Self::check_bounds(register, 1)?;
        trace!("LSM303 write {:#04x} <- {:#04x}", register, value);
        self.i2c
            .write(self.address, &[register | AUTO_INCREMENT, value])
            .map_err(Lsm303Error::Bus)
    }

    /// Reads consecutive registers starting at `start` into `buffer`.
    pub fn read_registers(&mut self, start: u8, buffer: &mut [u8]) -> Lsm303Result<(), I2C::Error> {
        Self::check_bounds(start, buffer.len())?;
        self.i2c
            .write_read(self.address, &[start | AUTO_INCREMENT], buffer)
            .map_err(Lsm303Error::Bus)?;
        trace!("LSM303 read {:#04x}: {:02x?}", start, buffer);
        Ok(())
    }
}

impl<I2C: I2c> Accelerometer for Lsm303<I2C> {
    type Error = Lsm303Error<I2C::Error>;

    fn read_acceleration(&mut self) -> Result<Acceleration, Self::Error> {
        let mut bytes = [0u8; 6];
        self.read_registers(register::OUT_X_L_A, &mut bytes)?;
        Ok(Acceleration::from_le_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    #[test]
    fn init_enables_axes_and_sensitivity() {
        let expectations = [
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0xA0, INIT_MASK]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0xA3, HIGH_SENSITIVITY]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![0xA0, DISABLE]),
        ];
        let mut accel = Lsm303::new(I2cMock::new(&expectations));

        accel.init(INIT_MASK).unwrap();
        accel.disable().unwrap();

        accel.release().done();
    }

    #[test]
    fn acceleration_is_read_in_one_burst() {
        let expectations = [I2cTransaction::write_read(
            DEFAULT_ADDRESS,
            vec![0xA8],
            vec![0x10, 0x00, 0xF0, 0xFF, 0x00, 0x40],
        )];
        let mut accel = Lsm303::new(I2cMock::new(&expectations));

        let acceleration = accel.read_acceleration().unwrap();
        assert_eq!(
            acceleration,
            Acceleration {
                x: 16,
                y: -16,
                z: 0x4000
            }
        );

        accel.release().done();
    }

    #[test]
    fn accesses_outside_the_register_block_never_reach_the_bus() {
        let mut accel = Lsm303::new(I2cMock::new(&[]));

        assert!(matches!(
            accel.write_register(0x1F, 0),
            Err(Lsm303Error::OutOfBounds { start: 0x1F, count: 1 })
        ));
        assert!(matches!(
            accel.write_register(0x3E, 0),
            Err(Lsm303Error::OutOfBounds { start: 0x3E, count: 1 })
        ));

        let mut buffer = [0u8; 2];
        assert!(matches!(
            accel.read_registers(0x3D, &mut buffer),
            Err(Lsm303Error::OutOfBounds { start: 0x3D, count: 2 })
        ));
        assert!(accel.read_registers(0x20, &mut []).is_err());

        accel.release().done();
    }

    #[test]
    fn last_register_is_writable() {
        let expectations = [I2cTransaction::write(DEFAULT_ADDRESS, vec![0xBD, 0x01])];
        let mut accel = Lsm303::new(I2cMock::new(&expectations));

        accel.write_register(register::TIME_WINDOW_A, 0x01).unwrap();

        accel.release().done();
    }
}
