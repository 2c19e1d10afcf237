//! Accelerometers.

pub mod lsm303;

/// Raw acceleration on each axis, as reported by the sensor.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Acceleration {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Acceleration {
    /// Decodes the output registers of a sensor laid out as `X_L, X_H, Y_L, Y_H, Z_L, Z_H`.
    pub fn from_le_bytes(bytes: [u8; 6]) -> Self {
        Acceleration {
            x: i16::from_le_bytes([bytes[0], bytes[1]]),
            y: i16::from_le_bytes([bytes[2], bytes[3]]),
            z: i16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }
}

/// A sensor that can be sampled for its current acceleration.
pub trait Accelerometer {
    type Error;

    fn read_acceleration(&mut self) -> Result<Acceleration, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axes_are_little_endian_and_signed() {
        let acceleration = Acceleration::from_le_bytes([0x34, 0x12, 0xFF, 0xFF, 0x00, 0x80]);
        assert_eq!(
            acceleration,
            Acceleration {
                x: 0x1234,
                y: -1,
                z: i16::MIN
            }
        );
    }
}
