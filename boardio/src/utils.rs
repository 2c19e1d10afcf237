use std::num::ParseIntError;
use boardio_gpio::{GpioActiveLevel, GpioBias, GpioError, GpioPin, GpioResult};
use log::{debug, error};

/// Parses a list of pin numbers separated by commas, semicolons or spaces.
pub fn parse_pin_list(pin_str: &str) -> Result<Vec<usize>, ParseIntError> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect()
}

/// Cuts `text` to `width` characters, or pads it with spaces up to `width`.
pub fn fit_to_width(text: &str, width: usize) -> String {
    let mut fitted: String = text.chars().take(width).collect();
    let len = fitted.chars().count();
    fitted.extend(std::iter::repeat_n(' ', width - len));
    fitted
}

/// Sets the active level and bias of `pin`, leaving it alone where it already matches.
///
/// # Errors
/// - `GpioError::NotSupported` if a non-matching setting is requested from a pin that can't do it.
pub fn configure_pin<P: GpioPin + ?Sized>(
    pin: &mut P,
    level: GpioActiveLevel,
    bias: GpioBias,
) -> GpioResult<()> {
    if pin.active_level() != level {
        if !pin.supports_active_level() {
            error!("{:?} can't be made active {:?}", pin, level);
            return Err(GpioError::NotSupported);
        }
        pin.set_active_level(level)?;
        debug!("{:?} is now active {:?}", pin, level);
    }

    if pin.bias() != bias {
        if !pin.supports_bias() {
            error!("{:?} doesn't support bias {:?}", pin, bias);
            return Err(GpioError::NotSupported);
        }
        pin.set_bias(bias)?;
        debug!("{:?} bias set to {:?}", pin, bias);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardio_gpio::GpioDirection;

    #[derive(Debug, Default)]
    struct FakePin {
        configurable: bool,
        level: GpioActiveLevel,
        bias: GpioBias,
        changes: usize,
    }

    impl GpioPin for FakePin {
        fn direction(&self) -> GpioDirection {
            GpioDirection::Output
        }

        fn set_direction(&mut self, _direction: GpioDirection) -> GpioResult<()> {
            Ok(())
        }

        fn read(&self) -> GpioResult<bool> {
            Ok(false)
        }

        fn write(&self, _value: bool) -> GpioResult<()> {
            Ok(())
        }

        fn supports_active_level(&self) -> bool {
            self.configurable
        }

        fn active_level(&self) -> GpioActiveLevel {
            self.level
        }

        fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
            self.level = level;
            self.changes += 1;
            Ok(())
        }

        fn supports_bias(&self) -> bool {
            self.configurable
        }

        fn bias(&self) -> GpioBias {
            self.bias
        }

        fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
            self.bias = bias;
            self.changes += 1;
            Ok(())
        }
    }

    #[test]
    fn pin_lists_accept_mixed_separators() {
        assert_eq!(parse_pin_list("21, 20;16 26"), Ok(vec![21, 20, 16, 26]));
        assert_eq!(parse_pin_list(" 5 "), Ok(vec![5]));
        assert_eq!(parse_pin_list(""), Ok(vec![]));
        assert!(parse_pin_list("5,x").is_err());
    }

    #[test]
    fn text_is_fitted_to_the_row() {
        assert_eq!(fit_to_width("abc", 5), "abc  ");
        assert_eq!(fit_to_width("abcdef", 4), "abcd");
        assert_eq!(fit_to_width("", 2), "  ");
    }

    #[test]
    fn pins_take_the_requested_level_and_bias() {
        let mut pin = FakePin {
            configurable: true,
            ..FakePin::default()
        };

        configure_pin(&mut pin, GpioActiveLevel::Low, GpioBias::PullUp).unwrap();
        assert_eq!(pin.level, GpioActiveLevel::Low);
        assert_eq!(pin.bias, GpioBias::PullUp);
        assert_eq!(pin.changes, 2);

        configure_pin(&mut pin, GpioActiveLevel::Low, GpioBias::PullUp).unwrap();
        assert_eq!(pin.changes, 2);
    }

    #[test]
    fn fixed_pins_only_accept_their_defaults() {
        let mut pin = FakePin::default();

        configure_pin(&mut pin, GpioActiveLevel::High, GpioBias::None).unwrap();
        assert_eq!(
            configure_pin(&mut pin, GpioActiveLevel::Low, GpioBias::None),
            Err(GpioError::NotSupported)
        );
        assert_eq!(
            configure_pin(&mut pin, GpioActiveLevel::High, GpioBias::PullDown),
            Err(GpioError::NotSupported)
        );
        assert_eq!(pin.changes, 0);
    }

    #[test]
    fn boxed_pins_can_be_configured() {
        let mut pin: Box<dyn GpioPin> = Box::new(FakePin {
            configurable: true,
            ..FakePin::default()
        });

        configure_pin(&mut *pin, GpioActiveLevel::High, GpioBias::PullDown).unwrap();
        assert_eq!(pin.bias(), GpioBias::PullDown);
    }
}
