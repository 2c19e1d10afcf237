//! The module for the main app state and logic.

use std::fmt::Debug;
use boardio_gpio::accel::{Acceleration, Accelerometer};
use boardio_gpio::lcd::hd44780::driver::HD44780Driver;
use boardio_gpio::lcd::hd44780::{HD44780Display, HD44780Result};
use log::{debug, info, warn};
use time::OffsetDateTime;
use crate::config::Config;
use crate::utils::fit_to_width;

/// The main app state struct.
pub struct App<'l, D: HD44780Driver, A: Accelerometer> {
    /// The configuration for the app.
    config: Config,
    /// The display the status is shown on.
    lcd: &'l mut HD44780Display<D>,
    /// Shown on the first line.
    hostname: String,
    /// The clock text currently on the display.
    shown_clock: Option<String>,
    /// Sampled on every update, if there is one.
    accel: Option<A>,
    last_acceleration: Option<Acceleration>,
}

impl<'l, D: HD44780Driver, A: Accelerometer> App<'l, D, A>
where
    A::Error: Debug,
{
    /// Creates a new instance of the App.
    pub fn new(
        config: Config,
        lcd: &'l mut HD44780Display<D>,
        hostname: String,
        accel: Option<A>,
    ) -> Self {
        App {
            config,
            lcd,
            hostname,
            shown_clock: None,
            accel,
            last_acceleration: None,
        }
    }

    /// The last successful accelerometer reading.
    pub fn acceleration(&self) -> Option<Acceleration> {
        self.last_acceleration
    }

    fn columns(&self) -> usize {
        self.config.columns as usize
    }

    /// Draws the static part of the screen and anchors the cursor where the clock goes.
    ///
    /// The hostname takes the first line; the clock goes on the second one, or on the first if
    /// the display only has one.
    pub fn start(&mut self) -> HD44780Result<()> {
        self.lcd.set_anchored(false)?;
        self.lcd.clear()?;

        let clock_line = if self.lcd.geometry().line_count > 1 {
            let header = fit_to_width(&self.hostname, self.columns());
            self.lcd.print(&header)?;
            1
        } else {
            0
        };

        self.lcd.return_home(clock_line)?;
        self.lcd.set_anchored(true)?;
        self.shown_clock = None;

        info!("Showing status for {}", self.hostname);
        Ok(())
    }

    /// Samples the accelerometer and refreshes the clock, if it changed since the last update.
    pub fn update(&mut self) -> HD44780Result<()> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        self.update_at(now)
    }

    pub fn update_at(&mut self, now: OffsetDateTime) -> HD44780Result<()> {
        self.sample_acceleration();

        let clock = format_clock(now);
        if self.shown_clock.as_ref() == Some(&clock) {
            return Ok(());
        }

        debug!("Clock: {}", clock);
        let line = fit_to_width(&clock, self.columns());
        self.lcd.print(&line)?;
        self.shown_clock = Some(clock);
        Ok(())
    }

    /// A failed read is logged and the previous reading kept; the display doesn't depend on it.
    fn sample_acceleration(&mut self) {
        let Some(accel) = self.accel.as_mut() else {
            return;
        };
        match accel.read_acceleration() {
            Ok(acceleration) => {
                debug!(
                    "Acceleration: x {}, y {}, z {}",
                    acceleration.x, acceleration.y, acceleration.z
                );
                self.last_acceleration = Some(acceleration);
            }
            Err(e) => warn!("Failed to read acceleration: {:?}", e),
        }
    }
}

/// Formats the time as `HH:MM:SS`.
pub fn format_clock(now: OffsetDateTime) -> String {
    format!("{:02}:{:02}:{:02}", now.hour(), now.minute(), now.second())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardio_gpio::lcd::hd44780::Geometry;
    use boardio_gpio::lcd::hd44780::driver::{BusWidth, DriverConfig, GpioHD44780Driver, Timing};
    use boardio_gpio::accel::lsm303::{DEFAULT_ADDRESS, Lsm303};
    use boardio_gpio::sim::{SimEvent, SimHD44780};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_hal::i2c::ErrorKind;
    use time::Duration;

    type NoAccel = Lsm303<I2cMock>;

    fn lcd(sim: &SimHD44780, lines: u8) -> HD44780Display<GpioHD44780Driver<'_>> {
        let config = DriverConfig::new(BusWidth::Narrow).with_timing(Timing::instant());
        let driver = GpioHD44780Driver::new(sim.pin_assignment().unwrap(), config).unwrap();
        HD44780Display::new(driver, Geometry::new(lines)).unwrap()
    }

    #[test]
    fn clock_is_zero_padded() {
        let at = OffsetDateTime::UNIX_EPOCH + Duration::seconds(3600 * 9 + 60 * 5 + 7);
        assert_eq!(format_clock(at), "09:05:07");
    }

    #[test]
    fn hostname_and_clock_share_the_screen() {
        let sim = SimHD44780::new(4).unwrap();
        let mut lcd = lcd(&sim, 2);
        let config = Config {
            columns: 10,
            ..Config::default()
        };
        let mut app = App::new(config, &mut lcd, "raspberrypi-long".to_string(), None::<NoAccel>);

        app.start().unwrap();
        app.update_at(OffsetDateTime::UNIX_EPOCH).unwrap();

        assert_eq!(sim.text_at(0x00, 10), "raspberryp");
        assert_eq!(sim.text_at(0x40, 10), "00:00:00  ");
        assert_eq!(sim.address(), 0x40);
    }

    #[test]
    fn unchanged_clock_is_not_redrawn() {
        let sim = SimHD44780::new(4).unwrap();
        let mut lcd = lcd(&sim, 1);
        let mut app = App::new(Config::default(), &mut lcd, "host".to_string(), None::<NoAccel>);

        app.start().unwrap();
        app.update_at(OffsetDateTime::UNIX_EPOCH).unwrap();
        sim.clear_events();

        app.update_at(OffsetDateTime::UNIX_EPOCH).unwrap();
        assert!(sim.events().is_empty());

        app.update_at(OffsetDateTime::UNIX_EPOCH + Duration::seconds(1)).unwrap();
        assert!(sim.events().contains(&SimEvent::Data(b'1')));
        assert_eq!(sim.text_at(0x00, 8), "00:00:01");
    }

    #[test]
    fn every_update_samples_the_accelerometer() {
        let expectations = [
            I2cTransaction::write_read(
                DEFAULT_ADDRESS,
                vec![0xA8],
                vec![0x01, 0x00, 0x02, 0x00, 0x00, 0x40],
            ),
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![0xA8], vec![0; 6])
                .with_error(ErrorKind::Other),
        ];
        let sim = SimHD44780::new(4).unwrap();
        let mut lcd = lcd(&sim, 1);
        let accel = Lsm303::new(I2cMock::new(&expectations));
        let mut app = App::new(Config::default(), &mut lcd, "host".to_string(), Some(accel));

        app.start().unwrap();
        assert_eq!(app.acceleration(), None);

        app.update_at(OffsetDateTime::UNIX_EPOCH).unwrap();
        let sampled = Acceleration { x: 1, y: 2, z: 0x4000 };
        assert_eq!(app.acceleration(), Some(sampled));

        // Same second: the clock isn't redrawn, but the sensor is still read.
        app.update_at(OffsetDateTime::UNIX_EPOCH).unwrap();
        assert_eq!(app.acceleration(), Some(sampled));
        assert_eq!(sim.text_at(0x00, 8), "00:00:00");

        app.accel.take().unwrap().release().done();
    }
}
