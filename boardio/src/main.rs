mod config;
mod utils;
mod app;

use std::env::var;
use std::thread;
use std::time::Duration;
use dotenv::dotenv;
use eyre::eyre;
use linux_embedded_hal::I2cdev;
use log::{debug, info, warn};
use sysinfo::System;
use boardio_gpio::{GpioBias, GpioDriver, GpioResult};
use boardio_gpio::accel::lsm303::{INIT_MASK, Lsm303};
use boardio_gpio::gpiod::GpiodDriver;
use boardio_gpio::lcd::hd44780::{HD44780Display, PinAssignment};
use boardio_gpio::lcd::hd44780::driver::GpioHD44780Driver;
use crate::app::App;
use crate::config::Config;
use crate::utils::{configure_pin, parse_pin_list};

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("boardio starting...");

    let hostname = System::host_name().unwrap_or_else(|| "unknown".to_string());
    info!(
        "Running on {} ({})",
        hostname,
        System::long_os_version().unwrap_or_else(|| "unknown OS".to_string())
    );

    // Get pin numbers from env
    let chip = var("BOARDIO_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
    let lcd_rs_pin_no: usize = var("BOARDIO_LCD_PIN_RS")?.parse()?;
    let lcd_rw_pin_no: usize = var("BOARDIO_LCD_PIN_RW")?.parse()?;
    let lcd_e_pin_no: usize = var("BOARDIO_LCD_PIN_E")?.parse()?;
    let lcd_data_pin_nos = parse_pin_list(&var("BOARDIO_LCD_PINS_DATA")?)?;

    info!("LCD @ {} RS: {}, RW: {}, E: {}, Data: {:?}",
        chip, lcd_rs_pin_no, lcd_rw_pin_no, lcd_e_pin_no, lcd_data_pin_nos);

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        if let Err(e) = config.save() {
            warn!("Failed to save default config: {}", e);
        } else {
            info!("Default config saved.");
        }
        config
    };
    debug!("{:?}", config);

    let driver_config = config.driver_config()?;
    let geometry = config.geometry()?;

    debug!("Initializing GPIO driver...");
    let gpio = GpiodDriver::open(&chip)?;
    debug!("{:?} initialized.", gpio);

    debug!("Initializing LCD driver...");
    let mut pins = PinAssignment {
        rs: gpio.get_pin(lcd_rs_pin_no)?,
        rw: gpio.get_pin(lcd_rw_pin_no)?,
        e: gpio.get_pin(lcd_e_pin_no)?,
        data: lcd_data_pin_nos
            .iter()
            .map(|&pin_no| gpio.get_pin(pin_no))
            .collect::<GpioResult<Vec<_>>>()?,
    };
    let active_level = config.active_level();
    for pin in [&mut pins.rs, &mut pins.rw, &mut pins.e] {
        configure_pin(&mut **pin, active_level, GpioBias::None)?;
    }
    for pin in pins.data.iter_mut() {
        configure_pin(&mut **pin, active_level, config.data_bias.into())?;
    }
    let driver = GpioHD44780Driver::new(pins, driver_config)?;
    let mut lcd = HD44780Display::new(driver, geometry)?;
    lcd.set_cursor_visible(config.cursor)?;
    lcd.set_blink(config.blink)?;
    debug!("LCD initialized, pins: {}", lcd.pin_levels()?);

    let accel = match var("BOARDIO_I2C_BUS") {
        Ok(bus) => {
            let bus: u8 = bus.parse()?;
            debug!("Initializing accelerometer on I2C bus {}...", bus);
            let i2c = I2cdev::new(format!("/dev/i2c-{}", bus))?;
            let mut accel = Lsm303::new(i2c);
            accel
                .init(INIT_MASK)
                .map_err(|e| eyre!("Failed to initialize accelerometer: {}", e))?;
            info!("Accelerometer initialized.");
            Some(accel)
        }
        Err(_) => {
            info!("BOARDIO_I2C_BUS not set, running without accelerometer.");
            None
        }
    };

    info!("Starting main loop...");

    let mut app = App::new(config, &mut lcd, hostname, accel);
    app.start()?;
    loop {
        app.update()?;

        // Sleep for 1/4th of a second
        thread::sleep(Duration::from_millis(250));
    }
}
