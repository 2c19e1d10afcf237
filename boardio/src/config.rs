use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use boardio_gpio::lcd::hd44780::driver::{BusWidth, DriverConfig, PollPolicy, Timing};
use boardio_gpio::lcd::hd44780::{Geometry, HD44780Error};
use boardio_gpio::{GpioActiveLevel, GpioBias};
use dotenv::var;
use log::warn;
use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid display configuration: {0}")]
    Display(#[from] HD44780Error),
    #[error("{columns} columns don't fit in a row shift of {row_shift:#04x}")]
    Columns { columns: u8, row_shift: u8 },
}

/// Pull resistor for the data lines, as written in the config file.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BiasSetting {
    #[default]
    None,
    PullUp,
    PullDown,
}

impl From<BiasSetting> for GpioBias {
    fn from(bias: BiasSetting) -> Self {
        match bias {
            BiasSetting::None => GpioBias::None,
            BiasSetting::PullUp => GpioBias::PullUp,
            BiasSetting::PullDown => GpioBias::PullDown,
        }
    }
}

/// Display settings, loaded from the JSON file named by `CONFIG_FILE` (`config.json` by default).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Number of data lines wired, 4 or 8.
    pub bus_width: u8,
    pub lines: u8,
    pub columns: u8,
    pub row_shift: u8,
    pub strobe_delay_us: u64,
    pub init_strobe_delay_us: u64,
    pub power_on_delay_ms: u64,
    /// How long to wait for a busy controller before giving up. `null` waits forever.
    pub poll_timeout_ms: Option<u64>,
    pub cursor: bool,
    pub blink: bool,
    /// Set when the lines go through an inverting buffer.
    pub active_low: bool,
    pub data_bias: BiasSetting,
}

impl Config {
    pub fn try_load() -> Option<Self> {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("config.json"));
        let config_path = Path::new(config_str);
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader)
                .inspect_err(|e| warn!("Failed to parse {}: {}", config_path.display(), e))
                .ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let config_str = var("CONFIG_FILE").unwrap_or_else(|_| "config.json".to_string());
        let config_path = Path::new(&config_str);
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn timing(&self) -> Timing {
        Timing {
            strobe_delay: Duration::from_micros(self.strobe_delay_us),
            init_strobe_delay: Duration::from_micros(self.init_strobe_delay_us),
            power_on_delay: Duration::from_millis(self.power_on_delay_ms),
        }
    }

    pub fn driver_config(&self) -> Result<DriverConfig, ConfigError> {
        let poll_policy = match self.poll_timeout_ms {
            Some(ms) => PollPolicy::Timeout(Duration::from_millis(ms)),
            None => PollPolicy::Unbounded,
        };

        Ok(DriverConfig::new(BusWidth::try_from(self.bus_width)?)
            .with_timing(self.timing())
            .with_poll_policy(poll_policy))
    }

    pub fn active_level(&self) -> GpioActiveLevel {
        if self.active_low {
            GpioActiveLevel::Low
        } else {
            GpioActiveLevel::High
        }
    }

    pub fn geometry(&self) -> Result<Geometry, ConfigError> {
        if self.lines > 1 && self.columns > self.row_shift {
            return Err(ConfigError::Columns {
                columns: self.columns,
                row_shift: self.row_shift,
            });
        }
        Ok(Geometry::new(self.lines).with_row_shift(self.row_shift))
    }
}

impl Default for Config {
    fn default() -> Self {
        let timing = Timing::default();
        Config {
            bus_width: 4,
            lines: 2,
            columns: 16,
            row_shift: 0x40,
            strobe_delay_us: timing.strobe_delay.as_micros() as u64,
            init_strobe_delay_us: timing.init_strobe_delay.as_micros() as u64,
            power_on_delay_ms: timing.power_on_delay.as_millis() as u64,
            poll_timeout_ms: Some(100),
            cursor: false,
            blink: false,
            active_low: false,
            data_bias: BiasSetting::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_driver_defaults() {
        let config = Config::default();
        assert_eq!(config.timing(), Timing::default());

        let driver_config = config.driver_config().unwrap();
        assert_eq!(driver_config.bus_width, BusWidth::Narrow);
        assert_eq!(
            driver_config.poll_policy,
            PollPolicy::Timeout(Duration::from_millis(100))
        );
        assert_eq!(config.geometry().unwrap(), Geometry::default());
        assert_eq!(config.active_level(), GpioActiveLevel::High);
        assert_eq!(GpioBias::from(config.data_bias), GpioBias::None);
    }

    #[test]
    fn line_polarity_and_pulls_are_read_from_the_file() {
        let config: Config =
            serde_json::from_str(r#"{ "active_low": true, "data_bias": "pull_up" }"#).unwrap();
        assert_eq!(config.active_level(), GpioActiveLevel::Low);
        assert_eq!(GpioBias::from(config.data_bias), GpioBias::PullUp);

        assert!(serde_json::from_str::<Config>(r#"{ "data_bias": "sideways" }"#).is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "bus_width": 8, "poll_timeout_ms": null }"#).unwrap();
        assert_eq!(config.lines, 2);
        assert_eq!(config.driver_config().unwrap().poll_policy, PollPolicy::Unbounded);
        assert_eq!(config.driver_config().unwrap().bus_width, BusWidth::Wide);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = Config {
            bus_width: 6,
            ..Config::default()
        };
        assert!(matches!(
            config.driver_config(),
            Err(ConfigError::Display(HD44780Error::Configuration(_)))
        ));

        let config = Config {
            columns: 80,
            ..Config::default()
        };
        assert!(matches!(config.geometry(), Err(ConfigError::Columns { .. })));
    }
}
