use crate::lcd::hd44780::driver::{
    command, BusWidth, CursorDirection, DriverConfig, HD44780Driver, PollPolicy, RawCommand,
};
use crate::lcd::hd44780::{HD44780Error, HD44780Result};
use crate::{GpioDirection, GpioPin, GpioResult, InputGuard};
use bitvec::prelude::*;
use log::{debug, trace, warn};
use std::fmt::{Display, Formatter};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// The pins an HD44780 is wired to.
#[derive(Debug)]
pub struct PinAssignment<'a> {
    /// Register select.
    pub rs: Box<dyn GpioPin + 'a>,
    /// Read/write.
    pub rw: Box<dyn GpioPin + 'a>,
    /// Enable strobe.
    pub e: Box<dyn GpioPin + 'a>,
    /// Data lines, most significant first: DB7..DB4 for a 4-bit bus, DB7..DB0 for an 8-bit one.
    pub data: Vec<Box<dyn GpioPin + 'a>>,
}

#[derive(Debug)]
enum GpioHD44780Bus<'a> {
    Bus4Bit([Box<dyn GpioPin + 'a>; 4]),
    Bus8Bit([Box<dyn GpioPin + 'a>; 8]),
}

impl<'a> GpioHD44780Bus<'a> {
    fn pins(&self) -> &[Box<dyn GpioPin + 'a>] {
        match self {
            GpioHD44780Bus::Bus4Bit(pins) => pins.as_slice(),
            GpioHD44780Bus::Bus8Bit(pins) => pins.as_slice(),
        }
    }

    fn pins_mut(&mut self) -> &mut [Box<dyn GpioPin + 'a>] {
        match self {
            GpioHD44780Bus::Bus4Bit(pins) => pins.as_mut_slice(),
            GpioHD44780Bus::Bus8Bit(pins) => pins.as_mut_slice(),
        }
    }
}

/// Levels of every pin wired to the controller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PinLevels {
    pub rs: bool,
    pub rw: bool,
    pub e: bool,
    /// Data lines, most significant first.
    pub data: Vec<bool>,
}

impl Display for PinLevels {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "rs: {}, rw: {}, e: {}, db: ", self.rs as u8, self.rw as u8, self.e as u8)?;
        for &level in &self.data {
            write!(f, "{}", level as u8)?;
        }
        Ok(())
    }
}

/// HD44780 driver bit-banging the parallel interface over GPIO pins.
///
/// The pins are owned by the driver and released when it's dropped. Between calls every pin is
/// a low output; data lines are only switched to input while the busy flag or the address
/// counter is being read, and switched back before the call returns, errors included.
///
/// Every transfer holds E high for [Timing::strobe_delay](super::Timing::strobe_delay) and
/// relies on the busy flag, not fixed waits, to pace instructions.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a> {
    pin_rs: Box<dyn GpioPin + 'a>,
    pin_rw: Box<dyn GpioPin + 'a>,
    pin_e: Box<dyn GpioPin + 'a>,
    data_bus: GpioHD44780Bus<'a>,
    config: DriverConfig,
}

impl<'a> GpioHD44780Driver<'a> {
    /// Takes ownership of the pins and drives them all low.
    ///
    /// Doesn't talk to the controller yet; see [HD44780Driver::init].
    ///
    /// # Errors
    /// - `HD44780Error::Configuration` if the number of data pins doesn't match the bus width.
    ///   The pins are released.
    pub fn new(pins: PinAssignment<'a>, config: DriverConfig) -> HD44780Result<Self> {
        let PinAssignment { rs, rw, e, data } = pins;
        let count = data.len();

        let data_bus = match config.bus_width {
            BusWidth::Narrow => GpioHD44780Bus::Bus4Bit(
                data.try_into()
                    .map_err(|_| Self::pin_count_mismatch(config.bus_width, count))?,
            ),
            BusWidth::Wide => GpioHD44780Bus::Bus8Bit(
                data.try_into()
                    .map_err(|_| Self::pin_count_mismatch(config.bus_width, count))?,
            ),
        };

        let mut driver = GpioHD44780Driver {
            pin_rs: rs,
            pin_rw: rw,
            pin_e: e,
            data_bus,
            config,
        };
        driver.reset_pins()?;

        debug!(
            "Created HD44780 driver on a {}-bit bus, polling {:?}",
            config.bus_width.lines(),
            config.poll_policy
        );

        Ok(driver)
    }

    fn pin_count_mismatch(bus_width: BusWidth, count: usize) -> HD44780Error {
        HD44780Error::Configuration(format!(
            "a {}-bit bus needs {} data pins, got {}",
            bus_width.lines(),
            bus_width.lines(),
            count
        ))
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Reads back the level of every pin. Data lines read as input report what the controller
    /// drives, which between calls is nothing.
    pub fn pin_levels(&self) -> GpioResult<PinLevels> {
        Ok(PinLevels {
            rs: self.pin_rs.read()?,
            rw: self.pin_rw.read()?,
            e: self.pin_e.read()?,
            data: self
                .data_bus
                .pins()
                .iter()
                .map(|pin| pin.read())
                .collect::<GpioResult<Vec<_>>>()?,
        })
    }

    fn hold(delay: Duration) {
        if !delay.is_zero() {
            sleep(delay);
        }
    }

    fn pulse_strobe(pin_e: &dyn GpioPin, delay: Duration) -> GpioResult<()> {
        pin_e.write(true)?;
        Self::hold(delay);
        pin_e.write(false)?;
        Ok(())
    }

    /// Makes every pin a low output.
    fn reset_pins(&mut self) -> GpioResult<()> {
        let control = [&mut self.pin_rs, &mut self.pin_rw, &mut self.pin_e];
        for pin in control.into_iter().chain(self.data_bus.pins_mut().iter_mut()) {
            pin.set_direction(GpioDirection::Output)?;
            pin.write(false)?;
        }
        Ok(())
    }

    /// Drives RS, RW and every data line low.
    fn clear_lines(&self) -> GpioResult<()> {
        self.pin_rs.write(false)?;
        self.pin_rw.write(false)?;
        for pin in self.data_bus.pins() {
            pin.write(false)?;
        }
        Ok(())
    }

    /// Puts `bits` on the data lines, first bit on the first line, and pulses E.
    fn write_phase(&self, bits: &BitSlice<u8, Msb0>, delay: Duration) -> GpioResult<()> {
        for (pin, bit) in self.data_bus.pins().iter().zip(bits.iter().by_vals()) {
            pin.write(bit)?;
        }
        Self::pulse_strobe(&*self.pin_e, delay)
    }

    /// Polls until the controller is ready, within the configured [PollPolicy].
    fn wait_ready(&mut self) -> HD44780Result<()> {
        let started = Instant::now();
        let mut polls: u32 = 0;

        while self.poll_ready()? {
            polls = polls.saturating_add(1);

            let exhausted = match self.config.poll_policy {
                PollPolicy::Unbounded => false,
                PollPolicy::MaxPolls(max) => polls >= max,
                PollPolicy::Timeout(limit) => started.elapsed() >= limit,
            };

            if exhausted {
                let elapsed = started.elapsed();
                warn!("HD44780 still busy after {} polls ({:?}), giving up", polls, elapsed);
                return Err(HD44780Error::HardwareTimeout { polls, elapsed });
            }
        }

        Ok(())
    }

    /// Sends one byte with the given RS level: a single phase on an 8-bit bus, high nibble then
    /// low nibble on a 4-bit one. Waits for the controller once, before the first phase.
    fn transfer_byte(&mut self, value: u8, rs: bool) -> HD44780Result<()> {
        trace!("Sending data: {:08b}, RS: {}", value, rs);

        self.wait_ready()?;

        // Set RS pin
        self.pin_rs.write(rs)?;
        // Set RW pin to write
        self.pin_rw.write(false)?;

        let bits = BitArray::<[u8; 1], Msb0>::new([value]);
        let delay = self.config.timing.strobe_delay;
        for phase in bits.chunks(self.config.bus_width.lines()) {
            self.write_phase(phase, delay)?;
        }

        self.clear_lines()?;
        Ok(())
    }
}

impl HD44780Driver for GpioHD44780Driver<'_> {
    fn bus_width(&self) -> BusWidth {
        self.config.bus_width
    }

    /// Initializes the controller, whatever state it powered up in.
    ///
    /// After the power-on delay it sends `0011` three times with the longer init strobe, which
    /// puts the controller into 8-bit mode no matter what mode it was in. On a 4-bit bus, `0010`
    /// is then sent on its own to switch to 4-bit mode; the controller still reads it as a full
    /// 8-bit instruction. From there on every instruction is a regular transfer: function set
    /// with the bus width and line count, display on, clear, and auto-increment entry mode.
    fn init(&mut self, multiline: bool) -> HD44780Result<()> {
        let bus_width = self.config.bus_width;
        let timing = self.config.timing;
        debug!(
            "Initializing HD44780 on a {}-bit bus, multiline: {}",
            bus_width.lines(),
            multiline
        );

        self.reset_pins()?;
        Self::hold(timing.power_on_delay);

        // Synchronize
        let reset = BitArray::<[u8; 1], Msb0>::new([command::RESET_INSURANCE]);
        for _ in 0..3 {
            self.write_phase(&reset[..bus_width.lines()], timing.init_strobe_delay)?;
        }
        self.clear_lines()?;

        if bus_width == BusWidth::Narrow {
            self.wait_ready()?;
            let switch = BitArray::<[u8; 1], Msb0>::new([command::function_set(false, false)]);
            self.write_phase(&switch[..4], timing.strobe_delay)?;
            self.clear_lines()?;
        }

        self.send_command(command::function_set(bus_width == BusWidth::Wide, multiline))?;
        self.send_command(command::display_control(true, false, false))?;
        self.send_command(command::CLEAR_DISPLAY)?;
        self.send_command(command::entry_mode(CursorDirection::Right, false))?;

        debug!("HD44780 initialized.");
        Ok(())
    }

    /// Reads the busy flag on DB7.
    ///
    /// Only DB7 is switched to input, and only for the duration of the strobe. On a 4-bit bus
    /// E is pulsed a second time so the controller sees a complete nibble pair.
    fn poll_ready(&mut self) -> HD44780Result<bool> {
        let delay = self.config.timing.strobe_delay;
        let bus_width = self.config.bus_width;

        self.clear_lines()?;
        // Set RW pin to read
        self.pin_rw.write(true)?;

        let busy = {
            let flag = InputGuard::new(&mut self.data_bus.pins_mut()[..1])?;

            self.pin_e.write(true)?;
            Self::hold(delay);
            let busy = flag.read_value()? != 0;
            self.pin_e.write(false)?;

            if bus_width == BusWidth::Narrow {
                Self::pulse_strobe(&*self.pin_e, delay)?;
            }

            busy
        };

        self.clear_lines()?;
        Ok(busy)
    }

    fn send_command(&mut self, command: u8) -> HD44780Result<()> {
        self.transfer_byte(command, false)
    }

    fn send_data(&mut self, data: u8) -> HD44780Result<()> {
        self.transfer_byte(data, true)
    }

    /// Sends the command phase by phase, waiting for the controller before each one.
    ///
    /// Data lines stay outputs for the whole command, so raw commands are meant for writes.
    fn send_raw(&mut self, command: &RawCommand) -> HD44780Result<()> {
        trace!(
            "Sending raw command: {:08b}, RS: {}, RW: {}",
            command.value(),
            command.register_select,
            command.read_write
        );

        let delay = self.config.timing.strobe_delay;
        for phase in command.phases(self.config.bus_width) {
            self.wait_ready()?;
            self.pin_rs.write(command.register_select)?;
            self.pin_rw.write(command.read_write)?;
            self.write_phase(phase, delay)?;
        }

        self.clear_lines()?;
        Ok(())
    }

    /// Reads the address counter: one strobe on an 8-bit bus, high then low nibble on a 4-bit
    /// one. The busy flag is masked off.
    fn read_address(&mut self) -> HD44780Result<u8> {
        self.wait_ready()?;

        let delay = self.config.timing.strobe_delay;
        let phases = self.config.bus_width.phases();

        self.clear_lines()?;
        self.pin_rw.write(true)?;

        let mut value: u16 = 0;
        {
            let bus = InputGuard::new(self.data_bus.pins_mut())?;
            for _ in 0..phases {
                self.pin_e.write(true)?;
                Self::hold(delay);
                value = (value << bus.len()) | u16::from(bus.read_value()?);
                self.pin_e.write(false)?;
            }
        }

        self.clear_lines()?;

        let address = (value & 0b01111111) as u8;
        trace!("Read address: {:#04x}", address);
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::driver::Timing;
    use crate::sim::{SimEvent, SimHD44780};
    use crate::GpioDriver;

    fn driver(sim: &SimHD44780, bus_width: BusWidth) -> GpioHD44780Driver<'_> {
        let config = DriverConfig::new(bus_width).with_timing(Timing::instant());
        GpioHD44780Driver::new(sim.pin_assignment().unwrap(), config).unwrap()
    }

    #[test]
    fn wide_init_sequence() {
        let sim = SimHD44780::new(8).unwrap();
        let mut lcd = driver(&sim, BusWidth::Wide);
        lcd.init(true).unwrap();

        use SimEvent::Instruction as I;
        assert_eq!(
            sim.events(),
            vec![I(0x30), I(0x30), I(0x30), I(0x38), I(0x0C), I(0x01), I(0x06)]
        );
        assert!(sim.is_eight_bit());
        assert!(sim.is_two_lines());
    }

    #[test]
    fn narrow_init_switches_to_four_bits() {
        let sim = SimHD44780::new(4).unwrap();
        let mut lcd = driver(&sim, BusWidth::Narrow);
        lcd.init(false).unwrap();

        use SimEvent::Instruction as I;
        assert_eq!(
            sim.events(),
            vec![I(0x30), I(0x30), I(0x30), I(0x20), I(0x20), I(0x0C), I(0x01), I(0x06)]
        );
        assert!(!sim.is_eight_bit());
        assert!(!sim.is_two_lines());
        // 3 reset pulses, the lone 0010 nibble, then 4 instructions of 2 nibbles each.
        assert_eq!(sim.write_strobes(), 3 + 1 + 4 * 2);
    }

    #[test]
    fn wrong_data_pin_count_is_a_configuration_error() {
        let sim = SimHD44780::new(8).unwrap();
        let config = DriverConfig::new(BusWidth::Narrow);
        let err = GpioHD44780Driver::new(sim.pin_assignment().unwrap(), config).unwrap_err();
        assert!(matches!(err, HD44780Error::Configuration(_)));

        // The pins were released along with the failed driver.
        assert!(sim.pin_assignment().is_ok());
    }

    #[test]
    fn idle_pins_are_low_outputs() {
        let sim = SimHD44780::new(4).unwrap();
        let mut lcd = driver(&sim, BusWidth::Narrow);
        lcd.init(true).unwrap();
        lcd.send_data(b'Z').unwrap();

        let levels = lcd.pin_levels().unwrap();
        assert_eq!(levels.to_string(), "rs: 0, rw: 0, e: 0, db: 0000");
        for index in 0..sim.count().unwrap() {
            assert_eq!(sim.direction(index), Some(GpioDirection::Output));
        }
    }

    #[test]
    fn max_polls_turns_a_hung_controller_into_a_timeout() {
        let sim = SimHD44780::new(8).unwrap();
        let config = DriverConfig::new(BusWidth::Wide)
            .with_timing(Timing::instant())
            .with_poll_policy(PollPolicy::MaxPolls(5));
        let mut lcd = GpioHD44780Driver::new(sim.pin_assignment().unwrap(), config).unwrap();
        lcd.init(true).unwrap();

        sim.set_stuck_busy(true);
        let reads_before = sim.read_strobes();
        let err = lcd.send_data(b'x').unwrap_err();

        assert!(matches!(err, HD44780Error::HardwareTimeout { polls: 5, .. }));
        assert_eq!(sim.read_strobes() - reads_before, 5);
        assert_eq!(sim.direction(SimHD44780::PIN_DATA), Some(GpioDirection::Output));
    }

    #[test]
    fn timeout_policy_gives_up_after_the_deadline() {
        let sim = SimHD44780::new(4).unwrap();
        let config = DriverConfig::new(BusWidth::Narrow)
            .with_timing(Timing::instant())
            .with_poll_policy(PollPolicy::Timeout(Duration::from_millis(5)));
        let mut lcd = GpioHD44780Driver::new(sim.pin_assignment().unwrap(), config).unwrap();
        lcd.init(true).unwrap();

        sim.set_stuck_busy(true);
        let err = lcd.send_command(command::CLEAR_DISPLAY).unwrap_err();

        match err {
            HD44780Error::HardwareTimeout { elapsed, polls } => {
                assert!(elapsed >= Duration::from_millis(5));
                assert!(polls > 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
