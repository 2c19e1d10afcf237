use super::BusWidth;
use std::time::Duration;

/// Timing of the bit-banged protocol.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Timing {
    /// How long E is held high for each transfer phase.
    pub strobe_delay: Duration,
    /// How long E is held high for each of the reset-insurance pulses during initialization.
    pub init_strobe_delay: Duration,
    /// Wait before the first pulse, for the controller's supply to stabilize.
    pub power_on_delay: Duration,
}

impl Timing {
    /// No delays at all. Only useful for simulated controllers.
    pub const fn instant() -> Self {
        Timing {
            strobe_delay: Duration::ZERO,
            init_strobe_delay: Duration::ZERO,
            power_on_delay: Duration::ZERO,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            strobe_delay: Duration::from_micros(50),
            init_strobe_delay: Duration::from_micros(500),
            power_on_delay: Duration::from_millis(15),
        }
    }
}

/// How long to keep polling the busy flag before giving up.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PollPolicy {
    /// Poll until the controller is ready, however long it takes. A disconnected or hung
    /// controller blocks the caller forever.
    #[default]
    Unbounded,
    /// Give up after this many busy answers.
    MaxPolls(u32),
    /// Give up once this much time has passed since the first poll.
    Timeout(Duration),
}

/// Configuration of a [GpioHD44780Driver](super::GpioHD44780Driver).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DriverConfig {
    pub bus_width: BusWidth,
    pub timing: Timing,
    pub poll_policy: PollPolicy,
}

impl DriverConfig {
    pub fn new(bus_width: BusWidth) -> Self {
        DriverConfig {
            bus_width,
            timing: Timing::default(),
            poll_policy: PollPolicy::default(),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.poll_policy = poll_policy;
        self
    }
}
