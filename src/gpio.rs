//! The generic pin contract pins are published through.
//!
//! It is independent of the character device: a [`Pull`] or an
//! [`Edge`] says what the caller wants electrically, and each implementation
//! translates that to its own hardware model.

use std::{borrow::Cow, fmt, time::Duration};

use crate::Result;

/// Logic level of a pin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level.is_high()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Low => "Low",
            Level::High => "High",
        })
    }
}

/// Pull resistor requested for an input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Pull {
    /// No resistor, the input floats.
    Float,
    Down,
    Up,
    /// Keep whatever the pin is configured with.
    #[default]
    NoChange,
}

impl fmt::Display for Pull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Pull::Float => "Float",
            Pull::Down => "PullDown",
            Pull::Up => "PullUp",
            Pull::NoChange => "PullNoChange",
        })
    }
}

/// Transitions an input reports through [`PinIn::wait_for_edge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Edge {
    #[default]
    NoEdge,
    Rising,
    Falling,
    Both,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Edge::NoEdge => "NoEdge",
            Edge::Rising => "RisingEdge",
            Edge::Falling => "FallingEdge",
            Edge::Both => "BothEdges",
        })
    }
}

/// PWM duty cycle, from 0 to [`Duty::MAX`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duty(pub u32);

impl Duty {
    pub const MAX: Duty = Duty(1 << 24);
}

/// Frequency in micro-hertz.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frequency(pub u64);

impl Frequency {
    pub const HERTZ: Frequency = Frequency(1_000_000);
}

/// What a pin does, either one of the GPIO functions below or a bus specific
/// role such as `I2C1_SDA`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Func(Cow<'static, str>);

impl Func {
    /// Input
    pub const IN: Func = Func::from_static("In");
    /// Input, read high
    pub const IN_HIGH: Func = Func::from_static("In/High");
    /// Input, read low
    pub const IN_LOW: Func = Func::from_static("In/Low");
    /// Output, push-pull
    pub const OUT: Func = Func::from_static("Out");
    /// Output, open collector/drain
    pub const OUT_OC: Func = Func::from_static("Out/OC");
    /// Output, driven high
    pub const OUT_HIGH: Func = Func::from_static("Out/High");
    /// Output, driven low
    pub const OUT_LOW: Func = Func::from_static("Out/Low");
    /// Input floating
    pub const FLOAT: Func = Func::from_static("Float");

    pub const fn from_static(name: &'static str) -> Self {
        Func(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Func(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Drop the bus number from a bus specific function: `I2C1_SDA` becomes
    /// `I2C_SDA`, `SPI0_CS1` becomes `SPI_CS1`. Anything else is returned
    /// unchanged.
    pub fn generalize(&self) -> Func {
        let s = self.as_str();
        let Some(underscore) = s.find('_') else {
            return self.clone();
        };

        let prefix = &s[..underscore];
        let stem = prefix.trim_end_matches(|c: char| c.is_ascii_digit());
        if stem.len() == prefix.len() || stem.is_empty() {
            return self.clone();
        }

        Func::new(format!("{stem}{}", &s[underscore..]))
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Func {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Identity and function of a pin.
pub trait Pin: fmt::Display + Send + Sync {
    fn name(&self) -> String;

    /// The logical pin number.
    fn number(&self) -> u32;

    /// The pin's current function.
    fn func(&self) -> Func;

    /// Functions [`Pin::set_func`] accepts.
    fn supported_funcs(&self) -> &'static [Func];

    fn set_func(&self, func: &Func) -> Result<()>;

    /// Return the pin to an inert state, releasing any hardware it holds.
    fn halt(&self) -> Result<()>;
}

pub trait PinIn: Pin {
    /// Configure the pin as an input with the given pull and edge detection.
    fn configure_input(&self, pull: Pull, edge: Edge) -> Result<()>;

    /// Current level. Failures read as [`Level::Low`] and are logged.
    fn read(&self) -> Level;

    /// Like [`PinIn::read`] without any logging.
    fn read_fast(&self) -> Level;

    /// Wait for an edge enabled with [`PinIn::configure_input`].
    ///
    /// `None` waits forever. Returns `false` if the timeout expired first.
    fn wait_for_edge(&self, timeout: Option<Duration>) -> bool;

    fn pull(&self) -> Pull;

    fn default_pull(&self) -> Pull;
}

pub trait PinOut: Pin {
    /// Drive the pin to `level`, configuring it as an output if needed.
    fn configure_output(&self, level: Level) -> Result<()>;

    fn pwm(&self, duty: Duty, frequency: Frequency) -> Result<()>;
}

/// A pin usable as both input and output.
pub trait PinIO: PinIn + PinOut {}

impl<T: PinIn + PinOut> PinIO for T {}

/// Every function a GPIO line can be set to.
pub const GPIO_FUNCS: &[Func] = &[
    Func::IN,
    Func::IN_HIGH,
    Func::IN_LOW,
    Func::OUT,
    Func::OUT_OC,
    Func::OUT_HIGH,
    Func::OUT_LOW,
    Func::FLOAT,
];
