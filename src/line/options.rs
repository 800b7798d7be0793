//! The native line-request model: direction, bias, drive and edge detection
//! as independent settings plus the value an output line is driven to.

use crate::uapi::{
    self,
    v2::{LineAttrId, LineFlags},
};

use super::LineInfo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Active {
    #[default]
    High,
    Low,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EdgeDetect {
    Rising,
    Falling,
    #[default]
    Both,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Drive {
    #[default]
    PushPull,
    OpenDrain,
    OpenSource,
}

/// Pull resistor setting of a line.
///
/// `AsIs` sets no bias flag at all and leaves the choice to the kernel and
/// firmware, `Disabled` explicitly turns both resistors off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Bias {
    #[default]
    AsIs,
    Disabled,
    PullUp,
    PullDown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventClock {
    #[default]
    Default,
    HardwareTimestampEngine,
    RealTime,
}

/// Complete configuration of a single requested line.
///
/// Built up from [`LineConfig::input`] / [`LineConfig::output`] or seeded from
/// the line's current state with [`LineConfig::from_info`]. Settings that only
/// apply to one direction are dropped when the flags are built, so an output
/// never carries edge detection and an input never carries a drive mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineConfig {
    direction: Direction,
    active: Active,
    bias: Bias,
    drive: Drive,
    edge: Option<EdgeDetect>,
    clock: EventClock,
    value: bool,
}

impl LineConfig {
    pub const fn input() -> Self {
        Self {
            direction: Direction::Input,
            active: Active::High,
            bias: Bias::AsIs,
            drive: Drive::PushPull,
            edge: None,
            clock: EventClock::Default,
            value: false,
        }
    }

    pub const fn output(value: bool) -> Self {
        Self::input().as_output(value)
    }

    /// Describe the configuration the line currently reports, so changing a
    /// single setting leaves the others as they are.
    pub fn from_info(info: &LineInfo) -> Self {
        let flags = info.flags();
        let clock = if flags.contains(LineFlags::EVENT_CLOCK_HTE) {
            EventClock::HardwareTimestampEngine
        } else if flags.contains(LineFlags::EVENT_CLOCK_REALTIME) {
            EventClock::RealTime
        } else {
            EventClock::Default
        };

        Self {
            direction: info.direction(),
            active: if info.is_active_low() {
                Active::Low
            } else {
                Active::High
            },
            bias: info.bias(),
            drive: info.drive(),
            edge: info.edge_detection(),
            clock,
            value: false,
        }
    }

    /// Switch to input. Any output value is forgotten.
    pub const fn as_input(self) -> Self {
        Self {
            direction: Direction::Input,
            value: false,
            ..self
        }
    }

    /// Switch to output driven to `value`. Edge detection is cleared since
    /// the kernel only supports it on inputs.
    pub const fn as_output(self, value: bool) -> Self {
        Self {
            direction: Direction::Output,
            edge: None,
            value,
            ..self
        }
    }

    pub const fn with_active(self, active: Active) -> Self {
        Self { active, ..self }
    }

    pub const fn with_bias(self, bias: Bias) -> Self {
        Self { bias, ..self }
    }

    pub const fn with_drive(self, drive: Drive) -> Self {
        Self { drive, ..self }
    }

    pub const fn with_edge_detect(self, edge: Option<EdgeDetect>) -> Self {
        Self { edge, ..self }
    }

    pub const fn with_clock_source(self, clock: EventClock) -> Self {
        Self { clock, ..self }
    }

    pub const fn with_value(self, value: bool) -> Self {
        Self { value, ..self }
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    pub const fn active(&self) -> Active {
        self.active
    }

    pub const fn bias(&self) -> Bias {
        self.bias
    }

    pub const fn drive(&self) -> Drive {
        self.drive
    }

    pub const fn edge_detect(&self) -> Option<EdgeDetect> {
        match self.direction {
            Direction::Input => self.edge,
            Direction::Output => None,
        }
    }

    pub const fn clock(&self) -> EventClock {
        self.clock
    }

    /// The output value, `None` for inputs.
    pub const fn value(&self) -> Option<bool> {
        match self.direction {
            Direction::Input => None,
            Direction::Output => Some(self.value),
        }
    }

    pub const fn flags(&self) -> LineFlags {
        let flags = match self.direction {
            Direction::Input => LineFlags::INPUT,
            Direction::Output => LineFlags::OUTPUT,
        };

        let flags = match self.active {
            Active::Low => flags.union(LineFlags::ACTIVE_LOW),
            Active::High => flags,
        };

        let flags = match self.bias {
            Bias::PullDown => flags.union(LineFlags::BIAS_PULL_DOWN),
            Bias::PullUp => flags.union(LineFlags::BIAS_PULL_UP),
            Bias::Disabled => flags.union(LineFlags::BIAS_DISABLED),
            Bias::AsIs => flags,
        };

        match self.direction {
            Direction::Output => match self.drive {
                Drive::OpenDrain => flags.union(LineFlags::OPEN_DRAIN),
                Drive::OpenSource => flags.union(LineFlags::OPEN_SOURCE),
                Drive::PushPull => flags,
            },
            Direction::Input => {
                let flags = match self.edge {
                    Some(EdgeDetect::Both) => flags
                        .union(LineFlags::EDGE_RISING)
                        .union(LineFlags::EDGE_FALLING),
                    Some(EdgeDetect::Rising) => flags.union(LineFlags::EDGE_RISING),
                    Some(EdgeDetect::Falling) => flags.union(LineFlags::EDGE_FALLING),
                    None => flags,
                };

                if self.edge.is_some() {
                    match self.clock {
                        EventClock::HardwareTimestampEngine => {
                            flags.union(LineFlags::EVENT_CLOCK_HTE)
                        }
                        EventClock::RealTime => flags.union(LineFlags::EVENT_CLOCK_REALTIME),
                        EventClock::Default => flags,
                    }
                } else {
                    flags
                }
            }
        }
    }

    /// Kernel form of this configuration for a request holding a single line.
    pub(crate) fn build_v2(&self) -> uapi::v2::gpio_line_config {
        let mut config = uapi::v2::gpio_line_config::zeroed();
        config.flags = self.flags().bits();

        if let Some(value) = self.value() {
            let attr = &mut config.attrs[0];
            attr.attr.id = LineAttrId::OutputValues as u32;
            attr.attr.attribute.values = u64::from(value);
            attr.mask = 1;
            config.num_attrs = 1;
        }

        config
    }
}
