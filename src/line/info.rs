use std::time::Duration;

use super::*;

use super::options::{Bias, Direction, Drive, EdgeDetect};

/// A snapshot of a line's metadata as reported by the kernel.
///
/// Snapshots are never updated in place. A reconfiguration or a change
/// notification produces a new `LineInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    name: FixedStr<{ uapi::v2::GPIO_MAX_NAME_SIZE }>,
    consumer: FixedStr<{ uapi::v2::GPIO_MAX_NAME_SIZE }>,
    offset: u32,
    flags: LineFlags,
    debounce: Option<Duration>,
}

impl LineInfo {
    /// Metadata of an unused line, for chips that are not backed by the
    /// kernel.
    pub fn new(offset: u32, name: &str) -> Result<Self> {
        Ok(Self {
            name: FixedStr::new(name)?,
            consumer: FixedStr::empty(),
            offset,
            flags: LineFlags::INPUT,
            debounce: None,
        })
    }

    pub fn with_flags(self, flags: LineFlags) -> Self {
        Self { flags, ..self }
    }

    pub fn with_consumer(self, consumer: &str) -> Self {
        Self {
            consumer: FixedStr::truncating(consumer),
            ..self
        }
    }

    /// The snapshot this line reports once `config` has been applied to it.
    pub fn with_config(&self, config: &LineConfig) -> Self {
        Self {
            flags: config.flags() | LineFlags::USED,
            ..self.clone()
        }
    }

    pub(crate) fn from_v2(info: uapi::v2::gpio_line_info) -> Result<Self> {
        let name = FixedStr::from_byte_array(info.name)?;
        let consumer = FixedStr::from_byte_array(info.consumer)?;

        let mut flags = LineFlags::from_bits_retain(info.flags);
        let mut debounce = None;

        let n_attrs = (info.num_attrs as usize).min(uapi::v2::GPIO_LINE_NUM_ATTRS_MAX);
        for attr in &info.attrs[..n_attrs] {
            // SAFETY: the kernel fills the union member selected by `id`.
            unsafe {
                match uapi::v2::LineAttrId::from_raw(attr.id) {
                    Some(uapi::v2::LineAttrId::Flags) => {
                        flags = LineFlags::from_bits_retain(attr.attribute.flags)
                    }
                    Some(uapi::v2::LineAttrId::Debounce) => {
                        let us = attr.attribute.debounce_period_us;
                        debounce = Some(Duration::from_micros(u64::from(us)));
                    }
                    Some(uapi::v2::LineAttrId::OutputValues) => {}
                    None => {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::Unsupported,
                            format!("Invalid gpio line attribute ID: 0x{:X}", attr.id),
                        ))
                    }
                }
            }
        }

        Ok(Self {
            name,
            consumer,
            offset: info.offset,
            flags,
            debounce,
        })
    }

    /// The line name given by the chip driver or device tree, empty if the
    /// line is unnamed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The label of whoever currently holds the line.
    pub fn consumer(&self) -> Option<&str> {
        if self.consumer.is_empty() {
            None
        } else {
            Some(&self.consumer)
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn flags(&self) -> LineFlags {
        self.flags
    }

    pub fn debounce_period(&self) -> Option<Duration> {
        self.debounce
    }

    /// Get the direction of this GPIO if configured
    ///
    /// Lines are considered to be inputs if not explicitly
    /// marked as outputs in the line info flags by the kernel.
    pub fn direction(&self) -> Direction {
        if self.flags.contains(LineFlags::OUTPUT) {
            Direction::Output
        } else {
            Direction::Input
        }
    }

    pub fn bias(&self) -> Bias {
        if self.flags.contains(LineFlags::BIAS_PULL_UP) {
            Bias::PullUp
        } else if self.flags.contains(LineFlags::BIAS_PULL_DOWN) {
            Bias::PullDown
        } else if self.flags.contains(LineFlags::BIAS_DISABLED) {
            Bias::Disabled
        } else {
            Bias::AsIs
        }
    }

    pub fn drive(&self) -> Drive {
        if self.flags.contains(LineFlags::OPEN_DRAIN) {
            Drive::OpenDrain
        } else if self.flags.contains(LineFlags::OPEN_SOURCE) {
            Drive::OpenSource
        } else {
            Drive::PushPull
        }
    }

    pub fn edge_detection(&self) -> Option<EdgeDetect> {
        let rising = self.flags.contains(LineFlags::EDGE_RISING);
        let falling = self.flags.contains(LineFlags::EDGE_FALLING);
        match (rising, falling) {
            (true, true) => Some(EdgeDetect::Both),
            (true, false) => Some(EdgeDetect::Rising),
            (false, true) => Some(EdgeDetect::Falling),
            (false, false) => None,
        }
    }

    /// True if the line is requested by some consumer, or reserved by the kernel
    pub fn is_used(&self) -> bool {
        self.flags.contains(LineFlags::USED)
    }

    /// True if this line is marked as active low in the kernel
    pub fn is_active_low(&self) -> bool {
        self.flags.contains(LineFlags::ACTIVE_LOW)
    }
}

/// What happened to a watched line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChangeKind {
    Requested,
    Released,
    Reconfigured,
}

/// An asynchronous notification that a watched line's metadata changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfoChange {
    pub info: LineInfo,
    pub kind: LineChangeKind,
    pub timestamp: Duration,
}

impl LineInfoChange {
    pub(crate) fn from_v2(change: uapi::v2::gpio_line_info_changed) -> Result<Self> {
        let kind = match uapi::v2::LineChangedType::from_raw(change.event_type) {
            Some(uapi::v2::LineChangedType::Requested) => LineChangeKind::Requested,
            Some(uapi::v2::LineChangedType::Released) => LineChangeKind::Released,
            Some(uapi::v2::LineChangedType::Config) => LineChangeKind::Reconfigured,
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Invalid gpio line change type: {}", change.event_type),
                ))
            }
        };

        Ok(Self {
            info: LineInfo::from_v2(change.info)?,
            kind,
            timestamp: Duration::from_nanos(change.timestamp_ns),
        })
    }
}
