// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Line request ABI of the GPIO character device, version 2 (Linux 5.10+).
//!
//! Every struct here mirrors `include/uapi/linux/gpio.h` field for field.
//! Flag and id fields are kept as raw integers so the layout never depends
//! on how a wrapper type is represented; the typed views live in
//! [`LineFlags`], [`LineAttrId`], [`LineEventId`] and [`LineChangedType`].

use std::mem::size_of;

use bitflags::bitflags;
use nix::ioctl_readwrite;

pub const GPIO_LINES_MAX: usize = 64;
pub const GPIO_MAX_NAME_SIZE: usize = 32;
pub const GPIO_LINE_NUM_ATTRS_MAX: usize = 10;

bitflags! {
    /// Informational Flags
    ///
    /// Maps to kernel [`GPIO_V2_LINE_FLAG_*`] flags.
    ///
    /// [`GPIO_V2_LINE_FLAG_*`]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LineFlags: u64 {
        const USED = (1 << 0);
        const ACTIVE_LOW = (1 << 1);
        const INPUT = (1 << 2);
        const OUTPUT = (1 << 3);
        const EDGE_RISING = (1 << 4);
        const EDGE_FALLING = (1 << 5);
        const OPEN_DRAIN = (1 << 6);
        const OPEN_SOURCE = (1 << 7);
        const BIAS_PULL_UP = (1 << 8);
        const BIAS_PULL_DOWN = (1 << 9);
        const BIAS_DISABLED = (1 << 10);
        const EVENT_CLOCK_REALTIME = (1 << 11);
        const EVENT_CLOCK_HTE = (1 << 12);
    }
}

/// Attribute IDs
///
/// Maps to kernel [`GPIO_V2_LINE_ATTR_ID_*`] values.
///
/// [`GPIO_V2_LINE_ATTR_ID_*`]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LineAttrId {
    Flags = 1,
    OutputValues = 2,
    Debounce = 3,
}

impl LineAttrId {
    pub const fn from_raw(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::Flags),
            2 => Some(Self::OutputValues),
            3 => Some(Self::Debounce),
            _ => None,
        }
    }
}

/// Line Event ID
///
/// Maps to kernel [`GPIO_V2_LINE_EVENT_*`] values.
///
/// [`GPIO_V2_LINE_EVENT_*`]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LineEventId {
    RisingEdge = 1,
    FallingEdge = 2,
}

impl LineEventId {
    pub const fn from_raw(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::RisingEdge),
            2 => Some(Self::FallingEdge),
            _ => None,
        }
    }
}

/// Changed Type
///
/// Maps to kernel [`GPIO_V2_LINE_CHANGED_*`] values.
///
/// [`GPIO_V2_LINE_CHANGED_*`]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LineChangedType {
    Requested = 1,
    Released = 2,
    Config = 3,
}

impl LineChangedType {
    pub const fn from_raw(kind: u32) -> Option<Self> {
        match kind {
            1 => Some(Self::Requested),
            2 => Some(Self::Released),
            3 => Some(Self::Config),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct gpio_line_values {
    pub(crate) bits: u64,
    pub(crate) mask: u64,
}

#[derive(Clone, Copy)]
#[repr(C)]
pub union gpio_line_attribute_union {
    /// if `id` is [`LineAttrId::Flags`], the flags for the GPIO line. This
    /// overrides the default flags contained in the [`gpio_line_config`] for
    /// the associated line.
    pub(crate) flags: u64,
    /// if `id` is [`LineAttrId::OutputValues`], a bitmap containing the values
    /// to which the lines will be set, with each bit number corresponding to
    /// the index into `gpio_line_request.offsets`
    pub(crate) values: u64,
    /// if `id` is [`LineAttrId::Debounce`], the desired debounce period, in
    /// microseconds
    pub(crate) debounce_period_us: u32,
}

/// a configurable attribute of a line
#[derive(Clone, Copy)]
#[repr(C)]
pub struct gpio_line_attribute {
    pub(crate) id: u32,
    pub(crate) _padding: u32,
    /// A tagged union when combined with `id`
    pub(crate) attribute: gpio_line_attribute_union,
}

impl gpio_line_attribute {
    pub const fn zeroed() -> Self {
        Self {
            id: 0,
            _padding: 0,
            attribute: gpio_line_attribute_union { values: 0 },
        }
    }
}

impl core::fmt::Debug for gpio_line_attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("gpio_line_attribute");
        s.field("id", &LineAttrId::from_raw(self.id));
        // SAFETY: every variant is plain old data and the union is always
        // fully initialised by `zeroed`.
        unsafe {
            match LineAttrId::from_raw(self.id) {
                Some(LineAttrId::Flags) => {
                    s.field("flags", &LineFlags::from_bits_retain(self.attribute.flags))
                }
                Some(LineAttrId::OutputValues) => s.field("values", &self.attribute.values),
                Some(LineAttrId::Debounce) => {
                    s.field("debounce_period_us", &self.attribute.debounce_period_us)
                }
                None => s.field("raw", &self.attribute.values),
            };
        }
        s.finish()
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_config_attribute {
    pub(crate) attr: gpio_line_attribute,
    pub(crate) mask: u64,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_config {
    pub(crate) flags: u64,
    pub(crate) num_attrs: u32,
    _padding: [u32; 5],
    pub(crate) attrs: [gpio_line_config_attribute; GPIO_LINE_NUM_ATTRS_MAX],
}

impl gpio_line_config {
    pub const fn zeroed() -> Self {
        Self {
            flags: 0,
            num_attrs: 0,
            _padding: [0; 5],
            attrs: [gpio_line_config_attribute {
                attr: gpio_line_attribute::zeroed(),
                mask: 0,
            }; GPIO_LINE_NUM_ATTRS_MAX],
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_request {
    pub(crate) offsets: [u32; GPIO_LINES_MAX],
    pub(crate) consumer: [u8; GPIO_MAX_NAME_SIZE],
    pub(crate) config: gpio_line_config,
    pub(crate) num_lines: u32,
    pub(crate) event_buffer_size: u32,
    _padding: [u32; 5],
    pub(crate) fd: std::os::fd::RawFd,
}

impl gpio_line_request {
    pub const fn zeroed() -> Self {
        Self {
            offsets: [0; GPIO_LINES_MAX],
            consumer: [0; GPIO_MAX_NAME_SIZE],
            config: gpio_line_config::zeroed(),
            num_lines: 0,
            event_buffer_size: 0,
            _padding: [0; 5],
            fd: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_info {
    pub(crate) name: [u8; GPIO_MAX_NAME_SIZE],
    pub(crate) consumer: [u8; GPIO_MAX_NAME_SIZE],
    pub(crate) offset: u32,
    pub(crate) num_attrs: u32,
    pub(crate) flags: u64,
    pub(crate) attrs: [gpio_line_attribute; GPIO_LINE_NUM_ATTRS_MAX],
    pub(crate) _padding: [u32; 4],
}

impl gpio_line_info {
    pub const fn zeroed() -> Self {
        Self {
            name: [0; GPIO_MAX_NAME_SIZE],
            consumer: [0; GPIO_MAX_NAME_SIZE],
            offset: 0,
            num_attrs: 0,
            flags: 0,
            attrs: [gpio_line_attribute::zeroed(); GPIO_LINE_NUM_ATTRS_MAX],
            _padding: [0; 4],
        }
    }
}

impl Default for gpio_line_info {
    #[inline(always)]
    fn default() -> Self {
        Self::zeroed()
    }
}

/// gpio_v2_line_info_changed
///
/// Information about a change in status of a GPIO line, read from the chip fd
/// once the line is watched.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_info_changed {
    pub(crate) info: gpio_line_info,
    pub(crate) timestamp_ns: u64,
    pub(crate) event_type: u32,
    /* Pad struct to 64-bit boundary and reserve space for future use. */
    _padding: [u32; 5],
}

impl gpio_line_info_changed {
    /// # Safety:
    ///
    /// Caller must ensure that the bytes were produced by the kernel for this type
    pub unsafe fn from_bytes(bytes: &[u8; size_of::<gpio_line_info_changed>()]) -> Self {
        let buf_ptr = bytes as *const _ as *const Self;
        unsafe { std::ptr::read_unaligned(buf_ptr) }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_event {
    pub(crate) timestamp_ns: u64,
    pub(crate) id: u32,
    pub(crate) offset: u32,
    pub(crate) seqno: u32,
    pub(crate) line_seqno: u32,
    /* Space reserved for future use. */
    _padding: [u32; 6],
}

impl gpio_line_event {
    #[inline(always)]
    pub const fn zeroed() -> Self {
        Self {
            timestamp_ns: 0,
            id: 0,
            offset: 0,
            seqno: 0,
            line_seqno: 0,
            _padding: [0; 6],
        }
    }

    /// # Safety:
    ///
    /// Caller must ensure that the bytes were produced by the kernel for this type
    pub unsafe fn from_bytes(bytes: &[u8; size_of::<gpio_line_event>()]) -> Self {
        let buf_ptr = bytes as *const _ as *const Self;
        unsafe { std::ptr::read_unaligned(buf_ptr) }
    }
}

impl Default for gpio_line_event {
    #[inline(always)]
    fn default() -> Self {
        Self::zeroed()
    }
}

const _: () = assert!(size_of::<gpio_line_attribute>() == 16);
const _: () = assert!(size_of::<gpio_line_config_attribute>() == 24);
const _: () = assert!(size_of::<gpio_line_config>() == 272);
const _: () = assert!(size_of::<gpio_line_request>() == 592);
const _: () = assert!(size_of::<gpio_line_info>() == 256);
const _: () = assert!(size_of::<gpio_line_info_changed>() == 288);
const _: () = assert!(size_of::<gpio_line_event>() == 48);
const _: () = assert!(size_of::<gpio_line_values>() == 16);

ioctl_readwrite!(gpio_get_line_info, 0xB4, 0x05, gpio_line_info);
ioctl_readwrite!(gpio_get_line_info_watch, 0xB4, 0x06, gpio_line_info);
ioctl_readwrite!(gpio_get_line, 0xB4, 0x07, gpio_line_request);

ioctl_readwrite!(gpio_line_set_config, 0xB4, 0x0D, gpio_line_config);
ioctl_readwrite!(gpio_line_get_values, 0xB4, 0x0E, gpio_line_values);
ioctl_readwrite!(gpio_line_set_values, 0xB4, 0x0F, gpio_line_values);
