// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The `gpio-cdev-pins` crate publishes the named lines of the Linux [GPIO
//! character device](https://www.kernel.org/doc/Documentation/ABI/testing/gpio-cdev)
//! as individually addressable pins.
//!
//! Every named line of a chip becomes a [`PinHandle`]. A handle does not
//! request its line from the kernel until it is first configured, and requests
//! it exactly once no matter how many threads configure it concurrently. Pins
//! are used through the generic [`Pin`], [`PinIn`] and [`PinOut`] traits,
//! which speak in pulls and edges rather than kernel line flags.
//!
//! # Examples
//!
//! Register every chip and mirror one pin onto another:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use gpio_cdev_pins::{register_all, ChipOptions, Edge, PinIn, PinOut, PinRegistry, Pull};
//!
//! # fn main() -> Result<(), gpio_cdev_pins::Error> {
//! let registry = PinRegistry::new();
//! let _chips = register_all(&registry, &ChipOptions::default())?;
//!
//! let input = registry.by_name("GPIO17").expect("no such pin");
//! let output = registry.by_name("GPIO27").expect("no such pin");
//!
//! input.configure_input(Pull::Up, Edge::Both)?;
//! loop {
//!     if input.wait_for_edge(Some(Duration::from_secs(1))) {
//!         output.configure_output(input.read())?;
//!     }
//! }
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod errors;

pub mod fixed_str;

#[allow(non_camel_case_types)]
pub mod uapi;

pub mod chip;

pub mod gpio;

pub mod line;

pub mod pin;

mod poll;

pub mod registrar;

pub mod registry;

#[cfg(test)]
mod sim;

pub use chip::{chip_names, Chip, ChipOptions, GpioChip};
pub use errors::{Error, Result};
pub use gpio::{Duty, Edge, Frequency, Func, Level, Pin, PinIO, PinIn, PinOut, Pull};
pub use pin::{EdgeSignal, LineInfoCache, PinHandle};
pub use registrar::{register_all, register_chip, register_lines};
pub use registry::{PinRegistry, SharedPin};
