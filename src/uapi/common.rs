use nix::{ioctl_read, ioctl_readwrite};

use super::v2::GPIO_MAX_NAME_SIZE;

/// struct gpiochip_info
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_chip_info {
    pub name: [u8; GPIO_MAX_NAME_SIZE],
    pub label: [u8; GPIO_MAX_NAME_SIZE],
    pub lines: u32,
}

impl gpio_chip_info {
    pub const fn zeroed() -> Self {
        Self {
            name: [0; GPIO_MAX_NAME_SIZE],
            label: [0; GPIO_MAX_NAME_SIZE],
            lines: 0,
        }
    }
}

const _: () = assert!(std::mem::size_of::<gpio_chip_info>() == 68);

ioctl_read!(gpio_get_chipinfo, 0xB4, 0x01, gpio_chip_info);

// Takes the offset of the line to stop watching.
ioctl_readwrite!(gpio_get_lineinfo_unwatch, 0xB4, 0x0C, u32);
