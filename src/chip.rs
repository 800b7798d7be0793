use std::{
    collections::HashMap,
    fs::File,
    io::Result,
    os::{
        fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd},
        unix::{ffi::OsStrExt, fs::FileTypeExt},
    },
    path::{Path, PathBuf},
    sync::Arc,
    thread::JoinHandle,
};

use bstr::ByteSlice;
use parking_lot::Mutex;

use crate::{
    fixed_str::FixedStr,
    line::{
        EventHandler, InfoChangeHandler, LineConfig, LineHandle, LineInfo, LineInfoChange,
        LineRequest,
    },
    poll::{self, Wakeup},
    uapi,
};

/// The hardware a [`PinHandle`](crate::PinHandle) drives.
///
/// [`Chip`] implements this on top of the kernel character device. The pin
/// layer only ever talks to a chip through this trait.
pub trait GpioChip: Send + Sync + 'static {
    type Line: LineRequest;

    /// Stable display name, e.g. `gpiochip0`.
    fn name(&self) -> &str;

    /// The number of lines/pins indexable through this chip
    fn num_lines(&self) -> u32;

    /// Get the information of a line at a given offset.
    fn line_info(&self, offset: u32) -> Result<LineInfo>;

    /// Request exclusive use of the line at `offset`, configured as `config`.
    ///
    /// `on_event` is called for every edge detected on the line for as long
    /// as it stays requested.
    fn request_line(
        &self,
        offset: u32,
        config: &LineConfig,
        on_event: EventHandler,
    ) -> Result<Self::Line>;

    /// Subscribe to metadata changes of the line at `offset`, returning its
    /// current metadata.
    fn watch_line_info(&self, offset: u32, on_change: InfoChangeHandler) -> Result<LineInfo>;

    fn unwatch_line_info(&self, offset: u32) -> Result<()>;

    fn offsets(&self) -> std::ops::Range<u32> {
        0..self.num_lines()
    }
}

/// Settings applied when opening chips and requesting lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipOptions {
    /// Label attached to every line request, visible to other users of the
    /// chip. Truncated to the 31 bytes the kernel keeps.
    pub consumer: String,
    /// Directory holding the `gpiochipN` character devices.
    pub dev_dir: PathBuf,
}

impl Default for ChipOptions {
    fn default() -> Self {
        Self {
            consumer: env!("CARGO_PKG_NAME").to_owned(),
            dev_dir: PathBuf::from("/dev"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChipInfo {
    name: FixedStr<{ uapi::v2::GPIO_MAX_NAME_SIZE }>,
    label: FixedStr<{ uapi::v2::GPIO_MAX_NAME_SIZE }>,
    lines: u32,
}

impl ChipInfo {
    /// The name of the device driving this GPIO chip in the kernel
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// A functional name for this GPIO chip, such as a product number.  Might
    /// be an empty string.
    ///
    /// As an example, the SoC GPIO chip on a Raspberry Pi is "pinctrl-bcm2835"
    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    /// The number of lines/pins indexable through this chip
    ///
    /// Not all of these may be usable depending on how the hardware is
    /// configured/muxed.
    pub const fn num_lines(&self) -> u32 {
        self.lines
    }
}

struct InfoWatcher {
    wakeup: Arc<Wakeup>,
    thread: JoinHandle<()>,
}

type InfoHandlers = Arc<Mutex<HashMap<u32, InfoChangeHandler>>>;

/// A GPIO Chip maps to the actual device driver instance in hardware that
/// one interacts with to interact with individual GPIOs.  Often these chips
/// map to IP chunks on an SoC but could also be enumerated within the kernel
/// via something like a PCI or USB bus.
///
/// The Linux kernel itself enumerates GPIO character devices at two paths:
/// 1. `/dev/gpiochipN`
/// 2. `/sys/bus/gpiochipN`
///
/// It is best not to assume that a device will always be enumerated in the
/// same order (especially if it is connected via a bus).
///
/// Info change notifications for watched lines are read by one thread per
/// chip, started with the first watch and stopped when the chip is dropped.
pub struct Chip {
    name: String,
    path: PathBuf,
    info: ChipInfo,
    consumer: FixedStr<{ uapi::v2::GPIO_MAX_NAME_SIZE }>,
    fd: OwnedFd,
    watcher: Mutex<Option<InfoWatcher>>,
    info_handlers: InfoHandlers,
}

impl Chip {
    /// Open the GPIO Chip at the provided path (e.g. `/dev/gpiochip<N>`)
    pub fn open(path: &Path, consumer: &str) -> Result<Self> {
        let f = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;
        let fd = OwnedFd::from(f);
        let info = get_info(fd.as_fd())?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| info.name().to_owned());

        Ok(Self {
            name,
            path: path.to_owned(),
            info,
            consumer: FixedStr::truncating(consumer),
            fd,
            watcher: Mutex::new(None),
            info_handlers: Arc::default(),
        })
    }

    /// Open a chip by device name (`gpiochip0`), resolved in
    /// [`ChipOptions::dev_dir`], or by path.
    pub fn by_name(name: &str, options: &ChipOptions) -> Result<Self> {
        let path = if name.contains('/') {
            PathBuf::from(name)
        } else {
            options.dev_dir.join(name)
        };
        Self::open(&path, &options.consumer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &ChipInfo {
        &self.info
    }

    fn ensure_watcher(&self) -> Result<()> {
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            return Ok(());
        }

        let file = File::from(self.fd.try_clone()?);
        let wakeup = Arc::new(Wakeup::new()?);
        let thread = std::thread::Builder::new()
            .name(format!("{}-watch", self.name))
            .spawn({
                let wakeup = Arc::clone(&wakeup);
                let handlers = Arc::clone(&self.info_handlers);
                let chip = self.name.clone();
                move || read_info_changes(&chip, file, &wakeup, &handlers)
            })?;

        *watcher = Some(InfoWatcher { wakeup, thread });
        Ok(())
    }
}

impl GpioChip for Chip {
    type Line = LineHandle;

    fn name(&self) -> &str {
        &self.name
    }

    fn num_lines(&self) -> u32 {
        self.info.num_lines()
    }

    fn line_info(&self, offset: u32) -> Result<LineInfo> {
        let mut info = uapi::v2::gpio_line_info::zeroed();
        info.offset = offset;
        unsafe { uapi::v2::gpio_get_line_info(self.fd.as_raw_fd(), &mut info)? };
        LineInfo::from_v2(info)
    }

    fn request_line(
        &self,
        offset: u32,
        config: &LineConfig,
        on_event: EventHandler,
    ) -> Result<LineHandle> {
        let mut req = uapi::v2::gpio_line_request::zeroed();
        req.offsets[0] = offset;
        req.num_lines = 1;
        req.consumer = self.consumer.into_byte_array();
        req.config = config.build_v2();

        unsafe { uapi::v2::gpio_get_line(self.fd.as_raw_fd(), &mut req)? };

        // SAFETY: the kernel hands us ownership of the new request fd
        let fd = unsafe { OwnedFd::from_raw_fd(req.fd) };
        LineHandle::new(offset, fd, on_event)
    }

    fn watch_line_info(&self, offset: u32, on_change: InfoChangeHandler) -> Result<LineInfo> {
        self.ensure_watcher()?;

        // Register first so no change between the ioctl and the insert is lost
        self.info_handlers.lock().insert(offset, on_change);

        let mut info = uapi::v2::gpio_line_info::zeroed();
        info.offset = offset;
        if let Err(err) = unsafe { uapi::v2::gpio_get_line_info_watch(self.fd.as_raw_fd(), &mut info) } {
            self.info_handlers.lock().remove(&offset);
            return Err(err.into());
        }

        LineInfo::from_v2(info)
    }

    fn unwatch_line_info(&self, offset: u32) -> Result<()> {
        let mut offset_arg = offset;
        let res = unsafe { uapi::gpio_get_lineinfo_unwatch(self.fd.as_raw_fd(), &mut offset_arg) };
        self.info_handlers.lock().remove(&offset);
        res?;
        Ok(())
    }
}

impl Drop for Chip {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.get_mut().take() {
            if watcher.wakeup.wake().is_ok() {
                let _ = watcher.thread.join();
            }
        }
    }
}

impl std::fmt::Debug for Chip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chip")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("info", &self.info)
            .field("fd", &self.fd)
            .finish_non_exhaustive()
    }
}

impl std::os::fd::AsRawFd for Chip {
    #[inline(always)]
    fn as_raw_fd(&self) -> std::os::unix::prelude::RawFd {
        self.fd.as_raw_fd()
    }
}

impl std::os::fd::AsFd for Chip {
    #[inline(always)]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

fn get_info(fd: BorrowedFd<'_>) -> Result<ChipInfo> {
    let mut info = uapi::gpio_chip_info::zeroed();
    // Error condition: -1, already handled
    let _ = unsafe { uapi::gpio_get_chipinfo(fd.as_raw_fd(), &mut info)? };

    Ok(ChipInfo {
        name: FixedStr::from_byte_array(info.name)?,
        label: FixedStr::from_byte_array(info.label)?,
        lines: info.lines,
    })
}

fn read_info_changes(chip: &str, file: File, wakeup: &Wakeup, handlers: &InfoHandlers) {
    const CHANGE_SIZE: usize = std::mem::size_of::<uapi::v2::gpio_line_info_changed>();

    let res = poll::pump_records::<CHANGE_SIZE>(&file, wakeup, |record| {
        // SAFETY: records are whole gpio_line_info_changed structs written by the kernel
        let raw = unsafe { uapi::v2::gpio_line_info_changed::from_bytes(record) };
        match LineInfoChange::from_v2(raw) {
            Ok(change) => {
                if let Some(handler) = handlers.lock().get(&change.info.offset()) {
                    handler(change);
                }
            }
            Err(err) => tracing::warn!(chip, %err, "dropping malformed line info change"),
        }
    });

    if let Err(err) = res {
        tracing::warn!(chip, %err, "stopped watching line info");
    }
}

/// Names of all GPIO chips present in `dev_dir`, sorted.
pub fn chip_names(dev_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in std::fs::read_dir(dev_dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if !file_name.as_bytes().starts_with_str("gpiochip") {
            continue;
        }
        if !entry.file_type()?.is_char_device() {
            continue;
        }
        names.push(file_name.to_string_lossy().into_owned());
    }

    // gpiochip2 before gpiochip10
    names.sort_by(|a, b| {
        let num = |s: &str| s.trim_start_matches("gpiochip").parse::<u32>().ok();
        num(a).cmp(&num(b)).then_with(|| a.cmp(b))
    });
    Ok(names)
}
