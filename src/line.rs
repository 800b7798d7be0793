use std::{
    fs::File,
    io::Result,
    os::fd::{AsRawFd, IntoRawFd, OwnedFd},
    sync::Arc,
    thread::JoinHandle,
};

use parking_lot::{Mutex, RwLock};

use crate::{
    fixed_str::FixedStr,
    poll::{self, Wakeup},
    uapi::{self, v2::LineFlags},
};

mod event;
mod info;
pub mod options;

pub use event::{EventKind, LineEvent};
pub use info::{LineChangeKind, LineInfo, LineInfoChange};
pub use options::LineConfig;

/// Callback for edges detected on a requested line. Runs on the line's
/// reader thread and must not block.
pub type EventHandler = Box<dyn Fn(LineEvent) + Send + Sync>;

/// Callback for metadata changes of a watched line. Runs on the chip's
/// watcher thread and must not block.
pub type InfoChangeHandler = Box<dyn Fn(LineInfoChange) + Send + Sync>;

/// An exclusively held line, as returned by
/// [`GpioChip::request_line`](crate::chip::GpioChip::request_line).
pub trait LineRequest: Send + Sync + 'static {
    fn offset(&self) -> u32;

    /// Apply a new configuration without releasing the line.
    fn reconfigure(&self, config: &LineConfig) -> Result<()>;

    /// The raw value bits reported for the line. Only bit 0 is meaningful.
    fn value(&self) -> Result<u64>;

    fn set_value(&self, value: bool) -> Result<()>;

    /// Release the line. Closing an already closed line succeeds.
    fn close(&self) -> Result<()>;
}

struct EventReader {
    wakeup: Arc<Wakeup>,
    thread: JoinHandle<()>,
}

/// A line requested from a [`Chip`](crate::Chip).
///
/// Edge events are read by a dedicated thread that lives until the line is
/// closed or dropped.
pub struct LineHandle {
    offset: u32,
    fd: RwLock<Option<OwnedFd>>,
    reader: Mutex<Option<EventReader>>,
}

impl LineHandle {
    pub(crate) fn new(offset: u32, fd: OwnedFd, on_event: EventHandler) -> Result<Self> {
        let file = File::from(fd.try_clone()?);
        let wakeup = Arc::new(Wakeup::new()?);

        let thread = std::thread::Builder::new()
            .name(format!("gpio-line-{offset}"))
            .spawn({
                let wakeup = Arc::clone(&wakeup);
                move || read_events(offset, file, &wakeup, on_event)
            })?;

        Ok(Self {
            offset,
            fd: RwLock::new(Some(fd)),
            reader: Mutex::new(Some(EventReader { wakeup, thread })),
        })
    }

    fn with_fd<T>(&self, f: impl FnOnce(std::os::fd::RawFd) -> Result<T>) -> Result<T> {
        let fd = self.fd.read();
        match fd.as_ref() {
            Some(fd) => f(fd.as_raw_fd()),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                format!("line {} is closed", self.offset),
            )),
        }
    }

    fn stop_reader(&self) -> Result<()> {
        let Some(reader) = self.reader.lock().take() else {
            return Ok(());
        };
        reader.wakeup.wake()?;
        reader.thread.join().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("event reader of line {} panicked", self.offset),
            )
        })
    }
}

impl LineRequest for LineHandle {
    fn offset(&self) -> u32 {
        self.offset
    }

    fn reconfigure(&self, config: &LineConfig) -> Result<()> {
        let mut config = config.build_v2();
        self.with_fd(|fd| {
            unsafe { uapi::v2::gpio_line_set_config(fd, &mut config)? };
            Ok(())
        })
    }

    fn value(&self) -> Result<u64> {
        let mut values = uapi::v2::gpio_line_values { bits: 0, mask: 1 };
        self.with_fd(|fd| {
            unsafe { uapi::v2::gpio_line_get_values(fd, &mut values)? };
            Ok(values.bits)
        })
    }

    fn set_value(&self, value: bool) -> Result<()> {
        let mut values = uapi::v2::gpio_line_values {
            bits: u64::from(value),
            mask: 1,
        };
        self.with_fd(|fd| {
            unsafe { uapi::v2::gpio_line_set_values(fd, &mut values)? };
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        let stopped = self.stop_reader();

        if let Some(fd) = self.fd.write().take() {
            // Close by hand so the error is not swallowed by OwnedFd's drop
            if unsafe { libc::close(fd.into_raw_fd()) } < 0 {
                return Err(std::io::Error::last_os_error());
            }
        }

        stopped
    }
}

impl Drop for LineHandle {
    fn drop(&mut self) {
        let _ = self.stop_reader();
    }
}

impl std::fmt::Debug for LineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineHandle")
            .field("offset", &self.offset)
            .field("fd", &*self.fd.read())
            .finish_non_exhaustive()
    }
}

fn read_events(offset: u32, file: File, wakeup: &Wakeup, on_event: EventHandler) {
    const EVENT_SIZE: usize = std::mem::size_of::<uapi::v2::gpio_line_event>();

    let res = poll::pump_records::<EVENT_SIZE>(&file, wakeup, |record| {
        // SAFETY: records are whole gpio_line_event structs written by the kernel
        let raw = unsafe { uapi::v2::gpio_line_event::from_bytes(record) };
        match LineEvent::from_v2(raw) {
            Some(event) => on_event(event),
            None => tracing::trace!(line = offset, id = raw.id, "ignoring unknown line event"),
        }
    });

    if let Err(err) = res {
        tracing::warn!(line = offset, %err, "stopped reading line events");
    }
}
