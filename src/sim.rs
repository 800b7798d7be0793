//! An in-memory [`GpioChip`] for exercising the pin layer without hardware.

use std::{
    collections::HashMap,
    io::{Error as IOError, Result},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;

use crate::{
    chip::GpioChip,
    line::{
        EventHandler, EventKind, InfoChangeHandler, LineChangeKind, LineConfig, LineEvent,
        LineInfo, LineInfoChange, LineRequest,
    },
};

/// Call counters and failure switches shared by a chip and its lines.
#[derive(Debug, Default)]
pub(crate) struct SimStats {
    pub opens: AtomicUsize,
    pub reconfigures: AtomicUsize,
    pub set_values: AtomicUsize,
    pub closes: AtomicUsize,
    pub watches: AtomicUsize,
    pub unwatches: AtomicUsize,
    /// What every line reports from `value`.
    pub raw_value: AtomicU64,
    pub fail_open: AtomicBool,
    pub fail_reconfigure: AtomicBool,
    pub fail_value: AtomicBool,
    pub fail_watch: AtomicBool,
    pub fail_close: AtomicBool,
    pub fail_unwatch: AtomicBool,
    /// Held inside `request_line` to widen open races.
    pub open_delay: Mutex<Option<Duration>>,
    /// Last configuration a line was requested or reconfigured with.
    pub last_config: Mutex<Option<LineConfig>>,
}

impl SimStats {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn last_config(&self) -> Option<LineConfig> {
        *self.last_config.lock()
    }

    fn fail_if(flag: &AtomicBool, errno: i32) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(IOError::from_raw_os_error(errno))
        } else {
            Ok(())
        }
    }

    fn apply(&self, config: &LineConfig) {
        if let Some(value) = config.value() {
            self.raw_value.store(u64::from(value), Ordering::SeqCst);
        }
        *self.last_config.lock() = Some(*config);
    }
}

/// Consumer label lines report once requested.
pub(crate) const SIM_CONSUMER: &str = "gpio-cdev-pins";

type Handlers<H> = Arc<Mutex<HashMap<u32, H>>>;

pub(crate) struct SimChip {
    name: String,
    lines: Vec<LineInfo>,
    pub stats: Arc<SimStats>,
    event_handlers: Handlers<EventHandler>,
    info_handlers: Handlers<InfoChangeHandler>,
}

impl SimChip {
    /// A chip with one line per name, empty names give unnamed lines.
    pub fn new(name: &str, line_names: &[&str]) -> Self {
        let lines = line_names
            .iter()
            .zip(0..)
            .map(|(line, offset)| LineInfo::new(offset, line).expect("valid line name"))
            .collect();

        Self {
            name: name.to_owned(),
            lines,
            stats: Arc::default(),
            event_handlers: Arc::default(),
            info_handlers: Arc::default(),
        }
    }

    /// Replace the metadata a line reports before it is requested.
    pub fn set_line_info(&mut self, info: LineInfo) {
        let offset = info.offset() as usize;
        self.lines[offset] = info;
    }

    /// Deliver an edge to whoever holds the line.
    pub fn emit_edge(&self, offset: u32, kind: EventKind) {
        if let Some(handler) = self.event_handlers.lock().get(&offset) {
            handler(LineEvent::new(offset, kind));
        }
    }

    /// Deliver an info change to whoever watches the line.
    pub fn emit_info_change(&self, info: LineInfo) {
        if let Some(handler) = self.info_handlers.lock().get(&info.offset()) {
            handler(LineInfoChange {
                info,
                kind: LineChangeKind::Reconfigured,
                timestamp: Duration::ZERO,
            });
        }
    }

    pub fn is_watched(&self, offset: u32) -> bool {
        self.info_handlers.lock().contains_key(&offset)
    }
}

impl GpioChip for SimChip {
    type Line = SimLine;

    fn name(&self) -> &str {
        &self.name
    }

    fn num_lines(&self) -> u32 {
        self.lines.len() as u32
    }

    fn line_info(&self, offset: u32) -> Result<LineInfo> {
        self.lines
            .get(offset as usize)
            .cloned()
            .ok_or_else(|| IOError::from_raw_os_error(libc::EINVAL))
    }

    fn request_line(
        &self,
        offset: u32,
        config: &LineConfig,
        on_event: EventHandler,
    ) -> Result<SimLine> {
        self.line_info(offset)?;
        if let Some(delay) = *self.stats.open_delay.lock() {
            std::thread::sleep(delay);
        }
        SimStats::fail_if(&self.stats.fail_open, libc::EBUSY)?;

        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        self.stats.apply(config);
        self.event_handlers.lock().insert(offset, on_event);

        Ok(SimLine {
            offset,
            stats: Arc::clone(&self.stats),
            event_handlers: Arc::clone(&self.event_handlers),
            closed: AtomicBool::new(false),
        })
    }

    fn watch_line_info(&self, offset: u32, on_change: InfoChangeHandler) -> Result<LineInfo> {
        let info = self.line_info(offset)?;
        SimStats::fail_if(&self.stats.fail_watch, libc::EPERM)?;

        self.stats.watches.fetch_add(1, Ordering::SeqCst);
        self.info_handlers.lock().insert(offset, on_change);

        Ok(match self.stats.last_config() {
            Some(config) => info.with_config(&config).with_consumer(SIM_CONSUMER),
            None => info,
        })
    }

    fn unwatch_line_info(&self, offset: u32) -> Result<()> {
        self.stats.unwatches.fetch_add(1, Ordering::SeqCst);
        self.info_handlers.lock().remove(&offset);
        SimStats::fail_if(&self.stats.fail_unwatch, libc::EINVAL)
    }
}

pub(crate) struct SimLine {
    offset: u32,
    stats: Arc<SimStats>,
    event_handlers: Handlers<EventHandler>,
    closed: AtomicBool,
}

impl SimLine {
    fn check_open(&self) -> Result<()> {
        SimStats::fail_if(&self.closed, libc::EBADF)
    }
}

impl LineRequest for SimLine {
    fn offset(&self) -> u32 {
        self.offset
    }

    fn reconfigure(&self, config: &LineConfig) -> Result<()> {
        self.check_open()?;
        SimStats::fail_if(&self.stats.fail_reconfigure, libc::EIO)?;

        self.stats.reconfigures.fetch_add(1, Ordering::SeqCst);
        self.stats.apply(config);
        Ok(())
    }

    fn value(&self) -> Result<u64> {
        self.check_open()?;
        SimStats::fail_if(&self.stats.fail_value, libc::EIO)?;
        Ok(self.stats.raw_value.load(Ordering::SeqCst))
    }

    fn set_value(&self, value: bool) -> Result<()> {
        self.check_open()?;
        self.stats.set_values.fetch_add(1, Ordering::SeqCst);
        self.stats.raw_value.store(u64::from(value), Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        self.event_handlers.lock().remove(&self.offset);
        SimStats::fail_if(&self.stats.fail_close, libc::EIO)
    }
}

impl Drop for SimLine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
