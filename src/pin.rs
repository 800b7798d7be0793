//! Pins backed by a single line of a [`GpioChip`].
//!
//! A [`PinHandle`] does not touch the hardware until it is first configured.
//! The first configuration requests the line with exactly that configuration,
//! later ones reconfigure the line in place. Edges detected on the line are
//! posted into an [`EdgeSignal`] and metadata changes reported by the kernel
//! replace the handle's [`LineInfo`] snapshot.

use std::{fmt, sync::Arc, time::Duration};

use parking_lot::RwLock;
use tracing::{debug, error, warn, Span};

use crate::{
    chip::{Chip, GpioChip},
    errors::{Error, Result},
    gpio::{Duty, Edge, Frequency, Func, Level, Pin, PinIn, PinOut, Pull, GPIO_FUNCS},
    line::{
        options::{Bias, Direction, Drive, EdgeDetect},
        LineConfig, LineEvent, LineInfo, LineInfoChange, LineRequest,
    },
};

mod edge;
mod info_cache;

pub use edge::{EdgeSignal, BUSY_POLL_THRESHOLD};
pub use info_cache::LineInfoCache;

/// The span pin operations log in, carrying the line's identity and the
/// configuration it was found with.
pub fn pin_span(chip: &str, info: &LineInfo) -> Span {
    tracing::info_span!(
        "pin",
        driver = "gpiocdev",
        chip,
        line = info.offset(),
        line.name = info.name(),
        line.used = info.is_used(),
        line.active_low = info.is_active_low(),
        line.direction = ?info.direction(),
        line.drive = ?info.drive(),
        line.bias = ?info.bias(),
        line.edge = ?info.edge_detection(),
    )
}

struct OpenLine<L> {
    line: L,
    /// Last configuration applied to the line. Unlike the info snapshot this
    /// is never touched by change notifications.
    config: LineConfig,
    /// Whether info change notifications were subscribed to.
    watching: bool,
}

/// A named GPIO line exposed through the [`Pin`], [`PinIn`] and [`PinOut`]
/// traits.
///
/// The line is requested lazily and exactly once, however many threads race
/// to configure it first. It stays requested until [`Pin::halt`].
pub struct PinHandle<C: GpioChip = Chip> {
    chip: Arc<C>,
    span: Span,
    info: Arc<LineInfoCache>,
    edge: Arc<EdgeSignal>,
    line: RwLock<Option<OpenLine<C::Line>>>,
}

impl<C: GpioChip> PinHandle<C> {
    pub fn new(chip: Arc<C>, info: LineInfo, span: Span) -> Self {
        Self {
            chip,
            span,
            info: Arc::new(LineInfoCache::new(info)),
            edge: Arc::new(EdgeSignal::new()),
            line: RwLock::new(None),
        }
    }

    /// The most recent metadata of the line.
    pub fn info(&self) -> Arc<LineInfo> {
        self.info.load()
    }

    pub fn is_open(&self) -> bool {
        self.line.read().is_some()
    }

    fn offset(&self) -> u32 {
        self.info.load().offset()
    }

    /// Request the line with `config` unless it is already requested.
    ///
    /// Returns `true` if this call requested the line, in which case `config`
    /// is already applied. A failure to watch the line's metadata is reported
    /// but leaves the line requested.
    fn init_line(&self, config: &LineConfig) -> Result<bool> {
        if self.line.read().is_some() {
            return Ok(false);
        }

        let mut slot = self.line.write();
        if slot.is_some() {
            debug!("line already opened");
            return Ok(false);
        }

        let offset = self.offset();
        let edge = Arc::clone(&self.edge);
        let line = self
            .chip
            .request_line(offset, config, Box::new(move |_: LineEvent| edge.notify()))
            .map_err(|source| {
                error!(err = %source, "failed to request line");
                Error::Open { offset, source }
            })?;
        self.info.update(|info| info.with_config(config));

        let info = Arc::clone(&self.info);
        let watched = self
            .chip
            .watch_line_info(offset, Box::new(move |change: LineInfoChange| info.store(change.info)));

        *slot = Some(OpenLine {
            line,
            config: *config,
            watching: watched.is_ok(),
        });

        match watched {
            Ok(current) => {
                self.info.store(current);
                debug!("line requested");
                Ok(true)
            }
            Err(source) => Err(Error::Watch { offset, source }),
        }
    }

    /// Run `f` on the requested line with exclusive access to its applied
    /// configuration.
    fn with_open<T>(&self, f: impl FnOnce(&mut OpenLine<C::Line>) -> Result<T>) -> Result<T> {
        let mut slot = self.line.write();
        match slot.as_mut() {
            Some(open) => f(open),
            None => Err(Error::Released {
                offset: self.offset(),
            }),
        }
    }

    fn reconfigure(&self, config: &LineConfig) -> Result<()> {
        self.with_open(|open| self.reconfigure_open(open, config))
    }

    fn reconfigure_open(&self, open: &mut OpenLine<C::Line>, config: &LineConfig) -> Result<()> {
        open.line.reconfigure(config).map_err(|source| Error::Reconfigure {
            offset: open.line.offset(),
            source,
        })?;
        open.config = *config;
        self.info.update(|info| info.with_config(config));
        Ok(())
    }

    /// Request or reconfigure the line as `config`, whichever applies.
    fn apply(&self, config: &LineConfig) -> Result<()> {
        if self.init_line(config)? {
            return Ok(());
        }
        self.reconfigure(config)
    }

    /// Change the output drive mode, keeping the level an output is already
    /// driven to. Lines switching from input start low.
    fn configure_drive(&self, drive: Drive) -> Result<()> {
        let value = match self.line.read().as_ref() {
            Some(open) if open.config.direction() == Direction::Output => open
                .line
                .value()
                .map(|v| v & 1 == 1)
                .map_err(|source| Error::ReadValue {
                    offset: open.line.offset(),
                    source,
                })?,
            _ => false,
        };

        let base = LineConfig::from_info(&self.info.load());
        self.apply(&base.as_output(value).with_drive(drive))
    }
}

/// Translate a pull and edge request into an input configuration on top of
/// `base`. [`Pull::NoChange`] keeps the bias `base` already has.
pub fn input_config(base: LineConfig, pull: Pull, edge: Edge) -> LineConfig {
    let config = base.as_input();
    let config = match pull {
        Pull::NoChange => config,
        Pull::Up => config.with_bias(Bias::PullUp),
        Pull::Down => config.with_bias(Bias::PullDown),
        Pull::Float => config.with_bias(Bias::Disabled),
    };

    config.with_edge_detect(match edge {
        Edge::NoEdge => None,
        Edge::Rising => Some(EdgeDetect::Rising),
        Edge::Falling => Some(EdgeDetect::Falling),
        Edge::Both => Some(EdgeDetect::Both),
    })
}

/// The pull a line's bias corresponds to.
pub fn pull_of(bias: Bias) -> Pull {
    match bias {
        Bias::PullUp => Pull::Up,
        Bias::PullDown => Pull::Down,
        Bias::Disabled => Pull::Float,
        Bias::AsIs => Pull::NoChange,
    }
}

impl<C: GpioChip> fmt::Display for PinHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chip.name(), self.info.load().name())
    }
}

impl<C: GpioChip> fmt::Debug for PinHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinHandle")
            .field("chip", &self.chip.name())
            .field("info", &self.info.load())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

/// A handle dropped without [`Pin::halt`] still stops watching its line. The
/// line itself is released when its request is dropped.
impl<C: GpioChip> Drop for PinHandle<C> {
    fn drop(&mut self) {
        let Some(open) = self.line.get_mut().take() else {
            return;
        };
        if open.watching {
            let offset = open.line.offset();
            if let Err(err) = self.chip.unwatch_line_info(offset) {
                let _span = self.span.enter();
                warn!(%err, "failed to unwatch dropped line");
            }
        }
    }
}

impl<C: GpioChip> Pin for PinHandle<C> {
    fn name(&self) -> String {
        self.info.load().name().to_owned()
    }

    fn number(&self) -> u32 {
        self.offset()
    }

    /// The line name, generalized. A line named after a bus role such as
    /// `SPI0_CS1` reports `SPI_CS1`.
    fn func(&self) -> Func {
        Func::new(self.name()).generalize()
    }

    fn supported_funcs(&self) -> &'static [Func] {
        GPIO_FUNCS
    }

    fn set_func(&self, func: &Func) -> Result<()> {
        let _span = self.span.enter();
        debug!(%func, "set pin function");

        match func {
            f if *f == Func::IN => self.configure_input(Pull::NoChange, Edge::NoEdge),
            f if *f == Func::IN_HIGH => self.configure_input(Pull::Up, Edge::NoEdge),
            f if *f == Func::IN_LOW => self.configure_input(Pull::Down, Edge::NoEdge),
            f if *f == Func::FLOAT => self.configure_input(Pull::Float, Edge::NoEdge),
            f if *f == Func::OUT => self.configure_drive(Drive::PushPull),
            f if *f == Func::OUT_OC => self.configure_drive(Drive::OpenDrain),
            f if *f == Func::OUT_HIGH => self.configure_output(Level::High),
            f if *f == Func::OUT_LOW => self.configure_output(Level::Low),
            f => Err(Error::UnsupportedFunc(f.clone())),
        }
    }

    fn halt(&self) -> Result<()> {
        let _span = self.span.enter();

        let Some(open) = self.line.write().take() else {
            return Ok(());
        };

        let offset = open.line.offset();
        let mut errs = Vec::new();

        if let Err(source) = open.line.close() {
            errs.push(Error::Close { offset, source });
        }
        if open.watching {
            if let Err(source) = self.chip.unwatch_line_info(offset) {
                errs.push(Error::Unwatch { offset, source });
            }
        }

        debug!("line released");
        if errs.is_empty() {
            Ok(())
        } else {
            Err(Error::Halt(errs))
        }
    }
}

impl<C: GpioChip> PinIn for PinHandle<C> {
    fn configure_input(&self, pull: Pull, edge: Edge) -> Result<()> {
        let _span = self.span.enter();
        self.apply(&input_config(LineConfig::from_info(&self.info.load()), pull, edge))
    }

    fn read(&self) -> Level {
        let _span = self.span.enter();

        let slot = self.line.read();
        let Some(open) = slot.as_ref() else {
            error!("reading from unopened pin");
            return Level::Low;
        };

        match open.line.value() {
            Ok(value) => {
                let bit = value & 1;
                if value != bit {
                    warn!(value, "kernel returned invalid non-boolean value");
                }
                Level::from(bit == 1)
            }
            Err(err) => {
                error!(%err, "failed to read pin");
                Level::Low
            }
        }
    }

    fn read_fast(&self) -> Level {
        match self.line.read().as_ref().map(|open| open.line.value()) {
            Some(Ok(value)) => Level::from(value & 1 == 1),
            _ => Level::Low,
        }
    }

    fn wait_for_edge(&self, timeout: Option<Duration>) -> bool {
        self.edge.wait(timeout)
    }

    fn pull(&self) -> Pull {
        pull_of(self.info.load().bias())
    }

    fn default_pull(&self) -> Pull {
        Pull::NoChange
    }
}

impl<C: GpioChip> PinOut for PinHandle<C> {
    /// Drive the line to `level`.
    ///
    /// An unrequested line is requested as an output already at `level`, an
    /// input is reconfigured to an output at `level`, so the line never
    /// passes through the other level on the way.
    fn configure_output(&self, level: Level) -> Result<()> {
        let _span = self.span.enter();

        let value = level.is_high();
        let config = LineConfig::from_info(&self.info.load()).as_output(value);
        if self.init_line(&config)? {
            return Ok(());
        }

        self.with_open(|open| {
            if open.config.direction() != Direction::Output {
                return self.reconfigure_open(open, &config);
            }

            open.line.set_value(value).map_err(|source| Error::SetValue {
                offset: open.line.offset(),
                source,
            })?;
            open.config = open.config.with_value(value);
            Ok(())
        })
    }

    fn pwm(&self, _duty: Duty, _frequency: Frequency) -> Result<()> {
        Err(Error::PwmNotSupported(self.to_string()))
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{atomic::Ordering, Barrier},
        thread,
        time::Instant,
    };

    use tracing_test::traced_test;

    use super::*;
    use crate::{
        line::EventKind,
        sim::{SimChip, SimStats, SIM_CONSUMER},
        uapi::v2::LineFlags,
    };

    fn sim_pin(chip: SimChip, offset: u32) -> (Arc<SimChip>, PinHandle<SimChip>) {
        let chip = Arc::new(chip);
        let info = chip.line_info(offset).unwrap();
        let span = pin_span(chip.name(), &info);
        let pin = PinHandle::new(Arc::clone(&chip), info, span);
        (chip, pin)
    }

    fn gpio17() -> (Arc<SimChip>, PinHandle<SimChip>) {
        sim_pin(SimChip::new("gpiochip0", &["GPIO16", "GPIO17"]), 1)
    }

    #[test]
    pub fn identity() {
        let (_chip, pin) = gpio17();
        assert_eq!(pin.name(), "GPIO17");
        assert_eq!(pin.number(), 1);
        assert_eq!(pin.to_string(), "gpiochip0/GPIO17");
        assert_eq!(pin.func(), Func::new("GPIO17"));
        assert_eq!(pin.supported_funcs().len(), 8);
        assert_eq!(pin.default_pull(), Pull::NoChange);
        assert!(!pin.is_open());
    }

    #[test]
    pub fn func_is_generalized_line_name() {
        let (_chip, pin) = sim_pin(SimChip::new("gpiochip0", &["SPI0_CS1"]), 0);
        assert_eq!(pin.func(), Func::new("SPI_CS1"));
    }

    #[test]
    pub fn concurrent_first_use_opens_once() {
        const THREADS: usize = 8;

        let (chip, pin) = gpio17();
        *chip.stats.open_delay.lock() = Some(Duration::from_millis(20));
        let pin = Arc::new(pin);
        let barrier = Arc::new(Barrier::new(THREADS));

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let pin = Arc::clone(&pin);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    pin.configure_input(Pull::Up, Edge::NoEdge)
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap().unwrap();
        }

        assert_eq!(SimStats::count(&chip.stats.opens), 1);
        assert_eq!(SimStats::count(&chip.stats.watches), 1);
        // Every caller that did not open reconfigures exactly once
        assert_eq!(SimStats::count(&chip.stats.reconfigures), THREADS - 1);
        assert!(pin.is_open());
    }

    #[test]
    pub fn concurrent_first_write_opens_once() {
        const THREADS: usize = 8;

        let (chip, pin) = gpio17();
        *chip.stats.open_delay.lock() = Some(Duration::from_millis(20));
        let pin = Arc::new(pin);
        let barrier = Arc::new(Barrier::new(THREADS));

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let pin = Arc::clone(&pin);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    pin.configure_output(Level::High)
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap().unwrap();
        }

        assert_eq!(SimStats::count(&chip.stats.opens), 1);
        let writes =
            SimStats::count(&chip.stats.set_values) + SimStats::count(&chip.stats.reconfigures);
        assert_eq!(writes, THREADS - 1);
        assert_eq!(pin.read(), Level::High);
    }

    #[test]
    pub fn configuring_open_line_reconfigures_in_place() {
        let (chip, pin) = gpio17();

        pin.configure_input(Pull::NoChange, Edge::NoEdge).unwrap();
        assert_eq!(SimStats::count(&chip.stats.opens), 1);
        assert_eq!(SimStats::count(&chip.stats.reconfigures), 0);

        pin.configure_input(Pull::Down, Edge::Rising).unwrap();
        assert_eq!(SimStats::count(&chip.stats.opens), 1);
        assert_eq!(SimStats::count(&chip.stats.reconfigures), 1);

        pin.configure_output(Level::High).unwrap();
        assert_eq!(SimStats::count(&chip.stats.opens), 1);
        assert_eq!(SimStats::count(&chip.stats.reconfigures), 2);
        assert_eq!(SimStats::count(&chip.stats.set_values), 0);

        // Already an output: only the value changes
        pin.configure_output(Level::Low).unwrap();
        assert_eq!(SimStats::count(&chip.stats.reconfigures), 2);
        assert_eq!(SimStats::count(&chip.stats.set_values), 1);
        assert_eq!(pin.read(), Level::Low);
    }

    #[test]
    pub fn input_translation() {
        let base = LineConfig::input().with_bias(Bias::PullDown);

        let cases = [
            (Pull::NoChange, Edge::NoEdge, Bias::PullDown, None),
            (Pull::Up, Edge::Rising, Bias::PullUp, Some(EdgeDetect::Rising)),
            (Pull::Down, Edge::Falling, Bias::PullDown, Some(EdgeDetect::Falling)),
            (Pull::Float, Edge::Both, Bias::Disabled, Some(EdgeDetect::Both)),
        ];

        for (pull, edge, bias, detect) in cases {
            let config = input_config(base, pull, edge);
            assert_eq!(config.direction(), Direction::Input, "{pull} {edge}");
            assert_eq!(config.bias(), bias, "{pull} {edge}");
            assert_eq!(config.edge_detect(), detect, "{pull} {edge}");
        }
    }

    #[test]
    pub fn input_from_output_drops_value_and_drive() {
        let base = LineConfig::output(true).with_drive(Drive::OpenDrain);
        let config = input_config(base, Pull::Up, Edge::NoEdge);

        assert_eq!(config.value(), None);
        assert_eq!(config.flags(), LineFlags::INPUT | LineFlags::BIAS_PULL_UP);
    }

    #[test]
    pub fn pull_unchanged_keeps_line_bias() {
        let mut chip = SimChip::new("gpiochip0", &["GPIO4"]);
        chip.set_line_info(
            LineInfo::new(0, "GPIO4")
                .unwrap()
                .with_flags(LineFlags::INPUT | LineFlags::BIAS_PULL_UP),
        );
        let (chip, pin) = sim_pin(chip, 0);
        assert_eq!(pin.pull(), Pull::Up);

        pin.configure_input(Pull::NoChange, Edge::NoEdge).unwrap();
        let config = chip.stats.last_config().unwrap();
        assert_eq!(config.bias(), Bias::PullUp);
        assert_eq!(config.edge_detect(), None);
        assert_eq!(pin.pull(), Pull::Up);
    }

    #[test]
    pub fn set_func_routes_through_configuration() {
        let (chip, pin) = gpio17();

        pin.set_func(&Func::IN_HIGH).unwrap();
        assert_eq!(chip.stats.last_config().unwrap().bias(), Bias::PullUp);
        assert_eq!(pin.pull(), Pull::Up);

        pin.set_func(&Func::IN_LOW).unwrap();
        assert_eq!(pin.pull(), Pull::Down);

        pin.set_func(&Func::FLOAT).unwrap();
        assert_eq!(pin.pull(), Pull::Float);

        pin.set_func(&Func::OUT_OC).unwrap();
        let config = chip.stats.last_config().unwrap();
        assert_eq!(config.direction(), Direction::Output);
        assert_eq!(config.drive(), Drive::OpenDrain);
        assert_eq!(config.value(), Some(false));

        pin.set_func(&Func::OUT_HIGH).unwrap();
        assert_eq!(pin.read(), Level::High);

        // Switching drive mode keeps the driven level
        pin.set_func(&Func::OUT).unwrap();
        let config = chip.stats.last_config().unwrap();
        assert_eq!(config.drive(), Drive::PushPull);
        assert_eq!(config.value(), Some(true));

        pin.set_func(&Func::OUT_LOW).unwrap();
        assert_eq!(pin.read(), Level::Low);
        assert_eq!(SimStats::count(&chip.stats.opens), 1);
    }

    #[test]
    pub fn out_func_opens_line_low() {
        let (chip, pin) = gpio17();
        pin.set_func(&Func::OUT).unwrap();

        assert_eq!(SimStats::count(&chip.stats.opens), 1);
        assert_eq!(chip.stats.last_config().unwrap().value(), Some(false));
        assert_eq!(pin.info().direction(), Direction::Output);
    }

    #[test]
    pub fn unsupported_func_leaves_line_alone() {
        let (chip, pin) = gpio17();
        let err = pin.set_func(&Func::new("I2C1_SDA")).unwrap_err();

        assert!(matches!(err, Error::UnsupportedFunc(f) if f.as_str() == "I2C1_SDA"));
        assert_eq!(SimStats::count(&chip.stats.opens), 0);
    }

    #[test]
    pub fn write_before_open_requests_output_at_level() {
        let (chip, pin) = gpio17();

        pin.configure_output(Level::High).unwrap();

        assert_eq!(SimStats::count(&chip.stats.opens), 1);
        assert_eq!(SimStats::count(&chip.stats.reconfigures), 0);
        assert_eq!(SimStats::count(&chip.stats.set_values), 0);
        assert_eq!(chip.stats.last_config().unwrap().value(), Some(true));
        assert_eq!(pin.info().direction(), Direction::Output);
        assert_eq!(pin.read(), Level::High);
    }

    #[test]
    #[traced_test]
    pub fn read_masks_extra_bits() {
        let (chip, pin) = gpio17();
        pin.configure_input(Pull::NoChange, Edge::NoEdge).unwrap();

        chip.stats.raw_value.store(3, Ordering::SeqCst);
        assert_eq!(pin.read(), Level::High);
        assert!(logs_contain("kernel returned invalid non-boolean value"));

        chip.stats.raw_value.store(2, Ordering::SeqCst);
        assert_eq!(pin.read_fast(), Level::Low);
    }

    #[test]
    #[traced_test]
    pub fn read_unopened_pin_is_low() {
        let (_chip, pin) = gpio17();

        assert_eq!(pin.read_fast(), Level::Low);
        assert!(!logs_contain("reading from unopened pin"));

        assert_eq!(pin.read(), Level::Low);
        assert!(logs_contain("reading from unopened pin"));
    }

    #[test]
    #[traced_test]
    pub fn open_failure_leaves_pin_unopened() {
        let (chip, pin) = gpio17();
        chip.stats.fail_open.store(true, Ordering::SeqCst);

        let err = pin.configure_input(Pull::Up, Edge::NoEdge).unwrap_err();
        assert!(matches!(err, Error::Open { offset: 1, .. }));
        assert!(!pin.is_open());
        assert!(logs_contain("failed to request line"));

        chip.stats.fail_open.store(false, Ordering::SeqCst);
        pin.configure_input(Pull::Up, Edge::NoEdge).unwrap();
        assert!(pin.is_open());
        assert_eq!(SimStats::count(&chip.stats.opens), 1);
    }

    #[test]
    pub fn reconfigure_failure_keeps_line() {
        let (chip, pin) = gpio17();
        pin.configure_input(Pull::Up, Edge::NoEdge).unwrap();

        chip.stats.fail_reconfigure.store(true, Ordering::SeqCst);
        let err = pin.configure_input(Pull::Down, Edge::NoEdge).unwrap_err();
        assert!(matches!(err, Error::Reconfigure { offset: 1, .. }));

        assert!(pin.is_open());
        assert_eq!(pin.pull(), Pull::Up);
        chip.stats.raw_value.store(1, Ordering::SeqCst);
        assert_eq!(pin.read(), Level::High);
    }

    #[test]
    pub fn watch_failure_keeps_line_usable() {
        let (chip, pin) = gpio17();
        chip.stats.fail_watch.store(true, Ordering::SeqCst);

        let err = pin.configure_output(Level::High).unwrap_err();
        assert!(matches!(err, Error::Watch { offset: 1, .. }));
        assert!(pin.is_open());
        assert_eq!(pin.read(), Level::High);

        pin.configure_output(Level::Low).unwrap();
        assert_eq!(pin.read(), Level::Low);
        assert_eq!(SimStats::count(&chip.stats.opens), 1);

        // Nothing was watched, so nothing is unwatched
        pin.halt().unwrap();
        assert_eq!(SimStats::count(&chip.stats.unwatches), 0);
    }

    #[test]
    pub fn halt_releases_once() {
        let (chip, pin) = gpio17();

        pin.halt().unwrap();
        assert_eq!(SimStats::count(&chip.stats.closes), 0);
        assert_eq!(SimStats::count(&chip.stats.unwatches), 0);

        pin.configure_input(Pull::NoChange, Edge::Both).unwrap();
        assert!(chip.is_watched(1));

        pin.halt().unwrap();
        pin.halt().unwrap();
        assert!(!pin.is_open());
        assert!(!chip.is_watched(1));
        assert_eq!(SimStats::count(&chip.stats.closes), 1);
        assert_eq!(SimStats::count(&chip.stats.unwatches), 1);

        // A halted pin is requested again on next use
        pin.configure_input(Pull::NoChange, Edge::NoEdge).unwrap();
        assert_eq!(SimStats::count(&chip.stats.opens), 2);
    }

    #[test]
    pub fn halt_attempts_every_cleanup_step() {
        let (chip, pin) = gpio17();
        pin.configure_input(Pull::NoChange, Edge::NoEdge).unwrap();

        chip.stats.fail_close.store(true, Ordering::SeqCst);
        chip.stats.fail_unwatch.store(true, Ordering::SeqCst);

        let err = pin.halt().unwrap_err();
        match &err {
            Error::Halt(errs) => {
                assert_eq!(errs.len(), 2);
                assert!(matches!(errs[0], Error::Close { offset: 1, .. }));
                assert!(matches!(errs[1], Error::Unwatch { offset: 1, .. }));
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(SimStats::count(&chip.stats.unwatches), 1);
        assert!(!pin.is_open());

        // Nothing left to release
        pin.halt().unwrap();
    }

    #[test]
    pub fn edges_wake_waiters() {
        let (chip, pin) = gpio17();
        pin.configure_input(Pull::Up, Edge::Both).unwrap();
        assert!(!pin.wait_for_edge(Some(Duration::ZERO)));

        chip.emit_edge(1, EventKind::Rising);
        chip.emit_edge(1, EventKind::Falling);
        assert!(pin.wait_for_edge(Some(Duration::ZERO)));
        assert!(!pin.wait_for_edge(Some(Duration::from_millis(10))));

        let pin = Arc::new(pin);
        let waiter = {
            let pin = Arc::clone(&pin);
            thread::spawn(move || {
                let start = Instant::now();
                (pin.wait_for_edge(Some(Duration::from_millis(500))), start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(50));
        chip.emit_edge(1, EventKind::Rising);

        let (edge, elapsed) = waiter.join().unwrap();
        assert!(edge);
        assert!(elapsed < Duration::from_millis(400));
    }

    #[test]
    pub fn info_changes_replace_snapshot() {
        let (chip, pin) = gpio17();
        pin.configure_input(Pull::Up, Edge::NoEdge).unwrap();
        let before = pin.info();

        chip.emit_info_change(
            LineInfo::new(1, "GPIO17")
                .unwrap()
                .with_flags(LineFlags::USED | LineFlags::INPUT | LineFlags::BIAS_DISABLED),
        );

        assert_eq!(pin.pull(), Pull::Float);
        assert_eq!(before.bias(), Bias::PullUp);
    }

    #[test]
    pub fn late_output_info_change_does_not_skip_reconfigure() {
        let (chip, pin) = gpio17();
        pin.configure_output(Level::High).unwrap();
        pin.configure_input(Pull::Up, Edge::NoEdge).unwrap();
        assert_eq!(SimStats::count(&chip.stats.reconfigures), 1);

        // Notification of the earlier output request arriving after the
        // switch back to input
        chip.emit_info_change(
            LineInfo::new(1, "GPIO17")
                .unwrap()
                .with_flags(LineFlags::USED | LineFlags::OUTPUT),
        );
        assert_eq!(pin.info().direction(), Direction::Output);

        pin.configure_output(Level::Low).unwrap();
        assert_eq!(SimStats::count(&chip.stats.reconfigures), 2);
        assert_eq!(SimStats::count(&chip.stats.set_values), 0);

        let config = chip.stats.last_config().unwrap();
        assert_eq!(config.direction(), Direction::Output);
        assert_eq!(config.value(), Some(false));
    }

    #[test]
    pub fn late_input_info_change_keeps_driven_level() {
        let (chip, pin) = gpio17();
        pin.configure_output(Level::High).unwrap();

        chip.emit_info_change(
            LineInfo::new(1, "GPIO17")
                .unwrap()
                .with_flags(LineFlags::USED | LineFlags::INPUT),
        );

        pin.set_func(&Func::OUT_OC).unwrap();
        let config = chip.stats.last_config().unwrap();
        assert_eq!(config.drive(), Drive::OpenDrain);
        assert_eq!(config.value(), Some(true));
    }

    #[test]
    pub fn drive_change_read_failure_is_a_read_error() {
        let (chip, pin) = gpio17();
        pin.configure_output(Level::High).unwrap();
        chip.stats.fail_value.store(true, Ordering::SeqCst);

        let err = pin.set_func(&Func::OUT_OC).unwrap_err();
        assert!(matches!(err, Error::ReadValue { offset: 1, .. }));
        assert!(err.to_string().starts_with("failed to read line 1 value"), "{err}");
        assert_eq!(SimStats::count(&chip.stats.reconfigures), 0);
    }

    #[test]
    pub fn dropping_open_pin_stops_watching() {
        let (chip, pin) = gpio17();
        pin.configure_input(Pull::NoChange, Edge::Both).unwrap();
        assert!(chip.is_watched(1));

        drop(pin);
        assert!(!chip.is_watched(1));
        assert_eq!(SimStats::count(&chip.stats.unwatches), 1);
        assert_eq!(SimStats::count(&chip.stats.closes), 1);
    }

    #[test]
    pub fn dropping_halted_pin_does_nothing() {
        let (chip, pin) = gpio17();
        pin.configure_input(Pull::NoChange, Edge::NoEdge).unwrap();
        pin.halt().unwrap();

        drop(pin);
        assert_eq!(SimStats::count(&chip.stats.unwatches), 1);
        assert_eq!(SimStats::count(&chip.stats.closes), 1);
    }

    #[test]
    pub fn opened_line_reports_in_use() {
        let (_chip, pin) = gpio17();
        assert!(!pin.info().is_used());

        pin.configure_input(Pull::Down, Edge::NoEdge).unwrap();
        let info = pin.info();
        assert!(info.is_used());
        assert_eq!(info.consumer(), Some(SIM_CONSUMER));
        assert_eq!(info.bias(), Bias::PullDown);
    }

    #[test]
    pub fn pwm_is_not_supported() {
        let (_chip, pin) = gpio17();
        let err = pin.pwm(Duty::MAX, Frequency::HERTZ).unwrap_err();

        assert!(matches!(err, Error::PwmNotSupported(_)));
        assert_eq!(err.to_string(), "PWM is not supported by gpiochip0/GPIO17");
    }
}
