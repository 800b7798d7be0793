use std::io::Error as IOError;

use itertools::Itertools;

use crate::gpio::Func;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to request line {offset}: {source}")]
    Open {
        offset: u32,
        #[source]
        source: IOError,
    },
    #[error("failed to reconfigure line {offset}: {source}")]
    Reconfigure {
        offset: u32,
        #[source]
        source: IOError,
    },
    /// The line was acquired but change notifications could not be
    /// subscribed. The line itself stays open and usable.
    #[error("failed to watch line {offset} info: {source}")]
    Watch {
        offset: u32,
        #[source]
        source: IOError,
    },
    #[error("failed to read line {offset} value: {source}")]
    ReadValue {
        offset: u32,
        #[source]
        source: IOError,
    },
    #[error("failed to set line {offset} value: {source}")]
    SetValue {
        offset: u32,
        #[source]
        source: IOError,
    },
    #[error("line {offset} was released while in use")]
    Released { offset: u32 },
    #[error("failed to close line {offset}: {source}")]
    Close {
        offset: u32,
        #[source]
        source: IOError,
    },
    #[error("failed to unwatch line {offset} info: {source}")]
    Unwatch {
        offset: u32,
        #[source]
        source: IOError,
    },
    /// Every cleanup step of a halt that failed.
    #[error("{}", join(.0))]
    Halt(Vec<Error>),
    #[error("unsupported function {:?}", .0.as_str())]
    UnsupportedFunc(Func),
    #[error("PWM is not supported by {0}")]
    PwmNotSupported(String),
    #[error("failed to open gpiochip {name:?}: {source}")]
    ChipOpen {
        name: String,
        #[source]
        source: IOError,
    },
    #[error("failed to get line {offset} info of gpiochip {chip:?}: {source}")]
    ChipLineInfo {
        chip: String,
        offset: u32,
        #[source]
        source: IOError,
    },
    #[error("{kind} {name:?} is already registered")]
    AlreadyRegistered { kind: &'static str, name: String },
    /// Failures of independent registrations, e.g. one per chip.
    #[error("{}", join(.0))]
    Registration(Vec<Error>),
    #[error(transparent)]
    Io(#[from] IOError),
}

impl Error {
    /// Collapse a list of errors: `Ok` if empty, the error itself if there is
    /// only one, otherwise `wrap(errors)`.
    pub(crate) fn join_all(mut errs: Vec<Error>, wrap: fn(Vec<Error>) -> Error) -> Result<()> {
        match errs.len() {
            0 => Ok(()),
            1 => Err(errs.remove(0)),
            _ => Err(wrap(errs)),
        }
    }
}

fn join(errs: &[Error]) -> String {
    errs.iter().join("; ")
}
