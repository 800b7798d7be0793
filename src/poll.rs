//! Blocking readers for the kernel's event streams.
//!
//! Edge events are read from a line request fd and info changes from a chip
//! fd. Both are drained by a background thread that sleeps in `poll(2)` on
//! the stream and on a [`Wakeup`] used to stop it.

use std::{
    fs::File,
    io::{self, Read, Write},
    os::fd::{AsFd, BorrowedFd, FromRawFd, OwnedFd},
};

use nix::{
    errno::Errno,
    poll::{PollFd, PollFlags, PollTimeout},
};

/// Records read per `read(2)` call.
const RECORDS_PER_READ: usize = 16;

/// An eventfd that stops a reader thread.
#[derive(Debug)]
pub(crate) struct Wakeup {
    fd: File,
}

impl Wakeup {
    pub fn new() -> io::Result<Self> {
        let raw = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: eventfd just returned this descriptor and nothing else owns it
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        Ok(Self { fd: File::from(fd) })
    }

    pub fn wake(&self) -> io::Result<()> {
        match (&self.fd).write(&1u64.to_ne_bytes()) {
            Ok(_) => Ok(()),
            // Counter saturated, the reader is already being woken
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl AsFd for Wakeup {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    Readable,
    Woken,
}

/// Block until `fd` has data or `wakeup` fires. A pending wakeup wins.
pub(crate) fn wait_readable(fd: BorrowedFd<'_>, wakeup: &Wakeup) -> io::Result<Readiness> {
    loop {
        let mut fds = [
            PollFd::new(fd, PollFlags::POLLIN),
            PollFd::new(wakeup.as_fd(), PollFlags::POLLIN),
        ];

        match nix::poll::poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }

        let ready = |pfd: &PollFd<'_>| {
            pfd.revents()
                .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP))
        };

        if ready(&fds[1]) {
            return Ok(Readiness::Woken);
        }
        if ready(&fds[0]) {
            return Ok(Readiness::Readable);
        }
    }
}

/// Read fixed size records from `file` until `wakeup` fires or the stream
/// fails, handing each one to `on_record`.
pub(crate) fn pump_records<const SIZE: usize>(
    file: &File,
    wakeup: &Wakeup,
    mut on_record: impl FnMut(&[u8; SIZE]),
) -> io::Result<()> {
    let mut buf = vec![0u8; SIZE * RECORDS_PER_READ];

    loop {
        if wait_readable(file.as_fd(), wakeup)? == Readiness::Woken {
            return Ok(());
        }

        let n = match (&*file).read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {
                continue
            }
            Err(e) => return Err(e),
        };

        for record in buf[..n].chunks_exact(SIZE) {
            if let Ok(record) = <&[u8; SIZE]>::try_from(record) {
                on_record(record);
            }
        }
    }
}
