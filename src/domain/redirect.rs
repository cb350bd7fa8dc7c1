//! Scoped capture of the process standard output.
//!
//! Engines print straight to file descriptor 1 from native code, so the
//! capture happens at the descriptor level: for the lifetime of an
//! [`OutputRedirect`] the descriptor points at a pipe, and a pump thread
//! copies every byte, in order, into each attached [`Sink`]. Dropping or
//! finishing the guard puts the original descriptor back.
//!
//! This module is the only code allowed to touch descriptor 1. A
//! process-wide reentrant lock serializes redirections between threads;
//! the same thread may nest them, and an inner scope shadows the outer one
//! unless it lists [`Sink::Stdout`], which forwards into whatever stdout
//! was active when the inner scope began.
//!
//! Scopes on one descriptor unwind innermost first. Finishing an outer
//! guard early returns [`RedirectError::OutOfOrder`] and hands its
//! restoration to the scope stack; it completes once the inner guards on
//! that descriptor have finished.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use parking_lot::{
    const_mutex, const_reentrant_mutex, Mutex, ReentrantMutex, ReentrantMutexGuard,
};
use thiserror::Error;

static REDIRECT_LOCK: ReentrantMutex<()> = const_reentrant_mutex(());

/// Active scopes, innermost last
static SCOPES: Mutex<Vec<Scope>> = const_mutex(Vec::new());

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(0);

const PUMP_BUFFER_SIZE: usize = 8192;

#[derive(Error, Debug)]
pub enum RedirectError {
    #[error("at least one sink is required")]
    NoSinks,

    /// Setup failed; the process output routing was left untouched.
    #[error("could not set up redirection: {0}")]
    Setup(#[source] io::Error),

    #[error("could not restore standard output: {0}")]
    Restore(#[source] io::Error),

    /// An inner redirection of the same descriptor is still active; this
    /// one is restored when that one finishes.
    #[error("descriptor {target} still has an inner redirection")]
    OutOfOrder { target: RawFd },
}

/// Destination for captured bytes
pub enum Sink {
    /// The standard output that was active when the scope began.
    Stdout,
    Writer(Box<dyn Write + Send>),
}

impl Sink {
    pub fn buffer(buffer: &CaptureBuffer) -> Self {
        Sink::Writer(Box::new(buffer.clone()))
    }

    fn open(self, saved: &OwnedFd) -> io::Result<Box<dyn Write + Send>> {
        match self {
            Sink::Stdout => Ok(Box::new(File::from(dup_cloexec(saved.as_raw_fd())?))),
            Sink::Writer(writer) => Ok(writer),
        }
    }
}

/// Shared in-memory byte buffer usable as a [`Sink`]
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Descriptor state a scope puts back when it ends
struct Restoration {
    saved: OwnedFd,
    pump: Option<JoinHandle<()>>,
}

impl Restoration {
    fn reinstate(&self, target: RawFd) -> io::Result<()> {
        flush_stdout();
        check(unsafe { libc::dup2(self.saved.as_raw_fd(), target) }).map(|_| ())
    }

    /// Close the saved descriptor and wait until the pump has drained.
    fn complete(self, target: RawFd) {
        drop(self.saved);
        if let Some(pump) = self.pump {
            if pump.join().is_err() {
                warn!(target: "redirect", "output pump thread panicked");
            }
        }
        debug!(target: "redirect", "descriptor {} restored", target);
    }
}

struct Scope {
    id: u64,
    target: RawFd,
    deferred: Option<Restoration>,
}

/// Guard owning the redirected standard output.
///
/// Restoration runs in [`finish`](Self::finish) or, failing that, on drop,
/// so panics unwinding through the scope still restore the descriptor.
pub struct OutputRedirect {
    id: u64,
    target: RawFd,
    restoration: Option<Restoration>,
    _lock: ReentrantMutexGuard<'static, ()>,
}

impl OutputRedirect {
    pub fn begin(sinks: Vec<Sink>) -> Result<Self, RedirectError> {
        Self::begin_on(libc::STDOUT_FILENO, sinks)
    }

    pub(crate) fn begin_on(target: RawFd, sinks: Vec<Sink>) -> Result<Self, RedirectError> {
        if sinks.is_empty() {
            return Err(RedirectError::NoSinks);
        }
        let lock = REDIRECT_LOCK.lock();
        flush_stdout();

        let saved = dup_cloexec(target).map_err(RedirectError::Setup)?;
        let (read_end, write_end) = pipe_cloexec().map_err(RedirectError::Setup)?;
        let writers = sinks
            .into_iter()
            .map(|sink| sink.open(&saved))
            .collect::<io::Result<Vec<_>>>()
            .map_err(RedirectError::Setup)?;
        let pump = thread::Builder::new()
            .name("output-redirect".to_string())
            .spawn(move || pump_output(read_end, writers))
            .map_err(RedirectError::Setup)?;

        if let Err(err) = check(unsafe { libc::dup2(write_end.as_raw_fd(), target) }) {
            // The pump sees EOF once the only write end is closed.
            drop(write_end);
            let _ = pump.join();
            return Err(RedirectError::Setup(err));
        }
        drop(write_end);

        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        SCOPES.lock().push(Scope {
            id,
            target,
            deferred: None,
        });
        debug!(target: "redirect", "descriptor {} redirected", target);
        Ok(OutputRedirect {
            id,
            target,
            restoration: Some(Restoration {
                saved,
                pump: Some(pump),
            }),
            _lock: lock,
        })
    }

    /// Restore the original descriptor and wait until every captured byte
    /// has reached the sinks.
    pub fn finish(mut self) -> Result<(), RedirectError> {
        self.restore()
    }

    fn restore(&mut self) -> Result<(), RedirectError> {
        let Some(restoration) = self.restoration.take() else {
            return Ok(());
        };
        let mut scopes = SCOPES.lock();
        let position = scopes.iter().position(|scope| scope.id == self.id);
        let innermost = scopes.iter().rposition(|scope| scope.target == self.target);
        if let Some(position) = position.filter(|&p| Some(p) != innermost) {
            scopes[position].deferred = Some(restoration);
            return Err(RedirectError::OutOfOrder {
                target: self.target,
            });
        }

        if let Err(err) = restoration.reinstate(self.target) {
            self.restoration = Some(restoration);
            return Err(RedirectError::Restore(err));
        }
        if let Some(position) = position {
            scopes.remove(position);
        }
        restoration.complete(self.target);

        // Outer scopes finished early on this descriptor unwind now.
        while let Some(position) = scopes.iter().rposition(|scope| scope.target == self.target)
        {
            let Some(deferred) = scopes[position].deferred.take() else {
                break;
            };
            if let Err(err) = deferred.reinstate(self.target) {
                scopes[position].deferred = Some(deferred);
                return Err(RedirectError::Restore(err));
            }
            scopes.remove(position);
            deferred.complete(self.target);
        }
        Ok(())
    }
}

impl Drop for OutputRedirect {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            warn!(target: "redirect", "{}", err);
        }
    }
}

/// Run `f` with standard output captured into `sinks`.
///
/// The value returned by `f` comes back untouched, and a panic inside `f`
/// propagates after the original output has been restored.
pub fn redirect_output<T>(sinks: Vec<Sink>, f: impl FnOnce() -> T) -> Result<T, RedirectError> {
    let guard = OutputRedirect::begin(sinks)?;
    let value = f();
    guard.finish()?;
    Ok(value)
}

fn pump_output(read_end: OwnedFd, mut writers: Vec<Box<dyn Write + Send>>) {
    let mut pipe = File::from(read_end);
    let mut buf = [0u8; PUMP_BUFFER_SIZE];
    loop {
        match pipe.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                for writer in writers.iter_mut() {
                    if let Err(err) = writer.write_all(&buf[..n]) {
                        warn!(target: "redirect", "dropping captured output: {}", err);
                    }
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(target: "redirect", "reading captured output failed: {}", err);
                break;
            }
        }
    }
    for writer in writers.iter_mut() {
        let _ = writer.flush();
    }
}

fn flush_stdout() {
    let _ = io::stdout().flush();
    unsafe {
        libc::fflush(std::ptr::null_mut());
    }
}

fn check(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn dup_cloexec(fd: RawFd) -> io::Result<OwnedFd> {
    let duplicate = check(unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 0) })?;
    Ok(unsafe { OwnedFd::from_raw_fd(duplicate) })
}

fn pipe_cloexec() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [-1; 2];
    check(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
    let (read_end, write_end) =
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    for fd in [read_end.as_raw_fd(), write_end.as_raw_fd()] {
        let flags = check(unsafe { libc::fcntl(fd, libc::F_GETFD) })?;
        check(unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) })?;
    }
    Ok((read_end, write_end))
}
