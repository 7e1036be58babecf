use crate::clock;
use crate::queue::EventQueue;
use crate::record::{current_producer_id, TraceRecord};
use crate::serializer;
use parking_lot::Mutex;
use std::backtrace::Backtrace;
use std::error;
use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Errors surfaced by the session lifecycle operations.
#[derive(Debug)]
pub enum Error {
    /// A session is already active on this controller. The running session
    /// is left untouched.
    SessionActive { current: String },
    /// The output file could not be created.
    Sink(io::Error),
    /// The writer thread could not be spawned.
    WorkerSpawn(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SessionActive { current } => {
                write!(f, "trace session {:?} is already active", current)
            }
            Error::Sink(err) => write!(f, "could not open trace output file: {}", err),
            Error::WorkerSpawn(err) => write!(f, "could not spawn trace writer thread: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::SessionActive { .. } => None,
            Error::Sink(err) | Error::WorkerSpawn(err) => Some(err),
        }
    }
}

/// Owns the event queue, the session lifecycle, and the background writer
/// thread. One controller drives at most one session at a time; sessions may
/// be run back to back.
///
/// The controller is meant to be constructed once at the application's
/// composition point and handed (by reference) to whatever submits records.
pub struct SessionController {
    queue: Arc<EventQueue>,
    // Fast-path flag for `submit`, so producers never touch `lifecycle`.
    active: AtomicBool,
    lifecycle: Mutex<Option<ActiveSession>>,
}

struct ActiveSession {
    name: String,
    writer: thread::JoinHandle<()>,
}

impl SessionController {
    pub fn new() -> SessionController {
        SessionController {
            queue: Arc::new(EventQueue::new()),
            active: AtomicBool::new(false),
            lifecycle: Mutex::new(None),
        }
    }

    /// Starts a new session tracing to the file at `path`, creating parent
    /// directories as needed, and spawns the writer thread.
    pub fn begin_session(
        &self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<(), Error> {
        let name = name.into();
        let path = path.as_ref();

        let mut lifecycle = self.lifecycle.lock();
        if let Some(active) = lifecycle.as_ref() {
            return Err(Error::SessionActive {
                current: active.name.clone(),
            });
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(Error::Sink)?;
            }
        }
        let sink = BufWriter::new(fs::File::create(path).map_err(Error::Sink)?);

        self.queue.reset();
        let queue = Arc::clone(&self.queue);
        let session_name = name.clone();
        let writer = thread::Builder::new()
            .name("traceme-writer".into())
            .spawn(move || writer_loop(&queue, sink, &session_name))
            .map_err(Error::WorkerSpawn)?;

        log::debug!("beginning trace session {:?} -> {}", name, path.display());
        *lifecycle = Some(ActiveSession { name, writer });
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    /// Starts a session and returns a guard that ends it when dropped,
    /// including on early return and panic unwinding.
    pub fn begin_scoped(
        &self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<SessionGuard<'_>, Error> {
        self.begin_session(name, path)?;
        Ok(SessionGuard { controller: self })
    }

    /// Hands one completed record to the writer thread. Never blocks beyond
    /// the queue's lock hold time.
    ///
    /// Submitting with no active session means a measurement outlived its
    /// session, which is a lifetime bug in the instrumented program: the
    /// violation is reported together with a backtrace and the call panics
    /// rather than dropping the record silently.
    pub fn submit(&self, record: TraceRecord) {
        if !self.active.load(Ordering::Acquire) {
            log::error!(
                "trace record {:?} submitted with no active session\n{}",
                record.name,
                Backtrace::force_capture()
            );
            panic!(
                "trace record {:?} submitted with no active session",
                record.name
            );
        }
        self.queue.push(record);
    }

    /// Ends the active session: signals the writer, waits for it to drain the
    /// queue, write the synthetic closing record and the footer, and close
    /// the file. Blocks until the file is fully written. A no-op when no
    /// session is active.
    pub fn end_session(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let session = match lifecycle.take() {
            Some(session) => session,
            None => return,
        };

        self.queue.request_shutdown(clock::now_micros());
        if session.writer.join().is_err() {
            log::error!("writer thread of trace session {:?} panicked", session.name);
        }
        self.active.store(false, Ordering::Release);

        // Anything enqueued after the writer finished its final drain belongs
        // to no session and must not leak into the next one's file.
        let orphaned = self.queue.discard_pending();
        if orphaned > 0 {
            log::warn!(
                "discarded {} records submitted while session {:?} was closing",
                orphaned,
                session.name
            );
        }
        log::debug!("ended trace session {:?}", session.name);
    }
}

impl Default for SessionController {
    fn default() -> SessionController {
        SessionController::new()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if self.lifecycle.get_mut().is_some() {
            log::error!("session controller dropped while a session is active; closing it");
            self.end_session();
        }
    }
}

/// Ends the controller's session when dropped. Returned by
/// [`SessionController::begin_scoped`].
#[must_use]
pub struct SessionGuard<'a> {
    controller: &'a SessionController,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.controller.end_session();
    }
}

fn writer_loop(queue: &EventQueue, sink: BufWriter<fs::File>, session_name: &str) {
    let mut sink = SessionSink::new(sink);
    sink.write_header();

    while let Some(record) = queue.recv() {
        sink.write_record(&record);
    }

    // The synthetic closing record spans from the moment the session was
    // asked to end to the moment the drain finished, so teardown cost shows
    // up in the trace.
    let closing = TraceRecord::new(
        format!("EndSession {}", session_name),
        queue.shutdown_start_micros(),
        clock::now_micros(),
        current_producer_id(),
    );
    sink.write_record(&closing);
    sink.finish();
}

/// Write side of one session: the open file plus the bookkeeping needed to
/// emit comma-separated records. Touched only by the writer thread.
struct SessionSink {
    out: BufWriter<fs::File>,
    records_written: u64,
    degraded: bool,
}

impl SessionSink {
    fn new(out: BufWriter<fs::File>) -> SessionSink {
        SessionSink {
            out,
            records_written: 0,
            degraded: false,
        }
    }

    fn write_header(&mut self) {
        let result = serializer::write_header(&mut self.out).and_then(|()| self.out.flush());
        if let Err(err) = result {
            self.degrade("header", &err);
        }
    }

    // Flushes after every record so a crash mid-session loses at most the
    // record being written.
    fn write_record(&mut self, record: &TraceRecord) {
        if self.degraded {
            return;
        }
        let is_first = self.records_written == 0;
        let result = serializer::write_record(&mut self.out, record, is_first)
            .and_then(|()| self.out.flush());
        match result {
            Ok(()) => self.records_written += 1,
            Err(err) => self.degrade(&record.name, &err),
        }
    }

    fn finish(mut self) {
        if self.degraded {
            return;
        }
        let result = serializer::write_footer(&mut self.out).and_then(|()| self.out.flush());
        if let Err(err) = result {
            self.degrade("footer", &err);
        }
    }

    fn degrade(&mut self, what: &str, err: &io::Error) {
        log::error!(
            "trace sink failed writing {:?}: {}; suppressing further output",
            what,
            err
        );
        self.degraded = true;
    }
}

// Make sure that `SessionController` can be shared across producer threads.
fn _assert_bounds() {
    assert_bounds_inner(&SessionController::new());
    fn assert_bounds_inner<S: Sized + Send + Sync + 'static>(_: &S) {}
}
