//! Scoped wall-clock tracing with a dedicated writer thread.
//!
//! Application code wraps regions of interest in [`ScopeTimer`]s (usually via
//! the [`trace_scope!`] and [`trace_function!`] macros) while a
//! [`SessionController`] drains the finished records on a background thread
//! and streams them into a single JSON trace file. The file loads directly
//! into `chrome://tracing` and Perfetto.
//!
//! Producer threads never wait on file I/O; they only append to an in-memory
//! queue. Ending a session blocks until every queued record has reached the
//! file.
//!
//! ```no_run
//! use traceme::SessionController;
//!
//! fn main() -> Result<(), traceme::Error> {
//!     let controller = SessionController::new();
//!     let _session = controller.begin_scoped("startup", "startup-trace.json")?;
//!
//!     {
//!         traceme::trace_scope!(controller, "load assets");
//!         // ... measured work ...
//!     }
//!
//!     Ok(())
//! }
//! ```

mod clock;
mod macros;
mod queue;
mod record;
mod serializer;
mod session;
mod timer;

pub use crate::clock::now_micros;
pub use crate::record::{current_producer_id, TraceRecord};
pub use crate::session::{Error, SessionController, SessionGuard};
pub use crate::timer::ScopeTimer;
