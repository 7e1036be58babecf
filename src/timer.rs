use crate::clock;
use crate::record::{current_producer_id, TraceRecord};
use crate::session::SessionController;

/// Measures the wall-clock duration of a scope and submits the resulting
/// record when dropped.
///
/// The timer borrows the controller, so it cannot outlive it; it can,
/// however, outlive the session, in which case the drop-time submit is a
/// protocol violation (see [`SessionController::submit`]).
#[must_use]
pub struct ScopeTimer<'a> {
    controller: &'a SessionController,
    name: Option<String>,
    start_micros: i64,
}

impl<'a> ScopeTimer<'a> {
    pub fn new(controller: &'a SessionController, name: impl Into<String>) -> ScopeTimer<'a> {
        ScopeTimer {
            controller,
            name: Some(name.into()),
            start_micros: clock::now_micros(),
        }
    }

    /// Stops the timer and submits its record before the end of the scope.
    pub fn stop(mut self) {
        self.submit();
    }

    fn submit(&mut self) {
        if let Some(name) = self.name.take() {
            self.controller.submit(TraceRecord::new(
                name,
                self.start_micros,
                clock::now_micros(),
                current_producer_id(),
            ));
        }
    }
}

impl Drop for ScopeTimer<'_> {
    fn drop(&mut self) {
        self.submit();
    }
}
