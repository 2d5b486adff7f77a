#![forbid(unsafe_code)]

//! Cooperative event loop for the demo.
//!
//! A reader thread parses the event script and posts one job per event to the
//! UI thread's [`Dispatcher`]. The UI thread sleeps in
//! [`Dispatcher::wait_one`] until a job arrives, runs it, and repeats until
//! the form is closed, either by a `quit` event or the end of the script.
//!
//! Script errors travel through the same queue, so every report reaches the
//! output in script order. A failing event is reported and the loop keeps
//! going.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use databind_core::Dispatcher;
use tracing::{debug, warn};

use crate::app::{Flow, Form};
use crate::script::read_events;

/// How long the UI thread sleeps between wake-ups when idle.
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub applied: usize,
    pub failed: usize,
    pub script_errors: usize,
}

/// Drive `form` from `input` until the form closes.
///
/// Output from `show` events and error reports are handed to `out` on the
/// calling (UI) thread.
///
/// # Errors
///
/// I/O errors from reading the script.
pub fn run<R>(form: &Form, input: R, mut out: impl FnMut(&str)) -> io::Result<RunStats>
where
    R: BufRead + Send + 'static,
{
    let dispatcher = Dispatcher::new();
    let handle = dispatcher.handle();
    let closed = Arc::new(AtomicBool::new(false));
    let applied = Arc::new(AtomicUsize::new(0));
    let script_errors = Arc::new(AtomicUsize::new(0));
    let reports: Arc<Mutex<Vec<String>>> = Arc::default();

    let reader = {
        let form = form.clone();
        let closed = Arc::clone(&closed);
        let applied = Arc::clone(&applied);
        let script_errors = Arc::clone(&script_errors);
        let reports = Arc::clone(&reports);
        let error_handle = handle.clone();
        thread::spawn(move || {
            let result = read_events(
                input,
                |event| {
                    let form = form.clone();
                    let closed = Arc::clone(&closed);
                    let applied = Arc::clone(&applied);
                    let reports = Arc::clone(&reports);
                    handle.post(move || {
                        let flow = form.apply(&event)?;
                        applied.fetch_add(1, Ordering::Relaxed);
                        match flow {
                            Flow::Continue => {}
                            Flow::Report(text) => reports
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push(text),
                            Flow::Quit => closed.store(true, Ordering::Release),
                        }
                        Ok(())
                    })
                },
                |err| {
                    script_errors.fetch_add(1, Ordering::Relaxed);
                    let reports = Arc::clone(&reports);
                    let report = format!("script error: {err}");
                    error_handle.post(move || {
                        reports
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(report);
                        Ok(())
                    });
                },
            );
            let closed = Arc::clone(&closed);
            handle.post(move || {
                closed.store(true, Ordering::Release);
                Ok(())
            });
            result
        })
    };

    let mut stats = RunStats::default();
    loop {
        match dispatcher.wait_one(IDLE_WAIT) {
            Ok(_) => {}
            Err(e) => {
                stats.failed += 1;
                warn!(error = %e, "ui event failed");
                out(&format!("event failed: {e}"));
            }
        }
        let pending: Vec<String> = reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for line in &pending {
            out(line);
        }
        if closed.load(Ordering::Acquire) {
            break;
        }
    }

    let read_result = reader
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("script reader panicked")));
    read_result?;

    stats.applied = applied.load(Ordering::Relaxed);
    stats.script_errors = script_errors.load(Ordering::Relaxed);
    debug!(?stats, "event loop finished");
    Ok(stats)
}
