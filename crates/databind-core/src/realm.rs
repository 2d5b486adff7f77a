#![forbid(unsafe_code)]

//! Thread ownership for observables and the queue that marshals work onto it.
//!
//! Every [`ObservableValue`](crate::ObservableValue) and
//! [`BindingContext`](crate::BindingContext) belongs to a [`Realm`]: the
//! thread that created it. Reads are allowed from anywhere, mutation only from
//! the owner. Other threads hand work to the owner through a [`Dispatcher`],
//! which the owner drains from its own event loop.
//!
//! # Invariants
//!
//! 1. A realm never changes owner.
//! 2. Jobs posted to a dispatcher run on the dispatcher's realm thread, in
//!    posting order, and only when that thread drains the queue.
//! 3. A failing job stops the drain; jobs behind it stay queued.

use std::fmt;
use std::sync::mpsc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{BindingError, BindingResult};

/// The owning thread of a group of observables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Realm {
    owner: ThreadId,
}

impl Realm {
    /// The realm owned by the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    /// Thread that owns this realm.
    #[must_use]
    pub const fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Whether the calling thread owns this realm.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Fail with [`BindingError::ThreadAffinity`] unless called on the owner.
    pub fn check_access(&self) -> BindingResult {
        let caller = thread::current().id();
        if caller == self.owner {
            Ok(())
        } else {
            Err(BindingError::ThreadAffinity {
                owner: self.owner,
                caller,
            })
        }
    }
}

type Job = Box<dyn FnOnce() -> BindingResult + Send>;

/// Queue of work to be run on a realm's thread.
///
/// Owned by the realm thread. Other threads obtain a [`DispatchHandle`] and
/// post closures; the owner runs them with [`run_pending`](Self::run_pending)
/// or blocks for the next one with [`wait_one`](Self::wait_one).
pub struct Dispatcher {
    realm: Realm,
    tx: mpsc::Sender<Job>,
    rx: mpsc::Receiver<Job>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a dispatcher owned by the calling thread.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            realm: Realm::current(),
            tx,
            rx,
        }
    }

    /// Realm whose thread runs the queued jobs.
    #[must_use]
    pub const fn realm(&self) -> Realm {
        self.realm
    }

    /// A sendable handle for posting jobs.
    #[must_use]
    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every job queued so far. Returns how many ran.
    ///
    /// # Errors
    ///
    /// [`BindingError::ThreadAffinity`] when called off the realm thread, or
    /// the first error returned by a job.
    pub fn run_pending(&self) -> BindingResult<usize> {
        self.realm.check_access()?;
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            ran += 1;
            job()?;
        }
        if ran > 0 {
            trace!(ran, "drained dispatcher queue");
        }
        Ok(ran)
    }

    /// Block up to `timeout` for one job and run it.
    ///
    /// Returns `Ok(false)` if nothing arrived in time.
    ///
    /// # Errors
    ///
    /// Same as [`run_pending`](Self::run_pending).
    pub fn wait_one(&self, timeout: Duration) -> BindingResult<bool> {
        self.realm.check_access()?;
        match self.rx.recv_timeout(timeout) {
            Ok(job) => {
                job()?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }
}

/// Cloneable, `Send` handle that posts jobs to a [`Dispatcher`].
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<Job>,
}

impl fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHandle").finish_non_exhaustive()
    }
}

impl DispatchHandle {
    /// Queue `job` for the realm thread. Returns `false` if the dispatcher
    /// has been dropped.
    pub fn post(&self, job: impl FnOnce() -> BindingResult + Send + 'static) -> bool {
        let sent = self.tx.send(Box::new(job)).is_ok();
        if !sent {
            debug!("dispatcher gone; job dropped");
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn current_realm_accepts_own_thread() {
        let realm = Realm::current();
        assert!(realm.is_current());
        assert!(realm.check_access().is_ok());
    }

    #[test]
    fn other_thread_is_rejected() {
        let realm = Realm::current();
        let result = thread::spawn(move || realm.check_access()).join().unwrap();
        match result {
            Err(BindingError::ThreadAffinity { owner, caller }) => {
                assert_eq!(owner, realm.owner());
                assert_ne!(owner, caller);
            }
            other => panic!("expected thread affinity error, got {other:?}"),
        }
    }

    #[test]
    fn jobs_posted_from_other_thread_run_on_owner() {
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let owner = dispatcher.realm().owner();
        let ran_on = Arc::new(std::sync::Mutex::new(Vec::new()));

        let ran_clone = Arc::clone(&ran_on);
        thread::spawn(move || {
            for _ in 0..3 {
                let log = Arc::clone(&ran_clone);
                assert!(handle.post(move || {
                    log.lock().unwrap().push(thread::current().id());
                    Ok(())
                }));
            }
        })
        .join()
        .unwrap();

        assert_eq!(dispatcher.run_pending().unwrap(), 3);
        let ids = ran_on.lock().unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| *id == owner));
    }

    #[test]
    fn failing_job_stops_drain_and_keeps_rest() {
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let count = Arc::new(AtomicUsize::new(0));

        handle.post(|| Err(BindingError::listener("boom")));
        let c = Arc::clone(&count);
        handle.post(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(dispatcher.run_pending().unwrap_err().is_listener_failure());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.run_pending().unwrap(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn draining_off_the_owner_thread_is_rejected() {
        let dispatcher = Dispatcher::new();
        let owner = dispatcher.realm().owner();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        dispatcher.handle().post(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let (dispatcher, pending, waited) = thread::spawn(move || {
            let pending = dispatcher.run_pending();
            let waited = dispatcher.wait_one(Duration::from_millis(5));
            (dispatcher, pending, waited)
        })
        .join()
        .unwrap();

        for result in [pending.map(|_| ()), waited.map(|_| ())] {
            match result {
                Err(BindingError::ThreadAffinity { owner: o, caller }) => {
                    assert_eq!(o, owner);
                    assert_ne!(caller, owner);
                }
                other => panic!("expected thread affinity error, got {other:?}"),
            }
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.run_pending().unwrap(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_one_times_out_when_idle() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.wait_one(Duration::from_millis(5)).unwrap());
        dispatcher.handle().post(|| Ok(()));
        assert!(dispatcher.wait_one(Duration::from_millis(5)).unwrap());
    }

    #[test]
    fn post_after_drop_reports_failure() {
        let handle = Dispatcher::new().handle();
        assert!(!handle.post(|| Ok(())));
    }
}
