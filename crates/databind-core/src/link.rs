#![forbid(unsafe_code)]

//! A binding link: keeps a source and a target observable in sync.
//!
//! # Lifecycle
//!
//! ```text
//! UNBOUND --create(mode)--> ACTIVE --detach()--> DETACHED (terminal)
//! ```
//!
//! `create` copies one side into the other before returning so both sides
//! start consistent, then registers a listener on each side the mode lets
//! changes flow *from*.
//!
//! # Invariants
//!
//! 1. The link holds only weak references; it never extends either side's
//!    lifetime. Once a side is dropped, propagation into it is skipped.
//! 2. While one of the link's propagations is in flight, change
//!    notifications reaching the link are ignored. A bidirectional link
//!    therefore never echoes a change back to the side it came from.
//! 3. The in-flight marker is cleared when the propagation returns, whether
//!    it succeeded or failed.
//! 4. `detach` is idempotent and leaves both values as they were.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use crate::error::BindingResult;
use crate::observable::{ListenerHandle, ObservableValue, ValueId, WeakObservable};

/// Which way changes flow through a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindingMode {
    /// Source changes are pushed into the target.
    #[default]
    SourceToTarget,
    /// Target changes are pushed into the source.
    TargetToSource,
    /// Both directions.
    Bidirectional,
}

impl BindingMode {
    /// Whether source changes reach the target.
    #[must_use]
    pub const fn forward(self) -> bool {
        matches!(self, Self::SourceToTarget | Self::Bidirectional)
    }

    /// Whether target changes reach the source.
    #[must_use]
    pub const fn backward(self) -> bool {
        matches!(self, Self::TargetToSource | Self::Bidirectional)
    }
}

/// Observable lifecycle state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Active,
    Detached,
}

static NEXT_TRANSACTION: AtomicU64 = AtomicU64::new(1);

/// Marker for a single propagation through a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    fn next() -> Self {
        Self(NEXT_TRANSACTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Propagation bookkeeping shared between a link and its listeners.
#[derive(Debug, Default)]
struct Transactions {
    /// Raw id of the propagation in flight, 0 when idle.
    in_flight: AtomicU64,
    last: AtomicU64,
}

impl Transactions {
    fn begin(&self) -> Option<InFlight<'_>> {
        let txn = TransactionId::next();
        self.in_flight
            .compare_exchange(0, txn.0, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.last.store(txn.0, Ordering::Release);
        Some(InFlight { owner: self, txn })
    }

    fn last(&self) -> Option<TransactionId> {
        match self.last.load(Ordering::Acquire) {
            0 => None,
            raw => Some(TransactionId(raw)),
        }
    }
}

/// Clears the in-flight marker on drop.
struct InFlight<'a> {
    owner: &'a Transactions,
    txn: TransactionId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.owner.in_flight.store(0, Ordering::Release);
    }
}

fn propagate<T: Clone + PartialEq + 'static>(
    txns: &Transactions,
    into: &WeakObservable<T>,
    value: T,
    direction: Direction,
) -> BindingResult {
    let Some(guard) = txns.begin() else {
        trace!(into = %into.id(), ?direction, "ignoring echo of own propagation");
        return Ok(());
    };
    let Some(into) = into.upgrade() else {
        trace!(?direction, "bound value dropped; skipping propagation");
        return Ok(());
    };
    trace!(txn = %guard.txn, into = %into.id(), ?direction, "propagating");
    into.set(value)
}

struct Registrations {
    source: Option<ListenerHandle>,
    target: Option<ListenerHandle>,
}

struct LinkInner<T> {
    source: WeakObservable<T>,
    target: WeakObservable<T>,
    mode: BindingMode,
    txns: Arc<Transactions>,
    /// `None` once detached.
    registrations: Mutex<Option<Registrations>>,
}

/// Handle to a live or detached binding between two observables.
///
/// Clones refer to the same link.
pub struct BindingLink<T> {
    inner: Arc<LinkInner<T>>,
}

impl<T> Clone for BindingLink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for BindingLink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self
            .inner
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("BindingLink")
            .field("source", &self.inner.source.id())
            .field("target", &self.inner.target.id())
            .field("mode", &self.inner.mode)
            .field("active", &active)
            .finish()
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> BindingLink<T> {
    /// Bind `source` to `target`, synchronize once, and start listening.
    ///
    /// # Errors
    ///
    /// Any error from the initial synchronization (thread affinity, or a
    /// listener on the receiving side failing). On error nothing stays
    /// registered.
    pub fn create(
        source: &ObservableValue<T>,
        target: &ObservableValue<T>,
        mode: BindingMode,
    ) -> BindingResult<Self> {
        source.realm().check_access()?;
        target.realm().check_access()?;

        let txns = Arc::new(Transactions::default());
        if mode.forward() {
            propagate(&txns, &target.downgrade(), source.get(), Direction::Forward)?;
        } else {
            propagate(&txns, &source.downgrade(), target.get(), Direction::Backward)?;
        }

        let source_handle = mode.forward().then(|| {
            let txns = Arc::clone(&txns);
            let into = target.downgrade();
            source.add_listener(move |change| {
                propagate(&txns, &into, change.new.clone(), Direction::Forward)
            })
        });
        let target_handle = mode.backward().then(|| {
            let txns = Arc::clone(&txns);
            let into = source.downgrade();
            target.add_listener(move |change| {
                propagate(&txns, &into, change.new.clone(), Direction::Backward)
            })
        });

        debug!(source = %source.id(), target = %target.id(), ?mode, "binding created");
        Ok(Self {
            inner: Arc::new(LinkInner {
                source: source.downgrade(),
                target: target.downgrade(),
                mode,
                txns,
                registrations: Mutex::new(Some(Registrations {
                    source: source_handle,
                    target: target_handle,
                })),
            }),
        })
    }

    /// Remove both listener registrations. Safe to call repeatedly.
    pub fn detach(&self) {
        let taken = self
            .inner
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(regs) = taken else {
            return;
        };
        if let (Some(handle), Some(source)) = (regs.source, self.inner.source.upgrade()) {
            source.remove_listener(handle);
        }
        if let (Some(handle), Some(target)) = (regs.target, self.inner.target.upgrade()) {
            target.remove_listener(handle);
        }
        debug!(
            source = %self.inner.source.id(),
            target = %self.inner.target.id(),
            "binding detached"
        );
    }
}

impl<T> BindingLink<T> {
    #[must_use]
    pub fn mode(&self) -> BindingMode {
        self.inner.mode
    }

    #[must_use]
    pub fn state(&self) -> LinkState {
        let regs = self
            .inner
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if regs.is_some() {
            LinkState::Active
        } else {
            LinkState::Detached
        }
    }

    /// `(source, target)` identities.
    #[must_use]
    pub fn endpoints(&self) -> (ValueId, ValueId) {
        (self.inner.source.id(), self.inner.target.id())
    }

    /// Both sides have been dropped, so the link can never propagate again.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        !self.inner.source.is_alive() && !self.inner.target.is_alive()
    }

    /// The most recent propagation this link started, if any.
    #[must_use]
    pub fn last_transaction(&self) -> Option<TransactionId> {
        self.inner.txns.last()
    }
}

/// Type-erased view of a link, for owners holding links of mixed value types.
pub trait AnyLink {
    fn endpoints(&self) -> (ValueId, ValueId);
    fn mode(&self) -> BindingMode;
    fn state(&self) -> LinkState;
    fn is_orphaned(&self) -> bool;
    fn detach(&self);
}

impl<T: Clone + PartialEq + Send + Sync + 'static> AnyLink for BindingLink<T> {
    fn endpoints(&self) -> (ValueId, ValueId) {
        BindingLink::endpoints(self)
    }

    fn mode(&self) -> BindingMode {
        BindingLink::mode(self)
    }

    fn state(&self) -> LinkState {
        BindingLink::state(self)
    }

    fn is_orphaned(&self) -> bool {
        BindingLink::is_orphaned(self)
    }

    fn detach(&self) {
        BindingLink::detach(self);
    }
}
