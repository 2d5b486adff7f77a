#![forbid(unsafe_code)]

//! Observable value cell with ordered change listeners and version tracking.
//!
//! # Design
//!
//! [`ObservableValue<T>`] wraps a value of type `T` in shared, reference-counted
//! storage (`Arc<RwLock<..>>`). When the value changes (determined by
//! `PartialEq`), every registered listener is invoked with the old and new
//! value, in registration order, on the calling thread.
//!
//! # Performance
//!
//! | Operation         | Complexity                 |
//! |-------------------|----------------------------|
//! | `get()`           | O(1) + clone of `T`        |
//! | `set()`           | O(L) where L = listeners   |
//! | `add_listener()`  | O(1) amortized             |
//! | `remove_listener()` | O(L)                     |
//!
//! # Failure Modes
//!
//! - **Off-thread mutation**: `set()`/`update()` from a thread other than the
//!   owning realm's returns
//!   [`BindingError::ThreadAffinity`](crate::BindingError::ThreadAffinity);
//!   nothing changes.
//! - **Listener error**: the value has already been replaced when listeners
//!   run. The first failing listener stops the notification pass and its
//!   error is returned from `set()`. Later listeners do not see the change.
//! - **Re-entrant set**: a listener may call `set()` on any observable,
//!   including this one. The lock is never held while listeners run, so the
//!   nested call observes the already-updated value.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::trace;

use crate::error::BindingResult;
use crate::realm::Realm;

static NEXT_VALUE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an observable. Shared by all clones of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(u64);

impl ValueId {
    fn next() -> Self {
        Self(NEXT_VALUE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single value transition delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueChange<T> {
    pub old: T,
    pub new: T,
}

/// Listener callback signature.
pub type Listener<T> = dyn Fn(&ValueChange<T>) -> BindingResult + Send + Sync;

type ListenerArc<T> = Arc<Listener<T>>;

/// Token returned by [`ObservableValue::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    value: ValueId,
    slot: u64,
}

impl ListenerHandle {
    /// The observable this handle was issued by.
    #[must_use]
    pub const fn value_id(&self) -> ValueId {
        self.value
    }
}

struct ObservableInner<T> {
    value: T,
    version: u64,
    next_slot: u64,
    listeners: Vec<(u64, ListenerArc<T>)>,
    disposed: bool,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning an `ObservableValue` creates a new handle to the **same** inner
/// state: both handles see the same value, id, and listeners.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each value-changing mutation.
/// 2. `set(v)` where `v == current` is a no-op (no version bump, no calls).
/// 3. Listeners are notified in registration order, once per change.
/// 4. Only the owning realm's thread may mutate.
pub struct ObservableValue<T> {
    id: ValueId,
    realm: Realm,
    inner: Arc<RwLock<ObservableInner<T>>>,
}

// Manual Clone: shares the same Arc.
impl<T> Clone for ObservableValue<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            realm: self.realm,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ObservableValue")
            .field("id", &self.id)
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("listener_count", &inner.listeners.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> ObservableValue<T> {
    /// Create an observable owned by the calling thread.
    ///
    /// The initial version is 0 and no listeners are registered.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::in_realm(Realm::current(), value)
    }

    /// Create an observable owned by `realm`.
    #[must_use]
    pub fn in_realm(realm: Realm, value: T) -> Self {
        Self {
            id: ValueId::next(),
            realm,
            inner: Arc::new(RwLock::new(ObservableInner {
                value,
                version: 0,
                next_slot: 0,
                listeners: Vec::new(),
                disposed: false,
            })),
        }
    }

    /// Identity shared by every clone of this handle.
    #[must_use]
    pub const fn id(&self) -> ValueId {
        self.id
    }

    /// Realm allowed to mutate this value.
    #[must_use]
    pub const fn realm(&self) -> Realm {
        self.realm
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.read().value.clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// A read lock is held while `f` runs; `f` must not mutate this value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.read().value)
    }

    /// Replace the value and notify listeners if it changed.
    ///
    /// # Errors
    ///
    /// [`BindingError::ThreadAffinity`](crate::BindingError::ThreadAffinity)
    /// off the owning thread, or the first listener error. In the listener
    /// case the new value stays in place.
    pub fn set(&self, value: T) -> BindingResult {
        self.realm.check_access()?;
        let (change, listeners) = {
            let mut inner = self.write();
            if inner.value == value {
                return Ok(());
            }
            let old = std::mem::replace(&mut inner.value, value.clone());
            inner.version += 1;
            trace!(value = %self.id, version = inner.version, "value changed");
            (ValueChange { old, new: value }, snapshot(&inner))
        };
        notify(&listeners, &change)
    }

    /// Modify the value in place. If the value changes (compared against a
    /// snapshot), the version is bumped and listeners are notified.
    ///
    /// The write lock is held while `f` runs; `f` must not read or write this
    /// value through any handle. Listeners run after the lock is released.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn update(&self, f: impl FnOnce(&mut T)) -> BindingResult {
        self.realm.check_access()?;
        let (change, listeners) = {
            let mut inner = self.write();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value == old {
                return Ok(());
            }
            inner.version += 1;
            trace!(value = %self.id, version = inner.version, "value updated in place");
            let new = inner.value.clone();
            (ValueChange { old, new }, snapshot(&inner))
        };
        notify(&listeners, &change)
    }

    /// Register a listener. It is called with every subsequent change.
    ///
    /// After [`dispose`](Self::dispose) the listener is not stored; the
    /// returned handle is still valid to pass to `remove_listener`.
    pub fn add_listener(
        &self,
        listener: impl Fn(&ValueChange<T>) -> BindingResult + Send + Sync + 'static,
    ) -> ListenerHandle {
        let mut inner = self.write();
        let slot = inner.next_slot;
        inner.next_slot += 1;
        if !inner.disposed {
            inner.listeners.push((slot, Arc::new(listener)));
        }
        ListenerHandle {
            value: self.id,
            slot,
        }
    }

    /// Unregister a listener. Returns `true` if it was still registered.
    ///
    /// Removing twice, or removing a handle issued by another observable, is
    /// a no-op.
    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        if handle.value != self.id {
            return false;
        }
        let mut inner = self.write();
        let before = inner.listeners.len();
        inner.listeners.retain(|(slot, _)| *slot != handle.slot);
        inner.listeners.len() != before
    }

    /// Current version number.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.read().version
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.read().listeners.len()
    }

    /// Tear down: drop every listener and refuse new ones. The value stays
    /// readable and settable.
    pub fn dispose(&self) {
        let mut inner = self.write();
        inner.disposed = true;
        inner.listeners.clear();
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.read().disposed
    }

    /// Non-owning handle to the same value.
    #[must_use]
    pub fn downgrade(&self) -> WeakObservable<T> {
        WeakObservable {
            id: self.id,
            inner: Arc::downgrade(&self.inner),
            realm: self.realm,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ObservableInner<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ObservableInner<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn snapshot<T>(inner: &ObservableInner<T>) -> Vec<ListenerArc<T>> {
    inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
}

/// Call each listener outside the lock; stop at the first error.
fn notify<T>(listeners: &[ListenerArc<T>], change: &ValueChange<T>) -> BindingResult {
    for listener in listeners {
        listener(change)?;
    }
    Ok(())
}

/// Weak counterpart of [`ObservableValue`]. Does not keep the value alive.
pub struct WeakObservable<T> {
    id: ValueId,
    realm: Realm,
    inner: Weak<RwLock<ObservableInner<T>>>,
}

impl<T> Clone for WeakObservable<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            realm: self.realm,
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WeakObservable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObservable")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl<T> WeakObservable<T> {
    #[must_use]
    pub const fn id(&self) -> ValueId {
        self.id
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Recover a strong handle if the value is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ObservableValue<T>> {
        self.inner.upgrade().map(|inner| ObservableValue {
            id: self.id,
            realm: self.realm,
            inner,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
