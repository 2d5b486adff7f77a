#![forbid(unsafe_code)]

//! Two-way value binding between UI-side and model-side observables.
//!
//! - [`ObservableValue`]: a shared, version-tracked cell that notifies ordered
//!   listeners with the old and new value on every change.
//! - [`BindingLink`]: keeps a source and a target observable in sync in one
//!   or both directions, without echoing a change back where it came from.
//! - [`BindingContext`]: owns a group of links; bulk unbind and dispose.
//! - [`Realm`] / [`Dispatcher`]: single-thread ownership of observables and
//!   a queue for marshaling work onto the owning thread.
//! - [`Property`]: model-side observables from explicit getter/setter pairs.
//! - [`TextField`] / [`SelectionList`]: headless widget-side observables.
//!
//! # Architecture
//!
//! Observables use `Arc<RwLock<..>>` so they can be read from any thread,
//! but every mutation is checked against the owning [`Realm`]. Listener
//! dispatch is synchronous and runs outside the lock. Links hold only weak
//! references to the values they connect.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Listeners are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version
//!    bump, no notifications).
//! 4. A listener error is returned from `set`; the value stays updated.
//! 5. A link never propagates a change back into the side it came from
//!    within the same transaction.

pub mod context;
pub mod error;
pub mod link;
pub mod observable;
pub mod property;
pub mod realm;
pub mod widget;

pub use context::{BindingContext, ContextConfig};
pub use error::{BindingError, BindingResult};
pub use link::{AnyLink, BindingLink, BindingMode, LinkState, TransactionId};
pub use observable::{ListenerHandle, ObservableValue, ValueChange, ValueId, WeakObservable};
pub use property::Property;
pub use realm::{DispatchHandle, Dispatcher, Realm};
pub use widget::{SelectionList, TextField, TextTrigger};
