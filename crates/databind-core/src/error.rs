#![forbid(unsafe_code)]

//! Error type shared by observables, links, and contexts.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Duplicate binding | `(source, target)` already actively bound | `bind` fails, nothing registered |
//! | Disposed context | `bind` after `dispose()` | `bind` fails |
//! | Thread affinity | `set` off the owning thread | value untouched |
//! | Listener failure | a listener returned `Err` | value kept, remaining listeners skipped |
//! | Out of domain | selection outside the host-supplied domain | selection untouched |

use std::fmt;
use std::thread::ThreadId;

use crate::observable::ValueId;

/// Errors from binding operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// The ordered pair is already bound by an active link in this context.
    DuplicateBinding { source: ValueId, target: ValueId },
    /// The context was disposed and accepts no further bindings.
    DisposedContext,
    /// A mutation was attempted from a thread other than the owning realm's.
    ThreadAffinity { owner: ThreadId, caller: ThreadId },
    /// A change listener failed while being notified.
    ListenerFailure { message: String },
    /// A selection was requested outside the widget's domain.
    SelectionOutOfDomain { detail: String },
}

impl BindingError {
    /// Build a [`BindingError::ListenerFailure`] from any displayable cause.
    #[must_use]
    pub fn listener(message: impl fmt::Display) -> Self {
        Self::ListenerFailure {
            message: message.to_string(),
        }
    }

    /// True for [`BindingError::ListenerFailure`].
    #[must_use]
    pub const fn is_listener_failure(&self) -> bool {
        matches!(self, Self::ListenerFailure { .. })
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateBinding { source, target } => {
                write!(f, "values {source} and {target} are already bound")
            }
            Self::DisposedContext => write!(f, "binding context has been disposed"),
            Self::ThreadAffinity { owner, caller } => {
                write!(
                    f,
                    "observable owned by thread {owner:?} mutated from thread {caller:?}"
                )
            }
            Self::ListenerFailure { message } => write!(f, "listener failed: {message}"),
            Self::SelectionOutOfDomain { detail } => {
                write!(f, "selection outside domain: {detail}")
            }
        }
    }
}

impl std::error::Error for BindingError {}

/// Result alias for binding operations.
pub type BindingResult<T = ()> = Result<T, BindingError>;
