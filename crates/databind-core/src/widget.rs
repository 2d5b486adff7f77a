#![forbid(unsafe_code)]

//! Headless stand-ins for the host toolkit's widget-side observables.
//!
//! A real toolkit supplies "widget + event trigger → observable" factories.
//! These two widgets do the same without any rendering, so that forms can be
//! driven from scripts and tests:
//!
//! - [`TextField`]: editable text. Observables follow either every
//!   modification ([`TextTrigger::Modify`]) or only focus loss
//!   ([`TextTrigger::FocusOut`]).
//! - [`SelectionList`]: single selection over an ordered, host-supplied
//!   domain (typically every variant of an enum).
//!
//! A widget owns the observables it hands out: they live as long as the
//! widget does. A value written into one of them by a binding becomes the
//! widget's own state and reaches the widget's other observables.
//!
//! # Invariants
//!
//! 1. No widget lock is held while observables notify their listeners.
//! 2. An edit that leaves the text unchanged fires nothing.
//! 3. A selection outside the domain is rejected and changes nothing.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::error::{BindingError, BindingResult};
use crate::observable::ObservableValue;

fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The widget event that updates a text observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextTrigger {
    /// Every modification of the text.
    #[default]
    Modify,
    /// Only when the field loses focus.
    FocusOut,
}

#[derive(Default)]
struct TextFieldState {
    text: String,
    observers: Vec<(TextTrigger, ObservableValue<String>)>,
}

/// A single-line text input.
///
/// Clones refer to the same field.
#[derive(Clone, Default)]
pub struct TextField {
    state: Arc<Mutex<TextFieldState>>,
}

impl fmt::Debug for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("TextField")
            .field("text", &state.text)
            .field("observers", &state.observers.len())
            .finish()
    }
}

impl TextField {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        let field = Self::new();
        lock(&field.state).text = text.into();
        field
    }

    /// Text currently shown in the field.
    #[must_use]
    pub fn text(&self) -> String {
        lock(&self.state).text.clone()
    }

    /// An observable of this field's text, updated on `trigger`.
    ///
    /// Text written into it replaces the field's text and is passed on to
    /// the field's other observables, whatever their trigger.
    #[must_use]
    pub fn observe_text(&self, trigger: TextTrigger) -> ObservableValue<String> {
        let observable = ObservableValue::new(self.text());
        let own = observable.id();
        let weak_state = Arc::downgrade(&self.state);
        observable.add_listener(move |change| {
            let Some(state) = weak_state.upgrade() else {
                return Ok(());
            };
            let others: Vec<_> = {
                let mut state = lock(&state);
                if state.text == change.new {
                    return Ok(());
                }
                state.text.clone_from(&change.new);
                state
                    .observers
                    .iter()
                    .filter(|(_, observable)| observable.id() != own)
                    .map(|(_, observable)| observable.clone())
                    .collect()
            };
            for other in others {
                other.set(change.new.clone())?;
            }
            Ok(())
        });
        lock(&self.state)
            .observers
            .push((trigger, observable.clone()));
        observable
    }

    /// Replace the whole text as one modification.
    ///
    /// # Errors
    ///
    /// Propagates failures from `Modify` observables and their bindings.
    pub fn set_text(&self, text: impl Into<String>) -> BindingResult {
        let text = text.into();
        self.edit(move |current| *current = text)
    }

    /// Append `input` one character at a time, one modification each.
    ///
    /// # Errors
    ///
    /// Stops at the first failing modification.
    pub fn type_text(&self, input: &str) -> BindingResult {
        for ch in input.chars() {
            self.edit(|current| current.push(ch))?;
        }
        Ok(())
    }

    /// Delete the last character, if any.
    ///
    /// # Errors
    ///
    /// Propagates failures from `Modify` observables.
    pub fn backspace(&self) -> BindingResult {
        self.edit(|current| {
            current.pop();
        })
    }

    /// Signal focus loss, committing the text to `FocusOut` observables.
    ///
    /// # Errors
    ///
    /// Propagates failures from `FocusOut` observables.
    pub fn focus_out(&self) -> BindingResult {
        self.fire(TextTrigger::FocusOut)
    }

    fn edit(&self, f: impl FnOnce(&mut String)) -> BindingResult {
        let changed = {
            let mut state = lock(&self.state);
            let before = state.text.clone();
            f(&mut state.text);
            state.text != before
        };
        if changed {
            self.fire(TextTrigger::Modify)
        } else {
            Ok(())
        }
    }

    fn fire(&self, trigger: TextTrigger) -> BindingResult {
        let (text, targets) = {
            let state = lock(&self.state);
            let targets: Vec<_> = state
                .observers
                .iter()
                .filter(|(t, _)| *t == trigger)
                .map(|(_, observable)| observable.clone())
                .collect();
            (state.text.clone(), targets)
        };
        trace!(?trigger, observers = targets.len(), "text field event");
        for observable in targets {
            observable.set(text.clone())?;
        }
        Ok(())
    }
}

struct SelectionState<T> {
    domain: Vec<T>,
    current: T,
    index: Option<usize>,
    observers: Vec<ObservableValue<T>>,
}

/// Single selection over an ordered domain, like a read-only dropdown.
///
/// Clones refer to the same widget.
pub struct SelectionList<T> {
    state: Arc<Mutex<SelectionState<T>>>,
}

impl<T> Clone for SelectionList<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SelectionList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("SelectionList")
            .field("domain", &state.domain)
            .field("current", &state.current)
            .field("index", &state.index)
            .finish()
    }
}

impl<T> SelectionList<T>
where
    T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    /// A list over `domain` with `initial` selected.
    ///
    /// # Errors
    ///
    /// [`BindingError::SelectionOutOfDomain`] if `initial` is not in `domain`.
    pub fn new(domain: Vec<T>, initial: T) -> BindingResult<Self> {
        let Some(index) = domain.iter().position(|v| *v == initial) else {
            return Err(out_of_domain(&initial));
        };
        Ok(Self {
            state: Arc::new(Mutex::new(SelectionState {
                domain,
                current: initial,
                index: Some(index),
                observers: Vec::new(),
            })),
        })
    }

    /// The choices, in display order.
    #[must_use]
    pub fn domain(&self) -> Vec<T> {
        lock(&self.state).domain.clone()
    }

    /// The selected element, or `None` if a binding pushed in a value the
    /// domain does not contain.
    #[must_use]
    pub fn selection(&self) -> Option<T> {
        let state = lock(&self.state);
        state.index.map(|_| state.current.clone())
    }

    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        lock(&self.state).index
    }

    /// An observable of the selected element.
    ///
    /// A value written into it becomes the selection and is passed on to the
    /// list's other observables.
    #[must_use]
    pub fn observe_selection(&self) -> ObservableValue<T> {
        let observable = ObservableValue::new(lock(&self.state).current.clone());
        let own = observable.id();
        let weak_state = Arc::downgrade(&self.state);
        observable.add_listener(move |change| {
            let Some(state) = weak_state.upgrade() else {
                return Ok(());
            };
            let others: Vec<_> = {
                let mut state = lock(&state);
                if state.current == change.new {
                    return Ok(());
                }
                state.index = state.domain.iter().position(|v| *v == change.new);
                state.current = change.new.clone();
                state
                    .observers
                    .iter()
                    .filter(|observable| observable.id() != own)
                    .cloned()
                    .collect()
            };
            for other in others {
                other.set(change.new.clone())?;
            }
            Ok(())
        });
        lock(&self.state).observers.push(observable.clone());
        observable
    }

    /// Select `value`.
    ///
    /// # Errors
    ///
    /// [`BindingError::SelectionOutOfDomain`] if `value` is not a choice, or
    /// any failure from observers.
    pub fn select(&self, value: &T) -> BindingResult {
        let index = lock(&self.state).domain.iter().position(|v| v == value);
        match index {
            Some(index) => self.select_index(index),
            None => Err(out_of_domain(value)),
        }
    }

    /// Select the element at `index` in the domain.
    ///
    /// # Errors
    ///
    /// [`BindingError::SelectionOutOfDomain`] if `index` is past the end, or
    /// any failure from observers.
    pub fn select_index(&self, index: usize) -> BindingResult {
        let (value, targets) = {
            let mut state = lock(&self.state);
            let len = state.domain.len();
            let Some(value) = state.domain.get(index).cloned() else {
                return Err(BindingError::SelectionOutOfDomain {
                    detail: format!("index {index} of {len} choices"),
                });
            };
            if state.index == Some(index) {
                return Ok(());
            }
            state.index = Some(index);
            state.current = value.clone();
            (value, state.observers.clone())
        };
        trace!(index, observers = targets.len(), "selection changed");
        for observable in targets {
            observable.set(value.clone())?;
        }
        Ok(())
    }
}

fn out_of_domain<T: fmt::Debug>(value: &T) -> BindingError {
    BindingError::SelectionOutOfDomain {
        detail: format!("{value:?}"),
    }
}
