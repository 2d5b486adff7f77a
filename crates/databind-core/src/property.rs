#![forbid(unsafe_code)]

//! Model-side observables built from explicit accessor pairs.
//!
//! A [`Property`] names one field of a model type `M` through a getter and a
//! setter. [`Property::observe`] turns it into an [`ObservableValue`] seeded
//! from the model; every later change to that observable is written back
//! through the setter.
//!
//! Plain models do not announce their own changes, so edits made to the
//! model directly are not seen by the observable. Call
//! [`Property::read`] to inspect the model itself.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::observable::ObservableValue;

/// A named, typed accessor pair over a model `M`.
pub struct Property<M, T> {
    name: &'static str,
    getter: fn(&M) -> T,
    setter: fn(&mut M, T),
}

impl<M, T> Clone for Property<M, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M, T> Copy for Property<M, T> {}

impl<M, T> fmt::Debug for Property<M, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property").field("name", &self.name).finish()
    }
}

impl<M, T> Property<M, T>
where
    M: Send + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    #[must_use]
    pub const fn new(name: &'static str, getter: fn(&M) -> T, setter: fn(&mut M, T)) -> Self {
        Self {
            name,
            getter,
            setter,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Read the property straight from the model.
    #[must_use]
    pub fn read(&self, model: &Mutex<M>) -> T {
        let model = model.lock().unwrap_or_else(PoisonError::into_inner);
        (self.getter)(&model)
    }

    /// Observe this property on `model`.
    ///
    /// The model is held weakly: once it is dropped, changes to the
    /// observable are no longer written anywhere.
    #[must_use]
    pub fn observe(&self, model: &Arc<Mutex<M>>) -> ObservableValue<T> {
        let observable = ObservableValue::new(self.read(model));
        let weak_model = Arc::downgrade(model);
        let name = self.name;
        let setter = self.setter;
        observable.add_listener(move |change| {
            if let Some(model) = weak_model.upgrade() {
                let mut model = model.lock().unwrap_or_else(PoisonError::into_inner);
                setter(&mut model, change.new.clone());
                trace!(property = name, "model property written");
            }
            Ok(())
        });
        observable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Account {
        owner: String,
        limit: u32,
    }

    fn owner(a: &Account) -> String {
        a.owner.clone()
    }

    fn set_owner(a: &mut Account, v: String) {
        a.owner = v;
    }

    fn limit(a: &Account) -> u32 {
        a.limit
    }

    fn set_limit(a: &mut Account, v: u32) {
        a.limit = v;
    }

    const OWNER: Property<Account, String> = Property::new("owner", owner, set_owner);
    const LIMIT: Property<Account, u32> = Property::new("limit", limit, set_limit);

    fn account() -> Arc<Mutex<Account>> {
        Arc::new(Mutex::new(Account {
            owner: "Pat".into(),
            limit: 10,
        }))
    }

    #[test]
    fn observe_seeds_from_model() {
        let model = account();
        let owner = OWNER.observe(&model);
        assert_eq!(owner.get(), "Pat");
        assert_eq!(OWNER.name(), "owner");
    }

    #[test]
    fn changes_write_through() {
        let model = account();
        let limit = LIMIT.observe(&model);
        limit.set(25).unwrap();
        assert_eq!(LIMIT.read(&model), 25);
        assert_eq!(OWNER.read(&model), "Pat");
    }

    #[test]
    fn direct_model_edits_are_not_observed() {
        let model = account();
        let owner = OWNER.observe(&model);
        model.lock().unwrap().owner = "Lee".into();
        assert_eq!(owner.get(), "Pat");
    }

    #[test]
    fn dropped_model_is_skipped() {
        let model = account();
        let limit = LIMIT.observe(&model);
        drop(model);
        assert!(limit.set(3).is_ok());
        assert_eq!(limit.get(), 3);
    }
}
