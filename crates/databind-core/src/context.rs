#![forbid(unsafe_code)]

//! Binding context: owns a group of links and tears them down together.
//!
//! # Usage
//!
//! ```ignore
//! use databind_core::{BindingContext, BindingMode, ObservableValue};
//!
//! let ui = ObservableValue::new(String::new());
//! let model = ObservableValue::new("Pat".to_string());
//!
//! let mut ctx = BindingContext::new();
//! ctx.bind(&ui, &model, BindingMode::SourceToTarget)?;
//! ui.set("Sam".into())?;
//! assert_eq!(model.get(), "Sam");
//! ctx.dispose();
//! ```
//!
//! # Invariants
//!
//! 1. An ordered `(source, target)` pair appears in at most one active link.
//! 2. `unbind_all` detaches every link and leaves the context usable.
//! 3. After `dispose`, `bind` always fails with
//!    [`BindingError::DisposedContext`].
//! 4. Dropping the context detaches its links.
//! 5. Links that are detached, or whose two sides have both been dropped, are
//!    released on the next `bind`.

use std::fmt;

use tracing::{debug, info, trace};

use crate::error::{BindingError, BindingResult};
use crate::link::{AnyLink, BindingLink, BindingMode, LinkState};
use crate::observable::ObservableValue;
use crate::realm::Realm;

/// Configuration for a [`BindingContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// Mode used by [`BindingContext::bind_default`].
    pub default_mode: BindingMode,
    /// Realm the context (and its bindings) belong to.
    pub realm: Realm,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            default_mode: BindingMode::SourceToTarget,
            realm: Realm::current(),
        }
    }
}

impl ContextConfig {
    #[must_use]
    pub fn with_default_mode(mut self, mode: BindingMode) -> Self {
        self.default_mode = mode;
        self
    }

    #[must_use]
    pub fn with_realm(mut self, realm: Realm) -> Self {
        self.realm = realm;
        self
    }
}

/// Owner of a set of [`BindingLink`]s with bulk lifecycle control.
pub struct BindingContext {
    config: ContextConfig,
    links: Vec<Box<dyn AnyLink>>,
    disposed: bool,
}

impl fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingContext")
            .field("config", &self.config)
            .field("links", &self.links.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl Default for BindingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingContext {
    /// A context owned by the calling thread with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    #[must_use]
    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            config,
            links: Vec::new(),
            disposed: false,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Bind `source` to `target` and keep the link.
    ///
    /// # Errors
    ///
    /// - [`BindingError::DisposedContext`] after [`dispose`](Self::dispose).
    /// - [`BindingError::ThreadAffinity`] off the context's realm thread.
    /// - [`BindingError::DuplicateBinding`] if the pair is already bound here.
    /// - Any error from the link's initial synchronization.
    pub fn bind<T>(
        &mut self,
        source: &ObservableValue<T>,
        target: &ObservableValue<T>,
        mode: BindingMode,
    ) -> BindingResult<BindingLink<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        if self.disposed {
            return Err(BindingError::DisposedContext);
        }
        self.config.realm.check_access()?;

        self.prune();
        let pair = (source.id(), target.id());
        if self.links.iter().any(|link| link.endpoints() == pair) {
            return Err(BindingError::DuplicateBinding {
                source: pair.0,
                target: pair.1,
            });
        }

        let link = BindingLink::create(source, target, mode)?;
        self.links.push(Box::new(link.clone()));
        Ok(link)
    }

    /// Drop links that were detached elsewhere or whose sides are both gone.
    fn prune(&mut self) {
        let before = self.links.len();
        self.links.retain(|link| {
            if link.state() != LinkState::Active {
                return false;
            }
            if link.is_orphaned() {
                link.detach();
                return false;
            }
            true
        });
        let pruned = before - self.links.len();
        if pruned > 0 {
            trace!(pruned, "pruned dead links");
        }
    }

    /// [`bind`](Self::bind) with the configured default mode.
    ///
    /// # Errors
    ///
    /// Same as [`bind`](Self::bind).
    pub fn bind_default<T>(
        &mut self,
        source: &ObservableValue<T>,
        target: &ObservableValue<T>,
    ) -> BindingResult<BindingLink<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let mode = self.config.default_mode;
        self.bind(source, target, mode)
    }

    /// Detach every owned link. The context stays usable.
    pub fn unbind_all(&mut self) {
        let count = self.links.len();
        for link in self.links.drain(..) {
            link.detach();
        }
        if count > 0 {
            debug!(count, "unbound all links");
        }
    }

    /// Detach every link and refuse further bindings. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.unbind_all();
        self.disposed = true;
        info!("binding context disposed");
    }

    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Number of active links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links
            .iter()
            .filter(|link| link.state() == LinkState::Active)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for BindingContext {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_registers_and_syncs() {
        let mut ctx = BindingContext::new();
        let ui = ObservableValue::new(1);
        let model = ObservableValue::new(0);
        let link = ctx.bind(&ui, &model, BindingMode::SourceToTarget).unwrap();
        assert_eq!(model.get(), 1);
        assert_eq!(link.endpoints(), (ui.id(), model.id()));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn duplicate_pair_is_rejected() {
        let mut ctx = BindingContext::new();
        let a = ObservableValue::new(0);
        let b = ObservableValue::new(0);
        ctx.bind(&a, &b, BindingMode::SourceToTarget).unwrap();

        let err = ctx.bind(&a, &b, BindingMode::Bidirectional).unwrap_err();
        assert_eq!(
            err,
            BindingError::DuplicateBinding {
                source: a.id(),
                target: b.id()
            }
        );
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn reversed_pair_is_a_different_binding() {
        let mut ctx = BindingContext::new();
        let a = ObservableValue::new(0);
        let b = ObservableValue::new(0);
        ctx.bind(&a, &b, BindingMode::SourceToTarget).unwrap();
        ctx.bind(&b, &a, BindingMode::SourceToTarget).unwrap();
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn rebind_after_unbind_all() {
        let mut ctx = BindingContext::new();
        let a = ObservableValue::new(0);
        let b = ObservableValue::new(0);
        ctx.bind(&a, &b, BindingMode::SourceToTarget).unwrap();
        ctx.unbind_all();
        assert!(ctx.is_empty());
        assert_eq!(a.listener_count(), 0);

        ctx.bind(&a, &b, BindingMode::SourceToTarget).unwrap();
        a.set(4).unwrap();
        assert_eq!(b.get(), 4);
    }

    #[test]
    fn rebind_after_manual_detach() {
        let mut ctx = BindingContext::new();
        let a = ObservableValue::new(0);
        let b = ObservableValue::new(0);
        let link = ctx.bind(&a, &b, BindingMode::SourceToTarget).unwrap();
        link.detach();
        assert!(ctx.bind(&a, &b, BindingMode::SourceToTarget).is_ok());
    }

    #[test]
    fn links_to_dropped_values_are_released() {
        let mut ctx = BindingContext::new();
        let mut values = Vec::new();
        for round in 0..4 {
            let a = ObservableValue::new(round);
            let b = ObservableValue::new(0);
            ctx.bind(&a, &b, BindingMode::Bidirectional).unwrap();
            values.push((a, b));
        }
        assert_eq!(ctx.links.len(), 4);
        drop(values);

        let a = ObservableValue::new(7);
        let b = ObservableValue::new(0);
        ctx.bind(&a, &b, BindingMode::SourceToTarget).unwrap();
        assert_eq!(ctx.links.len(), 1);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn link_with_one_live_side_is_kept() {
        let mut ctx = BindingContext::new();
        let kept = ObservableValue::new(1);
        {
            let gone = ObservableValue::new(0);
            ctx.bind(&kept, &gone, BindingMode::SourceToTarget).unwrap();
        }
        let other = ObservableValue::new(0);
        ctx.bind(&other, &kept, BindingMode::SourceToTarget).unwrap();
        assert_eq!(ctx.links.len(), 2);
    }

    #[test]
    fn dispose_is_terminal() {
        let mut ctx = BindingContext::new();
        let a = ObservableValue::new(0);
        let b = ObservableValue::new(0);
        let link = ctx.bind(&a, &b, BindingMode::Bidirectional).unwrap();

        ctx.dispose();
        ctx.dispose();
        assert!(ctx.is_disposed());
        assert_eq!(link.state(), LinkState::Detached);
        assert_eq!(
            ctx.bind(&a, &b, BindingMode::SourceToTarget).unwrap_err(),
            BindingError::DisposedContext
        );

        a.set(9).unwrap();
        assert_eq!(b.get(), 0);
    }

    #[test]
    fn drop_detaches_links() {
        let a = ObservableValue::new(0);
        let b = ObservableValue::new(0);
        {
            let mut ctx = BindingContext::new();
            ctx.bind(&a, &b, BindingMode::SourceToTarget).unwrap();
        }
        a.set(1).unwrap();
        assert_eq!(b.get(), 0);
    }

    #[test]
    fn bind_default_uses_configured_mode() {
        let config = ContextConfig::default().with_default_mode(BindingMode::Bidirectional);
        let mut ctx = BindingContext::with_config(config);
        let a = ObservableValue::new(0);
        let b = ObservableValue::new(0);
        let link = ctx.bind_default(&a, &b).unwrap();
        assert_eq!(link.mode(), BindingMode::Bidirectional);
        b.set(6).unwrap();
        assert_eq!(a.get(), 6);
    }

    #[test]
    fn foreign_realm_context_refuses_bind() {
        let foreign = std::thread::spawn(Realm::current).join().unwrap();
        let mut ctx = BindingContext::with_config(ContextConfig::default().with_realm(foreign));
        let a = ObservableValue::new(0);
        let b = ObservableValue::new(0);
        assert!(matches!(
            ctx.bind(&a, &b, BindingMode::SourceToTarget),
            Err(BindingError::ThreadAffinity { .. })
        ));
    }
}
