//! Property-based invariant tests for observables and binding links.
//!
//! **Observable:**
//! 1. Every distinct value change notifies exactly once with (old, new).
//! 2. Setting the current value notifies nobody and keeps the version.
//! 3. Version equals the number of value-changing sets.
//!
//! **Link:**
//! 4. After creation the receiving side equals the sending side.
//! 5. Bidirectional links never echo: each side's version grows by exactly
//!    one per distinct value written on either side.
//! 6. After detach, no sequence of writes propagates.

use std::sync::{Arc, Mutex};

use databind_core::{BindingLink, BindingMode, ObservableValue, ValueChange};
use proptest::prelude::*;

// ── Strategies ────────────────────────────────────────────────────────────

fn writes_strategy(max_len: usize) -> impl Strategy<Value = Vec<i8>> {
    proptest::collection::vec(-4i8..=4, 0..=max_len)
}

fn mode_strategy() -> impl Strategy<Value = BindingMode> {
    prop_oneof![
        Just(BindingMode::SourceToTarget),
        Just(BindingMode::TargetToSource),
        Just(BindingMode::Bidirectional),
    ]
}

/// Expected notifications when writing `writes` in order starting from `start`.
fn expected_changes(start: i8, writes: &[i8]) -> Vec<ValueChange<i8>> {
    let mut current = start;
    let mut out = Vec::new();
    for &w in writes {
        if w != current {
            out.push(ValueChange { old: current, new: w });
            current = w;
        }
    }
    out
}

// ── Observable ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn notifications_match_distinct_changes(start in -4i8..=4, writes in writes_strategy(32)) {
        let obs = ObservableValue::new(start);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        obs.add_listener(move |change| {
            seen_clone.lock().unwrap().push(change.clone());
            Ok(())
        });

        for &w in &writes {
            obs.set(w).unwrap();
        }

        let expected = expected_changes(start, &writes);
        prop_assert_eq!(obs.version(), expected.len() as u64);
        prop_assert_eq!(&*seen.lock().unwrap(), &expected);
    }

    #[test]
    fn setting_current_value_is_silent(value in any::<i32>()) {
        let obs = ObservableValue::new(value);
        let seen = Arc::new(Mutex::new(0usize));
        let seen_clone = Arc::clone(&seen);
        obs.add_listener(move |_| {
            *seen_clone.lock().unwrap() += 1;
            Ok(())
        });
        obs.set(value).unwrap();
        prop_assert_eq!(obs.version(), 0);
        prop_assert_eq!(*seen.lock().unwrap(), 0);
    }
}

// ── Link ──────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn create_synchronizes(source in any::<i16>(), target in any::<i16>(), mode in mode_strategy()) {
        let s = ObservableValue::new(source);
        let t = ObservableValue::new(target);
        let _link = BindingLink::create(&s, &t, mode).unwrap();
        prop_assert_eq!(s.get(), t.get());
        let expected = if mode.forward() { source } else { target };
        prop_assert_eq!(s.get(), expected);
    }

    #[test]
    fn bidirectional_never_echoes(
        writes in proptest::collection::vec((any::<bool>(), -4i8..=4), 0..=32)
    ) {
        let s = ObservableValue::new(0i8);
        let t = ObservableValue::new(0i8);
        let _link = BindingLink::create(&s, &t, BindingMode::Bidirectional).unwrap();

        let mut current = 0i8;
        let mut distinct = 0u64;
        for &(to_source, value) in &writes {
            if to_source {
                s.set(value).unwrap();
            } else {
                t.set(value).unwrap();
            }
            if value != current {
                distinct += 1;
                current = value;
            }
            prop_assert_eq!(s.get(), t.get());
        }
        prop_assert_eq!(s.version(), distinct);
        prop_assert_eq!(t.version(), distinct);
    }

    #[test]
    fn detached_link_is_inert(
        mode in mode_strategy(),
        writes in proptest::collection::vec((any::<bool>(), -4i8..=4), 1..=16)
    ) {
        let s = ObservableValue::new(0i8);
        let t = ObservableValue::new(0i8);
        let link = BindingLink::create(&s, &t, mode).unwrap();
        link.detach();
        link.detach();

        let (mut expect_s, mut expect_t) = (0i8, 0i8);
        for &(to_source, value) in &writes {
            if to_source {
                s.set(value).unwrap();
                expect_s = value;
            } else {
                t.set(value).unwrap();
                expect_t = value;
            }
        }
        prop_assert_eq!(s.get(), expect_s);
        prop_assert_eq!(t.get(), expect_t);
    }
}
