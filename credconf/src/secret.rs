// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Credconf Authors

//! Optional values that must never be printed.
//!
//! Plain optional configuration values are represented by [`Option`]. A
//! [`Secret`] is the same presence/absence container, except that every
//! formatting path (`Display`, `Debug`, and therefore `format!`, `log`
//! macros and `panic!` messages) renders the fixed [`REDACTED`] marker
//! instead of the payload. The payload is only reachable through
//! [`Secret::reveal`] and [`Secret::into_revealed`], and it is held in a
//! [`secrecy::SecretBox`] so it is zeroized when dropped.

use secrecy::{zeroize::Zeroize, ExposeSecret, SecretBox};
use std::fmt;

/// Text rendered in place of any secret value
pub const REDACTED: &str = "[REDACTED]";

/// Optional value held in a zeroizing [`SecretBox`]
pub struct Secret<T: Zeroize> {
    value: Option<SecretBox<T>>,
}

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Secret {
            value: Some(SecretBox::new(Box::new(value))),
        }
    }

    pub fn absent() -> Self {
        Secret { value: None }
    }

    pub fn is_some(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_none(&self) -> bool {
        self.value.is_none()
    }

    /// Return `self` when present, otherwise `fallback`
    pub fn or(self, fallback: Secret<T>) -> Secret<T> {
        Secret {
            value: self.value.or(fallback.value),
        }
    }

    /// Borrow the raw value
    pub fn reveal(&self) -> Option<&T> {
        self.value.as_ref().map(|s| s.expose_secret())
    }
}

impl<T: Zeroize + Clone> Secret<T> {
    /// Reveal the value, substituting `default` when absent
    pub fn get_or(self, default: T) -> T {
        self.into_revealed().unwrap_or(default)
    }

    /// Return a copy of the raw value, zeroizing the held one
    pub fn into_revealed(self) -> Option<T> {
        self.reveal().cloned()
    }

    pub fn map<U: Zeroize, F: FnOnce(T) -> U>(self, f: F) -> Secret<U> {
        match self.into_revealed() {
            Some(value) => Secret::new(f(value)),
            None => Secret::absent(),
        }
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        match self.reveal() {
            Some(value) => Secret::new(value.clone()),
            None => Secret::absent(),
        }
    }
}

impl<T: Zeroize> Default for Secret<T> {
    fn default() -> Self {
        Secret::absent()
    }
}

impl<T: Zeroize> From<Option<T>> for Secret<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Secret::new(value),
            None => Secret::absent(),
        }
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug)]
    struct Holder {
        #[allow(dead_code)]
        token: Secret<String>,
    }

    #[test]
    fn test_redacted_in_nested_debug() {
        let h = Holder {
            token: Secret::new("hunter2".to_string()),
        };
        let rendered = format!("{h:?} {h:#?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains(REDACTED));
    }

    #[test]
    fn test_reveal() {
        let s = Secret::new(42u32);
        assert_eq!(s.reveal(), Some(&42));
        assert_eq!(s.into_revealed(), Some(42));
        assert_eq!(Secret::<u32>::absent().reveal(), None);
    }

    #[test]
    fn test_zero_value_is_present() {
        let s = Secret::new(String::new());
        assert!(s.is_some());
        assert!(Secret::<String>::absent().is_none());
    }

    #[test]
    fn test_get_or() {
        assert_eq!(Secret::new(1).get_or(2), 1);
        assert_eq!(Secret::absent().get_or(2), 2);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Secret::new("token".to_string());
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.reveal().map(String::as_str), Some("token"));
        assert_eq!(format!("{copy:?}"), REDACTED);
    }

    #[test]
    fn test_map_keeps_redaction() {
        let s = Secret::new("abc".to_string()).map(|v| v.len());
        assert_eq!(s.to_string(), REDACTED);
        assert_eq!(s.reveal(), Some(&3));
    }

    proptest! {
        #[test]
        fn prop_display_is_always_redacted(
            value in proptest::option::of(".*")
        ) {
            let s: Secret<String> = value.into();
            prop_assert_eq!(s.to_string(), REDACTED);
            prop_assert_eq!(format!("{s:?}"), REDACTED);
            prop_assert_eq!(format!("{s:>20}"), REDACTED);
        }

        #[test]
        fn prop_or_is_left_biased(
            left in proptest::option::of(any::<i64>()),
            right in proptest::option::of(any::<i64>()),
        ) {
            let merged = Secret::from(left).or(Secret::from(right));
            match left {
                Some(v) => prop_assert_eq!(merged.reveal(), Some(&v)),
                None => prop_assert_eq!(merged.reveal(), right.as_ref()),
            }
        }

        #[test]
        fn prop_option_or_is_left_biased(
            left in proptest::option::of(any::<u16>()),
            right in proptest::option::of(any::<u16>()),
        ) {
            let merged = left.or(right);
            if left.is_some() {
                prop_assert_eq!(merged, left);
            } else {
                prop_assert_eq!(merged, right);
            }
        }
    }
}
