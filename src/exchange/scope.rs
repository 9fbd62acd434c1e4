//! Scope normalization.
//!
//! A joined scope string is split on exactly one separator: the first
//! configured separator that actually occurs in it. With `[" ", ","]`,
//! `"a,b c,d"` becomes `["a,b", "c,d"]` even though the comma would give more
//! pieces, so a lower-priority separator that appears literally inside a scope
//! token is left alone.

use crate::{exchange::options::ScopeSeparators, request::RawScope};

/// Normalizes a raw scope into a non-empty list, or `None`.
///
/// An empty string and an empty list both count as no scope. A list that
/// was already split upstream is returned unchanged, so normalizing a
/// normalized scope is the identity.
#[must_use]
pub fn normalize_scope(raw: Option<RawScope>, separators: &ScopeSeparators) -> Option<Vec<String>> {
    match raw? {
        RawScope::Joined(scope) if scope.is_empty() => None,
        RawScope::Joined(scope) => Some(split_scope(&scope, separators)),
        RawScope::List(scopes) => (!scopes.is_empty()).then_some(scopes),
    }
}

/// Splits `scope` on the highest-priority separator that occurs in it.
///
/// Empty segments are kept. If no separator occurs, the whole string is the
/// only element.
#[must_use]
pub fn split_scope(scope: &str, separators: &ScopeSeparators) -> Vec<String> {
    separators
        .as_slice()
        .iter()
        .find(|separator| scope.contains(separator.as_str()))
        .map_or_else(
            || vec![scope.to_string()],
            |separator| split_on(scope, separator),
        )
}

fn split_on(scope: &str, separator: &str) -> Vec<String> {
    scope.split(separator).map(str::to_string).collect()
}
