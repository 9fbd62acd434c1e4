//! Exchange configuration.

use bon::Builder;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::exchange::error::{ConfigurationError, EmptySeparatorListSnafu, EmptySeparatorSnafu};

/// The request property that holds the authenticated client by default.
pub const DEFAULT_USER_PROPERTY: &str = "user";

/// The scope separator used when none is configured.
pub const DEFAULT_SCOPE_SEPARATOR: &str = " ";

/// Options for a social exchange handler.
///
/// Deserializes from configuration files as well as through the builder:
///
/// ```toml
/// user_property = "client"
/// scope_separator = [" ", ","]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct ExchangeOptions {
    /// The request property holding the authenticated client.
    ///
    /// An empty value falls back to [`DEFAULT_USER_PROPERTY`].
    #[builder(into, default = DEFAULT_USER_PROPERTY.to_string())]
    #[serde(default = "default_user_property")]
    pub user_property: String,

    /// The separator, or prioritized list of separators, used to split a joined scope string.
    #[builder(into, default)]
    #[serde(default)]
    pub scope_separator: ScopeSeparator,
}

fn default_user_property() -> String {
    DEFAULT_USER_PROPERTY.to_string()
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            user_property: default_user_property(),
            scope_separator: ScopeSeparator::default(),
        }
    }
}

impl ExchangeOptions {
    /// Validates the options and resolves defaults.
    pub(crate) fn resolve(self) -> Result<ResolvedOptions, ConfigurationError> {
        let user_property = if self.user_property.is_empty() {
            default_user_property()
        } else {
            self.user_property
        };

        Ok(ResolvedOptions {
            user_property,
            separators: ScopeSeparators::try_from(self.scope_separator)?,
        })
    }
}

/// Options after validation.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
    pub(crate) user_property: String,
    pub(crate) separators: ScopeSeparators,
}

/// A configured scope separator: one string, or several in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeSeparator {
    /// A single separator.
    One(String),
    /// Candidate separators, highest priority first.
    Many(Vec<String>),
}

impl Default for ScopeSeparator {
    fn default() -> Self {
        Self::One(DEFAULT_SCOPE_SEPARATOR.to_string())
    }
}

impl From<&str> for ScopeSeparator {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for ScopeSeparator {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for ScopeSeparator {
    fn from(value: Vec<String>) -> Self {
        Self::Many(value)
    }
}

impl From<&[&str]> for ScopeSeparator {
    fn from(value: &[&str]) -> Self {
        Self::Many(value.iter().map(|s| (*s).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ScopeSeparator {
    fn from(value: [&str; N]) -> Self {
        Self::from(value.as_slice())
    }
}

/// A validated, non-empty list of scope separators in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSeparators(Vec<String>);

impl ScopeSeparators {
    /// The separators, highest priority first.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for ScopeSeparators {
    fn default() -> Self {
        Self(vec![DEFAULT_SCOPE_SEPARATOR.to_string()])
    }
}

impl TryFrom<ScopeSeparator> for ScopeSeparators {
    type Error = ConfigurationError;

    /// A single empty separator means "use the default". Inside a list an
    /// empty separator is rejected, as is an empty list.
    fn try_from(value: ScopeSeparator) -> Result<Self, Self::Error> {
        match value {
            ScopeSeparator::One(separator) if separator.is_empty() => Ok(Self::default()),
            ScopeSeparator::One(separator) => Ok(Self(vec![separator])),
            ScopeSeparator::Many(separators) => {
                ensure!(!separators.is_empty(), EmptySeparatorListSnafu);
                let all_non_empty = separators.iter().all(|s| !s.is_empty());
                ensure!(all_non_empty, EmptySeparatorSnafu);
                Ok(Self(separators))
            }
        }
    }
}
