// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{CacheMethod, DirectivesError};

/// Name of the request header that carries cache directives between services.
pub const HEADER_NAME: &str = "x-cache-directives";

const MIN_TIMESTAMP_PREFIX: &str = "min-ts=";

/// Per-request cache directives.
///
/// `method` decides which operations a scoped call may perform, and
/// `minimum_value_timestamp` is the staleness floor: a stored value whose
/// producer timestamp is older than the floor is treated as absent.
///
/// The default directives permit reads and writes and impose no floor.
///
/// # Header form
///
/// Directives travel between services as a header value, for example
/// `get; min-ts=2024-05-01T00:00:00Z`. Method tokens are `none`, `get`, `set`,
/// `get-or-set` and `ignore-min-ts`. When only a `min-ts` is given, the method
/// defaults to `get-or-set`.
///
/// ```
/// use strata_scope::{CacheDirectives, CacheMethod};
///
/// let directives: CacheDirectives = "get; min-ts=2024-05-01T00:00:00Z".parse()?;
/// assert_eq!(directives.method, CacheMethod::GET);
/// assert_eq!(directives.to_header_value(), "get; min-ts=2024-05-01T00:00:00Z");
/// # Ok::<(), strata_scope::DirectivesError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDirectives {
    /// The permitted cache operations.
    pub method: CacheMethod,
    /// The minimum acceptable value timestamp of a hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_value_timestamp: Option<Timestamp>,
}

impl CacheDirectives {
    /// Creates directives with the given method and staleness floor.
    #[must_use]
    pub fn new(method: CacheMethod, minimum_value_timestamp: Option<Timestamp>) -> Self {
        Self {
            method,
            minimum_value_timestamp,
        }
    }

    /// Directives that bypass the cache entirely.
    #[must_use]
    pub fn bypass() -> Self {
        Self::new(CacheMethod::NONE, None)
    }

    /// Returns `true` if a scoped read may consult the store.
    #[must_use]
    pub fn allows_get(&self) -> bool {
        self.method.allows_get()
    }

    /// Returns `true` if a scoped write may reach the store.
    #[must_use]
    pub fn allows_set(&self) -> bool {
        self.method.allows_set()
    }

    /// Returns `true` if a value produced at `value_timestamp` satisfies the staleness floor.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_scope::{CacheDirectives, CacheMethod, Timestamp};
    ///
    /// let floor: Timestamp = "2024-05-01T00:00:00Z".parse().unwrap();
    /// let older: Timestamp = "2024-04-30T00:00:00Z".parse().unwrap();
    ///
    /// let strict = CacheDirectives::new(CacheMethod::GET, Some(floor));
    /// assert!(!strict.accepts(older));
    /// assert!(strict.accepts(floor));
    ///
    /// let lenient = CacheDirectives::new(CacheMethod::GET | CacheMethod::IGNORE_MINIMUM_TIMESTAMP, Some(floor));
    /// assert!(lenient.accepts(older));
    /// ```
    #[must_use]
    pub fn accepts(&self, value_timestamp: Timestamp) -> bool {
        if self.method.ignores_minimum_timestamp() {
            return true;
        }
        self.minimum_value_timestamp.is_none_or(|floor| value_timestamp >= floor)
    }

    /// Renders the directives as a header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        self.to_string()
    }
}

impl Default for CacheDirectives {
    fn default() -> Self {
        Self::new(CacheMethod::GET_OR_SET, None)
    }
}

impl fmt::Display for CacheDirectives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = self.method & CacheMethod::GET_OR_SET;
        let token = if access == CacheMethod::GET_OR_SET {
            "get-or-set"
        } else if access == CacheMethod::GET {
            "get"
        } else if access == CacheMethod::SET {
            "set"
        } else {
            "none"
        };
        f.write_str(token)?;

        if self.method.ignores_minimum_timestamp() {
            f.write_str("; ignore-min-ts")?;
        }
        if let Some(floor) = self.minimum_value_timestamp {
            write!(f, "; {MIN_TIMESTAMP_PREFIX}{floor}")?;
        }
        Ok(())
    }
}

impl FromStr for CacheDirectives {
    type Err = DirectivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut method = CacheMethod::NONE;
        let mut method_given = false;
        let mut minimum_value_timestamp = None;

        for part in s.split(';').map(str::trim).filter(|part| !part.is_empty()) {
            if let Some(value) = part.strip_prefix(MIN_TIMESTAMP_PREFIX) {
                let floor = value.trim().parse::<Timestamp>().map_err(|e| DirectivesError::caused_by(s, e))?;
                minimum_value_timestamp = Some(floor);
                continue;
            }

            match part.to_ascii_lowercase().as_str() {
                "none" => {}
                "get" => method |= CacheMethod::GET,
                "set" => method |= CacheMethod::SET,
                "get-or-set" => method |= CacheMethod::GET_OR_SET,
                "ignore-min-ts" => {
                    method |= CacheMethod::IGNORE_MINIMUM_TIMESTAMP;
                    continue;
                }
                _ => return Err(DirectivesError::new(s)),
            }
            method_given = true;
        }

        if !method_given {
            if minimum_value_timestamp.is_none() && method.is_empty() {
                return Err(DirectivesError::new(s));
            }
            method |= CacheMethod::GET_OR_SET;
        }

        Ok(Self::new(method, minimum_value_timestamp))
    }
}
