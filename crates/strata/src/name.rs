// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{convert::Infallible, fmt, str::FromStr};

const WILDCARD: char = '*';

/// A registered cache name, optionally ending in a `*` wildcard.
///
/// `"svc.Users"` matches only the query `"svc.Users"`. `"svc.*"` matches every
/// query that starts with `"svc."`. An empty registration string, like a
/// bare `"*"`, is the universal wildcard that matches every query.
///
/// # Examples
///
/// ```
/// use strata::CacheName;
///
/// let name = CacheName::parse("svc.Foo*");
/// assert_eq!(name.prefix(), "svc.Foo");
/// assert!(name.allows_any_suffix());
/// assert_eq!(name.match_level("svc.Foo.Bar"), Some(7));
/// assert_eq!(name.match_level("svc.Bar"), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheName {
    prefix: String,
    allows_any_suffix: bool,
}

impl CacheName {
    /// Parses a registration string.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name.is_empty() {
            return Self::universal();
        }
        match name.strip_suffix(WILDCARD) {
            Some(prefix) => Self {
                prefix: prefix.to_owned(),
                allows_any_suffix: true,
            },
            None => Self {
                prefix: name.to_owned(),
                allows_any_suffix: false,
            },
        }
    }

    /// The name that matches every query.
    #[must_use]
    pub fn universal() -> Self {
        Self {
            prefix: String::new(),
            allows_any_suffix: true,
        }
    }

    /// Returns the fixed part of the name.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns `true` if the name ends in a wildcard.
    #[must_use]
    pub fn allows_any_suffix(&self) -> bool {
        self.allows_any_suffix
    }

    /// Returns `true` for the universal wildcard.
    #[must_use]
    pub fn is_universal(&self) -> bool {
        self.allows_any_suffix && self.prefix.is_empty()
    }

    /// Returns `true` if `query` names exactly this registration.
    #[must_use]
    pub fn is_exact(&self, query: &str) -> bool {
        !self.allows_any_suffix && self.prefix == query
    }

    /// Returns how specifically this name matches `query`, or `None` if it does not match.
    ///
    /// The level is the length of the matched prefix, so longer registrations
    /// rank higher. The universal wildcard matches at level zero.
    #[must_use]
    pub fn match_level(&self, query: &str) -> Option<usize> {
        let matches = if self.allows_any_suffix {
            query.starts_with(&self.prefix)
        } else {
            query == self.prefix
        };
        matches.then_some(self.prefix.len())
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)?;
        if self.allows_any_suffix {
            write!(f, "{WILDCARD}")?;
        }
        Ok(())
    }
}

impl FromStr for CacheName {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for CacheName {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_has_no_wildcard() {
        let name = CacheName::parse("svc.Users");
        assert_eq!(name.prefix(), "svc.Users");
        assert!(!name.allows_any_suffix());
        assert!(name.is_exact("svc.Users"));
        assert_eq!(name.match_level("svc.Users"), Some(9));
        assert_eq!(name.match_level("svc.Users.Admin"), None);
    }

    #[test]
    fn trailing_star_becomes_wildcard() {
        let name = CacheName::parse("svc.*");
        assert_eq!(name.prefix(), "svc.");
        assert!(name.allows_any_suffix());
        assert!(!name.is_exact("svc."));
        assert_eq!(name.match_level("svc."), Some(4));
        assert_eq!(name.match_level("svc.Orders"), Some(4));
        assert_eq!(name.match_level("sv"), None);
    }

    #[test]
    fn empty_and_bare_star_are_universal() {
        assert_eq!(CacheName::parse(""), CacheName::universal());
        assert_eq!(CacheName::parse("*"), CacheName::universal());
        assert!(CacheName::universal().is_universal());
        assert_eq!(CacheName::universal().match_level("anything"), Some(0));
    }

    #[test]
    fn equality_considers_the_wildcard_flag() {
        assert_ne!(CacheName::parse("ab"), CacheName::parse("ab*"));
        assert_eq!(CacheName::parse("ab*"), "ab*".parse().expect("infallible"));
    }

    #[test]
    fn display_restores_registration_string() {
        assert_eq!(CacheName::parse("ab*").to_string(), "ab*");
        assert_eq!(CacheName::parse("ab").to_string(), "ab");
        assert_eq!(CacheName::universal().to_string(), "*");
    }
}
