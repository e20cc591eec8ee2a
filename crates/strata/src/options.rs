// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

/// Wiring of a layered cache from registered cache names.
///
/// Every field is required. In particular the level-1 invalidation policy has
/// no default, so a configuration cannot silently leave it unset.
///
/// # Examples
///
/// ```
/// use strata::LayeredCacheOptions;
///
/// let options: LayeredCacheOptions = serde_json::from_str(
///     r#"{ "level1": "local.Users", "level2": "shared.Users", "invalidateLevel1OnLevel2Upsert": true }"#,
/// )?;
/// assert!(options.invalidate_level1_on_level2_upsert);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[non_exhaustive]
pub struct LayeredCacheOptions {
    /// Registered name of the fast, process-local tier.
    pub level1: String,
    /// Registered name of the shared fallback tier.
    pub level2: String,
    /// Publish an `Updated` notification for `level1` whenever a write reaches level 2.
    pub invalidate_level1_on_level2_upsert: bool,
}

impl LayeredCacheOptions {
    /// Creates options for the given tier names and policy.
    #[must_use]
    pub fn new(level1: impl Into<String>, level2: impl Into<String>, invalidate_level1_on_level2_upsert: bool) -> Self {
        Self {
            level1: level1.into(),
            level2: level2.into(),
            invalidate_level1_on_level2_upsert,
        }
    }
}
