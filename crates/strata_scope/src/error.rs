// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// A cache directives value could not be parsed.
///
/// # Example
///
/// ```
/// use strata_scope::CacheDirectives;
///
/// let error = "get; fetch-everything".parse::<CacheDirectives>().unwrap_err();
/// assert!(error.to_string().contains("fetch-everything"));
/// ```
#[ohno::error]
#[display("invalid cache directives: {input}")]
pub struct DirectivesError {
    input: String,
}

impl DirectivesError {
    /// Returns the text that failed to parse.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }
}
