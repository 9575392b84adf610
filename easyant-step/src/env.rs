//! Job environment map with macro expansion.
//!
//! A build step receives the job's environment as a plain map and expands
//! `${VAR}` / `$VAR` references in configuration strings against it. Unknown
//! references are left untouched so partially-configured jobs still produce
//! a recognizable command echo instead of silently dropping text.

use std::collections::HashMap;

/// The environment a build step runs under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Expand `${VAR}` and `$VAR` references against this environment.
    ///
    /// References to variables not present in the map are left as-is.
    pub fn expand(&self, input: &str) -> String {
        shellexpand::env_with_context_no_errors(input, |name| self.get(name)).into_owned()
    }

    /// Expand an optional string, mapping empty/absent input to `None`.
    pub fn expand_opt(&self, input: Option<&str>) -> Option<String> {
        let expanded = self.expand(input?);
        if expanded.trim().is_empty() {
            None
        } else {
            Some(expanded)
        }
    }
}

impl FromIterator<(String, String)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for EnvVars {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}
