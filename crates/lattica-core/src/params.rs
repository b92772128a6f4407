//! String-keyed parameters for rules and topologies
//!
//! Parameters arrive from configuration files as strings and are parsed
//! on demand by the factory that consumes them.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Ordered string parameters
///
/// Uses IndexMap to preserve insertion order (useful for deterministic serialization)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(IndexMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl ToString) {
        self.0.insert(name.into(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parse a parameter, falling back to `default` when absent
    ///
    /// `owner` names the rule or topology in the error message.
    pub fn parse_or<T: FromStr>(&self, owner: &str, name: &str, default: T) -> Result<T> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                Error::invalid_parameter(owner, name, format!("cannot parse {:?}", raw))
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or() {
        let params = Params::new().with("radius", 2).with("bad", "x");
        assert_eq!(params.parse_or("line", "radius", 1usize).unwrap(), 2);
        assert_eq!(params.parse_or("line", "missing", 7usize).unwrap(), 7);
        assert!(matches!(
            params.parse_or("line", "bad", 0u32),
            Err(Error::InvalidRuleParameter { .. })
        ));
    }

    #[test]
    fn test_ron_transparent() {
        let params = Params::new().with("code", 30);
        let text = ron::to_string(&params).unwrap();
        let back: Params = ron::from_str(&text).unwrap();
        assert_eq!(back, params);
        assert_eq!(back.get("code"), Some("30"));
    }
}
