//! Ordered factor map and money rounding
//!
//! The audit trail depends on a reproducible factor-application order, so
//! factors live in an explicit insertion-ordered map rather than a hash
//! map: iteration always visits entries in the order they were inserted.

use serde::{Deserialize, Serialize};

/// Round a dollar amount to cents. Applied only at terminal output;
/// intermediate math keeps full precision.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Insertion-ordered mapping of factor name to multiplier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorMap {
    entries: Vec<(String, f64)>,
}

impl FactorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a factor. Re-inserting an existing name updates the value in
    /// place, keeping its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Product of all factor values
    pub fn product(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).product()
    }
}

impl FromIterator<(String, f64)> for FactorMap {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        let mut map = FactorMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}
