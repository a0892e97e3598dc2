//! Property tables.
//!
//! A [`PropertySet`] is the flat name → value table built up by
//! `properties name=value` lines while a script runs.  [`NamedPropertySets`]
//! holds whole property sets under a set name (one per loaded properties
//! file, one per finished sub-batch) and backs the second lookup tier of
//! marker substitution.
//!
//! Both tables keep insertion order: listings, `--classify` output and
//! diagnostics show entries in the order the script defined them.

// ── PropertySet ───────────────────────────────────────────────────────────────

/// Ordered name → value store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PropertySet {
    entries: Vec<(String, String)>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a property.  Overwriting keeps the original position.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Get the value of a property.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Remove a property.  Returns `true` if it existed.
    pub fn unset(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        self.entries.len() != before
    }

    /// Returns `true` if the property is set.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over all properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertySet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = PropertySet::new();
        for (k, v) in iter {
            set.set(k, v);
        }
        set
    }
}

// ── NamedPropertySets ─────────────────────────────────────────────────────────

/// Ordered set-name → [`PropertySet`] table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NamedPropertySets {
    sets: Vec<(String, PropertySet)>,
}

impl NamedPropertySets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the set called `name`.
    pub fn insert(&mut self, name: impl Into<String>, set: PropertySet) {
        let name = name.into();
        match self.sets.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = set,
            None => self.sets.push((name, set)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertySet> {
        self.sets.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Look up `prop` inside the set called `set`.
    pub fn lookup(&self, set: &str, prop: &str) -> Option<&str> {
        self.get(set)?.get(prop)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertySet)> {
        self.sets.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
