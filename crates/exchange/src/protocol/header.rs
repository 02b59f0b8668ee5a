//! Case-insensitive, multi-value header storage.
//!
//! [`HeaderCollection`] backs both sides of an exchange. Unlike
//! `http::HeaderMap`, it keeps the casing of the first write of every name so
//! the response head goes out on the wire the way user code spelled it.

use std::slice;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    name: String,
    values: Vec<String>,
}

/// An ordered collection of header names, each mapped to one or more values.
///
/// Names compare ASCII-case-insensitively. Entries keep insertion order and
/// the values of one name keep the order they were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderCollection {
    entries: Vec<HeaderEntry>,
}

impl HeaderCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    /// Returns the first value stored for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entry(name).and_then(|entry| entry.values.first()).map(String::as_str)
    }

    /// Returns every value stored for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entry(name).map(|entry| entry.values.as_slice()).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Replaces all values of `name` with `value`.
    ///
    /// An existing entry keeps its original name casing.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.entry_mut(&name) {
            Some(entry) => {
                entry.values.clear();
                entry.values.push(value.into());
            }
            None => self.entries.push(HeaderEntry { name, values: vec![value.into()] }),
        }
    }

    /// Appends `value` to the values of `name`.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.entry_mut(&name) {
            Some(entry) => entry.values.push(value.into()),
            None => self.entries.push(HeaderEntry { name, values: vec![value.into()] }),
        }
    }

    /// Removes `name` entirely, returning the values it held.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        let index = self.entries.iter().position(|entry| entry.name.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).values)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs; all values of a name are yielded together.
    pub fn iter(&self) -> Iter<'_> {
        Iter { entries: self.entries.iter(), current: None }
    }

    /// Iterates distinct names with their stored casing.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    fn entry(&self, name: &str) -> Option<&HeaderEntry> {
        self.entries.iter().find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut HeaderEntry> {
        self.entries.iter_mut().find(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

/// Iterator over the `(name, value)` pairs of a [`HeaderCollection`].
#[derive(Debug)]
pub struct Iter<'a> {
    entries: slice::Iter<'a, HeaderEntry>,
    current: Option<(&'a str, slice::Iter<'a, String>)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((name, values)) = &mut self.current
                && let Some(value) = values.next()
            {
                return Some((*name, value.as_str()));
            }

            let entry = self.entries.next()?;
            self.current = Some((entry.name.as_str(), entry.values.iter()));
        }
    }
}

impl<'a> IntoIterator for &'a HeaderCollection {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Collects raw pairs with [`HeaderCollection::add`] semantics, so repeated
/// names keep every value.
impl<K, V> FromIterator<(K, V)> for HeaderCollection
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = HeaderCollection::new();
        headers.extend(iter);
        headers
    }
}

impl<K, V> Extend<(K, V)> for HeaderCollection
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.add(name, value);
        }
    }
}
