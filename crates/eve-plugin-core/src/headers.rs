//! Multi-valued HTTP header map.
//!
//! Keys written through [`Headers::set`] and [`Headers::add`] are stored in
//! canonical MIME form (`content-type` becomes `Content-Type`), and lookups
//! canonicalise their argument the same way. Maps decoded from the wire keep
//! their keys verbatim so conversion never rewrites what the host sent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Returns the canonical MIME form of a header key.
///
/// The first letter and any letter following a hyphen are upper-cased, the
/// rest lower-cased. Keys containing spaces or non-token bytes are returned
/// unchanged.
pub fn canonical_header_key(key: &str) -> String {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if !valid {
        return key.to_string();
    }

    let mut out = String::with_capacity(key.len());
    let mut upper = true;
    for c in key.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

/// Ordered header map with multiple values per key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a map without touching its keys.
    pub fn from_raw(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map)
    }

    /// Returns the first value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// Returns every value for `key`.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0
            .get(key)
            .or_else(|| self.0.get(&canonical_header_key(key)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replaces all values for `key` with `value`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(canonical_header_key(key), vec![value.into()]);
    }

    /// Appends `value` to the values for `key`.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.0
            .entry(canonical_header_key(key))
            .or_default()
            .push(value.into());
    }

    /// Removes every value for `key`.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0
            .remove(key)
            .or_else(|| self.0.remove(&canonical_header_key(key)))
    }

    /// Returns true when `key` has at least one value.
    pub fn contains(&self, key: &str) -> bool {
        !self.get_all(key).is_empty()
    }

    /// Iterates over keys and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no key is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the map, returning the underlying storage.
    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.add(k.as_ref(), v);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_header_key() {
        assert_eq!(canonical_header_key("content-type"), "Content-Type");
        assert_eq!(canonical_header_key("X-ID-TOKEN"), "X-Id-Token");
        assert_eq!(canonical_header_key("cookie"), "Cookie");
        assert_eq!(canonical_header_key("bad key"), "bad key");
    }

    #[test]
    fn test_set_add_and_lookup_are_case_insensitive() {
        let mut headers = Headers::new();
        headers.set("content-type", "text/plain");
        headers.add("x-trace", "a");
        headers.add("X-Trace", "b");

        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(headers.get_all("x-trace"), ["a", "b"]);
        assert_eq!(headers.len(), 2);

        headers.set("X-Trace", "c");
        assert_eq!(headers.get_all("X-Trace"), ["c"]);
    }

    #[test]
    fn test_raw_keys_are_preserved() {
        let mut raw = BTreeMap::new();
        raw.insert("x-lower".to_string(), vec!["1".to_string()]);
        let headers = Headers::from_raw(raw.clone());

        assert_eq!(headers.get("x-lower"), Some("1"));
        assert_eq!(headers.into_inner(), raw);
    }
}
