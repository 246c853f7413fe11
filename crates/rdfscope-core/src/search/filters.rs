//! Term filter state

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Active term filters: filter id -> selected values
///
/// A key exists only while it has at least one value, so two filter sets
/// with the same selections always compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticFilters {
    #[serde(default)]
    pub terms: BTreeMap<String, Vec<String>>,
}

impl ElasticFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, filter_id: &str, value: &str) -> bool {
        self.terms
            .get(filter_id)
            .is_some_and(|values| values.iter().any(|v| v == value))
    }

    /// Add `value` if absent, remove it if present; drops the key when its
    /// last value goes
    pub fn toggle(&mut self, filter_id: &str, value: &str) {
        let values = self.terms.entry(filter_id.to_string()).or_default();
        if let Some(pos) = values.iter().position(|v| v == value) {
            values.remove(pos);
        } else {
            values.push(value.to_string());
        }

        if values.is_empty() {
            self.terms.remove(filter_id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Parse `id=value` pairs as given on the command line
    pub fn from_pairs<I, S>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filters = Self::new();
        for pair in pairs {
            let (id, value) = pair.as_ref().split_once('=')?;
            if id.is_empty() || value.is_empty() {
                return None;
            }
            if !filters.has(id, value) {
                filters.toggle(id, value);
            }
        }
        Some(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPE: &str = "@type";

    #[test]
    fn test_toggle_adds_and_removes() {
        let mut filters = ElasticFilters::new();
        filters.toggle(TYPE, "http://schema.org/Person");
        assert!(filters.has(TYPE, "http://schema.org/Person"));

        filters.toggle(TYPE, "http://schema.org/Place");
        assert_eq!(filters.terms[TYPE].len(), 2);

        filters.toggle(TYPE, "http://schema.org/Person");
        assert_eq!(filters.terms[TYPE], vec!["http://schema.org/Place"]);
    }

    #[test]
    fn test_toggle_is_its_own_inverse() {
        let mut filters = ElasticFilters::new();
        filters.toggle("license", "cc-by");
        let before = filters.clone();

        filters.toggle(TYPE, "x");
        filters.toggle(TYPE, "x");
        assert_eq!(filters, before);
        assert!(!filters.terms.contains_key(TYPE));

        filters.toggle("license", "cc-by");
        filters.toggle("license", "cc-by");
        assert_eq!(filters, before);
    }

    #[test]
    fn test_last_value_removes_key() {
        let mut filters = ElasticFilters::new();
        filters.toggle(TYPE, "x");
        filters.toggle(TYPE, "x");
        assert!(filters.is_empty());
        assert_eq!(filters, ElasticFilters::default());
    }

    #[test]
    fn test_from_pairs() {
        let filters = ElasticFilters::from_pairs(["@type=a", "@type=b", "@type=a", "lang=en"]).unwrap();
        assert_eq!(filters.terms[TYPE], vec!["a", "b"]);
        assert!(filters.has("lang", "en"));

        assert!(ElasticFilters::from_pairs(["novalue"]).is_none());
        assert!(ElasticFilters::from_pairs(["=x"]).is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let mut filters = ElasticFilters::new();
        filters.toggle(TYPE, "x");
        assert_eq!(
            serde_json::to_value(&filters).unwrap(),
            serde_json::json!({ "terms": { "@type": ["x"] } })
        );
    }
}
