//! Composite-key deduplication over accepted records.

use std::collections::HashSet;

use crate::record::EntityRecord;

/// Identity key built from the non-empty, trimmed, lower-cased name, website
/// and source URL, labeled and joined in that order.
///
/// Returns `None` when all three are empty. No URL canonicalization happens:
/// `https://x/1` and `https://x/1/` are different sources.
pub fn composite_key(record: &EntityRecord) -> Option<String> {
    let parts = [
        ("name", record.name.as_deref()),
        ("website", record.website_url.as_deref()),
        ("source", Some(record.source_url.as_str())),
    ];

    let labeled: Vec<String> = parts
        .into_iter()
        .filter_map(|(label, value)| {
            let value = value?.trim().to_lowercase();
            (!value.is_empty()).then(|| format!("{}:{}", label, value))
        })
        .collect();

    if labeled.is_empty() {
        None
    } else {
        Some(labeled.join("|"))
    }
}

/// Every key accepted so far, including those loaded from earlier runs.
#[derive(Debug, Default)]
pub struct DedupIndex {
    keys: HashSet<String>,
    fallback_counter: usize,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the index from previously persisted records.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a EntityRecord>,
    {
        let mut index = Self::new();
        for record in records {
            index.insert(record);
        }
        index
    }

    /// A record without any identity field is never a duplicate.
    pub fn is_duplicate(&self, record: &EntityRecord) -> bool {
        composite_key(record)
            .map(|key| self.keys.contains(&key))
            .unwrap_or(false)
    }

    /// Insert the record's key and return it. A record with no identity field
    /// gets a key that is unique for the lifetime of this index.
    pub fn insert(&mut self, record: &EntityRecord) -> String {
        let key = composite_key(record).unwrap_or_else(|| {
            self.fallback_counter += 1;
            format!("fallback:{}", self.fallback_counter)
        });
        self.keys.insert(key.clone());
        key
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.fallback_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: Option<&str>, website: Option<&str>, source: &str) -> EntityRecord {
        EntityRecord {
            name: name.map(str::to_string),
            website_url: website.map(str::to_string),
            source_url: source.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_key_is_trimmed_and_case_folded() {
        let key = composite_key(&record(Some("  Acme Corp "), Some("HTTPS://Acme.com"), "https://x/1"));
        assert_eq!(
            key.as_deref(),
            Some("name:acme corp|website:https://acme.com|source:https://x/1")
        );
    }

    #[test]
    fn test_key_skips_empty_parts() {
        let key = composite_key(&record(None, Some("  "), "https://x/1"));
        assert_eq!(key.as_deref(), Some("source:https://x/1"));
        assert_eq!(composite_key(&record(None, None, "")), None);
    }

    #[test]
    fn test_same_source_different_name_is_not_duplicate() {
        let mut index = DedupIndex::new();
        index.insert(&record(Some("A"), None, "https://x/1"));
        assert!(!index.is_duplicate(&record(Some("B"), None, "https://x/1")));
        assert!(index.is_duplicate(&record(Some("a "), None, "https://x/1")));
    }

    #[test]
    fn test_raw_urls_are_not_canonicalized() {
        let mut index = DedupIndex::new();
        index.insert(&record(Some("A"), None, "https://x/1"));
        assert!(!index.is_duplicate(&record(Some("A"), None, "https://x/1/")));
        assert!(!index.is_duplicate(&record(Some("A"), None, "https://x/1?ref=list")));
    }

    #[test]
    fn test_fallback_keys_are_unique() {
        let mut index = DedupIndex::new();
        let empty = record(None, None, "");
        assert!(!index.is_duplicate(&empty));
        let first = index.insert(&empty);
        let second = index.insert(&empty);
        assert_ne!(first, second);
        assert!(!index.is_duplicate(&empty));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_from_records_and_clear() {
        let records = vec![
            record(Some("A"), None, "https://x/1"),
            record(Some("B"), None, "https://x/2"),
        ];
        let mut index = DedupIndex::from_records(&records);
        assert_eq!(index.len(), 2);
        assert!(index.is_duplicate(&records[1]));

        index.clear();
        assert!(index.is_empty());
        assert!(!index.is_duplicate(&records[0]));
    }
}
