use std::collections::BTreeMap;

/// Map keyed by case-folded, whitespace-collapsed text.
#[derive(Debug, Clone, Default)]
pub struct CaseFoldMap {
    map: BTreeMap<String, String>,
}

impl CaseFoldMap {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (key, value) in entries {
            map.entry(fold(key.as_ref())).or_insert_with(|| value.into());
        }
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(&fold(key)).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(&fold(key))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Lowercase and collapse runs of whitespace to a single space.
pub fn fold(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
