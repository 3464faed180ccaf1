use crate::frame::MetadataEntry;

/// Out-of-band key/value data attached to a call.
///
/// Keys are case-insensitive: they are stored as ASCII lowercase. A key may carry
/// several values. Keys keep the order in which they were first inserted, and
/// values keep the order in which they were appended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, Vec<String>)>,
}

impl Metadata {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build metadata from key/value pairs. Repeated keys accumulate values.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut metadata = Self::new();
        for (key, value) in pairs {
            metadata.append(key, value);
        }
        metadata
    }

    /// Add a value to the end of the key's value list.
    pub fn append(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = normalize(key.as_ref());
        match self.position(&key) {
            Some(index) => self.entries[index].1.push(value.into()),
            None => self.entries.push((key, vec![value.into()])),
        }
    }

    /// Replace every value of the key with this one value.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = normalize(key.as_ref());
        match self.position(&key) {
            Some(index) => self.entries[index].1 = vec![value.into()],
            None => self.entries.push((key, vec![value.into()])),
        }
    }

    /// The first value of the key.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// All values of the key, in insertion order. Empty when the key is absent.
    pub fn get_all(&self, key: impl AsRef<str>) -> &[String] {
        let key = normalize(key.as_ref());
        self.position(&key)
            .map(|index| self.entries[index].1.as_slice())
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: impl AsRef<str>) -> bool {
        self.position(&normalize(key.as_ref())).is_some()
    }

    /// Remove the key, returning its values.
    pub fn remove(&mut self, key: impl AsRef<str>) -> Option<Vec<String>> {
        let key = normalize(key.as_ref());
        self.position(&key)
            .map(|index| self.entries.remove(index).1)
    }

    /// Append every value of `other`, key by key.
    pub fn extend(&mut self, other: Metadata) {
        for (key, values) in other.entries {
            match self.position(&key) {
                Some(index) => self.entries[index].1.extend(values),
                None => self.entries.push((key, values)),
            }
        }
    }

    /// Iterate `(key, value)` pairs, one per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(key, values)| {
            values
                .iter()
                .map(move |value| (key.as_str(), value.as_str()))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert into the wire representation.
    pub fn into_entries(self) -> Vec<MetadataEntry> {
        self.entries
            .into_iter()
            .map(|(key, values)| MetadataEntry { key, values })
            .collect()
    }

    /// Read the wire representation. Keys are normalized again, since peers are not trusted to.
    pub fn from_entries(entries: impl IntoIterator<Item = MetadataEntry>) -> Self {
        let mut metadata = Self::new();
        for entry in entries {
            for value in entry.values {
                metadata.append(&entry.key, value);
            }
        }
        metadata
    }

    fn position(&self, normalized_key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(key, _)| key == normalized_key)
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

fn normalize(key: &str) -> String {
    key.to_ascii_lowercase()
}
