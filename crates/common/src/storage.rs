use crate::BlockHash;

/// A raw storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StorageKey(pub Vec<u8>);

impl AsRef<[u8]> for StorageKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for StorageKey {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// A single storage entry change. A `None` value means the key was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: StorageKey,
    pub value: Option<Vec<u8>>,
}

/// The storage entries changed by a block, in the order they were written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageChange {
    pub block: BlockHash,
    pub changes: Vec<KeyValue>,
}

impl StorageChange {
    /// Keeps only the changes whose key is contained in `filter`. An empty filter keeps everything.
    pub fn filtered<'a, I>(&self, filter: I) -> StorageChange
    where
        I: IntoIterator<Item = &'a StorageKey>,
        I::IntoIter: Clone,
    {
        let filter = filter.into_iter();
        if filter.clone().next().is_none() {
            return self.clone();
        }

        StorageChange {
            block: self.block,
            changes: self
                .changes
                .iter()
                .filter(|change| filter.clone().any(|key| key == &change.key))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
