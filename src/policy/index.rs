use std::collections::HashSet;

/// Read access to the set of already-archived document ids of one module
pub trait DocIndex {
    fn contains(&self, doc_id: &str) -> bool;
}

/// In-memory known-id index, loaded in full at the start of a module scan
///
/// Owned by the crawl session and updated only after a document has been
/// durably committed.
#[derive(Debug, Clone, Default)]
pub struct KnownDocIndex {
    ids: HashSet<String>,
}

impl KnownDocIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the id was already present
    pub fn insert(&mut self, doc_id: impl Into<String>) -> bool {
        self.ids.insert(doc_id.into())
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.ids.contains(doc_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl DocIndex for KnownDocIndex {
    fn contains(&self, doc_id: &str) -> bool {
        KnownDocIndex::contains(self, doc_id)
    }
}

impl FromIterator<String> for KnownDocIndex {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
