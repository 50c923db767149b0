use crate::logstore::record::{field_text, fields, RawRecord};
use std::collections::HashSet;

/// Record ids encountered in one fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenIds(HashSet<String>);

impl SeenIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, id: String) -> bool {
        self.0.insert(id)
    }
}

impl<S: Into<String>> FromIterator<S> for SeenIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Drop records already delivered by the previous fetch or repeated in this page.
///
/// Returns the surviving records in their original order, plus every id
/// encountered in this page (kept or not) to seed the next fetch. Records
/// without an id always survive.
pub fn filter_seen(records: Vec<RawRecord>, previous: &SeenIds) -> (Vec<RawRecord>, SeenIds) {
    let mut encountered = SeenIds::new();

    let kept = records
        .into_iter()
        .filter(|record| {
            let Some(id) = field_text(record, fields::ID) else {
                return true;
            };
            let repeated = previous.contains(&id);
            let first_in_page = encountered.insert(id);
            first_in_page && !repeated
        })
        .collect();

    (kept, encountered)
}
