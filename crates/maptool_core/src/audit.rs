//! Duplicate id audit over loaded groups.
//!
//! Reports every id used more than once. Read-only: collisions are surfaced
//! to the caller, never repaired.

use crate::model::entity::EntityId;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// One id that occurs more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateId {
    pub id: EntityId,
    pub count: usize,
}

/// Result of a duplicate id audit, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateReport {
    pub duplicates: Vec<DuplicateId>,
}

impl DuplicateReport {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }

    /// Occurrence count of `id` when it is duplicated.
    pub fn count_of(&self, id: EntityId) -> Option<usize> {
        self.duplicates
            .iter()
            .find(|duplicate| duplicate.id == id)
            .map(|duplicate| duplicate.count)
    }
}

impl Display for DuplicateReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, duplicate) in self.duplicates.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            write!(f, "[ID: {}, Count: {}]", duplicate.id, duplicate.count)?;
        }
        Ok(())
    }
}

/// Groups `ids` and reports every id seen more than once.
pub fn audit_duplicate_ids(ids: impl IntoIterator<Item = EntityId>) -> DuplicateReport {
    let mut counts: BTreeMap<EntityId, usize> = BTreeMap::new();
    for id in ids {
        *counts.entry(id).or_insert(0) += 1;
    }

    DuplicateReport {
        duplicates: counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, count)| DuplicateId { id, count })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::audit_duplicate_ids;

    #[test]
    fn summary_lists_each_duplicate() {
        let report = audit_duplicate_ids([4, 1, 4, 9, 1, 4]);
        assert_eq!(report.to_string(), "[ID: 1, Count: 2] [ID: 4, Count: 3]");
    }

    #[test]
    fn empty_input_has_no_duplicates() {
        let report = audit_duplicate_ids(std::iter::empty());
        assert!(!report.has_duplicates());
        assert_eq!(report.to_string(), "");
    }
}
