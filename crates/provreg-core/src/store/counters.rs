//! Side-effect telemetry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;

/// Counts of store and file mutations performed (or, under simulate policy,
/// that would have been performed).
///
/// Diagnostic only: nothing makes control decisions from these numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounters {
    pub nodes_created: u32,
    pub nodes_deleted: u32,
    pub values_set: u32,
    pub values_deleted: u32,
    pub files_created: u32,
    pub files_modified: u32,
    pub files_deleted: u32,
}

impl ChangeCounters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn merge(&mut self, other: &ChangeCounters) {
        self.nodes_created += other.nodes_created;
        self.nodes_deleted += other.nodes_deleted;
        self.values_set += other.values_set;
        self.values_deleted += other.values_deleted;
        self.files_created += other.files_created;
        self.files_modified += other.files_modified;
        self.files_deleted += other.files_deleted;
    }
}

impl AddAssign<&ChangeCounters> for ChangeCounters {
    fn add_assign(&mut self, other: &ChangeCounters) {
        self.merge(other);
    }
}

impl fmt::Display for ChangeCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subKeysCreated = {}, subKeysDeleted = {}, keyValuesSet = {}, keyValuesDeleted = {}, \
             filesCreated = {}, filesModified = {}, filesDeleted = {}",
            self.nodes_created,
            self.nodes_deleted,
            self.values_set,
            self.values_deleted,
            self.files_created,
            self.files_modified,
            self.files_deleted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_adds_fieldwise() {
        let mut total = ChangeCounters {
            nodes_created: 1,
            values_set: 2,
            ..Default::default()
        };
        total += &ChangeCounters {
            nodes_created: 3,
            files_modified: 1,
            ..Default::default()
        };

        assert_eq!(total.nodes_created, 4);
        assert_eq!(total.values_set, 2);
        assert_eq!(total.files_modified, 1);
        assert!(!total.is_empty());
        assert!(ChangeCounters::default().is_empty());
    }
}
